//! RDM requests, replies and completion status
//!
//! Parameter data is carried opaquely: this crate routes requests, it does
//! not interpret PIDs.

use std::fmt;

use super::uid::{Uid, UidSet};

/// PID of the discovery unique branch probe
pub const PID_DISC_UNIQUE_BRANCH: u16 = 0x0001;
/// PID of the discovery mute message
pub const PID_DISC_MUTE: u16 = 0x0002;
/// PID of the discovery un-mute message
pub const PID_DISC_UN_MUTE: u16 = 0x0003;

/// RDM command class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandClass {
    Discover,
    Get,
    Set,
}

impl CommandClass {
    /// Wire value of the request command class
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Discover => 0x10,
            Self::Get => 0x20,
            Self::Set => 0x30,
        }
    }
}

/// An RDM request addressed to one UID, a vendorcast or a broadcast
///
/// Requests are plain values: fanning one out to several ports hands every
/// port its own [`duplicate`](Self::duplicate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmRequest {
    pub source_uid: Uid,
    pub destination_uid: Uid,
    pub transaction_number: u8,
    pub port_id: u8,
    pub sub_device: u16,
    pub command_class: CommandClass,
    pub param_id: u16,
    pub param_data: Vec<u8>,
}

impl RdmRequest {
    /// A GET request
    pub fn get(
        source_uid: Uid,
        destination_uid: Uid,
        transaction_number: u8,
        port_id: u8,
        sub_device: u16,
        param_id: u16,
        param_data: Vec<u8>,
    ) -> Self {
        Self {
            source_uid,
            destination_uid,
            transaction_number,
            port_id,
            sub_device,
            command_class: CommandClass::Get,
            param_id,
            param_data,
        }
    }

    /// A SET request
    pub fn set(
        source_uid: Uid,
        destination_uid: Uid,
        transaction_number: u8,
        port_id: u8,
        sub_device: u16,
        param_id: u16,
        param_data: Vec<u8>,
    ) -> Self {
        Self {
            command_class: CommandClass::Set,
            ..Self::get(
                source_uid,
                destination_uid,
                transaction_number,
                port_id,
                sub_device,
                param_id,
                param_data,
            )
        }
    }

    /// A discovery unique branch probe covering `lower..=upper`, sent to all devices
    pub fn discovery_unique_branch(
        source_uid: Uid,
        lower: Uid,
        upper: Uid,
        transaction_number: u8,
    ) -> Self {
        let mut param_data = Vec::with_capacity(2 * Uid::SIZE);
        param_data.extend_from_slice(&lower.pack());
        param_data.extend_from_slice(&upper.pack());

        Self {
            source_uid,
            destination_uid: Uid::all_devices(),
            transaction_number,
            port_id: 1,
            sub_device: 0,
            command_class: CommandClass::Discover,
            param_id: PID_DISC_UNIQUE_BRANCH,
            param_data,
        }
    }

    /// True for a discovery unique branch probe
    pub fn is_dub(&self) -> bool {
        self.command_class == CommandClass::Discover && self.param_id == PID_DISC_UNIQUE_BRANCH
    }

    /// An independent copy for another port
    pub fn duplicate(&self) -> Self {
        self.clone()
    }
}

/// A decoded RDM response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmResponse {
    pub source_uid: Uid,
    pub destination_uid: Uid,
    pub transaction_number: u8,
    pub response_type: u8,
    pub sub_device: u16,
    pub param_id: u16,
    pub param_data: Vec<u8>,
}

/// Raw bytes of one frame seen on the line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RdmFrame {
    pub data: Vec<u8>,
}

impl RdmFrame {
    /// Wrap raw frame bytes
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// Outcome of an RDM request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdmStatusCode {
    /// A response was received
    CompletedOk,
    /// The request was broadcast, no response expected
    WasBroadcast,
    /// The request could not be sent
    FailedToSend,
    /// No response before the timeout
    Timeout,
    /// The response was malformed
    InvalidResponse,
    /// The destination UID is not known on any port
    UnknownUid,
    /// Checksum mismatch in the response
    ChecksumIncorrect,
    /// Transaction number mismatch in the response
    TransactionMismatch,
    /// Sub device mismatch in the response
    SubDeviceMismatch,
    /// The port does not support discovery
    PluginDiscoveryNotSupported,
    /// Discovery unique branch data was received
    DubResponse,
}

impl fmt::Display for RdmStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CompletedOk => "Completed Ok",
            Self::WasBroadcast => "Request was broadcast",
            Self::FailedToSend => "Failed to send request",
            Self::Timeout => "Response Timeout",
            Self::InvalidResponse => "Invalid Response",
            Self::UnknownUid => "The RDM device could not be found",
            Self::ChecksumIncorrect => "Incorrect checksum",
            Self::TransactionMismatch => "Transaction number mismatch",
            Self::SubDeviceMismatch => "Sub device mismatch",
            Self::PluginDiscoveryNotSupported => "The output plugin does not support DUB",
            Self::DubResponse => "DUB response",
        };
        f.write_str(text)
    }
}

/// Everything a completed RDM request hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdmReply {
    pub status_code: RdmStatusCode,
    pub response: Option<RdmResponse>,
    pub frames: Vec<RdmFrame>,
}

impl RdmReply {
    /// A reply carrying only a status code
    pub fn from_status(status_code: RdmStatusCode) -> Self {
        Self {
            status_code,
            response: None,
            frames: Vec::new(),
        }
    }

    /// A completed reply carrying the responder's answer
    pub fn with_response(response: RdmResponse) -> Self {
        Self {
            status_code: RdmStatusCode::CompletedOk,
            response: Some(response),
            frames: Vec::new(),
        }
    }

    /// A reply with raw frames attached
    pub fn with_frames(status_code: RdmStatusCode, frames: Vec<RdmFrame>) -> Self {
        Self {
            status_code,
            response: None,
            frames,
        }
    }
}

/// Completion for a single RDM request
pub type RdmCallback = Box<dyn FnOnce(RdmReply)>;

/// Completion for a discovery run, handed the UIDs found
pub type DiscoveryCallback = Box<dyn FnOnce(UidSet)>;
