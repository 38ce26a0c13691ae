//! DMX512 data model
//!
//! A [`DmxBuffer`] holds up to 512 slot values. A [`DmxSource`] wraps the
//! buffer one input port or network client last sent, together with the time
//! it arrived and the priority it was sent at. Universes merge sources by
//! priority first, then by merge mode (see [`crate::universe`]).
//!
//! ```rust
//! use lumen_core::dmx::{DmxBuffer, DmxSource, SOURCE_PRIORITY_DEFAULT};
//! use std::time::Instant;
//!
//! let mut merged: DmxBuffer = "1,0,0,10".parse().unwrap();
//! merged.htp_merge(&"0,255,0,5,6,7".parse().unwrap());
//! assert_eq!(merged.to_string(), "1,255,0,10,6,7");
//!
//! let source = DmxSource::new(merged, Instant::now(), SOURCE_PRIORITY_DEFAULT);
//! assert!(source.is_set());
//! ```

pub mod buffer;
pub mod source;

pub use buffer::{DmxBuffer, DMX_UNIVERSE_SIZE};
pub use source::{DmxSource, SOURCE_PRIORITY_DEFAULT, SOURCE_PRIORITY_MAX, SOURCE_PRIORITY_MIN};
