//! Priority merge of input port and client sources
//!
//! One linear scan finds the highest priority among live sources and the
//! sources sitting at it. A strictly higher priority restarts the set. The
//! source that triggered the merge only gets to touch the output if it made
//! it into that set; otherwise a lower priority source could overwrite data
//! from a higher one simply by updating later.

use std::time::Instant;

use crate::dmx::{DmxBuffer, DmxSource, SOURCE_PRIORITY_MIN};
use crate::owner::OwnerId;

use super::MergeMode;

/// Which source a merge candidate came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SourceKey {
    Port(OwnerId),
    Client(OwnerId),
}

/// What a merge did to the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MergeOutcome {
    /// Nothing is live
    NoActiveSources,
    /// The triggering source is below the active priority
    Outranked,
    /// LTP tie and another tied source is newer
    Superseded,
    /// The output was rewritten
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MergeResult {
    pub active_priority: u8,
    pub outcome: MergeOutcome,
}

impl MergeResult {
    pub fn changed(&self) -> bool {
        self.outcome == MergeOutcome::Updated
    }
}

/// Merge `sources` into `output`
///
/// `output` is only written when the outcome is [`MergeOutcome::Updated`].
pub(crate) fn merge_sources<I>(
    sources: I,
    changed: &SourceKey,
    mode: MergeMode,
    now: Instant,
    output: &mut DmxBuffer,
) -> MergeResult
where
    I: IntoIterator<Item = (SourceKey, DmxSource)>,
{
    let mut active_priority = SOURCE_PRIORITY_MIN;
    let mut active: Vec<DmxSource> = Vec::new();
    let mut changed_index = None;

    for (key, source) in sources {
        if !source.is_set() || !source.is_active(now) || source.data().is_empty() {
            continue;
        }

        if source.priority() > active_priority {
            changed_index = None;
            active.clear();
            active_priority = source.priority();
        }

        if source.priority() == active_priority {
            if key == *changed {
                changed_index = Some(active.len());
            }
            active.push(source);
        }
    }

    let outcome = if active.is_empty() {
        MergeOutcome::NoActiveSources
    } else if let Some(index) = changed_index {
        if active.len() == 1 {
            output.set(active[0].data());
            MergeOutcome::Updated
        } else {
            match mode {
                MergeMode::Ltp => {
                    let latest = active[index].timestamp();
                    if active.iter().any(|source| source.timestamp() > latest) {
                        MergeOutcome::Superseded
                    } else {
                        output.set(active[index].data());
                        MergeOutcome::Updated
                    }
                }
                MergeMode::Htp => {
                    output.reset();
                    for source in &active {
                        output.htp_merge(source.data());
                    }
                    MergeOutcome::Updated
                }
            }
        }
    } else {
        MergeOutcome::Outranked
    };

    MergeResult {
        active_priority,
        outcome,
    }
}
