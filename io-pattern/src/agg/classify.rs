use std::collections::HashMap;

use crate::model::{
    cli::FirstIoPolicy,
    event::{Access, IoEvent},
};

/// Block numbers from the source are always in 512-byte sectors.
pub const SECTOR_SIZE: u64 = 512;

/// Last end offset (in bytes) per device. Entries are created on first use
/// and live for the whole run.
#[derive(Debug, Default)]
pub struct DeviceOffsets {
    last_end: HashMap<String, u64>,
}

impl DeviceOffsets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_end(&self, device: &str) -> Option<u64> {
        self.last_end.get(device).copied()
    }

    pub fn len(&self) -> usize {
        self.last_end.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_end.is_empty()
    }

    /// Classify `event` against the previous access on its device, then
    /// record where this one ended.
    pub fn classify(&mut self, event: &IoEvent, policy: FirstIoPolicy) -> Access {
        let start = event.start_block.saturating_mul(SECTOR_SIZE);
        let end = start.saturating_add(event.byte_count);

        let previous = match self.last_end.get_mut(&event.device_id) {
            Some(last) => Some(std::mem::replace(last, end)),
            None => {
                self.last_end.insert(event.device_id.clone(), end);
                None
            }
        };

        match (previous, policy) {
            (Some(prev), _) if prev == start => Access::Sequential,
            (Some(_), _) => Access::Random,
            (None, FirstIoPolicy::Compat) if start == 0 => Access::Sequential,
            (None, FirstIoPolicy::Compat) | (None, FirstIoPolicy::Random) => Access::Random,
            (None, FirstIoPolicy::Exclude) => Access::Unknown,
        }
    }
}
