use serde::Deserialize;
use time::OffsetDateTime;

/// Stand-in for attributes the source cannot observe (e.g. file paths at the
/// block layer).
pub const UNKNOWN_ATTR: &str = "<none>";

/// One completed block I/O request.
///
/// Sources adapt their native records into this struct; the replay source
/// deserializes it directly from JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IoEvent {
    #[serde(rename = "device")]
    pub device_id: String,
    #[serde(rename = "file", default = "unknown_attr")]
    pub file_path: String,
    #[serde(rename = "mount", default = "unknown_attr")]
    pub mount_point: String,
    #[serde(rename = "read")]
    pub is_read: bool,
    /// Starting position in 512-byte sectors.
    #[serde(rename = "block")]
    pub start_block: u64,
    #[serde(rename = "bytes")]
    pub byte_count: u64,
    /// Completion time, stamped by the source on arrival. Reports carry the
    /// flush time instead; this only bounds the per-interval event span.
    #[serde(skip, default = "OffsetDateTime::now_utc")]
    pub ts: OffsetDateTime,
}

fn unknown_attr() -> String {
    UNKNOWN_ATTR.to_string()
}

impl IoEvent {
    pub fn new(
        device_id: impl Into<String>,
        is_read: bool,
        start_block: u64,
        byte_count: u64,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            file_path: unknown_attr(),
            mount_point: unknown_attr(),
            is_read,
            start_block,
            byte_count,
            ts: OffsetDateTime::now_utc(),
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn with_mount(mut self, mount_point: impl Into<String>) -> Self {
        self.mount_point = mount_point.into();
        self
    }
}

/// Outcome of comparing an event against the previous access on its device.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Access {
    Sequential,
    Random,
    /// First event of a device under the `exclude` first-I/O policy.
    Unknown,
}

impl Access {
    pub fn is_random(self) -> bool {
        self == Access::Random
    }
}
