/// Inclusion criteria, fixed at startup. Criteria are OR-ed together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub device: Option<String>,
    pub file: Option<String>,
    pub mount: Option<String>,
    pub reads_only: bool,
    pub writes_only: bool,
}

impl FilterConfig {
    pub fn is_enabled(&self) -> bool {
        self.device.is_some()
            || self.file.is_some()
            || self.mount.is_some()
            || self.reads_only
            || self.writes_only
    }
}
