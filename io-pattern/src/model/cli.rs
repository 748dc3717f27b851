use std::path::PathBuf;

use clap::ValueEnum;
use time::UtcOffset;

use crate::model::filter::FilterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// block:block_rq_complete tracepoint (needs the `ebpf` feature and root)
    Ebpf,
    /// Newline-delimited JSON events from a file or stdin
    Replay,
}

/// How the first event seen on a device is classified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum FirstIoPolicy {
    /// Compare against offset 0: sequential only if it starts at byte 0
    Compat,
    /// Always random
    #[default]
    Random,
    /// Counted, but neither random nor sequential
    Exclude,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub backend: Backend,
    pub replay: Option<PathBuf>,
    pub filter: FilterConfig,
    pub first_io: FirstIoPolicy,
    pub interval_secs: u64,
    /// Reports left before exiting; `None` runs until interrupted.
    pub count: Option<u64>,
    pub show_timestamp: bool,
    pub show_device: bool,
    pub show_file: bool,
    pub show_mount: bool,
    /// Resolved once at startup, before any thread is spawned.
    pub utc_offset: UtcOffset,
}
