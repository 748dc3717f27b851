use std::path::PathBuf;

use clap::Parser;
use time::UtcOffset;

use crate::{
    error::IoPatternError,
    model::{
        cli::{Backend, FirstIoPolicy, RunConfig},
        filter::FilterConfig,
    },
};

#[derive(Parser, Debug)]
#[command(
    name = "io-pattern",
    about = "Report random vs sequential block I/O per interval",
    long_about = None
)]
pub struct Cli {
    /// Only count reads
    #[arg(short = 'r', conflicts_with = "writes_only")]
    pub reads_only: bool,

    /// Only count writes
    #[arg(short = 'w')]
    pub writes_only: bool,

    /// Print a timestamp column
    #[arg(short = 'v')]
    pub timestamp: bool,

    /// Device name to match (e.g. sda)
    #[arg(short = 'd', value_name = "DEVICE")]
    pub device: Option<String>,

    /// File path to match
    #[arg(short = 'f', value_name = "FILENAME")]
    pub file: Option<String>,

    /// Mount point to match
    #[arg(short = 'm', value_name = "MOUNT_POINT")]
    pub mount: Option<String>,

    /// Classification of the first I/O seen on each device
    #[arg(long, value_enum, default_value_t = FirstIoPolicy::Random)]
    pub first_io: FirstIoPolicy,

    /// Event source (defaults to replay when --replay is given, else ebpf)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Newline-delimited JSON events to replay ("-" reads stdin)
    #[arg(long, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Seconds between reports
    #[arg(default_value_t = 1)]
    pub interval: u64,

    /// Number of reports to print before exiting
    pub count: Option<u64>,
}

impl Cli {
    pub fn into_config(self, utc_offset: UtcOffset) -> Result<RunConfig, IoPatternError> {
        if self.interval == 0 {
            return Err(IoPatternError::Configuration(
                "interval must be at least 1 second".to_string(),
            ));
        }
        if self.count == Some(0) {
            return Err(IoPatternError::Configuration(
                "count must be at least 1".to_string(),
            ));
        }
        if self.reads_only && self.writes_only {
            return Err(IoPatternError::Configuration(
                "-r and -w are mutually exclusive".to_string(),
            ));
        }

        let backend = match (self.backend, &self.replay) {
            (Some(Backend::Replay), None) => {
                return Err(IoPatternError::Configuration(
                    "the replay backend needs --replay <PATH>".to_string(),
                ));
            }
            (Some(Backend::Ebpf), Some(_)) => {
                return Err(IoPatternError::Configuration(
                    "--replay cannot be combined with --backend ebpf".to_string(),
                ));
            }
            (Some(backend), _) => backend,
            (None, Some(_)) => Backend::Replay,
            (None, None) => Backend::Ebpf,
        };

        let show_device = self.device.is_some();
        let show_file = self.file.is_some();
        let show_mount = self.mount.is_some();

        Ok(RunConfig {
            backend,
            replay: self.replay,
            filter: FilterConfig {
                device: self.device,
                file: self.file,
                mount: self.mount,
                reads_only: self.reads_only,
                writes_only: self.writes_only,
            },
            first_io: self.first_io,
            interval_secs: self.interval,
            count: self.count,
            show_timestamp: self.timestamp,
            show_device,
            show_file,
            show_mount,
            utc_offset,
        })
    }
}
