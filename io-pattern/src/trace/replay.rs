use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{Context, Result};
use crossbeam::channel::Sender;
use log::{info, warn};
use time::OffsetDateTime;

use crate::{driver::SourceMessage, model::event::IoEvent, trace::EventSource};

/// Replays newline-delimited JSON events, one per line:
///
/// ```text
/// {"device":"sda","mount":"/","file":"/var/log/syslog","read":false,"block":2048,"bytes":4096}
/// ```
///
/// `file` and `mount` are optional. Blank lines and lines starting with `#`
/// are ignored. A path of `-` reads stdin.
pub struct ReplaySource {
    path: PathBuf,
    reader: Option<Box<dyn BufRead>>,
}

impl ReplaySource {
    pub fn new(path: PathBuf) -> Self {
        Self { path, reader: None }
    }
}

/// `None` for lines that carry no event.
pub fn parse_line(line: &str) -> Option<serde_json::Result<IoEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(line))
}

impl EventSource for ReplaySource {
    fn open(&mut self) -> Result<()> {
        let reader: Box<dyn BufRead> = if self.path.as_os_str() == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(&self.path)
                .with_context(|| format!("failed to open {}", self.path.display()))?;
            Box::new(BufReader::new(file))
        };
        self.reader = Some(reader);
        Ok(())
    }

    fn run(&mut self, tx: &Sender<SourceMessage>, shutdown: &AtomicBool) -> Result<()> {
        let reader = self
            .reader
            .take()
            .context("replay source not opened or already used")?;

        let mut sent = 0_u64;
        for (idx, line) in reader.lines().enumerate() {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            let line = line.with_context(|| format!("failed to read {}", self.path.display()))?;

            let mut event = match parse_line(&line) {
                None => continue,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    warn!("skipping malformed event on line {}: {e}", idx + 1);
                    continue;
                }
            };
            event.ts = OffsetDateTime::now_utc();

            if tx.send(SourceMessage::Event(event)).is_err() {
                break;
            }
            sent += 1;
        }

        info!("replayed {sent} events from {}", self.path.display());
        Ok(())
    }
}
