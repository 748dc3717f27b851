pub mod device;
#[cfg(feature = "ebpf")]
pub mod ebpf;
pub mod format;
pub mod replay;

use std::{
    path::PathBuf,
    sync::{Arc, atomic::AtomicBool},
    thread::{self, JoinHandle},
};

use anyhow::{Context, Result};
use crossbeam::channel::{Sender, bounded};
use log::{error, info, warn};

use crate::{
    driver::SourceMessage,
    error::IoPatternError,
    model::cli::{Backend, RunConfig},
};

pub trait EventSource {
    /// Attach to the underlying facility. Failures here are fatal.
    fn open(&mut self) -> Result<()>;

    /// Push events into `tx` until the source is exhausted, the receiver is
    /// gone, or `shutdown` is raised.
    fn run(&mut self, tx: &Sender<SourceMessage>, shutdown: &AtomicBool) -> Result<()>;
}

pub fn build_source(backend: Backend, replay: Option<PathBuf>) -> Result<Box<dyn EventSource>> {
    match backend {
        Backend::Replay => {
            let path = replay.ok_or_else(|| {
                IoPatternError::Configuration("the replay backend needs --replay <PATH>".into())
            })?;
            Ok(Box::new(replay::ReplaySource::new(path)))
        }
        #[cfg(feature = "ebpf")]
        Backend::Ebpf => Ok(Box::new(ebpf::EbpfSource::new())),
        #[cfg(not(feature = "ebpf"))]
        Backend::Ebpf => Err(IoPatternError::EventSourceUnavailable(
            "built without the `ebpf` feature; use --replay".into(),
        )
        .into()),
    }
}

/// Builds and opens the configured source on its own thread, returning once
/// it is attached. Open failures come back as `EventSourceUnavailable`.
pub fn spawn_source(
    config: &RunConfig,
    tx: Sender<SourceMessage>,
    shutdown: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    if config.backend == Backend::Ebpf && config.filter.file.is_some() {
        warn!("file paths are not visible at the block layer; -f will match nothing");
    }

    let (ready_tx, ready_rx) = bounded::<Result<(), String>>(1);
    let backend = config.backend;
    let replay = config.replay.clone();

    let handle = thread::Builder::new()
        .name("io-source".into())
        .spawn(move || {
            let opened = build_source(backend, replay).and_then(|mut source| {
                source.open()?;
                Ok(source)
            });
            let mut source = match opened {
                Ok(source) => {
                    let _ = ready_tx.send(Ok(()));
                    source
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("{e:#}")));
                    return;
                }
            };

            info!("{backend:?} source attached");
            if let Err(e) = source.run(&tx, &shutdown) {
                error!("event source stopped: {e:#}");
                let _ = tx.send(SourceMessage::Failed(format!("{e:#}")));
            }
        })
        .context("failed to spawn event source thread")?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(reason)) => Err(IoPatternError::EventSourceUnavailable(reason).into()),
        Err(_) => Err(IoPatternError::EventSourceUnavailable(
            "source thread exited before attaching".into(),
        )
        .into()),
    }
}
