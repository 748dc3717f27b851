use std::{
    fs::read_to_string,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use anyhow::{Context, Result, anyhow, bail};
use aya::{
    Ebpf,
    EbpfLoader,
    include_bytes_aligned,
    maps::{Array, MapData, RingBuf},
    programs::TracePoint,
};
use crossbeam::channel::Sender;
use log::{debug, info};
use nix::unistd::Uid;
use time::OffsetDateTime;

use crate::{
    driver::SourceMessage,
    model::event::{IoEvent, UNKNOWN_ATTR},
    trace::{
        EventSource,
        device::DeviceTable,
        format::{BlockRqOffsets, TracepointFormat},
    },
};

static BPF_OBJECT: &[u8] = include_bytes_aligned!(env!("IO_PATTERN_EBPF_PATH"));

const TRACEPOINT_CATEGORY: &str = "block";
const TRACEPOINT_NAME: &str = "block_rq_complete";

const FORMAT_PATHS: &[&str] = &[
    "/sys/kernel/tracing/events/block/block_rq_complete/format",
    "/sys/kernel/debug/tracing/events/block/block_rq_complete/format",
];

const IDLE_SLEEP: Duration = Duration::from_millis(1);

// Must match BlockEvent in io-pattern-ebpf
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct BlockEvent {
    pub dev: u32,
    pub is_read: u32,
    pub sector: u64,
    pub bytes: u64,
}

#[derive(Default)]
pub struct EbpfSource {
    // Keeps the attached program alive.
    _bpf: Option<Ebpf>,
    ring: Option<RingBuf<MapData>>,
    drops: Option<Array<MapData, u64>>,
    devices: DeviceTable,
}

impl EbpfSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_io_event(&mut self, ev: &BlockEvent) -> IoEvent {
        let info = self.devices.resolve(ev.dev, ev.sector);
        IoEvent {
            device_id: info.name,
            file_path: UNKNOWN_ATTR.to_string(),
            mount_point: info.mount_point,
            is_read: ev.is_read != 0,
            start_block: ev.sector,
            byte_count: ev.bytes,
            ts: OffsetDateTime::now_utc(),
        }
    }
}

fn read_block_rq_offsets() -> Result<BlockRqOffsets> {
    let content = FORMAT_PATHS
        .iter()
        .find_map(|path| read_to_string(path).ok())
        .ok_or_else(|| {
            anyhow!("cannot read {TRACEPOINT_CATEGORY}:{TRACEPOINT_NAME} format; is tracefs mounted?")
        })?;
    BlockRqOffsets::from_format(&TracepointFormat::parse(&content))
}

fn configure_ebpf(
    bpf: &mut Ebpf,
    offsets: BlockRqOffsets,
) -> Result<(RingBuf<MapData>, Array<MapData, u64>)> {
    {
        let map = bpf
            .map_mut("FIELD_OFFSETS")
            .ok_or_else(|| anyhow!("BPF map FIELD_OFFSETS not found"))?;
        let mut arr: Array<_, u32> = Array::try_from(map)?;
        for (slot, offset) in offsets.as_slots().into_iter().enumerate() {
            arr.set(slot as u32, offset, 0)
                .context("failed to set FIELD_OFFSETS")?;
        }
    }

    let prog = bpf
        .program_mut(TRACEPOINT_NAME)
        .ok_or_else(|| anyhow!("BPF program {} not found", TRACEPOINT_NAME))?;
    let prog: &mut TracePoint = prog.try_into()?;
    prog.load()?;
    prog.attach(TRACEPOINT_CATEGORY, TRACEPOINT_NAME)
        .with_context(|| format!("attach {TRACEPOINT_CATEGORY}:{TRACEPOINT_NAME}"))?;

    let io_map = bpf
        .take_map("IO_EVENTS")
        .ok_or_else(|| anyhow!("BPF map IO_EVENTS not found"))?;
    let ring = RingBuf::try_from(io_map)?;

    let drop_map = bpf
        .take_map("DROP_COUNT")
        .ok_or_else(|| anyhow!("BPF map DROP_COUNT not found"))?;
    let drops: Array<_, u64> = Array::try_from(drop_map)?;

    Ok((ring, drops))
}

impl EventSource for EbpfSource {
    fn open(&mut self) -> Result<()> {
        if !Uid::effective().is_root() {
            bail!("attaching to {TRACEPOINT_CATEGORY}:{TRACEPOINT_NAME} requires root");
        }

        let offsets = read_block_rq_offsets()?;
        debug!("{TRACEPOINT_NAME} field offsets: {offsets:?}");

        let mut bpf = EbpfLoader::new()
            .load(BPF_OBJECT)
            .context("failed to load BPF object")?;
        let (ring, drops) = configure_ebpf(&mut bpf, offsets)?;

        self._bpf = Some(bpf);
        self.ring = Some(ring);
        self.drops = Some(drops);
        info!("attached to {TRACEPOINT_CATEGORY}:{TRACEPOINT_NAME}");
        Ok(())
    }

    fn run(&mut self, tx: &Sender<SourceMessage>, shutdown: &AtomicBool) -> Result<()> {
        let mut ring = self
            .ring
            .take()
            .context("BPF ring buffer already used or not initialized")?;
        let drops = self
            .drops
            .take()
            .context("BPF drop counter already used or not initialized")?;

        let mut last_dropped = 0_u64;

        while !shutdown.load(Ordering::Relaxed) {
            let mut got_events = false;

            while let Some(item) = ring.next() {
                got_events = true;
                if item.len() < std::mem::size_of::<BlockEvent>() {
                    continue;
                }
                let raw: BlockEvent =
                    unsafe { std::ptr::read_unaligned(item.as_ptr() as *const BlockEvent) };
                drop(item);

                let ev = self.to_io_event(&raw);
                if tx.send(SourceMessage::Event(ev)).is_err() {
                    return Ok(());
                }
            }

            let current_drops = drops.get(&0, 0)?;
            if current_drops != last_dropped {
                let delta = current_drops.wrapping_sub(last_dropped);
                last_dropped = current_drops;
                if tx.send(SourceMessage::Dropped(delta)).is_err() {
                    return Ok(());
                }
            }

            if !got_events {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        Ok(())
    }
}
