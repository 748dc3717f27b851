use aya_ebpf::programs::TracePointContext;

use crate::{
    BlockEvent,
    DROP_COUNT,
    FIELD_DEV,
    FIELD_NR_SECTOR,
    FIELD_OFFSETS,
    FIELD_RWBS,
    FIELD_SECTOR,
    IO_EVENTS,
};

const SECTOR_SHIFT: u64 = 9;
const RWBS_LEN: usize = 8;

const DIR_READ: u32 = 1;
const DIR_WRITE: u32 = 0;

fn field_offset(field: u32) -> Result<usize, i64> {
    match FIELD_OFFSETS.get(field) {
        // Offset 0 is the common header, so it means "not configured".
        Some(off) if *off != 0 => Ok(*off as usize),
        _ => Err(-1),
    }
}

/// Direction from the rwbs string: first 'R' or 'W' wins, anything else
/// (flush-only, discard, ...) is not a data transfer.
fn direction(rwbs: &[u8; RWBS_LEN]) -> Option<u32> {
    for c in rwbs.iter() {
        match *c {
            b'R' => return Some(DIR_READ),
            b'W' => return Some(DIR_WRITE),
            0 => return None,
            _ => {}
        }
    }
    None
}

fn emit_event(ev: BlockEvent) {
    if let Some(mut entry) = IO_EVENTS.reserve::<BlockEvent>(0) {
        entry.write(ev);
        entry.submit(0);
    } else if let Some(count) = DROP_COUNT.get_ptr_mut(0) {
        // Ring buffer full
        unsafe { *count += 1 };
    }
}

pub fn handle_rq_complete(ctx: &TracePointContext) -> Result<u32, i64> {
    let dev = unsafe { ctx.read_at::<u32>(field_offset(FIELD_DEV)?)? };
    let sector = unsafe { ctx.read_at::<u64>(field_offset(FIELD_SECTOR)?)? };
    let nr_sector = unsafe { ctx.read_at::<u32>(field_offset(FIELD_NR_SECTOR)?)? };
    let rwbs = unsafe { ctx.read_at::<[u8; RWBS_LEN]>(field_offset(FIELD_RWBS)?)? };

    if nr_sector == 0 {
        return Ok(0);
    }
    let Some(is_read) = direction(&rwbs) else {
        return Ok(0);
    };

    emit_event(BlockEvent {
        dev,
        is_read,
        sector,
        bytes: (nr_sector as u64) << SECTOR_SHIFT,
    });

    Ok(0)
}
