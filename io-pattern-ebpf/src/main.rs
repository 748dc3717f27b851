#![no_std]
#![no_main]

mod helpers;

use aya_ebpf::{
    macros::{map, tracepoint},
    maps::{Array, RingBuf},
    programs::TracePointContext,
};

use crate::helpers::handle_rq_complete;

// Slots of FIELD_OFFSETS, filled by userspace from the tracepoint format file.
pub const FIELD_DEV: u32 = 0;
pub const FIELD_SECTOR: u32 = 1;
pub const FIELD_NR_SECTOR: u32 = 2;
pub const FIELD_RWBS: u32 = 3;
const FIELD_COUNT: u32 = 4;

// Must match BlockEvent in io-pattern/src/trace/ebpf.rs
#[repr(C)]
pub struct BlockEvent {
    pub dev: u32,
    pub is_read: u32,
    pub sector: u64,
    pub bytes: u64,
}

#[map(name = "IO_EVENTS")]
pub static IO_EVENTS: RingBuf = RingBuf::with_byte_size(256 * 1024, 0);

#[map(name = "DROP_COUNT")]
pub static DROP_COUNT: Array<u64> = Array::with_max_entries(1, 0);

#[map(name = "FIELD_OFFSETS")]
pub static FIELD_OFFSETS: Array<u32> = Array::with_max_entries(FIELD_COUNT, 0);

#[tracepoint(category = "block", name = "block_rq_complete")]
pub fn block_rq_complete(ctx: TracePointContext) -> u32 {
    match handle_rq_complete(&ctx) {
        Ok(v) => v,
        Err(_) => 0,
    }
}

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}
