use time::OffsetDateTime;

use crate::model::event::IoEvent;

pub mod classify;
pub mod filter;
pub mod interval;

pub trait Aggregator {
    type Output;

    fn on_event(&mut self, event: &IoEvent);
    fn on_dropped(&mut self, _count: u64) {}
    /// Close the current interval and start an empty one.
    fn flush(&mut self, now: OffsetDateTime) -> Self::Output;
}
