use log::{debug, warn};
use time::OffsetDateTime;

use crate::{
    agg::{Aggregator, classify::DeviceOffsets, filter::accept},
    model::{
        cli::FirstIoPolicy,
        event::{Access, IoEvent},
        filter::FilterConfig,
        report::IntervalReport,
    },
};

/// Running totals for the current interval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalAccumulator {
    pub count: u64,
    pub min_size: Option<u64>,
    pub max_size: u64,
    pub random_count: u64,
    /// Events neither random nor sequential (first I/O under `exclude`).
    pub unknown_count: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub dropped: u64,
    /// Source timestamps of the earliest and latest accepted event.
    pub span: Option<(OffsetDateTime, OffsetDateTime)>,
}

impl IntervalAccumulator {
    pub fn accumulate(&mut self, event: &IoEvent, access: Access) {
        let size = event.byte_count;

        self.count += 1;
        match access {
            Access::Random => self.random_count += 1,
            Access::Unknown => self.unknown_count += 1,
            Access::Sequential => {}
        }
        if event.is_read {
            self.read_bytes += size;
        } else {
            self.write_bytes += size;
        }
        self.min_size = Some(self.min_size.map_or(size, |min| min.min(size)));
        self.max_size = self.max_size.max(size);
        self.span = Some(match self.span {
            Some((first, last)) => (first.min(event.ts), last.max(event.ts)),
            None => (event.ts, event.ts),
        });
    }

    /// Derived values use truncating integer division throughout, so the
    /// sequential share is `100 - random` rather than computed separately.
    pub fn to_report(&self, ts: OffsetDateTime) -> IntervalReport {
        let classified = self.count - self.unknown_count;
        let (percent_random, percent_sequential) = if classified > 0 {
            let random = self.random_count * 100 / classified;
            (random, 100 - random)
        } else {
            (0, 0)
        };
        let avg_size = if self.count > 0 {
            (self.read_bytes + self.write_bytes) / self.count
        } else {
            0
        };

        IntervalReport {
            ts,
            count: self.count,
            percent_random,
            percent_sequential,
            min_size: self.min_size.unwrap_or(0),
            max_size: self.max_size,
            avg_size,
            kb_read: self.read_bytes / 1024,
            kb_written: self.write_bytes / 1024,
            dropped: self.dropped,
        }
    }
}

/// Filter -> classify -> accumulate, one interval at a time.
///
/// Rejected events never reach the classifier, so device offsets only follow
/// the I/O that passes the filter.
pub struct IntervalAggregator {
    filter: FilterConfig,
    first_io: FirstIoPolicy,
    offsets: DeviceOffsets,
    current: IntervalAccumulator,
}

impl IntervalAggregator {
    pub fn new(filter: FilterConfig, first_io: FirstIoPolicy) -> Self {
        Self {
            filter,
            first_io,
            offsets: DeviceOffsets::new(),
            current: IntervalAccumulator::default(),
        }
    }

    pub fn current(&self) -> &IntervalAccumulator {
        &self.current
    }

    pub fn offsets(&self) -> &DeviceOffsets {
        &self.offsets
    }
}

impl Aggregator for IntervalAggregator {
    type Output = IntervalReport;

    fn on_event(&mut self, event: &IoEvent) {
        if !accept(event, &self.filter) {
            return;
        }
        let access = self.offsets.classify(event, self.first_io);
        self.current.accumulate(event, access);
    }

    fn on_dropped(&mut self, count: u64) {
        self.current.dropped += count;
    }

    fn flush(&mut self, now: OffsetDateTime) -> Self::Output {
        let closed = std::mem::take(&mut self.current);
        if closed.dropped > 0 {
            warn!("event source dropped {} events this interval", closed.dropped);
        }
        debug!(
            "interval closed: {} events, {} random, {} devices tracked",
            closed.count,
            closed.random_count,
            self.offsets.len()
        );
        if let Some((first, last)) = closed.span {
            debug!("interval events span {} ({first} .. {last})", last - first);
        }
        closed.to_report(now)
    }
}
