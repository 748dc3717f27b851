use std::{io::Write, time::Instant};

use anyhow::{Context, Result};
use crossbeam::channel::{Receiver, never, select};
use log::{debug, info};
use time::{OffsetDateTime, UtcOffset};

use crate::{
    agg::Aggregator,
    error::IoPatternError,
    model::{event::IoEvent, report::IntervalReport},
    ui::report::Reporter,
};

/// What an event source pushes to the consumer.
#[derive(Debug)]
pub enum SourceMessage {
    Event(IoEvent),
    Dropped(u64),
    /// The source stopped on an error after it was attached.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Waiting,
    Report { last: bool },
}

/// Seconds-to-next-report and reports-remaining counters.
#[derive(Debug, Clone)]
pub struct Schedule {
    interval_secs: u64,
    seconds_until_report: u64,
    remaining: Option<u64>,
}

impl Schedule {
    pub fn new(interval_secs: u64, count: Option<u64>) -> Self {
        let interval_secs = interval_secs.max(1);
        Self {
            interval_secs,
            seconds_until_report: interval_secs,
            remaining: count,
        }
    }

    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Advance by one second.
    pub fn tick(&mut self) -> TickOutcome {
        self.seconds_until_report = self.seconds_until_report.saturating_sub(1);
        if self.seconds_until_report > 0 {
            return TickOutcome::Waiting;
        }
        self.seconds_until_report = self.interval_secs;

        let last = match self.remaining.as_mut() {
            Some(n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => false,
        };
        TickOutcome::Report { last }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// All requested reports were printed.
    Finished,
    Interrupted,
}

/// Single consumer for events and clock ticks. Owns the aggregator, so
/// accumulation and flush never overlap.
pub struct Driver<A> {
    agg: A,
    reporter: Reporter,
    schedule: Schedule,
    utc_offset: UtcOffset,
}

impl<A> Driver<A>
where
    A: Aggregator<Output = IntervalReport>,
{
    pub fn new(agg: A, reporter: Reporter, schedule: Schedule, utc_offset: UtcOffset) -> Self {
        Self {
            agg,
            reporter,
            schedule,
            utc_offset,
        }
    }

    pub fn aggregator(&self) -> &A {
        &self.agg
    }

    pub fn handle(&mut self, msg: SourceMessage) -> Result<()> {
        match msg {
            SourceMessage::Event(ev) => self.agg.on_event(&ev),
            SourceMessage::Dropped(n) => self.agg.on_dropped(n),
            SourceMessage::Failed(reason) => {
                return Err(IoPatternError::EventSourceUnavailable(reason).into());
            }
        }
        Ok(())
    }

    /// One second elapsed. Prints a report when the interval closes and
    /// returns `Some(Stop::Finished)` after the last one.
    pub fn on_tick<W: Write>(&mut self, out: &mut W) -> Result<Option<Stop>> {
        let last = match self.schedule.tick() {
            TickOutcome::Waiting => return Ok(None),
            TickOutcome::Report { last } => last,
        };

        let now = OffsetDateTime::now_utc().to_offset(self.utc_offset);
        let report = self.agg.flush(now);
        let text = self.reporter.render(&report);
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .context("failed to write report")?;

        Ok(last.then_some(Stop::Finished))
    }

    /// Runs until the report count is exhausted, `stop` fires, or the source
    /// fails. A partial interval is never printed.
    pub fn run<W: Write>(
        &mut self,
        events: &Receiver<SourceMessage>,
        ticks: &Receiver<Instant>,
        stop: &Receiver<()>,
        out: &mut W,
    ) -> Result<Stop> {
        let mut events = events.clone();

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(msg) => self.handle(msg)?,
                    Err(_) => {
                        info!("event source finished");
                        events = never();
                    }
                },
                recv(ticks) -> _ => {
                    // Only what was queued when the tick fired belongs to the
                    // closing interval; a busy source must not hold off the report.
                    let pending = events.len();
                    for msg in events.try_iter().take(pending) {
                        self.handle(msg)?;
                    }
                    if let Some(stop) = self.on_tick(out)? {
                        return Ok(stop);
                    }
                },
                recv(stop) -> _ => {
                    debug!("interrupted, discarding partial interval");
                    return Ok(Stop::Interrupted);
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use crossbeam::channel::{bounded, unbounded};

    use super::*;
    use crate::{
        agg::interval::IntervalAggregator,
        model::{cli::FirstIoPolicy, filter::FilterConfig},
        ui::report::ReportLayout,
    };

    fn driver(interval: u64, count: Option<u64>) -> Driver<IntervalAggregator> {
        Driver::new(
            IntervalAggregator::new(FilterConfig::default(), FirstIoPolicy::Random),
            Reporter::new(ReportLayout {
                kb_read: true,
                kb_written: true,
                ..Default::default()
            }),
            Schedule::new(interval, count),
            UtcOffset::UTC,
        )
    }

    fn report_lines(out: &[u8]) -> Vec<String> {
        String::from_utf8_lossy(out)
            .lines()
            .filter(|l| !l.contains("%RAN"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn schedule_counts_down_interval_then_reports() {
        let mut s = Schedule::new(3, Some(2));
        assert_eq!(s.tick(), TickOutcome::Waiting);
        assert_eq!(s.tick(), TickOutcome::Waiting);
        assert_eq!(s.tick(), TickOutcome::Report { last: false });
        assert_eq!(s.remaining(), Some(1));
        assert_eq!(s.tick(), TickOutcome::Waiting);
        assert_eq!(s.tick(), TickOutcome::Waiting);
        assert_eq!(s.tick(), TickOutcome::Report { last: true });
    }

    #[test]
    fn unbounded_schedule_never_finishes() {
        let mut s = Schedule::new(1, None);
        for _ in 0..100 {
            assert_eq!(s.tick(), TickOutcome::Report { last: false });
        }
    }

    #[test]
    fn three_reports_then_finished() {
        let mut d = driver(1, Some(3));
        let (ev_tx, ev_rx) = unbounded();
        let (tick_tx, tick_rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);

        for block in 0..3 {
            ev_tx
                .send(SourceMessage::Event(IoEvent::new("sda", true, block, 512)))
                .unwrap();
        }
        for _ in 0..5 {
            tick_tx.send(Instant::now()).unwrap();
        }

        let mut out = Vec::new();
        let stop = d.run(&ev_rx, &tick_rx, &stop_rx, &mut out).unwrap();
        assert_eq!(stop, Stop::Finished);

        let lines = report_lines(&out);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("   33    67        3     512     512     512"));
        assert!(lines[1].starts_with("    0     0        0       0       0       0"));
        // Two ticks were never consumed.
        assert_eq!(tick_rx.len(), 2);
    }

    #[test]
    fn interrupt_discards_partial_interval() {
        let mut d = driver(10, None);
        let (ev_tx, ev_rx) = unbounded();
        let (_tick_tx, tick_rx) = unbounded::<Instant>();
        let (stop_tx, stop_rx) = bounded(1);

        ev_tx
            .send(SourceMessage::Event(IoEvent::new("sda", false, 0, 4096)))
            .unwrap();
        stop_tx.send(()).unwrap();

        let mut out = Vec::new();
        let stop = d.run(&ev_rx, &tick_rx, &stop_rx, &mut out).unwrap();
        assert_eq!(stop, Stop::Interrupted);
        assert!(out.is_empty());
    }

    #[test]
    fn source_exhaustion_keeps_ticking() {
        let mut d = driver(1, Some(2));
        let (ev_tx, ev_rx) = unbounded();
        let (tick_tx, tick_rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);

        ev_tx
            .send(SourceMessage::Event(IoEvent::new("sda", true, 0, 1024)))
            .unwrap();
        drop(ev_tx);
        tick_tx.send(Instant::now()).unwrap();
        tick_tx.send(Instant::now()).unwrap();

        let mut out = Vec::new();
        let stop = d.run(&ev_rx, &tick_rx, &stop_rx, &mut out).unwrap();
        assert_eq!(stop, Stop::Finished);
        let lines = report_lines(&out);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn source_failure_is_fatal() {
        let mut d = driver(1, None);
        let (ev_tx, ev_rx) = unbounded();
        let (_tick_tx, tick_rx) = unbounded::<Instant>();
        let (_stop_tx, stop_rx) = bounded::<()>(1);

        ev_tx
            .send(SourceMessage::Failed("ring buffer vanished".to_string()))
            .unwrap();

        let err = d
            .run(&ev_rx, &tick_rx, &stop_rx, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IoPatternError>(),
            Some(IoPatternError::EventSourceUnavailable(_))
        ));
    }

    #[test]
    fn dropped_events_reach_the_report() {
        let mut d = driver(1, None);
        d.handle(SourceMessage::Dropped(4)).unwrap();
        assert_eq!(d.aggregator().current().dropped, 4);
        let mut out = Vec::new();
        assert_eq!(d.on_tick(&mut out).unwrap(), None);
        assert_eq!(d.aggregator().current().dropped, 0);
    }

    #[test]
    fn busy_source_does_not_hold_off_the_report() {
        let (ev_tx, ev_rx) = bounded(1024);
        let (tick_tx, tick_rx) = unbounded();
        let (_stop_tx, stop_rx) = bounded::<()>(1);

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let tx = ev_tx.clone();
                thread::spawn(move || {
                    let mut block = 0;
                    while tx
                        .send(SourceMessage::Event(IoEvent::new("sda", true, block, 512)))
                        .is_ok()
                    {
                        block += 1;
                    }
                })
            })
            .collect();
        drop(ev_tx);
        tick_tx.send(Instant::now()).unwrap();

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let mut d = driver(1, Some(1));
            let mut out = Vec::new();
            let stop = d
                .run(&ev_rx, &tick_rx, &stop_rx, &mut out)
                .map_err(|e| e.to_string());
            let _ = done_tx.send((stop, out));
        });

        let (stop, out) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("driver never reported");
        assert_eq!(stop.unwrap(), Stop::Finished);
        assert_eq!(report_lines(&out).len(), 1);

        // The driver's receivers are gone, so every producer's send fails.
        for p in producers {
            p.join().unwrap();
        }
    }
}
