use std::fmt;

use time::{
    OffsetDateTime,
    format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::model::{cli::RunConfig, report::IntervalReport};

/// Report lines between repeated headers.
pub const HEADER_EVERY: i64 = 20;

const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year] [month repr:short] [day padding:space] [hour]:[minute]:[second]"
);

const TIME_WIDTH: usize = 20;
const DEVICE_WIDTH: usize = 12;
const MOUNT_WIDTH: usize = 16;
const FILE_WIDTH: usize = 28;

/// Which columns a run prints. Fixed for the lifetime of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportLayout {
    pub timestamp: bool,
    pub device: Option<String>,
    pub mount: Option<String>,
    pub file: Option<String>,
    pub kb_read: bool,
    pub kb_written: bool,
}

impl ReportLayout {
    pub fn from_config(config: &RunConfig) -> Self {
        let filter = &config.filter;
        Self {
            timestamp: config.show_timestamp,
            device: filter.device.clone().filter(|_| config.show_device),
            mount: filter.mount.clone().filter(|_| config.show_mount),
            file: filter.file.clone().filter(|_| config.show_file),
            kb_read: !filter.writes_only,
            kb_written: !filter.reads_only,
        }
    }
}

/// Formats interval reports, repeating the header every [`HEADER_EVERY`] lines.
pub struct Reporter {
    layout: ReportLayout,
    lines_left: i64,
}

impl Reporter {
    pub fn new(layout: ReportLayout) -> Self {
        Self {
            layout,
            lines_left: 0,
        }
    }

    pub fn layout(&self) -> &ReportLayout {
        &self.layout
    }

    /// Header (when due) followed by the report line, newline terminated.
    pub fn render(&mut self, report: &IntervalReport) -> String {
        let mut out = String::new();
        self.write(&mut out, report).unwrap();
        out
    }

    pub fn write<W: fmt::Write>(&mut self, out: &mut W, report: &IntervalReport) -> fmt::Result {
        if self.lines_left <= 0 {
            write_header(out, &self.layout)?;
            self.lines_left = HEADER_EVERY;
        }
        write_line(out, &self.layout, report)?;
        self.lines_left -= 1;
        Ok(())
    }
}

fn write_header<W: fmt::Write>(out: &mut W, layout: &ReportLayout) -> fmt::Result {
    if layout.timestamp {
        write!(out, "{:<TIME_WIDTH$} ", "TIME")?;
    }
    if layout.device.is_some() {
        write!(out, "{:<DEVICE_WIDTH$} ", "DEVICE")?;
    }
    if layout.mount.is_some() {
        write!(out, "{:<MOUNT_WIDTH$} ", "MOUNT")?;
    }
    if layout.file.is_some() {
        write!(out, "{:<FILE_WIDTH$} ", "FILE")?;
    }
    write!(
        out,
        "{:>5} {:>5} {:>8} {:>7} {:>7} {:>7}",
        "%RAN", "%SEQ", "COUNT", "MIN", "MAX", "AVG"
    )?;
    if layout.kb_read {
        write!(out, " {:>8}", "KR")?;
    }
    if layout.kb_written {
        write!(out, " {:>8}", "KW")?;
    }
    writeln!(out)
}

fn write_line<W: fmt::Write>(
    out: &mut W,
    layout: &ReportLayout,
    report: &IntervalReport,
) -> fmt::Result {
    if layout.timestamp {
        write!(out, "{:<TIME_WIDTH$} ", format_time(report.ts))?;
    }
    if let Some(device) = &layout.device {
        write!(out, "{:<DEVICE_WIDTH$} ", truncate(device, DEVICE_WIDTH))?;
    }
    if let Some(mount) = &layout.mount {
        write!(out, "{:<MOUNT_WIDTH$} ", truncate(mount, MOUNT_WIDTH))?;
    }
    if let Some(file) = &layout.file {
        write!(out, "{:<FILE_WIDTH$} ", truncate(file, FILE_WIDTH))?;
    }
    write!(
        out,
        "{:>5} {:>5} {:>8} {:>7} {:>7} {:>7}",
        report.percent_random,
        report.percent_sequential,
        report.count,
        report.min_size,
        report.max_size,
        report.avg_size
    )?;
    if layout.kb_read {
        write!(out, " {:>8}", report.kb_read)?;
    }
    if layout.kb_written {
        write!(out, " {:>8}", report.kb_written)?;
    }
    writeln!(out)
}

fn format_time(ts: OffsetDateTime) -> String {
    ts.format(TIME_FORMAT)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Keeps the tail of long values; the end of a path is the informative part.
fn truncate(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        s.to_string()
    } else if max > 3 {
        let tail: String = s.chars().skip(len - (max - 3)).collect();
        format!("...{tail}")
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn report(count: u64) -> IntervalReport {
        IntervalReport {
            ts: datetime!(2024-03-05 09:07:01 UTC),
            count,
            percent_random: 33,
            percent_sequential: 67,
            min_size: 512,
            max_size: 512,
            avg_size: 512,
            kb_read: 1,
            kb_written: 0,
            dropped: 0,
        }
    }

    fn unfiltered() -> ReportLayout {
        ReportLayout {
            kb_read: true,
            kb_written: true,
            ..Default::default()
        }
    }

    #[test]
    fn first_render_includes_header() {
        let mut reporter = Reporter::new(unfiltered());
        let out = reporter.render(&report(3));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            " %RAN  %SEQ    COUNT     MIN     MAX     AVG       KR       KW"
        );
        assert_eq!(
            lines[1],
            "   33    67        3     512     512     512        1        0"
        );
    }

    #[test]
    fn header_repeats_every_twenty_lines() {
        let mut reporter = Reporter::new(unfiltered());
        let mut out = String::new();
        for _ in 0..45 {
            reporter.write(&mut out, &report(1)).unwrap();
        }
        let headers: Vec<usize> = out
            .lines()
            .enumerate()
            .filter(|(_, l)| l.contains("%RAN"))
            .map(|(i, _)| i)
            .collect();
        // header + 20 lines, header + 20 lines, header + 5 lines
        assert_eq!(headers, vec![0, 21, 42]);
        assert_eq!(out.lines().count(), 48);
    }

    #[test]
    fn direction_filters_pick_kb_columns() {
        let reads = ReportLayout {
            kb_read: true,
            ..Default::default()
        };
        let out = Reporter::new(reads).render(&report(1));
        assert!(out.contains("KR"));
        assert!(!out.contains("KW"));

        let writes = ReportLayout {
            kb_written: true,
            ..Default::default()
        };
        let out = Reporter::new(writes).render(&report(1));
        assert!(!out.contains("KR"));
        assert!(out.contains("KW"));
    }

    #[test]
    fn leading_columns() {
        let layout = ReportLayout {
            timestamp: true,
            device: Some("sda".to_string()),
            mount: Some("/".to_string()),
            file: Some("/var/lib/postgresql/data/base/16384/2619".to_string()),
            kb_read: true,
            kb_written: true,
        };
        let out = Reporter::new(layout).render(&report(3));
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("TIME                 DEVICE       MOUNT            FILE"));
        assert!(lines[1].starts_with("2024 Mar  5 09:07:01 sda          /                ..."));
        assert!(lines[1].contains("base/16384/2619"));
    }

    #[test]
    fn truncate_keeps_tail() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("/a/very/long/path", 10), "...ng/path");
    }
}
