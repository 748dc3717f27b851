use time::OffsetDateTime;

/// Derived statistics for one closed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalReport {
    pub ts: OffsetDateTime,
    pub count: u64,
    pub percent_random: u64,
    pub percent_sequential: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub avg_size: u64,
    pub kb_read: u64,
    pub kb_written: u64,
    /// Events the source reported as lost during the interval.
    pub dropped: u64,
}
