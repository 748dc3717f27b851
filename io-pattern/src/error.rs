use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoPatternError {
    /// Invalid or conflicting options; reported with usage before tracing starts.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The event source could not be attached or opened. Never retried.
    #[error("event source unavailable: {0}")]
    EventSourceUnavailable(String),
}
