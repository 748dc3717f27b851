//! Classifies block I/O completions as random or sequential and reports
//! per-interval statistics.

pub mod agg;
pub mod cli;
pub mod driver;
pub mod error;
pub mod model;
pub mod trace;
pub mod ui;
