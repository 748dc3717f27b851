pub mod cli;
pub mod event;
pub mod filter;
pub mod report;
