#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod search;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use engine::{BatchOutcome, BatchReport, SkipReason, run as extract, run_with_report};
pub use models::{ExtractMode, ExtractedRecord, ManualOverrides, OutputEnvelope};
