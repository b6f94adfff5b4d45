//! Cairn: mountain forecast aggregation with self-benchmarking sources.
//!
//! The binary calls [`produce_briefing`] once per scheduled run and prints
//! the rendered report.

pub mod error;
pub mod run;

pub use error::RunError;
pub use run::produce_briefing;
