//! Briefing composition for Cairn
//!
//! Turns the latest stored forecasts and source scores into per-zone
//! briefings: the chosen forecast, activity suitability, advisories and the
//! five-section text handed to the delivery layer.

pub mod advice;
pub mod composer;
pub mod render;
pub mod suitability;

pub use advice::{Advice, Conditions};
pub use composer::{Briefing, BriefingReport, Composer, SourceSummary, Spread};
pub use render::{render_text, SECTION_TITLES};
pub use suitability::{score, score_all, Activity, Suitability};
