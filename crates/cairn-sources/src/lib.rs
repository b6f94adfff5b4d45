//! Forecast source adapters for Cairn
//!
//! Each provider module normalises its API response into daily
//! [`ForecastRecord`](cairn_core::ForecastRecord)s. The registry fetches all
//! enabled sources in parallel; the archive adapter supplies settled
//! observations and `mwis` scrapes shared PDF links.

pub mod archive;
pub mod daily;
pub mod error;
pub mod google;
pub mod http;
pub mod met_no;
pub mod met_office;
pub mod mwis;
pub mod open_meteo;
pub mod openweather;
pub mod registry;
pub mod retry;

pub use archive::ObservationAdapter;
pub use error::{SourceError, SourceResult};
pub use http::HttpContext;
pub use mwis::MwisCatalog;
pub use registry::{FetchOutcome, FetchReport, SourceAdapter, SourceNotes, SourceRegistry};
pub use retry::RetryConfig;
