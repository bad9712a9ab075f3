//! Core library surface for the partitura browser, a terminal client for a
//! sheet-music listing and recommendation API.
//!
//! The `bin` target wires these pieces together: configuration, logging, the
//! HTTP client, and the ratatui front-end. Screens only see the
//! [`SheetSource`] trait, so alternative sources plug in without touching the
//! UI.
pub mod api;
pub mod config;
pub mod download;
pub mod fetch;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod ui;

/// HTTP client and the trait screens fetch through.
pub use api::{FetchError, HttpSheetClient, SheetSource};

pub use config::{Config, DownloadTarget, Overrides};

/// Records exchanged with the API.
pub use models::{Recommendation, SheetDetail, SheetSummary};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
