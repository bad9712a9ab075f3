//! Client side of the partituras HTTP API, split across logical submodules.

mod client;
mod error;

pub use client::{HttpSheetClient, SheetSource};
pub use error::FetchError;
