//! Ratatui front-end: a navigation stack of listing and detail screens plus
//! the terminal loop that drives it.

mod app;
mod dialogs;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
