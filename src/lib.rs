pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod state;
pub mod ui;

pub use error::{CoinPulseError, Result};
