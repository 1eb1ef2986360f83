//! Configuration utilities re-exported at the crate root.
//!
//! Applications load settings from `config/pantry.toml` and `PANTRY__*`
//! environment variables with `PantryConfig::load()`.

pub use crate::pool::config::*;
