//! Demo services and configuration, split into a library target so
//! integration tests under `tests/` can exercise them directly.

pub mod config;
pub mod services;
