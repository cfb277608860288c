//! CandleLab runner — everything a host needs around the core engine:
//! TOML run configuration, bundled example strategies, a human-readable
//! metrics summary, a self-contained HTML report, and deterministic
//! synthetic data for tests and demos.

pub mod config;
pub mod export;
pub mod report;
pub mod strategies;
pub mod summary;
pub mod synthetic;
