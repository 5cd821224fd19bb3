//! Uptime check monitoring and alerting engine.
//!
//! Periodically probes every stored check, records whether its endpoint is
//! up or down and texts the owner when that changes.

pub mod config;
pub mod database;
pub mod models;
pub mod monitoring;
pub mod notify;
pub mod orchestrator;
pub mod pool;

#[cfg(test)]
mod test_support;

pub use orchestrator::{Engine, EngineConfig, build_engine};
