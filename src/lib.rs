//! HostWatch - single-host resource and application health monitor
//!
//! The collector samples this machine on a fixed interval and appends each
//! sample to a CSV table; the dashboard serves live gauges, history charts,
//! service status and alerts read back from that table.

pub mod alerts;
pub mod app;
pub mod cli;
pub mod collector;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod formatting;
pub mod internal_metrics;
pub mod logging;
pub mod network;
pub mod sink;
pub mod task_manager;

// Re-export core types for convenience
pub use core::*;
