//! ---
//! fms_section: "01-core-functionality"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Shared primitives and utilities for the master runtime."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Core shared primitives for the R-FMS master workspace.
//! This crate exposes configuration loading, logging setup, and clock
//! abstractions consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    InventoryConfig, LoggingConfig, MasterConfig, OrchestrationConfig, WatchdogConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::{Clock, ManualClock, SystemClock};
