//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! The R-FMS master core: active-entity registries, the lifecycle
//! orchestration engine, transport callback reconciliation, listener
//! fan-out, and heartbeat liveness bookkeeping.
//!
//! Commands flow one way out (verb, remote client, network) and state
//! flows one way back (network, callback, registry mutation, listener
//! broadcast); issuing a command never waits for its acknowledgment.

pub mod active;
pub mod client;
pub mod engine;
pub mod error;
pub mod listener;
pub mod registry;
pub mod transition;
pub mod watchdog;

pub use active::{ActiveController, ActiveGroup, ActiveUnit, RunningStateModel};
pub use client::{
    DeploymentManager, NullDeploymentManager, NullRemoteClient, RemoteClientListener,
    RemoteControllerClient,
};
pub use engine::FleetOrchestrator;
pub use error::{MasterError, MasterResult};
pub use listener::{FleetListener, ListenerHub};
pub use registry::{ControllerRegistry, GroupRegistry, UnitRegistry};
pub use watchdog::HeartbeatWatchdog;
