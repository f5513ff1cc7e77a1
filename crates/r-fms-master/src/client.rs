//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Trait boundaries toward the remote transport and deployment layers.
//!
//! The master never waits for a command result on these boundaries; all
//! outcomes arrive asynchronously through [`RemoteClientListener`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use r_fms_domain::{ControllerConnectionState, ControllerDefinition, UnitDefinition, UnitState};

/// Client for issuing fire-and-forget commands to remote controllers.
///
/// Implementations own the wire protocol, serialization, and any
/// retry/backoff policy. Results surface only through the listener
/// contract, to which the orchestrator must be registered.
pub trait RemoteControllerClient: Send + Sync {
    fn connect(&self, controller: &ControllerDefinition) -> Result<()>;
    fn disconnect(&self, controller: &ControllerDefinition) -> Result<()>;
    fn request_status(&self, controller: &ControllerDefinition) -> Result<()>;
    fn request_shutdown(&self, controller: &ControllerDefinition) -> Result<()>;
    fn shutdown_all_units(&self, controller: &ControllerDefinition) -> Result<()>;

    fn full_configure_unit(&self, unit: &UnitDefinition) -> Result<()>;
    fn startup_unit(&self, unit: &UnitDefinition) -> Result<()>;
    fn activate_unit(&self, unit: &UnitDefinition) -> Result<()>;
    fn deactivate_unit(&self, unit: &UnitDefinition) -> Result<()>;
    fn shutdown_unit(&self, unit: &UnitDefinition) -> Result<()>;
    fn status_unit(&self, unit: &UnitDefinition) -> Result<()>;
}

/// Handles artifact transfer for unit deployment.
pub trait DeploymentManager: Send + Sync {
    fn deploy_unit(&self, unit: &UnitDefinition) -> Result<()>;
}

/// Callback contract the transport layer invokes as remote events arrive.
///
/// Invoked from transport I/O threads; implementations must be safe to
/// call concurrently with command issuance.
pub trait RemoteClientListener: Send + Sync {
    fn on_controller_connect_attempted(&self, uuid: Uuid);
    fn on_controller_disconnect_attempted(&self, uuid: Uuid);
    fn on_controller_heartbeat(&self, uuid: Uuid, timestamp: DateTime<Utc>);
    fn on_controller_status_change(&self, uuid: Uuid, state: ControllerConnectionState);
    fn on_unit_install(&self, uuid: Uuid, success: bool);
    fn on_unit_state_change(&self, uuid: Uuid, new_state: UnitState);
}

/// No-op remote client used for wiring and smoke runs.
#[derive(Debug, Default)]
pub struct NullRemoteClient;

impl RemoteControllerClient for NullRemoteClient {
    fn connect(&self, controller: &ControllerDefinition) -> Result<()> {
        tracing::debug!(controller = %controller.uuid, "null client drop connect");
        Ok(())
    }

    fn disconnect(&self, controller: &ControllerDefinition) -> Result<()> {
        tracing::debug!(controller = %controller.uuid, "null client drop disconnect");
        Ok(())
    }

    fn request_status(&self, controller: &ControllerDefinition) -> Result<()> {
        tracing::debug!(controller = %controller.uuid, "null client drop status request");
        Ok(())
    }

    fn request_shutdown(&self, controller: &ControllerDefinition) -> Result<()> {
        tracing::debug!(controller = %controller.uuid, "null client drop shutdown request");
        Ok(())
    }

    fn shutdown_all_units(&self, controller: &ControllerDefinition) -> Result<()> {
        tracing::debug!(controller = %controller.uuid, "null client drop shutdown-all request");
        Ok(())
    }

    fn full_configure_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop configure");
        Ok(())
    }

    fn startup_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop startup");
        Ok(())
    }

    fn activate_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop activate");
        Ok(())
    }

    fn deactivate_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop deactivate");
        Ok(())
    }

    fn shutdown_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop shutdown");
        Ok(())
    }

    fn status_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, "null client drop unit status");
        Ok(())
    }
}

/// Deployment manager that only records the request in the trace stream.
#[derive(Debug, Default)]
pub struct NullDeploymentManager;

impl DeploymentManager for NullDeploymentManager {
    fn deploy_unit(&self, unit: &UnitDefinition) -> Result<()> {
        tracing::debug!(unit = %unit.uuid, controller = %unit.controller.host_id, "null deployment manager drop deploy");
        Ok(())
    }
}
