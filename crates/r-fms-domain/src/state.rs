//! ---
//! fms_section: "02-fleet-data-model"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Declared fleet definitions and lifecycle state enums."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Connection state of a remote controller as mirrored by the master.
///
/// Remote nodes may report states this build does not know; those arrive
/// as an opaque tag rather than failing deserialization of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerConnectionState {
    Unknown,
    ConnectAttempt,
    Running,
    /// Any further state reported by the remote node, kept verbatim.
    Reported(String),
}

impl fmt::Display for ControllerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerConnectionState::Unknown => write!(f, "unknown"),
            ControllerConnectionState::ConnectAttempt => write!(f, "connect_attempt"),
            ControllerConnectionState::Running => write!(f, "running"),
            ControllerConnectionState::Reported(tag) => write!(f, "{}", tag),
        }
    }
}

/// Data-bundle capture/restore state, independent of the connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DataBundleState {
    #[default]
    NoRequest,
    CaptureRequested,
    CaptureReceived,
    CaptureError,
    RestoreRequested,
    RestoreReceived,
    RestoreError,
}

/// Lifecycle state of a deployable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnitState {
    #[default]
    Unknown,
    DeployAttempt,
    DeployFailure,
    Ready,
    StartupAttempt,
    StartupFailure,
    Running,
    ActivateAttempt,
    ActivateFailure,
    Active,
    DeactivateAttempt,
    DeactivateFailure,
    ShutdownAttempt,
    ShutdownFailure,
}

impl UnitState {
    /// Whether the unit is in an optimistic, unacknowledged attempt state.
    pub fn is_attempt(&self) -> bool {
        matches!(
            self,
            UnitState::DeployAttempt
                | UnitState::StartupAttempt
                | UnitState::ActivateAttempt
                | UnitState::DeactivateAttempt
                | UnitState::ShutdownAttempt
        )
    }

    /// Whether the unit reported a failed command outcome.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UnitState::DeployFailure
                | UnitState::StartupFailure
                | UnitState::ActivateFailure
                | UnitState::DeactivateFailure
                | UnitState::ShutdownFailure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reported_controller_state_displays_verbatim() {
        let state = ControllerConnectionState::Reported("maintenance".into());
        assert_eq!(state.to_string(), "maintenance");
        assert_eq!(ControllerConnectionState::ConnectAttempt.to_string(), "connect_attempt");
    }

    #[test]
    fn states_serialize_as_snake_case_tags() {
        assert_eq!(
            serde_json::to_string(&UnitState::DeployAttempt).unwrap(),
            "\"deploy_attempt\""
        );
        assert_eq!(
            serde_json::from_str::<DataBundleState>("\"capture_requested\"").unwrap(),
            DataBundleState::CaptureRequested
        );
    }

    #[test]
    fn unit_state_classification() {
        assert!(UnitState::DeployAttempt.is_attempt());
        assert!(UnitState::ShutdownFailure.is_failure());
        assert!(!UnitState::Ready.is_attempt());
        assert!(!UnitState::Running.is_failure());
    }
}
