//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Unit lifecycle transition table for strict mode.
//!
//! Only locally-initiated optimistic writes are checked against this
//! table, and only when strict mode is enabled in configuration. Remotely
//! reported states are always accepted; the mirror must follow remote
//! reality even when it contradicts a local attempt.

use r_fms_domain::UnitState;

/// Whether a locally-initiated transition is legal under strict mode.
pub fn is_allowed(from: UnitState, to: UnitState) -> bool {
    use UnitState::*;

    if from == to {
        return true;
    }

    match to {
        // Nothing is known before the first report; no local write returns
        // a unit to Unknown.
        Unknown => false,
        DeployAttempt => matches!(
            from,
            Unknown | DeployFailure | Ready | StartupFailure | ShutdownFailure
        ),
        DeployFailure | Ready => matches!(from, DeployAttempt) || from == Unknown,
        StartupAttempt => matches!(from, Ready | StartupFailure),
        StartupFailure | Running => matches!(from, StartupAttempt | Ready),
        ActivateAttempt => matches!(from, Running | ActivateFailure | DeactivateFailure),
        ActivateFailure | Active => matches!(from, ActivateAttempt | Running),
        DeactivateAttempt => matches!(from, Active | DeactivateFailure),
        DeactivateFailure => matches!(from, DeactivateAttempt),
        ShutdownAttempt => matches!(from, Ready | Running | Active | ShutdownFailure),
        ShutdownFailure => matches!(from, ShutdownAttempt),
    }
}
