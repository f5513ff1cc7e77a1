//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use r_fms_domain::UnitState;
use thiserror::Error;

/// Errors surfaced by the orchestration engine.
///
/// Remote-command failures from the client and deployment-manager
/// boundaries pass through unmodified; the engine applies no retry policy.
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("unit state transition {from} -> {to} rejected by strict mode")]
    InvalidTransition { from: UnitState, to: UnitState },

    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

pub type MasterResult<T> = std::result::Result<T, MasterError>;
