//! ---
//! fms_section: "02-fleet-data-model"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Declared fleet definitions and lifecycle state enums."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Declared (inventory) definitions for the R-FMS fleet together with the
//! lifecycle state enums shared between the master and its transports.
//! Definitions are the static half of the model; the master wraps them in
//! mutable "active" records that carry live status.

pub mod definition;
pub mod state;

pub use definition::{ControllerDefinition, GroupDefinition, UnitDefinition};
pub use state::{ControllerConnectionState, DataBundleState, UnitState};
