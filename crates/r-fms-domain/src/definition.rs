//! ---
//! fms_section: "02-fleet-data-model"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Declared fleet definitions and lifecycle state enums."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared description of a remote execution node.
///
/// Definitions come from an external inventory store and may be refreshed
/// in place; the UUID is the stable identity across refreshes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerDefinition {
    pub uuid: Uuid,
    pub name: String,
    pub host_id: String,
}

impl ControllerDefinition {
    pub fn new(uuid: Uuid, name: impl Into<String>, host_id: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            host_id: host_id.into(),
        }
    }

    /// Human-friendly identity for log lines.
    pub fn display_name(&self) -> String {
        format!(
            "UUID {}, host id {}, name {}",
            self.uuid, self.host_id, self.name
        )
    }
}

/// Declared description of a deployable unit bound to one controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub uuid: Uuid,
    pub name: String,
    pub controller: ControllerDefinition,
}

impl UnitDefinition {
    pub fn new(uuid: Uuid, name: impl Into<String>, controller: ControllerDefinition) -> Self {
        Self {
            uuid,
            name: name.into(),
            controller,
        }
    }
}

/// Declared, ordered collection of units orchestrated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<UnitDefinition>,
}

impl GroupDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_members(mut self, members: Vec<UnitDefinition>) -> Self {
        self.members = members;
        self
    }
}
