//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Keyed stores of active entities with atomic get-or-create semantics.
//!
//! Each registry is guarded by a single mutex covering both the primary
//! map and any secondary index, so two callers racing to instantiate the
//! same identity always converge on one entry. Lookups used by the
//! callback path never create.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use r_fms_common::time::Clock;
use r_fms_domain::{ControllerDefinition, GroupDefinition, UnitDefinition};

use crate::active::{ActiveController, ActiveGroup, ActiveUnit};
use crate::client::RemoteControllerClient;

/// Registry of active controllers keyed by controller UUID.
pub struct ControllerRegistry {
    clock: Arc<dyn Clock>,
    inner: Mutex<HashMap<Uuid, Arc<ActiveController>>>,
}

impl ControllerRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Atomic get-if-present-else-create, refreshing the wrapped
    /// definition if the entry already existed.
    pub fn get_or_create(&self, definition: &ControllerDefinition) -> Arc<ActiveController> {
        let mut inner = self.inner.lock();
        match inner.get(&definition.uuid) {
            Some(existing) => {
                existing.refresh_definition(definition.clone());
                existing.clone()
            }
            None => {
                let created = Arc::new(ActiveController::new(
                    definition.clone(),
                    self.clock.clone(),
                ));
                inner.insert(definition.uuid, created.clone());
                created
            }
        }
    }

    /// Order-preserving bulk resolution.
    pub fn get_or_create_all(
        &self,
        definitions: &[ControllerDefinition],
    ) -> Vec<Arc<ActiveController>> {
        definitions
            .iter()
            .map(|definition| self.get_or_create(definition))
            .collect()
    }

    /// Non-creating lookup; the callback path must never create entries.
    pub fn lookup(&self, uuid: Uuid) -> Option<Arc<ActiveController>> {
        self.inner.lock().get(&uuid).cloned()
    }

    /// Snapshot of every known active controller.
    pub fn all(&self) -> Vec<Arc<ActiveController>> {
        self.inner.lock().values().cloned().collect()
    }
}

/// Registry of active units keyed by unit UUID, secondarily indexed by
/// their owning controller's UUID for bulk fan-out.
pub struct UnitRegistry {
    clock: Arc<dyn Clock>,
    client: Arc<dyn RemoteControllerClient>,
    controllers: Arc<ControllerRegistry>,
    inner: Mutex<UnitMaps>,
}

#[derive(Default)]
struct UnitMaps {
    by_uuid: HashMap<Uuid, Arc<ActiveUnit>>,
    by_controller: HashMap<Uuid, Vec<Arc<ActiveUnit>>>,
}

impl UnitRegistry {
    pub fn new(
        clock: Arc<dyn Clock>,
        client: Arc<dyn RemoteControllerClient>,
        controllers: Arc<ControllerRegistry>,
    ) -> Self {
        Self {
            clock,
            client,
            controllers,
            inner: Mutex::new(UnitMaps::default()),
        }
    }

    /// Atomic get-or-create; a created unit is indexed into its owning
    /// controller's bucket in the same critical section.
    pub fn get_or_create(&self, definition: &UnitDefinition) -> Arc<ActiveUnit> {
        let mut inner = self.inner.lock();
        match inner.by_uuid.get(&definition.uuid) {
            Some(existing) => {
                existing.refresh_definition(definition.clone());
                existing.clone()
            }
            None => {
                let controller = self.controllers.get_or_create(&definition.controller);
                let controller_uuid = controller.uuid();
                let created = Arc::new(ActiveUnit::new(
                    definition.clone(),
                    controller,
                    self.client.clone(),
                    self.clock.clone(),
                ));
                inner.by_uuid.insert(definition.uuid, created.clone());
                inner
                    .by_controller
                    .entry(controller_uuid)
                    .or_default()
                    .push(created.clone());
                created
            }
        }
    }

    /// Order-preserving bulk resolution.
    pub fn get_or_create_all(&self, definitions: &[UnitDefinition]) -> Vec<Arc<ActiveUnit>> {
        definitions
            .iter()
            .map(|definition| self.get_or_create(definition))
            .collect()
    }

    /// Non-creating lookup; the callback path must never create entries.
    pub fn lookup(&self, uuid: Uuid) -> Option<Arc<ActiveUnit>> {
        self.inner.lock().by_uuid.get(&uuid).cloned()
    }

    /// All units indexed under the given controller.
    pub fn units_for_controller(&self, controller_uuid: Uuid) -> Vec<Arc<ActiveUnit>> {
        self.inner
            .lock()
            .by_controller
            .get(&controller_uuid)
            .cloned()
            .unwrap_or_default()
    }
}

/// Registry of active unit-groups keyed by group id.
pub struct GroupRegistry {
    inner: Mutex<HashMap<String, Arc<ActiveGroup>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, definition: &GroupDefinition) -> Arc<ActiveGroup> {
        let mut inner = self.inner.lock();
        match inner.get(&definition.id) {
            Some(existing) => {
                existing.refresh_definition(definition.clone());
                existing.clone()
            }
            None => {
                let created = Arc::new(ActiveGroup::new(definition.clone()));
                inner.insert(definition.id.clone(), created.clone());
                created
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<ActiveGroup>> {
        self.inner.lock().get(id).cloned()
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use r_fms_common::time::ManualClock;
    use r_fms_domain::ControllerConnectionState;

    use crate::client::NullRemoteClient;

    fn registry() -> ControllerRegistry {
        ControllerRegistry::new(ManualClock::starting_at(Utc.timestamp_opt(0, 0).unwrap()))
    }

    #[test]
    fn get_or_create_is_idempotent_and_refreshes_definition() {
        let registry = registry();
        let uuid = Uuid::new_v4();
        let first = registry.get_or_create(&ControllerDefinition::new(uuid, "node-a", "host-1"));
        first.set_connection_state(ControllerConnectionState::Running);
        let stamp = first.last_state_update();

        let second = registry.get_or_create(&ControllerDefinition::new(uuid, "node-a2", "host-2"));
        assert!(Arc::ptr_eq(&first, &second));
        // Refresh replaces the definition without resetting status history.
        assert_eq!(second.definition().host_id, "host-2");
        assert_eq!(second.last_state_update(), stamp);
        assert_eq!(
            second.connection_state(),
            ControllerConnectionState::Running
        );
    }

    #[test]
    fn bulk_resolution_preserves_input_order() {
        let registry = registry();
        let defs: Vec<_> = (0..4)
            .map(|i| ControllerDefinition::new(Uuid::new_v4(), format!("node-{i}"), "host"))
            .collect();
        let actives = registry.get_or_create_all(&defs);
        for (def, active) in defs.iter().zip(&actives) {
            assert_eq!(def.uuid, active.uuid());
        }
    }

    #[test]
    fn unit_creation_indexes_into_owning_controller_bucket() {
        let clock = ManualClock::starting_at(Utc.timestamp_opt(0, 0).unwrap());
        let controllers = Arc::new(ControllerRegistry::new(clock.clone()));
        let units = UnitRegistry::new(clock, Arc::new(NullRemoteClient), controllers.clone());

        let controller_def = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
        let unit_def = UnitDefinition::new(Uuid::new_v4(), "greeter", controller_def.clone());
        let unit = units.get_or_create(&unit_def);

        let bucket = units.units_for_controller(controller_def.uuid);
        assert_eq!(bucket.len(), 1);
        assert!(Arc::ptr_eq(&bucket[0], &unit));

        // The owning controller was lazily created as part of the same call.
        assert!(controllers.lookup(controller_def.uuid).is_some());
    }

    #[test]
    fn lookup_never_creates() {
        let registry = registry();
        assert!(registry.lookup(Uuid::new_v4()).is_none());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn group_refresh_replaces_member_list() {
        let groups = GroupRegistry::new();
        let initial = GroupDefinition::new("lobby", "Lobby");
        let group = groups.get_or_create(&initial);

        let controller = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
        let refreshed = GroupDefinition::new("lobby", "Lobby").with_members(vec![
            UnitDefinition::new(Uuid::new_v4(), "greeter", controller),
        ]);
        let same = groups.get_or_create(&refreshed);
        assert!(Arc::ptr_eq(&group, &same));
        assert_eq!(group.definition().members.len(), 1);
    }
}
