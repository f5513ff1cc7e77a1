//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! Locally mirrored, mutable status wrappers around declared definitions.
//!
//! "Active" means the master knows about the entity. Status fields are
//! grouped under one mutex per entity so a state value is never observed
//! with a stale or future timestamp.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use r_fms_common::time::Clock;
use r_fms_domain::{
    ControllerConnectionState, ControllerDefinition, DataBundleState, GroupDefinition,
    UnitDefinition, UnitState,
};

use crate::client::RemoteControllerClient;
use crate::error::{MasterError, MasterResult};
use crate::transition;

/// A remote controller the master is mirroring.
pub struct ActiveController {
    uuid: Uuid,
    clock: Arc<dyn Clock>,
    inner: Mutex<ControllerStatus>,
}

struct ControllerStatus {
    definition: ControllerDefinition,
    connection_state: ControllerConnectionState,
    last_state_update: Option<DateTime<Utc>>,
    data_bundle_state: DataBundleState,
    last_data_bundle_update: Option<DateTime<Utc>>,
    last_heartbeat: Option<DateTime<Utc>>,
}

impl ActiveController {
    pub(crate) fn new(definition: ControllerDefinition, clock: Arc<dyn Clock>) -> Self {
        Self {
            uuid: definition.uuid,
            clock,
            inner: Mutex::new(ControllerStatus {
                definition,
                connection_state: ControllerConnectionState::Unknown,
                last_state_update: None,
                data_bundle_state: DataBundleState::NoRequest,
                last_data_bundle_update: None,
                last_heartbeat: None,
            }),
        }
    }

    /// Stable identity; survives definition refreshes.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Latest declared definition.
    pub fn definition(&self) -> ControllerDefinition {
        self.inner.lock().definition.clone()
    }

    /// Replace the wrapped definition without touching status history.
    pub(crate) fn refresh_definition(&self, definition: ControllerDefinition) {
        self.inner.lock().definition = definition;
    }

    pub fn connection_state(&self) -> ControllerConnectionState {
        self.inner.lock().connection_state.clone()
    }

    pub fn last_state_update(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_state_update
    }

    /// Set the connection state, stamping the update time atomically.
    pub fn set_connection_state(&self, state: ControllerConnectionState) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.connection_state = state;
        inner.last_state_update = Some(now);
    }

    pub fn data_bundle_state(&self) -> DataBundleState {
        self.inner.lock().data_bundle_state
    }

    pub fn last_data_bundle_update(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_data_bundle_update
    }

    /// Set the data-bundle state; its timestamp is independent of the
    /// connection-state timestamp.
    pub fn set_data_bundle_state(&self, state: DataBundleState) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.data_bundle_state = state;
        inner.last_data_bundle_update = Some(now);
    }

    pub fn record_heartbeat(&self, timestamp: DateTime<Utc>) {
        self.inner.lock().last_heartbeat = Some(timestamp);
    }

    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_heartbeat
    }

    /// Time between `sample` and the last liveness signal.
    ///
    /// Heartbeats are authoritative; a controller that has only ever had a
    /// state update is measured against that instead, and a controller
    /// with no data at all yields `None` (no basis to flag it dead).
    pub fn time_since_last_heartbeat(&self, sample: DateTime<Utc>) -> Option<Duration> {
        let inner = self.inner.lock();
        if let Some(heartbeat) = inner.last_heartbeat {
            Some(sample - heartbeat)
        } else {
            inner.last_state_update.map(|update| sample - update)
        }
    }

    /// Human-friendly identity for log lines.
    pub fn display_name(&self) -> String {
        self.inner.lock().definition.display_name()
    }
}

impl std::fmt::Debug for ActiveController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveController")
            .field("uuid", &self.uuid)
            .finish_non_exhaustive()
    }
}

/// Session-scoped execution bookkeeping for a unit.
///
/// Tracks how the unit came to run: directly, or through one or more
/// groups. Cleared whenever the unit returns to `Ready` or its owning
/// controller's execution context is torn down.
#[derive(Debug, Default, Clone)]
pub struct RunningStateModel {
    direct_running: bool,
    direct_activated: bool,
    running_groups: HashSet<String>,
    activated_groups: HashSet<String>,
}

impl RunningStateModel {
    pub fn is_empty(&self) -> bool {
        !self.direct_running
            && !self.direct_activated
            && self.running_groups.is_empty()
            && self.activated_groups.is_empty()
    }

    pub fn is_direct_running(&self) -> bool {
        self.direct_running
    }

    pub fn is_direct_activated(&self) -> bool {
        self.direct_activated
    }

    pub fn running_groups(&self) -> &HashSet<String> {
        &self.running_groups
    }

    pub fn activated_groups(&self) -> &HashSet<String> {
        &self.activated_groups
    }
}

/// A deployable unit the master is mirroring on a specific controller.
pub struct ActiveUnit {
    uuid: Uuid,
    controller: Arc<ActiveController>,
    client: Arc<dyn RemoteControllerClient>,
    clock: Arc<dyn Clock>,
    inner: Mutex<UnitStatus>,
}

struct UnitStatus {
    definition: UnitDefinition,
    state: UnitState,
    last_state_update: Option<DateTime<Utc>>,
    running: RunningStateModel,
}

impl ActiveUnit {
    pub(crate) fn new(
        definition: UnitDefinition,
        controller: Arc<ActiveController>,
        client: Arc<dyn RemoteControllerClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            uuid: definition.uuid,
            controller,
            client,
            clock,
            inner: Mutex::new(UnitStatus {
                definition,
                state: UnitState::Unknown,
                last_state_update: None,
                running: RunningStateModel::default(),
            }),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn controller(&self) -> &Arc<ActiveController> {
        &self.controller
    }

    pub fn definition(&self) -> UnitDefinition {
        self.inner.lock().definition.clone()
    }

    pub(crate) fn refresh_definition(&self, definition: UnitDefinition) {
        self.inner.lock().definition = definition;
    }

    pub fn state(&self) -> UnitState {
        self.inner.lock().state
    }

    pub fn last_state_update(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_state_update
    }

    /// Set the lifecycle state, stamping the update time atomically.
    pub fn set_state(&self, state: UnitState) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.state = state;
        inner.last_state_update = Some(now);
    }

    /// Set the lifecycle state, consulting the transition table when
    /// strict mode is on. Callback-driven writes must not use this path;
    /// the remote node's report is always accepted.
    pub fn set_state_checked(&self, state: UnitState, strict: bool) -> MasterResult<()> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        if strict && !transition::is_allowed(inner.state, state) {
            return Err(MasterError::InvalidTransition {
                from: inner.state,
                to: state,
            });
        }
        inner.state = state;
        inner.last_state_update = Some(now);
        Ok(())
    }

    /// Apply a remotely reported state change.
    ///
    /// Captures the old state, writes the new one, and clears the running
    /// state model when the unit lands back on `Ready`, all within one
    /// critical section. Returns the old state for re-broadcast.
    pub(crate) fn reconcile_state(&self, new_state: UnitState) -> UnitState {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let old_state = inner.state;
        inner.state = new_state;
        inner.last_state_update = Some(now);
        if new_state == UnitState::Ready {
            inner.running = RunningStateModel::default();
        }
        old_state
    }

    pub fn running_state(&self) -> RunningStateModel {
        self.inner.lock().running.clone()
    }

    /// Drop all session-scoped execution bookkeeping.
    pub fn clear_running_state_model(&self) {
        self.inner.lock().running = RunningStateModel::default();
    }

    /// Request startup directly, outside any group.
    pub fn startup(&self) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.direct_running = true;
            inner.definition.clone()
        };
        self.client.startup_unit(&definition)?;
        Ok(())
    }

    /// Request startup on behalf of a group.
    pub fn startup_from_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.running_groups.insert(group.id.clone());
            inner.definition.clone()
        };
        self.client.startup_unit(&definition)?;
        Ok(())
    }

    pub fn activate(&self) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.direct_activated = true;
            inner.definition.clone()
        };
        self.client.activate_unit(&definition)?;
        Ok(())
    }

    pub fn activate_from_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.activated_groups.insert(group.id.clone());
            inner.definition.clone()
        };
        self.client.activate_unit(&definition)?;
        Ok(())
    }

    pub fn deactivate(&self) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.direct_activated = false;
            inner.definition.clone()
        };
        self.client.deactivate_unit(&definition)?;
        Ok(())
    }

    pub fn deactivate_from_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.activated_groups.remove(&group.id);
            inner.definition.clone()
        };
        self.client.deactivate_unit(&definition)?;
        Ok(())
    }

    pub fn shutdown(&self) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running = RunningStateModel::default();
            inner.definition.clone()
        };
        self.client.shutdown_unit(&definition)?;
        Ok(())
    }

    pub fn shutdown_from_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        let definition = {
            let mut inner = self.inner.lock();
            inner.running.running_groups.remove(&group.id);
            inner.running.activated_groups.remove(&group.id);
            inner.definition.clone()
        };
        self.client.shutdown_unit(&definition)?;
        Ok(())
    }

    pub fn status(&self) -> MasterResult<()> {
        let definition = self.inner.lock().definition.clone();
        self.client.status_unit(&definition)?;
        Ok(())
    }
}

impl std::fmt::Debug for ActiveUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveUnit")
            .field("uuid", &self.uuid)
            .field("controller", &self.controller.uuid())
            .finish_non_exhaustive()
    }
}

/// A named, ordered collection of units orchestrated together.
pub struct ActiveGroup {
    id: String,
    inner: Mutex<GroupDefinition>,
}

impl ActiveGroup {
    pub(crate) fn new(definition: GroupDefinition) -> Self {
        Self {
            id: definition.id.clone(),
            inner: Mutex::new(definition),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> GroupDefinition {
        self.inner.lock().clone()
    }

    /// Replace the member list; identity and any ongoing orchestration
    /// state belonging to member units are untouched.
    pub(crate) fn refresh_definition(&self, definition: GroupDefinition) {
        *self.inner.lock() = definition;
    }
}

impl std::fmt::Debug for ActiveGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveGroup").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use r_fms_common::time::ManualClock;

    fn controller_definition() -> ControllerDefinition {
        ControllerDefinition::new(Uuid::new_v4(), "node-a", "rack1-node-a")
    }

    #[test]
    fn liveness_prefers_heartbeat_over_state_update() {
        let start = Utc.timestamp_opt(100, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let controller = ActiveController::new(controller_definition(), clock.clone());

        assert_eq!(controller.time_since_last_heartbeat(start), None);

        controller.set_connection_state(ControllerConnectionState::ConnectAttempt);
        let sample = Utc.timestamp_opt(150, 0).unwrap();
        assert_eq!(
            controller.time_since_last_heartbeat(sample),
            Some(Duration::seconds(50))
        );

        controller.record_heartbeat(Utc.timestamp_opt(140, 0).unwrap());
        assert_eq!(
            controller.time_since_last_heartbeat(sample),
            Some(Duration::seconds(10))
        );
    }

    #[test]
    fn state_write_stamps_timestamp_atomically() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let controller = ActiveController::new(controller_definition(), clock.clone());
        assert_eq!(controller.last_state_update(), None);

        clock.advance(Duration::seconds(7));
        controller.set_connection_state(ControllerConnectionState::Running);
        assert_eq!(
            controller.last_state_update(),
            Some(start + Duration::seconds(7))
        );
    }

    #[test]
    fn data_bundle_timestamp_is_independent() {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        let clock = ManualClock::starting_at(start);
        let controller = ActiveController::new(controller_definition(), clock.clone());

        controller.set_connection_state(ControllerConnectionState::Running);
        clock.advance(Duration::seconds(5));
        controller.set_data_bundle_state(DataBundleState::CaptureRequested);

        assert_eq!(controller.last_state_update(), Some(start));
        assert_eq!(
            controller.last_data_bundle_update(),
            Some(start + Duration::seconds(5))
        );
    }

    #[test]
    fn reconcile_to_ready_clears_running_state() {
        let clock = ManualClock::starting_at(Utc.timestamp_opt(0, 0).unwrap());
        let controller = Arc::new(ActiveController::new(controller_definition(), clock.clone()));
        let definition = UnitDefinition::new(Uuid::new_v4(), "greeter", controller.definition());
        let unit = ActiveUnit::new(
            definition,
            controller,
            Arc::new(crate::client::NullRemoteClient),
            clock,
        );

        unit.startup().unwrap();
        unit.activate().unwrap();
        assert!(!unit.running_state().is_empty());

        let old = unit.reconcile_state(UnitState::Ready);
        assert_eq!(old, UnitState::Unknown);
        assert_eq!(unit.state(), UnitState::Ready);
        assert!(unit.running_state().is_empty());
    }

    #[test]
    fn group_shutdown_removes_only_that_group() {
        let clock = ManualClock::starting_at(Utc.timestamp_opt(0, 0).unwrap());
        let controller = Arc::new(ActiveController::new(controller_definition(), clock.clone()));
        let definition = UnitDefinition::new(Uuid::new_v4(), "greeter", controller.definition());
        let unit = ActiveUnit::new(
            definition,
            controller,
            Arc::new(crate::client::NullRemoteClient),
            clock,
        );

        let lobby = GroupDefinition::new("lobby", "Lobby");
        let foyer = GroupDefinition::new("foyer", "Foyer");
        unit.startup_from_group(&lobby).unwrap();
        unit.startup_from_group(&foyer).unwrap();
        unit.shutdown_from_group(&lobby).unwrap();

        let model = unit.running_state();
        assert!(!model.running_groups().contains("lobby"));
        assert!(model.running_groups().contains("foyer"));
    }
}
