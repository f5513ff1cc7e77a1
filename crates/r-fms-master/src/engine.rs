//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
//! The orchestration engine: lifecycle verbs over controllers, units and
//! unit-groups, plus reconciliation of transport callbacks against the
//! local mirror.
//!
//! Verbs fire their remote command and return; acknowledgments arrive on
//! transport threads through the [`RemoteClientListener`] implementation
//! and always win as the most recent mutation, even when they undo an
//! optimistic attempt state.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use r_fms_common::config::OrchestrationConfig;
use r_fms_common::time::Clock;
use r_fms_domain::{
    ControllerConnectionState, ControllerDefinition, GroupDefinition, UnitDefinition, UnitState,
};

use crate::active::{ActiveController, ActiveGroup, ActiveUnit};
use crate::client::{DeploymentManager, RemoteClientListener, RemoteControllerClient};
use crate::error::{MasterError, MasterResult};
use crate::listener::{FleetListener, ListenerHub};
use crate::registry::{ControllerRegistry, GroupRegistry, UnitRegistry};

/// Orchestrates the lifecycle of controllers, units and unit-groups and
/// mirrors their remotely reported state.
pub struct FleetOrchestrator {
    controllers: Arc<ControllerRegistry>,
    units: UnitRegistry,
    groups: GroupRegistry,
    client: Arc<dyn RemoteControllerClient>,
    deployer: Arc<dyn DeploymentManager>,
    listeners: ListenerHub,
    clock: Arc<dyn Clock>,
    strict_transitions: bool,
}

impl FleetOrchestrator {
    pub fn new(
        client: Arc<dyn RemoteControllerClient>,
        deployer: Arc<dyn DeploymentManager>,
        clock: Arc<dyn Clock>,
        config: &OrchestrationConfig,
    ) -> Self {
        let controllers = Arc::new(ControllerRegistry::new(clock.clone()));
        let units = UnitRegistry::new(clock.clone(), client.clone(), controllers.clone());
        Self {
            controllers,
            units,
            groups: GroupRegistry::new(),
            client,
            deployer,
            listeners: ListenerHub::new(),
            clock,
            strict_transitions: config.strict_transitions,
        }
    }

    // ---- active-entity resolution -------------------------------------

    pub fn active_controller(&self, definition: &ControllerDefinition) -> Arc<ActiveController> {
        self.controllers.get_or_create(definition)
    }

    pub fn active_controllers(
        &self,
        definitions: &[ControllerDefinition],
    ) -> Vec<Arc<ActiveController>> {
        self.controllers.get_or_create_all(definitions)
    }

    pub fn active_unit(&self, definition: &UnitDefinition) -> Arc<ActiveUnit> {
        self.units.get_or_create(definition)
    }

    pub fn active_units(&self, definitions: &[UnitDefinition]) -> Vec<Arc<ActiveUnit>> {
        self.units.get_or_create_all(definitions)
    }

    pub fn active_group(&self, definition: &GroupDefinition) -> Arc<ActiveGroup> {
        self.groups.get_or_create(definition)
    }

    pub fn lookup_controller(&self, uuid: Uuid) -> Option<Arc<ActiveController>> {
        self.controllers.lookup(uuid)
    }

    pub fn lookup_unit(&self, uuid: Uuid) -> Option<Arc<ActiveUnit>> {
        self.units.lookup(uuid)
    }

    pub fn lookup_group(&self, id: &str) -> Option<Arc<ActiveGroup>> {
        self.groups.lookup(id)
    }

    /// Snapshot of every controller the master currently mirrors.
    pub fn all_controllers(&self) -> Vec<Arc<ActiveController>> {
        self.controllers.all()
    }

    // ---- listener registration ----------------------------------------

    pub fn add_listener(&self, listener: Arc<dyn FleetListener>) {
        self.listeners.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn FleetListener>) {
        self.listeners.remove_listener(listener);
    }

    // ---- controller verbs ---------------------------------------------

    pub fn connect_controller(&self, controller: &ControllerDefinition) -> MasterResult<()> {
        info!(controller = %controller.host_id, "connecting to controller");
        let active = self.controllers.get_or_create(controller);
        active.set_connection_state(ControllerConnectionState::ConnectAttempt);
        self.client.connect(controller)?;
        Ok(())
    }

    pub fn disconnect_controller(&self, controller: &ControllerDefinition) -> MasterResult<()> {
        info!(controller = %controller.host_id, "disconnecting from controller");
        let active = self.controllers.get_or_create(controller);
        self.client.disconnect(controller)?;
        // Fire-and-forget from the master's point of view; the mirror can
        // only say it no longer knows.
        active.set_connection_state(ControllerConnectionState::Unknown);
        Ok(())
    }

    pub fn restart_controller(&self, _controller: &ControllerDefinition) -> MasterResult<()> {
        Err(MasterError::Unsupported("controller restart"))
    }

    pub fn status_controller(&self, controller: &ControllerDefinition) -> MasterResult<()> {
        info!(controller = %controller.host_id, "requesting status from controller");
        // Make sure something is mirroring the eventual status report.
        self.controllers.get_or_create(controller);
        self.client.request_status(controller)?;
        Ok(())
    }

    pub fn shutdown_controller(&self, controller: &ControllerDefinition) -> MasterResult<()> {
        info!(controller = %controller.host_id, "shutting down controller");
        self.client.request_shutdown(controller)?;

        // The node is going away regardless of whether individual
        // acknowledgments ever arrive; reflect that through the normal
        // reconciliation path so observers hear about it.
        self.on_controller_status_change(controller.uuid, ControllerConnectionState::Unknown);

        self.clean_unit_state_models(controller.uuid);
        Ok(())
    }

    pub fn shutdown_all_units(&self, controller: &ControllerDefinition) -> MasterResult<()> {
        info!(controller = %controller.host_id, "shutting down all units on controller");
        // The async results will signal every active unit individually.
        self.client.shutdown_all_units(controller)?;
        self.clean_unit_state_models(controller.uuid);
        Ok(())
    }

    /// Clear the running-state model of every unit indexed under the
    /// controller. The units' remote execution context is being torn down.
    fn clean_unit_state_models(&self, controller_uuid: Uuid) {
        for unit in self.units.units_for_controller(controller_uuid) {
            unit.clear_running_state_model();
        }
    }

    // ---- unit verbs ----------------------------------------------------

    pub fn deploy_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.deploy_active_unit(&self.units.get_or_create(unit))
    }

    pub fn deploy_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        let definition = unit.definition();
        info!(
            unit = %definition.uuid,
            controller = %definition.controller.host_id,
            "deploying unit to controller"
        );

        // Commit the optimistic attempt before the outbound call so a
        // throwing deployment never leaves the mirror half-updated.
        unit.set_state_checked(UnitState::DeployAttempt, self.strict_transitions)?;
        self.deployer.deploy_unit(&definition)?;
        Ok(())
    }

    pub fn configure_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.configure_active_unit(&self.units.get_or_create(unit))
    }

    pub fn configure_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        let definition = unit.definition();
        info!(unit = %definition.uuid, "requesting unit configuration");
        self.client.full_configure_unit(&definition)?;
        Ok(())
    }

    pub fn startup_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.startup_active_unit(&self.units.get_or_create(unit))
    }

    pub fn startup_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        info!(unit = %unit.uuid(), "requesting unit startup");
        unit.startup()
    }

    pub fn activate_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.activate_active_unit(&self.units.get_or_create(unit))
    }

    pub fn activate_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        info!(unit = %unit.uuid(), "requesting unit activation");
        unit.activate()
    }

    pub fn deactivate_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.deactivate_active_unit(&self.units.get_or_create(unit))
    }

    pub fn deactivate_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        info!(unit = %unit.uuid(), "requesting unit deactivation");
        unit.deactivate()
    }

    pub fn shutdown_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.shutdown_active_unit(&self.units.get_or_create(unit))
    }

    pub fn shutdown_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        info!(unit = %unit.uuid(), "requesting unit shutdown");
        unit.shutdown()
    }

    pub fn status_unit(&self, unit: &UnitDefinition) -> MasterResult<()> {
        self.status_active_unit(&self.units.get_or_create(unit))
    }

    pub fn status_active_unit(&self, unit: &Arc<ActiveUnit>) -> MasterResult<()> {
        info!(unit = %unit.uuid(), "requesting unit status");
        unit.status()
    }

    // ---- group verbs ---------------------------------------------------

    pub fn deploy_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.deploy_active_group(&self.groups.get_or_create(group))
    }

    pub fn deploy_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        self.deploy_group_checked(group, None)
    }

    /// Deploy a group's members in member-list order.
    ///
    /// When a dedup set is supplied, members already present in it are
    /// skipped and freshly deployed members are added, so a unit shared
    /// between several groups processed together is deployed exactly once.
    /// The set's scope is exactly one top-level composite operation; it is
    /// threaded explicitly rather than held anywhere global.
    pub fn deploy_group_checked(
        &self,
        group: &Arc<ActiveGroup>,
        mut deployed: Option<&mut HashSet<Uuid>>,
    ) -> MasterResult<()> {
        info!(group = group.id(), "requesting group deployment");
        for member in &group.definition().members {
            let unit = self.units.get_or_create(member);
            match deployed.as_deref_mut() {
                None => self.deploy_active_unit(&unit)?,
                Some(set) => {
                    if !set.contains(&unit.uuid()) {
                        self.deploy_active_unit(&unit)?;
                        set.insert(unit.uuid());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn configure_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.configure_active_group(&self.groups.get_or_create(group))
    }

    pub fn configure_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        self.configure_group_checked(group, None)
    }

    /// Configure a group's members with the same dedup policy as
    /// [`Self::deploy_group_checked`].
    pub fn configure_group_checked(
        &self,
        group: &Arc<ActiveGroup>,
        mut configured: Option<&mut HashSet<Uuid>>,
    ) -> MasterResult<()> {
        info!(group = group.id(), "requesting group configuration");
        for member in &group.definition().members {
            let unit = self.units.get_or_create(member);
            match configured.as_deref_mut() {
                None => self.configure_active_unit(&unit)?,
                Some(set) => {
                    if !set.contains(&unit.uuid()) {
                        self.configure_active_unit(&unit)?;
                        set.insert(unit.uuid());
                    }
                }
            }
        }
        Ok(())
    }

    pub fn startup_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.startup_active_group(&self.groups.get_or_create(group))
    }

    /// Startup every member; redundant startup commands are idempotent on
    /// the remote node, so no dedup set applies.
    pub fn startup_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        let definition = group.definition();
        info!(group = %definition.id, "requesting group startup");
        for member in &definition.members {
            info!(unit = %member.uuid, group = %definition.id, "starting up unit from group");
            self.units.get_or_create(member).startup_from_group(&definition)?;
        }
        Ok(())
    }

    pub fn activate_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.activate_active_group(&self.groups.get_or_create(group))
    }

    pub fn activate_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        let definition = group.definition();
        info!(group = %definition.id, "requesting group activation");
        for member in &definition.members {
            info!(unit = %member.uuid, group = %definition.id, "activating unit from group");
            self.units.get_or_create(member).activate_from_group(&definition)?;
        }
        Ok(())
    }

    pub fn deactivate_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.deactivate_active_group(&self.groups.get_or_create(group))
    }

    pub fn deactivate_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        let definition = group.definition();
        info!(group = %definition.id, "requesting group deactivation");
        for member in &definition.members {
            info!(unit = %member.uuid, group = %definition.id, "deactivating unit from group");
            self.units
                .get_or_create(member)
                .deactivate_from_group(&definition)?;
        }
        Ok(())
    }

    pub fn shutdown_group(&self, group: &GroupDefinition) -> MasterResult<()> {
        self.shutdown_active_group(&self.groups.get_or_create(group))
    }

    pub fn shutdown_active_group(&self, group: &Arc<ActiveGroup>) -> MasterResult<()> {
        let definition = group.definition();
        info!(group = %definition.id, "requesting group shutdown");
        for member in &definition.members {
            info!(unit = %member.uuid, group = %definition.id, "shutting down unit from group");
            self.units
                .get_or_create(member)
                .shutdown_from_group(&definition)?;
        }
        Ok(())
    }
}

/// Reconciliation of transport callbacks against the local mirror.
///
/// Unknown identities are logged and dropped; a callback never creates an
/// entity. Every handled event is re-broadcast to registered listeners
/// with the exact arguments received or derived.
impl RemoteClientListener for FleetOrchestrator {
    fn on_controller_connect_attempted(&self, uuid: Uuid) {
        self.listeners.signal_controller_connect_attempted(uuid);
    }

    fn on_controller_disconnect_attempted(&self, uuid: Uuid) {
        self.listeners.signal_controller_disconnect_attempted(uuid);
    }

    fn on_controller_heartbeat(&self, uuid: Uuid, timestamp: DateTime<Utc>) {
        let Some(controller) = self.controllers.lookup(uuid) else {
            warn!(controller = %uuid, "heartbeat from unknown controller");
            return;
        };
        controller.set_connection_state(ControllerConnectionState::Running);
        controller.record_heartbeat(timestamp);
        debug!(controller = %controller.display_name(), "got controller heartbeat");
        self.listeners.signal_controller_heartbeat(uuid, timestamp);
    }

    fn on_controller_status_change(&self, uuid: Uuid, state: ControllerConnectionState) {
        let Some(controller) = self.controllers.lookup(uuid) else {
            warn!(controller = %uuid, "status change for unknown controller");
            return;
        };
        controller.set_connection_state(state.clone());
        debug!(
            controller = %controller.display_name(),
            state = %state,
            "got controller status update"
        );
        self.listeners.signal_controller_status_change(uuid, &state);
    }

    fn on_unit_install(&self, uuid: Uuid, success: bool) {
        let Some(unit) = self.units.lookup(uuid) else {
            warn!(unit = %uuid, "status update for unknown unit");
            return;
        };
        if success {
            unit.set_state(UnitState::Ready);
            info!(unit = %uuid, "unit deployed successfully");
        } else {
            unit.set_state(UnitState::DeployFailure);
            info!(unit = %uuid, "unit deployment failed");
        }
        self.listeners
            .signal_unit_install(uuid, success, self.clock.now());
    }

    fn on_unit_state_change(&self, uuid: Uuid, new_state: UnitState) {
        let Some(unit) = self.units.lookup(uuid) else {
            warn!(unit = %uuid, "status update for unknown unit");
            return;
        };
        let old_state = unit.reconcile_state(new_state);
        self.listeners
            .signal_unit_state_change(uuid, old_state, new_state);
    }
}

impl std::fmt::Debug for FleetOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetOrchestrator")
            .field("strict_transitions", &self.strict_transitions)
            .finish_non_exhaustive()
    }
}
