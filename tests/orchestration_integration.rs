//! ---
//! fms_section: "15-testing-qa-runbook"
//! fms_subsection: "integration-tests"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Integration and validation tests for the R-FMS stack."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use r_fms_common::config::{MasterConfig, OrchestrationConfig, WatchdogConfig};
use r_fms_common::time::{ManualClock, SystemClock};
use r_fms_domain::{ControllerConnectionState, ControllerDefinition, UnitDefinition, UnitState};
use r_fms_master::{
    FleetOrchestrator, HeartbeatWatchdog, NullDeploymentManager, NullRemoteClient,
    RemoteClientListener,
};

fn orchestrator() -> Arc<FleetOrchestrator> {
    let clock = ManualClock::starting_at(Utc.timestamp_opt(0, 0).unwrap());
    Arc::new(FleetOrchestrator::new(
        Arc::new(NullRemoteClient),
        Arc::new(NullDeploymentManager),
        clock,
        &OrchestrationConfig::default(),
    ))
}

#[test]
fn racing_get_or_create_converges_on_one_entity() {
    let orchestrator = orchestrator();
    let definition = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            let definition = definition.clone();
            thread::spawn(move || orchestrator.active_controller(&definition))
        })
        .collect();

    let actives: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread panicked"))
        .collect();

    for active in &actives[1..] {
        assert!(Arc::ptr_eq(&actives[0], active));
    }
    assert_eq!(orchestrator.all_controllers().len(), 1);
}

#[test]
fn racing_unit_creation_keeps_index_consistent() {
    let orchestrator = orchestrator();
    let controller = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
    let unit = UnitDefinition::new(Uuid::new_v4(), "greeter", controller.clone());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let orchestrator = orchestrator.clone();
            let unit = unit.clone();
            thread::spawn(move || orchestrator.active_unit(&unit))
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    // One unit, backed by the one controller the race implied.
    let active = orchestrator.lookup_unit(unit.uuid).expect("unit exists");
    let owner = orchestrator
        .lookup_controller(controller.uuid)
        .expect("controller exists");
    assert!(Arc::ptr_eq(active.controller(), &owner));
    assert_eq!(orchestrator.all_controllers().len(), 1);
}

#[test]
fn concurrent_commands_and_callbacks_settle_on_callback_state() {
    let orchestrator = orchestrator();
    let controller = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
    let unit = UnitDefinition::new(Uuid::new_v4(), "greeter", controller.clone());
    orchestrator.active_unit(&unit);

    let command_side = {
        let orchestrator = orchestrator.clone();
        let unit = unit.clone();
        thread::spawn(move || {
            for _ in 0..100 {
                orchestrator.deploy_unit(&unit).unwrap();
            }
        })
    };
    let callback_side = {
        let orchestrator = orchestrator.clone();
        let uuid = unit.uuid;
        thread::spawn(move || {
            for _ in 0..100 {
                orchestrator.on_unit_install(uuid, true);
            }
        })
    };
    command_side.join().unwrap();
    callback_side.join().unwrap();

    // Both writers finished; the mirror holds one of the two states with
    // a timestamp stamped by the same write.
    let active = orchestrator.lookup_unit(unit.uuid).unwrap();
    let state = active.state();
    assert!(matches!(
        state,
        UnitState::DeployAttempt | UnitState::Ready
    ));
    assert!(active.last_state_update().is_some());

    // A final authoritative callback always wins.
    orchestrator.on_unit_install(unit.uuid, false);
    assert_eq!(active.state(), UnitState::DeployFailure);
}

#[test]
fn liveness_fallback_tracks_state_updates_before_first_heartbeat() {
    let clock = ManualClock::starting_at(Utc.timestamp_opt(100, 0).unwrap());
    let orchestrator = Arc::new(FleetOrchestrator::new(
        Arc::new(NullRemoteClient),
        Arc::new(NullDeploymentManager),
        clock.clone(),
        &OrchestrationConfig::default(),
    ));

    let controller = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
    let active = orchestrator.active_controller(&controller);
    assert_eq!(
        active.time_since_last_heartbeat(Utc.timestamp_opt(150, 0).unwrap()),
        None
    );

    orchestrator.connect_controller(&controller).unwrap();
    assert_eq!(
        active.time_since_last_heartbeat(Utc.timestamp_opt(150, 0).unwrap()),
        Some(chrono::Duration::seconds(50))
    );

    orchestrator.on_controller_heartbeat(controller.uuid, Utc.timestamp_opt(140, 0).unwrap());
    assert_eq!(active.connection_state(), ControllerConnectionState::Running);
    assert_eq!(
        active.time_since_last_heartbeat(Utc.timestamp_opt(150, 0).unwrap()),
        Some(chrono::Duration::seconds(10))
    );
}

#[test]
fn config_inventory_seeds_the_registries() {
    let raw = r#"
        [inventory.controllers.node-a]
        uuid = "7c9dcd3b-8f5e-4d21-9e2f-04c78d3f8b11"
        host_id = "rack1-node-a"

        [inventory.units.greeter]
        uuid = "d2719f50-11f3-4bd6-922e-17f838a1f3aa"
        controller = "node-a"

        [inventory.groups.lobby]
        members = ["greeter"]
    "#;
    let config: MasterConfig = raw.parse().expect("config parses");
    let orchestrator = orchestrator();

    orchestrator.active_controllers(&config.inventory.controller_definitions());
    orchestrator.active_units(&config.inventory.unit_definitions().unwrap());
    for group in config.inventory.group_definitions().unwrap() {
        orchestrator.active_group(&group);
    }

    let controller_uuid: Uuid = "7c9dcd3b-8f5e-4d21-9e2f-04c78d3f8b11".parse().unwrap();
    let unit_uuid: Uuid = "d2719f50-11f3-4bd6-922e-17f838a1f3aa".parse().unwrap();
    assert!(orchestrator.lookup_controller(controller_uuid).is_some());
    assert!(orchestrator.lookup_unit(unit_uuid).is_some());
    assert!(orchestrator.lookup_group("lobby").is_some());

    // Seeded entities receive callbacks instead of being dropped.
    orchestrator.on_controller_heartbeat(controller_uuid, Utc::now());
    assert_eq!(
        orchestrator
            .lookup_controller(controller_uuid)
            .unwrap()
            .connection_state(),
        ControllerConnectionState::Running
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn watchdog_runs_and_shuts_down_cleanly() {
    let clock = Arc::new(SystemClock);
    let orchestrator = Arc::new(FleetOrchestrator::new(
        Arc::new(NullRemoteClient),
        Arc::new(NullDeploymentManager),
        clock.clone(),
        &OrchestrationConfig::default(),
    ));
    let controller = ControllerDefinition::new(Uuid::new_v4(), "node-a", "host-1");
    orchestrator.connect_controller(&controller).unwrap();

    let watchdog = HeartbeatWatchdog::spawn(
        orchestrator.clone(),
        clock,
        WatchdogConfig {
            sample_interval: Duration::from_millis(10),
            max_heartbeat_silence: Duration::from_millis(10),
        },
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    watchdog.shutdown().await.unwrap();
}
