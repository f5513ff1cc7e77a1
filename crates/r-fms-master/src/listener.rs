//! ---
//! fms_section: "03-fleet-orchestration"
//! fms_subsection: "module"
//! fms_type: "source"
//! fms_scope: "code"
//! fms_description: "Active-entity registries and lifecycle orchestration."
//! fms_version: "v0.0.0-prealpha"
//! fms_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use r_fms_domain::{ControllerConnectionState, UnitState};

/// Observer of reconciled fleet events.
///
/// All methods have empty default bodies so observers implement only the
/// events they care about.
#[allow(unused_variables)]
pub trait FleetListener: Send + Sync {
    fn on_controller_connect_attempted(&self, uuid: Uuid) {}
    fn on_controller_disconnect_attempted(&self, uuid: Uuid) {}
    fn on_controller_heartbeat(&self, uuid: Uuid, timestamp: DateTime<Utc>) {}
    fn on_controller_status_change(&self, uuid: Uuid, state: &ControllerConnectionState) {}
    fn on_unit_install(&self, uuid: Uuid, success: bool, timestamp: DateTime<Utc>) {}
    fn on_unit_state_change(&self, uuid: Uuid, old_state: UnitState, new_state: UnitState) {}
}

/// Fan-out multiplexer over any number of [`FleetListener`]s.
///
/// Listeners may be added and removed at runtime; a broadcast walks a
/// snapshot of the current list so a slow listener callback never holds
/// the registration lock.
#[derive(Default)]
pub struct ListenerHub {
    listeners: RwLock<Vec<Arc<dyn FleetListener>>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn FleetListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn FleetListener>) {
        self.listeners
            .write()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    fn snapshot(&self) -> Vec<Arc<dyn FleetListener>> {
        self.listeners.read().clone()
    }

    pub fn signal_controller_connect_attempted(&self, uuid: Uuid) {
        for listener in self.snapshot() {
            listener.on_controller_connect_attempted(uuid);
        }
    }

    pub fn signal_controller_disconnect_attempted(&self, uuid: Uuid) {
        for listener in self.snapshot() {
            listener.on_controller_disconnect_attempted(uuid);
        }
    }

    pub fn signal_controller_heartbeat(&self, uuid: Uuid, timestamp: DateTime<Utc>) {
        for listener in self.snapshot() {
            listener.on_controller_heartbeat(uuid, timestamp);
        }
    }

    pub fn signal_controller_status_change(&self, uuid: Uuid, state: &ControllerConnectionState) {
        for listener in self.snapshot() {
            listener.on_controller_status_change(uuid, state);
        }
    }

    pub fn signal_unit_install(&self, uuid: Uuid, success: bool, timestamp: DateTime<Utc>) {
        for listener in self.snapshot() {
            listener.on_unit_install(uuid, success, timestamp);
        }
    }

    pub fn signal_unit_state_change(&self, uuid: Uuid, old_state: UnitState, new_state: UnitState) {
        for listener in self.snapshot() {
            listener.on_unit_state_change(uuid, old_state, new_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingListener {
        heartbeats: Mutex<Vec<Uuid>>,
    }

    impl FleetListener for CountingListener {
        fn on_controller_heartbeat(&self, uuid: Uuid, _timestamp: DateTime<Utc>) {
            self.heartbeats.lock().push(uuid);
        }
    }

    #[test]
    fn broadcast_reaches_all_registered_listeners() {
        let hub = ListenerHub::new();
        let first = Arc::new(CountingListener::default());
        let second = Arc::new(CountingListener::default());
        hub.add_listener(first.clone());
        hub.add_listener(second.clone());

        let uuid = Uuid::new_v4();
        hub.signal_controller_heartbeat(uuid, Utc::now());
        assert_eq!(first.heartbeats.lock().as_slice(), &[uuid]);
        assert_eq!(second.heartbeats.lock().as_slice(), &[uuid]);
    }

    #[test]
    fn removed_listener_no_longer_receives_events() {
        let hub = ListenerHub::new();
        let listener = Arc::new(CountingListener::default());
        let handle: Arc<dyn FleetListener> = listener.clone();
        hub.add_listener(handle.clone());
        hub.remove_listener(&handle);

        hub.signal_controller_heartbeat(Uuid::new_v4(), Utc::now());
        assert!(listener.heartbeats.lock().is_empty());
    }
}
