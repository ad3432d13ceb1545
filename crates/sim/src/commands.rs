//! Typed command surface handed to the surrounding application, plus the
//! events the simulation reports back.

use crate::error::SpawnError;
use physics::{Liveness, RigidBodyHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Identifies one `spawn_dynamic_asset` call.
pub type SpawnId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    pub id: SpawnId,
    pub reference: String,
    /// Sound bank for this model's impact cues.
    pub sound_refs: Vec<String>,
    pub scale: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SpawnDynamicAsset(SpawnRequest),
    ClearAllDynamicAssets,
    ToggleDebugVisualization,
    ToggleFlightMode,
    SetMuted(bool),
    SpawnPropTower { layers: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    AssetSpawned {
        id: SpawnId,
        reference: String,
        body: RigidBodyHandle,
        /// The unit cube stood in for unusable bounds.
        fallback_collider: bool,
    },
    AssetFailed {
        id: SpawnId,
        reference: String,
        error: SpawnError,
    },
    AssetsCleared { count: usize },
    PropTowerBuilt { blocks: usize },
    FlightMode(bool),
    DebugVisualization(bool),
    Muted(bool),
    TornDown,
}

/// Cloneable handle for driving the simulation from other code. Commands are
/// queued and applied at the top of the next frame.
#[derive(Debug, Clone)]
pub struct SimCommands {
    sender: Sender<Command>,
    next_id: Arc<AtomicU64>,
    liveness: Liveness,
}

impl SimCommands {
    pub(crate) fn new(sender: Sender<Command>, liveness: Liveness) -> Self {
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
            liveness,
        }
    }

    pub fn spawn_dynamic_asset(&self, reference: &str, sound_refs: &[&str], scale: Option<f32>) -> SpawnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(Command::SpawnDynamicAsset(SpawnRequest {
            id,
            reference: reference.to_string(),
            sound_refs: sound_refs.iter().map(|s| s.to_string()).collect(),
            scale,
        }));
        id
    }

    pub fn clear_all_dynamic_assets(&self) {
        self.send(Command::ClearAllDynamicAssets);
    }

    pub fn toggle_debug_visualization(&self) {
        self.send(Command::ToggleDebugVisualization);
    }

    pub fn toggle_flight_mode(&self) {
        self.send(Command::ToggleFlightMode);
    }

    pub fn set_muted(&self, muted: bool) {
        self.send(Command::SetMuted(muted));
    }

    pub fn spawn_prop_tower(&self, layers: u32) {
        self.send(Command::SpawnPropTower { layers });
    }

    /// Stop the simulation. Takes effect immediately: no physics call is
    /// issued after this returns.
    pub fn teardown(&self) {
        self.liveness.kill();
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    fn send(&self, command: Command) {
        if !self.liveness.is_alive() {
            log::debug!("dropping {:?}: simulation torn down", command);
            return;
        }
        if let Err(e) = self.sender.send(command) {
            log::debug!("simulation gone, dropped {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn ids_are_unique_across_clones() {
        let (tx, rx) = mpsc::channel();
        let commands = SimCommands::new(tx, Liveness::default());
        let other = commands.clone();
        let a = commands.spawn_dynamic_asset("a.glb", &[], None);
        let b = other.spawn_dynamic_asset("b.glb", &["thud.ogg"], Some(2.0));
        assert_ne!(a, b);

        let received: Vec<Command> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        match &received[1] {
            Command::SpawnDynamicAsset(req) => {
                assert_eq!(req.sound_refs, vec!["thud.ogg".to_string()]);
                assert_eq!(req.scale, Some(2.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nothing_is_queued_after_teardown() {
        let (tx, rx) = mpsc::channel();
        let commands = SimCommands::new(tx, Liveness::default());
        commands.teardown();
        commands.toggle_flight_mode();
        assert!(!commands.is_alive());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn handle_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<SimCommands>();
    }
}
