//! Dynamic asset spawner.
//!
//! Assets are parsed on a loader thread and cached by reference. Results come
//! back over a channel and are only turned into bodies and scene nodes on the
//! simulation thread, in [`AssetSpawner::poll`]. Each spawned model gets one
//! cuboid collider sized to the asset's local bounds.

use crate::animation::AnimationClock;
use crate::commands::{SimEvent, SpawnId, SpawnRequest};
use crate::config::SpawnerConfig;
use crate::error::SpawnError;
use crate::impacts::ImpactCues;
use crate::registry::EntityRegistry;
use crate::tracked::{guard, release_body, TrackedBody};
use engine_core::{Aabb, Transform};
use glam::Vec3;
use hecs::Entity;
use physics::{CollisionGroup, ColliderMaterial, DynamicBodyDesc, PhysicsResult, PhysicsWorld, RigidBodyHandle};
use scene::{AssetLoader, ParsedAsset, Scene};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

type LoadResult = (String, Result<ParsedAsset, String>);

/// Collider derived from an asset's bounds, in body space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedCollider {
    pub half_extents: Vec3,
    pub offset: Vec3,
    /// True when the unit cube replaced missing or degenerate bounds.
    pub fallback: bool,
}

/// One cuboid around the scaled bounds, or a cube of `fallback_half_extent`
/// when there is no geometry or any dimension is zero or NaN.
pub fn derive_collider(bounds: Option<Aabb>, scale: f32, fallback_half_extent: f32) -> DerivedCollider {
    let usable = bounds
        .filter(|b| !b.is_degenerate())
        .filter(|_| scale.is_finite() && scale > 0.0);
    match usable {
        Some(b) => DerivedCollider {
            half_extents: b.half_extents() * scale,
            offset: b.center() * scale,
            fallback: false,
        },
        None => DerivedCollider {
            half_extents: Vec3::splat(fallback_half_extent),
            offset: Vec3::ZERO,
            fallback: true,
        },
    }
}

/// A live runtime-spawned model.
#[derive(Debug, Clone)]
pub struct DynamicModel {
    pub id: SpawnId,
    pub reference: String,
    pub tracked: TrackedBody,
    pub meshes: Vec<Entity>,
    pub sound_bank: Vec<String>,
    pub animation: Option<AnimationClock>,
    pub collider: DerivedCollider,
}

/// Everything a spawn writes into.
pub struct SpawnTargets<'a> {
    pub physics: &'a mut PhysicsWorld,
    pub scene: &'a mut Scene,
    pub registry: &'a mut EntityRegistry,
    pub cues: &'a mut ImpactCues,
}

pub struct AssetSpawner {
    config: SpawnerConfig,
    cache: HashMap<String, Arc<ParsedAsset>>,
    /// Requests waiting on a load, keyed by reference.
    in_flight: HashMap<String, Vec<SpawnRequest>>,
    /// Requests whose asset is cached.
    ready: Vec<SpawnRequest>,
    rejected: Vec<(SpawnRequest, SpawnError)>,
    /// Results pulled off the channel by `wait_pending`, not yet applied.
    received: Vec<LoadResult>,
    requests: Sender<String>,
    results: Receiver<LoadResult>,
    models: Vec<DynamicModel>,
}

impl AssetSpawner {
    /// Start the loader thread.
    pub fn new(config: SpawnerConfig, loader: Arc<dyn AssetLoader>) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();

        std::thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                while let Ok(reference) = request_rx.recv() {
                    let result = loader.load(&reference).map_err(|e| format!("{e:#}"));
                    if result_tx.send((reference, result)).is_err() {
                        break; // Spawner dropped
                    }
                }
            })?;

        Ok(Self {
            config,
            cache: HashMap::new(),
            in_flight: HashMap::new(),
            ready: Vec::new(),
            rejected: Vec::new(),
            received: Vec::new(),
            requests: request_tx,
            results: result_rx,
            models: Vec::new(),
        })
    }

    /// Queue a spawn. Cached references skip the loader; a reference already
    /// being loaded shares that load.
    pub fn request(&mut self, request: SpawnRequest) {
        if self.cache.contains_key(&request.reference) {
            self.ready.push(request);
        } else if let Some(waiting) = self.in_flight.get_mut(&request.reference) {
            waiting.push(request);
        } else if self.requests.send(request.reference.clone()).is_ok() {
            log::debug!("loading {}", request.reference);
            self.in_flight.insert(request.reference.clone(), vec![request]);
        } else {
            self.rejected
                .push((request, SpawnError::Load("asset loader thread is not running".into())));
        }
    }

    /// Apply finished loads and instantiate everything that is ready at `position`.
    pub fn poll(&mut self, targets: &mut SpawnTargets, position: Vec3) -> Vec<SimEvent> {
        let mut events: Vec<SimEvent> = self
            .rejected
            .drain(..)
            .map(|(request, error)| failed(request, error))
            .collect();

        let mut finished = std::mem::take(&mut self.received);
        finished.extend(self.results.try_iter());
        for (reference, result) in finished {
            let waiting = self.in_flight.remove(&reference).unwrap_or_default();
            match result {
                Ok(asset) => {
                    log::info!(
                        "loaded {}: {} parts, {} clips",
                        reference,
                        asset.parts.len(),
                        asset.animations.len()
                    );
                    self.cache.insert(reference, Arc::new(asset));
                    self.ready.extend(waiting);
                }
                Err(message) => {
                    log::warn!("failed to load {}: {}", reference, message);
                    events.extend(
                        waiting
                            .into_iter()
                            .map(|request| failed(request, SpawnError::Load(message.clone()))),
                    );
                }
            }
        }

        for request in std::mem::take(&mut self.ready) {
            let Some(asset) = self.cache.get(&request.reference).cloned() else {
                events.push(failed(request, SpawnError::Load("asset missing from cache".into())));
                continue;
            };
            match self.instantiate(targets, &request, &asset, position) {
                Ok(event) => events.push(event),
                Err(error) => {
                    log::warn!("spawn of {} abandoned: {}", request.reference, error);
                    events.push(failed(request, error));
                }
            }
        }
        events
    }

    fn instantiate(
        &mut self,
        targets: &mut SpawnTargets,
        request: &SpawnRequest,
        asset: &ParsedAsset,
        position: Vec3,
    ) -> Result<SimEvent, SpawnError> {
        // Sounds first: a bad bank abandons the spawn before anything exists.
        for sound in &request.sound_refs {
            if !targets.cues.has_sound(sound) {
                let path = self.config.sound_root.join(sound);
                targets
                    .cues
                    .load_sound(sound, &path)
                    .map_err(|e| SpawnError::Sound(format!("{sound}: {e:#}")))?;
            }
        }

        let scale = match request.scale {
            Some(s) if s.is_finite() && s > 0.0 => s,
            Some(s) => {
                log::warn!("ignoring scale {} for {}", s, request.reference);
                self.config.default_scale
            }
            None => self.config.default_scale,
        };
        let collider = derive_collider(asset.local_bounds(), scale, self.config.fallback_half_extent);
        if collider.fallback {
            log::warn!("{} has no usable bounds, using fallback cube collider", request.reference);
        }

        let body = targets.physics.add_dynamic_body(DynamicBodyDesc::at(position))?;
        if let Err(e) = targets.physics.add_box_collider(
            body,
            collider.half_extents,
            collider.offset,
            CollisionGroup::Prop,
            ColliderMaterial::default(),
        ) {
            release_body(targets.physics, body);
            return Err(e.into());
        }

        let instance = targets
            .scene
            .instantiate(asset, Transform::from_position(position).with_scale(scale));
        targets.registry.link(body, instance.root);
        for mesh in &instance.meshes {
            targets.registry.register_grabbable(*mesh, body);
        }

        log::info!(
            "spawned {} #{} ({} meshes, body {:?})",
            request.reference,
            request.id,
            instance.meshes.len(),
            body
        );
        self.models.push(DynamicModel {
            id: request.id,
            reference: request.reference.clone(),
            tracked: TrackedBody::new(instance.root, body, Vec3::ZERO),
            meshes: instance.meshes,
            sound_bank: request.sound_refs.clone(),
            animation: AnimationClock::for_clips(&asset.animations),
            collider,
        });
        Ok(SimEvent::AssetSpawned {
            id: request.id,
            reference: request.reference.clone(),
            body,
            fallback_collider: collider.fallback,
        })
    }

    /// Block until every in-flight load has come back, or `timeout` passes.
    /// Returns whether nothing is left outstanding.
    pub fn wait_pending(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let outstanding = self
                .in_flight
                .keys()
                .filter(|r| !self.received.iter().any(|(done, _)| done == *r))
                .count();
            if outstanding == 0 {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(result) => self.received.push(result),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    /// Remove one model. Returns its body so holders can let go of it.
    pub fn despawn(
        &mut self,
        physics: &mut PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        id: SpawnId,
    ) -> Option<RigidBodyHandle> {
        let index = self.models.iter().position(|m| m.id == id)?;
        let model = self.models.remove(index);
        release_model(physics, scene, registry, &model);
        Some(model.tracked.body)
    }

    /// Remove every model: body, nodes, grabbable meshes and map entries.
    pub fn clear_all(
        &mut self,
        physics: &mut PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
    ) -> Vec<RigidBodyHandle> {
        let bodies: Vec<RigidBodyHandle> = self
            .models
            .drain(..)
            .map(|model| {
                release_model(physics, scene, registry, &model);
                model.tracked.body
            })
            .collect();
        log::info!("cleared {} dynamic assets", bodies.len());
        bodies
    }

    pub fn sync_poses(
        &mut self,
        physics: &PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
    ) -> PhysicsResult<()> {
        let mut stale = Vec::new();
        for model in &self.models {
            guard(model.tracked.sync_pose(physics, scene), model.tracked.body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(())
    }

    /// Impact cues use a random entry of each model's sound bank; models
    /// without a bank only refresh their velocity snapshot.
    pub fn check_impacts(
        &mut self,
        physics: &PhysicsWorld,
        scene: &mut Scene,
        registry: &mut EntityRegistry,
        cues: &mut ImpactCues,
        listener: Vec3,
    ) -> PhysicsResult<usize> {
        let mut stale = Vec::new();
        let mut fired = 0;
        for model in self.models.iter_mut() {
            let body = model.tracked.body;
            let sound = cues.pick_sound(&model.sound_bank);
            let result = cues
                .check_tracked(physics, &mut model.tracked, listener, sound.as_deref())
                .map(|hit| fired += hit as usize);
            guard(result, body, &mut stale)?;
        }
        self.drop_stale(scene, registry, &stale);
        Ok(fired)
    }

    pub fn advance_animations(&mut self, dt: f32) {
        for clock in self.models.iter_mut().filter_map(|m| m.animation.as_mut()) {
            clock.advance(dt);
        }
    }

    pub fn models(&self) -> &[DynamicModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains_body(&self, body: RigidBodyHandle) -> bool {
        self.models.iter().any(|m| m.tracked.body == body)
    }

    pub fn reset_snapshot(&mut self, body: RigidBodyHandle, velocity: Vec3) -> bool {
        match self.models.iter_mut().find(|m| m.tracked.body == body) {
            Some(model) => {
                model.tracked.last_velocity = velocity;
                true
            }
            None => false,
        }
    }

    pub fn is_cached(&self, reference: &str) -> bool {
        self.cache.contains_key(reference)
    }

    /// Loads not yet applied.
    pub fn pending_loads(&self) -> usize {
        self.in_flight.len()
    }

    fn drop_stale(&mut self, scene: &mut Scene, registry: &mut EntityRegistry, stale: &[RigidBodyHandle]) {
        if stale.is_empty() {
            return;
        }
        self.models.retain(|model| {
            if stale.contains(&model.tracked.body) {
                for mesh in &model.meshes {
                    registry.unregister_mesh(*mesh);
                }
                registry.unlink_body(model.tracked.body);
                scene.despawn_tree(model.tracked.root);
                false
            } else {
                true
            }
        });
    }
}

fn release_model(physics: &mut PhysicsWorld, scene: &mut Scene, registry: &mut EntityRegistry, model: &DynamicModel) {
    release_body(physics, model.tracked.body);
    scene.despawn_tree(model.tracked.root);
    for mesh in &model.meshes {
        registry.unregister_mesh(*mesh);
    }
    registry.unlink_body(model.tracked.body);
}

fn failed(request: SpawnRequest, error: SpawnError) -> SimEvent {
    SimEvent::AssetFailed {
        id: request.id,
        reference: request.reference,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::{CueConfig, SilentPlayer};
    use engine_core::Appearance;
    use scene::{AnimationClip, AssetPart};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubLoader {
        assets: HashMap<String, ParsedAsset>,
        loads: AtomicUsize,
    }

    impl AssetLoader for StubLoader {
        fn load(&self, reference: &str) -> anyhow::Result<ParsedAsset> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.assets
                .get(reference)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no such asset {reference}"))
        }
    }

    fn boxed_asset(reference: &str, half: Vec3) -> ParsedAsset {
        let mut asset = ParsedAsset::new(reference);
        for x in [-0.5, 0.5] {
            asset.parts.push(AssetPart {
                name: format!("part{x}"),
                local: Transform::from_position(Vec3::new(x, 0.0, 0.0)),
                bounds: Aabb::from_center_half_extents(Vec3::ZERO, half),
                appearance: Appearance::default(),
            });
        }
        asset
    }

    struct Fixture {
        physics: PhysicsWorld,
        scene: Scene,
        registry: EntityRegistry,
        cues: ImpactCues,
        spawner: AssetSpawner,
        loader: Arc<StubLoader>,
        next_id: SpawnId,
        _sounds: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let mut assets = HashMap::new();
        assets.insert("crate.glb".to_string(), boxed_asset("crate.glb", Vec3::splat(0.5)));
        let mut flat = boxed_asset("flat.glb", Vec3::new(0.5, 0.0, 0.5));
        flat.animations.push(AnimationClip {
            name: "spin".into(),
            duration: 1.0,
        });
        assets.insert("flat.glb".to_string(), flat);
        assets.insert("empty.glb".to_string(), ParsedAsset::new("empty.glb"));
        let loader = Arc::new(StubLoader {
            assets,
            loads: AtomicUsize::new(0),
        });

        let sounds = tempfile::tempdir().unwrap();
        std::fs::write(sounds.path().join("thud.ogg"), b"ogg").unwrap();
        let config = SpawnerConfig {
            sound_root: sounds.path().to_path_buf(),
            ..SpawnerConfig::default()
        };
        let spawner = AssetSpawner::new(config, loader.clone()).unwrap();
        Fixture {
            physics: PhysicsWorld::new(),
            scene: Scene::new(),
            registry: EntityRegistry::new(),
            cues: ImpactCues::new(CueConfig::default(), Box::new(SilentPlayer::new()), 5),
            spawner,
            loader,
            next_id: 1,
            _sounds: sounds,
        }
    }

    impl Fixture {
        fn request(&mut self, reference: &str, sounds: &[&str], scale: Option<f32>) -> SpawnId {
            let id = self.next_id;
            self.next_id += 1;
            self.spawner.request(SpawnRequest {
                id,
                reference: reference.to_string(),
                sound_refs: sounds.iter().map(|s| s.to_string()).collect(),
                scale,
            });
            id
        }

        fn settle(&mut self) -> Vec<SimEvent> {
            assert!(self.spawner.wait_pending(Duration::from_secs(5)));
            let mut targets = SpawnTargets {
                physics: &mut self.physics,
                scene: &mut self.scene,
                registry: &mut self.registry,
                cues: &mut self.cues,
            };
            self.spawner.poll(&mut targets, Vec3::new(0.0, 1.0, -3.0))
        }
    }

    fn spawned(events: &[SimEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SimEvent::AssetSpawned { .. }))
            .count()
    }

    #[test]
    fn same_reference_loads_once_and_instances_are_independent() {
        let mut f = fixture();
        f.request("crate.glb", &[], None);
        f.request("crate.glb", &[], None);
        assert_eq!(spawned(&f.settle()), 2);
        assert_eq!(f.loader.loads.load(Ordering::SeqCst), 1);

        f.request("crate.glb", &[], None);
        assert_eq!(spawned(&f.settle()), 1);
        assert_eq!(f.loader.loads.load(Ordering::SeqCst), 1);
        assert!(f.spawner.is_cached("crate.glb"));

        let models = f.spawner.models();
        assert_eq!(models.len(), 3);
        assert_ne!(models[0].tracked.root, models[1].tracked.root);
        assert_ne!(models[0].tracked.body, models[2].tracked.body);
        assert_eq!(f.registry.grabbable_meshes().len(), 6);
    }

    #[test]
    fn collider_wraps_scaled_bounds() {
        let mut f = fixture();
        f.request("crate.glb", &[], Some(2.0));
        f.settle();
        let model = &f.spawner.models()[0];
        assert!(!model.collider.fallback);
        // Two unit boxes side by side: 2 x 1 x 1, doubled.
        assert!((model.collider.half_extents - Vec3::new(2.0, 1.0, 1.0)).length() < 1e-5);
        assert_eq!(f.scene.transform(model.tracked.root).unwrap().scale, Vec3::splat(2.0));
    }

    #[test]
    fn degenerate_or_empty_bounds_use_unit_cube() {
        let mut f = fixture();
        f.request("flat.glb", &[], None);
        f.request("empty.glb", &[], None);
        let events = f.settle();
        assert_eq!(spawned(&events), 2);
        for model in f.spawner.models() {
            assert!(model.collider.fallback);
            assert_eq!(model.collider.half_extents, Vec3::splat(0.5));
        }
        assert!(events
            .iter()
            .all(|e| matches!(e, SimEvent::AssetSpawned { fallback_collider: true, .. })));
    }

    #[test]
    fn derive_collider_edge_cases() {
        let zero = Aabb::new(Vec3::ZERO, Vec3::ZERO);
        assert!(derive_collider(Some(zero), 1.0, 0.5).fallback);
        assert!(derive_collider(None, 1.0, 0.5).fallback);
        let nan = Aabb::new(Vec3::ZERO, Vec3::new(f32::NAN, 1.0, 1.0));
        assert!(derive_collider(Some(nan), 1.0, 0.5).fallback);

        let offset = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 4.0, 2.0));
        let c = derive_collider(Some(offset), 0.5, 0.5);
        assert!(!c.fallback);
        assert_eq!(c.half_extents, Vec3::new(0.5, 1.0, 0.5));
        assert_eq!(c.offset, Vec3::new(0.5, 1.0, 0.5));
    }

    #[test]
    fn load_failure_leaves_existing_models_alone() {
        let mut f = fixture();
        f.request("crate.glb", &[], None);
        f.settle();
        let id = f.request("missing.glb", &[], None);
        let events = f.settle();
        assert!(matches!(
            &events[..],
            [SimEvent::AssetFailed { id: got, error: SpawnError::Load(_), .. }] if *got == id
        ));
        assert_eq!(f.spawner.len(), 1);
        assert_eq!(f.spawner.pending_loads(), 0);
    }

    #[test]
    fn missing_sound_abandons_spawn_before_creating_anything() {
        let mut f = fixture();
        f.request("crate.glb", &["nope.ogg"], None);
        let events = f.settle();
        assert!(matches!(&events[..], [SimEvent::AssetFailed { error: SpawnError::Sound(_), .. }]));
        assert_eq!(f.physics.body_count(), 0);
        assert!(f.registry.is_empty());
        assert_eq!(f.scene.node_count(), 0);

        f.request("crate.glb", &["thud.ogg"], None);
        assert_eq!(spawned(&f.settle()), 1);
        assert_eq!(f.spawner.models()[0].sound_bank, vec!["thud.ogg".to_string()]);
    }

    #[test]
    fn clear_all_leaves_no_dangling_references() {
        let mut f = fixture();
        for _ in 0..3 {
            f.request("crate.glb", &[], None);
        }
        f.request("flat.glb", &[], None);
        f.settle();
        assert_eq!(f.spawner.len(), 4);

        let bodies = f.spawner.clear_all(&mut f.physics, &mut f.scene, &mut f.registry);
        assert_eq!(bodies.len(), 4);
        assert!(f.registry.grabbable_meshes().is_empty());
        assert!(f.registry.is_empty());
        assert!(bodies.iter().all(|b| !f.registry.references_body(*b)));
        assert_eq!(f.physics.body_count(), 0);
        assert_eq!(f.scene.node_count(), 0);
    }

    #[test]
    fn despawn_removes_only_that_model() {
        let mut f = fixture();
        let first = f.request("crate.glb", &[], None);
        f.request("crate.glb", &[], None);
        f.settle();
        let body = f
            .spawner
            .despawn(&mut f.physics, &mut f.scene, &mut f.registry, first)
            .unwrap();
        assert!(!f.registry.references_body(body));
        assert_eq!(f.spawner.len(), 1);
        assert_eq!(f.registry.grabbable_meshes().len(), 2);
        assert!(f.spawner.despawn(&mut f.physics, &mut f.scene, &mut f.registry, first).is_none());
    }

    #[test]
    fn stale_model_is_scrubbed_during_sync() {
        let mut f = fixture();
        f.request("crate.glb", &[], None);
        f.request("crate.glb", &[], None);
        f.settle();
        let gone = f.spawner.models()[0].tracked.body;
        f.physics.remove_body(gone).unwrap();

        f.spawner.sync_poses(&f.physics, &mut f.scene, &mut f.registry).unwrap();
        assert_eq!(f.spawner.len(), 1);
        assert!(!f.registry.references_body(gone));
        assert_eq!(f.registry.grabbable_meshes().len(), 2);
    }

    #[test]
    fn animation_clock_runs_for_animated_assets() {
        let mut f = fixture();
        f.request("flat.glb", &[], None);
        f.settle();
        f.spawner.advance_animations(0.25);
        let clock = f.spawner.models()[0].animation.as_ref().unwrap();
        assert_eq!(clock.clip(), "spin");
        assert!((clock.time() - 0.25).abs() < 1e-6);
    }
}
