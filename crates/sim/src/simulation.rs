//! The simulation loop: one `frame` call per rendered frame.
//!
//! Frame order is fixed: commands, finished asset loads, input, player
//! movement, physics sub-steps, camera, animation, hover. Each sub-step runs
//! the physics advance, then projectile sync, then grab sync, then prop and
//! model sync, then impact cues.

use crate::commands::{Command, SimCommands, SimEvent, SpawnId};
use crate::config::SimConfig;
use crate::error::InitError;
use crate::grab::{GrabController, GrabTransition};
use crate::hover::HoverDetector;
use crate::impacts::ImpactCues;
use crate::player::{MoveIntent, PlayerController, PlayerState};
use crate::projectiles::ProjectilePool;
use crate::props::PropTower;
use crate::registry::EntityRegistry;
use crate::spawner::{AssetSpawner, SpawnTargets};
use audio::CuePlayer;
use engine_core::FixedStepper;
use glam::Vec3;
use input::InputState;
use physics::{Liveness, PhysicsError, PhysicsResult, PhysicsWorld, RigidBodyHandle};
use scene::{AssetLoader, Camera, DebugBox, FrameView, RenderBackend, Scene};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

/// Collaborators handed in at construction.
pub struct SimContext {
    pub loader: Arc<dyn AssetLoader>,
    pub audio: Box<dyn CuePlayer>,
}

/// What one frame did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub sub_steps: u32,
    /// The world was torn down; nothing after the abort point ran.
    pub aborted: bool,
    pub hover_ran: bool,
    pub player_state: Option<PlayerState>,
}

pub struct Simulation {
    config: SimConfig,
    physics: PhysicsWorld,
    scene: Scene,
    registry: EntityRegistry,
    camera: Camera,
    player: PlayerController,
    grab: GrabController,
    projectiles: ProjectilePool,
    towers: Vec<PropTower>,
    spawner: AssetSpawner,
    cues: ImpactCues,
    hover: HoverDetector,
    stepper: FixedStepper,
    liveness: Liveness,
    commands: Receiver<Command>,
    events: Vec<SimEvent>,
    debug_visualization: bool,
    teardown_reported: bool,
    frames: u64,
}

impl Simulation {
    /// Build the world and return it with the command handle for the host.
    /// Nothing is left half-built on error.
    pub fn new(config: SimConfig, context: SimContext) -> Result<(Self, SimCommands), InitError> {
        config.validate()?;

        let world = &config.world;
        let mut physics = PhysicsWorld::with_gravity(Vec3::new(0.0, -world.gravity * world.scale, 0.0));
        let stepper = config.stepper.build();
        physics.set_timestep(stepper.sub_step_seconds());

        // Floor top sits at floor_height.
        physics.add_static_cuboid(
            Vec3::new(0.0, world.floor_height - 0.5, 0.0),
            0.0,
            Vec3::new(world.floor_half_extent, 0.5, world.floor_half_extent),
        )?;
        for proxy in &world.static_boxes {
            physics.add_static_cuboid(Vec3::from(proxy.center), proxy.yaw, Vec3::from(proxy.half_extents))?;
        }

        let mut player_config = config.player.clone();
        player_config.jump_speed *= world.scale;
        let player = PlayerController::spawn(&mut physics, &player_config)?;
        physics.update_query_pipeline();

        let mut camera = Camera::new(player.eye_position(&physics)?);
        camera.sensitivity = config.player.mouse_sensitivity;

        let mut scene = Scene::new();
        let projectiles = ProjectilePool::new(config.projectiles.clone(), &mut scene);

        let mut cues = ImpactCues::new(config.cues.clone(), context.audio, config.demo.seed);
        for sound in [&config.projectiles.sound, &config.props.sound] {
            let path = config.spawner.sound_root.join(sound);
            if let Err(e) = cues.load_sound(sound, &path) {
                log::warn!("impact sound {} unavailable: {:#}", sound, e);
            }
        }

        let spawner = AssetSpawner::new(config.spawner.clone(), context.loader)?;
        let liveness = physics.liveness();
        let (sender, receiver) = mpsc::channel();
        let handle = SimCommands::new(sender, liveness.clone());

        log::info!(
            "simulation ready: {:.0} Hz physics, cap {} sub-steps, {} static proxies",
            config.stepper.sub_step_hz,
            stepper.max_sub_steps(),
            config.world.static_boxes.len()
        );

        let sim = Self {
            grab: GrabController::new(config.grab.clone()),
            hover: HoverDetector::new(config.hover.clone()),
            config,
            physics,
            scene,
            registry: EntityRegistry::new(),
            camera,
            player,
            projectiles,
            towers: Vec::new(),
            spawner,
            cues,
            stepper,
            liveness,
            commands: receiver,
            events: Vec::new(),
            debug_visualization: false,
            teardown_reported: false,
            frames: 0,
        };
        Ok((sim, handle))
    }

    /// Advance one rendered frame of `frame_dt` wall-clock time.
    pub fn frame(&mut self, input: &InputState, frame_dt: Duration) -> FrameReport {
        if !self.liveness.is_alive() {
            self.report_teardown();
            return FrameReport {
                aborted: true,
                ..FrameReport::default()
            };
        }

        self.frames += 1;
        match self.run_frame(input, frame_dt) {
            Ok(report) => report,
            Err(PhysicsError::TornDown) => {
                // Drop whatever was accumulated; the world is gone.
                self.stepper.reset();
                self.report_teardown();
                FrameReport {
                    aborted: true,
                    ..FrameReport::default()
                }
            }
            Err(e) => {
                log::error!("frame {} skipped: {}", self.frames, e);
                FrameReport::default()
            }
        }
    }

    fn run_frame(&mut self, input: &InputState, frame_dt: Duration) -> PhysicsResult<FrameReport> {
        self.apply_commands()?;

        let placement = self.camera.position() + self.camera.forward() * self.config.spawner.spawn_distance;
        let mut targets = SpawnTargets {
            physics: &mut self.physics,
            scene: &mut self.scene,
            registry: &mut self.registry,
            cues: &mut self.cues,
        };
        let spawned = self.spawner.poll(&mut targets, placement);
        self.events.extend(spawned);

        self.handle_input(input)?;

        let intent = MoveIntent::from_input(input);
        let player_state = self.player.apply_intent(&mut self.physics, &intent, &self.camera)?;

        let sub_steps = self.stepper.plan(frame_dt);
        let dt = self.stepper.sub_step_seconds();
        let rotate = input.get_rotate_input();
        for _ in 0..sub_steps {
            self.sub_step(rotate, dt)?;
        }
        self.towers.retain(|tower| !tower.is_empty());

        let eye = self.player.eye_position(&self.physics)?;
        self.camera.set_position(eye);
        self.spawner.advance_animations(sub_steps as f32 * dt);

        let aim_active = input.is_cursor_locked() && self.grab.held().is_none();
        let hover_ran = self.hover.update(
            &mut self.scene,
            &self.registry,
            self.camera.position(),
            self.camera.forward(),
            aim_active,
        );

        Ok(FrameReport {
            sub_steps,
            aborted: false,
            hover_ran,
            player_state: Some(player_state),
        })
    }

    fn handle_input(&mut self, input: &InputState) -> PhysicsResult<()> {
        if input.is_cursor_locked() {
            let delta = input.mouse_delta();
            self.camera.process_mouse(delta.x, delta.y);
        }
        if input.is_flight_toggle_pressed() {
            self.toggle_flight()?;
        }
        if input.is_debug_toggle_pressed() {
            self.toggle_debug_visualization();
        }

        if input.is_grab_pressed() {
            let target = self.hover.target();
            if let GrabTransition::Grabbed(body) = self.grab.trigger(&mut self.physics, target) {
                self.hover.restore(&mut self.scene);
                // The hold pins the body at rest from the next sub-step on.
                self.reset_snapshot(body, Vec3::ZERO);
            }
        }
        if input.is_launch_pressed() {
            match self.grab.launch(&mut self.physics, self.camera.forward()) {
                Ok(GrabTransition::Launched(body)) => {
                    let velocity = self.physics.linear_velocity(body)?;
                    self.reset_snapshot(body, velocity);
                }
                Ok(_) => {}
                Err(PhysicsError::StaleBody(body)) => log::warn!("launched body {:?} was already gone", body),
                Err(e) => return Err(e),
            }
        }
        if input.is_throw_pressed() {
            self.projectiles.spawn(
                &mut self.physics,
                &mut self.scene,
                &mut self.registry,
                self.camera.position(),
                self.camera.forward(),
            )?;
        }
        Ok(())
    }

    fn sub_step(&mut self, rotate: Vec3, dt: f32) -> PhysicsResult<()> {
        self.physics.step()?;
        self.projectiles
            .sync_poses(&self.physics, &mut self.scene, &mut self.registry)?;

        let eye = self.player.eye_position(&self.physics)?;
        self.grab
            .sync(&mut self.physics, eye, self.camera.forward(), rotate, dt)?;

        self.spawner
            .sync_poses(&self.physics, &mut self.scene, &mut self.registry)?;
        for tower in &mut self.towers {
            tower.sync_poses(&self.physics, &mut self.scene, &mut self.registry)?;
        }

        let listener = self.camera.position();
        self.projectiles.check_impacts(
            &self.physics,
            &mut self.scene,
            &mut self.registry,
            &mut self.cues,
            listener,
        )?;
        self.spawner.check_impacts(
            &self.physics,
            &mut self.scene,
            &mut self.registry,
            &mut self.cues,
            listener,
        )?;
        for tower in &mut self.towers {
            tower.check_impacts(
                &self.physics,
                &mut self.scene,
                &mut self.registry,
                &mut self.cues,
                listener,
            )?;
        }
        Ok(())
    }

    fn apply_commands(&mut self) -> PhysicsResult<()> {
        while let Ok(command) = self.commands.try_recv() {
            log::debug!("command {:?}", command);
            self.apply(command)?;
        }
        Ok(())
    }

    fn apply(&mut self, command: Command) -> PhysicsResult<()> {
        match command {
            Command::SpawnDynamicAsset(request) => self.spawner.request(request),
            Command::ClearAllDynamicAssets => {
                let bodies = self
                    .spawner
                    .clear_all(&mut self.physics, &mut self.scene, &mut self.registry);
                for body in &bodies {
                    self.release_holds(*body);
                }
                self.events.push(SimEvent::AssetsCleared { count: bodies.len() });
            }
            Command::ToggleDebugVisualization => self.toggle_debug_visualization(),
            Command::ToggleFlightMode => self.toggle_flight()?,
            Command::SetMuted(muted) => {
                self.cues.set_muted(muted);
                self.events.push(SimEvent::Muted(muted));
            }
            Command::SpawnPropTower { layers } => {
                let tower = PropTower::build(
                    &mut self.physics,
                    &mut self.scene,
                    &mut self.registry,
                    &self.config.props,
                    layers,
                )?;
                self.events.push(SimEvent::PropTowerBuilt { blocks: tower.len() });
                self.towers.push(tower);
            }
        }
        Ok(())
    }

    /// Remove one runtime-spawned asset. Returns whether it existed.
    pub fn despawn_dynamic_asset(&mut self, id: SpawnId) -> bool {
        match self
            .spawner
            .despawn(&mut self.physics, &mut self.scene, &mut self.registry, id)
        {
            Some(body) => {
                self.release_holds(body);
                true
            }
            None => false,
        }
    }

    /// A velocity forced outside the solver is not an impact.
    fn reset_snapshot(&mut self, body: RigidBodyHandle, velocity: Vec3) {
        let found = self.spawner.reset_snapshot(body, velocity)
            || self.projectiles.reset_snapshot(body, velocity)
            || self
                .towers
                .iter_mut()
                .any(|tower| tower.reset_snapshot(body, velocity));
        if !found {
            log::debug!("no velocity snapshot for {:?}", body);
        }
    }

    /// Let go of a body that no longer exists.
    fn release_holds(&mut self, body: RigidBodyHandle) {
        self.grab.forget(body);
        self.hover.forget_body(body);
    }

    fn toggle_flight(&mut self) -> PhysicsResult<()> {
        let flying = self.player.toggle_flight(&mut self.physics)?;
        self.events.push(SimEvent::FlightMode(flying));
        Ok(())
    }

    fn toggle_debug_visualization(&mut self) {
        self.debug_visualization = !self.debug_visualization;
        log::info!(
            "collider overlay {}",
            if self.debug_visualization { "on" } else { "off" }
        );
        self.events.push(SimEvent::DebugVisualization(self.debug_visualization));
    }

    fn report_teardown(&mut self) {
        if !self.teardown_reported {
            self.teardown_reported = true;
            log::info!("simulation torn down after {} frames", self.frames);
            self.events.push(SimEvent::TornDown);
        }
    }

    /// Hand the current scene to a backend. Collider boxes are included while
    /// the overlay is on.
    pub fn render(&self, backend: &mut dyn RenderBackend) -> anyhow::Result<()> {
        let debug_boxes: Vec<DebugBox> = if self.debug_visualization {
            self.physics
                .debug_shapes()
                .into_iter()
                .map(|shape| DebugBox {
                    center: shape.center,
                    half_extents: shape.half_extents,
                    rotation: shape.rotation,
                })
                .collect()
        } else {
            Vec::new()
        };
        backend.render(&FrameView {
            scene: &self.scene,
            camera: &self.camera,
            debug_boxes: &debug_boxes,
        })
    }

    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Block until outstanding asset loads finish (headless runs and tests).
    /// They are instantiated on the next frame.
    pub fn wait_for_assets(&mut self, timeout: Duration) -> bool {
        self.spawner.wait_pending(timeout)
    }

    pub fn teardown(&self) {
        self.liveness.kill();
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn player(&self) -> &PlayerController {
        &self.player
    }

    pub fn grab(&self) -> &GrabController {
        &self.grab
    }

    pub fn hover(&self) -> &HoverDetector {
        &self.hover
    }

    pub fn projectiles(&self) -> &ProjectilePool {
        &self.projectiles
    }

    pub fn spawner(&self) -> &AssetSpawner {
        &self.spawner
    }

    pub fn towers(&self) -> &[PropTower] {
        &self.towers
    }

    pub fn cues(&self) -> &ImpactCues {
        &self.cues
    }

    pub fn is_debug_visualization(&self) -> bool {
        self.debug_visualization
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
