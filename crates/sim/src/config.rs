//! Simulation configuration. Loaded from `splatwalk.ron` at startup.

use crate::error::InitError;
use audio::CueConfig;
use engine_core::FixedStepper;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// All tunables of the simulation. Every field has a serde default, so a
/// partial `splatwalk.ron` only overrides what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub stepper: StepperConfig,
    pub world: WorldConfig,
    pub player: PlayerConfig,
    pub grab: GrabConfig,
    pub projectiles: ProjectileConfig,
    pub cues: CueConfig,
    pub spawner: SpawnerConfig,
    pub hover: HoverConfig,
    pub props: PropsConfig,
    pub demo: DemoConfig,
}

/// Highest physics rate accepted; the sub-step must stay a whole number of nanoseconds.
pub const MAX_SUB_STEP_HZ: f64 = 10_000.0;

/// Fixed-timestep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Physics rate in Hz (sub-step = 1 / rate).
    #[serde(default = "default_sub_step_hz")]
    pub sub_step_hz: f64,
    /// Frame time is clamped to this before it is accumulated.
    #[serde(default = "default_max_frame_ms")]
    pub max_frame_ms: u64,
    /// Catch-up cap per frame.
    #[serde(default = "default_max_sub_steps")]
    pub max_sub_steps: u32,
}

fn default_sub_step_hz() -> f64 {
    60.0
}
fn default_max_frame_ms() -> u64 {
    100
}
fn default_max_sub_steps() -> u32 {
    5
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            sub_step_hz: default_sub_step_hz(),
            max_frame_ms: default_max_frame_ms(),
            max_sub_steps: default_max_sub_steps(),
        }
    }
}

impl StepperConfig {
    pub fn build(&self) -> FixedStepper {
        FixedStepper::with_rate(
            self.sub_step_hz,
            Duration::from_millis(self.max_frame_ms),
            self.max_sub_steps,
        )
    }
}

/// Static collision proxy standing in for a solid surface of the scanned scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticBox {
    pub center: [f32; 3],
    pub half_extents: [f32; 3],
    /// Rotation about Y in radians.
    #[serde(default)]
    pub yaw: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Scene units per metre; gravity is `-gravity * scale`.
    pub scale: f32,
    pub gravity: f32,
    /// Top surface of the floor proxy.
    pub floor_height: f32,
    pub floor_half_extent: f32,
    pub static_boxes: Vec<StaticBox>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            gravity: 9.81,
            floor_height: 0.0,
            floor_half_extent: 50.0,
            static_boxes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub spawn: [f32; 3],
    /// Capsule half-height (cylinder part).
    pub half_height: f32,
    pub radius: f32,
    /// Extra ray length below the capsule for the ground probe.
    pub ground_margin: f32,
    /// Minimum surface normal Y that counts as standing ground.
    pub min_ground_normal_y: f32,
    /// Rising faster than this is never grounded.
    pub max_grounded_upward_speed: f32,
    pub move_speed: f32,
    pub flight_speed: f32,
    /// Metres per second; multiplied by `world.scale` like gravity. Low
    /// enough that a jump tops out within ten 60 Hz sub-steps.
    pub jump_speed: f32,
    /// Camera height above the body centre.
    pub eye_height: f32,
    pub mouse_sensitivity: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn: [0.0, 1.0, 0.0],
            half_height: 0.5,
            radius: 0.3,
            ground_margin: 0.1,
            min_ground_normal_y: 0.7,
            max_grounded_upward_speed: 1.0,
            move_speed: 4.0,
            flight_speed: 6.0,
            jump_speed: 1.4,
            eye_height: 0.6,
            mouse_sensitivity: 0.002,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    pub hold_distance: f32,
    pub launch_speed: f32,
    /// Radians per second of in-hand rotation while a rotate key is held.
    pub rotate_speed: f32,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            hold_distance: 2.0,
            launch_speed: 15.0,
            rotate_speed: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileConfig {
    pub capacity: usize,
    pub radius: f32,
    /// Spawn point distance in front of the camera.
    pub spawn_offset: f32,
    pub launch_speed: f32,
    pub restitution: f32,
    /// Bounce sound, relative to `spawner.sound_root`.
    pub sound: String,
    pub color: [f32; 4],
}

impl Default for ProjectileConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            radius: 0.1,
            spawn_offset: 0.6,
            launch_speed: 20.0,
            restitution: 0.6,
            sound: "bounce.ogg".to_string(),
            color: [0.9, 0.3, 0.2, 1.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerConfig {
    /// Distance in front of the camera where new assets appear.
    pub spawn_distance: f32,
    pub default_scale: f32,
    /// Half-extent of the cube used when an asset has no usable bounds.
    pub fallback_half_extent: f32,
    /// Directory sound references are resolved against.
    pub sound_root: PathBuf,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            spawn_distance: 3.0,
            default_scale: 1.0,
            fallback_half_extent: 0.5,
            sound_root: PathBuf::from("assets/sounds"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HoverConfig {
    /// Pick once every this many frames.
    pub interval_frames: u64,
    pub max_distance: f32,
    /// Emissive value written onto the hovered mesh.
    pub highlight: [f32; 3],
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            interval_frames: 5,
            max_distance: 10.0,
            highlight: [0.35, 0.35, 0.15],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropsConfig {
    /// Where the bottom layer of a new tower stands.
    pub base: [f32; 3],
    /// Block size: length, height, width.
    pub block_size: [f32; 3],
    pub color: [f32; 4],
    pub sound: String,
}

impl Default for PropsConfig {
    fn default() -> Self {
        Self {
            base: [0.0, 0.0, -4.0],
            block_size: [1.5, 0.3, 0.5],
            color: [0.76, 0.6, 0.42, 1.0],
            sound: "knock.ogg".to_string(),
        }
    }
}

/// Asset queued by the headless demo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoAsset {
    pub reference: String,
    #[serde(default)]
    pub sounds: Vec<String>,
    #[serde(default)]
    pub scale: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub frames: u64,
    pub frame_ms: u64,
    pub asset_root: PathBuf,
    pub assets: Vec<DemoAsset>,
    pub tower_layers: u32,
    /// Seed for cue jitter.
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            frame_ms: 16,
            asset_root: PathBuf::from("assets"),
            assets: vec![DemoAsset {
                reference: "crate.glb".to_string(),
                sounds: vec!["thud.ogg".to_string()],
                scale: None,
            }],
            tower_layers: 6,
            seed: 7,
        }
    }
}

impl SimConfig {
    /// Load config from `splatwalk.ron`. If the file is missing or invalid, returns default config.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(data) = std::fs::read_to_string(path) {
            match ron::from_str(&data) {
                Ok(c) => {
                    log::info!("Loaded config from {:?}", path);
                    return c;
                }
                Err(e) => log::warn!("Invalid config at {:?}: {}, using defaults", path, e),
            }
        }
        Self::default()
    }

    /// Save current config to `splatwalk.ron`. Logs on error.
    pub fn save(&self) {
        let path = config_path();
        if let Err(e) = self.save_to(&path) {
            log::warn!("Could not write config to {:?}: {:#}", path, e);
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let s = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, s)?;
        Ok(())
    }

    /// Reject values the simulation cannot run with.
    pub fn validate(&self) -> Result<(), InitError> {
        fn positive(name: &str, value: f32) -> Result<(), InitError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(InitError::InvalidConfig(format!("{name} must be positive, got {value}")))
            }
        }

        let hz = self.stepper.sub_step_hz;
        if !(hz.is_finite() && hz > 0.0 && hz <= MAX_SUB_STEP_HZ) {
            return Err(InitError::InvalidConfig(format!(
                "stepper.sub_step_hz must be in (0, {MAX_SUB_STEP_HZ}], got {hz}"
            )));
        }
        if self.stepper.max_frame_ms == 0 {
            return Err(InitError::InvalidConfig("stepper.max_frame_ms must be at least 1".into()));
        }
        if self.stepper.max_sub_steps == 0 {
            return Err(InitError::InvalidConfig("stepper.max_sub_steps must be at least 1".into()));
        }
        if self.projectiles.capacity == 0 {
            return Err(InitError::InvalidConfig("projectiles.capacity must be at least 1".into()));
        }
        if self.hover.interval_frames == 0 {
            return Err(InitError::InvalidConfig("hover.interval_frames must be at least 1".into()));
        }
        positive("world.scale", self.world.scale)?;
        positive("player.half_height", self.player.half_height)?;
        positive("player.radius", self.player.radius)?;
        positive("player.move_speed", self.player.move_speed)?;
        positive("player.flight_speed", self.player.flight_speed)?;
        positive("player.jump_speed", self.player.jump_speed)?;
        positive("grab.hold_distance", self.grab.hold_distance)?;
        positive("grab.launch_speed", self.grab.launch_speed)?;
        positive("projectiles.radius", self.projectiles.radius)?;
        positive("projectiles.launch_speed", self.projectiles.launch_speed)?;
        positive("spawner.fallback_half_extent", self.spawner.fallback_half_extent)?;
        positive("spawner.default_scale", self.spawner.default_scale)?;
        positive("hover.max_distance", self.hover.max_distance)?;
        for (axis, size) in self.props.block_size.iter().enumerate() {
            positive(&format!("props.block_size[{axis}]"), *size)?;
        }
        Ok(())
    }
}

fn config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("splatwalk.ron")
}
