//! Collision cue parameters: how loud and how high a bounce sounds.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Tuning for impact cues. Distances are in scene units, speeds in units/s.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CueConfig {
    /// A cue fires only when the per-sub-step velocity change exceeds this.
    pub detection_threshold: f32,
    /// Distance at which attenuation starts.
    pub ref_distance: f32,
    /// Beyond this the impact is out of earshot and no cue is produced.
    pub max_distance: f32,
    /// Inverse-distance rolloff factor.
    pub rolloff: f32,
    /// Distance gain never drops below this inside `max_distance`.
    pub min_gain: f32,
    /// Impact speed mapped to full loudness and maximum pitch.
    pub max_impact_speed: f32,
    /// Gain multiplier applied to the slowest impacts.
    pub quiet_gain: f32,
    pub min_rate: f32,
    pub max_rate: f32,
    /// Half-width of the random playback-rate multiplier (0.08 = ±8%).
    pub rate_jitter: f32,
}

impl Default for CueConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 2.0,
            ref_distance: 1.0,
            max_distance: 30.0,
            rolloff: 1.0,
            min_gain: 0.05,
            max_impact_speed: 15.0,
            quiet_gain: 0.2,
            min_rate: 0.8,
            max_rate: 1.3,
            rate_jitter: 0.08,
        }
    }
}

/// Playback parameters for one impact sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactCue {
    pub gain: f32,
    pub playback_rate: f32,
}

/// Strictly greater than: resting contact noise right at the threshold stays silent.
pub fn exceeds_threshold(delta_velocity: Vec3, threshold: f32) -> bool {
    delta_velocity.length() > threshold
}

/// Gain and playback rate for an impact heard from `listener`.
///
/// `jitter` is the random rate multiplier drawn by the caller, expected in
/// `[1 - rate_jitter, 1 + rate_jitter]`. Returns `None` beyond `max_distance`.
pub fn impact_cue(
    config: &CueConfig,
    impact_position: Vec3,
    impact_velocity: Vec3,
    listener: Vec3,
    jitter: f32,
) -> Option<ImpactCue> {
    let distance = impact_position.distance(listener);
    if !distance.is_finite() || distance > config.max_distance {
        return None;
    }

    let ref_distance = config.ref_distance.max(f32::EPSILON);
    let attenuation =
        ref_distance / (ref_distance + config.rolloff * (distance.max(ref_distance) - ref_distance));
    let distance_gain = attenuation.max(config.min_gain);

    let speed = impact_velocity.length();
    let normalized = if config.max_impact_speed > 0.0 {
        (speed / config.max_impact_speed).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let gain = distance_gain * (config.quiet_gain + (1.0 - config.quiet_gain) * normalized);
    let rate = config.min_rate + (config.max_rate - config.min_rate) * normalized;

    Some(ImpactCue {
        gain,
        playback_rate: rate * jitter,
    })
}
