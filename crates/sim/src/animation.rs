//! Looping clock for a spawned model's first animation clip.

use scene::AnimationClip;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClock {
    clip: String,
    duration: f32,
    time: f32,
}

impl AnimationClock {
    pub fn new(clip: &AnimationClip) -> Self {
        Self {
            clip: clip.name.clone(),
            duration: clip.duration,
            time: 0.0,
        }
    }

    /// First clip of an asset, if it has any.
    pub fn for_clips(clips: &[AnimationClip]) -> Option<Self> {
        clips.first().map(Self::new)
    }

    pub fn advance(&mut self, dt: f32) {
        if self.duration > 0.0 && dt.is_finite() {
            self.time = (self.time + dt).rem_euclid(self.duration);
        }
    }

    pub fn clip(&self) -> &str {
        &self.clip
    }

    /// Playhead in seconds, in `[0, duration)`.
    pub fn time(&self) -> f32 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loops_over_clip_length() {
        let mut clock = AnimationClock::new(&AnimationClip {
            name: "idle".into(),
            duration: 2.0,
        });
        clock.advance(1.5);
        clock.advance(1.0);
        assert!((clock.time() - 0.5).abs() < 1e-5);
        assert_eq!(clock.clip(), "idle");
    }

    #[test]
    fn zero_length_clip_stays_put() {
        let mut clock = AnimationClock::new(&AnimationClip {
            name: "pose".into(),
            duration: 0.0,
        });
        clock.advance(1.0);
        assert_eq!(clock.time(), 0.0);
        assert!(AnimationClock::for_clips(&[]).is_none());
    }
}
