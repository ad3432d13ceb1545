//! Collision audio cues: detect bounces from per-sub-step velocity deltas and
//! hand gain/rate to the audio collaborator.

use crate::tracked::TrackedBody;
use audio::{exceeds_threshold, impact_cue, CueConfig, CuePlayer};
use glam::Vec3;
use physics::{PhysicsResult, PhysicsWorld};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

pub struct ImpactCues {
    config: CueConfig,
    rng: StdRng,
    player: Box<dyn CuePlayer>,
    fired: u64,
}

impl ImpactCues {
    pub fn new(config: CueConfig, player: Box<dyn CuePlayer>, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            player,
            fired: 0,
        }
    }

    pub fn config(&self) -> &CueConfig {
        &self.config
    }

    /// Fire a cue if the velocity change since the last sub-step exceeds the
    /// detection threshold. Returns whether the player was invoked.
    pub fn check(
        &mut self,
        position: Vec3,
        last_velocity: Vec3,
        velocity: Vec3,
        listener: Vec3,
        sound: &str,
    ) -> bool {
        let delta = velocity - last_velocity;
        if !exceeds_threshold(delta, self.config.detection_threshold) {
            return false;
        }

        let spread = self.config.rate_jitter.abs();
        let jitter = if spread > 0.0 {
            self.rng.gen_range((1.0 - spread)..=(1.0 + spread))
        } else {
            1.0
        };
        let Some(cue) = impact_cue(&self.config, position, delta, listener, jitter) else {
            return false;
        };

        if let Err(e) = self.player.play_cue(sound, cue) {
            log::warn!("impact cue {} failed: {:#}", sound, e);
        }
        self.fired += 1;
        true
    }

    /// Check a tracked body against its last velocity, then take the new snapshot.
    pub fn check_tracked(
        &mut self,
        physics: &PhysicsWorld,
        tracked: &mut TrackedBody,
        listener: Vec3,
        sound: Option<&str>,
    ) -> PhysicsResult<bool> {
        let velocity = physics.linear_velocity(tracked.body)?;
        let position = physics.translation(tracked.body)?;
        let fired = match sound {
            Some(sound) => self.check(position, tracked.last_velocity, velocity, listener, sound),
            None => false,
        };
        tracked.last_velocity = velocity;
        Ok(fired)
    }

    /// Random entry of a sound bank.
    pub fn pick_sound(&mut self, bank: &[String]) -> Option<String> {
        bank.choose(&mut self.rng).cloned()
    }

    pub fn load_sound(&mut self, name: &str, path: &Path) -> anyhow::Result<()> {
        self.player.load_sound(name, path)
    }

    pub fn has_sound(&self, name: &str) -> bool {
        self.player.has_sound(name)
    }

    /// Muting silences playback; detection keeps running.
    pub fn set_muted(&mut self, muted: bool) {
        self.player.set_muted(muted);
    }

    pub fn is_muted(&self) -> bool {
        self.player.is_muted()
    }

    /// Cues handed to the player so far.
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio::ImpactCue;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Recorder(Rc<RefCell<Vec<(String, ImpactCue)>>>);

    impl CuePlayer for Recorder {
        fn load_sound(&mut self, _name: &str, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
        fn has_sound(&self, _name: &str) -> bool {
            true
        }
        fn play_cue(&mut self, name: &str, cue: ImpactCue) -> anyhow::Result<()> {
            self.0.borrow_mut().push((name.to_string(), cue));
            Ok(())
        }
        fn set_muted(&mut self, _muted: bool) {}
        fn is_muted(&self) -> bool {
            false
        }
    }

    fn cues() -> (ImpactCues, Recorder) {
        let recorder = Recorder::default();
        (ImpactCues::new(CueConfig::default(), Box::new(recorder.clone()), 1), recorder)
    }

    #[test]
    fn fires_only_above_threshold() {
        let (mut cues, recorder) = cues();
        let last = Vec3::new(0.0, -3.0, 0.0);

        assert!(!cues.check(Vec3::ZERO, last, Vec3::new(0.0, -1.1, 0.0), Vec3::ZERO, "bounce"));
        assert_eq!(recorder.0.borrow().len(), 0);

        assert!(cues.check(Vec3::ZERO, last, Vec3::new(0.0, -0.9, 0.0), Vec3::ZERO, "bounce"));
        assert_eq!(recorder.0.borrow().len(), 1);
        assert_eq!(cues.fired(), 1);
    }

    #[test]
    fn jitter_stays_in_band() {
        let (mut cues, recorder) = cues();
        for _ in 0..50 {
            cues.check(Vec3::ZERO, Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, "bounce");
        }
        let played = recorder.0.borrow();
        assert_eq!(played.len(), 50);
        let base = impact_cue(&CueConfig::default(), Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 1.0)
            .unwrap()
            .playback_rate;
        assert!(played
            .iter()
            .all(|(_, cue)| (cue.playback_rate / base - 1.0).abs() <= 0.08 + 1e-4));
        assert!(played.iter().any(|(_, cue)| cue.playback_rate != played[0].1.playback_rate));
    }

    #[test]
    fn out_of_earshot_is_not_a_cue() {
        let (mut cues, recorder) = cues();
        let far = Vec3::new(100.0, 0.0, 0.0);
        assert!(!cues.check(far, Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::ZERO, "bounce"));
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn check_tracked_updates_snapshot_without_a_sound() {
        use physics::DynamicBodyDesc;
        let mut physics = PhysicsWorld::new();
        let mut desc = DynamicBodyDesc::at(Vec3::ZERO);
        desc.linear_velocity = Vec3::new(0.0, 0.0, 9.0);
        let body = physics.add_dynamic_body(desc).unwrap();
        let mut tracked = TrackedBody::new(hecs::World::new().spawn(()), body, Vec3::ZERO);

        let (mut cues, recorder) = cues();
        assert!(!cues.check_tracked(&physics, &mut tracked, Vec3::ZERO, None).unwrap());
        assert_eq!(tracked.last_velocity, Vec3::new(0.0, 0.0, 9.0));
        assert!(recorder.0.borrow().is_empty());
    }
}
