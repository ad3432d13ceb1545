//! Impact audio: cue math plus a Kira-backed player.

pub mod cue;

pub use cue::*;

use anyhow::{Context, Result};
use kira::{
    manager::{backend::DefaultBackend, AudioManager, AudioManagerSettings},
    sound::static_sound::{StaticSoundData, StaticSoundHandle, StaticSoundSettings},
    tween::Tween,
};
use std::collections::HashMap;
use std::path::Path;

/// Audio collaborator used by the simulation: decode once, play many.
pub trait CuePlayer {
    /// Decode a sound file and register it under `name`.
    fn load_sound(&mut self, name: &str, path: &Path) -> Result<()>;

    fn has_sound(&self, name: &str) -> bool;

    /// Play a registered sound with the cue's gain and playback rate.
    /// Unknown names are ignored.
    fn play_cue(&mut self, name: &str, cue: ImpactCue) -> Result<()>;

    fn set_muted(&mut self, muted: bool);

    fn is_muted(&self) -> bool;
}

/// Main audio system managing decoded sounds and live playback handles.
pub struct AudioSystem {
    manager: AudioManager,
    sounds: HashMap<String, StaticSoundData>,
    active_sounds: Vec<StaticSoundHandle>,
    muted: bool,
}

impl AudioSystem {
    /// Create a new audio system on the default output device.
    pub fn new() -> Result<Self> {
        let manager = AudioManager::<DefaultBackend>::new(AudioManagerSettings::default())
            .context("failed to open audio output")?;

        Ok(Self {
            manager,
            sounds: HashMap::new(),
            active_sounds: Vec::new(),
            muted: false,
        })
    }

    /// Clean up finished sounds.
    pub fn cleanup(&mut self) {
        self.active_sounds
            .retain(|handle| handle.state() != kira::sound::PlaybackState::Stopped);
    }

    /// Stop all sounds.
    pub fn stop_all(&mut self) {
        for handle in &mut self.active_sounds {
            let _ = handle.stop(Tween::default());
        }
        self.active_sounds.clear();
    }
}

impl CuePlayer for AudioSystem {
    fn load_sound(&mut self, name: &str, path: &Path) -> Result<()> {
        if self.sounds.contains_key(name) {
            return Ok(());
        }
        let sound_data = StaticSoundData::from_file(path)
            .with_context(|| format!("failed to decode sound {}", path.display()))?;
        self.sounds.insert(name.to_string(), sound_data);
        Ok(())
    }

    fn has_sound(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    fn play_cue(&mut self, name: &str, cue: ImpactCue) -> Result<()> {
        if self.muted {
            return Ok(());
        }
        self.cleanup();
        if let Some(sound_data) = self.sounds.get(name) {
            let settings = StaticSoundSettings::new()
                .volume(cue.gain as f64)
                .playback_rate(cue.playback_rate as f64);
            let handle = self
                .manager
                .play(sound_data.clone().with_settings(settings))
                .map_err(|e| anyhow::anyhow!("failed to play {name}: {e:?}"))?;
            self.active_sounds.push(handle);
        }
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.stop_all();
        }
    }

    fn is_muted(&self) -> bool {
        self.muted
    }
}

/// Player without an output device: remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct SilentPlayer {
    sounds: Vec<String>,
    played: Vec<(String, ImpactCue)>,
    muted: bool,
}

impl SilentPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cues that would have been audible.
    pub fn played(&self) -> &[(String, ImpactCue)] {
        &self.played
    }
}

impl CuePlayer for SilentPlayer {
    fn load_sound(&mut self, name: &str, path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("sound file {} not found", path.display());
        }
        if !self.has_sound(name) {
            self.sounds.push(name.to_string());
        }
        Ok(())
    }

    fn has_sound(&self, name: &str) -> bool {
        self.sounds.iter().any(|s| s == name)
    }

    fn play_cue(&mut self, name: &str, cue: ImpactCue) -> Result<()> {
        if !self.muted {
            log::trace!("cue {} gain {:.2} rate {:.2}", name, cue.gain, cue.playback_rate);
            self.played.push((name.to_string(), cue));
        }
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }
}

// Re-export for convenience
pub use kira;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_player_respects_mute() {
        let mut player = SilentPlayer::new();
        let cue = ImpactCue { gain: 0.5, playback_rate: 1.0 };
        player.play_cue("bounce", cue).unwrap();
        player.set_muted(true);
        player.play_cue("bounce", cue).unwrap();
        assert_eq!(player.played().len(), 1);
    }

    #[test]
    fn silent_player_rejects_missing_files() {
        let mut player = SilentPlayer::new();
        assert!(player.load_sound("thud", Path::new("/definitely/not/here.ogg")).is_err());
        assert!(!player.has_sound("thud"));
    }
}
