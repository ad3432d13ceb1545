//! Time management for the simulation loop.

use std::time::{Duration, Instant};

/// Manages frame timing and delta time calculation.
#[derive(Debug)]
pub struct Time {
    /// Time when the loop started.
    start_time: Instant,
    /// Time of the last frame.
    last_frame: Instant,
    /// Duration of the last frame.
    delta: Duration,
    /// Total elapsed time since start.
    elapsed: Duration,
    /// Frame count since start.
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    /// Create a new time manager.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_frame: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Update timing at the start of a new frame.
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.elapsed = now - self.start_time;
        self.frame_count += 1;
    }

    /// Get the delta time as a Duration.
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Get total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Get the current frame count.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

/// Fixed-timestep accumulator for the physics sub-steps.
///
/// Frame time is clamped before it is accumulated so a stalled frame cannot
/// request unbounded catch-up, and at most `max_sub_steps` are handed out per
/// frame. Arithmetic is done in whole nanoseconds so a given sequence of
/// frame durations always yields the same sequence of sub-step counts.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    sub_step: Duration,
    max_frame: Duration,
    max_sub_steps: u32,
    accumulator: Duration,
}

impl FixedStepper {
    pub fn new(sub_step: Duration, max_frame: Duration, max_sub_steps: u32) -> Self {
        Self {
            sub_step,
            max_frame,
            max_sub_steps,
            accumulator: Duration::ZERO,
        }
    }

    /// Stepper at `hz` sub-steps per second.
    pub fn with_rate(hz: f64, max_frame: Duration, max_sub_steps: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / hz), max_frame, max_sub_steps)
    }

    /// Accumulate one frame and return how many sub-steps to run.
    ///
    /// Returns `min(floor(acc / sub_step), max_sub_steps)`; the consumed time
    /// is removed and any excess beyond the cap is dropped, so the leftover is
    /// always shorter than one sub-step.
    pub fn plan(&mut self, frame_dt: Duration) -> u32 {
        if frame_dt > self.max_frame {
            log::trace!("frame delta {:?} clamped to {:?}", frame_dt, self.max_frame);
        }
        self.accumulator += frame_dt.min(self.max_frame);

        let sub = self.sub_step.as_nanos().max(1);
        let acc = self.accumulator.as_nanos();
        let available = acc / sub;
        let steps = available.min(self.max_sub_steps as u128) as u32;

        // Remainder is < sub either way: consumed exactly, or catch-up beyond the cap dropped.
        self.accumulator = Duration::from_nanos((acc % sub) as u64);
        steps
    }

    /// Drop any banked time (used after an aborted frame).
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }

    /// Time banked toward the next sub-step.
    pub fn leftover(&self) -> Duration {
        self.accumulator
    }

    /// Sub-step length in seconds.
    pub fn sub_step_seconds(&self) -> f32 {
        self.sub_step.as_secs_f32()
    }

    pub fn sub_step(&self) -> Duration {
        self.sub_step
    }

    pub fn max_sub_steps(&self) -> u32 {
        self.max_sub_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepper() -> FixedStepper {
        FixedStepper::with_rate(60.0, Duration::from_millis(100), 5)
    }

    /// Sub-step count matches min(floor(acc/sub), cap) and the leftover stays below one sub-step.
    #[test]
    fn plan_matches_floor_and_cap_for_all_clamped_frames() {
        let mut s = stepper();
        let sub = s.sub_step().as_nanos();
        for micros in (0..=100_000u64).step_by(1_337) {
            let dt = Duration::from_micros(micros);
            let acc = s.leftover().as_nanos() + dt.as_nanos();
            let expected = (acc / sub).min(5) as u32;
            assert_eq!(s.plan(dt), expected, "dt = {:?}", dt);
            assert!(s.leftover() < s.sub_step());
        }
    }

    #[test]
    fn stalled_frame_is_capped() {
        let mut s = stepper();
        assert_eq!(s.plan(Duration::from_secs(3)), 5);
        assert!(s.leftover() < s.sub_step());
    }

    #[test]
    fn small_frames_bank_time() {
        let mut s = stepper();
        assert_eq!(s.plan(Duration::from_millis(10)), 0);
        assert_eq!(s.plan(Duration::from_millis(10)), 1);
        assert_eq!(s.leftover(), Duration::from_millis(20) - s.sub_step());
    }

    #[test]
    fn zero_length_sub_step_only_hands_out_the_cap() {
        let mut s = FixedStepper::new(Duration::ZERO, Duration::from_millis(100), 5);
        assert_eq!(s.plan(Duration::from_millis(10)), 5);
        assert_eq!(s.leftover(), Duration::ZERO);
    }

    #[test]
    fn same_frame_sequence_is_reproducible() {
        let frames = [7u64, 16, 33, 2, 90, 17, 16, 250];
        let run = || {
            let mut s = stepper();
            frames
                .iter()
                .map(|ms| s.plan(Duration::from_millis(*ms)))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
