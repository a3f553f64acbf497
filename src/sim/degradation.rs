//! Degradation controller
//!
//! Tracks recent frame rates and drives a three-level state machine:
//!
//! - Normal → Warning when the average drops below `warning_fps`
//! - Normal/Warning → Emergency below `emergency_fps`, or at once on a stall
//! - any level → Normal when the average climbs above `recovery_fps`
//!
//! The recovery threshold sits above the warning threshold so the level does
//! not flap when the average hovers around a boundary. The controller emits a
//! single `DegradationLevel`; pools and the particle gate read it.

use serde::{Deserialize, Serialize};

use crate::instantaneous_fps;
use crate::settings::Settings;

/// Scheduler operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DegradationLevel {
    /// Full caps, no frame skipping
    #[default]
    Normal,
    /// Soft caps, particle cooldown, occasional skips under heavy load
    Warning,
    /// Hard caps, frame skipping while overloaded
    Emergency,
}

impl DegradationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationLevel::Normal => "Normal",
            DegradationLevel::Warning => "Warning",
            DegradationLevel::Emergency => "Emergency",
        }
    }

    /// Particle spawns are rate limited outside Normal
    pub fn particle_cooldown_enabled(&self) -> bool {
        !matches!(self, DegradationLevel::Normal)
    }
}

/// A level transition observed during `record_frame`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelChange {
    pub from: DegradationLevel,
    pub to: DegradationLevel,
}

/// Fixed-length ring buffer of instantaneous FPS samples
#[derive(Debug, Clone)]
pub struct FpsHistory {
    samples: Vec<f64>,
    capacity: usize,
    next: usize,
}

impl FpsHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    /// Record a sample, overwriting the oldest once full
    pub fn push(&mut self, fps: f64) {
        if self.samples.len() < self.capacity {
            self.samples.push(fps);
        } else {
            self.samples[self.next] = fps;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Mean of the samples currently held
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.next = 0;
    }
}

/// Thresholds the controller works with, taken from `Settings`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationConfig {
    pub frame_budget_ms: f64,
    pub stall_threshold_ms: f64,
    pub sample_capacity: usize,
    pub recompute_interval: u32,
    pub warning_fps: f64,
    pub emergency_fps: f64,
    pub recovery_fps: f64,
}

impl From<&Settings> for DegradationConfig {
    fn from(s: &Settings) -> Self {
        Self {
            frame_budget_ms: s.frame_budget_ms,
            stall_threshold_ms: s.stall_threshold_ms,
            sample_capacity: s.fps_sample_capacity,
            recompute_interval: s.fps_recompute_interval,
            warning_fps: s.warning_fps,
            emergency_fps: s.emergency_fps,
            recovery_fps: s.recovery_fps,
        }
    }
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Rolling-average frame rate monitor and level state machine
#[derive(Debug, Clone)]
pub struct DegradationController {
    config: DegradationConfig,
    level: DegradationLevel,
    history: FpsHistory,
    average_fps: f64,
    frames_since_recompute: u32,
    effective_delta_ms: f64,
    stall_count: u64,
    last_change: Option<LevelChange>,
}

impl DegradationController {
    pub fn new(config: DegradationConfig) -> Self {
        Self {
            config,
            level: DegradationLevel::Normal,
            history: FpsHistory::new(config.sample_capacity),
            average_fps: instantaneous_fps(config.frame_budget_ms),
            frames_since_recompute: 0,
            effective_delta_ms: config.frame_budget_ms,
            stall_count: 0,
            last_change: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(DegradationConfig::from(settings))
    }

    /// Feed one frame's elapsed time (ms) and return the resulting level.
    ///
    /// A stall (delta at or past the stall threshold, or a delta that is not a
    /// positive finite number) clamps the simulation step to one nominal frame
    /// and forces Emergency without touching the rolling average.
    pub fn record_frame(&mut self, delta_ms: f64) -> DegradationLevel {
        self.last_change = None;

        let is_stall =
            !delta_ms.is_finite() || delta_ms <= 0.0 || delta_ms >= self.config.stall_threshold_ms;
        if is_stall {
            self.effective_delta_ms = self.config.frame_budget_ms;
            self.stall_count += 1;
            log::warn!(
                "Frame stall ({:?}ms), clamping step to {:.2}ms",
                delta_ms,
                self.config.frame_budget_ms
            );
            self.transition(DegradationLevel::Emergency);
            return self.level;
        }

        self.effective_delta_ms = delta_ms;
        self.history.push(instantaneous_fps(delta_ms));
        self.frames_since_recompute += 1;

        if self.frames_since_recompute >= self.config.recompute_interval {
            self.frames_since_recompute = 0;
            if let Some(avg) = self.history.mean() {
                self.average_fps = avg;
                let next = self.next_level(avg);
                self.transition(next);
            }
        }

        self.level
    }

    fn next_level(&self, avg: f64) -> DegradationLevel {
        let c = &self.config;
        if avg < c.emergency_fps {
            DegradationLevel::Emergency
        } else if avg > c.recovery_fps {
            DegradationLevel::Normal
        } else if avg < c.warning_fps && self.level == DegradationLevel::Normal {
            DegradationLevel::Warning
        } else {
            // Inside the hysteresis band: hold
            self.level
        }
    }

    fn transition(&mut self, to: DegradationLevel) {
        if to == self.level {
            return;
        }
        let from = self.level;
        self.level = to;
        self.last_change = Some(LevelChange { from, to });
        log::info!(
            "Degradation {} -> {} (avg {:.1} fps)",
            from.as_str(),
            to.as_str(),
            self.average_fps
        );
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    /// Step size the simulation should use for the last recorded frame
    pub fn effective_delta_ms(&self) -> f64 {
        self.effective_delta_ms
    }

    /// Average computed at the last recompute
    pub fn average_fps(&self) -> f64 {
        self.average_fps
    }

    /// Transition caused by the most recent `record_frame`, if any
    pub fn last_change(&self) -> Option<LevelChange> {
        self.last_change
    }

    pub fn stall_count(&self) -> u64 {
        self.stall_count
    }

    pub fn history(&self) -> &FpsHistory {
        &self.history
    }

    pub fn config(&self) -> &DegradationConfig {
        &self.config
    }

    /// Forget all timing history and return to Normal
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }
}
