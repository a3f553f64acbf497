//! Frame scheduler
//!
//! Driven by one host callback per display refresh. Each `tick`:
//! 1. measures elapsed time and feeds the degradation controller
//! 2. applies any level change to the pools (between frames, never mid-step)
//! 3. decides whether to skip this frame's heavy work
//! 4. otherwise advances pools, compacts, runs collision, then enforces caps
//!
//! The order in step 4 is fixed; gameplay must not depend on any other.

use serde::{Deserialize, Serialize};

use super::collision::{self, CollisionReport};
use super::degradation::{DegradationController, DegradationLevel, LevelChange};
use super::state::SimContext;
use crate::settings::{ConfigError, Settings};

/// The host side of the frame loop (e.g. `requestAnimationFrame`)
pub trait FrameHost {
    /// Ask for the next frame callback
    fn request_frame(&mut self);
}

/// Timestamps and frame counting, owned by the scheduler
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    last_timestamp: Option<f64>,
    delta_ms: f64,
    frame_counter: u64,
}

impl FrameClock {
    /// Record a callback at `now_ms` and return the elapsed time. The first
    /// finite timestamp has no predecessor and counts as one nominal frame;
    /// a non-finite timestamp always yields a NaN delta.
    pub fn advance(&mut self, now_ms: f64, nominal_ms: f64) -> f64 {
        let delta = match self.last_timestamp {
            Some(last) => now_ms - last,
            None if now_ms.is_finite() => nominal_ms,
            None => f64::NAN,
        };
        if now_ms.is_finite() {
            self.last_timestamp = Some(now_ms);
        }
        self.delta_ms = delta;
        self.frame_counter += 1;
        delta
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Raw delta measured by the last `advance`
    pub fn delta_ms(&self) -> f64 {
        self.delta_ms
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

/// Summary of one callback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    pub frame: u64,
    pub level: DegradationLevel,
    pub level_change: Option<LevelChange>,
    /// Step the simulation used (clamped after a stall)
    pub effective_delta_ms: f64,
    /// Pooled entities alive after the frame
    pub active_entities: usize,
    /// Entities dropped by cap pressure this frame
    pub evicted: usize,
    /// Entities removed by compaction this frame
    pub compacted: usize,
}

/// Result of `tick`
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Heavy work was skipped to let the frame rate recover
    Skipped(FrameStats),
    /// The frame ran; the report goes to gameplay
    Ran {
        report: CollisionReport,
        stats: FrameStats,
    },
}

impl FrameOutcome {
    pub fn stats(&self) -> &FrameStats {
        match self {
            FrameOutcome::Skipped(stats) => stats,
            FrameOutcome::Ran { stats, .. } => stats,
        }
    }

    pub fn report(&self) -> Option<&CollisionReport> {
        match self {
            FrameOutcome::Skipped(_) => None,
            FrameOutcome::Ran { report, .. } => Some(report),
        }
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self, FrameOutcome::Skipped(_))
    }
}

/// Per-frame loop driver. Not reentrant: every entry point takes `&mut self`.
#[derive(Debug, Clone)]
pub struct Scheduler {
    settings: Settings,
    clock: FrameClock,
    controller: DegradationController,
    ctx: SimContext,
    skipped_frames: u64,
    consecutive_skips: u32,
}

impl Scheduler {
    /// Build a scheduler with fresh pools. Fails only on invalid settings.
    pub fn new(settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let controller = DegradationController::from_settings(&settings);
        let ctx = SimContext::new(&settings);
        log::info!(
            "Scheduler ready: budget {:.2}ms, quality {}",
            settings.frame_budget_ms,
            settings.quality.as_str()
        );
        Ok(Self {
            settings,
            clock: FrameClock::default(),
            controller,
            ctx,
            skipped_frames: 0,
            consecutive_skips: 0,
        })
    }

    /// Run one frame and always request the next callback from the host,
    /// whether or not the frame was skipped
    pub fn run_frame<H: FrameHost + ?Sized>(&mut self, now_ms: f64, host: &mut H) -> FrameOutcome {
        let outcome = self.tick(now_ms);
        host.request_frame();
        outcome
    }

    /// Advance the simulation for a host callback at `now_ms`
    pub fn tick(&mut self, now_ms: f64) -> FrameOutcome {
        let delta = self.clock.advance(now_ms, self.settings.frame_budget_ms);
        let level = self.controller.record_frame(delta);
        let level_change = self.controller.last_change();

        let mut evicted = 0;
        if level_change.is_some() {
            evicted += self.ctx.apply_level(level);
            if evicted > 0 {
                log::debug!("{} entities evicted entering {}", evicted, level.as_str());
            }
        }

        let mut stats = FrameStats {
            frame: self.clock.frame_counter(),
            level,
            level_change,
            effective_delta_ms: self.controller.effective_delta_ms(),
            active_entities: self.ctx.total_active(),
            evicted,
            compacted: 0,
        };

        if self.should_skip(level, stats.active_entities, stats.frame) {
            self.skipped_frames += 1;
            self.consecutive_skips += 1;
            log::trace!(
                "Skipping frame {} ({}, {} active)",
                stats.frame,
                level.as_str(),
                stats.active_entities
            );
            return FrameOutcome::Skipped(stats);
        }
        self.consecutive_skips = 0;

        self.ctx.advance(stats.effective_delta_ms);
        stats.compacted = self.ctx.compact();
        let report = collision::process(&self.ctx);
        stats.evicted += self.ctx.enforce_caps();
        stats.active_entities = self.ctx.total_active();

        FrameOutcome::Ran { report, stats }
    }

    fn should_skip(&self, level: DegradationLevel, active: usize, frame: u64) -> bool {
        if let Some(limit) = self.settings.max_consecutive_skips
            && self.consecutive_skips >= limit
        {
            return false;
        }
        match level {
            DegradationLevel::Normal => false,
            DegradationLevel::Warning => {
                active > self.settings.warning_load_threshold
                    && frame % self.settings.warning_skip_interval == 0
            }
            DegradationLevel::Emergency => active > self.settings.emergency_load_threshold,
        }
    }

    pub fn level(&self) -> DegradationLevel {
        self.controller.level()
    }

    pub fn ctx(&self) -> &SimContext {
        &self.ctx
    }

    /// Gameplay access for spawning and flagging between frames
    pub fn ctx_mut(&mut self) -> &mut SimContext {
        &mut self.ctx
    }

    pub fn controller(&self) -> &DegradationController {
        &self.controller
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Frames skipped since start
    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames
    }

    /// Full reset: empty pools, forget timing history
    pub fn reset(&mut self) {
        self.ctx.reset();
        self.controller.reset();
        self.clock = FrameClock::default();
        self.skipped_frames = 0;
        self.consecutive_skips = 0;
    }
}
