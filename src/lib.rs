//! Barrage - real-time simulation core for an arcade shooter
//!
//! Core modules:
//! - `sim`: Frame scheduler, bounded entity pools, collision engine and
//!   degradation controller
//! - `settings`: Tuning values, quality presets and config loading

pub mod settings;
pub mod sim;

pub use settings::{CapPair, Caps, ConfigError, QualityPreset, Settings};

/// Default tuning constants
pub mod consts {
    /// Nominal update rate the scheduler tries to hold
    pub const TARGET_FPS: f64 = 60.0;
    /// Nominal frame budget in milliseconds (~16.7ms)
    pub const FRAME_BUDGET_MS: f64 = 1000.0 / TARGET_FPS;
    /// A single frame this long is a host stall, not a slow frame (~60x nominal)
    pub const STALL_THRESHOLD_MS: f64 = 1000.0;

    /// Rolling FPS window
    pub const FPS_SAMPLE_CAPACITY: usize = 100;
    /// Recorded frames between average recomputes
    pub const FPS_RECOMPUTE_INTERVAL: u32 = 60;

    /// Degrade to Warning below this average FPS
    pub const WARNING_FPS: f64 = 45.0;
    /// Degrade to Emergency below this average FPS
    pub const EMERGENCY_FPS: f64 = 30.0;
    /// Return to Normal above this average FPS (must exceed WARNING_FPS)
    pub const RECOVERY_FPS: f64 = 55.0;

    /// Emergency frames skip work when more entities than this are live
    pub const EMERGENCY_LOAD_THRESHOLD: usize = 300;
    /// Warning frames skip every Nth frame when more entities than this are live
    pub const WARNING_LOAD_THRESHOLD: usize = 600;
    /// N for Warning-level frame skipping
    pub const WARNING_SKIP_INTERVAL: u64 = 2;

    /// Minimum gap between particle spawns while degraded
    pub const PARTICLE_COOLDOWN_MS: f64 = 50.0;

    /// Playfield dimensions (y grows downward)
    pub const PLAYFIELD_WIDTH: f32 = 480.0;
    pub const PLAYFIELD_HEIGHT: f32 = 640.0;
    /// Entities may drift this far outside the playfield before culling
    pub const PLAYFIELD_MARGIN: f32 = 32.0;

    /// Player hitbox
    pub const PLAYER_WIDTH: f32 = 24.0;
    pub const PLAYER_HEIGHT: f32 = 32.0;
}

/// Convert a delta in milliseconds to simulation seconds
#[inline]
pub fn ms_to_secs(ms: f64) -> f32 {
    (ms / 1000.0) as f32
}

/// Instantaneous frame rate for a frame that took `delta_ms`
#[inline]
pub fn instantaneous_fps(delta_ms: f64) -> f64 {
    1000.0 / delta_ms
}
