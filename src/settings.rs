//! Simulation settings and tuning
//!
//! Every threshold and capacity the core uses lives here. The numbers are
//! defaults, not invariants; `validate` only rejects combinations the
//! degradation logic cannot work with.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::*;
use crate::sim::Category;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{category:?}: hard cap {hard} exceeds soft cap {soft}")]
    HardCapAboveSoft {
        category: Category,
        soft: usize,
        hard: usize,
    },
    #[error("recovery fps {recovery} must be above warning fps {warning}")]
    NoHysteresis { warning: f64, recovery: f64 },
    #[error("emergency fps {emergency} must be below warning fps {warning}")]
    EmergencyAboveWarning { emergency: f64, warning: f64 },
    #[error("stall threshold {stall_ms}ms must exceed the frame budget {budget_ms}ms")]
    StallBelowBudget { stall_ms: f64, budget_ms: f64 },
    #[error("warning load threshold {warning} must be above emergency load threshold {emergency}")]
    LoadThresholdOrder { emergency: usize, warning: usize },
    #[error("unknown quality preset {0:?}")]
    UnknownPreset(String),
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("{0} must be a positive finite number")]
    NotPositive(&'static str),
}

/// Quality preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Particle caps (soft, hard) for this preset
    pub fn particle_caps(&self) -> CapPair {
        match self {
            QualityPreset::Low => CapPair::new(100, 25),
            QualityPreset::Medium => CapPair::new(500, 100),
            QualityPreset::High => CapPair::new(2000, 250),
        }
    }
}

impl FromStr for QualityPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(QualityPreset::Low),
            "medium" | "med" => Ok(QualityPreset::Medium),
            "high" => Ok(QualityPreset::High),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }
}

/// Soft (Normal/Warning) and hard (Emergency) capacity for one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapPair {
    pub soft: usize,
    pub hard: usize,
}

impl CapPair {
    pub const fn new(soft: usize, hard: usize) -> Self {
        Self { soft, hard }
    }
}

/// Per-category capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Caps {
    pub player_projectiles: CapPair,
    pub hostile_projectiles: CapPair,
    pub hostiles: CapPair,
    pub particles: CapPair,
    pub pickups: CapPair,
    pub destructibles: CapPair,
}

impl Default for Caps {
    fn default() -> Self {
        Self {
            player_projectiles: CapPair::new(250, 120),
            hostile_projectiles: CapPair::new(300, 150),
            hostiles: CapPair::new(60, 30),
            particles: QualityPreset::Medium.particle_caps(),
            pickups: CapPair::new(40, 20),
            destructibles: CapPair::new(80, 40),
        }
    }
}

impl Caps {
    pub fn get(&self, category: Category) -> CapPair {
        match category {
            Category::PlayerProjectile => self.player_projectiles,
            Category::HostileProjectile => self.hostile_projectiles,
            Category::Hostile => self.hostiles,
            Category::Particle => self.particles,
            Category::Pickup => self.pickups,
            Category::Destructible => self.destructibles,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Graphics quality preset (drives particle caps)
    pub quality: QualityPreset,

    // === Timing ===
    /// Nominal frame budget in milliseconds
    pub frame_budget_ms: f64,
    /// Single-frame delta at or above which the frame counts as a stall
    pub stall_threshold_ms: f64,
    /// Ring buffer length for instantaneous FPS samples
    pub fps_sample_capacity: usize,
    /// Recorded frames between rolling average recomputes
    pub fps_recompute_interval: u32,

    // === Degradation thresholds ===
    pub warning_fps: f64,
    pub emergency_fps: f64,
    pub recovery_fps: f64,

    // === Frame skip ===
    pub emergency_load_threshold: usize,
    pub warning_load_threshold: usize,
    pub warning_skip_interval: u64,
    /// Force a frame through after this many overloaded frames were skipped
    /// in a row. `None` skips for as long as the overload lasts.
    pub max_consecutive_skips: Option<u32>,

    // === Pools ===
    pub caps: Caps,
    /// Minimum gap between particle spawns while degraded
    pub particle_cooldown_ms: f64,

    // === Playfield ===
    pub playfield_width: f32,
    pub playfield_height: f32,
    pub playfield_margin: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quality: QualityPreset::Medium,

            frame_budget_ms: FRAME_BUDGET_MS,
            stall_threshold_ms: STALL_THRESHOLD_MS,
            fps_sample_capacity: FPS_SAMPLE_CAPACITY,
            fps_recompute_interval: FPS_RECOMPUTE_INTERVAL,

            warning_fps: WARNING_FPS,
            emergency_fps: EMERGENCY_FPS,
            recovery_fps: RECOVERY_FPS,

            emergency_load_threshold: EMERGENCY_LOAD_THRESHOLD,
            warning_load_threshold: WARNING_LOAD_THRESHOLD,
            warning_skip_interval: WARNING_SKIP_INTERVAL,
            max_consecutive_skips: None,

            caps: Caps::default(),
            particle_cooldown_ms: PARTICLE_COOLDOWN_MS,

            playfield_width: PLAYFIELD_WIDTH,
            playfield_height: PLAYFIELD_HEIGHT,
            playfield_margin: PLAYFIELD_MARGIN,
        }
    }
}

impl Settings {
    /// Defaults with the particle caps of `preset`
    pub fn from_preset(preset: QualityPreset) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(preset);
        settings
    }

    /// Switch preset; only particle caps depend on it
    pub fn apply_preset(&mut self, preset: QualityPreset) {
        self.quality = preset;
        self.caps.particles = preset.particle_caps();
    }

    /// Parse and validate settings from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!(
            "Loaded settings from {} (quality {})",
            path.as_ref().display(),
            settings.quality.as_str()
        );
        Ok(settings)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the degradation logic cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("frame_budget_ms", self.frame_budget_ms)?;
        positive("stall_threshold_ms", self.stall_threshold_ms)?;
        positive("warning_fps", self.warning_fps)?;
        positive("emergency_fps", self.emergency_fps)?;
        positive("recovery_fps", self.recovery_fps)?;
        if !(self.particle_cooldown_ms.is_finite() && self.particle_cooldown_ms >= 0.0) {
            return Err(ConfigError::NotPositive("particle_cooldown_ms"));
        }
        for (name, value) in [
            ("playfield_width", self.playfield_width),
            ("playfield_height", self.playfield_height),
        ] {
            positive(name, value as f64)?;
        }

        if self.stall_threshold_ms <= self.frame_budget_ms {
            return Err(ConfigError::StallBelowBudget {
                stall_ms: self.stall_threshold_ms,
                budget_ms: self.frame_budget_ms,
            });
        }
        if self.emergency_fps >= self.warning_fps {
            return Err(ConfigError::EmergencyAboveWarning {
                emergency: self.emergency_fps,
                warning: self.warning_fps,
            });
        }
        if self.recovery_fps <= self.warning_fps {
            return Err(ConfigError::NoHysteresis {
                warning: self.warning_fps,
                recovery: self.recovery_fps,
            });
        }
        if self.warning_load_threshold <= self.emergency_load_threshold {
            return Err(ConfigError::LoadThresholdOrder {
                emergency: self.emergency_load_threshold,
                warning: self.warning_load_threshold,
            });
        }
        if self.max_consecutive_skips == Some(0) {
            return Err(ConfigError::Zero("max_consecutive_skips"));
        }
        if self.fps_sample_capacity == 0 {
            return Err(ConfigError::Zero("fps_sample_capacity"));
        }
        if self.fps_recompute_interval == 0 {
            return Err(ConfigError::Zero("fps_recompute_interval"));
        }
        if self.warning_skip_interval == 0 {
            return Err(ConfigError::Zero("warning_skip_interval"));
        }

        for category in Category::ALL {
            let caps = self.caps.get(category);
            if caps.hard > caps.soft {
                return Err(ConfigError::HardCapAboveSoft {
                    category,
                    soft: caps.soft,
                    hard: caps.hard,
                });
            }
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(Settings::default().validate().is_ok());
        for preset in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            assert!(Settings::from_preset(preset).validate().is_ok());
        }
    }

    #[test]
    fn test_from_json_partial() {
        let settings = Settings::from_json(r#"{ "warning_fps": 40.0, "caps": { "hostiles": { "soft": 10, "hard": 5 } } }"#)
            .unwrap();
        assert_eq!(settings.warning_fps, 40.0);
        assert_eq!(settings.caps.hostiles, CapPair::new(10, 5));
        // Untouched fields keep defaults
        assert_eq!(settings.caps.player_projectiles, CapPair::new(250, 120));
        assert_eq!(settings.recovery_fps, RECOVERY_FPS);
    }

    #[test]
    fn test_json_round_trip_keeps_preset() {
        let settings = Settings::from_preset(QualityPreset::High);
        let json = settings.to_json().unwrap();
        let parsed = Settings::from_json(&json).unwrap();
        assert_eq!(parsed.quality, QualityPreset::High);
        assert_eq!(parsed.caps.particles, QualityPreset::High.particle_caps());
    }

    #[test]
    fn test_rejects_missing_hysteresis() {
        let mut settings = Settings::default();
        settings.recovery_fps = settings.warning_fps;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::NoHysteresis { .. })
        ));
    }

    #[test]
    fn test_rejects_hard_cap_above_soft() {
        let mut settings = Settings::default();
        settings.caps.pickups = CapPair::new(5, 10);
        match settings.validate() {
            Err(ConfigError::HardCapAboveSoft { category, .. }) => {
                assert_eq!(category, Category::Pickup)
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_thresholds() {
        let mut settings = Settings::default();
        settings.emergency_fps = 50.0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::EmergencyAboveWarning { .. })
        ));

        let mut settings = Settings::default();
        settings.stall_threshold_ms = 10.0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::StallBelowBudget { .. })
        ));

        let mut settings = Settings::default();
        settings.frame_budget_ms = f64::NAN;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::NotPositive("frame_budget_ms"))
        ));

        let mut settings = Settings::default();
        settings.fps_recompute_interval = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Zero(_))));
    }

    #[test]
    fn test_rejects_inverted_load_thresholds() {
        let mut settings = Settings::default();
        settings.emergency_load_threshold = 600;
        settings.warning_load_threshold = 100;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::LoadThresholdOrder {
                emergency: 600,
                warning: 100
            })
        ));

        settings.warning_load_threshold = 600;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::LoadThresholdOrder { .. })
        ));

        settings.warning_load_threshold = 601;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_skip_limit_defaults_off() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings.max_consecutive_skips, None);

        let settings = Settings::from_json(r#"{ "max_consecutive_skips": 3 }"#).unwrap();
        assert_eq!(settings.max_consecutive_skips, Some(3));

        assert!(matches!(
            Settings::from_json(r#"{ "max_consecutive_skips": 0 }"#),
            Err(ConfigError::Zero("max_consecutive_skips"))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Settings::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!("MED".parse::<QualityPreset>().unwrap(), QualityPreset::Medium);
        assert_eq!("High".parse::<QualityPreset>().unwrap(), QualityPreset::High);
        match "ultra".parse::<QualityPreset>() {
            Err(ConfigError::UnknownPreset(name)) => assert_eq!(name, "ultra"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
