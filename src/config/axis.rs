//! Axis configuration from TOML.

use serde::Deserialize;

use super::units::{MmPerSec, MmPerSecSquared};

/// Complete axis configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Steps per millimetre of travel (including microstepping).
    pub steps_per_mm: f32,

    /// Maximum speed of this axis alone.
    #[serde(rename = "max_speed_mm_per_sec")]
    pub max_speed: MmPerSec,

    /// Maximum acceleration of this axis alone.
    #[serde(rename = "max_acceleration_mm_per_sec2")]
    pub max_acceleration: MmPerSecSquared,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Enable pin is active high instead of the usual active low.
    #[serde(default)]
    pub enable_active_high: bool,

    /// Minimum delay between a direction change and the next step, in timer ticks.
    #[serde(default = "default_dir_setup_ticks")]
    pub dir_setup_ticks: u32,
}

fn default_dir_setup_ticks() -> u32 {
    1
}

/// Derived axis parameters used by the planner.
///
/// Computed once at initialization so the planning loop works in steps
/// and reciprocals only.
#[derive(Debug, Clone, Copy)]
pub struct AxisConstraints {
    /// Steps per millimetre.
    pub steps_per_mm: f32,
    /// Millimetres per step.
    pub mm_per_step: f32,
    /// Reciprocal of the maximum speed (s/mm).
    pub max_speed_rec: f32,
    /// Reciprocal of the maximum acceleration (s²/mm).
    pub max_accel_rec: f32,
    /// Direction setup time in timer ticks.
    pub dir_setup_ticks: u32,
}

impl AxisConstraints {
    /// Compute axis constraints from configuration.
    pub fn from_config(config: &AxisConfig) -> Self {
        Self {
            steps_per_mm: config.steps_per_mm,
            mm_per_step: 1.0 / config.steps_per_mm,
            max_speed_rec: 1.0 / config.max_speed.0,
            max_accel_rec: 1.0 / config.max_acceleration.0,
            dir_setup_ticks: config.dir_setup_ticks,
        }
    }
}
