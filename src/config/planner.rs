//! Planner and step-timing configuration.

use serde::Deserialize;

use super::units::MmPerSec;

/// What to do with a step pulse whose time has already passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatePulsePolicy {
    /// Emit the pulse immediately and count it as late.
    #[default]
    FireLate,
    /// Stop all motion and report the missed deadline.
    Abort,
}

/// Lookahead planner configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Frequency of the step timer in Hz.
    pub clock_frequency_hz: u32,

    /// Number of segments committed per planning pass.
    #[serde(default = "default_commit_count")]
    pub commit_count: usize,

    /// Speed change allowed across a junction without slowing down.
    #[serde(rename = "junction_speed_mm_per_sec")]
    pub junction_speed: MmPerSec,

    /// Delay between starting the stepper and the first block, in ticks.
    #[serde(default)]
    pub start_delay_ticks: u32,

    /// Handling of pulses that miss their deadline.
    #[serde(default)]
    pub late_pulse_policy: LatePulsePolicy,

    /// Lateness that is tolerated before a pulse counts as late, in ticks.
    #[serde(default)]
    pub late_tolerance_ticks: u32,
}

fn default_commit_count() -> usize {
    1
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            clock_frequency_hz: 1_000_000,
            commit_count: default_commit_count(),
            junction_speed: MmPerSec(5.0),
            start_delay_ticks: 0,
            late_pulse_policy: LatePulsePolicy::FireLate,
            late_tolerance_ticks: 0,
        }
    }
}
