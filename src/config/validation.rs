//! Configuration validation.

use crate::error::{ConfigError, Error, Result};

use super::{AxisConfig, PlannerConfig, SplitterConfig, SystemConfig};

/// Validate a system configuration.
///
/// Checks:
/// - Axis resolutions, speeds and accelerations are positive
/// - Split lengths satisfy 0 < min <= max
/// - Clock frequency and commit count are usable
///
/// The commit count is only checked against its lower bound here; the
/// upper bound depends on the lookahead capacity and is checked when the
/// motion system is built.
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    validate_planner(&config.planner)?;
    validate_splitter(&config.splitter)?;

    for (_name, axis) in config.axes.iter() {
        validate_axis(axis)?;
    }

    Ok(())
}

fn validate_axis(config: &AxisConfig) -> Result<()> {
    if !(config.steps_per_mm > 0.0 && config.steps_per_mm.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidStepsPerMm(config.steps_per_mm)));
    }

    if !(config.max_speed.0 > 0.0 && config.max_speed.0.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidMaxSpeed(config.max_speed.0)));
    }

    if !(config.max_acceleration.0 > 0.0 && config.max_acceleration.0.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration(
            config.max_acceleration.0,
        )));
    }

    Ok(())
}

fn validate_planner(config: &PlannerConfig) -> Result<()> {
    if config.clock_frequency_hz == 0 {
        return Err(Error::Config(ConfigError::InvalidClockFrequency(
            config.clock_frequency_hz,
        )));
    }

    if !(config.junction_speed.0 > 0.0 && config.junction_speed.0.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidJunctionSpeed(
            config.junction_speed.0,
        )));
    }

    if config.commit_count == 0 {
        return Err(Error::Config(ConfigError::InvalidCommitCount {
            commit_count: config.commit_count,
            lookahead: 0,
        }));
    }

    Ok(())
}

fn validate_splitter(config: &SplitterConfig) -> Result<()> {
    let min = config.min_split_length.0;
    let max = config.max_split_length.0;
    if !(min > 0.0 && min <= max && max.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidSplitLength { min, max }));
    }

    if !(config.segments_per_second >= 0.0 && config.segments_per_second.is_finite()) {
        return Err(Error::Config(ConfigError::InvalidSegmentsPerSecond(
            config.segments_per_second,
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{Millimeters, MmPerSec, MmPerSecSquared};

    fn axis() -> AxisConfig {
        AxisConfig {
            steps_per_mm: 80.0,
            max_speed: MmPerSec(300.0),
            max_acceleration: MmPerSecSquared(1500.0),
            invert_direction: false,
            enable_active_high: false,
            dir_setup_ticks: 1,
        }
    }

    #[test]
    fn test_invalid_steps_per_mm() {
        let config = AxisConfig {
            steps_per_mm: -1.0, // Invalid!
            ..axis()
        };

        let result = validate_axis(&config);
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::InvalidStepsPerMm(_)))
        ));
    }

    #[test]
    fn test_nan_speed_rejected() {
        let config = AxisConfig {
            max_speed: MmPerSec(f32::NAN),
            ..axis()
        };

        assert!(matches!(
            validate_axis(&config),
            Err(Error::Config(ConfigError::InvalidMaxSpeed(_)))
        ));
    }

    #[test]
    fn test_split_lengths_ordered() {
        let config = SplitterConfig {
            min_split_length: Millimeters(5.0),
            max_split_length: Millimeters(1.0),
            segments_per_second: 0.0,
        };

        assert!(matches!(
            validate_splitter(&config),
            Err(Error::Config(ConfigError::InvalidSplitLength { .. }))
        ));
    }

    #[test]
    fn test_zero_commit_count_rejected() {
        let config = PlannerConfig {
            commit_count: 0,
            ..PlannerConfig::default()
        };

        assert!(matches!(
            validate_planner(&config),
            Err(Error::Config(ConfigError::InvalidCommitCount { .. }))
        ));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_planner(&PlannerConfig::default()).is_ok());
        assert!(validate_splitter(&SplitterConfig::default()).is_ok());
        assert!(validate_axis(&axis()).is_ok());
    }
}
