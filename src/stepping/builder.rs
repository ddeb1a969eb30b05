//! Builder pattern for AxisDriver.

use embedded_hal::digital::OutputPin;

use crate::config::{AxisConfig, SystemConfig};
use crate::error::{ConfigError, Error, Result};

use super::driver::{AxisDriver, NoPin};

/// Builder for creating AxisDriver instances.
pub struct AxisDriverBuilder<STEP, DIR, EN = NoPin>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    step_pin: Option<STEP>,
    dir_pin: Option<DIR>,
    enable_pin: Option<EN>,
    invert_direction: bool,
    enable_active_high: bool,
}

impl<STEP, DIR, EN> Default for AxisDriverBuilder<STEP, DIR, EN>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<STEP, DIR, EN> AxisDriverBuilder<STEP, DIR, EN>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            step_pin: None,
            dir_pin: None,
            enable_pin: None,
            invert_direction: false,
            enable_active_high: false,
        }
    }

    /// Set the STEP pin.
    pub fn step_pin(mut self, pin: STEP) -> Self {
        self.step_pin = Some(pin);
        self
    }

    /// Set the DIR pin.
    pub fn dir_pin(mut self, pin: DIR) -> Self {
        self.dir_pin = Some(pin);
        self
    }

    /// Set the enable pin.
    pub fn enable_pin(mut self, pin: EN) -> Self {
        self.enable_pin = Some(pin);
        self
    }

    /// Set direction inversion.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Set enable pin polarity.
    pub fn enable_active_high(mut self, active_high: bool) -> Self {
        self.enable_active_high = active_high;
        self
    }

    /// Configure from an AxisConfig.
    pub fn from_axis_config(mut self, config: &AxisConfig) -> Self {
        self.invert_direction = config.invert_direction;
        self.enable_active_high = config.enable_active_high;
        self
    }

    /// Configure from SystemConfig by axis name.
    pub fn from_config(self, config: &SystemConfig, axis_name: &str) -> Result<Self> {
        let axis_config = config.axis(axis_name).ok_or_else(|| {
            Error::Config(ConfigError::AxisNotFound(
                heapless::String::try_from(axis_name).unwrap_or_default(),
            ))
        })?;

        Ok(self.from_axis_config(axis_config))
    }

    fn finish(self, enable_pin: EN) -> Result<AxisDriver<STEP, DIR, EN>> {
        let step_pin = self
            .step_pin
            .ok_or(Error::Config(ConfigError::MissingField("step_pin")))?;
        let dir_pin = self
            .dir_pin
            .ok_or(Error::Config(ConfigError::MissingField("dir_pin")))?;

        Ok(AxisDriver::new(
            step_pin,
            dir_pin,
            enable_pin,
            self.invert_direction,
            self.enable_active_high,
        ))
    }

    /// Build the AxisDriver.
    ///
    /// # Errors
    ///
    /// Returns an error if a required pin is missing.
    pub fn build(mut self) -> Result<AxisDriver<STEP, DIR, EN>> {
        let enable_pin = self
            .enable_pin
            .take()
            .ok_or(Error::Config(ConfigError::MissingField("enable_pin")))?;
        self.finish(enable_pin)
    }
}

impl<STEP, DIR> AxisDriverBuilder<STEP, DIR, NoPin>
where
    STEP: OutputPin,
    DIR: OutputPin,
{
    /// Build an AxisDriver for a driver without an enable pin.
    ///
    /// # Errors
    ///
    /// Returns an error if a required pin is missing.
    pub fn build_without_enable(self) -> Result<AxisDriver<STEP, DIR, NoPin>> {
        self.finish(NoPin)
    }
}
