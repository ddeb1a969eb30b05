//! Per-axis hardware adapter.
//!
//! Generic over embedded-hal 1.0 pin types.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::error::{Result, StepperError};

/// Hardware capabilities the synchronizer needs from one axis.
pub trait AxisOutput {
    /// Drive the direction pin, `true` toward positive positions.
    ///
    /// Returns `true` if the pin changed, in which case the axis must not
    /// step before its direction setup time has elapsed.
    fn set_direction(&mut self, forward: bool) -> Result<bool>;

    /// Emit one step pulse.
    fn step(&mut self) -> Result<()>;

    /// Energize the driver.
    fn enable(&mut self) -> Result<()>;

    /// De-energize the driver.
    fn disable(&mut self) -> Result<()>;

    /// Check run just before a step while the axis has step checks enabled.
    ///
    /// Returning `true` stops stepping before the pulse, for instance when
    /// an endstop triggers during homing.
    fn prestep(&mut self) -> Result<bool> {
        Ok(false)
    }
}

/// Placeholder for an axis without an enable pin.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

/// STEP/DIR/EN stepper driver.
///
/// Generic over:
/// - `STEP`: STEP pin type (must implement `OutputPin`)
/// - `DIR`: DIR pin type (must implement `OutputPin`)
/// - `EN`: enable pin type, [`NoPin`] when the driver has none
pub struct AxisDriver<STEP, DIR, EN = NoPin>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    step_pin: STEP,
    dir_pin: DIR,
    enable_pin: EN,
    /// Last direction written, cached to avoid redundant pin writes.
    current_direction: Option<bool>,
    invert_direction: bool,
    enable_active_high: bool,
    enabled: bool,
}

impl<STEP, DIR, EN> AxisDriver<STEP, DIR, EN>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    pub(crate) fn new(
        step_pin: STEP,
        dir_pin: DIR,
        enable_pin: EN,
        invert_direction: bool,
        enable_active_high: bool,
    ) -> Self {
        Self {
            step_pin,
            dir_pin,
            enable_pin,
            current_direction: None,
            invert_direction,
            enable_active_high,
            enabled: false,
        }
    }

    /// Last direction written to the pin.
    #[inline]
    pub fn direction(&self) -> Option<bool> {
        self.current_direction
    }

    /// Whether the driver is energized.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Release the pins.
    pub fn release(self) -> (STEP, DIR, EN) {
        (self.step_pin, self.dir_pin, self.enable_pin)
    }

    fn write_enable(&mut self, on: bool) -> Result<()> {
        let pin_high = on == self.enable_active_high;
        if pin_high {
            self.enable_pin.set_high().map_err(|_| StepperError::PinError)?;
        } else {
            self.enable_pin.set_low().map_err(|_| StepperError::PinError)?;
        }
        self.enabled = on;
        Ok(())
    }
}

impl<STEP, DIR, EN> AxisOutput for AxisDriver<STEP, DIR, EN>
where
    STEP: OutputPin,
    DIR: OutputPin,
    EN: OutputPin,
{
    fn set_direction(&mut self, forward: bool) -> Result<bool> {
        if self.current_direction == Some(forward) {
            return Ok(false);
        }

        let pin_high = forward != self.invert_direction;
        if pin_high {
            self.dir_pin.set_high().map_err(|_| StepperError::PinError)?;
        } else {
            self.dir_pin.set_low().map_err(|_| StepperError::PinError)?;
        }

        self.current_direction = Some(forward);
        Ok(true)
    }

    fn step(&mut self) -> Result<()> {
        self.step_pin.set_high().map_err(|_| StepperError::PinError)?;
        self.step_pin.set_low().map_err(|_| StepperError::PinError)?;
        Ok(())
    }

    fn enable(&mut self) -> Result<()> {
        self.write_enable(true)
    }

    fn disable(&mut self) -> Result<()> {
        self.write_enable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction};

    #[test]
    fn test_direction_written_only_on_change() {
        let step = PinMock::new(&[]);
        let dir = PinMock::new(&[
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ]);
        let mut driver = AxisDriver::new(step, dir, NoPin, false, false);

        assert!(driver.set_direction(true).unwrap());
        assert!(!driver.set_direction(true).unwrap());
        assert!(driver.set_direction(false).unwrap());
        assert!(!driver.set_direction(false).unwrap());
        assert_eq!(driver.direction(), Some(false));

        let (mut step, mut dir, _) = driver.release();
        step.done();
        dir.done();
    }

    #[test]
    fn test_inverted_direction() {
        let step = PinMock::new(&[]);
        let dir = PinMock::new(&[Transaction::set(State::Low)]);
        let mut driver = AxisDriver::new(step, dir, NoPin, true, false);

        assert!(driver.set_direction(true).unwrap());

        let (mut step, mut dir, _) = driver.release();
        step.done();
        dir.done();
    }

    #[test]
    fn test_step_pulse_and_enable() {
        let step = PinMock::new(&[
            Transaction::set(State::High),
            Transaction::set(State::Low),
        ]);
        let dir = PinMock::new(&[]);
        let enable = PinMock::new(&[
            Transaction::set(State::Low),
            Transaction::set(State::High),
        ]);
        let mut driver = AxisDriver::new(step, dir, enable, false, false);

        driver.enable().unwrap();
        assert!(driver.is_enabled());
        driver.step().unwrap();
        driver.disable().unwrap();
        assert!(!driver.is_enabled());

        let (mut step, mut dir, mut enable) = driver.release();
        step.done();
        dir.done();
        enable.done();
    }
}
