//! Position tracking for stepper axes.
//!
//! Provides absolute position tracking in steps with unit conversions.

use crate::config::units::{Millimeters, Steps};

/// Executed position of one axis.
///
/// Updated by the synchronizer for every emitted pulse.
#[derive(Debug, Clone, Copy, Default)]
pub struct AxisState {
    /// Current position in steps (from origin)
    steps: Steps,
    /// Steps per millimetre for conversions
    steps_per_mm: f32,
    /// Direction of the last emitted step
    forward: bool,
}

impl AxisState {
    /// Create a position tracker at the origin.
    #[inline]
    pub fn new(steps_per_mm: f32) -> Self {
        Self {
            steps: Steps::default(),
            steps_per_mm,
            forward: true,
        }
    }

    /// Get current position in steps.
    #[inline]
    pub fn steps(&self) -> Steps {
        self.steps
    }

    /// Get current position in millimetres.
    #[inline]
    pub fn mm(&self) -> Millimeters {
        self.steps.to_mm(self.steps_per_mm)
    }

    /// Direction of the last emitted step.
    #[inline]
    pub fn forward(&self) -> bool {
        self.forward
    }

    /// Set position in steps.
    #[inline]
    pub fn set_steps(&mut self, steps: Steps) {
        self.steps = steps;
    }

    /// Record one step in the given direction.
    #[inline]
    pub fn record_step(&mut self, forward: bool) {
        self.forward = forward;
        self.steps = Steps(self.steps.0 + if forward { 1 } else { -1 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_tracking() {
        let mut state = AxisState::new(80.0);
        assert_eq!(state.steps().value(), 0);

        for _ in 0..160 {
            state.record_step(true);
        }
        assert!((state.mm().value() - 2.0).abs() < 1e-6);

        state.record_step(false);
        assert_eq!(state.steps(), Steps(159));
        assert!(!state.forward());
    }
}
