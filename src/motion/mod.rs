//! Motion module for stepper-planner.
//!
//! Ties the planning and stepping layers together: planned segments become
//! timed step blocks. [`MotionSystem`] plans in the main loop and
//! [`StepperContext`] steps in the timer interrupt.

mod planner;
mod profile;
mod system;

pub use planner::{AppendResult, MotionPlanner};
pub use profile::{phase_timings, segment_blocks, MotionPhase, PhaseTiming};
pub use system::{MotionSystem, StepperContext};
