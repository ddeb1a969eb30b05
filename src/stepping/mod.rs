//! Step generation: command blocks, pulse timing and pin output.

pub mod builder;
pub mod command;
pub mod driver;
pub mod math;
pub mod position;
pub mod queue;
pub mod splitter;
pub mod synchronizer;

pub use builder::AxisDriverBuilder;
pub use command::{AxisPhase, PhaseTimer, StepBlock, MAX_COMMAND_STEPS};
pub use driver::{AxisDriver, AxisOutput, NoPin};
pub use math::IntSqrt;
pub use position::AxisState;
pub use queue::{Arming, BlockQueue, BlockReader, BlockWriter, RunState};
pub use splitter::AxisSplitter;
pub use synchronizer::{StepperSynchronizer, StopReason};
