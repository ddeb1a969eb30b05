//! # stepper-planner
//!
//! Lookahead motion planning and chronologically merged multi-axis step
//! generation with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Lookahead planning**: Junction speeds resolved over a window of queued segments
//! - **Exact step counts**: Cumulative rounding, no drift across segments
//! - **Single timer**: All axes merged into one chronological pulse stream
//! - **embedded-hal 1.0**: Uses `OutputPin` for STEP/DIR/EN
//! - **no_std compatible**: No allocation, fixed-capacity queues
//! - **Configuration-driven**: Axes and planner tuning in TOML files
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_planner::{AxisDriverBuilder, BlockQueue, MotionSystem, MoveRequest};
//!
//! // Any `&'static mut`, for instance from `cortex_m::singleton!`.
//! let blocks: &'static mut BlockQueue<2, 32> = make_static(BlockQueue::new());
//!
//! let config = stepper_planner::load_config("machine.toml")?;
//!
//! let x = AxisDriverBuilder::new()
//!     .from_config(&config, "x")?
//!     .step_pin(x_step)
//!     .dir_pin(x_dir)
//!     .enable_pin(x_en)
//!     .build()?;
//! let y = /* ... */;
//!
//! let (mut motion, mut stepper) =
//!     MotionSystem::<2, 16, 32>::from_config(&config, blocks, [x, y])?;
//! let _ = motion.append_move(&MoveRequest::new([10.0, 5.0], 50.0))?;
//! motion.flush();
//!
//! // Main loop
//! if let Some(start) = motion.poll(timer.now()) {
//!     timer.schedule(start);
//! }
//!
//! // Timer interrupt, owning `stepper`
//! if let Some(deadline) = stepper.on_timer(timer.now())? {
//!     timer.schedule(deadline);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Must come first so the logging macros are visible to every module
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod motion;
pub mod planning;
pub mod stepping;

// Re-exports for ergonomic API
pub use config::{validate_config, AxisConfig, LatePulsePolicy, PlannerConfig, SplitterConfig, SystemConfig};
pub use error::{Error, Result};
pub use motion::{AppendResult, MotionPhase, MotionSystem, StepperContext};
pub use planning::{MoveRequest, PlannerQueue};
pub use stepping::{
    AxisDriver, AxisDriverBuilder, AxisOutput, BlockQueue, NoPin, RunState, StepBlock, StopReason,
};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Millimeters, MmPerSec, MmPerSecSquared, Steps};
