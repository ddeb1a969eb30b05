//! Configuration module for stepper-planner.
//!
//! Provides types for loading and validating axis, planner and splitter
//! configurations from TOML files (with `std` feature) or pre-parsed data.

mod axis;
mod planner;
mod splitter;
mod system;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxisConfig, AxisConstraints};
pub use planner::{LatePulsePolicy, PlannerConfig};
pub use splitter::SplitterConfig;
pub use system::SystemConfig;
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerSec, MmPerSecSquared, Steps};
