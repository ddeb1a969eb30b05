//! Error types for stepper-planner.
//!
//! Only genuine faults are errors. Flow control (a full queue, an empty
//! queue) is reported through return values, and contract violations
//! panic.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-planner operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Move intake error
    Motion(MotionError),
    /// Step output error
    Stepper(StepperError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Axis name not found in configuration
    AxisNotFound(heapless::String<16>),
    /// Number of configured axes differs from the number the system was built for
    AxisCountMismatch {
        /// Axis count the system was instantiated with
        expected: usize,
        /// Axis count found in the configuration
        found: usize,
    },
    /// Invalid steps per millimetre (must be > 0)
    InvalidStepsPerMm(f32),
    /// Invalid max speed (must be > 0)
    InvalidMaxSpeed(f32),
    /// Invalid max acceleration (must be > 0)
    InvalidMaxAcceleration(f32),
    /// Invalid junction speed (must be > 0)
    InvalidJunctionSpeed(f32),
    /// Invalid split lengths (0 < min <= max required)
    InvalidSplitLength {
        /// Minimum sub-segment length
        min: f32,
        /// Maximum sub-segment length
        max: f32,
    },
    /// Invalid segment density (must be >= 0)
    InvalidSegmentsPerSecond(f32),
    /// Invalid timer clock frequency (must be > 0)
    InvalidClockFrequency(u32),
    /// Commit count must be between 1 and the usable lookahead length
    InvalidCommitCount {
        /// Configured commit count
        commit_count: usize,
        /// Usable lookahead length
        lookahead: usize,
    },
    /// The step-block queue cannot take the blocks of one full lookahead commit
    QueueTooSmall {
        /// Blocks needed
        needed: usize,
        /// Blocks the queue holds
        capacity: usize,
    },
    /// A required builder field was not supplied
    MissingField(&'static str),
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Move intake errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Target coordinate is not a finite number
    InvalidTarget {
        /// Index of the offending axis
        axis: usize,
    },
    /// Feed rate must be finite and > 0
    InvalidFeedRate(f32),
    /// Acceleration override must be finite and > 0
    InvalidAcceleration(f32),
    /// The move needs more sub-segments than the splitter can number
    MoveTooLong {
        /// Length of the move in millimetres
        distance: f32,
    },
    /// The system is halted after an emergency stop and must be reset
    Halted,
}

/// Step output errors.
#[derive(Debug, Clone, PartialEq)]
pub enum StepperError {
    /// Pin operation failed
    PinError,
    /// A pulse time had already elapsed when the timer interrupt ran
    DeadlineMissed {
        /// Index of the axis whose pulse was late
        axis: usize,
        /// How late the pulse was, in timer ticks
        late_by: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Stepper(e) => write!(f, "Stepper error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::AxisNotFound(name) => write!(f, "Axis '{}' not found", name),
            ConfigError::AxisCountMismatch { expected, found } => {
                write!(f, "Expected {} axes, configuration has {}", expected, found)
            }
            ConfigError::InvalidStepsPerMm(v) => write!(f, "Invalid steps per mm: {}. Must be > 0", v),
            ConfigError::InvalidMaxSpeed(v) => write!(f, "Invalid max speed: {}. Must be > 0", v),
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidJunctionSpeed(v) => {
                write!(f, "Invalid junction speed: {}. Must be > 0", v)
            }
            ConfigError::InvalidSplitLength { min, max } => {
                write!(f, "Invalid split lengths: min ({}) must be > 0 and <= max ({})", min, max)
            }
            ConfigError::InvalidSegmentsPerSecond(v) => {
                write!(f, "Invalid segments per second: {}. Must be >= 0", v)
            }
            ConfigError::InvalidClockFrequency(v) => {
                write!(f, "Invalid clock frequency: {}. Must be > 0", v)
            }
            ConfigError::InvalidCommitCount { commit_count, lookahead } => {
                write!(f, "Invalid commit count: {}. Must be 1-{}", commit_count, lookahead)
            }
            ConfigError::QueueTooSmall { needed, capacity } => {
                write!(f, "Step queue holds {} blocks, {} needed", capacity, needed)
            }
            ConfigError::MissingField(field) => write!(f, "{} is required", field),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::InvalidTarget { axis } => write!(f, "Target for axis {} is not finite", axis),
            MotionError::InvalidFeedRate(v) => write!(f, "Invalid feed rate: {}", v),
            MotionError::InvalidAcceleration(v) => write!(f, "Invalid acceleration: {}", v),
            MotionError::MoveTooLong { distance } => {
                write!(f, "Move of {} mm needs too many sub-segments", distance)
            }
            MotionError::Halted => write!(f, "Motion halted by emergency stop"),
        }
    }
}

impl fmt::Display for StepperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepperError::PinError => write!(f, "GPIO pin operation failed"),
            StepperError::DeadlineMissed { axis, late_by } => {
                write!(f, "Axis {} step pulse missed its deadline by {} ticks", axis, late_by)
            }
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<StepperError> for Error {
    fn from(e: StepperError) -> Self {
        Error::Stepper(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for StepperError {}
