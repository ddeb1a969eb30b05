//! Move subdivision configuration.

use serde::Deserialize;

use super::units::Millimeters;

/// Bounds on the length of sub-segments a move is split into.
#[derive(Debug, Clone, Deserialize)]
pub struct SplitterConfig {
    /// Shortest sub-segment the splitter will produce.
    #[serde(rename = "min_split_length_mm")]
    pub min_split_length: Millimeters,

    /// Longest sub-segment the splitter will produce.
    #[serde(rename = "max_split_length_mm")]
    pub max_split_length: Millimeters,

    /// Desired number of sub-segments per second of motion at full speed.
    #[serde(default)]
    pub segments_per_second: f32,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            min_split_length: Millimeters(0.1),
            max_split_length: Millimeters(4.0),
            segments_per_second: 100.0,
        }
    }
}
