//! System configuration - root configuration structure.

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use super::axis::AxisConfig;
use super::planner::PlannerConfig;
use super::splitter::SplitterConfig;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemConfig {
    /// Lookahead planner settings.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Move subdivision settings.
    #[serde(default)]
    pub splitter: SplitterConfig,

    /// Named axis configurations; declaration order is step priority.
    pub axes: FnvIndexMap<String<16>, AxisConfig, 8>,
}

impl SystemConfig {
    /// Get an axis configuration by name.
    pub fn axis(&self, name: &str) -> Option<&AxisConfig> {
        self.axes
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Position of an axis in priority order.
    pub fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.keys().position(|k| k.as_str() == name)
    }

    /// List all axis names in priority order.
    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.keys().map(|s| s.as_str())
    }

    /// Number of configured axes.
    #[inline]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }
}
