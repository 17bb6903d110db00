//! Scheduler configuration.

use serde::{Deserialize, Serialize};

/// Settings for a [`QueueScheduler`](super::QueueScheduler).
///
/// Deserializable so applications can keep scheduler settings next to the
/// rest of their configuration. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Scheduler name; also the worker thread's name.
    pub name: String,

    /// Stack size for the worker thread, in bytes. `None` uses the platform
    /// default.
    pub stack_size: Option<usize>,
}

impl SchedulerConfig {
    /// Default settings with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: "rill.background".to_string(),
            stack_size: None,
        }
    }
}
