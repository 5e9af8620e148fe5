//! Tunables of the client-side concurrency control.

use serde::{Deserialize, Serialize};

/// Settings for [`crate::ot::control::ClientConcurrencyControl`].
///
/// Deserializes from a host configuration file; missing fields take their
/// defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlConfig {
    /// Unacknowledged local operations allowed before new ones are refused.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_max_pending() -> usize {
    1024
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_pending: default_max_pending(),
        }
    }
}
