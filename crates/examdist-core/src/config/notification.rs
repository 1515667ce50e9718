//! Course owner notification configuration.

use serde::{Deserialize, Serialize};

/// Notification sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether owners are notified when documents are handed out.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-owner broadcast channel capacity.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    64
}
