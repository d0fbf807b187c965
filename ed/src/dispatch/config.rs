//! Dispatcher configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Channel buffer size for dispatcher requests
    #[serde(rename = "request-buffer", default = "default_request_buffer")]
    pub request_buffer: usize,

    /// Channel buffer size for each peer's delivery channel
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_request_buffer() -> usize {
    debug!("default_request_buffer: called");
    1000
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        debug!("DispatcherConfig::default: called");
        Self {
            request_buffer: 1000,
            channel_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.request_buffer, 1000);
        assert_eq!(config.channel_buffer, 256);
    }

    #[test]
    fn test_serde_defaults_match_default_impl() {
        let config: DispatcherConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DispatcherConfig::default());
    }
}
