// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

pub use config::ConfigError;

/// Address used for zero-value promotion spam. Fixed at deployment;
/// overridable through `attachment.promotion_address`.
pub const DEFAULT_PROMOTION_ADDRESS: &str =
    "SOME9RANDOM9HUB9BEING9REATTACHED9999999999999999999999999999999999999999\
999999999";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub node: NodeConfig,
    pub attachment: AttachmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP URI of the ledger node, e.g. `http://localhost:14265`.
    pub uri: String,
    /// Minimum weight magnitude the node expects for attachments.
    pub mwm: usize,
    /// Tip selection depth for fresh attachments.
    pub depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub tick_interval_ms: u64,
    /// Depth passed to tip selection when promoting an existing tail.
    pub promotion_depth: usize,
    pub promotion_address: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            attachment: AttachmentConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:14265".to_string(),
            mwm: 14,
            depth: 3,
        }
    }
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 90_000,
            promotion_depth: 0,
            promotion_address: DEFAULT_PROMOTION_ADDRESS.to_string(),
        }
    }
}

impl AttachmentConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl HubConfig {
    /// Layered load: optional TOML file, then `HUB_`-prefixed environment
    /// overrides (`HUB_NODE__URI`, `HUB_ATTACHMENT__TICK_INTERVAL_MS`, ...).
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("HUB").separator("__"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_address_is_a_full_address() {
        assert_eq!(DEFAULT_PROMOTION_ADDRESS.len(), 81);
        assert!(DEFAULT_PROMOTION_ADDRESS
            .chars()
            .all(|c| c == '9' || c.is_ascii_uppercase()));
    }

    #[test]
    fn defaults_cover_every_section() {
        let config = HubConfig::default();
        assert_eq!(config.attachment.promotion_depth, 0);
        assert_eq!(
            config.attachment.tick_interval(),
            Duration::from_millis(90_000)
        );
        assert_eq!(config.node.mwm, 14);
    }
}
