//! Client configuration.
//!
//! Usually delivered by the hosting page as a JSON object; every field has a
//! default so a partial object (or none at all) is accepted.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::geometry::Size;
use crate::logging::LogTargets;

/// Default upload size limit: 100 MiB.
pub const DEFAULT_MAX_UPLOAD: u64 = 100 * 1024 * 1024;

/// Options controlling a [`Client`](crate::client::Client).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Development mode: the page stays visible after transport loss and
    /// the context menu is not suppressed.
    pub debug: bool,
    /// Page id stamped on every outbound packet.
    pub pid: String,
    /// Keepalive interval in milliseconds; `0` disables keepalive.
    pub keepalive: u64,
    /// Per-level log routing (`"info" -> 1|2`).
    pub logging: HashMap<String, u8>,
    /// Default limit for uploaded files, in bytes.
    pub max_upload: u64,
    pub base_url: Option<String>,
    pub request_url: Option<String>,
    pub viewport: Size,
    /// Minutes from UTC, as reported by the host environment.
    pub timezone_offset: i32,
    /// Screen metadata, flattened into the init packet as `screen_<key>`.
    pub screen: Map<String, Value>,
    /// Browser metadata, flattened into the init packet as `browser_<key>`.
    pub browser: Map<String, Value>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            debug: false,
            pid: String::new(),
            keepalive: 0,
            logging: HashMap::new(),
            max_upload: DEFAULT_MAX_UPLOAD,
            base_url: None,
            request_url: None,
            viewport: Size::default(),
            timezone_offset: 0,
            screen: Map::new(),
            browser: Map::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(pid: impl Into<String>) -> Self {
        Self {
            pid: pid.into(),
            ..Self::default()
        }
    }

    /// Parse from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_keepalive(mut self, millis: u64) -> Self {
        self.keepalive = millis;
        self
    }

    pub fn with_max_upload(mut self, bytes: u64) -> Self {
        self.max_upload = bytes;
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Size::new(width, height);
        self
    }

    /// Route `level` to the given targets.
    pub fn with_logging(mut self, level: &str, targets: LogTargets) -> Self {
        self.logging.insert(level.to_lowercase(), targets.bits());
        self
    }

    /// Keepalive interval, if enabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive > 0).then(|| Duration::from_millis(self.keepalive))
    }

    /// Targets for `level`; console only unless configured.
    pub fn log_targets(&self, level: &str) -> LogTargets {
        self.logging
            .get(&level.to_lowercase())
            .map_or(LogTargets::CONSOLE, |bits| LogTargets::from_bits(*bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.max_upload, DEFAULT_MAX_UPLOAD);
        assert!(config.keepalive_interval().is_none());
        assert_eq!(config.log_targets("info"), LogTargets::CONSOLE);
    }

    #[test]
    fn partial_json() {
        let config = ClientConfig::from_json(
            r#"{"pid": "p9", "keepalive": 30000, "maxUpload": 10, "logging": {"error": 3},
                "viewport": {"width": 800, "height": 600}, "screen": {"width": 1920}}"#,
        )
        .unwrap();
        assert_eq!(config.pid, "p9");
        assert_eq!(config.keepalive_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.max_upload, 10);
        assert!(config.log_targets("ERROR").contains(LogTargets::SERVER));
        assert_eq!(config.viewport, Size::new(800.0, 600.0));
        assert!(!config.debug);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(ClientConfig::from_json("{\"keepalive\": \"soon\"}").is_err());
    }

    #[test]
    fn builders() {
        let config = ClientConfig::new("p")
            .with_debug(true)
            .with_keepalive(1000)
            .with_logging("warn", LogTargets::SERVER);
        assert!(config.debug);
        assert_eq!(config.log_targets("warn"), LogTargets::SERVER);
    }
}
