//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{bail, Context, Result};
use livecast_core::bootstrap::StreamSource;
use livecast_core::protocol_constants::{
    APP_LOAD_TIMEOUT_SECS, DEFAULT_TOPIC_PREFIX, DISCOVERY_TIMEOUT_MS, NETWORK_TIMEOUT_SECS,
};
use livecast_core::{ArbitrationConfig, StreamSpec, StreamTable};
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Friendly name of the device to control, if discovery finds it.
    /// Override: `LIVECAST_PREFERRED_DEVICE`
    pub preferred_device: Option<String>,

    /// `host` or `host:port` of the device; skips discovery.
    /// Override: `LIVECAST_DEVICE_ADDRESS`
    pub device_address: Option<String>,

    /// MQTT broker carrying stream notifications.
    /// Override: `LIVECAST_MQTT_URL`
    pub mqtt_url: String,

    /// MQTT client id.
    pub mqtt_client_id: String,

    /// Topic prefix; one topic `<prefix>/<stream>` per stream.
    /// Override: `LIVECAST_TOPIC_PREFIX`
    pub topic_prefix: String,

    /// Streams to arbitrate, higher priority wins.
    pub streams: Vec<StreamSpec>,

    /// Icecast `status-json.xsl` URL.
    /// Override: `LIVECAST_DIRECTORY_URL`
    pub directory_url: String,

    /// Playback URL template with `{name}`; replaces the directory when set.
    /// Override: `LIVECAST_URL_TEMPLATE`
    pub url_template: Option<String>,

    /// Artwork shown on the device.
    pub image_url: Option<String>,

    pub network_timeout_secs: u64,
    pub app_load_timeout_secs: u64,
    pub discovery_timeout_ms: u64,

    /// Arbitration tunables.
    pub arbitration: ArbitrationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            preferred_device: Some("Bedroom speaker".to_string()),
            device_address: None,
            mqtt_url: "mqtt://livemasjid.com:1883".to_string(),
            mqtt_client_id: "livecast".to_string(),
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            streams: vec![
                StreamSpec::new("hmjamaat", 1),
                StreamSpec::new("hma_furqaan", 2),
            ],
            directory_url: "http://livemasjid.com:8000/status-json.xsl".to_string(),
            url_template: None,
            image_url: Some("https://www.livemasjid.com/images/MasjidLogo.png".to_string()),
            network_timeout_secs: NETWORK_TIMEOUT_SECS,
            app_load_timeout_secs: APP_LOAD_TIMEOUT_SECS,
            discovery_timeout_ms: DISCOVERY_TIMEOUT_MS,
            arbitration: ArbitrationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies `LIVECAST_*` overrides looked up through `var`.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("LIVECAST_PREFERRED_DEVICE") {
            self.preferred_device = Some(val);
        }
        if let Some(val) = var("LIVECAST_DEVICE_ADDRESS") {
            self.device_address = Some(val);
        }
        if let Some(val) = var("LIVECAST_MQTT_URL") {
            self.mqtt_url = val;
        }
        if let Some(val) = var("LIVECAST_TOPIC_PREFIX") {
            self.topic_prefix = val;
        }
        if let Some(val) = var("LIVECAST_DIRECTORY_URL") {
            self.directory_url = val;
        }
        if let Some(val) = var("LIVECAST_URL_TEMPLATE") {
            self.url_template = Some(val);
        }
    }

    /// Checks cross-field constraints the core cannot see.
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            bail!("no streams configured");
        }
        if let Some(spec) = self.streams.iter().find(|spec| spec.name.trim().is_empty()) {
            bail!("stream with priority {} has an empty name", spec.priority);
        }
        if self.topic_prefix.is_empty() {
            bail!("topic_prefix must not be empty");
        }
        Ok(())
    }

    pub fn stream_table(&self) -> StreamTable {
        StreamTable::new(self.streams.iter().cloned())
    }

    pub fn stream_source(&self) -> StreamSource {
        match &self.url_template {
            Some(template) => StreamSource::Template(template.clone()),
            None => StreamSource::Directory(self.directory_url.clone()),
        }
    }

    /// Converts to livecast-core's Config type.
    pub fn to_core_config(&self) -> livecast_core::Config {
        livecast_core::Config {
            network_timeout_secs: self.network_timeout_secs,
            app_load_timeout_secs: self.app_load_timeout_secs,
            discovery_timeout_ms: self.discovery_timeout_ms,
            image_url: self.image_url.clone(),
            arbitration: self.arbitration.clone(),
            ..Default::default()
        }
    }
}
