//! Configuration management

use anyhow::{bail, Context, Result};
use letitup_client::{ColorMode, EffectTiming, ReconnectPolicy, SubscriberSettings};
use letitup_hub::HubSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hub server section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Interface to listen on
    pub bind_address: String,

    pub port: u16,

    /// Events buffered per connection before it is considered dead
    pub outbound_queue_capacity: usize,

    /// Longest a single write to a peer may block (milliseconds)
    pub send_timeout_ms: u64,

    /// Inbound lines longer than this close the connection
    pub max_line_bytes: usize,

    /// Refuse a second concurrent producer instead of last-write-wins
    pub exclusive_producer: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            outbound_queue_capacity: 64,
            send_timeout_ms: 2000,
            max_line_bytes: 64 * 1024,
            exclusive_producer: false,
        }
    }
}

/// Subscriber section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hub address as `host:port`
    pub server_address: String,

    /// Reconnect attempts at `backoff_ms` before falling back to the ceiling
    pub max_retries: u32,

    pub backoff_ms: u64,

    pub backoff_ceiling_ms: u64,

    /// Torch on-time per flash (milliseconds)
    pub engage_ms: u64,

    /// Overlay fade after the torch is released (milliseconds)
    pub fade_ms: u64,

    /// "random" palette colors or plain "white"
    pub color_mode: ColorMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            max_retries: 5,
            backoff_ms: 2000,
            backoff_ceiling_ms: 10_000,
            engage_ms: 100,
            fade_ms: 150,
            color_mode: ColorMode::Random,
        }
    }
}

/// Synthetic producer section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    /// Time between triggers (milliseconds)
    pub interval_ms: u64,

    pub intensity: f64,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            intensity: 1.0,
        }
    }
}

/// Let-It-Up configuration shared by all binaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetItUpConfig {
    /// Path the configuration was loaded from
    #[serde(skip)]
    pub config_path: PathBuf,

    pub hub: HubConfig,

    pub client: ClientConfig,

    pub pulse: PulseConfig,
}

impl LetItUpConfig {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;

            let mut config: LetItUpConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;

            config.config_path = path.to_path_buf();
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save().context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to `config_path`
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Reject values that would make the binaries misbehave
    pub fn validate(&self) -> Result<()> {
        if self.hub.outbound_queue_capacity == 0 {
            bail!("hub.outbound_queue_capacity must be at least 1");
        }
        if self.hub.max_line_bytes == 0 {
            bail!("hub.max_line_bytes must be at least 1");
        }
        if self.pulse.interval_ms == 0 {
            bail!("pulse.interval_ms must be at least 1");
        }
        if !self.pulse.intensity.is_finite() || !(0.0..=1.0).contains(&self.pulse.intensity) {
            bail!("pulse.intensity must be between 0.0 and 1.0");
        }
        if self.client.backoff_ceiling_ms < self.client.backoff_ms {
            bail!("client.backoff_ceiling_ms must not be below client.backoff_ms");
        }
        Ok(())
    }

    /// `bind_address:port` for the hub listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.hub.bind_address, self.hub.port)
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            listen_addr: self.listen_addr(),
            outbound_queue_capacity: self.hub.outbound_queue_capacity,
            send_timeout: Duration::from_millis(self.hub.send_timeout_ms),
            max_line_bytes: self.hub.max_line_bytes,
            exclusive_producer: self.hub.exclusive_producer,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_retries: self.client.max_retries,
            backoff: Duration::from_millis(self.client.backoff_ms),
            backoff_ceiling: Duration::from_millis(self.client.backoff_ceiling_ms),
        }
    }

    pub fn effect_timing(&self) -> EffectTiming {
        EffectTiming {
            engage: Duration::from_millis(self.client.engage_ms),
            fade: Duration::from_millis(self.client.fade_ms),
        }
    }

    pub fn subscriber_settings(&self) -> SubscriberSettings {
        SubscriberSettings {
            server_address: self.client.server_address.clone(),
            reconnect: self.reconnect_policy(),
            timing: self.effect_timing(),
            color_mode: self.client.color_mode,
        }
    }

    /// Get default config path
    pub fn default_config_path() -> PathBuf {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("LetItUp")
        } else if cfg!(target_os = "macos") {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("com.letitup.hub")
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("letitup")
        };

        config_dir.join("config.toml")
    }
}
