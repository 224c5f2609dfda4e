//! Gateway configuration.
//!
//! Loaded from a TOML file where every section and field is optional:
//!
//! ```toml
//! [signaling]
//! server_url = "wss://signal.example.com"
//! camera_id = "cam-01"
//!
//! [ports]
//! base_port = 5000
//! max_peers = 10
//!
//! [heartbeat]
//! interval_ms = 1000
//! ```
//!
//! Changes are published through a `watch` channel so running components
//! re-apply them without polling the file.

use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    pub signaling: SignalingConfig,
    pub ports: PortsConfig,
    pub heartbeat: HeartbeatConfig,
    pub media: MediaConfig,
    pub status: StatusConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignalingConfig {
    /// Base `ws://` or `wss://` URL of the signaling server.
    pub server_url: String,
    pub camera_id: String,
    pub token: String,
    pub firmware_version: String,
    pub ai_version: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:8080".to_owned(),
            camera_id: "ai_cds".to_owned(),
            token: "test".to_owned(),
            firmware_version: "1.0.0".to_owned(),
            ai_version: "0.1.0".to_owned(),
        }
    }
}

/// Range the per-viewer RTP ports are drawn from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    pub base_port: u16,
    /// Distance between consecutive ports; 2 keeps the RTCP port free.
    pub stride: u16,
    /// Hard ceiling on concurrent viewers.
    pub max_peers: usize,
    /// Ports owned by other subsystems (recording sinks).
    pub reserved: Vec<u16>,
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            base_port: 5000,
            stride: 2,
            max_peers: 10,
            reserved: vec![7000, 7001],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    /// Length of one backoff unit.
    pub backoff_unit_ms: u64,
    /// Backoff ceiling, in units.
    pub backoff_cap: u32,
    /// Heartbeats without a status ack before the gateway complains.
    pub unconfirmed_warn_after: u32,
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            backoff_unit_ms: 1000,
            backoff_cap: 60,
            unconfirmed_warn_after: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub ice_servers: Vec<String>,
    /// Address the RTP receive sockets bind to.
    pub rtp_bind_address: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_owned()],
            rtp_bind_address: "127.0.0.1".to_owned(),
        }
    }
}

/// Inputs of the periodic camera status message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Directory holding `cam{N}_snapshot.jpg` written by the media pipeline.
    pub snapshot_dir: PathBuf,
    pub device_count: u8,
    pub recording: bool,
    /// Millidegree readings, as exposed by sysfs thermal zones.
    pub cpu_temp_path: PathBuf,
    pub gpu_temp_path: PathBuf,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("/tmp/snapshots"),
            device_count: 2,
            recording: true,
            cpu_temp_path: PathBuf::from("/sys/class/thermal/thermal_zone0/temp"),
            gpu_temp_path: PathBuf::from("/sys/class/thermal/thermal_zone1/temp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub listen: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: SocketAddr::from(([0, 0, 0, 0], 9617)),
        }
    }
}

impl GatewayConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.signaling.server_url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::Invalid(format!(
                "signaling.server_url must be ws:// or wss://, got '{url}'"
            )));
        }
        if self.signaling.camera_id.is_empty() {
            return Err(ConfigError::Invalid(
                "signaling.camera_id must not be empty".to_owned(),
            ));
        }
        if self.ports.max_peers == 0 || self.ports.stride == 0 {
            return Err(ConfigError::Invalid(
                "ports.max_peers and ports.stride must be positive".to_owned(),
            ));
        }
        let span = (self.ports.max_peers + self.ports.reserved.len()) as u64
            * u64::from(self.ports.stride);
        if u64::from(self.ports.base_port) + span > u64::from(u16::MAX) {
            return Err(ConfigError::Invalid(format!(
                "{} ports from {} overflow the port range",
                self.ports.max_peers, self.ports.base_port
            )));
        }
        if self.heartbeat.interval_ms == 0 || self.heartbeat.backoff_unit_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat intervals must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Full signaling endpoint for this camera.
    pub fn signaling_url(&self) -> String {
        let s = &self.signaling;
        format!(
            "{}/signaling/{}/?token={}&peerType=camera",
            s.server_url.trim_end_matches('/'),
            s.camera_id,
            s.token
        )
    }
}

/// Values given on the command line. They win over the file, including
/// after a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub camera_id: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(url) = &self.server_url {
            config.signaling.server_url = url.clone();
        }
        if let Some(id) = &self.camera_id {
            config.signaling.camera_id = id.clone();
        }
    }
}

/// Owns the on-disk config and notifies subscribers when it changes.
pub struct ConfigWatch {
    path: Option<PathBuf>,
    overrides: ConfigOverrides,
    tx: watch::Sender<Arc<GatewayConfig>>,
}

impl ConfigWatch {
    pub fn new(config: GatewayConfig) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self {
            path: None,
            overrides: ConfigOverrides::default(),
            tx,
        }
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = GatewayConfig::load(&path)?;
        let (tx, _rx) = watch::channel(Arc::new(config));
        Ok(Self {
            path: Some(path),
            overrides: ConfigOverrides::default(),
            tx,
        })
    }

    /// Apply `overrides` now and on every later reload.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = GatewayConfig::clone(&self.current());
        overrides.apply(&mut config);
        config.validate()?;
        self.publish(config);
        self.overrides = overrides;
        Ok(self)
    }

    pub fn current(&self) -> Arc<GatewayConfig> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<GatewayConfig>> {
        self.tx.subscribe()
    }

    /// Publish `config` if it differs from the current one.
    pub fn publish(&self, config: GatewayConfig) -> bool {
        self.tx.send_if_modified(|current| {
            if **current == config {
                return false;
            }
            *current = Arc::new(config);
            true
        })
    }

    /// Re-read the backing file. Returns whether anything changed.
    pub fn reload(&self) -> Result<bool, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        let mut config = GatewayConfig::load(path)?;
        self.overrides.apply(&mut config);
        config.validate()?;
        let changed = self.publish(config);
        if changed {
            info!("Configuration reloaded from {}", path.display());
        }
        Ok(changed)
    }
}
