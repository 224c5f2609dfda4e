use crate::config::GatewayConfig;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use edgecast_core::SignalingMessage;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

const MAX_SNAPSHOT_BYTES: u64 = 10 * 1024 * 1024;

/// Body of one status heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub record_status: String,
    pub record_usage: u32,
    pub cpu_temp: i32,
    pub gpu_temp: i32,
    /// Base64 JPEG, empty when unavailable.
    pub rgb_snapshot: String,
    pub thermal_snapshot: String,
}

impl StatusReport {
    pub fn into_message(self) -> SignalingMessage {
        SignalingMessage::CameraStatus {
            record_status: self.record_status,
            record_usage: self.record_usage,
            cpu_temp: self.cpu_temp,
            gpu_temp: self.gpu_temp,
            rgb_snapshot: self.rgb_snapshot,
            thermal_snapshot: self.thermal_snapshot,
        }
    }
}

#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn report(&self) -> StatusReport;
}

/// Reports the configured recording flag, sysfs temperatures and the latest
/// snapshots the media pipeline left on disk. Storage usage is not measured.
///
/// The `[status]` section is re-read on every report, so reloads apply to the
/// next heartbeat.
pub struct StaticStatusProvider {
    config: watch::Receiver<Arc<GatewayConfig>>,
}

impl StaticStatusProvider {
    pub fn new(config: watch::Receiver<Arc<GatewayConfig>>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StatusProvider for StaticStatusProvider {
    async fn report(&self) -> StatusReport {
        let config = self.config.borrow().status.clone();
        let dir = &config.snapshot_dir;
        let rgb_snapshot = read_snapshot(&dir.join("cam0_snapshot.jpg")).await;
        let thermal_snapshot = if config.device_count > 1 {
            read_snapshot(&dir.join("cam1_snapshot.jpg")).await
        } else {
            String::new()
        };

        StatusReport {
            record_status: if config.recording { "On" } else { "Off" }.to_owned(),
            record_usage: 0,
            cpu_temp: read_temperature(&config.cpu_temp_path).await,
            gpu_temp: read_temperature(&config.gpu_temp_path).await,
            rgb_snapshot,
            thermal_snapshot,
        }
    }
}

/// Whole degrees from a millidegree file; 0 when unreadable.
async fn read_temperature(path: &Path) -> i32 {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => text.trim().parse::<i32>().map(|m| m / 1000).unwrap_or(0),
        Err(e) => {
            debug!("No temperature at {}: {e}", path.display());
            0
        }
    }
}

async fn read_snapshot(path: &Path) -> String {
    let size = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.len(),
        Err(e) => {
            debug!("No snapshot at {}: {e}", path.display());
            return String::new();
        }
    };
    if size == 0 || size > MAX_SNAPSHOT_BYTES {
        warn!("Skipping snapshot {} of {size} bytes", path.display());
        return String::new();
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => BASE64.encode(bytes),
        Err(e) => {
            warn!("Failed to read snapshot {}: {e}", path.display());
            String::new()
        }
    }
}
