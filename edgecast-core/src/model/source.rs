use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical camera a feed originates from.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub enum CameraDevice {
    Rgb,
    Thermal,
}

impl fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraDevice::Rgb => f.write_str("RGB"),
            CameraDevice::Thermal => f.write_str("Thermal"),
        }
    }
}

/// Quality tier of a feed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub enum StreamType {
    Main,
    Secondary,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Main => f.write_str("main"),
            StreamType::Secondary => f.write_str("secondary"),
        }
    }
}

/// Which feed a viewer asked for in its join signal.
///
/// The server sends free-form strings such as `"RGB"`, `"thermal"` or
/// `"rgb_sub"`. Anything that does not name the thermal camera falls back to
/// RGB, and only an explicit `sub`/`secondary` marker selects the low tier.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SourceSpec {
    pub device: CameraDevice,
    pub stream_type: StreamType,
}

impl SourceSpec {
    pub fn new(device: CameraDevice, stream_type: StreamType) -> Self {
        Self {
            device,
            stream_type,
        }
    }

    pub fn parse(source: &str) -> Self {
        let lower = source.to_ascii_lowercase();

        let device = if lower.contains("thermal") {
            CameraDevice::Thermal
        } else {
            CameraDevice::Rgb
        };

        let stream_type = if lower.contains("sub") || lower.contains("secondary") {
            StreamType::Secondary
        } else {
            StreamType::Main
        };

        Self {
            device,
            stream_type,
        }
    }
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self::new(CameraDevice::Rgb, StreamType::Main)
    }
}

impl From<&str> for SourceSpec {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device, self.stream_type)
    }
}
