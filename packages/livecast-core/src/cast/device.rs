//! Target device address.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol_constants::CAST_DEFAULT_PORT;

/// Error parsing a `host[:port]` device address.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceAddressError {
    #[error("device address is empty")]
    Empty,
    #[error("invalid port in device address: {0}")]
    InvalidPort(String),
}

/// A resolved Cast device. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub host: String,
    pub port: u16,
    pub display_name: String,
}

impl Device {
    pub fn new(host: impl Into<String>, port: u16, display_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            display_name: display_name.into(),
        }
    }

    /// Parses `host` or `host:port`; the port defaults to 8009.
    pub fn parse(
        address: &str,
        display_name: impl Into<String>,
    ) -> Result<Self, DeviceAddressError> {
        let address = address.trim();
        let (host, port) = match address.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| DeviceAddressError::InvalidPort(port.to_string()))?;
                (host, port)
            }
            None => (address, CAST_DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(DeviceAddressError::Empty);
        }

        Ok(Self::new(host, port, display_name))
    }

    /// `host:port`, used as the lock key and in logs.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{} ({}:{})", self.display_name, self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults_port() {
        let device = Device::parse("192.168.1.20", "Kitchen").unwrap();
        assert_eq!(device.port, 8009);
        assert_eq!(device.address(), "192.168.1.20:8009");
    }

    #[test]
    fn parse_explicit_port() {
        let device = Device::parse("10.0.0.5:8010", "").unwrap();
        assert_eq!(device.host, "10.0.0.5");
        assert_eq!(device.port, 8010);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Device::parse("  ", ""), Err(DeviceAddressError::Empty));
        assert_eq!(
            Device::parse("10.0.0.5:abc", ""),
            Err(DeviceAddressError::InvalidPort("abc".into()))
        );
    }
}
