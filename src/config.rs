use crate::internals::*;
use crate::protocol::COLA_DEFAULT_MAX_FRAME_LEN;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings of a [`Nav350Device`](crate::Nav350Device).
///
/// # Example
/// ```rust
/// # use nav350::DriverConfig;
/// # use std::time::Duration;
/// let config = DriverConfig::new("192.168.1.10")
///     .with_reply_timeout(Duration::from_secs(2));
/// assert_eq!(config.port, 2111);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriverConfig {
    /// IPv4 address of the device.
    pub address: String,
    pub port: u16,
    pub connect_timeout: Duration,
    /// Applied to every command unless a `*_with_timeout` method is used.
    pub reply_timeout: Duration,
    /// Bytes requested per socket read by the receiver thread.
    pub read_chunk_size: usize,
    /// Frames longer than this are discarded as garbage.
    pub max_frame_len: usize,
}

impl DriverConfig {
    /// Default settings for the device at `address`.
    pub fn new(address: impl Into<String>) -> DriverConfig {
        DriverConfig {
            address: address.into(),
            ..DriverConfig::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> DriverConfig {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> DriverConfig {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> DriverConfig {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_read_chunk_size(mut self, size: usize) -> DriverConfig {
        self.read_chunk_size = size;
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> DriverConfig {
        self.max_frame_len = len;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            address: "192.168.1.10".to_owned(),
            port: NAV350_DEFAULT_PORT,
            connect_timeout: NAV350_DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: NAV350_DEFAULT_REPLY_TIMEOUT,
            read_chunk_size: NAV350_DEFAULT_READ_CHUNK_SIZE,
            max_frame_len: COLA_DEFAULT_MAX_FRAME_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = DriverConfig::new("10.0.0.5")
            .with_port(2112)
            .with_connect_timeout(Duration::from_millis(300))
            .with_read_chunk_size(512)
            .with_max_frame_len(64 * 1024);
        assert_eq!(config.address, "10.0.0.5");
        assert_eq!(config.port, 2112);
        assert_eq!(config.connect_timeout, Duration::from_millis(300));
        assert_eq!(config.reply_timeout, NAV350_DEFAULT_REPLY_TIMEOUT);
        assert_eq!(config.read_chunk_size, 512);
        assert_eq!(config.max_frame_len, 64 * 1024);
    }
}
