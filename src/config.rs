// ABOUTME: Session configuration: window sizes, stream limits, keepalive cadence
// ABOUTME: Immutable once a session is built; defaults match the reference implementation

use std::time::Duration;

/// Default receive window advertised for new streams (256 KiB).
pub const DEFAULT_WINDOW_SIZE: u32 = 256 * 1024;

/// Default split size for outbound DATA frame bodies (16 KiB).
pub const DEFAULT_FRAME_SIZE: u32 = 16 * 1024;

/// Configuration for a yamux session.
///
/// The default configuration values are as follows:
///
/// - accept backlog = 256
/// - keepalive = enabled, every 60 seconds
/// - connection write timeout = 30 seconds (advisory)
/// - max. stream window size = 256 KiB
/// - max. DATA frame body = 16 KiB
/// - max. number of streams = 8192
///
/// # Example
///
/// ```rust
/// use yamux::Config;
/// use std::time::Duration;
///
/// let config = Config::default()
///     .with_keepalive_interval(Duration::from_secs(30))
///     .with_accept_backlog(64);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum streams allowed to sit in the accept queue. A SYN
    /// arriving over this limit is answered with RST.
    pub accept_backlog: usize,

    /// Whether the engine auto-emits PINGs from `progress`.
    pub enable_keepalive: bool,

    /// Interval between auto-emitted PINGs.
    pub keepalive_interval: Duration,

    /// Advisory write deadline for the embedder's transport. The core
    /// itself never times out.
    pub connection_write_timeout: Duration,

    /// Receive window advertised for new streams and enforced against
    /// the peer; also caps replenishment credit.
    pub max_stream_window_size: u32,

    /// Largest DATA frame body the engine will emit. Bounds the
    /// per-frame cost on both ends.
    pub max_frame_size: u32,

    /// Cap on concurrently live streams per session.
    pub max_num_streams: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            accept_backlog: 256,
            enable_keepalive: true,
            keepalive_interval: Duration::from_secs(60),
            connection_write_timeout: Duration::from_secs(30),
            max_stream_window_size: DEFAULT_WINDOW_SIZE,
            max_frame_size: DEFAULT_FRAME_SIZE,
            max_num_streams: 8192,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    /// Set the accept queue limit.
    pub fn with_accept_backlog(mut self, backlog: usize) -> Config {
        self.accept_backlog = backlog;
        self
    }

    /// Enable or disable automatic keepalive PINGs.
    pub fn with_keepalive(mut self, enabled: bool) -> Config {
        self.enable_keepalive = enabled;
        self
    }

    /// Set the interval between automatic keepalive PINGs.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Config {
        self.keepalive_interval = interval;
        self
    }

    /// Set the advisory transport write deadline.
    pub fn with_connection_write_timeout(mut self, timeout: Duration) -> Config {
        self.connection_write_timeout = timeout;
        self
    }

    /// Set the per-stream receive window.
    pub fn with_max_stream_window_size(mut self, window: u32) -> Config {
        self.max_stream_window_size = window;
        self
    }

    /// Set the largest DATA frame body the engine will emit.
    pub fn with_max_frame_size(mut self, size: u32) -> Config {
        self.max_frame_size = size;
        self
    }

    /// Set the cap on concurrently live streams.
    pub fn with_max_num_streams(mut self, limit: usize) -> Config {
        self.max_num_streams = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference() {
        let config = Config::default();
        assert_eq!(config.accept_backlog, 256);
        assert!(config.enable_keepalive);
        assert_eq!(config.keepalive_interval, Duration::from_secs(60));
        assert_eq!(config.connection_write_timeout, Duration::from_secs(30));
        assert_eq!(config.max_stream_window_size, 262_144);
        assert_eq!(config.max_frame_size, 16_384);
        assert_eq!(config.max_num_streams, 8192);
    }

    #[test]
    fn builder_setters_compose() {
        let config = Config::new()
            .with_accept_backlog(8)
            .with_keepalive(false)
            .with_keepalive_interval(Duration::from_secs(5))
            .with_max_stream_window_size(1024)
            .with_max_frame_size(512)
            .with_max_num_streams(16);

        assert_eq!(config.accept_backlog, 8);
        assert!(!config.enable_keepalive);
        assert_eq!(config.keepalive_interval, Duration::from_secs(5));
        assert_eq!(config.max_stream_window_size, 1024);
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.max_num_streams, 16);
    }
}
