//! Link timing and buffering configuration

use crate::error::{PrintError, PrintResult};
use std::time::Duration;

/// Printer link configuration
///
/// # Environment variables
///
/// [`LinkConfig::from_env`] lets every field be overridden:
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | PRINTER_TICK_MS | 100 | Delay between loop iterations |
/// | PRINTER_IDLE_POLL_MS | 400 | Idle time before a status poll is injected |
/// | PRINTER_MAX_CHUNK | 15000 | Max bytes per transport write |
/// | PRINTER_FLUSH_THRESHOLD | 200 | Bytes written before a forced flush |
/// | PRINTER_READ_BUFFER | 4096 | Bytes requested per transport read |
/// | PRINTER_INACTIVITY_MS | 2000 | Read silence before the link is marked down |
/// | PRINTER_READ_TIMEOUT_MS | 100 | Upper bound for a single read call |
/// | PRINTER_SHUTDOWN_POLL_MS | 50 | Sleep between shutdown "stopped" checks |
/// | PRINTER_EVENT_CAPACITY | 64 | Broadcast capacity for events and faults |
///
/// The idle interval must be exceeded, so with the default tick an idle link
/// polls the device on every fifth tick (every 500ms).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Delay between iterations of both loops
    pub tick: Duration,
    /// Outbound idle time before the status poll command is injected
    pub idle_poll_interval: Duration,
    /// Maximum bytes handed to a single `write_bytes` call
    pub max_chunk_size: usize,
    /// Bytes written since the last flush that force an immediate flush
    pub flush_threshold: usize,
    /// Size of the inbound read buffer
    pub read_buffer_size: usize,
    /// Read inactivity after which the connection is considered lost
    pub inactivity_timeout: Duration,
    /// Bound on a single `read_bytes` call
    pub read_timeout: Duration,
    /// Sleep between checks while shutdown waits for the loops
    pub shutdown_poll: Duration,
    /// Capacity of the event and fault broadcast channels
    pub event_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            idle_poll_interval: Duration::from_millis(400),
            max_chunk_size: 15_000,
            flush_threshold: 200,
            read_buffer_size: 4096,
            inactivity_timeout: Duration::from_millis(2000),
            read_timeout: Duration::from_millis(100),
            shutdown_poll: Duration::from_millis(50),
            event_capacity: 64,
        }
    }
}

impl LinkConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick: env_millis("PRINTER_TICK_MS").unwrap_or(defaults.tick),
            idle_poll_interval: env_millis("PRINTER_IDLE_POLL_MS")
                .unwrap_or(defaults.idle_poll_interval),
            max_chunk_size: env_parse("PRINTER_MAX_CHUNK").unwrap_or(defaults.max_chunk_size),
            flush_threshold: env_parse("PRINTER_FLUSH_THRESHOLD")
                .unwrap_or(defaults.flush_threshold),
            read_buffer_size: env_parse("PRINTER_READ_BUFFER")
                .unwrap_or(defaults.read_buffer_size),
            inactivity_timeout: env_millis("PRINTER_INACTIVITY_MS")
                .unwrap_or(defaults.inactivity_timeout),
            read_timeout: env_millis("PRINTER_READ_TIMEOUT_MS").unwrap_or(defaults.read_timeout),
            shutdown_poll: env_millis("PRINTER_SHUTDOWN_POLL_MS")
                .unwrap_or(defaults.shutdown_poll),
            event_capacity: env_parse("PRINTER_EVENT_CAPACITY").unwrap_or(defaults.event_capacity),
        }
    }

    /// Reject values the loops cannot run with
    pub fn validate(&self) -> PrintResult<()> {
        let durations = [
            ("tick", self.tick),
            ("idle_poll_interval", self.idle_poll_interval),
            ("inactivity_timeout", self.inactivity_timeout),
            ("read_timeout", self.read_timeout),
            ("shutdown_poll", self.shutdown_poll),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(PrintError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }

        let sizes = [
            ("max_chunk_size", self.max_chunk_size),
            ("flush_threshold", self.flush_threshold),
            ("read_buffer_size", self.read_buffer_size),
            ("event_capacity", self.event_capacity),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(PrintError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_millis(key: &str) -> Option<Duration> {
    env_parse::<u64>(key).map(Duration::from_millis)
}
