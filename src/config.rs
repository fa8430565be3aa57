//! Session configuration.
//!
//! A single typed struct, serializable with `serde`/`serde_json` the way the
//! reference `config.rs` ambient module persists its property bag — but
//! reading and writing the bytes to a config file is a named external
//! collaborator (see spec §1), not this crate's job. Callers construct a
//! `SessionConfig`, optionally by deserializing JSON an outer layer read
//! from disk, and hand it to the session controller.

use serde::{Deserialize, Serialize};

use crate::codec::CodePage;

/// Fixed screen geometries this crate supports (spec §1 Non-goals excludes
/// any other size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScreenSize {
    #[serde(rename = "24x80")]
    Model2_24x80,
    #[serde(rename = "27x132")]
    Model5_27x132,
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            ScreenSize::Model2_24x80 => 24,
            ScreenSize::Model5_27x132 => 27,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            ScreenSize::Model2_24x80 => 80,
            ScreenSize::Model5_27x132 => 132,
        }
    }

    /// The `IBM-nnnn-x` terminal-type string offered during negotiation.
    pub fn terminal_type(&self) -> &'static str {
        match self {
            ScreenSize::Model2_24x80 => "IBM-3179-2",
            ScreenSize::Model5_27x132 => "IBM-3477-FC",
        }
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        ScreenSize::Model2_24x80
    }
}

/// TLS behavior for the transport. Certificate-store management is an
/// external collaborator; this crate only distinguishes plain vs. TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TlsMode {
    #[default]
    Disabled,
    Enabled,
}

/// Every field the session controller, negotiator, and transport need to
/// start a session (spec §6 "Session configuration").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub tls: TlsMode,
    pub device_name: String,
    #[serde(default)]
    pub code_page: CodePage,
    #[serde(default)]
    pub screen_size: ScreenSize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    #[serde(default)]
    pub keepalive_enabled: bool,
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
    #[serde(default = "default_breaker_cooloff_ms")]
    pub breaker_cooloff_ms: u64,
    #[serde(default)]
    pub enhanced_5250: bool,
    #[serde(default)]
    pub extended_attrs: bool,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_read_timeout_ms() -> u64 {
    30_000
}
fn default_write_timeout_ms() -> u64 {
    5_000
}
fn default_inactivity_timeout_ms() -> u64 {
    0
}
fn default_keepalive_interval_ms() -> u64 {
    60_000
}
fn default_max_retries() -> u32 {
    0
}
fn default_initial_retry_delay_ms() -> u64 {
    100
}
fn default_breaker_threshold() -> u32 {
    5
}
fn default_breaker_cooloff_ms() -> u64 {
    30_000
}

impl SessionConfig {
    /// Builds a configuration with every default applied except the ones
    /// that have no sane default: host, port, and device name.
    pub fn new(host: impl Into<String>, port: u16, device_name: impl Into<String>) -> Self {
        SessionConfig {
            host: host.into(),
            port,
            tls: TlsMode::Disabled,
            device_name: device_name.into(),
            code_page: CodePage::default(),
            screen_size: ScreenSize::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            keepalive_enabled: false,
            keepalive_interval_ms: default_keepalive_interval_ms(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay_ms(),
            breaker_threshold: default_breaker_threshold(),
            breaker_cooloff_ms: default_breaker_cooloff_ms(),
            enhanced_5250: false,
            extended_attrs: false,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_stable() {
        let cfg = SessionConfig::new("as400.example.com", 23, "DSP01");
        assert_eq!(cfg.screen_size.rows(), 24);
        assert_eq!(cfg.screen_size.cols(), 80);
        assert_eq!(cfg.max_retries, 0);
        assert_eq!(cfg.breaker_threshold, 5);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = SessionConfig::new("as400.example.com", 992, "DSP01");
        let json = cfg.to_json().unwrap();
        let back = SessionConfig::from_json(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.port, cfg.port);
    }

    #[test]
    fn missing_optional_fields_fall_back_to_defaults() {
        let json = r#"{"host":"h","port":23,"device_name":"DSP01"}"#;
        let cfg = SessionConfig::from_json(json).unwrap();
        assert_eq!(cfg.connect_timeout_ms, 5_000);
        assert!(!cfg.keepalive_enabled);
    }
}
