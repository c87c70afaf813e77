//! Master station configuration

use crate::error::{Dnp3Error, Dnp3Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest assignable DNP3 address; 65520-65535 are reserved,
/// 65535 is broadcast.
pub const MAX_VALID_ADDRESS: u16 = 65519;

/// Maximum user data per link frame allowed by the protocol.
pub const MAX_FRAME_USER_DATA: usize = 250;

/// Upper bound on a reassembled APDU.
pub const MAX_APDU_LIMIT: usize = 65536;

/// Log verbosity for the driver, matching the levels a host application
/// configures. `Critical` maps onto `tracing`'s ERROR level, which is the
/// most severe level tracing defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Parse a level name, case-insensitively with surrounding whitespace
    /// ignored.
    pub fn parse(value: &str) -> Dnp3Result<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(Dnp3Error::Validation(format!(
                "log_level must be one of DEBUG, INFO, WARNING, ERROR, CRITICAL, got {:?}",
                other
            ))),
        }
    }

    /// The corresponding `tracing` level.
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Configuration for DNP3 master communication
///
/// Construct with the field values needed, then call [`Dnp3Config::validate`]
/// before handing the config to a `Master`. Validation normalizes the host
/// string and rejects out-of-range values; a validated config is treated as
/// immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dnp3Config {
    /// Outstation host name or IP address.
    pub host: String,
    /// Outstation TCP port.
    pub port: u16,

    /// Local master station address (0-65519).
    pub master_address: u16,
    /// Remote outstation address (0-65519).
    pub outstation_address: u16,

    /// Time to wait for a complete application response, in seconds.
    pub response_timeout: f64,
    /// Time allowed for TCP connection establishment, in seconds.
    pub connection_timeout: f64,
    /// Maximum time between SELECT and OPERATE, in seconds.
    pub select_timeout: f64,

    /// Retries for communication errors and response timeouts (0 = none).
    pub max_retries: u32,
    /// Delay between retries, in seconds.
    pub retry_delay: f64,

    /// Send user data with link-layer confirmation (FCV/FCB handling).
    pub confirm_required: bool,
    /// Maximum user data bytes per link frame (1-250).
    pub max_frame_size: usize,
    /// Maximum reassembled APDU size (1-65536).
    pub max_apdu_size: usize,

    /// Request unsolicited responses from the outstation after connecting.
    pub enable_unsolicited: bool,

    /// Integrity poll interval in seconds (0 = disabled).
    pub class_0_poll_interval: f64,
    /// Class 1 event poll interval in seconds (0 = disabled).
    pub class_1_poll_interval: f64,
    /// Class 2 event poll interval in seconds (0 = disabled).
    pub class_2_poll_interval: f64,
    /// Class 3 event poll interval in seconds (0 = disabled).
    pub class_3_poll_interval: f64,

    /// Driver log verbosity.
    pub log_level: LogLevel,
    /// Hex-dump every frame at DEBUG on send and receive.
    pub log_raw_frames: bool,
}

impl Default for Dnp3Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 20000,
            master_address: 1,
            outstation_address: 10,
            response_timeout: 5.0,
            connection_timeout: 10.0,
            select_timeout: 10.0,
            max_retries: 3,
            retry_delay: 1.0,
            confirm_required: true,
            max_frame_size: MAX_FRAME_USER_DATA,
            max_apdu_size: 2048,
            enable_unsolicited: true,
            class_0_poll_interval: 60.0,
            class_1_poll_interval: 5.0,
            class_2_poll_interval: 10.0,
            class_3_poll_interval: 30.0,
            log_level: LogLevel::Info,
            log_raw_frames: false,
        }
    }
}

impl Dnp3Config {
    /// Validate and normalize the configuration in place.
    ///
    /// # Errors
    /// Returns [`Dnp3Error::Validation`] naming the first offending field.
    pub fn validate(&mut self) -> Dnp3Result<()> {
        self.host = self.host.trim().to_string();
        if self.host.is_empty() {
            return Err(Dnp3Error::Validation(
                "host must be a non-empty string".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(Dnp3Error::Validation("port must be 1-65535".to_string()));
        }

        for (name, addr) in [
            ("master_address", self.master_address),
            ("outstation_address", self.outstation_address),
        ] {
            if addr > MAX_VALID_ADDRESS {
                return Err(Dnp3Error::Validation(format!(
                    "{} must be 0-65519 (0xFFEF), got {}; addresses 65520-65535 are reserved",
                    name, addr
                )));
            }
        }

        for (name, value) in [
            ("response_timeout", self.response_timeout),
            ("connection_timeout", self.connection_timeout),
            ("select_timeout", self.select_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Dnp3Error::Validation(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if !self.retry_delay.is_finite() || self.retry_delay < 0.0 {
            return Err(Dnp3Error::Validation(format!(
                "retry_delay must be >= 0, got {}",
                self.retry_delay
            )));
        }

        if self.max_frame_size == 0 || self.max_frame_size > MAX_FRAME_USER_DATA {
            return Err(Dnp3Error::Validation(format!(
                "max_frame_size must be 1-250, got {}",
                self.max_frame_size
            )));
        }

        if self.max_apdu_size == 0 || self.max_apdu_size > MAX_APDU_LIMIT {
            return Err(Dnp3Error::Validation(format!(
                "max_apdu_size must be 1-65536, got {}",
                self.max_apdu_size
            )));
        }

        for (name, value) in [
            ("class_0_poll_interval", self.class_0_poll_interval),
            ("class_1_poll_interval", self.class_1_poll_interval),
            ("class_2_poll_interval", self.class_2_poll_interval),
            ("class_3_poll_interval", self.class_3_poll_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Dnp3Error::Validation(format!(
                    "{} must be >= 0, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    /// Response timeout as a `Duration`.
    pub fn response_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.response_timeout)
    }

    /// Connection timeout as a `Duration`.
    pub fn connection_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.connection_timeout)
    }

    /// Select-before-operate window as a `Duration`.
    pub fn select_timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.select_timeout)
    }

    /// Delay between retry attempts as a `Duration`.
    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }
}
