use thiserror::Error;

/// Main error type for DNP3 master operations
///
/// Variants carry the context needed to diagnose a failure without the
/// original byte stream: communication errors name the peer, CRC errors
/// carry both checksum values, protocol errors carry the function code and
/// IIN bytes that triggered the rejection.
#[derive(Error, Debug)]
pub enum Dnp3Error {
    #[error("Communication error with {host}:{port}: {message}")]
    Communication {
        message: String,
        host: String,
        port: u16,
    },

    #[error("Timeout after {timeout_seconds}s: {message}")]
    Timeout {
        message: String,
        timeout_seconds: f64,
    },

    #[error("CRC mismatch: expected 0x{expected:04X}, actual 0x{actual:04X}")]
    Crc { expected: u16, actual: u16 },

    #[error("Frame error: {0}")]
    Frame(String),

    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        function_code: Option<u8>,
        iin: Option<(u8, u8)>,
    },

    #[error("Object error (g{group}v{variation}): {message}")]
    Object {
        message: String,
        group: u8,
        variation: u8,
    },

    #[error("Control operation failed with status {status_code}")]
    Control { status_code: u8 },

    #[error("Invalid value: {0}")]
    Validation(String),
}

impl Dnp3Error {
    /// Build a communication error from an io error plus the peer address.
    pub fn communication(err: std::io::Error, host: impl Into<String>, port: u16) -> Self {
        Dnp3Error::Communication {
            message: err.to_string(),
            host: host.into(),
            port,
        }
    }

    /// Build a protocol error without function code or IIN context.
    pub fn protocol(message: impl Into<String>) -> Self {
        Dnp3Error::Protocol {
            message: message.into(),
            function_code: None,
            iin: None,
        }
    }

    /// Build an object error carrying the offending group and variation.
    pub fn object(message: impl Into<String>, group: u8, variation: u8) -> Self {
        Dnp3Error::Object {
            message: message.into(),
            group,
            variation,
        }
    }

    /// Whether the coordinator may retry the transaction that produced
    /// this error. Only transient failures qualify: lost connections and
    /// missed responses. Corruption and protocol rejections never retry.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Dnp3Error::Communication { .. } | Dnp3Error::Timeout { .. }
        )
    }
}

/// Result type alias for DNP3 operations
pub type Dnp3Result<T> = Result<T, Dnp3Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        let comm = Dnp3Error::Communication {
            message: "refused".to_string(),
            host: "10.0.0.5".to_string(),
            port: 20000,
        };
        let timeout = Dnp3Error::Timeout {
            message: "no response".to_string(),
            timeout_seconds: 5.0,
        };
        let crc = Dnp3Error::Crc {
            expected: 0x21E9,
            actual: 0x21E8,
        };
        assert!(comm.is_retriable());
        assert!(timeout.is_retriable());
        assert!(!crc.is_retriable());
        assert!(!Dnp3Error::Control { status_code: 4 }.is_retriable());
        assert!(!Dnp3Error::protocol("bad function").is_retriable());
    }

    #[test]
    fn test_error_display_carries_context() {
        let err = Dnp3Error::Crc {
            expected: 0x21E9,
            actual: 0x1234,
        };
        let text = err.to_string();
        assert!(text.contains("21E9"));
        assert!(text.contains("1234"));
    }
}
