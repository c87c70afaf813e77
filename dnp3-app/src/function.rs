//! Application layer function codes and control status codes

/// Application layer function codes (IEEE 1815).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppFunction {
    Confirm = 0x00,
    Read = 0x01,
    Write = 0x02,
    Select = 0x03,
    Operate = 0x04,
    DirectOperate = 0x05,
    DirectOperateNoAck = 0x06,
    ImmediateFreeze = 0x07,
    FreezeClear = 0x09,
    ColdRestart = 0x0D,
    WarmRestart = 0x0E,
    EnableUnsolicited = 0x14,
    DisableUnsolicited = 0x15,
    DelayMeasure = 0x17,
    Response = 0x81,
    UnsolicitedResponse = 0x82,
}

impl AppFunction {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True for the two response codes a master accepts.
    pub fn is_response_code(code: u8) -> bool {
        code == AppFunction::Response as u8 || code == AppFunction::UnsolicitedResponse as u8
    }
}

/// CROB / analog output command status codes echoed by the outstation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlStatus {
    Success = 0,
    Timeout = 1,
    NoSelect = 2,
    FormatError = 3,
    NotSupported = 4,
    AlreadyActive = 5,
    HardwareError = 6,
    Local = 7,
    TooManyOps = 8,
    NotAuthorized = 9,
    AutomationInhibit = 10,
    ProcessingLimited = 11,
    OutOfRange = 12,
    NotExecuted = 126,
}

impl ControlStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ControlStatus::Success),
            1 => Some(ControlStatus::Timeout),
            2 => Some(ControlStatus::NoSelect),
            3 => Some(ControlStatus::FormatError),
            4 => Some(ControlStatus::NotSupported),
            5 => Some(ControlStatus::AlreadyActive),
            6 => Some(ControlStatus::HardwareError),
            7 => Some(ControlStatus::Local),
            8 => Some(ControlStatus::TooManyOps),
            9 => Some(ControlStatus::NotAuthorized),
            10 => Some(ControlStatus::AutomationInhibit),
            11 => Some(ControlStatus::ProcessingLimited),
            12 => Some(ControlStatus::OutOfRange),
            126 => Some(ControlStatus::NotExecuted),
            _ => None,
        }
    }

    /// Name used in control-failure log messages.
    pub fn name(code: u8) -> &'static str {
        match Self::from_code(code) {
            Some(ControlStatus::Success) => "SUCCESS",
            Some(ControlStatus::Timeout) => "TIMEOUT",
            Some(ControlStatus::NoSelect) => "NO_SELECT",
            Some(ControlStatus::FormatError) => "FORMAT_ERROR",
            Some(ControlStatus::NotSupported) => "NOT_SUPPORTED",
            Some(ControlStatus::AlreadyActive) => "ALREADY_ACTIVE",
            Some(ControlStatus::HardwareError) => "HARDWARE_ERROR",
            Some(ControlStatus::Local) => "LOCAL",
            Some(ControlStatus::TooManyOps) => "TOO_MANY_OPS",
            Some(ControlStatus::NotAuthorized) => "NOT_AUTHORIZED",
            Some(ControlStatus::AutomationInhibit) => "AUTOMATION_INHIBIT",
            Some(ControlStatus::ProcessingLimited) => "PROCESSING_LIMITED",
            Some(ControlStatus::OutOfRange) => "OUT_OF_RANGE",
            Some(ControlStatus::NotExecuted) => "NOT_EXECUTED",
            None => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_codes() {
        assert_eq!(AppFunction::Read.code(), 0x01);
        assert_eq!(AppFunction::DirectOperate.code(), 0x05);
        assert!(AppFunction::is_response_code(0x81));
        assert!(AppFunction::is_response_code(0x82));
        assert!(!AppFunction::is_response_code(0x01));
    }

    #[test]
    fn test_control_status() {
        assert_eq!(ControlStatus::from_code(0), Some(ControlStatus::Success));
        assert_eq!(ControlStatus::from_code(4), Some(ControlStatus::NotSupported));
        assert_eq!(ControlStatus::from_code(126), Some(ControlStatus::NotExecuted));
        assert_eq!(ControlStatus::from_code(50), None);
        assert_eq!(ControlStatus::name(4), "NOT_SUPPORTED");
        assert_eq!(ControlStatus::name(200), "UNKNOWN");
    }
}
