//! Internal Indications (IIN)
//!
//! Every response carries two IIN octets directly after the function code,
//! reporting outstation status. Bits 0-2 of the second octet signal that
//! the request itself was rejected.

use std::fmt;

/// The IIN octet pair from a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Iin {
    pub iin1: u8,
    pub iin2: u8,
}

impl Iin {
    pub fn new(iin1: u8, iin2: u8) -> Self {
        Self { iin1, iin2 }
    }

    // IIN1 bits
    pub fn broadcast(&self) -> bool {
        self.iin1 & 0x01 != 0
    }

    pub fn class_1_events(&self) -> bool {
        self.iin1 & 0x02 != 0
    }

    pub fn class_2_events(&self) -> bool {
        self.iin1 & 0x04 != 0
    }

    pub fn class_3_events(&self) -> bool {
        self.iin1 & 0x08 != 0
    }

    pub fn need_time(&self) -> bool {
        self.iin1 & 0x10 != 0
    }

    pub fn local_control(&self) -> bool {
        self.iin1 & 0x20 != 0
    }

    pub fn device_trouble(&self) -> bool {
        self.iin1 & 0x40 != 0
    }

    pub fn device_restart(&self) -> bool {
        self.iin1 & 0x80 != 0
    }

    // IIN2 bits
    pub fn no_func_code_support(&self) -> bool {
        self.iin2 & 0x01 != 0
    }

    pub fn object_unknown(&self) -> bool {
        self.iin2 & 0x02 != 0
    }

    pub fn parameter_error(&self) -> bool {
        self.iin2 & 0x04 != 0
    }

    pub fn event_buffer_overflow(&self) -> bool {
        self.iin2 & 0x08 != 0
    }

    pub fn already_executing(&self) -> bool {
        self.iin2 & 0x10 != 0
    }

    pub fn config_corrupt(&self) -> bool {
        self.iin2 & 0x20 != 0
    }

    /// Any class 1/2/3 events pending at the outstation.
    pub fn events_pending(&self) -> bool {
        self.iin1 & 0x0E != 0
    }

    /// The request was rejected: function not supported, objects unknown,
    /// or parameters invalid.
    pub fn has_errors(&self) -> bool {
        self.iin2 & 0x07 != 0
    }

    /// Reserved IIN2 bits set, usually a sign of a nonconforming peer.
    pub fn has_reserved_bits(&self) -> bool {
        self.iin2 & 0xC0 != 0
    }

    pub fn to_bytes(&self) -> (u8, u8) {
        (self.iin1, self.iin2)
    }
}

impl fmt::Display for Iin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = Vec::new();
        let flags = [
            (self.broadcast(), "BROADCAST"),
            (self.class_1_events(), "CLASS_1_EVENTS"),
            (self.class_2_events(), "CLASS_2_EVENTS"),
            (self.class_3_events(), "CLASS_3_EVENTS"),
            (self.need_time(), "NEED_TIME"),
            (self.local_control(), "LOCAL_CONTROL"),
            (self.device_trouble(), "DEVICE_TROUBLE"),
            (self.device_restart(), "DEVICE_RESTART"),
            (self.no_func_code_support(), "NO_FUNC_CODE_SUPPORT"),
            (self.object_unknown(), "OBJECT_UNKNOWN"),
            (self.parameter_error(), "PARAMETER_ERROR"),
            (self.event_buffer_overflow(), "EVENT_BUFFER_OVERFLOW"),
            (self.already_executing(), "ALREADY_EXECUTING"),
            (self.config_corrupt(), "CONFIG_CORRUPT"),
        ];
        for (set, name) in flags {
            if set {
                names.push(name);
            }
        }
        if names.is_empty() {
            write!(f, "IIN(none)")
        } else {
            write!(f, "IIN({})", names.join("|"))
        }
    }
}
