//! Binary input/output points and the control relay output block
//!
//! Binary objects represent two-state devices: breakers, switches, relays,
//! alarms. The CROB (group 12 variation 1) is the 11-byte command structure
//! used to operate binary output points.

use crate::error::{Dnp3Error, Dnp3Result};

/// Flag bits shared by binary points.
pub mod binary_flags {
    pub const ONLINE: u8 = 0x01;
    pub const RESTART: u8 = 0x02;
    pub const COMM_LOST: u8 = 0x04;
    pub const REMOTE_FORCED: u8 = 0x08;
    pub const LOCAL_FORCED: u8 = 0x10;
    pub const CHATTER_FILTER: u8 = 0x20;
    pub const STATE: u8 = 0x80;
}

/// CROB operation selectors (low nibble of the control code).
pub mod control_code {
    pub const NUL: u8 = 0x00;
    pub const PULSE_ON: u8 = 0x01;
    pub const PULSE_OFF: u8 = 0x02;
    pub const LATCH_ON: u8 = 0x03;
    pub const LATCH_OFF: u8 = 0x04;
    pub const QUEUE: u8 = 0x10;
    pub const CLEAR: u8 = 0x20;
    pub const TRIP: u8 = 0x40;
    pub const CLOSE: u8 = 0x80;
}

/// DNP3 binary input point (group 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryInput {
    pub index: u16,
    pub value: bool,
    pub flags: u8,
}

impl BinaryInput {
    /// Decode one point from its wire form.
    ///
    /// Variation 1 is a single packed bit already isolated into a byte;
    /// variation 2 carries the flags byte with the state in bit 7.
    pub fn decode(data: &[u8], index: u16, variation: u8) -> Dnp3Result<Self> {
        match variation {
            1 => {
                let byte = first_byte(data, 1, variation)?;
                Ok(Self {
                    index,
                    value: byte & 0x01 != 0,
                    flags: binary_flags::ONLINE,
                })
            }
            2 => {
                let flags = first_byte(data, 1, variation)?;
                Ok(Self {
                    index,
                    value: flags & binary_flags::STATE != 0,
                    flags,
                })
            }
            other => Err(Dnp3Error::object(
                format!("unsupported binary input variation {}", other),
                1,
                other,
            )),
        }
    }

    /// Encode the point back to its wire form for the given variation.
    pub fn encode(&self, variation: u8) -> Dnp3Result<Vec<u8>> {
        match variation {
            1 => Ok(vec![u8::from(self.value)]),
            2 => {
                let mut flags = self.flags & !binary_flags::STATE;
                if self.value {
                    flags |= binary_flags::STATE;
                }
                Ok(vec![flags])
            }
            other => Err(Dnp3Error::object(
                format!("unsupported binary input variation {}", other),
                1,
                other,
            )),
        }
    }

    pub fn is_online(&self) -> bool {
        self.flags & binary_flags::ONLINE != 0
    }

    pub fn comm_lost(&self) -> bool {
        self.flags & binary_flags::COMM_LOST != 0
    }
}

/// DNP3 binary output status point (group 10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOutput {
    pub index: u16,
    pub value: bool,
    pub flags: u8,
}

impl BinaryOutput {
    pub fn decode(data: &[u8], index: u16, variation: u8) -> Dnp3Result<Self> {
        match variation {
            1 => {
                let byte = first_byte(data, 10, variation)?;
                Ok(Self {
                    index,
                    value: byte & 0x01 != 0,
                    flags: binary_flags::ONLINE,
                })
            }
            2 => {
                let flags = first_byte(data, 10, variation)?;
                Ok(Self {
                    index,
                    value: flags & binary_flags::STATE != 0,
                    flags,
                })
            }
            other => Err(Dnp3Error::object(
                format!("unsupported binary output variation {}", other),
                10,
                other,
            )),
        }
    }

    pub fn is_online(&self) -> bool {
        self.flags & binary_flags::ONLINE != 0
    }
}

fn first_byte(data: &[u8], group: u8, variation: u8) -> Dnp3Result<u8> {
    data.first().copied().ok_or_else(|| {
        Dnp3Error::object("binary point data too short", group, variation)
    })
}

/// Control Relay Output Block (group 12 variation 1)
///
/// The 11-byte command used to operate binary output points: control code,
/// count, on-time, off-time (milliseconds, little-endian) and a status byte
/// the outstation fills in on the echoed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crob {
    pub control_code: u8,
    pub count: u8,
    pub on_time_ms: u32,
    pub off_time_ms: u32,
    pub status: u8,
}

/// Wire size of a CROB.
pub const CROB_SIZE: usize = 11;

impl Crob {
    /// Latch the point on.
    pub fn latch_on() -> Self {
        Self::new(control_code::LATCH_ON, 1, 0, 0)
    }

    /// Latch the point off.
    pub fn latch_off() -> Self {
        Self::new(control_code::LATCH_OFF, 1, 0, 0)
    }

    /// Pulse the point on `count` times with the given timing.
    pub fn pulse_on(on_time_ms: u32, off_time_ms: u32, count: u8) -> Self {
        Self::new(control_code::PULSE_ON, count, on_time_ms, off_time_ms)
    }

    /// Pulse the point off `count` times with the given timing.
    pub fn pulse_off(on_time_ms: u32, off_time_ms: u32, count: u8) -> Self {
        Self::new(control_code::PULSE_OFF, count, on_time_ms, off_time_ms)
    }

    /// Trip selector for breaker pairs.
    pub fn trip() -> Self {
        Self::new(control_code::TRIP | control_code::LATCH_ON, 1, 0, 0)
    }

    /// Close selector for breaker pairs.
    pub fn close() -> Self {
        Self::new(control_code::CLOSE | control_code::LATCH_ON, 1, 0, 0)
    }

    fn new(control_code: u8, count: u8, on_time_ms: u32, off_time_ms: u32) -> Self {
        Self {
            control_code,
            count,
            on_time_ms,
            off_time_ms,
            status: 0,
        }
    }

    /// Serialize to the 11-byte wire form.
    pub fn encode(&self) -> [u8; CROB_SIZE] {
        let mut out = [0u8; CROB_SIZE];
        out[0] = self.control_code;
        out[1] = self.count;
        out[2..6].copy_from_slice(&self.on_time_ms.to_le_bytes());
        out[6..10].copy_from_slice(&self.off_time_ms.to_le_bytes());
        out[10] = self.status;
        out
    }

    /// Parse from the wire form.
    pub fn decode(data: &[u8]) -> Dnp3Result<Self> {
        if data.len() < CROB_SIZE {
            return Err(Dnp3Error::object(
                format!("CROB data too short: {} < {}", data.len(), CROB_SIZE),
                12,
                1,
            ));
        }
        Ok(Self {
            control_code: data[0],
            count: data[1],
            on_time_ms: u32::from_le_bytes([data[2], data[3], data[4], data[5]]),
            off_time_ms: u32::from_le_bytes([data[6], data[7], data[8], data[9]]),
            status: data[10],
        })
    }

    /// Human-readable operation name from the low nibble.
    pub fn operation(&self) -> &'static str {
        match self.control_code & 0x0F {
            control_code::NUL => "NUL",
            control_code::PULSE_ON => "PULSE_ON",
            control_code::PULSE_OFF => "PULSE_OFF",
            control_code::LATCH_ON => "LATCH_ON",
            control_code::LATCH_OFF => "LATCH_OFF",
            _ => "UNKNOWN",
        }
    }
}

/// Parse a run of binary inputs from response data.
///
/// Variation 1 is bit-packed LSB-first: point `start_index + i` lives in
/// bit `i % 8` of byte `i / 8`. Variation 2 is one flags byte per point.
pub fn parse_binary_inputs(
    data: &[u8],
    start_index: u16,
    count: usize,
    variation: u8,
) -> Dnp3Result<Vec<BinaryInput>> {
    let mut points = Vec::with_capacity(count);
    match variation {
        1 => {
            for i in 0..count {
                let byte_idx = i / 8;
                if byte_idx >= data.len() {
                    break;
                }
                let value = data[byte_idx] & (1 << (i % 8)) != 0;
                points.push(BinaryInput {
                    index: start_index + i as u16,
                    value,
                    flags: binary_flags::ONLINE,
                });
            }
        }
        2 => {
            for (i, chunk) in data.iter().take(count).enumerate() {
                points.push(BinaryInput::decode(
                    std::slice::from_ref(chunk),
                    start_index + i as u16,
                    variation,
                )?);
            }
        }
        other => {
            return Err(Dnp3Error::object(
                format!("unsupported binary input variation {}", other),
                1,
                other,
            ))
        }
    }
    Ok(points)
}

/// Parse a run of binary output status points from response data.
pub fn parse_binary_outputs(
    data: &[u8],
    start_index: u16,
    count: usize,
    variation: u8,
) -> Dnp3Result<Vec<BinaryOutput>> {
    let mut points = Vec::with_capacity(count);
    match variation {
        1 => {
            for i in 0..count {
                let byte_idx = i / 8;
                if byte_idx >= data.len() {
                    break;
                }
                let value = data[byte_idx] & (1 << (i % 8)) != 0;
                points.push(BinaryOutput {
                    index: start_index + i as u16,
                    value,
                    flags: binary_flags::ONLINE,
                });
            }
        }
        2 => {
            for (i, chunk) in data.iter().take(count).enumerate() {
                points.push(BinaryOutput::decode(
                    std::slice::from_ref(chunk),
                    start_index + i as u16,
                    variation,
                )?);
            }
        }
        other => {
            return Err(Dnp3Error::object(
                format!("unsupported binary output variation {}", other),
                10,
                other,
            ))
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_input_with_flags_roundtrip() {
        let point = BinaryInput {
            index: 7,
            value: true,
            flags: binary_flags::ONLINE | binary_flags::STATE,
        };
        let encoded = point.encode(2).unwrap();
        let decoded = BinaryInput::decode(&encoded, 7, 2).unwrap();
        assert_eq!(decoded, point);
        assert!(decoded.is_online());
    }

    #[test]
    fn test_packed_bits_lsb_first() {
        // 0b0000_0101: points 0 and 2 set
        let points = parse_binary_inputs(&[0x05], 0, 8, 1).unwrap();
        assert_eq!(points.len(), 8);
        assert!(points[0].value);
        assert!(!points[1].value);
        assert!(points[2].value);
        assert!(!points[7].value);
    }

    #[test]
    fn test_packed_bits_span_bytes() {
        // 10 points across two bytes; bit 9 lives in byte 1 bit 1
        let points = parse_binary_inputs(&[0x00, 0x02], 100, 10, 1).unwrap();
        assert_eq!(points.len(), 10);
        assert!(points[9].value);
        assert_eq!(points[9].index, 109);
    }

    #[test]
    fn test_crob_encode() {
        let crob = Crob::latch_on();
        let bytes = crob.encode();
        assert_eq!(
            bytes,
            [0x03, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0x00]
        );
    }

    #[test]
    fn test_crob_pulse_roundtrip() {
        let crob = Crob::pulse_on(500, 250, 3);
        let decoded = Crob::decode(&crob.encode()).unwrap();
        assert_eq!(decoded, crob);
        assert_eq!(decoded.on_time_ms, 500);
        assert_eq!(decoded.off_time_ms, 250);
        assert_eq!(decoded.operation(), "PULSE_ON");
    }

    #[test]
    fn test_crob_too_short() {
        let err = Crob::decode(&[0x03, 0x01]).unwrap_err();
        assert!(matches!(err, Dnp3Error::Object { group: 12, variation: 1, .. }));
    }

    #[test]
    fn test_unsupported_variation_carries_context() {
        let err = parse_binary_inputs(&[0x00], 0, 1, 9).unwrap_err();
        assert!(matches!(err, Dnp3Error::Object { group: 1, variation: 9, .. }));
    }
}
