//! Counter points
//!
//! Counters accumulate event or energy totals. Running counters
//! (variations 1/2/5/6) are unsigned; delta variations (3/4/7/8) are
//! signed.

use crate::error::{Dnp3Error, Dnp3Result};

/// Flag bits for counter points.
pub mod counter_flags {
    pub const ONLINE: u8 = 0x01;
    pub const RESTART: u8 = 0x02;
    pub const COMM_LOST: u8 = 0x04;
    pub const REMOTE_FORCED: u8 = 0x08;
    pub const LOCAL_FORCED: u8 = 0x10;
    pub const ROLLOVER: u8 = 0x20;
    pub const DISCONTINUITY: u8 = 0x40;
}

/// DNP3 counter point (group 20)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub index: u16,
    pub value: i64,
    pub flags: u8,
}

impl Counter {
    /// Decode one counter from its wire form for variations 1-8.
    pub fn decode(data: &[u8], index: u16, variation: u8) -> Dnp3Result<Self> {
        let too_short = || Dnp3Error::object("counter data too short", 20, variation);
        let (flags, value) = match variation {
            1 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as i64,
                )
            }
            2 => {
                let raw = data.get(0..3).ok_or_else(too_short)?;
                (raw[0], u16::from_le_bytes([raw[1], raw[2]]) as i64)
            }
            3 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    i32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as i64,
                )
            }
            4 => {
                let raw = data.get(0..3).ok_or_else(too_short)?;
                (raw[0], i16::from_le_bytes([raw[1], raw[2]]) as i64)
            }
            5 => {
                let raw = data.get(0..4).ok_or_else(too_short)?;
                (
                    counter_flags::ONLINE,
                    u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
                )
            }
            6 => {
                let raw = data.get(0..2).ok_or_else(too_short)?;
                (
                    counter_flags::ONLINE,
                    u16::from_le_bytes([raw[0], raw[1]]) as i64,
                )
            }
            7 => {
                let raw = data.get(0..4).ok_or_else(too_short)?;
                (
                    counter_flags::ONLINE,
                    i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
                )
            }
            8 => {
                let raw = data.get(0..2).ok_or_else(too_short)?;
                (
                    counter_flags::ONLINE,
                    i16::from_le_bytes([raw[0], raw[1]]) as i64,
                )
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported counter variation {}", other),
                    20,
                    other,
                ))
            }
        };
        Ok(Self { index, value, flags })
    }

    /// Encode the counter back to its wire form for the given variation.
    pub fn encode(&self, variation: u8) -> Dnp3Result<Vec<u8>> {
        let out_of_range = || {
            Dnp3Error::object(
                format!(
                    "value {} out of range for counter variation {}",
                    self.value, variation
                ),
                20,
                variation,
            )
        };
        let mut out = Vec::new();
        match variation {
            1 => {
                let v = u32::try_from(self.value).map_err(|_| out_of_range())?;
                out.push(self.flags);
                out.extend_from_slice(&v.to_le_bytes());
            }
            2 => {
                let v = u16::try_from(self.value).map_err(|_| out_of_range())?;
                out.push(self.flags);
                out.extend_from_slice(&v.to_le_bytes());
            }
            3 => {
                let v = i32::try_from(self.value).map_err(|_| out_of_range())?;
                out.push(self.flags);
                out.extend_from_slice(&v.to_le_bytes());
            }
            4 => {
                let v = i16::try_from(self.value).map_err(|_| out_of_range())?;
                out.push(self.flags);
                out.extend_from_slice(&v.to_le_bytes());
            }
            5 => {
                let v = u32::try_from(self.value).map_err(|_| out_of_range())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            6 => {
                let v = u16::try_from(self.value).map_err(|_| out_of_range())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            7 => {
                let v = i32::try_from(self.value).map_err(|_| out_of_range())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            8 => {
                let v = i16::try_from(self.value).map_err(|_| out_of_range())?;
                out.extend_from_slice(&v.to_le_bytes());
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported counter variation {}", other),
                    20,
                    other,
                ))
            }
        }
        Ok(out)
    }

    pub fn is_online(&self) -> bool {
        self.flags & counter_flags::ONLINE != 0
    }

    pub fn has_rollover(&self) -> bool {
        self.flags & counter_flags::ROLLOVER != 0
    }
}

/// Parse a run of counters from response data.
pub fn parse_counters(
    data: &[u8],
    start_index: u16,
    count: usize,
    variation: u8,
) -> Dnp3Result<Vec<Counter>> {
    let obj_size = match variation {
        1 | 3 => 5,
        2 | 4 => 3,
        5 | 7 => 4,
        6 | 8 => 2,
        other => {
            return Err(Dnp3Error::object(
                format!("unsupported counter variation {}", other),
                20,
                other,
            ))
        }
    };

    let mut points = Vec::with_capacity(count);
    let mut offset = 0;
    for i in 0..count {
        if offset + obj_size > data.len() {
            break;
        }
        points.push(Counter::decode(
            &data[offset..offset + obj_size],
            start_index + i as u16,
            variation,
        )?);
        offset += obj_size;
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_u32_roundtrip() {
        let counter = Counter {
            index: 0,
            value: 4_000_000_000,
            flags: counter_flags::ONLINE | counter_flags::ROLLOVER,
        };
        let encoded = counter.encode(1).unwrap();
        assert_eq!(encoded.len(), 5);
        let decoded = Counter::decode(&encoded, 0, 1).unwrap();
        assert_eq!(decoded, counter);
        assert!(decoded.has_rollover());
    }

    #[test]
    fn test_counter_delta_signed() {
        let counter = Counter {
            index: 2,
            value: -100,
            flags: counter_flags::ONLINE,
        };
        let encoded = counter.encode(4).unwrap();
        let decoded = Counter::decode(&encoded, 2, 4).unwrap();
        assert_eq!(decoded.value, -100);
    }

    #[test]
    fn test_counter_no_flag_decode() {
        let data = 1234u16.to_le_bytes();
        let counter = Counter::decode(&data, 8, 6).unwrap();
        assert_eq!(counter.value, 1234);
        assert!(counter.is_online());
    }

    #[test]
    fn test_counter_out_of_range_encode() {
        let counter = Counter {
            index: 0,
            value: -1,
            flags: 0,
        };
        assert!(counter.encode(1).is_err());

        let counter = Counter {
            index: 0,
            value: 70000,
            flags: 0,
        };
        assert!(counter.encode(2).is_err());
    }

    #[test]
    fn test_parse_counter_run() {
        let mut data = Vec::new();
        for v in [100u32, 200, 300] {
            data.push(counter_flags::ONLINE);
            data.extend_from_slice(&v.to_le_bytes());
        }
        let points = parse_counters(&data, 0, 3, 1).unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].value, 200);
        assert_eq!(points[1].index, 1);
    }
}
