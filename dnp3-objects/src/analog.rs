//! Analog input/output points and the analog output command block
//!
//! Analog objects carry measured or commanded continuous values. Group 30
//! (inputs) and group 40 (output status) decode to `f64`-valued points;
//! group 41 is the setpoint command block with a trailing status byte.

use crate::error::{Dnp3Error, Dnp3Result};

/// Flag bits shared by analog points.
pub mod analog_flags {
    pub const ONLINE: u8 = 0x01;
    pub const RESTART: u8 = 0x02;
    pub const COMM_LOST: u8 = 0x04;
    pub const REMOTE_FORCED: u8 = 0x08;
    pub const LOCAL_FORCED: u8 = 0x10;
    pub const OVER_RANGE: u8 = 0x20;
    pub const REFERENCE_ERR: u8 = 0x40;
}

/// DNP3 analog input point (group 30)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogInput {
    pub index: u16,
    pub value: f64,
    pub flags: u8,
}

impl AnalogInput {
    /// Decode one point from its wire form for variations 1-6.
    pub fn decode(data: &[u8], index: u16, variation: u8) -> Dnp3Result<Self> {
        let too_short =
            || Dnp3Error::object("analog input data too short", 30, variation);
        let (flags, value) = match variation {
            1 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    i32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as f64,
                )
            }
            2 => {
                let raw = data.get(0..3).ok_or_else(too_short)?;
                (raw[0], i16::from_le_bytes([raw[1], raw[2]]) as f64)
            }
            3 => {
                let raw = data.get(0..4).ok_or_else(too_short)?;
                (
                    analog_flags::ONLINE,
                    i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                )
            }
            4 => {
                let raw = data.get(0..2).ok_or_else(too_short)?;
                (
                    analog_flags::ONLINE,
                    i16::from_le_bytes([raw[0], raw[1]]) as f64,
                )
            }
            5 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    f32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as f64,
                )
            }
            6 => {
                let raw = data.get(0..9).ok_or_else(too_short)?;
                (
                    raw[0],
                    f64::from_le_bytes([
                        raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7], raw[8],
                    ]),
                )
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported analog input variation {}", other),
                    30,
                    other,
                ))
            }
        };
        Ok(Self { index, value, flags })
    }

    /// Encode the point back to its wire form for the given variation.
    ///
    /// # Errors
    /// Returns an object error when the value does not fit the integer
    /// width of the chosen variation.
    pub fn encode(&self, variation: u8) -> Dnp3Result<Vec<u8>> {
        let mut out = Vec::new();
        match variation {
            1 => {
                out.push(self.flags);
                out.extend_from_slice(&int_value::<i32>(self.value, 30, variation)?.to_le_bytes());
            }
            2 => {
                out.push(self.flags);
                out.extend_from_slice(&int_value::<i16>(self.value, 30, variation)?.to_le_bytes());
            }
            3 => {
                out.extend_from_slice(&int_value::<i32>(self.value, 30, variation)?.to_le_bytes());
            }
            4 => {
                out.extend_from_slice(&int_value::<i16>(self.value, 30, variation)?.to_le_bytes());
            }
            5 => {
                out.push(self.flags);
                out.extend_from_slice(&(self.value as f32).to_le_bytes());
            }
            6 => {
                out.push(self.flags);
                out.extend_from_slice(&self.value.to_le_bytes());
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported analog input variation {}", other),
                    30,
                    other,
                ))
            }
        }
        Ok(out)
    }

    pub fn is_online(&self) -> bool {
        self.flags & analog_flags::ONLINE != 0
    }

    pub fn is_over_range(&self) -> bool {
        self.flags & analog_flags::OVER_RANGE != 0
    }
}

/// DNP3 analog output status point (group 40)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogOutput {
    pub index: u16,
    pub value: f64,
    pub flags: u8,
}

impl AnalogOutput {
    /// Decode one point from its wire form for variations 1-4, each of
    /// which leads with a flags byte.
    pub fn decode(data: &[u8], index: u16, variation: u8) -> Dnp3Result<Self> {
        let too_short =
            || Dnp3Error::object("analog output data too short", 40, variation);
        let (flags, value) = match variation {
            1 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    i32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as f64,
                )
            }
            2 => {
                let raw = data.get(0..3).ok_or_else(too_short)?;
                (raw[0], i16::from_le_bytes([raw[1], raw[2]]) as f64)
            }
            3 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    raw[0],
                    f32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]) as f64,
                )
            }
            4 => {
                let raw = data.get(0..9).ok_or_else(too_short)?;
                (
                    raw[0],
                    f64::from_le_bytes([
                        raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7], raw[8],
                    ]),
                )
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported analog output variation {}", other),
                    40,
                    other,
                ))
            }
        };
        Ok(Self { index, value, flags })
    }

    pub fn is_online(&self) -> bool {
        self.flags & analog_flags::ONLINE != 0
    }
}

/// Analog output command block (group 41)
///
/// Variation determines the value width on the wire: 1 = i32, 2 = i16,
/// 3 = f32, 4 = f64. The trailing status byte is zero on requests and
/// filled in by the outstation on the echoed response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogCommand {
    pub value: f64,
    pub status: u8,
}

impl AnalogCommand {
    pub fn new(value: f64) -> Self {
        Self { value, status: 0 }
    }

    /// Pick the narrowest sensible command variation for the value:
    /// g41v1 when the value is integral and fits a signed 32-bit field,
    /// g41v3 otherwise.
    pub fn preferred_variation(&self) -> u8 {
        if self.value.fract() == 0.0
            && self.value >= i32::MIN as f64
            && self.value <= i32::MAX as f64
        {
            1
        } else {
            3
        }
    }

    /// Serialize to the wire form of the given variation.
    pub fn encode(&self, variation: u8) -> Dnp3Result<Vec<u8>> {
        let mut out = Vec::new();
        match variation {
            1 => out.extend_from_slice(&int_value::<i32>(self.value, 41, variation)?.to_le_bytes()),
            2 => out.extend_from_slice(&int_value::<i16>(self.value, 41, variation)?.to_le_bytes()),
            3 => out.extend_from_slice(&(self.value as f32).to_le_bytes()),
            4 => out.extend_from_slice(&self.value.to_le_bytes()),
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported analog command variation {}", other),
                    41,
                    other,
                ))
            }
        }
        out.push(self.status);
        Ok(out)
    }

    /// Parse from the wire form of the given variation.
    pub fn decode(data: &[u8], variation: u8) -> Dnp3Result<Self> {
        let too_short =
            || Dnp3Error::object("analog command data too short", 41, variation);
        let (value, status) = match variation {
            1 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    raw[4],
                )
            }
            2 => {
                let raw = data.get(0..3).ok_or_else(too_short)?;
                (i16::from_le_bytes([raw[0], raw[1]]) as f64, raw[2])
            }
            3 => {
                let raw = data.get(0..5).ok_or_else(too_short)?;
                (
                    f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    raw[4],
                )
            }
            4 => {
                let raw = data.get(0..9).ok_or_else(too_short)?;
                (
                    f64::from_le_bytes([
                        raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
                    ]),
                    raw[8],
                )
            }
            other => {
                return Err(Dnp3Error::object(
                    format!("unsupported analog command variation {}", other),
                    41,
                    other,
                ))
            }
        };
        Ok(Self { value, status })
    }
}

fn int_value<T>(value: f64, group: u8, variation: u8) -> Dnp3Result<T>
where
    T: TryFrom<i64>,
{
    if value.fract() != 0.0 {
        return Err(Dnp3Error::object(
            format!("value {} is not integral", value),
            group,
            variation,
        ));
    }
    T::try_from(value as i64).map_err(|_| {
        Dnp3Error::object(
            format!("value {} out of range for variation {}", value, variation),
            group,
            variation,
        )
    })
}

/// Parse a run of analog inputs from response data.
pub fn parse_analog_inputs(
    data: &[u8],
    start_index: u16,
    count: usize,
    variation: u8,
) -> Dnp3Result<Vec<AnalogInput>> {
    let obj_size = match variation {
        1 | 5 => 5,
        2 => 3,
        3 => 4,
        4 => 2,
        6 => 9,
        other => {
            return Err(Dnp3Error::object(
                format!("unsupported analog input variation {}", other),
                30,
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
        points.push(AnalogInput::decode(
            &data[offset..offset + obj_size],
            start_index + i as u16,
            variation,
        )?);
        offset += obj_size;
    }
    Ok(points)
}

/// Parse a run of analog output status points from response data.
pub fn parse_analog_outputs(
    data: &[u8],
    start_index: u16,
    count: usize,
    variation: u8,
) -> Dnp3Result<Vec<AnalogOutput>> {
    let obj_size = match variation {
        1 | 3 => 5,
        2 => 3,
        4 => 9,
        other => {
            return Err(Dnp3Error::object(
                format!("unsupported analog output variation {}", other),
                40,
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
        points.push(AnalogOutput::decode(
            &data[offset..offset + obj_size],
            start_index + i as u16,
            variation,
        )?);
        offset += obj_size;
    }
    Ok(points)
}
