//! Object headers with qualifier-coded ranges
//!
//! Every object block in an APDU begins with group, variation and a
//! qualifier byte describing how the range or count that follows is
//! encoded. Request headers built by this driver use 0x00/0x01 (start-stop
//! ranges), 0x06 (all objects) and 0x17 (indexed command list); responses
//! are additionally accepted with 0x07/0x08 counts and 0x28/0x29 wide
//! index prefixes.

use crate::error::{Dnp3Error, Dnp3Result};
use dnp3_objects::{is_bit_packed, object_size};

/// Object header qualifier codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Qualifier {
    /// 1-byte start and stop indexes.
    Uint8StartStop = 0x00,
    /// 2-byte start and stop indexes, little-endian.
    Uint16StartStop = 0x01,
    /// All objects; no range field, no data.
    AllObjects = 0x06,
    /// 1-byte count, objects without index prefixes.
    Uint8Count = 0x07,
    /// 2-byte count, objects without index prefixes.
    Uint16Count = 0x08,
    /// 1-byte count, each object prefixed with a 1-byte index.
    Uint8CountUint8Index = 0x17,
    /// 1-byte count, each object prefixed with a 2-byte index.
    Uint8CountUint16Index = 0x28,
    /// 2-byte count, each object prefixed with a 2-byte index.
    Uint16CountUint16Index = 0x29,
}

impl Qualifier {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Qualifier::Uint8StartStop),
            0x01 => Some(Qualifier::Uint16StartStop),
            0x06 => Some(Qualifier::AllObjects),
            0x07 => Some(Qualifier::Uint8Count),
            0x08 => Some(Qualifier::Uint16Count),
            0x17 => Some(Qualifier::Uint8CountUint8Index),
            0x28 => Some(Qualifier::Uint8CountUint16Index),
            0x29 => Some(Qualifier::Uint16CountUint16Index),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bytes of per-object index prefix implied by this qualifier.
    pub fn index_prefix_size(self) -> usize {
        match self {
            Qualifier::Uint8CountUint8Index => 1,
            Qualifier::Uint8CountUint16Index | Qualifier::Uint16CountUint16Index => 2,
            _ => 0,
        }
    }
}

/// DNP3 object header
///
/// Carries the parsed range fields; `count` is derived for start-stop
/// qualifiers. Request builders attach object data separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    pub group: u8,
    pub variation: u8,
    pub qualifier: Qualifier,
    pub range_start: u16,
    pub range_stop: u16,
    pub count: u16,
}

impl ObjectHeader {
    /// Header for a start-stop range read, choosing the 1-byte form when
    /// both ends fit a byte.
    pub fn range(group: u8, variation: u8, start: u16, stop: u16) -> Dnp3Result<Self> {
        if start > stop {
            return Err(Dnp3Error::Validation(format!(
                "range start {} > stop {}",
                start, stop
            )));
        }
        let qualifier = if start <= 0xFF && stop <= 0xFF {
            Qualifier::Uint8StartStop
        } else {
            Qualifier::Uint16StartStop
        };
        Ok(Self {
            group,
            variation,
            qualifier,
            range_start: start,
            range_stop: stop,
            count: stop - start + 1,
        })
    }

    /// Header for an all-objects read (class polls).
    pub fn all_objects(group: u8, variation: u8) -> Self {
        Self {
            group,
            variation,
            qualifier: Qualifier::AllObjects,
            range_start: 0,
            range_stop: 0,
            count: 0,
        }
    }

    /// Header for an indexed command list of `count` objects
    /// (qualifier 0x17).
    pub fn indexed(group: u8, variation: u8, count: u8) -> Self {
        Self {
            group,
            variation,
            qualifier: Qualifier::Uint8CountUint8Index,
            range_start: 0,
            range_stop: 0,
            count: count as u16,
        }
    }

    /// Serialize group, variation, qualifier and the range fields.
    pub fn encode(&self) -> Dnp3Result<Vec<u8>> {
        let mut out = vec![self.group, self.variation, self.qualifier.code()];
        match self.qualifier {
            Qualifier::Uint8StartStop => {
                if self.range_start > 0xFF || self.range_stop > 0xFF {
                    return Err(Dnp3Error::Validation(format!(
                        "1-byte range must be 0-255: start={}, stop={}",
                        self.range_start, self.range_stop
                    )));
                }
                if self.range_stop < self.range_start {
                    return Err(Dnp3Error::Validation(format!(
                        "range start {} > stop {}",
                        self.range_start, self.range_stop
                    )));
                }
                out.push(self.range_start as u8);
                out.push(self.range_stop as u8);
            }
            Qualifier::Uint16StartStop => {
                if self.range_stop < self.range_start {
                    return Err(Dnp3Error::Validation(format!(
                        "range start {} > stop {}",
                        self.range_start, self.range_stop
                    )));
                }
                out.extend_from_slice(&self.range_start.to_le_bytes());
                out.extend_from_slice(&self.range_stop.to_le_bytes());
            }
            Qualifier::AllObjects => {}
            Qualifier::Uint8Count
            | Qualifier::Uint8CountUint8Index
            | Qualifier::Uint8CountUint16Index => {
                if self.count > 0xFF {
                    return Err(Dnp3Error::Validation(format!(
                        "1-byte count must be 0-255, got {}",
                        self.count
                    )));
                }
                out.push(self.count as u8);
            }
            Qualifier::Uint16Count | Qualifier::Uint16CountUint16Index => {
                out.extend_from_slice(&self.count.to_le_bytes());
            }
        }
        Ok(out)
    }

    /// Parse a header from `data` starting at `offset`.
    ///
    /// # Returns
    /// The header and the number of bytes consumed.
    pub fn decode(data: &[u8], offset: usize) -> Dnp3Result<(Self, usize)> {
        let rest = data.get(offset..).unwrap_or(&[]);
        if rest.len() < 3 {
            return Err(Dnp3Error::protocol("insufficient data for object header"));
        }
        let group = rest[0];
        let variation = rest[1];
        let qualifier = Qualifier::from_code(rest[2]).ok_or_else(|| {
            Dnp3Error::object(
                format!("unsupported qualifier code 0x{:02X}", rest[2]),
                group,
                variation,
            )
        })?;
        let mut consumed = 3;

        let mut range_start = 0u16;
        let mut range_stop = 0u16;
        let count;
        match qualifier {
            Qualifier::Uint8StartStop => {
                let range = rest.get(3..5).ok_or_else(|| {
                    Dnp3Error::object("insufficient data for range", group, variation)
                })?;
                range_start = range[0] as u16;
                range_stop = range[1] as u16;
                if range_stop < range_start {
                    return Err(Dnp3Error::object(
                        format!("invalid range: start {} > stop {}", range_start, range_stop),
                        group,
                        variation,
                    ));
                }
                count = range_stop - range_start + 1;
                consumed += 2;
            }
            Qualifier::Uint16StartStop => {
                let range = rest.get(3..7).ok_or_else(|| {
                    Dnp3Error::object("insufficient data for range", group, variation)
                })?;
                range_start = u16::from_le_bytes([range[0], range[1]]);
                range_stop = u16::from_le_bytes([range[2], range[3]]);
                if range_stop < range_start {
                    return Err(Dnp3Error::object(
                        format!("invalid range: start {} > stop {}", range_start, range_stop),
                        group,
                        variation,
                    ));
                }
                count = range_stop - range_start + 1;
                consumed += 4;
            }
            Qualifier::AllObjects => {
                count = 0;
            }
            Qualifier::Uint8Count
            | Qualifier::Uint8CountUint8Index
            | Qualifier::Uint8CountUint16Index => {
                let byte = rest.get(3).ok_or_else(|| {
                    Dnp3Error::object("insufficient data for count", group, variation)
                })?;
                count = *byte as u16;
                consumed += 1;
            }
            Qualifier::Uint16Count | Qualifier::Uint16CountUint16Index => {
                let bytes = rest.get(3..5).ok_or_else(|| {
                    Dnp3Error::object("insufficient data for count", group, variation)
                })?;
                count = u16::from_le_bytes([bytes[0], bytes[1]]);
                consumed += 2;
            }
        }

        Ok((
            Self {
                group,
                variation,
                qualifier,
                range_start,
                range_stop,
                count,
            },
            consumed,
        ))
    }

    /// Size of the object data that follows this header in a response.
    ///
    /// Accounts for bit-packed variations and per-object index prefixes.
    /// Returns `None` when the size cannot be determined, in which case the
    /// remainder of the APDU cannot be walked past this block.
    pub fn data_size(&self) -> Option<usize> {
        if self.count == 0 {
            return Some(0);
        }
        let count = self.count as usize;
        if self.qualifier.index_prefix_size() > 0 {
            let base = object_size(self.group, self.variation)?;
            return Some(count * (self.qualifier.index_prefix_size() + base));
        }
        if is_bit_packed(self.group, self.variation) {
            return Some(count.div_ceil(8));
        }
        object_size(self.group, self.variation).map(|size| size * count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_header_picks_narrow_qualifier() {
        let header = ObjectHeader::range(1, 0, 0, 100).unwrap();
        assert_eq!(header.qualifier, Qualifier::Uint8StartStop);
        assert_eq!(header.count, 101);

        let header = ObjectHeader::range(30, 0, 0, 300).unwrap();
        assert_eq!(header.qualifier, Qualifier::Uint16StartStop);

        let header = ObjectHeader::range(30, 0, 256, 300).unwrap();
        assert_eq!(header.qualifier, Qualifier::Uint16StartStop);
    }

    #[test]
    fn test_range_validation() {
        assert!(ObjectHeader::range(1, 0, 5, 2).is_err());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let headers = [
            ObjectHeader::range(1, 2, 0, 15).unwrap(),
            ObjectHeader::range(30, 1, 100, 400).unwrap(),
            ObjectHeader::all_objects(60, 1),
            ObjectHeader::indexed(12, 1, 1),
        ];
        for header in headers {
            let encoded = header.encode().unwrap();
            let (decoded, consumed) = ObjectHeader::decode(&encoded, 0).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded.group, header.group);
            assert_eq!(decoded.variation, header.variation);
            assert_eq!(decoded.qualifier, header.qualifier);
            assert_eq!(decoded.count, header.count);
        }
    }

    #[test]
    fn test_class_read_header_bytes() {
        let header = ObjectHeader::all_objects(60, 1);
        assert_eq!(header.encode().unwrap(), vec![0x3C, 0x01, 0x06]);
    }

    #[test]
    fn test_indexed_command_header_bytes() {
        let header = ObjectHeader::indexed(12, 1, 1);
        assert_eq!(header.encode().unwrap(), vec![0x0C, 0x01, 0x17, 0x01]);
    }

    #[test]
    fn test_unknown_qualifier_rejected() {
        let err = ObjectHeader::decode(&[0x0C, 0x01, 0x5B, 0x00], 0).unwrap_err();
        assert!(matches!(err, Dnp3Error::Object { group: 12, variation: 1, .. }));
    }

    #[test]
    fn test_data_size_fixed_objects() {
        let header = ObjectHeader::range(30, 1, 0, 9).unwrap();
        assert_eq!(header.data_size(), Some(50));
    }

    #[test]
    fn test_data_size_bit_packed() {
        let header = ObjectHeader::range(1, 1, 0, 9).unwrap();
        assert_eq!(header.data_size(), Some(2));

        let header = ObjectHeader::range(1, 1, 0, 7).unwrap();
        assert_eq!(header.data_size(), Some(1));
    }

    #[test]
    fn test_data_size_indexed_prefix() {
        let header = ObjectHeader::indexed(12, 1, 2);
        assert_eq!(header.data_size(), Some(2 * (1 + 11)));

        let mut header = ObjectHeader::indexed(41, 1, 1);
        header.qualifier = Qualifier::Uint8CountUint16Index;
        assert_eq!(header.data_size(), Some(2 + 5));
    }

    #[test]
    fn test_data_size_unknown() {
        let header = ObjectHeader {
            group: 110,
            variation: 1,
            qualifier: Qualifier::Uint8Count,
            range_start: 0,
            range_stop: 0,
            count: 2,
        };
        assert_eq!(header.data_size(), None);
    }
}
