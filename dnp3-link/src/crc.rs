//! DNP3 CRC-16 calculation
//!
//! Polynomial 0x3D65 (reflected form 0xA6BC), initial value 0x0000, final
//! XOR 0xFFFF. The checksum is emitted least-significant byte first on the
//! wire, after the header and after every 16-byte user data block.

use crate::error::{Dnp3Error, Dnp3Result};
use once_cell::sync::Lazy;

/// Reflected DNP3 polynomial.
const POLYNOMIAL: u16 = 0xA6BC;

/// Precomputed CRC table
static CRC_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut crc = i as u16;
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
        *entry = crc;
    }
    table
});

/// Calculate the DNP3 CRC-16 of a byte slice.
///
/// The empty slice yields 0xFFFF (the final XOR applied to nothing).
pub fn calculate(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc = (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }
    crc ^ 0xFFFF
}

/// Calculate the CRC and return it in wire order (little-endian).
pub fn calculate_bytes(data: &[u8]) -> [u8; 2] {
    calculate(data).to_le_bytes()
}

/// Recompute the CRC of `data` and compare against `expected`.
pub fn verify(data: &[u8], expected: u16) -> bool {
    calculate(data) == expected
}

/// Verify against a 2-byte little-endian CRC as received off the wire,
/// returning a CRC error carrying both values on mismatch.
pub fn verify_bytes(data: &[u8], crc_bytes: &[u8]) -> Dnp3Result<()> {
    if crc_bytes.len() != 2 {
        return Err(Dnp3Error::Frame(format!(
            "CRC field must be exactly 2 bytes, got {}",
            crc_bytes.len()
        )));
    }
    let actual = u16::from_le_bytes([crc_bytes[0], crc_bytes[1]]);
    let expected = calculate(data);
    if actual != expected {
        return Err(Dnp3Error::Crc { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(calculate(&[]), 0xFFFF);
    }

    #[test]
    fn test_known_header_vector() {
        // Well-known DNP3 link header example; transmitted CRC is E9 21.
        let header = [0x05, 0x64, 0x05, 0xC0, 0x01, 0x00, 0x00, 0x04];
        assert_eq!(calculate(&header), 0x21E9);
        assert_eq!(calculate_bytes(&header), [0xE9, 0x21]);
    }

    #[test]
    fn test_verify_roundtrip() {
        let data = [0xC0, 0xC0, 0x01, 0x3C, 0x01, 0x06];
        let crc = calculate(&data);
        assert!(verify(&data, crc));
        assert!(!verify(&data, crc ^ 0x0001));
        verify_bytes(&data, &crc.to_le_bytes()).unwrap();
    }

    #[test]
    fn test_verify_bytes_mismatch_carries_both_values() {
        let data = [0x01, 0x02, 0x03];
        let expected = calculate(&data);
        let err = verify_bytes(&data, &[0x00, 0x00]).unwrap_err();
        match err {
            Dnp3Error::Crc {
                expected: e,
                actual,
            } => {
                assert_eq!(e, expected);
                assert_eq!(actual, 0x0000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let data = [0x05, 0x64, 0x0B, 0xC4, 0x0A, 0x00, 0x01, 0x00];
        let crc = calculate(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut corrupted = data;
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !verify(&corrupted, crc),
                    "bit flip at byte {byte} bit {bit} went undetected"
                );
            }
        }
    }
}
