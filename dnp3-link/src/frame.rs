//! FT3 frame structure and encoding/decoding
//!
//! Frame layout:
//!
//! ```text
//! [Start: 0x05 0x64][Length: 1][Control: 1]
//! [Destination: 2 LE][Source: 2 LE][Header CRC: 2 LE]
//! [User data block 1: up to 16 bytes][Block CRC: 2 LE]
//! ...
//! ```
//!
//! The length field counts control + addresses + user data (5 + N). Each
//! user data block, including a short final block, is followed by its own
//! CRC. A frame with N user data bytes occupies
//! `10 + N + 2 * ceil(N / 16)` bytes on the wire.

use crate::crc;
use crate::error::{Dnp3Error, Dnp3Result};
use dnp3_core::{MAX_FRAME_USER_DATA, MAX_VALID_ADDRESS};
use std::fmt;

/// FT3 start bytes
pub const START_BYTES: [u8; 2] = [0x05, 0x64];

/// Size of the frame header including its CRC.
pub const HEADER_SIZE: usize = 10;

/// User data block size between CRCs.
pub const BLOCK_SIZE: usize = 16;

/// Control byte bit masks.
pub mod control {
    /// Direction: 1 = from master.
    pub const DIR: u8 = 0x80;
    /// Primary message bit.
    pub const PRM: u8 = 0x40;
    /// Frame count bit.
    pub const FCB: u8 = 0x20;
    /// Frame count valid (primary) / data flow control (secondary).
    pub const FCV: u8 = 0x10;
    /// Link function code mask.
    pub const FUNC_MASK: u8 = 0x0F;
}

/// Primary station (master) link function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrimaryFunction {
    ResetLink = 0x00,
    ResetUserProcess = 0x01,
    TestLink = 0x02,
    UserDataConfirmed = 0x03,
    UserDataUnconfirmed = 0x04,
    RequestLinkStatus = 0x09,
}

/// Secondary station (outstation) link function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecondaryFunction {
    Ack = 0x00,
    Nack = 0x01,
    LinkStatus = 0x0B,
    NotSupported = 0x0F,
}

impl SecondaryFunction {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(SecondaryFunction::Ack),
            0x01 => Some(SecondaryFunction::Nack),
            0x0B => Some(SecondaryFunction::LinkStatus),
            0x0F => Some(SecondaryFunction::NotSupported),
            _ => None,
        }
    }
}

/// A parsed FT3 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFrame {
    destination: u16,
    source: u16,
    control: u8,
    user_data: Vec<u8>,
}

impl LinkFrame {
    pub fn destination(&self) -> u16 {
        self.destination
    }

    pub fn source(&self) -> u16 {
        self.source
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn user_data(&self) -> &[u8] {
        &self.user_data
    }

    pub fn into_user_data(self) -> Vec<u8> {
        self.user_data
    }

    /// DIR bit: frame originated at the master.
    pub fn is_from_master(&self) -> bool {
        self.control & control::DIR != 0
    }

    /// PRM bit: primary (initiating) message.
    pub fn is_primary(&self) -> bool {
        self.control & control::PRM != 0
    }

    pub fn function_code(&self) -> u8 {
        self.control & control::FUNC_MASK
    }

    pub fn fcb(&self) -> bool {
        self.control & control::FCB != 0
    }

    pub fn fcv(&self) -> bool {
        self.control & control::FCV != 0
    }

    /// Secondary frames with no user data are link-level acknowledgements
    /// rather than transport segments.
    pub fn is_link_control(&self) -> bool {
        self.user_data.is_empty()
    }
}

impl fmt::Display for LinkFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LinkFrame(dst={}, src={}, ctrl=0x{:02X}, data_len={})",
            self.destination,
            self.source,
            self.control,
            self.user_data.len()
        )
    }
}

/// Validate a DNP3 station address (0-65519; upper values are reserved).
pub fn validate_address(address: u16, name: &str) -> Dnp3Result<()> {
    if address > MAX_VALID_ADDRESS {
        return Err(Dnp3Error::Validation(format!(
            "{} address must be 0-65519 (0xFFEF), got {}; addresses 65520-65535 are reserved",
            name, address
        )));
    }
    Ok(())
}

/// Total on-wire frame size implied by a header length byte.
///
/// # Errors
/// Returns a frame error for length fields below 5 or implying more than
/// 250 user data bytes.
pub fn frame_size_from_length(length: u8) -> Dnp3Result<usize> {
    if length < 5 {
        return Err(Dnp3Error::Frame(format!(
            "invalid length field: {} < 5",
            length
        )));
    }
    let user_data_len = length as usize - 5;
    if user_data_len > MAX_FRAME_USER_DATA {
        return Err(Dnp3Error::Frame(format!(
            "length field implies {} user data bytes, maximum is {}",
            user_data_len, MAX_FRAME_USER_DATA
        )));
    }
    let full_blocks = user_data_len / BLOCK_SIZE;
    let remainder = user_data_len % BLOCK_SIZE;
    let mut size = HEADER_SIZE + full_blocks * (BLOCK_SIZE + 2);
    if remainder > 0 {
        size += remainder + 2;
    }
    Ok(size)
}

/// Find the offset of the next 0x05 0x64 start pattern, if any.
pub fn find_frame_start(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w == START_BYTES)
}

/// FT3 frame encoder/decoder bound to a master/outstation address pair
///
/// Owns the frame count bit, which the coordinator toggles after each
/// successful confirmed transmission and resets on RESET_LINK.
#[derive(Debug, Clone)]
pub struct LinkLayer {
    master_address: u16,
    outstation_address: u16,
    fcb: bool,
}

impl LinkLayer {
    /// Create a link layer for the given address pair.
    ///
    /// # Errors
    /// Returns a validation error if either address is in the reserved
    /// range.
    pub fn new(master_address: u16, outstation_address: u16) -> Dnp3Result<Self> {
        validate_address(master_address, "master")?;
        validate_address(outstation_address, "outstation")?;
        Ok(Self {
            master_address,
            outstation_address,
            fcb: false,
        })
    }

    pub fn master_address(&self) -> u16 {
        self.master_address
    }

    pub fn outstation_address(&self) -> u16 {
        self.outstation_address
    }

    /// Current frame count bit.
    pub fn fcb(&self) -> bool {
        self.fcb
    }

    /// Toggle the frame count bit for the next confirmed transmission.
    pub fn toggle_fcb(&mut self) {
        self.fcb = !self.fcb;
    }

    /// Reset the frame count bit, as after a RESET_LINK exchange.
    pub fn reset_fcb(&mut self) {
        self.fcb = false;
    }

    /// Build a USER_DATA frame carrying one transport segment.
    ///
    /// `confirmed` selects USER_DATA_CONFIRMED with FCV set and the
    /// current FCB; otherwise USER_DATA_UNCONFIRMED is used.
    pub fn build_frame(&self, user_data: &[u8], confirmed: bool) -> Dnp3Result<Vec<u8>> {
        if user_data.len() > MAX_FRAME_USER_DATA {
            return Err(Dnp3Error::Frame(format!(
                "user data exceeds maximum size: {} > {}",
                user_data.len(),
                MAX_FRAME_USER_DATA
            )));
        }

        let mut ctrl = control::DIR | control::PRM;
        if confirmed {
            ctrl |= PrimaryFunction::UserDataConfirmed as u8 | control::FCV;
            if self.fcb {
                ctrl |= control::FCB;
            }
        } else {
            ctrl |= PrimaryFunction::UserDataUnconfirmed as u8;
        }

        Ok(self.assemble(ctrl, user_data))
    }

    /// Build a RESET_LINK_STATES frame.
    pub fn build_reset_link(&self) -> Vec<u8> {
        let ctrl = control::DIR | control::PRM | PrimaryFunction::ResetLink as u8;
        self.assemble(ctrl, &[])
    }

    /// Build a REQUEST_LINK_STATUS frame.
    pub fn build_request_link_status(&self) -> Vec<u8> {
        let ctrl = control::DIR | control::PRM | PrimaryFunction::RequestLinkStatus as u8;
        self.assemble(ctrl, &[])
    }

    fn assemble(&self, ctrl: u8, user_data: &[u8]) -> Vec<u8> {
        let mut header = Vec::with_capacity(8);
        header.extend_from_slice(&START_BYTES);
        header.push((5 + user_data.len()) as u8);
        header.push(ctrl);
        header.extend_from_slice(&self.outstation_address.to_le_bytes());
        header.extend_from_slice(&self.master_address.to_le_bytes());

        let mut frame = header.clone();
        frame.extend_from_slice(&crc::calculate_bytes(&header));

        for block in user_data.chunks(BLOCK_SIZE) {
            frame.extend_from_slice(block);
            frame.extend_from_slice(&crc::calculate_bytes(block));
        }

        frame
    }

    /// Parse exactly one frame from the start of `data`.
    ///
    /// Validates the start pattern, header CRC, length field, every block
    /// CRC, and that the frame is addressed to this master from the
    /// configured outstation.
    ///
    /// # Returns
    /// The parsed frame and the number of bytes consumed.
    pub fn parse_frame(&self, data: &[u8]) -> Dnp3Result<(LinkFrame, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(Dnp3Error::Frame(format!(
                "data too short for frame header: {} < {}",
                data.len(),
                HEADER_SIZE
            )));
        }

        if data[0..2] != START_BYTES {
            return Err(Dnp3Error::Frame(format!(
                "invalid start bytes: 0x{:02X} 0x{:02X}",
                data[0], data[1]
            )));
        }

        crc::verify_bytes(&data[0..8], &data[8..10])?;

        let length = data[2];
        let ctrl = data[3];
        let destination = u16::from_le_bytes([data[4], data[5]]);
        let source = u16::from_le_bytes([data[6], data[7]]);

        if destination != self.master_address {
            return Err(Dnp3Error::Frame(format!(
                "frame addressed to {}, expected master address {}",
                destination, self.master_address
            )));
        }
        if source != self.outstation_address {
            return Err(Dnp3Error::Frame(format!(
                "frame from address {}, expected outstation address {}",
                source, self.outstation_address
            )));
        }

        if length < 5 {
            return Err(Dnp3Error::Frame(format!(
                "invalid length field: {} < 5",
                length
            )));
        }
        let user_data_len = length as usize - 5;

        let mut user_data = Vec::with_capacity(user_data_len);
        let mut offset = HEADER_SIZE;
        let mut remaining = user_data_len;
        while remaining > 0 {
            let block_len = remaining.min(BLOCK_SIZE);
            let needed = block_len + 2;
            if offset + needed > data.len() {
                return Err(Dnp3Error::Frame(format!(
                    "incomplete frame: need {} bytes, have {}",
                    offset + needed,
                    data.len()
                )));
            }

            let block = &data[offset..offset + block_len];
            crc::verify_bytes(block, &data[offset + block_len..offset + needed])?;

            user_data.extend_from_slice(block);
            offset += needed;
            remaining -= block_len;
        }

        Ok((
            LinkFrame {
                destination,
                source,
                control: ctrl,
                user_data,
            },
            offset,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> LinkLayer {
        LinkLayer::new(1, 10).unwrap()
    }

    /// Parse with the address pair reversed, as the outstation would see
    /// a master-built frame.
    fn parse_as_peer(frame: &[u8]) -> (LinkFrame, usize) {
        LinkLayer::new(10, 1).unwrap().parse_frame(frame).unwrap()
    }

    #[test]
    fn test_reserved_address_rejected() {
        assert!(LinkLayer::new(65520, 10).is_err());
        assert!(LinkLayer::new(1, 65535).is_err());
    }

    #[test]
    fn test_build_parse_roundtrip() {
        let payloads: [&[u8]; 5] = [
            &[],
            &[0xAA],
            &[0x55; 16],
            &[0x11; 17],
            &[0x22; 250],
        ];
        for payload in payloads {
            let frame = link().build_frame(payload, false).unwrap();
            let expected = frame_size_from_length((5 + payload.len()) as u8).unwrap();
            assert_eq!(frame.len(), expected);

            let (parsed, consumed) = parse_as_peer(&frame);
            assert_eq!(consumed, frame.len());
            assert_eq!(parsed.user_data(), payload);
            assert_eq!(parsed.destination(), 10);
            assert_eq!(parsed.source(), 1);
            assert!(parsed.is_from_master());
            assert!(parsed.is_primary());
        }
    }

    #[test]
    fn test_integrity_poll_frame_layout() {
        // master=1, outstation=10, unconfirmed user data with a one-segment
        // class 0 read: 05 64 0B C4 0A 00 01 00 .. ..
        let user_data = [0xC0, 0xC0, 0x01, 0x3C, 0x01, 0x06];
        let frame = link().build_frame(&user_data, false).unwrap();
        assert_eq!(
            &frame[..8],
            &[0x05, 0x64, 0x0B, 0xC4, 0x0A, 0x00, 0x01, 0x00]
        );
        assert_eq!(frame.len(), 18);
        assert_eq!(&frame[10..16], &user_data);
    }

    #[test]
    fn test_confirmed_frame_carries_fcv_and_fcb() {
        let mut layer = link();
        let frame = layer.build_frame(&[0x00], true).unwrap();
        let ctrl = frame[3];
        assert_eq!(ctrl & control::FUNC_MASK, 0x03);
        assert_ne!(ctrl & control::FCV, 0);
        assert_eq!(ctrl & control::FCB, 0);

        layer.toggle_fcb();
        let frame = layer.build_frame(&[0x00], true).unwrap();
        assert_ne!(frame[3] & control::FCB, 0);

        layer.reset_fcb();
        let frame = layer.build_frame(&[0x00], true).unwrap();
        assert_eq!(frame[3] & control::FCB, 0);
    }

    #[test]
    fn test_reset_link_and_status_builders() {
        let reset = link().build_reset_link();
        assert_eq!(reset.len(), 10);
        assert_eq!(reset[3], control::DIR | control::PRM);

        let status = link().build_request_link_status();
        assert_eq!(status[3] & control::FUNC_MASK, 0x09);
    }

    #[test]
    fn test_oversized_user_data_rejected() {
        let payload = vec![0u8; 251];
        assert!(matches!(
            link().build_frame(&payload, false),
            Err(Dnp3Error::Frame(_))
        ));
    }

    #[test]
    fn test_bad_start_bytes() {
        let mut frame = link().build_frame(&[0x01], false).unwrap();
        frame[0] = 0x06;
        let err = LinkLayer::new(10, 1).unwrap().parse_frame(&frame).unwrap_err();
        assert!(matches!(err, Dnp3Error::Frame(_)));
    }

    #[test]
    fn test_any_bit_flip_fails_a_crc() {
        let frame = link().build_frame(&[0xDE, 0xAD, 0xBE, 0xEF], false).unwrap();
        let peer = LinkLayer::new(10, 1).unwrap();
        // Flipping any single bit must fail the header CRC, a block CRC,
        // or the start/address validation; never parse cleanly to the
        // same payload.
        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                match peer.parse_frame(&corrupted) {
                    Err(_) => {}
                    Ok((parsed, _)) => {
                        panic!(
                            "corrupted frame (byte {byte} bit {bit}) parsed: {parsed}"
                        )
                    }
                }
            }
        }
    }

    #[test]
    fn test_wrong_destination_rejected() {
        let frame = link().build_frame(&[0x01], false).unwrap();
        // A peer configured with a different local address must reject it.
        let other = LinkLayer::new(11, 1).unwrap();
        let err = other.parse_frame(&frame).unwrap_err();
        assert!(matches!(err, Dnp3Error::Frame(_)));
    }

    #[test]
    fn test_frame_size_from_length() {
        assert_eq!(frame_size_from_length(5).unwrap(), 10);
        assert_eq!(frame_size_from_length(6).unwrap(), 13);
        assert_eq!(frame_size_from_length(21).unwrap(), 28);
        assert_eq!(frame_size_from_length(22).unwrap(), 31);
        assert_eq!(frame_size_from_length(255).unwrap(), 292);
        assert!(frame_size_from_length(4).is_err());
    }

    #[test]
    fn test_find_frame_start() {
        assert_eq!(find_frame_start(&[0x05, 0x64]), Some(0));
        assert_eq!(find_frame_start(&[0xFF, 0x05, 0x64, 0x00]), Some(1));
        assert_eq!(find_frame_start(&[0x05, 0x05, 0x64]), Some(1));
        assert_eq!(find_frame_start(&[0x64, 0x05]), None);
    }
}
