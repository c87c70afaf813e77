//! Data link layer and transport function for the DNP3 master driver
//!
//! This crate provides the FT3 wire format (start pattern, block-wise
//! CRC-16, addressing, link functions), a stream decoder that pulls frames
//! off a byte stream with resynchronization, and the transport function
//! that segments APDUs into link payloads and reassembles them on receive.

pub mod crc;
pub mod decoder;
pub mod error;
pub mod frame;
pub mod segment;

pub use decoder::{hex_frame, FrameDecoder};
pub use error::{Dnp3Error, Dnp3Result};
pub use frame::{
    control, find_frame_start, frame_size_from_length, validate_address, LinkFrame, LinkLayer,
    PrimaryFunction, SecondaryFunction, BLOCK_SIZE, HEADER_SIZE, START_BYTES,
};
pub use segment::{
    TransportFunction, TransportSegment, FIN_FLAG, FIR_FLAG, MAX_SEGMENT_PAYLOAD, SEQUENCE_MASK,
};
