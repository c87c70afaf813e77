//! Transport function: APDU segmentation and reassembly
//!
//! The transport function sits between the application layer and the link
//! layer. Each segment is a single header byte followed by up to 249
//! payload bytes:
//!
//! ```text
//! bit 7: FIR (first segment of an APDU)
//! bit 6: FIN (final segment of an APDU)
//! bits 5-0: sequence number, incrementing mod 64 within an APDU
//! ```

use crate::error::{Dnp3Error, Dnp3Result};
use std::time::Duration;
use tokio::time::Instant;

/// Maximum payload bytes per segment (250 link bytes minus the header).
pub const MAX_SEGMENT_PAYLOAD: usize = 249;

/// Sequence number mask (6 bits).
pub const SEQUENCE_MASK: u8 = 0x3F;

/// First-segment flag.
pub const FIR_FLAG: u8 = 0x80;

/// Final-segment flag.
pub const FIN_FLAG: u8 = 0x40;

/// One transport segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSegment {
    pub sequence: u8,
    pub is_first: bool,
    pub is_final: bool,
    pub payload: Vec<u8>,
}

impl TransportSegment {
    /// The header byte for this segment.
    pub fn header(&self) -> u8 {
        let mut h = self.sequence & SEQUENCE_MASK;
        if self.is_first {
            h |= FIR_FLAG;
        }
        if self.is_final {
            h |= FIN_FLAG;
        }
        h
    }

    /// Serialize header + payload for the link layer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.payload.len());
        out.push(self.header());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a segment from link-layer user data.
    pub fn from_bytes(data: &[u8]) -> Dnp3Result<Self> {
        let (&header, payload) = data.split_first().ok_or_else(|| {
            Dnp3Error::protocol("transport segment is empty")
        })?;
        Ok(Self {
            sequence: header & SEQUENCE_MASK,
            is_first: header & FIR_FLAG != 0,
            is_final: header & FIN_FLAG != 0,
            payload: payload.to_vec(),
        })
    }
}

/// Transport function state for one connection
///
/// Owns the 6-bit transmit sequence counter, which persists across
/// transactions, and the receive-side reassembly state, which is reset at
/// the start of each response.
#[derive(Debug)]
pub struct TransportFunction {
    tx_sequence: u8,
    max_apdu_size: usize,
    rx_buffer: Vec<u8>,
    rx_expected: Option<u8>,
    rx_deadline: Option<Instant>,
}

impl TransportFunction {
    pub fn new(max_apdu_size: usize) -> Self {
        Self {
            tx_sequence: 0,
            max_apdu_size,
            rx_buffer: Vec::new(),
            rx_expected: None,
            rx_deadline: None,
        }
    }

    /// Current transmit sequence number.
    pub fn tx_sequence(&self) -> u8 {
        self.tx_sequence
    }

    /// Split an APDU into ordered segments, consuming one transmit
    /// sequence number per segment. The first segment carries FIR, the
    /// last FIN; an empty APDU becomes a single FIR|FIN segment.
    ///
    /// # Errors
    /// Validation errors for `max_payload` outside 1-249 or an APDU larger
    /// than the configured maximum.
    pub fn segment(&mut self, apdu: &[u8], max_payload: usize) -> Dnp3Result<Vec<Vec<u8>>> {
        if max_payload == 0 || max_payload > MAX_SEGMENT_PAYLOAD {
            return Err(Dnp3Error::Validation(format!(
                "max_payload must be 1-{}, got {}",
                MAX_SEGMENT_PAYLOAD, max_payload
            )));
        }
        if apdu.len() > self.max_apdu_size {
            return Err(Dnp3Error::Validation(format!(
                "APDU of {} bytes exceeds maximum {}",
                apdu.len(),
                self.max_apdu_size
            )));
        }

        if apdu.is_empty() {
            let segment = TransportSegment {
                sequence: self.next_tx_sequence(),
                is_first: true,
                is_final: true,
                payload: Vec::new(),
            };
            return Ok(vec![segment.to_bytes()]);
        }

        let mut segments = Vec::with_capacity(apdu.len().div_ceil(max_payload));
        let total = apdu.len();
        let mut offset = 0;
        while offset < total {
            let end = (offset + max_payload).min(total);
            let segment = TransportSegment {
                sequence: self.next_tx_sequence(),
                is_first: offset == 0,
                is_final: end == total,
                payload: apdu[offset..end].to_vec(),
            };
            segments.push(segment.to_bytes());
            offset = end;
        }
        Ok(segments)
    }

    fn next_tx_sequence(&mut self) -> u8 {
        let seq = self.tx_sequence;
        self.tx_sequence = (self.tx_sequence + 1) & SEQUENCE_MASK;
        seq
    }

    /// Feed one received segment into the reassembler.
    ///
    /// A FIR segment restarts reassembly, adopts the segment's sequence
    /// number, and arms a deadline `timeout` from now. Returns the
    /// complete APDU once a FIN segment arrives in order.
    ///
    /// # Errors
    /// Protocol errors for a continuation without a first segment, a
    /// sequence gap, or an APDU growing past the configured maximum;
    /// a timeout error when the deadline passes before FIN. All failures
    /// discard the partial reassembly state.
    pub fn feed(&mut self, segment_data: &[u8], timeout: Duration) -> Dnp3Result<Option<Vec<u8>>> {
        let segment = TransportSegment::from_bytes(segment_data)?;

        if let Some(deadline) = self.rx_deadline {
            if Instant::now() > deadline {
                self.reset_rx();
                return Err(Dnp3Error::Timeout {
                    message: "reassembly deadline exceeded".to_string(),
                    timeout_seconds: timeout.as_secs_f64(),
                });
            }
        }

        if segment.is_first {
            self.rx_buffer.clear();
            self.rx_deadline = Some(Instant::now() + timeout);
            self.check_capacity(segment.payload.len())?;
            self.rx_buffer.extend_from_slice(&segment.payload);
            self.rx_expected = Some((segment.sequence + 1) & SEQUENCE_MASK);

            if segment.is_final {
                return Ok(Some(self.take_apdu()));
            }
            return Ok(None);
        }

        let expected = match self.rx_expected {
            Some(expected) => expected,
            None => {
                self.reset_rx();
                return Err(Dnp3Error::protocol(
                    "received continuation segment without a first segment",
                ));
            }
        };

        if segment.sequence != expected {
            let got = segment.sequence;
            self.reset_rx();
            return Err(Dnp3Error::protocol(format!(
                "transport sequence mismatch: expected {}, got {}",
                expected, got
            )));
        }

        self.check_capacity(segment.payload.len())?;
        self.rx_buffer.extend_from_slice(&segment.payload);
        self.rx_expected = Some((segment.sequence + 1) & SEQUENCE_MASK);

        if segment.is_final {
            return Ok(Some(self.take_apdu()));
        }
        Ok(None)
    }

    fn check_capacity(&mut self, incoming: usize) -> Dnp3Result<()> {
        let new_size = self.rx_buffer.len() + incoming;
        if new_size > self.max_apdu_size {
            self.reset_rx();
            return Err(Dnp3Error::protocol(format!(
                "reassembled APDU exceeds maximum size: {} > {}",
                new_size, self.max_apdu_size
            )));
        }
        Ok(())
    }

    fn take_apdu(&mut self) -> Vec<u8> {
        let apdu = std::mem::take(&mut self.rx_buffer);
        self.rx_expected = None;
        self.rx_deadline = None;
        apdu
    }

    /// Discard receive-side reassembly state.
    pub fn reset_rx(&mut self) {
        self.rx_buffer.clear();
        self.rx_expected = None;
        self.rx_deadline = None;
    }

    /// True while a multi-segment APDU is partially assembled.
    pub fn is_receiving(&self) -> bool {
        self.rx_expected.is_some()
    }
}
