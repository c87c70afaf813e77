//! Application layer response parsing
//!
//! Responses are `[control][function][IIN1][IIN2][object blocks...]`.
//! Object data is sliced out block by block using the catalog sizes, so
//! downstream code receives `(header, data)` pairs it can decode without
//! re-walking the APDU.

use crate::control::{CON_FLAG, FIN_FLAG, FIR_FLAG, SEQ_MASK, UNS_FLAG};
use crate::error::{Dnp3Error, Dnp3Result};
use crate::function::AppFunction;
use crate::header::ObjectHeader;
use crate::iin::Iin;
use dnp3_objects::group_name;
use std::fmt;
use tracing::warn;

/// One object block from a response
#[derive(Debug, Clone)]
pub struct ObjectBlock {
    pub header: ObjectHeader,
    pub data: Vec<u8>,
}

/// DNP3 application layer response
#[derive(Debug, Clone)]
pub struct ApplicationResponse {
    pub function: u8,
    pub sequence: u8,
    pub first: bool,
    pub final_fragment: bool,
    pub confirm_required: bool,
    pub unsolicited: bool,
    pub iin: Iin,
    pub blocks: Vec<ObjectBlock>,
}

impl ApplicationResponse {
    /// Parse a response APDU.
    ///
    /// # Errors
    /// Protocol errors for a short APDU or a non-response function code.
    /// A truncated or unknown-size trailing block does not fail the parse;
    /// the blocks decoded so far are kept and the remainder is attached to
    /// the last header as raw data.
    pub fn parse(data: &[u8]) -> Dnp3Result<Self> {
        if data.len() < 4 {
            return Err(Dnp3Error::protocol(format!(
                "response too short: {} bytes",
                data.len()
            )));
        }

        let ctrl = data[0];
        let function = data[1];
        let iin = Iin::new(data[2], data[3]);

        if !AppFunction::is_response_code(function) {
            return Err(Dnp3Error::Protocol {
                message: format!("invalid response function code 0x{:02X}", function),
                function_code: Some(function),
                iin: Some(iin.to_bytes()),
            });
        }

        let mut blocks = Vec::new();
        let mut offset = 4;
        while offset < data.len() {
            let (header, consumed) = match ObjectHeader::decode(data, offset) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!("stopping object walk at offset {}: {}", offset, err);
                    break;
                }
            };
            let data_start = offset + consumed;

            match header.data_size() {
                Some(size) if data_start + size <= data.len() => {
                    blocks.push(ObjectBlock {
                        header,
                        data: data[data_start..data_start + size].to_vec(),
                    });
                    offset = data_start + size;
                }
                Some(size) => {
                    warn!(
                        "object block g{}v{} claims {} data bytes but only {} remain",
                        header.group,
                        header.variation,
                        size,
                        data.len() - data_start
                    );
                    break;
                }
                None => {
                    // Size cannot be determined, so nothing after this
                    // block can be walked either. Keep the remainder raw.
                    warn!(
                        "unknown object size for {} g{}v{}, keeping block raw",
                        group_name(header.group),
                        header.group,
                        header.variation
                    );
                    blocks.push(ObjectBlock {
                        header,
                        data: data[data_start..].to_vec(),
                    });
                    break;
                }
            }
        }

        Ok(Self {
            function,
            sequence: ctrl & SEQ_MASK,
            first: ctrl & FIR_FLAG != 0,
            final_fragment: ctrl & FIN_FLAG != 0,
            confirm_required: ctrl & CON_FLAG != 0,
            unsolicited: ctrl & UNS_FLAG != 0,
            iin,
            blocks,
        })
    }

    /// Fail if the IIN signals that the request was rejected.
    pub fn check_rejection(&self) -> Dnp3Result<()> {
        if self.iin.has_errors() {
            return Err(Dnp3Error::Protocol {
                message: format!("outstation rejected request: {}", self.iin),
                function_code: Some(self.function),
                iin: Some(self.iin.to_bytes()),
            });
        }
        Ok(())
    }

    /// Merge multi-fragment responses into one.
    ///
    /// Object blocks are concatenated in arrival order; the IIN and
    /// sequence of the last fragment describe the outstation's most
    /// recent state.
    pub fn merge(fragments: Vec<ApplicationResponse>) -> Dnp3Result<ApplicationResponse> {
        let mut fragments = fragments;
        match fragments.len() {
            0 => Err(Dnp3Error::protocol("no fragments to merge")),
            1 => Ok(fragments.remove(0)),
            _ => {
                let first = &fragments[0];
                let last = &fragments[fragments.len() - 1];
                let mut merged = ApplicationResponse {
                    function: first.function,
                    sequence: last.sequence,
                    first: true,
                    final_fragment: true,
                    confirm_required: false,
                    unsolicited: first.unsolicited,
                    iin: last.iin,
                    blocks: Vec::new(),
                };
                for fragment in fragments {
                    merged.blocks.extend(fragment.blocks);
                }
                Ok(merged)
            }
        }
    }
}

impl fmt::Display for ApplicationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags: Vec<&str> = Vec::new();
        if self.first {
            flags.push("FIR");
        }
        if self.final_fragment {
            flags.push("FIN");
        }
        if self.confirm_required {
            flags.push("CON");
        }
        if self.unsolicited {
            flags.push("UNS");
        }
        write!(
            f,
            "ApplicationResponse(func=0x{:02X}, seq={}, flags={}, blocks={})",
            self.function,
            self.sequence,
            if flags.is_empty() {
                "none".to_string()
            } else {
                flags.join("|")
            },
            self.blocks.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Qualifier;

    #[test]
    fn test_parse_empty_response() {
        let response = ApplicationResponse::parse(&[0xC5, 0x81, 0x00, 0x00]).unwrap();
        assert_eq!(response.sequence, 5);
        assert!(response.first);
        assert!(response.final_fragment);
        assert!(!response.confirm_required);
        assert!(!response.unsolicited);
        assert!(response.blocks.is_empty());
        response.check_rejection().unwrap();
    }

    #[test]
    fn test_parse_analog_block() {
        // g30v2 (3 bytes each), range 0-1
        let apdu = [
            0xC0, 0x81, 0x00, 0x00, // header
            0x1E, 0x02, 0x00, 0x00, 0x01, // g30v2, q=0x00, 0..1
            0x01, 0x64, 0x00, // point 0: flags, 100
            0x01, 0xC8, 0x00, // point 1: flags, 200
        ];
        let response = ApplicationResponse::parse(&apdu).unwrap();
        assert_eq!(response.blocks.len(), 1);
        let block = &response.blocks[0];
        assert_eq!(block.header.group, 30);
        assert_eq!(block.header.count, 2);
        assert_eq!(block.data.len(), 6);
    }

    #[test]
    fn test_parse_echoed_crob() {
        let apdu = [
            0xC0, 0x81, 0x00, 0x00, // header
            0x0C, 0x01, 0x17, 0x01, // g12v1, q=0x17, count 1
            0x00, // index 0
            0x03, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, // CROB, status 0
        ];
        let response = ApplicationResponse::parse(&apdu).unwrap();
        assert_eq!(response.blocks.len(), 1);
        let block = &response.blocks[0];
        assert_eq!(block.header.qualifier, Qualifier::Uint8CountUint8Index);
        assert_eq!(block.data.len(), 12);
        assert_eq!(block.data[0], 0x00); // index prefix
        assert_eq!(block.data[11], 0x00); // status byte
    }

    #[test]
    fn test_short_response_rejected() {
        let err = ApplicationResponse::parse(&[0xC0, 0x81, 0x00]).unwrap_err();
        assert!(matches!(err, Dnp3Error::Protocol { .. }));
    }

    #[test]
    fn test_non_response_function_rejected() {
        let err = ApplicationResponse::parse(&[0xC0, 0x01, 0x00, 0x00]).unwrap_err();
        match err {
            Dnp3Error::Protocol { function_code, .. } => {
                assert_eq!(function_code, Some(0x01))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_iin_rejection_carries_context() {
        let response = ApplicationResponse::parse(&[0xC0, 0x81, 0x00, 0x02]).unwrap();
        let err = response.check_rejection().unwrap_err();
        match err {
            Dnp3Error::Protocol {
                function_code, iin, ..
            } => {
                assert_eq!(function_code, Some(0x81));
                assert_eq!(iin, Some((0x00, 0x02)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_block_keeps_earlier_blocks() {
        let apdu = [
            0xC0, 0x81, 0x00, 0x00, //
            0x01, 0x02, 0x00, 0x00, 0x00, // g1v2, range 0..0 (1 byte)
            0x81, // point data
            0x1E, 0x01, 0x00, 0x00, 0x01, // g30v1 claims 2 points (10 bytes)
            0x01, 0x02, // but only 2 bytes follow
        ];
        let response = ApplicationResponse::parse(&apdu).unwrap();
        assert_eq!(response.blocks.len(), 1);
        assert_eq!(response.blocks[0].header.group, 1);
    }

    #[test]
    fn test_unknown_size_block_kept_raw() {
        let apdu = [
            0xC0, 0x81, 0x00, 0x00, //
            0x6E, 0x01, 0x07, 0x02, // g110v1 (octet string), q=0x07, count 2
            0xAA, 0xBB, 0xCC,
        ];
        let response = ApplicationResponse::parse(&apdu).unwrap();
        assert_eq!(response.blocks.len(), 1);
        assert_eq!(response.blocks[0].header.group, 110);
        assert_eq!(response.blocks[0].data, vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_merge_fragments() {
        let frag1 = ApplicationResponse::parse(&[
            0x80, 0x81, 0x82, 0x00, // FIR only, restart + class 1 events
            0x01, 0x02, 0x00, 0x00, 0x00, 0x01,
        ])
        .unwrap();
        let frag2 = ApplicationResponse::parse(&[
            0x41, 0x81, 0x00, 0x00, // FIN, seq 1
            0x0A, 0x02, 0x00, 0x00, 0x00, 0x81,
        ])
        .unwrap();
        let merged = ApplicationResponse::merge(vec![frag1, frag2]).unwrap();
        assert!(merged.first && merged.final_fragment);
        assert_eq!(merged.blocks.len(), 2);
        assert_eq!(merged.sequence, 1);
        // IIN comes from the last fragment.
        assert!(!merged.iin.device_restart());
        assert!(ApplicationResponse::merge(vec![]).is_err());
    }
}
