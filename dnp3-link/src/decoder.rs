//! Frame decoder for a byte stream
//!
//! Pulls exactly one FT3 frame off a [`StreamAccessor`], buffering partial
//! reads and resynchronizing on the 0x05 0x64 start pattern. The caller's
//! deadline is re-checked between reads so a slow trickle of garbage cannot
//! stall a transaction past its response timeout.

use crate::error::{Dnp3Error, Dnp3Result};
use crate::frame::{find_frame_start, frame_size_from_length, LinkFrame, LinkLayer, HEADER_SIZE};
use bytes::{Buf, BytesMut};
use dnp3_transport::StreamAccessor;
use std::fmt::Write as _;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Render frame bytes as spaced uppercase hex for raw-frame logging.
pub fn hex_frame(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Stateful decoder owning the receive buffer for one connection
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(512),
        }
    }

    /// Discard any buffered bytes, as after reconnecting.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Read one complete frame, validating CRCs and addressing against
    /// `link`.
    ///
    /// # Errors
    /// - [`Dnp3Error::Timeout`] when the deadline passes before a full
    ///   frame arrives;
    /// - [`Dnp3Error::Crc`] / [`Dnp3Error::Frame`] from frame validation;
    /// - [`Dnp3Error::Communication`] when the stream ends or fails.
    pub async fn read_frame<S: StreamAccessor>(
        &mut self,
        stream: &mut S,
        link: &LinkLayer,
        deadline: Instant,
        log_raw: bool,
    ) -> Dnp3Result<LinkFrame> {
        loop {
            self.resync();

            if self.buffer.len() >= HEADER_SIZE {
                let frame_size = frame_size_from_length(self.buffer[2])?;
                if self.buffer.len() >= frame_size {
                    if log_raw {
                        debug!(
                            "RX: [{} bytes] {}",
                            frame_size,
                            hex_frame(&self.buffer[..frame_size])
                        );
                    }
                    let (frame, consumed) = link.parse_frame(&self.buffer[..frame_size])?;
                    self.buffer.advance(consumed);
                    trace!("received {}", frame);
                    return Ok(frame);
                }
            }

            self.fill(stream, deadline).await?;
        }
    }

    /// Drop garbage ahead of the next start pattern. When no pattern is in
    /// the buffer, keep only the last byte in case it is the first half of
    /// one.
    fn resync(&mut self) {
        match find_frame_start(&self.buffer) {
            Some(0) => {}
            Some(offset) => {
                trace!("discarding {} bytes before frame start", offset);
                self.buffer.advance(offset);
            }
            None => {
                if self.buffer.len() > 1 {
                    let drop = self.buffer.len() - 1;
                    self.buffer.advance(drop);
                }
            }
        }
    }

    async fn fill<S: StreamAccessor>(
        &mut self,
        stream: &mut S,
        deadline: Instant,
    ) -> Dnp3Result<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(Dnp3Error::Timeout {
                message: "response timeout while waiting for frame".to_string(),
                timeout_seconds: 0.0,
            });
        }

        stream.set_timeout(Some(remaining)).await?;
        let mut chunk = [0u8; 512];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Dnp3Error::Communication {
                message: "connection closed by remote".to_string(),
                host: stream.peer_host().to_string(),
                port: stream.peer_port(),
            });
        }
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// In-memory stream feeding scripted chunks to the decoder.
    struct ScriptedStream {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ScriptedStream {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks: chunks.into(),
            }
        }
    }

    #[async_trait]
    impl StreamAccessor for ScriptedStream {
        async fn set_timeout(&mut self, _timeout: Option<Duration>) -> Dnp3Result<()> {
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> Dnp3Result<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }

        async fn write(&mut self, buf: &[u8]) -> Dnp3Result<usize> {
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Dnp3Result<()> {
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.chunks.is_empty()
        }

        async fn close(&mut self) -> Dnp3Result<()> {
            Ok(())
        }

        fn peer_host(&self) -> &str {
            "test"
        }

        fn peer_port(&self) -> u16 {
            20000
        }
    }

    fn outstation_frame(user_data: &[u8]) -> Vec<u8> {
        // Built from the outstation's perspective (master=10, outstation=1
        // locally means dst=1, src=10 on the wire).
        LinkLayer::new(10, 1)
            .unwrap()
            .build_frame(user_data, false)
            .unwrap()
    }

    fn master_link() -> LinkLayer {
        // The master under test is address 1 talking to outstation 10, so
        // frames built by `outstation_frame` are addressed to it.
        LinkLayer::new(1, 10).unwrap()
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(1)
    }

    #[tokio::test]
    async fn test_single_frame_in_one_chunk() {
        let frame = outstation_frame(&[0xC0, 0x81, 0x00, 0x00]);
        let mut stream = ScriptedStream::new(vec![frame]);
        let mut decoder = FrameDecoder::new();

        let parsed = decoder
            .read_frame(&mut stream, &master_link(), deadline(), false)
            .await
            .unwrap();
        assert_eq!(parsed.user_data(), &[0xC0, 0x81, 0x00, 0x00]);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = outstation_frame(&[0x01, 0x02, 0x03]);
        let (a, b) = frame.split_at(7);
        let mut stream = ScriptedStream::new(vec![a.to_vec(), b.to_vec()]);
        let mut decoder = FrameDecoder::new();

        let parsed = decoder
            .read_frame(&mut stream, &master_link(), deadline(), false)
            .await
            .unwrap();
        assert_eq!(parsed.user_data(), &[0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn test_garbage_before_frame_is_skipped() {
        let mut data = vec![0xFF, 0x00, 0x05];
        data.extend_from_slice(&outstation_frame(&[0x42]));
        let mut stream = ScriptedStream::new(vec![data]);
        let mut decoder = FrameDecoder::new();

        let parsed = decoder
            .read_frame(&mut stream, &master_link(), deadline(), false)
            .await
            .unwrap();
        assert_eq!(parsed.user_data(), &[0x42]);
    }

    #[tokio::test]
    async fn test_corrupted_block_crc_surfaces() {
        let mut frame = outstation_frame(&[0x10, 0x20, 0x30]);
        let last = frame.len() - 3;
        frame[last] ^= 0x01; // flip a bit inside the user data block
        let mut stream = ScriptedStream::new(vec![frame]);
        let mut decoder = FrameDecoder::new();

        let err = decoder
            .read_frame(&mut stream, &master_link(), deadline(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Dnp3Error::Crc { .. }));
    }

    #[tokio::test]
    async fn test_eof_is_communication_error() {
        let mut stream = ScriptedStream::new(vec![]);
        let mut decoder = FrameDecoder::new();

        let err = decoder
            .read_frame(&mut stream, &master_link(), deadline(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Dnp3Error::Communication { .. }));
    }

    #[tokio::test]
    async fn test_two_frames_back_to_back() {
        let mut data = outstation_frame(&[0x01]);
        data.extend_from_slice(&outstation_frame(&[0x02]));
        let mut stream = ScriptedStream::new(vec![data]);
        let mut decoder = FrameDecoder::new();
        let link = master_link();

        let first = decoder
            .read_frame(&mut stream, &link, deadline(), false)
            .await
            .unwrap();
        let second = decoder
            .read_frame(&mut stream, &link, deadline(), false)
            .await
            .unwrap();
        assert_eq!(first.user_data(), &[0x01]);
        assert_eq!(second.user_data(), &[0x02]);
    }

    #[test]
    fn test_hex_frame() {
        assert_eq!(hex_frame(&[0x05, 0x64, 0xFF]), "05 64 FF");
        assert_eq!(hex_frame(&[]), "");
    }
}
