//! Poll results and typed point extraction
//!
//! Converts the object blocks of a parsed response into typed point lists.
//! Event groups (2, 11, 22, 32) decode through their static counterparts;
//! blocks the driver has no typed decoder for are kept raw so callers can
//! still inspect them.

use crate::error::{Dnp3Error, Dnp3Result};
use dnp3_app::{ApplicationResponse, Iin, ObjectBlock};
use dnp3_objects::{
    group, object_size, parse_analog_inputs, parse_analog_outputs, parse_binary_inputs,
    parse_binary_outputs, parse_counters, AnalogInput, AnalogOutput, BinaryInput, BinaryOutput,
    Counter,
};
use tracing::warn;

/// Aggregated outcome of a polling operation
#[derive(Debug, Clone, Default)]
pub struct PollResult {
    pub success: bool,
    pub iin: Option<Iin>,
    pub binary_inputs: Vec<BinaryInput>,
    pub binary_outputs: Vec<BinaryOutput>,
    pub analog_inputs: Vec<AnalogInput>,
    pub analog_outputs: Vec<AnalogOutput>,
    pub counters: Vec<Counter>,
    /// Blocks without a typed decoder, kept for inspection.
    pub raw_blocks: Vec<ObjectBlock>,
    pub error: Option<String>,
}

impl PollResult {
    /// A failed poll carrying the error text.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Extract typed points from a parsed response.
    ///
    /// # Errors
    /// Object errors from point decoding (malformed data for a supported
    /// variation). Unsupported groups do not fail; they land in
    /// `raw_blocks`.
    pub fn from_response(response: &ApplicationResponse) -> Dnp3Result<Self> {
        let mut result = Self {
            success: true,
            iin: Some(response.iin),
            ..Self::default()
        };
        for block in &response.blocks {
            if !result.ingest(block)? {
                warn!(
                    "no typed decoder for g{}v{}, keeping block raw",
                    block.header.group, block.header.variation
                );
                result.raw_blocks.push(block.clone());
            }
        }
        Ok(result)
    }

    /// Dispatch one block into the typed lists. Returns false when the
    /// group/variation has no typed decoder.
    fn ingest(&mut self, block: &ObjectBlock) -> Dnp3Result<bool> {
        let header = &block.header;
        if header.count == 0 {
            return Ok(true);
        }

        let prefix = header.qualifier.index_prefix_size();
        if prefix > 0 {
            return self.ingest_indexed(block, prefix);
        }

        let count = header.count as usize;
        let start = header.range_start;
        let data = &block.data;

        match (header.group, header.variation) {
            (group::BINARY_INPUT, v @ (1 | 2)) => {
                self.binary_inputs
                    .extend(parse_binary_inputs(data, start, count, v)?);
            }
            (group::BINARY_OUTPUT, v @ (1 | 2)) => {
                self.binary_outputs
                    .extend(parse_binary_outputs(data, start, count, v)?);
            }
            (group::COUNTER, v @ 1..=8) => {
                self.counters.extend(parse_counters(data, start, count, v)?);
            }
            (group::ANALOG_INPUT, v @ 1..=6) => {
                self.analog_inputs
                    .extend(parse_analog_inputs(data, start, count, v)?);
            }
            (group::ANALOG_OUTPUT_STATUS, v @ 1..=4) => {
                self.analog_outputs
                    .extend(parse_analog_outputs(data, start, count, v)?);
            }
            (g, v) if event_mapping(g, v).is_some() => {
                let stride = match object_size(g, v) {
                    Some(size) => size,
                    None => return Ok(false),
                };
                let mut offset = 0;
                for i in 0..count {
                    if offset + stride > data.len() {
                        break;
                    }
                    self.push_event(g, v, &data[offset..offset + stride], start + i as u16)?;
                    offset += stride;
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn ingest_indexed(&mut self, block: &ObjectBlock, prefix: usize) -> Dnp3Result<bool> {
        let header = &block.header;
        let obj_size = match object_size(header.group, header.variation) {
            Some(size) => size,
            None => return Ok(false),
        };
        let stride = prefix + obj_size;
        let data = &block.data;

        let mut offset = 0;
        for _ in 0..header.count {
            if offset + stride > data.len() {
                warn!(
                    "indexed object run ends early at offset {} of {}",
                    offset,
                    data.len()
                );
                break;
            }
            let index = match prefix {
                1 => data[offset] as u16,
                _ => u16::from_le_bytes([data[offset], data[offset + 1]]),
            };
            let object = &data[offset + prefix..offset + stride];
            if !self.push_point(header.group, header.variation, object, index)? {
                return Ok(false);
            }
            offset += stride;
        }
        Ok(true)
    }

    fn push_point(
        &mut self,
        group_num: u8,
        variation: u8,
        data: &[u8],
        index: u16,
    ) -> Dnp3Result<bool> {
        match group_num {
            group::BINARY_INPUT => {
                self.binary_inputs
                    .push(BinaryInput::decode(data, index, variation)?);
            }
            group::BINARY_OUTPUT => {
                self.binary_outputs
                    .push(BinaryOutput::decode(data, index, variation)?);
            }
            group::COUNTER => {
                self.counters.push(Counter::decode(data, index, variation)?);
            }
            group::ANALOG_INPUT => {
                self.analog_inputs
                    .push(AnalogInput::decode(data, index, variation)?);
            }
            group::ANALOG_OUTPUT_STATUS => {
                self.analog_outputs
                    .push(AnalogOutput::decode(data, index, variation)?);
            }
            _ => {
                if event_mapping(group_num, variation).is_some() {
                    self.push_event(group_num, variation, data, index)?;
                } else {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn push_event(
        &mut self,
        group_num: u8,
        variation: u8,
        data: &[u8],
        index: u16,
    ) -> Dnp3Result<()> {
        let (static_group, static_variation) = event_mapping(group_num, variation)
            .ok_or_else(|| {
                Dnp3Error::object("no event mapping", group_num, variation)
            })?;
        match static_group {
            group::BINARY_INPUT => self
                .binary_inputs
                .push(BinaryInput::decode(data, index, static_variation)?),
            group::BINARY_OUTPUT => self
                .binary_outputs
                .push(BinaryOutput::decode(data, index, static_variation)?),
            group::COUNTER => self
                .counters
                .push(Counter::decode(data, index, static_variation)?),
            _ => self
                .analog_inputs
                .push(AnalogInput::decode(data, index, static_variation)?),
        }
        Ok(())
    }
}

/// Map an event group/variation onto the static decoder that reads its
/// leading flags + value bytes (trailing timestamps are ignored).
fn event_mapping(group_num: u8, variation: u8) -> Option<(u8, u8)> {
    match (group_num, variation) {
        (group::BINARY_INPUT_EVENT, 1..=3) => Some((group::BINARY_INPUT, 2)),
        (group::BINARY_OUTPUT_EVENT, 1 | 2) => Some((group::BINARY_OUTPUT, 2)),
        (group::COUNTER_EVENT, 1) => Some((group::COUNTER, 1)),
        (group::COUNTER_EVENT, 2) => Some((group::COUNTER, 2)),
        (group::COUNTER_EVENT, 5) => Some((group::COUNTER, 1)),
        (group::COUNTER_EVENT, 6) => Some((group::COUNTER, 2)),
        (group::ANALOG_INPUT_EVENT, 1 | 3) => Some((group::ANALOG_INPUT, 1)),
        (group::ANALOG_INPUT_EVENT, 2 | 4) => Some((group::ANALOG_INPUT, 2)),
        (group::ANALOG_INPUT_EVENT, 5 | 7) => Some((group::ANALOG_INPUT, 5)),
        (group::ANALOG_INPUT_EVENT, 6 | 8) => Some((group::ANALOG_INPUT, 6)),
        _ => None,
    }
}
