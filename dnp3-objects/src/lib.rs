//! Object catalog for the DNP3 master driver
//!
//! This crate provides group/variation identity, per-variation object
//! sizes, and the typed point codecs for the data types this driver
//! supports: binary inputs and outputs, analog inputs and outputs,
//! counters, the control relay output block, and the analog output
//! command block.

pub mod analog;
pub mod binary;
pub mod counter;
pub mod error;
pub mod groups;

pub use analog::{
    analog_flags, parse_analog_inputs, parse_analog_outputs, AnalogCommand, AnalogInput,
    AnalogOutput,
};
pub use binary::{
    binary_flags, control_code, parse_binary_inputs, parse_binary_outputs, BinaryInput,
    BinaryOutput, Crob, CROB_SIZE,
};
pub use counter::{counter_flags, parse_counters, Counter};
pub use error::{Dnp3Error, Dnp3Result};
pub use groups::{class_variation, group, group_name, is_bit_packed, object_size};
