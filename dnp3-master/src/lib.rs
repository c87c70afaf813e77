//! Master station coordinator for the DNP3 driver
//!
//! Connection lifecycle, per-request mutual exclusion, request/response
//! correlation with timeouts and retries, and the high-level poll and
//! control operations.

pub mod error;
pub mod master;
pub mod poll;

pub use error::{Dnp3Error, Dnp3Result};
pub use master::Master;
pub use poll::PollResult;
