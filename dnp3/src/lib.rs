//! DNP3 (IEEE 1815) master station driver
//!
//! A master connects to one outstation over TCP, reads static and event
//! data (binary inputs, analog inputs, counters, output status), and
//! issues control commands: direct operate, select-before-operate, and
//! pulsed relay operations.
//!
//! # Architecture
//!
//! This library is organized as a workspace with one crate per layer:
//!
//! - `dnp3-core`: configuration, error taxonomy
//! - `dnp3-transport`: byte-stream abstraction and TCP implementation
//! - `dnp3-objects`: object catalog and typed point codecs
//! - `dnp3-link`: CRC-16, FT3 framing, transport function
//! - `dnp3-app`: APDU formatting, IIN, object headers
//! - `dnp3-master`: the master coordinator
//!
//! # Usage
//!
//! ```no_run
//! use dnp3::{Dnp3Config, Master};
//!
//! # async fn run() -> dnp3::Dnp3Result<()> {
//! let config = Dnp3Config {
//!     host: "192.168.1.100".to_string(),
//!     port: 20000,
//!     ..Dnp3Config::default()
//! };
//! let master = Master::new(config)?;
//!
//! master
//!     .connect(|m| async move {
//!         let poll = m.integrity_poll().await;
//!         for point in &poll.binary_inputs {
//!             println!("BI {} = {}", point.index, point.value);
//!         }
//!         m.direct_operate_binary(0, true).await?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub use dnp3_core::{Dnp3Config, Dnp3Error, Dnp3Result, LogLevel};
pub use dnp3_master::{Master, PollResult};

// Re-export the layer crates for callers that work below the master API.
pub mod app {
    pub use dnp3_app::*;
}

pub mod link {
    pub use dnp3_link::*;
}

pub mod objects {
    pub use dnp3_objects::*;
}

pub mod transport {
    pub use dnp3_transport::*;
}
