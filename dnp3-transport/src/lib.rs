//! Byte-stream transport layer for the DNP3 master driver
//!
//! This crate provides the stream abstraction the protocol stack is written
//! against, and its TCP implementation. The master only ever sees
//! [`StreamAccessor`] / [`TransportLayer`], which keeps the coordinator
//! testable against in-memory streams.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Dnp3Error, Dnp3Result};
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
