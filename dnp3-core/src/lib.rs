//! Core types and utilities for the DNP3 master driver
//!
//! This crate provides the configuration type, error handling, and shared
//! constants used throughout the DNP3 implementation.

pub mod config;
pub mod error;

pub use config::{Dnp3Config, LogLevel, MAX_APDU_LIMIT, MAX_FRAME_USER_DATA, MAX_VALID_ADDRESS};
pub use error::{Dnp3Error, Dnp3Result};
