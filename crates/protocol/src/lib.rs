//! Shared wire-protocol crate for the Fishy Business server.
//!
//! This crate contains:
//! - Binary reading/writing utilities (big-endian)
//! - The outbound binary frame set used by the ocean mode
//! - JSON message types for both game modes
//! - Protocol error types

mod binary;
mod error;
pub mod frames;
pub mod messages;

pub use binary::{FrameReader, FrameWriter};
pub use error::ProtocolError;
