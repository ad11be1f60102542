//! Video Frame Library for the Drowsiness Monitor
//!
//! Provides the RGB frame type that flows through the monitoring pipeline:
//! - Fixed 3-channel, 8-bit RGB layout
//! - Bounds-checked cropping and nearest-neighbour resizing
//! - JPEG decode/encode for the streaming transport

pub mod codec;
pub mod frame;

pub use codec::{decode_jpeg, encode_jpeg};
pub use frame::VideoFrame;

use thiserror::Error;

/// Frame error types
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid dimensions: {width}x{height} does not match buffer of {len} bytes")]
    Dimensions { width: u32, height: u32, len: usize },

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Encode failed: {0}")]
    Encode(String),
}
