// Decode bridge
// Narrow pull interface between the software decoder and the render loop
//
// The decoder runs in its own concurrency domain. The render loop only ever
// asks "copy the newest completed frame into this buffer", once per tick.

mod latest;
mod pattern;

pub use latest::LatestFrameSlot;
pub use pattern::TestPatternProducer;

use crate::buffer::FrameDimensions;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    #[error("Decoder fault: {0}")]
    Fault(String),
    #[error("Buffer capacity mismatch: expected {expected} bytes, got {actual}")]
    CapacityMismatch { expected: usize, actual: usize },
}

/// Pixel format the decoder is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Native-endian `0x00RRGGBB` cells; BGRX bytes on little-endian hosts
    Packed0Rgb,
    /// Planar YUV 4:2:0, not presentable by the raster path
    Yuv420,
}

impl ColorMode {
    /// Whether frames in this mode can be uploaded as packed 32-bit BGRA
    pub fn is_packed_32bit(&self) -> bool {
        matches!(self, ColorMode::Packed0Rgb)
    }
}

/// Result of one pull
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The buffer now holds a complete new frame
    Filled,
    /// Nothing completed since the last pull; the buffer was not touched
    NoNewFrame,
}

/// Opaque decoder as seen by the render loop
pub trait DecodeBridge: Send + Sync {
    /// Packed format this decoder produces
    fn color_mode(&self) -> ColorMode;

    /// Resolution negotiated with the stream
    fn frame_dimensions(&self) -> FrameDimensions;

    /// Copy the most recently completed frame into `buffer`.
    ///
    /// `buffer.len()` must equal the negotiated frame size in bytes. Never
    /// hands back a partially written frame and never blocks beyond a short
    /// internal lock.
    fn fill_frame(&self, buffer: &mut [u8]) -> Result<FrameStatus, DecoderError>;

    /// Same as [`fill_frame`](Self::fill_frame) into `u32` pixel cells
    fn fill_frame_pixels(&self, buffer: &mut [u32]) -> Result<FrameStatus, DecoderError> {
        self.fill_frame(bytemuck::cast_slice_mut(buffer))
    }
}
