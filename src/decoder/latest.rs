// Latest-frame slot
// Single-slot hand-off: the producer overwrites, the render loop pulls at most once

use super::{ColorMode, DecodeBridge, DecoderError, FrameStatus};
use crate::buffer::FrameDimensions;
use parking_lot::Mutex;

struct SlotState {
    frame: Vec<u8>,
    /// Bumped on every publish
    sequence: u64,
    /// Sequence of the last frame handed to the consumer
    pulled: u64,
    dropped: u64,
    fault: Option<String>,
}

/// Holds the newest completed frame from a decoder thread.
///
/// Frames are published whole under the lock, so a pull either sees the
/// previous complete frame or the next one. There is no queue: a frame that
/// is overwritten before anyone pulls it is counted as dropped.
pub struct LatestFrameSlot {
    dimensions: FrameDimensions,
    color_mode: ColorMode,
    state: Mutex<SlotState>,
}

impl LatestFrameSlot {
    pub fn new(dimensions: FrameDimensions) -> Self {
        Self::with_color_mode(dimensions, ColorMode::Packed0Rgb)
    }

    pub fn with_color_mode(dimensions: FrameDimensions, color_mode: ColorMode) -> Self {
        let len = dimensions.byte_len().unwrap_or(0);
        Self {
            dimensions,
            color_mode,
            state: Mutex::new(SlotState {
                frame: vec![0; len],
                sequence: 0,
                pulled: 0,
                dropped: 0,
                fault: None,
            }),
        }
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    /// Publish a complete frame, replacing any frame not yet pulled
    pub fn publish(&self, frame: &[u8]) -> Result<(), DecoderError> {
        self.publish_with(|dst| {
            if dst.len() == frame.len() {
                dst.copy_from_slice(frame);
                Ok(())
            } else {
                Err(DecoderError::CapacityMismatch {
                    expected: dst.len(),
                    actual: frame.len(),
                })
            }
        })
    }

    /// Write the next frame in place; `write` sees the whole frame buffer
    pub fn publish_with<F>(&self, write: F) -> Result<(), DecoderError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), DecoderError>,
    {
        let mut state = self.state.lock();
        if let Some(reason) = &state.fault {
            return Err(DecoderError::Fault(reason.clone()));
        }

        if let Err(e) = write(&mut state.frame) {
            // A pending frame may be half overwritten now
            if state.sequence != state.pulled {
                state.dropped += 1;
            }
            state.pulled = state.sequence;
            return Err(e);
        }

        if state.sequence != state.pulled {
            state.dropped += 1;
        }
        state.sequence += 1;
        Ok(())
    }

    /// Latch an irrecoverable decoder failure; every later pull reports it
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("Decoder failed: {}", reason);
        self.state.lock().fault = Some(reason);
    }

    /// Frames overwritten before the render loop pulled them
    pub fn dropped_frames(&self) -> u64 {
        self.state.lock().dropped
    }

    /// Frames published so far
    pub fn published_frames(&self) -> u64 {
        self.state.lock().sequence
    }
}

impl DecodeBridge for LatestFrameSlot {
    fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    fn frame_dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    fn fill_frame(&self, buffer: &mut [u8]) -> Result<FrameStatus, DecoderError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.fault {
            return Err(DecoderError::Fault(reason.clone()));
        }

        if buffer.len() != state.frame.len() {
            return Err(DecoderError::CapacityMismatch {
                expected: state.frame.len(),
                actual: buffer.len(),
            });
        }

        if state.sequence == state.pulled {
            return Ok(FrameStatus::NoNewFrame);
        }

        buffer.copy_from_slice(&state.frame);
        state.pulled = state.sequence;
        Ok(FrameStatus::Filled)
    }
}
