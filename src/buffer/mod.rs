// Frame buffer pool
// Pre-allocated storage the render loop decodes into every tick

use serde::{Deserialize, Serialize};
use std::collections::TryReserveError;
use thiserror::Error;

/// Packed 32-bit color: one `u32` cell or four bytes per pixel
pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Frame too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
    #[error("Failed to reserve {bytes} bytes: {source}")]
    OutOfMemory {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },
}

/// Decode resolution negotiated for the stream, fixed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDimensions {
    pub width: u32,
    pub height: u32,
}

impl FrameDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixel cells, or `None` on overflow
    pub fn pixel_count(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Size of one packed frame in bytes, or `None` on overflow
    pub fn byte_len(&self) -> Option<usize> {
        self.pixel_count()?.checked_mul(BYTES_PER_PIXEL)
    }
}

/// How decoded pixels reach the GPU upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferStrategy {
    /// Decoder writes `u32` pixel cells which are reinterpreted as bytes for upload
    Copying,
    /// Decoder writes straight into the linear byte buffer handed to the upload call
    #[default]
    DirectTransfer,
}

/// Owns both frame representations for one session.
///
/// Both buffers are reserved up front and reused for every frame. Viewport
/// changes never touch them; only a new session with a new decode
/// resolution does.
pub struct FrameBufferPool {
    dimensions: FrameDimensions,
    strategy: BufferStrategy,
    pixels: Vec<u32>,
    linear: Vec<u8>,
}

impl FrameBufferPool {
    pub fn allocate(
        dimensions: FrameDimensions,
        strategy: BufferStrategy,
    ) -> Result<Self, AllocationError> {
        let FrameDimensions { width, height } = dimensions;
        if width == 0 || height == 0 {
            return Err(AllocationError::InvalidDimensions { width, height });
        }

        let (cells, bytes) = match (dimensions.pixel_count(), dimensions.byte_len()) {
            (Some(cells), Some(bytes)) => (cells, bytes),
            _ => return Err(AllocationError::TooLarge { width, height }),
        };

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(cells)
            .map_err(|source| AllocationError::OutOfMemory { bytes, source })?;
        pixels.resize(cells, 0);

        let mut linear = Vec::new();
        linear
            .try_reserve_exact(bytes)
            .map_err(|source| AllocationError::OutOfMemory { bytes, source })?;
        linear.resize(bytes, 0);

        log::debug!(
            "Frame buffers allocated: {}x{}, {} bytes each, strategy {:?}",
            width,
            height,
            bytes,
            strategy
        );

        Ok(Self {
            dimensions,
            strategy,
            pixels,
            linear,
        })
    }

    pub fn dimensions(&self) -> FrameDimensions {
        self.dimensions
    }

    pub fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    /// Size of either representation in bytes
    pub fn byte_len(&self) -> usize {
        self.linear.len()
    }

    pub fn pixel_cells(&self) -> &[u32] {
        &self.pixels
    }

    pub fn linear_bytes(&self) -> &[u8] {
        &self.linear
    }

    pub fn pixel_cells_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn linear_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.linear
    }

    /// The active representation as packed bytes for the GPU upload
    pub fn active_bytes(&self) -> &[u8] {
        match self.strategy {
            BufferStrategy::Copying => bytemuck::cast_slice(&self.pixels),
            BufferStrategy::DirectTransfer => &self.linear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_sizes() {
        for (w, h) in [(1, 1), (640, 480), (1280, 720), (1920, 1080), (3, 7)] {
            let pool =
                FrameBufferPool::allocate(FrameDimensions::new(w, h), BufferStrategy::Copying)
                    .unwrap();
            assert_eq!(pool.pixel_cells().len(), (w * h) as usize);
            assert_eq!(pool.linear_bytes().len(), (4 * w * h) as usize);
            assert_eq!(pool.byte_len(), (4 * w * h) as usize);
        }
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let result =
            FrameBufferPool::allocate(FrameDimensions::new(0, 720), BufferStrategy::Copying);
        assert!(matches!(
            result,
            Err(AllocationError::InvalidDimensions { width: 0, height: 720 })
        ));
    }

    #[test]
    fn test_unreservable_size_fails() {
        // u32::MAX squared overflows usize on 32-bit and exceeds isize::MAX bytes on 64-bit
        let result = FrameBufferPool::allocate(
            FrameDimensions::new(u32::MAX, u32::MAX),
            BufferStrategy::DirectTransfer,
        );
        assert!(matches!(
            result,
            Err(AllocationError::TooLarge { .. }) | Err(AllocationError::OutOfMemory { .. })
        ));
    }

    #[test]
    fn test_active_bytes_follow_strategy() {
        let mut copying =
            FrameBufferPool::allocate(FrameDimensions::new(2, 2), BufferStrategy::Copying)
                .unwrap();
        copying.linear_bytes_mut().fill(0xFF);
        assert_eq!(copying.active_bytes(), &[0u8; 16]);

        let mut direct =
            FrameBufferPool::allocate(FrameDimensions::new(2, 2), BufferStrategy::DirectTransfer)
                .unwrap();
        direct.linear_bytes_mut().fill(0xFF);
        assert_eq!(direct.active_bytes(), &[0xFFu8; 16]);
    }

    #[test]
    fn test_pixel_cells_read_as_bgra_bytes() {
        let mut pool =
            FrameBufferPool::allocate(FrameDimensions::new(1, 1), BufferStrategy::Copying)
                .unwrap();
        pool.pixel_cells_mut()[0] = 0x00_11_22_33;
        assert_eq!(pool.active_bytes(), &0x00_11_22_33u32.to_ne_bytes());
    }

    #[test]
    fn test_strategy_serde_names() {
        let json = serde_json::to_string(&BufferStrategy::DirectTransfer).unwrap();
        assert_eq!(json, "\"direct-transfer\"");
        let parsed: BufferStrategy = serde_json::from_str("\"copying\"").unwrap();
        assert_eq!(parsed, BufferStrategy::Copying);
    }
}
