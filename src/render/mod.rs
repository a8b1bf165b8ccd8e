// Render loop
// One tick: pull the newest frame, present it, account the present time

mod ticker;

pub use ticker::{FixedRateTicker, TickerExit};

use crate::bench::{BenchSink, RenderBench};
use crate::buffer::{BufferStrategy, FrameBufferPool};
use crate::decoder::{DecodeBridge, DecoderError, FrameStatus};
use crate::surface::{PresentationSurface, RendererError};
use std::sync::Arc;
use thiserror::Error;

/// Fatal tick failures; the session ends on the first one
#[derive(Error, Debug)]
pub enum TickError {
    #[error(transparent)]
    Decoder(#[from] DecoderError),
    #[error(transparent)]
    Present(#[from] RendererError),
}

type FillFn = fn(&dyn DecodeBridge, &mut FrameBufferPool) -> Result<FrameStatus, DecoderError>;

fn fill_pixel_cells(
    decoder: &dyn DecodeBridge,
    pool: &mut FrameBufferPool,
) -> Result<FrameStatus, DecoderError> {
    decoder.fill_frame_pixels(pool.pixel_cells_mut())
}

fn fill_linear(
    decoder: &dyn DecodeBridge,
    pool: &mut FrameBufferPool,
) -> Result<FrameStatus, DecoderError> {
    decoder.fill_frame(pool.linear_bytes_mut())
}

fn fill_fn_for(strategy: BufferStrategy) -> FillFn {
    match strategy {
        BufferStrategy::Copying => fill_pixel_cells,
        BufferStrategy::DirectTransfer => fill_linear,
    }
}

/// Per-session render state, driven one tick at a time
pub struct RenderLoop {
    pool: FrameBufferPool,
    decoder: Arc<dyn DecodeBridge>,
    surface: PresentationSurface,
    bench: RenderBench,
    sink: Arc<dyn BenchSink>,
    fill: FillFn,
    target_fps: u32,
}

impl RenderLoop {
    pub fn new(
        pool: FrameBufferPool,
        decoder: Arc<dyn DecodeBridge>,
        surface: PresentationSurface,
        sink: Arc<dyn BenchSink>,
        target_fps: u32,
    ) -> Self {
        let fill = fill_fn_for(pool.strategy());
        Self {
            pool,
            decoder,
            surface,
            bench: RenderBench::new(),
            sink,
            fill,
            target_fps,
        }
    }

    pub fn tick(&mut self) -> Result<FrameStatus, TickError> {
        let status = (self.fill)(self.decoder.as_ref(), &mut self.pool)?;

        self.bench.start_timer();
        let snapshot = self.surface.snapshot();
        let presented = self.surface.present(
            self.pool.active_bytes(),
            snapshot,
            status == FrameStatus::Filled,
        );
        self.bench.stop_timer();
        presented?;

        if let Some(report) = self.bench.report_if_window_full(self.target_fps) {
            self.sink.report(&report);
        }
        Ok(status)
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn pool(&self) -> &FrameBufferPool {
        &self.pool
    }

    pub fn bench(&self) -> &RenderBench {
        &self.bench
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut PresentationSurface {
        &mut self.surface
    }
}
