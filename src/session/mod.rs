// Stream lifecycle
// Sequences setup, start and stop of one presentation session

use crate::bench::BenchSink;
use crate::buffer::{AllocationError, BufferStrategy, FrameBufferPool, FrameDimensions};
use crate::config::PresenterConfig;
use crate::decoder::{DecodeBridge, DecoderError};
use crate::render::{FixedRateTicker, RenderLoop, TickError};
use crate::surface::{HostContainer, PresentationSurface, RendererError, ViewportHandle};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to allocate frame buffers: {0}")]
    Allocation(#[from] AllocationError),
    #[error("Session setup failed: {0}")]
    Setup(String),
    #[error("Decoder failed: {0}")]
    DecoderFault(DecoderError),
    #[error("Present failed: {0}")]
    PresentError(RendererError),
    #[error("Session has not been set up")]
    NotSetup,
    #[error("Session is already running")]
    AlreadyRunning,
}

impl From<TickError> for SessionError {
    fn from(e: TickError) -> Self {
        match e {
            TickError::Decoder(e) => SessionError::DecoderFault(e),
            TickError::Present(e) => SessionError::PresentError(e),
        }
    }
}

enum SessionState {
    Idle,
    Ready(RenderLoop),
    Running(FixedRateTicker),
}

/// Owns the session-scoped resources between setup and stop
pub struct StreamLifecycleController {
    dimensions: FrameDimensions,
    strategy: BufferStrategy,
    decoder: Arc<dyn DecodeBridge>,
    sink: Arc<dyn BenchSink>,
    state: SessionState,
    viewport: Option<ViewportHandle>,
}

impl StreamLifecycleController {
    pub fn new(
        config: &PresenterConfig,
        decoder: Arc<dyn DecodeBridge>,
        sink: Arc<dyn BenchSink>,
    ) -> Self {
        Self {
            dimensions: config.frame_dimensions(),
            strategy: config.buffer_strategy,
            decoder,
            sink,
            state: SessionState::Idle,
            viewport: None,
        }
    }

    /// Allocate buffers, embed the display surface in `container` and prepare
    /// the render loop. Nothing created here survives a failure.
    pub fn setup(
        &mut self,
        container: Arc<dyn HostContainer>,
        target_fps: u32,
    ) -> Result<(), SessionError> {
        if matches!(self.state, SessionState::Running(_)) {
            return Err(SessionError::AlreadyRunning);
        }
        // Re-setup replaces the previous session; dropping it disposes the surface
        self.state = SessionState::Idle;
        self.viewport = None;

        if target_fps == 0 {
            return Err(SessionError::Setup("target fps must be at least 1".to_string()));
        }

        let color_mode = self.decoder.color_mode();
        if !color_mode.is_packed_32bit() {
            return Err(SessionError::Setup(format!(
                "Decoder color mode {:?} cannot be presented as packed BGRA",
                color_mode
            )));
        }

        let decoded = self.decoder.frame_dimensions();
        if decoded != self.dimensions {
            return Err(SessionError::Setup(format!(
                "Decoder produces {}x{} frames, session expects {}x{}",
                decoded.width, decoded.height, self.dimensions.width, self.dimensions.height
            )));
        }

        let pool = FrameBufferPool::allocate(self.dimensions, self.strategy)?;

        let mut surface = PresentationSurface::new(self.dimensions);
        surface
            .create(container.clone())
            .map_err(|e| SessionError::Setup(format!("Failed to create surface: {}", e)))?;
        surface.on_resize(container.size());

        if let Err(e) = surface.subscribe() {
            surface.dispose();
            return Err(SessionError::Setup(format!(
                "Failed to attach surface to container: {}",
                e
            )));
        }

        self.viewport = Some(surface.viewport().clone());
        self.state = SessionState::Ready(RenderLoop::new(
            pool,
            self.decoder.clone(),
            surface,
            self.sink.clone(),
            target_fps,
        ));

        log::info!(
            "Session set up: {}x{} @ {} fps, {:?}",
            self.dimensions.width,
            self.dimensions.height,
            target_fps,
            self.strategy
        );
        Ok(())
    }

    /// Begin ticking on the driver thread
    pub fn start(&mut self) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Idle => Err(SessionError::NotSetup),
            SessionState::Running(ticker) => {
                self.state = SessionState::Running(ticker);
                Err(SessionError::AlreadyRunning)
            }
            SessionState::Ready(render_loop) => {
                // A failed spawn drops the loop, which disposes the surface
                let ticker = FixedRateTicker::spawn(render_loop).map_err(|e| {
                    self.viewport = None;
                    SessionError::Setup(format!("Failed to spawn render thread: {}", e))
                })?;
                self.state = SessionState::Running(ticker);
                Ok(())
            }
        }
    }

    /// Halt the driver, then release the surface. Returns the fault the loop
    /// died with, if any. A session that never started is left untouched.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        let ticker = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Running(ticker) => ticker,
            other => {
                self.state = other;
                return Ok(());
            }
        };
        self.viewport = None;

        let Some(mut exit) = ticker.stop() else {
            return Err(SessionError::PresentError(RendererError::RenderError(
                "render thread panicked".to_string(),
            )));
        };
        exit.render_loop.surface_mut().dispose();

        match exit.fault {
            Some(fault) => Err(fault.into()),
            None => Ok(()),
        }
    }

    /// Tear the session down if the driver died on its own and report why
    pub fn poll(&mut self) -> Result<(), SessionError> {
        let exited = matches!(&self.state, SessionState::Running(ticker) if ticker.is_finished());
        if !exited {
            return Ok(());
        }
        log::warn!("Render loop exited, tearing down session");
        self.stop()
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, SessionState::Running(_))
    }

    pub fn is_set_up(&self) -> bool {
        !matches!(self.state, SessionState::Idle)
    }

    /// Viewport of the live surface, if set up
    pub fn viewport(&self) -> Option<&ViewportHandle> {
        self.viewport.as_ref()
    }
}
