// Frame Presenter - Fixed-rate presentation of software-decoded video frames
// Main library entry point

pub mod bench;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod input;
pub mod render;
pub mod session;
pub mod surface;
pub mod window;

pub use bench::{BenchReport, BenchSink, LogBenchSink, RenderBench};
pub use buffer::{AllocationError, BufferStrategy, FrameBufferPool, FrameDimensions};
pub use config::{ConfigError, PresenterConfig};
pub use decoder::{ColorMode, DecodeBridge, DecoderError, FrameStatus, LatestFrameSlot};
pub use render::{FixedRateTicker, RenderLoop, TickError};
pub use session::{SessionError, StreamLifecycleController};
pub use surface::{
    HostContainer, PixelZoom, PresentationSurface, RasterTarget, RendererError, SurfaceSize,
    SurfaceState, ViewportHandle,
};
