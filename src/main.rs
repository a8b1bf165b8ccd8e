use anyhow::Context;
use clap::Parser;
use frame_presenter::cli::Cli;
use frame_presenter::decoder::{LatestFrameSlot, TestPatternProducer};
use frame_presenter::input::{InputLogger, ListenerKind, ListenerRegistration};
use frame_presenter::window::ViewerApp;
use frame_presenter::LogBenchSink;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use winit::event_loop::EventLoop;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve().context("Invalid configuration")?;
    log::info!(
        "Presenting {}x{} at {} fps ({:?})",
        config.width,
        config.height,
        config.target_fps,
        config.buffer_strategy
    );

    let slot = Arc::new(LatestFrameSlot::new(config.frame_dimensions()));
    let mut producer = TestPatternProducer::spawn(slot.clone(), config.source_fps)
        .context("Failed to start test pattern")?;

    let logger = Arc::new(InputLogger);
    let listeners = [
        ListenerKind::Pointer,
        ListenerKind::Motion,
        ListenerKind::Wheel,
        ListenerKind::Keyboard,
    ]
    .into_iter()
    .map(|kind| ListenerRegistration::new(kind, logger.clone()))
    .collect();

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut app = ViewerApp::new(config, slot.clone(), Arc::new(LogBenchSink), listeners);
    event_loop.run_app(&mut app).context("Event loop failed")?;

    let result = app.finish();
    producer.stop();
    log::info!(
        "Frames published: {}, dropped before presentation: {}",
        slot.published_frames(),
        slot.dropped_frames()
    );
    result.context("Session failed")?;
    Ok(())
}
