// Fixed-rate driver
// Owns the render loop on a dedicated thread and ticks it at the target rate

use super::{RenderLoop, TickError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What the driver thread hands back when it ends
pub struct TickerExit {
    pub render_loop: RenderLoop,
    /// Set when the loop died on a fatal tick error; the surface is already disposed
    pub fault: Option<TickError>,
    pub ticks: u64,
}

pub struct FixedRateTicker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<TickerExit>>,
}

impl FixedRateTicker {
    pub fn spawn(render_loop: RenderLoop) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let fps = render_loop.target_fps().max(1);
        let interval = Duration::from_nanos(1_000_000_000 / fps as u64);

        let handle = std::thread::Builder::new()
            .name("render-loop".to_string())
            .spawn(move || run(render_loop, interval, stop_rx))?;

        log::info!("Render loop started at {} fps", fps);
        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    /// True once the driver thread has exited on its own
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Wake the driver, wait for the in-flight tick, and take the loop back.
    /// `None` if the driver thread panicked.
    pub fn stop(mut self) -> Option<TickerExit> {
        let _ = self.stop_tx.try_send(());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(exit) => {
                log::info!("Render loop stopped after {} ticks", exit.ticks);
                Some(exit)
            }
            Err(_) => {
                log::error!("Render loop thread panicked");
                None
            }
        }
    }
}

impl Drop for FixedRateTicker {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(mut render_loop: RenderLoop, interval: Duration, stop_rx: Receiver<()>) -> TickerExit {
    let mut ticks = 0u64;
    let mut deadline = Instant::now();

    loop {
        if let Err(e) = render_loop.tick() {
            log::error!("Render loop failed after {} ticks: {}", ticks, e);
            render_loop.surface_mut().dispose();
            return TickerExit {
                render_loop,
                fault: Some(e),
                ticks,
            };
        }
        ticks += 1;

        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            // Behind schedule: skip the missed slots instead of catching up
            deadline = now;
        }

        match stop_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }

    TickerExit {
        render_loop,
        fault: None,
        ticks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{BufferStrategy, FrameBufferPool, FrameDimensions};
    use crate::decoder::{DecoderError, LatestFrameSlot};
    use crate::render::testing::RecordingSink;
    use crate::surface::testing::MockContainer;
    use crate::surface::{PresentationSurface, SurfaceState};
    use std::sync::Arc;

    fn spawn_loop(fps: u32) -> (Arc<MockContainer>, Arc<LatestFrameSlot>, FixedRateTicker) {
        let dims = FrameDimensions::new(4, 4);
        let container = Arc::new(MockContainer::new(4, 4));
        let slot = Arc::new(LatestFrameSlot::new(dims));

        let mut surface = PresentationSurface::new(dims);
        surface.create(container.clone()).unwrap();
        surface.on_resize(container.size);
        let pool = FrameBufferPool::allocate(dims, BufferStrategy::DirectTransfer).unwrap();
        let render_loop = RenderLoop::new(
            pool,
            slot.clone(),
            surface,
            Arc::new(RecordingSink::default()),
            fps,
        );
        (container, slot, FixedRateTicker::spawn(render_loop).unwrap())
    }

    #[test]
    fn test_stop_returns_loop() {
        let (container, _slot, ticker) = spawn_loop(500);
        std::thread::sleep(Duration::from_millis(20));
        assert!(!ticker.is_finished());

        let exit = ticker.stop().unwrap();
        assert!(exit.fault.is_none());
        assert!(exit.ticks >= 1);
        assert_eq!(exit.render_loop.surface().state(), SurfaceState::Sized);
        assert_eq!(container.target_log.lock().presents.len() as u64, exit.ticks);
    }

    #[test]
    fn test_stop_wakes_slow_ticker() {
        let (_container, _slot, ticker) = spawn_loop(1);
        std::thread::sleep(Duration::from_millis(10));

        let started = Instant::now();
        ticker.stop().unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_fault_ends_loop_and_disposes() {
        let (container, slot, ticker) = spawn_loop(500);
        slot.fail("decoder crashed");

        let deadline = Instant::now() + Duration::from_secs(5);
        while !ticker.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(ticker.is_finished());

        let exit = ticker.stop().unwrap();
        assert!(matches!(
            exit.fault,
            Some(TickError::Decoder(DecoderError::Fault(_)))
        ));
        assert_eq!(exit.render_loop.surface().state(), SurfaceState::Disposed);
        assert_eq!(container.target_log.lock().released, 1);
    }
}
