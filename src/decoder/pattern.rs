// Synthetic frame producer
// Publishes scrolling color bars so the presenter can run without a stream

use super::{DecoderError, LatestFrameSlot};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const BAR_COLORS: [u32; 8] = [
    0x00_FF_FF_FF,
    0x00_FF_FF_00,
    0x00_00_FF_FF,
    0x00_00_FF_00,
    0x00_FF_00_FF,
    0x00_FF_00_00,
    0x00_00_00_FF,
    0x00_10_10_10,
];

/// Background thread that stands in for the decoder
pub struct TestPatternProducer {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl TestPatternProducer {
    pub fn spawn(slot: Arc<LatestFrameSlot>, fps: u32) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let interval = Duration::from_micros(1_000_000 / fps.max(1) as u64);

        let handle = std::thread::Builder::new()
            .name("test-pattern".to_string())
            .spawn(move || run(slot, interval, stop_rx))?;

        Ok(Self {
            stop_tx,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TestPatternProducer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(slot: Arc<LatestFrameSlot>, interval: Duration, stop_rx: Receiver<()>) {
    let dims = slot.dimensions();
    let width = dims.width as usize;
    let mut offset = 0usize;
    let mut deadline = Instant::now();

    loop {
        let result = slot.publish_with(|frame| {
            write_bars(frame, width, offset);
            Ok(())
        });
        if let Err(DecoderError::Fault(reason)) = result {
            log::warn!("Test pattern stopped: {}", reason);
            return;
        }
        offset = offset.wrapping_add(4);

        deadline += interval;
        match stop_rx.recv_deadline(deadline) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => return,
        }
    }
}

/// Fill packed 0RGB frame bytes with vertical bars shifted by `offset` pixels
fn write_bars(frame: &mut [u8], width: usize, offset: usize) {
    if width == 0 {
        return;
    }
    let bar_width = (width / BAR_COLORS.len()).max(1);
    for row in frame.chunks_exact_mut(width * 4) {
        for (x, pixel) in row.chunks_exact_mut(4).enumerate() {
            let bar = ((x + offset) / bar_width) % BAR_COLORS.len();
            pixel.copy_from_slice(&BAR_COLORS[bar].to_ne_bytes());
        }
    }
}
