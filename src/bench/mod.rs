// Render bench
// Rolling per-window timing of the present step

use std::time::{Duration, Instant};

/// Summary of one full report window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchReport {
    pub window: u32,
    pub count: u32,
    pub total: Duration,
    pub average: Duration,
}

impl BenchReport {
    pub fn average_ms(&self) -> f64 {
        self.average.as_secs_f64() * 1000.0
    }

    pub fn total_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1000.0
    }
}

/// Where bench reports go
pub trait BenchSink: Send + Sync {
    fn report(&self, report: &BenchReport);
}

/// Emits each report as a structured tracing event
pub struct LogBenchSink;

impl BenchSink for LogBenchSink {
    fn report(&self, report: &BenchReport) {
        tracing::info!(
            target: "frame_presenter::bench",
            window = report.window,
            count = report.count,
            average_ms = report.average_ms(),
            total_ms = report.total_ms(),
            "render time per {} frames",
            report.window
        );
    }
}

#[derive(Debug, Default)]
pub struct RenderBench {
    started: Option<Instant>,
    count: u32,
    total: Duration,
}

impl RenderBench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Close the open sample; a stop without a start is ignored
    pub fn stop_timer(&mut self) {
        if let Some(started) = self.started.take() {
            self.record(started.elapsed());
        }
    }

    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn average(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / self.count
        }
    }

    /// Once exactly `window` samples are in, summarize them and start over
    pub fn report_if_window_full(&mut self, window: u32) -> Option<BenchReport> {
        if self.count < window.max(1) {
            return None;
        }
        let report = BenchReport {
            window,
            count: self.count,
            total: self.total,
            average: self.average(),
        };
        self.clear();
        Some(report)
    }

    pub fn clear(&mut self) {
        self.started = None;
        self.count = 0;
        self.total = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_report_and_reset() {
        let mut bench = RenderBench::new();
        for _ in 0..59 {
            bench.record(Duration::from_millis(2));
            assert!(bench.report_if_window_full(60).is_none());
        }
        bench.record(Duration::from_millis(2));

        let report = bench.report_if_window_full(60).unwrap();
        assert_eq!(report.count, 60);
        assert_eq!(report.total, Duration::from_millis(120));
        assert_eq!(report.average, Duration::from_millis(2));
        assert_eq!(report.average_ms(), 2.0);

        assert_eq!(bench.count(), 0);
        assert_eq!(bench.total(), Duration::ZERO);
        assert!(bench.report_if_window_full(60).is_none());
    }

    #[test]
    fn test_timer_brackets_one_sample() {
        let mut bench = RenderBench::new();
        bench.stop_timer();
        assert_eq!(bench.count(), 0);

        bench.start_timer();
        std::thread::sleep(Duration::from_millis(1));
        bench.stop_timer();
        assert_eq!(bench.count(), 1);
        assert!(bench.total() >= Duration::from_millis(1));

        bench.stop_timer();
        assert_eq!(bench.count(), 1);
    }

    #[test]
    fn test_average_of_empty_bench() {
        assert_eq!(RenderBench::new().average(), Duration::ZERO);
    }
}
