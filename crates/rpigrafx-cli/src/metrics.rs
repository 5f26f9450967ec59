// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::time::Instant;

/// Capture metrics of one `capture` run
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMetrics {
    /// Total number of frames fetched
    pub frames: u64,
    /// Total bytes fetched
    pub bytes: u64,
    /// Elapsed time in seconds
    pub elapsed_secs: f64,
    /// Average throughput in frames per second
    pub fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
    /// Minimum time spent waiting in fetch, in microseconds
    pub wait_min_us: u64,
    /// Maximum time spent waiting in fetch, in microseconds
    pub wait_max_us: u64,
    /// Average time spent waiting in fetch, in microseconds
    pub wait_avg_us: u64,
    /// 50th percentile wait in microseconds
    pub wait_p50_us: u64,
    /// 95th percentile wait in microseconds
    pub wait_p95_us: u64,
    /// Buffers replaced by a newer delivery before they were fetched
    pub dropped_frames: u64,
}

/// Collects per-fetch measurements during a capture loop
pub struct MetricsCollector {
    start_time: Instant,
    waits_us: Vec<u64>,
    bytes: u64,
    dropped_frames: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            waits_us: Vec::new(),
            bytes: 0,
            dropped_frames: 0,
        }
    }

    /// Record one fetched frame
    pub fn record_frame(&mut self, wait_us: u64, bytes: usize) {
        self.waits_us.push(wait_us);
        self.bytes += bytes as u64;
    }

    /// Add the drop counter of one slot
    pub fn record_dropped(&mut self, dropped: u64) {
        self.dropped_frames += dropped;
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self) -> CaptureMetrics {
        let elapsed_secs = self.start_time.elapsed().as_secs_f64();
        let frames = self.waits_us.len() as u64;

        let (fps, bandwidth_mbps) = if elapsed_secs > 0.0 {
            (
                frames as f64 / elapsed_secs,
                (self.bytes as f64 * 8.0) / (elapsed_secs * 1_000_000.0),
            )
        } else {
            (0.0, 0.0)
        };

        self.waits_us.sort_unstable();
        let (min, max, avg) = match (self.waits_us.first(), self.waits_us.last()) {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.waits_us.iter().sum();
                (min, max, sum / frames)
            }
            _ => (0, 0, 0),
        };

        CaptureMetrics {
            frames,
            bytes: self.bytes,
            elapsed_secs,
            fps,
            bandwidth_mbps,
            wait_min_us: min,
            wait_max_us: max,
            wait_avg_us: avg,
            wait_p50_us: self.percentile(50.0),
            wait_p95_us: self.percentile(95.0),
            dropped_frames: self.dropped_frames,
        }
    }

    /// Assumes self.waits_us is already sorted
    fn percentile(&self, p: f64) -> u64 {
        if self.waits_us.is_empty() {
            return 0;
        }

        let len = self.waits_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.waits_us[idx.min(len - 1)]
    }

    /// Print metrics in human-readable format
    pub fn print_text(&mut self) {
        let metrics = self.finalize();
        println!("Frames:     {}", metrics.frames);
        println!(
            "Bytes:      {} ({:.2} MB)",
            metrics.bytes,
            metrics.bytes as f64 / 1_048_576.0
        );
        println!("Elapsed:    {:.3} s", metrics.elapsed_secs);
        println!("Throughput: {:.2} fps", metrics.fps);
        println!("Bandwidth:  {:.2} Mbps", metrics.bandwidth_mbps);

        if metrics.frames > 0 {
            println!("\nFetch wait (µs):");
            println!("  Min:    {}", metrics.wait_min_us);
            println!("  Max:    {}", metrics.wait_max_us);
            println!("  Avg:    {}", metrics.wait_avg_us);
            println!("  P50:    {}", metrics.wait_p50_us);
            println!("  P95:    {}", metrics.wait_p95_us);
        }

        if metrics.dropped_frames > 0 {
            println!("\nDropped frames: {}", metrics.dropped_frames);
        }
    }

    /// Print metrics in JSON format
    pub fn print_json(&mut self) -> Result<(), serde_json::Error> {
        let metrics = self.finalize();
        let json = serde_json::to_string_pretty(&metrics)?;
        println!("{}", json);
        Ok(())
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_statistics() {
        let mut collector = MetricsCollector::new();

        // 0, 10, 20, ..., 100 in reverse arrival order
        for i in (0..=10).rev() {
            collector.record_frame(i * 10, 1000);
        }

        let metrics = collector.finalize();
        assert_eq!(metrics.frames, 11);
        assert_eq!(metrics.bytes, 11_000);
        assert_eq!(metrics.wait_min_us, 0);
        assert_eq!(metrics.wait_max_us, 100);
        assert_eq!(metrics.wait_avg_us, 50);
        assert_eq!(metrics.wait_p50_us, 50);
        assert_eq!(metrics.wait_p95_us, 100);
    }

    #[test]
    fn test_throughput_calculation() {
        let mut collector = MetricsCollector::new();

        for _ in 0..30 {
            collector.record_frame(1000, 100_000);
        }

        std::thread::sleep(std::time::Duration::from_millis(100));

        let metrics = collector.finalize();
        assert_eq!(metrics.frames, 30);
        assert!(metrics.fps > 0.0 && metrics.fps < 400.0);
        assert!(metrics.bandwidth_mbps > 0.0);
    }

    #[test]
    fn test_dropped_frames() {
        let mut collector = MetricsCollector::new();
        collector.record_dropped(2);
        collector.record_dropped(0);
        collector.record_dropped(3);
        assert_eq!(collector.finalize().dropped_frames, 5);
    }

    #[test]
    fn test_empty_metrics() {
        let mut collector = MetricsCollector::new();
        let metrics = collector.finalize();

        assert_eq!(metrics.frames, 0);
        assert_eq!(metrics.bytes, 0);
        assert_eq!(metrics.wait_min_us, 0);
        assert_eq!(metrics.wait_p95_us, 0);
        assert_eq!(metrics.dropped_frames, 0);
    }
}
