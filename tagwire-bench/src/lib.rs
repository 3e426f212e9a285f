//! Benchmark utilities for the tagwire crates.

use std::fmt::Display;
use std::time::{Duration, Instant};

/// Statistics from a benchmark run. All fields are durations in milliseconds.
#[derive(Debug, Default)]
pub struct BenchStats {
    /// Duration of longest run.
    pub max: f32,

    /// Mean duration.
    pub mean: f32,

    /// Median duration.
    pub median: f32,

    /// Minimum duration.
    pub min: f32,

    /// Mean absolute deviation of durations.
    pub var: f32,
}

impl BenchStats {
    /// Compute statistics from a list of durations in milliseconds.
    ///
    /// Returns default (zero) statistics if `times` is empty.
    pub fn from_times(mut times: Vec<f32>) -> BenchStats {
        if times.is_empty() {
            return BenchStats::default();
        }

        times.sort_by(|a, b| a.total_cmp(b));
        let min = times[0];
        let max = times[times.len() - 1];

        let mid = times.len() / 2;
        let median = if times.len() % 2 == 1 {
            times[mid]
        } else {
            (times[mid - 1] + times[mid]) / 2.
        };
        let mean = times.iter().sum::<f32>() / times.len() as f32;
        let var = times.iter().map(|x| (x - mean).abs()).sum::<f32>() / times.len() as f32;

        BenchStats {
            max,
            mean,
            median,
            min,
            var,
        }
    }
}

/// Run a benchmark function `f` for `trials` iterations and print statistics
/// about the run.
pub fn run_bench<F: FnMut(), D: Display>(trials: usize, description: D, mut f: F) -> BenchStats {
    let times = (0..trials)
        .map(|_| {
            let start = Instant::now();
            f();
            (start.elapsed().as_secs_f64() * 1000.0) as f32
        })
        .collect();
    let stats = BenchStats::from_times(times);

    if trials > 0 {
        println!(
            "{}. mean {:.3}ms median {:.3} var {:.3} min {:.3} max {:.3}",
            description, stats.mean, stats.median, stats.var, stats.min, stats.max
        );
    }

    stats
}

/// Format a throughput as a human-readable string.
///
/// `bytes` is the total amount of input processed in `elapsed`.
pub fn format_throughput(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs == 0. {
        return "n/a".to_string();
    }
    let mb_per_sec = bytes as f64 / secs / (1024. * 1024.);
    format!("{:.1} MB/s", mb_per_sec)
}
