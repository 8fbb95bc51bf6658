// src/metrics/series.rs

//! Append-only time series used for per-step resource accounting.
//!
//! Samples are `(elapsed-ms, value)` pairs where the value is a cumulative
//! counter (CPU milliseconds, bytes read, ...). Rates are therefore simple
//! deltas; no smoothing or windowing happens here.

/// An append-only sequence of `(elapsed-ms, value)` samples.
///
/// Timestamps must be non-decreasing; the caller (the sampler) guarantees
/// this because all samples for a step come from the same monotonic clock.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    samples: Vec<(u64, u64)>,
}

impl TimeSeries {
    /// An empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// A series seeded with a `(0, 0)` origin sample, so that the first
    /// real sample already yields a meaningful `total_rate`.
    pub fn with_origin() -> Self {
        Self {
            samples: vec![(0, 0)],
        }
    }

    /// Append a sample. `t_ms` must be >= the previous sample's timestamp.
    pub fn push(&mut self, t_ms: u64, value: u64) {
        self.samples.push((t_ms, value));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Last sampled value, or 0 if no sample has been recorded.
    pub fn last_value(&self) -> u64 {
        self.samples.last().map(|&(_, v)| v).unwrap_or(0)
    }

    /// Rate per millisecond over the last two samples.
    ///
    /// Returns 0.0 with fewer than two samples, and 0.0 when both samples
    /// share a timestamp (simultaneous samples carry no new information).
    pub fn current_rate(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let (t1, v1) = self.samples[n - 1];
        let (t0, v0) = self.samples[n - 2];
        let dt = t1.saturating_sub(t0);
        if dt == 0 {
            return 0.0;
        }
        (v1 as f64 - v0 as f64) / dt as f64
    }

    /// Average rate per millisecond since the start of the series.
    ///
    /// Same guards as [`current_rate`](Self::current_rate): fewer than two
    /// samples or a zero elapsed time yield 0.0.
    pub fn total_rate(&self) -> f64 {
        let n = self.samples.len();
        if n < 2 {
            return 0.0;
        }
        let (t, v) = self.samples[n - 1];
        if t == 0 {
            return 0.0;
        }
        v as f64 / t as f64
    }
}
