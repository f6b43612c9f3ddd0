//! Time-windowed sample history for the power chart.
//!
//! Unlike [`SlidingWindow`](crate::kinematics::SlidingWindow), this buffer is bounded
//! by elapsed time rather than count: after every push, samples with
//! `now - t > window` are evicted from the front.

use crate::measurement_types::Sample;
use std::collections::VecDeque;

/// Fraction of the data range added above and below when auto-scaling the chart.
const Y_MARGIN_FRACTION: f64 = 0.1;

/// Half-height used when all values are equal, so the axis is never degenerate.
const FLAT_RANGE_PAD: f64 = 1e-2;

/// Samples retained over a trailing time interval, oldest first.
#[derive(Debug, Clone)]
pub struct TimeWindowedHistory {
    samples: VecDeque<Sample>,
    window_secs: f64,
}

impl TimeWindowedHistory {
    /// Empty history keeping `window_secs` seconds of samples.
    pub fn new(window_secs: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_secs,
        }
    }

    /// Retention interval in seconds.
    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    /// Append a sample and evict everything older than the window relative to it.
    pub fn push(&mut self, sample: Sample) {
        let now = sample.t;
        self.samples.push_back(sample);
        self.evict(now);
    }

    /// Drop samples with `now - t > window` from the front.
    pub fn evict(&mut self, now: f64) {
        while self
            .samples
            .front()
            .is_some_and(|s| now - s.t > self.window_secs)
        {
            self.samples.pop_front();
        }
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Newest retained sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Owned copy of the retained samples for a renderer.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// `(t, power_w)` pairs, oldest first.
    pub fn power_series(&self) -> Vec<(f64, f64)> {
        self.samples.iter().map(|s| (s.t, s.power_w)).collect()
    }

    /// Chart-ready view of the power series.
    pub fn power_chart(&self) -> PowerChart {
        PowerChart::from_history(self)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Power series with times relative to the oldest retained sample, plus axis
/// extents for a line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerChart {
    /// `(seconds since oldest sample, power_w)`
    pub points: Vec<(f64, f64)>,
    /// Upper end of the time axis (the lower end is 0)
    pub x_max: f64,
    /// Power axis range, `None` when there is no data
    pub y_range: Option<(f64, f64)>,
}

impl PowerChart {
    fn from_history(history: &TimeWindowedHistory) -> Self {
        let t0 = history.samples.front().map_or(0.0, |s| s.t);
        let points: Vec<(f64, f64)> = history
            .samples
            .iter()
            .map(|s| (s.t - t0, s.power_w))
            .collect();

        let x_max = points
            .last()
            .map_or(history.window_secs, |&(t, _)| t.max(history.window_secs));

        let y_range = points
            .iter()
            .map(|&(_, p)| p)
            .fold(None, |acc: Option<(f64, f64)>, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })
            .map(|(lo, hi)| {
                let (lo, hi) = if lo == hi {
                    (lo - FLAT_RANGE_PAD, hi + FLAT_RANGE_PAD)
                } else {
                    (lo, hi)
                };
                let margin = Y_MARGIN_FRACTION * (hi - lo);
                (lo - margin, hi + margin)
            });

        Self {
            points,
            x_max,
            y_range,
        }
    }
}
