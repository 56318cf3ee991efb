//! Observation history buffer and aggregates (spec.md §3.1, §4.4).

use std::collections::VecDeque;

use crate::error::ClientFault;
use crate::sample::DataSample;

/// `startAfter >= SECONDS_IN_30_YEARS` is interpreted as an absolute
/// epoch timestamp rather than a relative offset (spec.md §4.4).
pub const SECONDS_IN_30_YEARS: f64 = 30.0 * 365.25 * 24.0 * 3600.0;

/// The resolved meaning of a `startAfter` argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartFilter {
    /// `startAfter == NaN`: no filtering, return the whole buffer.
    Whole,
    /// Only samples with `timestamp >= threshold`.
    Since(f64),
}

/// Resolve a raw `startAfter` argument against the current wall clock,
/// per the three-way split in spec.md §4.4.
///
/// Returns a [`ClientFault`] for `startAfter <= 0` (and not NaN), which
/// the spec calls out explicitly as a caller-contract violation.
pub fn resolve_start_after(start_after: f64, now: f64) -> Result<StartFilter, ClientFault> {
    if start_after.is_nan() {
        return Ok(StartFilter::Whole);
    }
    if start_after <= 0.0 {
        return Err(ClientFault::new(format!(
            "startAfter must be positive or NaN, got {start_after}"
        )));
    }
    if start_after >= SECONDS_IN_30_YEARS {
        Ok(StartFilter::Since(start_after))
    } else {
        Ok(StartFilter::Since(now - start_after))
    }
}

/// A bounded FIFO of historical samples for one Observation, capped by
/// count and by a time window (spec.md §3.1, §4.4).
pub struct ObservationBuffer {
    samples: VecDeque<DataSample>,
    max_count: usize,
    max_window_sec: f64,
}

impl ObservationBuffer {
    pub fn new(max_count: usize, max_window_sec: f64) -> Self {
        Self {
            samples: VecDeque::new(),
            max_count: max_count.max(1),
            max_window_sec,
        }
    }

    /// Append a sample, evicting the oldest entries until both the size
    /// cap and the time-window cap are satisfied (spec.md §4.3 step 4).
    /// Timestamps are not required to be monotonic — an out-of-order
    /// push is still appended FIFO by arrival, per spec.md §3.2.
    pub fn push(&mut self, sample: DataSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.max_count {
            self.samples.pop_front();
        }
        while self.max_window_sec.is_finite() && self.samples.len() > 1 {
            let newest = self.samples.back().unwrap().timestamp();
            let oldest = self.samples.front().unwrap().timestamp();
            if newest - oldest > self.max_window_sec {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in push order matching `filter`.
    pub fn filtered(&self, filter: StartFilter) -> impl Iterator<Item = &DataSample> {
        self.samples.iter().filter(move |s| match filter {
            StartFilter::Whole => true,
            StartFilter::Since(t) => s.timestamp() >= t,
        })
    }

    /// `readBufferJson` payload: a JSON array of `{"t":...,"v":...}`
    /// objects (spec.md §4.2, §4.4).
    pub fn to_json_array(&self, filter: StartFilter) -> String {
        let mut out = String::from("[");
        let mut first = true;
        for sample in self.filtered(filter) {
            if !first {
                out.push(',');
            }
            first = false;
            out.push_str(&sample.to_buffer_entry_json());
        }
        out.push(']');
        out
    }

    fn numeric_values(&self, filter: StartFilter) -> Vec<f64> {
        self.filtered(filter).filter_map(|s| s.as_numeric()).collect()
    }

    pub fn min(&self, filter: StartFilter) -> f64 {
        let vs = self.numeric_values(filter);
        vs.into_iter().fold(f64::NAN, |acc, v| if acc.is_nan() || v < acc { v } else { acc })
    }

    pub fn max(&self, filter: StartFilter) -> f64 {
        let vs = self.numeric_values(filter);
        vs.into_iter().fold(f64::NAN, |acc, v| if acc.is_nan() || v > acc { v } else { acc })
    }

    pub fn mean(&self, filter: StartFilter) -> f64 {
        let vs = self.numeric_values(filter);
        if vs.is_empty() {
            return f64::NAN;
        }
        vs.iter().sum::<f64>() / vs.len() as f64
    }

    /// Population standard deviation (N denominator) — spec.md §4.4
    /// leaves the sample/population choice to the implementer; this
    /// crate picks population to match the low-sample-count sensor use
    /// case the spec calls out, and that choice is recorded in
    /// DESIGN.md.
    pub fn stddev(&self, filter: StartFilter) -> f64 {
        let vs = self.numeric_values(filter);
        if vs.is_empty() {
            return f64::NAN;
        }
        let mean = vs.iter().sum::<f64>() / vs.len() as f64;
        let variance = vs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vs.len() as f64;
        variance.sqrt()
    }
}
