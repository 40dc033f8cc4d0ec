//! Bounded motion-sample history and intensity smoothing.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One accelerometer report from a player's device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionSample {
    /// Scalar motion intensity for this sample (already magnitude-reduced
    /// on the client; the server treats it as an opaque scalar).
    pub intensity: f32,
}

/// Fixed-capacity ring buffer of the most recent motion samples for a
/// player, used both for raw (latest-sample) and smoothed intensity.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    samples: VecDeque<MotionSample>,
    capacity: usize,
}

impl MotionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Push a new sample, evicting the oldest if at capacity. Samples are
    /// applied in receive order (§5 ordering guarantee) — callers must not
    /// reorder before calling this.
    pub fn push(&mut self, sample: MotionSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().map(|s| s.intensity)
    }

    /// Mean intensity over the whole retained window.
    pub fn smoothed(&self) -> Option<f32> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f32 = self.samples.iter().map(|s| s.intensity).sum();
        Some(sum / self.samples.len() as f32)
    }

    /// Effective intensity for this tick: smoothed if requested, else the
    /// single latest sample.
    pub fn effective_intensity(&self, smoothing_enabled: bool) -> Option<f32> {
        if smoothing_enabled {
            self.smoothed()
        } else {
            self.latest()
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
