//! Detected scene segments.

use serde::{Deserialize, Serialize};

/// A contiguous time segment between two detected visual change points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Start offset in seconds
    pub start_seconds: f64,
    /// Length in seconds (gap to the next change point, or to end of media)
    pub length_seconds: f64,
}

impl Scene {
    pub fn new(start_seconds: f64, length_seconds: f64) -> Self {
        Self {
            start_seconds,
            length_seconds: length_seconds.max(0.0),
        }
    }

    /// End offset in seconds.
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.length_seconds
    }
}
