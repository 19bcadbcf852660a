//! Confidence Scorer.
//!
//! Engine failures are absorbed here: a sample the engine cannot score is
//! reported as `0.0`, which no threshold accepts.

use tracing::debug;
use turret_hal::inference::InferenceEngine;
use turret_types::SampleBuffer;

/// Wraps an [`InferenceEngine`] and returns a normalized confidence.
pub struct ConfidenceScorer<E: InferenceEngine> {
    engine: E,
}

impl<E: InferenceEngine> ConfidenceScorer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Confidence in `[0, 1]` that `buffer` contains a target.
    pub fn score(&mut self, buffer: &SampleBuffer) -> f32 {
        match self.engine.infer(buffer) {
            Ok(output) => output.confidence(),
            Err(e) => {
                debug!(engine = self.engine.id(), error = %e, "scoring failed, treating as 0.0");
                0.0
            }
        }
    }
}

/// Strict threshold test applied by every caller.
pub fn is_positive(confidence: f32, threshold: f32) -> bool {
    confidence > threshold
}
