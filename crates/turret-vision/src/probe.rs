//! [`RegionProbe`] – "how likely is a target inside this region?"
//!
//! Search strategies and the verifier only talk to this trait, so they can be
//! exercised with synthetic probes and run unchanged against a real reader
//! and engine through [`SamplingProbe`].

use turret_hal::frame_store::RegionReader;
use turret_hal::inference::InferenceEngine;
use turret_types::{ImageDescriptor, Region, TurretError};

use crate::sampler::sample;
use crate::scorer::ConfidenceScorer;

/// Sample and score one region of an image.
pub trait RegionProbe: Send {
    /// Confidence for `region`.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::OutOfBounds`] or
    /// [`TurretError::RegionReadFailure`] when the region cannot be sampled.
    /// Scoring itself never fails.
    fn probe(&mut self, image: &ImageDescriptor, region: Region) -> Result<f32, TurretError>;
}

/// The production probe: [`sample`] through a [`RegionReader`], then score.
pub struct SamplingProbe<R: RegionReader, E: InferenceEngine> {
    reader: R,
    scorer: ConfidenceScorer<E>,
    calls: u64,
}

impl<R: RegionReader, E: InferenceEngine> SamplingProbe<R, E> {
    pub fn new(reader: R, engine: E) -> Self {
        Self {
            reader,
            scorer: ConfidenceScorer::new(engine),
            calls: 0,
        }
    }

    /// Number of probes issued, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl<R: RegionReader, E: InferenceEngine> RegionProbe for SamplingProbe<R, E> {
    fn probe(&mut self, image: &ImageDescriptor, region: Region) -> Result<f32, TurretError> {
        self.calls += 1;
        let buffer = sample(&mut self.reader, image, region)?;
        Ok(self.scorer.score(&buffer))
    }
}
