//! Synthetic probes shared by the scan and verification tests.

use std::collections::{HashSet, VecDeque};

use turret_types::{ImageDescriptor, Region, TurretError};

use crate::probe::RegionProbe;

/// Scores every region with a closure and records the call sequence.
pub struct FnProbe<F: FnMut(Region) -> f32 + Send> {
    score: F,
    pub calls: Vec<Region>,
    pub failing: HashSet<Region>,
}

impl<F: FnMut(Region) -> f32 + Send> FnProbe<F> {
    pub fn new(score: F) -> Self {
        Self {
            score,
            calls: Vec::new(),
            failing: HashSet::new(),
        }
    }

    /// Make reads of `region` fail.
    pub fn failing_on(mut self, region: Region) -> Self {
        self.failing.insert(region);
        self
    }
}

impl<F: FnMut(Region) -> f32 + Send> RegionProbe for FnProbe<F> {
    fn probe(&mut self, _image: &ImageDescriptor, region: Region) -> Result<f32, TurretError> {
        self.calls.push(region);
        if self.failing.contains(&region) {
            return Err(TurretError::RegionReadFailure {
                region,
                details: "synthetic failure".to_string(),
            });
        }
        Ok((self.score)(region))
    }
}

/// Returns scripted scores in order; an exhausted script fails reads.
pub struct ScriptedProbe {
    pub scores: VecDeque<f32>,
    pub calls: usize,
}

impl ScriptedProbe {
    pub fn new(scores: &[f32]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            calls: 0,
        }
    }
}

impl RegionProbe for ScriptedProbe {
    fn probe(&mut self, _image: &ImageDescriptor, region: Region) -> Result<f32, TurretError> {
        self.calls += 1;
        self.scores.pop_front().ok_or(TurretError::RegionReadFailure {
            region,
            details: "script exhausted".to_string(),
        })
    }
}

pub fn image() -> ImageDescriptor {
    ImageDescriptor::new(288, 288, 1)
}
