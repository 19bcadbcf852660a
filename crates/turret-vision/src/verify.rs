//! Verification Pass: re-score a candidate region before acting on it.

use tracing::{debug, warn};
use turret_types::{CONFIDENCE_THRESHOLD, ImageDescriptor, Region};

use crate::probe::RegionProbe;
use crate::scorer::is_positive;

/// Any-of-N verifier.  A candidate passes when at least `required` of
/// `rounds` re-scores exceed `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verifier {
    pub rounds: u32,
    pub required: u32,
    pub threshold: f32,
}

impl Default for Verifier {
    fn default() -> Self {
        Self {
            rounds: 2,
            required: 1,
            threshold: CONFIDENCE_THRESHOLD,
        }
    }
}

impl Verifier {
    /// Run every round unless a read fails, which stops verification with
    /// the rounds completed so far.
    pub fn verify(&self, probe: &mut dyn RegionProbe, image: &ImageDescriptor, region: Region) -> bool {
        let mut passed = 0u32;
        for round in 0..self.rounds {
            match probe.probe(image, region) {
                Ok(confidence) => {
                    debug!(%region, round, confidence, "verification round");
                    if is_positive(confidence, self.threshold) {
                        passed += 1;
                    }
                }
                Err(e) => {
                    warn!(%region, round, error = %e, "verification read failed");
                    break;
                }
            }
        }
        passed >= self.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedProbe, image};

    #[test]
    fn one_of_two_passes() {
        let mut probe = ScriptedProbe::new(&[0.9, 0.1]);
        assert!(Verifier::default().verify(&mut probe, &image(), Region::new(96, 96, 96, 96)));
        assert_eq!(probe.calls, 2);
    }

    #[test]
    fn late_positive_still_counts() {
        let mut probe = ScriptedProbe::new(&[0.2, 0.8]);
        assert!(Verifier::default().verify(&mut probe, &image(), Region::new(0, 0, 96, 96)));
    }

    #[test]
    fn all_negative_fails() {
        let mut probe = ScriptedProbe::new(&[0.75, 0.3]);
        assert!(!Verifier::default().verify(&mut probe, &image(), Region::new(0, 0, 96, 96)));
    }

    #[test]
    fn read_failure_stops_early() {
        // Only one score available: the second round fails to read.
        let mut probe = ScriptedProbe::new(&[0.9]);
        let verifier = Verifier {
            rounds: 3,
            required: 1,
            threshold: 0.75,
        };
        assert!(verifier.verify(&mut probe, &image(), Region::new(0, 0, 96, 96)));
        assert_eq!(probe.calls, 2);

        let mut empty = ScriptedProbe::new(&[]);
        assert!(!verifier.verify(&mut empty, &image(), Region::new(0, 0, 96, 96)));
        assert_eq!(empty.calls, 1);
    }

    #[test]
    fn stricter_quorum() {
        let mut probe = ScriptedProbe::new(&[0.9, 0.1, 0.95]);
        let verifier = Verifier {
            rounds: 3,
            required: 2,
            threshold: 0.75,
        };
        assert!(verifier.verify(&mut probe, &image(), Region::new(0, 0, 96, 96)));
    }
}
