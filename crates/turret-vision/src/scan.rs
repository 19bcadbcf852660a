//! Hierarchical Scan Engine.
//!
//! Two search strategies over the 3×3 targeting grid, both first-match in
//! row-major order:
//!
//! - [`EscalatingSearch`] pre-checks the whole frame, then either scans the
//!   3×3 grid directly or narrows down through a 2×2 quadrant scan and a 3×3
//!   sub-scan of the winning quadrant.  It verifies its own result.
//! - [`CenterPrioritySearch`] probes the center cell first and falls back to
//!   the remaining cells and finally the whole frame.  Its hits are returned
//!   unverified; the caller verifies them on the region that scored.
//!
//! A region whose read fails counts as negative and the scan moves on.
//!
//! # Example
//!
//! ```rust
//! use turret_vision::scan::{ScanConfig, StrategyKind, build_strategy};
//! use turret_vision::verify::Verifier;
//!
//! let strategy = build_strategy(StrategyKind::CenterPriority, ScanConfig::default(), Verifier::default());
//! assert_eq!(strategy.name(), "center-priority");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use turret_types::{CONFIDENCE_THRESHOLD, Detection, GRID_DIM, ImageDescriptor, Region};

use crate::grid::{Grid, global_cell, global_grid};
use crate::probe::RegionProbe;
use crate::scorer::is_positive;
use crate::verify::Verifier;

/// A located target plus the region that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanHit {
    pub detection: Detection,
    /// Region that scored positive and should be verified.
    pub region: Region,
    /// `true` when the strategy already ran the verification pass.
    pub verified: bool,
}

/// Strategy selector used in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Escalating,
    CenterPriority,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Escalating => f.write_str("escalating"),
            StrategyKind::CenterPriority => f.write_str("center-priority"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "escalating" | "a" => Ok(StrategyKind::Escalating),
            "center-priority" | "center_priority" | "b" => Ok(StrategyKind::CenterPriority),
            other => Err(format!(
                "unknown scan strategy '{other}' (expected 'escalating' or 'center-priority')"
            )),
        }
    }
}

/// Thresholds shared by both strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanConfig {
    /// Scores strictly above this count as positive.
    pub threshold: f32,
    /// Full-frame scores taken by the escalating pre-check.
    pub precheck_samples: u32,
    /// Positive pre-check scores needed to go straight to the 3×3 scan.
    pub precheck_quorum: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            threshold: CONFIDENCE_THRESHOLD,
            precheck_samples: 3,
            precheck_quorum: 2,
        }
    }
}

/// A search over one image.
pub trait ScanStrategy: Send {
    /// Short name for logs, e.g. `"escalating"`.
    fn name(&self) -> &'static str;

    /// Search `image` and return the first hit, if any.
    fn scan(&self, probe: &mut dyn RegionProbe, image: &ImageDescriptor) -> Option<ScanHit>;
}

/// Build the strategy selected by `kind`.
pub fn build_strategy(kind: StrategyKind, config: ScanConfig, verifier: Verifier) -> Box<dyn ScanStrategy> {
    match kind {
        StrategyKind::Escalating => Box::new(EscalatingSearch::new(config, verifier)),
        StrategyKind::CenterPriority => Box::new(CenterPrioritySearch::new(config)),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared probing helpers
// ────────────────────────────────────────────────────────────────────────────

/// Probe one region; `Some(confidence)` when positive.
fn probe_positive(
    probe: &mut dyn RegionProbe,
    image: &ImageDescriptor,
    region: Region,
    threshold: f32,
) -> Option<f32> {
    match probe.probe(image, region) {
        Ok(confidence) => {
            debug!(%region, confidence, "region scored");
            is_positive(confidence, threshold).then_some(confidence)
        }
        Err(e) => {
            warn!(%region, error = %e, "region skipped");
            None
        }
    }
}

/// First positive cell of `grid` in row-major order, optionally skipping one
/// cell.
fn first_positive(
    probe: &mut dyn RegionProbe,
    image: &ImageDescriptor,
    grid: &Grid,
    threshold: f32,
    skip: Option<(u8, u8)>,
) -> Option<(u8, u8, Region, f32)> {
    grid.cells()
        .filter(|&(row, col, _)| skip != Some((row, col)))
        .find_map(|(row, col, region)| {
            probe_positive(probe, image, region, threshold).map(|c| (row, col, region, c))
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy A – escalating search
// ────────────────────────────────────────────────────────────────────────────

/// Full-frame pre-check, then 3×3 or 2×2 → 3×3 sub-scan, then verification
/// of the global cell.
#[derive(Debug, Clone, Copy)]
pub struct EscalatingSearch {
    config: ScanConfig,
    verifier: Verifier,
}

impl EscalatingSearch {
    pub fn new(config: ScanConfig, verifier: Verifier) -> Self {
        Self { config, verifier }
    }

    /// Returns `(row, col, confidence)` of the unverified global cell.
    fn locate(&self, probe: &mut dyn RegionProbe, image: &ImageDescriptor) -> Option<(u8, u8, f32)> {
        let threshold = self.config.threshold;
        let full = image.full_region();

        let positives = (0..self.config.precheck_samples)
            .filter(|_| probe_positive(probe, image, full, threshold).is_some())
            .count() as u32;
        debug!(positives, samples = self.config.precheck_samples, "full-frame pre-check");

        if positives >= self.config.precheck_quorum {
            let (row, col, _, confidence) =
                first_positive(probe, image, &global_grid(image), threshold, None)?;
            return Some((row, col, confidence));
        }

        let quadrants = Grid::new(full, 2);
        let (qr, qc, quadrant, _) = first_positive(probe, image, &quadrants, threshold, None)?;
        debug!(row = qr, col = qc, %quadrant, "quadrant hit, sub-scanning");

        let sub_grid = Grid::new(quadrant, GRID_DIM);
        let (_, _, cell, confidence) = first_positive(probe, image, &sub_grid, threshold, None)?;
        let (cx, cy) = cell.center();
        let (row, col) = global_cell(image, cx, cy);
        Some((row, col, confidence))
    }
}

impl ScanStrategy for EscalatingSearch {
    fn name(&self) -> &'static str {
        "escalating"
    }

    #[instrument(skip_all, fields(strategy = "escalating", frame_id = image.frame_id))]
    fn scan(&self, probe: &mut dyn RegionProbe, image: &ImageDescriptor) -> Option<ScanHit> {
        let (row, col, confidence) = self.locate(probe, image)?;
        let region = global_grid(image).cell(row, col);

        if !self.verifier.verify(probe, image, region) {
            info!(row, col, "candidate rejected by verification");
            return None;
        }

        Some(ScanHit {
            detection: Detection::new(row, col, confidence),
            region,
            verified: true,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Strategy B – center-priority search
// ────────────────────────────────────────────────────────────────────────────

/// Center cell, then the other eight, then the whole frame (reported as the
/// center).
#[derive(Debug, Clone, Copy)]
pub struct CenterPrioritySearch {
    config: ScanConfig,
}

impl CenterPrioritySearch {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }
}

impl ScanStrategy for CenterPrioritySearch {
    fn name(&self) -> &'static str {
        "center-priority"
    }

    #[instrument(skip_all, fields(strategy = "center-priority", frame_id = image.frame_id))]
    fn scan(&self, probe: &mut dyn RegionProbe, image: &ImageDescriptor) -> Option<ScanHit> {
        let threshold = self.config.threshold;
        let grid = global_grid(image);
        let hit = |row: u8, col: u8, region: Region, confidence: f32| ScanHit {
            detection: Detection::new(row, col, confidence),
            region,
            verified: false,
        };

        let center = grid.cell(1, 1);
        if let Some(confidence) = probe_positive(probe, image, center, threshold) {
            return Some(hit(1, 1, center, confidence));
        }

        if let Some((row, col, region, confidence)) =
            first_positive(probe, image, &grid, threshold, Some((1, 1)))
        {
            return Some(hit(row, col, region, confidence));
        }

        let full = image.full_region();
        probe_positive(probe, image, full, threshold).map(|confidence| hit(1, 1, full, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FnProbe, image};

    const CENTER: Region = Region::new(96, 96, 96, 96);

    /// Positive for any region touching the center cell that is no larger
    /// than a quadrant.
    fn overlap_probe() -> FnProbe<impl FnMut(Region) -> f32 + Send> {
        FnProbe::new(|r: Region| {
            if r.overlaps(&CENTER) && r.width <= 144 && r.height <= 144 {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn escalating_localizes_through_quadrant() {
        let mut probe = overlap_probe();
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image())
            .unwrap();

        assert_eq!(hit.detection, Detection::new(1, 1, 1.0));
        assert_eq!(hit.region, CENTER);
        assert!(hit.verified);

        // 3 pre-checks, quadrant (0,0), 9 sub-cells up to (96,96,48,48), 2 verifications.
        assert_eq!(&probe.calls[..3], &[Region::full(288, 288); 3]);
        assert_eq!(probe.calls[3], Region::new(0, 0, 144, 144));
        assert_eq!(probe.calls[12], Region::new(96, 96, 48, 48));
        assert_eq!(&probe.calls[13..], &[CENTER, CENTER]);
    }

    #[test]
    fn escalating_full_frame_path_scans_global_grid() {
        // Full frame positive, target in cell (2, 0).
        let target = Region::new(0, 192, 96, 96);
        let mut probe = FnProbe::new(move |r: Region| {
            if r == Region::full(288, 288) || r == target { 0.9 } else { 0.1 }
        });
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image())
            .unwrap();
        assert_eq!(hit.detection, Detection::new(2, 0, 0.9));
        // 3 pre-checks + 7 cells + 2 verifications.
        assert_eq!(probe.calls.len(), 12);
    }

    #[test]
    fn escalating_rejected_by_verification() {
        let mut calls = 0;
        // Cell (0,0) scores positive only on its first probe.
        let mut probe = FnProbe::new(move |r: Region| {
            if r == Region::full(288, 288) {
                return 0.9;
            }
            if r == Region::new(0, 0, 96, 96) {
                calls += 1;
                return if calls == 1 { 0.9 } else { 0.2 };
            }
            0.0
        });
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image());
        assert_eq!(hit, None);
    }

    #[test]
    fn escalating_nothing_found() {
        let mut probe = FnProbe::new(|_| 0.0);
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image());
        assert_eq!(hit, None);
        // 3 pre-checks + 4 quadrants.
        assert_eq!(probe.calls.len(), 7);
    }

    #[test]
    fn escalating_quadrant_without_subhit_is_not_found() {
        // Only quadrant-sized regions score; no 48×48 sub-cell does.
        let mut probe = FnProbe::new(|r: Region| if r.width == 144 { 0.9 } else { 0.0 });
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image());
        assert_eq!(hit, None);
        // 3 pre-checks, quadrant (0,0), 9 sub-cells; no verification.
        assert_eq!(probe.calls.len(), 13);
        assert!(probe.calls[4..].iter().all(|r| r.width == 48));
    }

    #[test]
    fn escalating_quadrant_path_rejected_by_verification() {
        let quadrant = Region::new(0, 0, 144, 144);
        let sub_cell = Region::new(96, 96, 48, 48);
        let mut probe =
            FnProbe::new(move |r: Region| if r == quadrant || r == sub_cell { 0.9 } else { 0.0 });
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image());
        assert_eq!(hit, None);
        // Localized to global (1,1); both verification rounds on that cell fail.
        assert_eq!(probe.calls.len(), 15);
        assert_eq!(&probe.calls[13..], &[CENTER, CENTER]);
    }

    #[test]
    fn escalating_skips_failed_reads() {
        let cell = Region::new(96, 0, 96, 96);
        let mut probe = FnProbe::new(move |r: Region| {
            if r == Region::full(288, 288) || r == cell || r.x == 192 { 0.9 } else { 0.0 }
        })
        .failing_on(cell);
        let hit = EscalatingSearch::new(ScanConfig::default(), Verifier::default())
            .scan(&mut probe, &image())
            .unwrap();
        // (0,1) failed to read, so the scan continued to (0,2).
        assert_eq!((hit.detection.row, hit.detection.col), (0, 2));
    }

    #[test]
    fn center_priority_single_probe() {
        let mut probe = FnProbe::new(|r: Region| if r == CENTER { 1.0 } else { 0.0 });
        let hit = CenterPrioritySearch::new(ScanConfig::default())
            .scan(&mut probe, &image())
            .unwrap();
        assert_eq!(hit.detection, Detection::new(1, 1, 1.0));
        assert_eq!(hit.region, CENTER);
        assert!(!hit.verified);
        assert_eq!(probe.calls.len(), 1);
    }

    #[test]
    fn center_priority_skips_center_in_fallback() {
        let target = Region::new(192, 192, 96, 96);
        let mut probe = FnProbe::new(move |r: Region| if r == target { 0.8 } else { 0.0 });
        let hit = CenterPrioritySearch::new(ScanConfig::default())
            .scan(&mut probe, &image())
            .unwrap();
        assert_eq!(hit.detection, Detection::new(2, 2, 0.8));
        assert_eq!(probe.calls.iter().filter(|&&r| r == CENTER).count(), 1);
        assert_eq!(probe.calls.len(), 9);
    }

    #[test]
    fn center_priority_full_frame_reports_center() {
        let mut probe = FnProbe::new(|r: Region| if r.width == 288 { 0.8 } else { 0.0 });
        let hit = CenterPrioritySearch::new(ScanConfig::default())
            .scan(&mut probe, &image())
            .unwrap();
        assert_eq!(hit.detection, Detection::new(1, 1, 0.8));
        assert_eq!(hit.region, Region::full(288, 288));
        assert_eq!(probe.calls.len(), 10);
    }

    #[test]
    fn scans_are_idempotent() {
        for kind in [StrategyKind::Escalating, StrategyKind::CenterPriority] {
            let strategy = build_strategy(kind, ScanConfig::default(), Verifier::default());
            let mut probe = overlap_probe();
            let first = strategy.scan(&mut probe, &image());
            let second = strategy.scan(&mut probe, &image());
            assert!(first.is_some());
            assert_eq!(first, second, "{kind}");
        }
    }

    #[test]
    fn strategy_kind_parsing() {
        assert_eq!("center-priority".parse::<StrategyKind>().unwrap(), StrategyKind::CenterPriority);
        assert_eq!("Escalating".parse::<StrategyKind>().unwrap(), StrategyKind::Escalating);
        assert!("spiral".parse::<StrategyKind>().is_err());
        let json = serde_json::to_string(&StrategyKind::CenterPriority).unwrap();
        assert_eq!(json, "\"center-priority\"");
    }
}
