//! [`DetectionLoop`] – one perception-to-actuation cycle per tick.
//!
//! Each [`tick`][DetectionLoop::tick]:
//!
//! 1. **Capture** – ask the [`ImageSource`] for a fresh image.  Failure skips
//!    the cycle and is returned to the caller.
//! 2. **Scan** – run the configured [`ScanStrategy`] through the
//!    [`RegionProbe`].
//! 3. **Verify** – hits the strategy did not verify itself are re-scored by
//!    the [`Verifier`] on the region that produced them.  Only verified
//!    detections reach the controller.
//! 4. **Decide** – step the [`TargetingController`]; readiness is polled
//!    through the [`TurretRig`] only when the controller asks for it.
//! 5. **Act** – dispatch the command.  Driver faults are logged and never
//!    abort the loop.
//!
//! The caller sleeps for the returned report's `settle_ms` before the next
//! tick.  Nothing here blocks apart from the probe's own inference timeout.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//!
//! use turret_hal::frame_store::{CameraSource, MemoryFrameStore};
//! use turret_hal::sim::{ContrastEngine, SimCamera, SimRig, SimWorld};
//! use turret_runtime::detection_loop::{DetectionLoop, DetectionLoopConfig};
//! use turret_types::IMAGE_WIDTH;
//! use turret_vision::probe::SamplingProbe;
//!
//! let world = SimWorld::shared();
//! let store = MemoryFrameStore::new();
//! let source = CameraSource::new(SimCamera::new("sim_cam", world.clone()), store.clone(), IMAGE_WIDTH);
//! let probe = SamplingProbe::new(store, ContrastEngine::default());
//! let rig = SimRig::new(world).build();
//!
//! let mut detection_loop = DetectionLoop::new(DetectionLoopConfig::default(), source, probe, rig);
//! let report = detection_loop.tick(Instant::now()).unwrap();
//! assert_eq!(report.command.label(), "aim");
//! ```

use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};
use turret_hal::actuation::TurretRig;
use turret_hal::frame_store::ImageSource;
use turret_types::{CycleReport, Detection, ImageDescriptor, ScanOutcome, TurretError};
use turret_vision::probe::RegionProbe;
use turret_vision::scan::{ScanConfig, ScanStrategy, StrategyKind, build_strategy};
use turret_vision::verify::Verifier;
use uuid::Uuid;

use crate::targeting::{TargetingConfig, TargetingController};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`DetectionLoop`].
#[derive(Debug, Clone, Default)]
pub struct DetectionLoopConfig {
    pub strategy: StrategyKind,
    pub scan: ScanConfig,
    pub verifier: Verifier,
    pub targeting: TargetingConfig,
}

// ─────────────────────────────────────────────────────────────────────────────
// DetectionLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns every collaborator needed to run one full cycle.
pub struct DetectionLoop<S: ImageSource, P: RegionProbe> {
    source: S,
    probe: P,
    strategy: Box<dyn ScanStrategy>,
    verifier: Verifier,
    controller: TargetingController,
    rig: TurretRig,
    paused: bool,
    cycles: u64,
}

impl<S: ImageSource, P: RegionProbe> DetectionLoop<S, P> {
    pub fn new(config: DetectionLoopConfig, source: S, probe: P, rig: TurretRig) -> Self {
        info!(strategy = %config.strategy, "detection loop configured");
        Self {
            source,
            probe,
            strategy: build_strategy(config.strategy, config.scan, config.verifier),
            verifier: config.verifier,
            controller: TargetingController::new(config.targeting),
            rig,
            paused: false,
            cycles: 0,
        }
    }

    pub fn controller(&self) -> &TargetingController {
        &self.controller
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Pause or resume the loop.  While paused, [`tick`][Self::tick] returns
    /// early without capturing.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Run one cycle.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] when the loop is paused or
    /// no image could be captured.  Every later failure degrades to "not
    /// found" or a no-op and still yields a report.
    #[instrument(skip_all, fields(cycle = self.cycles + 1))]
    pub fn tick(&mut self, now: Instant) -> Result<CycleReport, TurretError> {
        if self.paused {
            return Err(TurretError::CaptureUnavailable(
                "detection loop paused by operator".to_string(),
            ));
        }

        let image = self.source.capture().inspect_err(|e| {
            warn!(error = %e, "capture failed, skipping cycle");
        })?;

        let detection = self.locate(&image);

        let rig = &mut self.rig;
        let decision = self
            .controller
            .step(detection.as_ref(), now, || rig.is_ready_to_fire());

        if let Err(e) = self.rig.dispatch(decision.command) {
            warn!(error = %e, command = decision.command.label(), "actuation failed");
        }

        self.cycles += 1;
        let report = CycleReport {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            frame_id: image.frame_id,
            outcome: ScanOutcome::from(detection),
            state: self.controller.state(),
            command: decision.command,
            settle_ms: decision.settle.as_millis() as u64,
        };
        info!(
            frame_id = report.frame_id,
            found = detection.is_some(),
            state = %report.state,
            command = report.command.label(),
            settle_ms = report.settle_ms,
            "cycle complete"
        );
        Ok(report)
    }

    /// Scan and, where needed, verify.  Only verified detections are returned.
    fn locate(&mut self, image: &ImageDescriptor) -> Option<Detection> {
        let hit = self.strategy.scan(&mut self.probe, image)?;
        if hit.verified {
            return Some(hit.detection);
        }
        if self.verifier.verify(&mut self.probe, image, hit.region) {
            Some(hit.detection)
        } else {
            info!(
                row = hit.detection.row,
                col = hit.detection.col,
                region = %hit.region,
                "hit rejected by verification"
            );
            None
        }
    }
}
