//! In-process simulation rig for demos and headless tests.
//!
//! [`SimWorld`] models one target in front of a pan-only turret.  The target's
//! horizontal offset from boresight is kept in pan steps, so every
//! [`SimAimer`] command moves it across the image exactly the way a real
//! stepper would.  [`SimCamera`] renders the scene as an RGB565 CIF frame and
//! [`ContrastEngine`] stands in for the classifier.
//!
//! # Example
//!
//! ```rust
//! use turret_hal::sim::{SimRig, SimWorld};
//! use turret_types::ActuationCommand;
//!
//! let world = SimWorld::shared();
//! let mut rig = SimRig::new(world.clone()).build();
//! rig.dispatch(ActuationCommand::Aim { steps: -50 }).unwrap();
//! assert_eq!(world.lock().unwrap().target_offset_steps, -46);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use turret_types::{SampleBuffer, TurretError};

use crate::actuation::{Aimer, ReadinessSensor, Trigger, TurretRig};
use crate::camera::{Camera, CameraFrame, PixelFormat};
use crate::inference::{EngineOutput, InferenceEngine};

/// CIF sensor geometry.
pub const SIM_FRAME_WIDTH: u32 = 352;
pub const SIM_FRAME_HEIGHT: u32 = 288;

const BACKGROUND_RGB565: u16 = (5 << 11) | (10 << 5) | 5;
const TARGET_RGB565: u16 = 0xFFFF;

/// Offsets (in pan steps) the target jumps to after each hit.
const RESPAWN_OFFSETS: [i32; 4] = [120, -150, 10, 70];

/// Mutable scene state shared by every simulated driver.
#[derive(Debug, Clone)]
pub struct SimWorld {
    /// Horizontal target offset from boresight, in pan steps.  Negative is
    /// left of center.
    pub target_offset_steps: i32,
    /// Vertical target center in frame pixels.
    pub target_y: u32,
    /// Side of the square target in pixels.
    pub target_size: u32,
    pub pixels_per_step: f32,
    /// Readiness polls that report "not ready" after each shot.
    pub reload_polls: u32,
    pub reload_remaining: u32,
    pub shots: u32,
    pub aim_commands: u32,
}

pub type SharedWorld = Arc<Mutex<SimWorld>>;

impl Default for SimWorld {
    fn default() -> Self {
        Self {
            target_offset_steps: -96,
            target_y: SIM_FRAME_HEIGHT / 2,
            target_size: 80,
            pixels_per_step: 1.0,
            reload_polls: 1,
            reload_remaining: 0,
            shots: 0,
            aim_commands: 0,
        }
    }
}

impl SimWorld {
    /// A default world behind an `Arc<Mutex<_>>`.
    pub fn shared() -> SharedWorld {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Target center x in frame pixels (may lie outside the frame).
    pub fn target_x(&self) -> i64 {
        i64::from(SIM_FRAME_WIDTH / 2) + (self.target_offset_steps as f32 * self.pixels_per_step) as i64
    }

    fn register_hit(&mut self) {
        self.shots += 1;
        self.reload_remaining = self.reload_polls;
        self.target_offset_steps =
            RESPAWN_OFFSETS[(self.shots as usize - 1) % RESPAWN_OFFSETS.len()];
    }
}

fn lock(world: &SharedWorld) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(|e| e.into_inner())
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// Renders the world as a 352×288 RGB565 frame: dark background, bright
/// square target.
pub struct SimCamera {
    id: String,
    world: SharedWorld,
}

impl SimCamera {
    pub fn new(id: impl Into<String>, world: SharedWorld) -> Self {
        Self {
            id: id.into(),
            world,
        }
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, TurretError> {
        let world = lock(&self.world);
        let half = i64::from(world.target_size / 2);
        let (cx, cy) = (world.target_x(), i64::from(world.target_y));
        let (x0, x1) = (cx - half, cx + half);
        let (y0, y1) = (cy - half, cy + half);

        let mut data = Vec::with_capacity((SIM_FRAME_WIDTH * SIM_FRAME_HEIGHT * 2) as usize);
        for y in 0..i64::from(SIM_FRAME_HEIGHT) {
            for x in 0..i64::from(SIM_FRAME_WIDTH) {
                let inside = (x0..x1).contains(&x) && (y0..y1).contains(&y);
                let px = if inside { TARGET_RGB565 } else { BACKGROUND_RGB565 };
                data.extend_from_slice(&px.to_le_bytes());
            }
        }

        Ok(CameraFrame {
            width: SIM_FRAME_WIDTH,
            height: SIM_FRAME_HEIGHT,
            format: PixelFormat::Rgb565,
            data,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classifier stand-in
// ────────────────────────────────────────────────────────────────────────────

/// Scores a sample by the fraction of bright pixels it contains.
///
/// `confidence = min(1, bright_fraction / saturation)`.  With the default
/// saturation of 0.1 a cell needs roughly 7.5 % target coverage to clear the
/// 0.75 threshold.
pub struct ContrastEngine {
    pub bright_level: u8,
    pub saturation: f32,
}

impl Default for ContrastEngine {
    fn default() -> Self {
        Self {
            bright_level: 128,
            saturation: 0.1,
        }
    }
}

impl InferenceEngine for ContrastEngine {
    fn id(&self) -> &str {
        "contrast"
    }

    fn infer(&mut self, input: &SampleBuffer) -> Result<EngineOutput, TurretError> {
        let pixels = input.as_slice();
        let bright = pixels.iter().filter(|&&p| p >= self.bright_level).count();
        let fraction = bright as f32 / pixels.len() as f32;
        Ok(EngineOutput::Probability(fraction / self.saturation))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Actuation
// ────────────────────────────────────────────────────────────────────────────

/// Pan stepper that moves the world.  Turning right shifts the target left in
/// the image.
pub struct SimAimer {
    world: SharedWorld,
}

impl Aimer for SimAimer {
    fn id(&self) -> &str {
        "sim_pan"
    }

    fn emit_aim(&mut self, steps: i32) -> Result<(), TurretError> {
        let mut world = lock(&self.world);
        world.target_offset_steps -= steps;
        world.aim_commands += 1;
        Ok(())
    }
}

/// Trigger that counts shots.  A shot always hits and respawns the target.
pub struct SimTrigger {
    world: SharedWorld,
}

impl Trigger for SimTrigger {
    fn id(&self) -> &str {
        "sim_trigger"
    }

    fn emit_fire(&mut self) -> Result<(), TurretError> {
        lock(&self.world).register_hit();
        Ok(())
    }
}

/// Readiness either follows the world's reload counter or replays a script.
pub struct SimReadiness {
    world: SharedWorld,
    script: Option<VecDeque<bool>>,
}

impl ReadinessSensor for SimReadiness {
    fn id(&self) -> &str {
        "sim_loader"
    }

    fn is_ready_to_fire(&mut self) -> bool {
        if let Some(script) = self.script.as_mut() {
            // An exhausted script reports ready.
            return script.pop_front().unwrap_or(true);
        }
        let mut world = lock(&self.world);
        if world.reload_remaining > 0 {
            world.reload_remaining -= 1;
            false
        } else {
            true
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// Builds a [`TurretRig`] wired to simulated drivers over one world.
pub struct SimRig {
    world: SharedWorld,
    readiness_script: Option<Vec<bool>>,
}

impl SimRig {
    pub fn new(world: SharedWorld) -> Self {
        Self {
            world,
            readiness_script: None,
        }
    }

    /// Replace the reload model with a fixed sequence of readiness answers.
    pub fn with_readiness_script(mut self, script: Vec<bool>) -> Self {
        self.readiness_script = Some(script);
        self
    }

    pub fn build(self) -> TurretRig {
        TurretRig::new(
            Box::new(SimAimer {
                world: self.world.clone(),
            }),
            Box::new(SimTrigger {
                world: self.world.clone(),
            }),
            Box::new(SimReadiness {
                world: self.world,
                script: self.readiness_script.map(VecDeque::from),
            }),
        )
    }
}
