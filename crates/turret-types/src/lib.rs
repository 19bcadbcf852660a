use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Logical width of the image the scan engine works on.
pub const IMAGE_WIDTH: u32 = 288;
/// Logical height of the image the scan engine works on.
pub const IMAGE_HEIGHT: u32 = 288;

/// Width of the classifier input, in pixels.
pub const MODEL_INPUT_WIDTH: u32 = 96;
/// Height of the classifier input, in pixels.
pub const MODEL_INPUT_HEIGHT: u32 = 96;

/// Rows and columns of the targeting grid.
pub const GRID_DIM: u8 = 3;

/// Scores strictly above this value count as a positive region.
pub const CONFIDENCE_THRESHOLD: f32 = 0.75;

/// Axis-aligned pixel rectangle inside an [`ImageDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering a whole `width × height` image.
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Number of pixels covered by the region.
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// `true` when the region is non-empty and lies entirely inside an image
    /// of the given size.
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && u64::from(self.x) + u64::from(self.width) <= u64::from(image_width)
            && u64::from(self.y) + u64::from(self.height) <= u64::from(image_height)
    }

    /// Integer pixel center, rounded towards the top-left corner.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// `true` when the two regions share at least one pixel.
    pub fn overlaps(&self, other: &Region) -> bool {
        let (ax1, ay1) = (
            u64::from(self.x) + u64::from(self.width),
            u64::from(self.y) + u64::from(self.height),
        );
        let (bx1, by1) = (
            u64::from(other.x) + u64::from(other.width),
            u64::from(other.y) + u64::from(other.height),
        );
        u64::from(self.x) < bx1
            && u64::from(other.x) < ax1
            && u64::from(self.y) < by1
            && u64::from(other.y) < ay1
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({},{} {}x{})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A captured still image, as seen by the detection core.
///
/// The pixels themselves stay with the capture subsystem; the core only holds
/// the `frame_id` handle and asks a
/// `RegionReader` for the regions it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
    /// Opaque handle identifying the stored frame.
    pub frame_id: u64,
    pub captured_at: DateTime<Utc>,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32, frame_id: u64) -> Self {
        Self {
            width,
            height,
            frame_id,
            captured_at: Utc::now(),
        }
    }

    /// The region covering the whole image.
    pub fn full_region(&self) -> Region {
        Region::full(self.width, self.height)
    }

    /// `true` when `region` satisfies the containment invariant for this image.
    pub fn contains(&self, region: &Region) -> bool {
        region.fits_within(self.width, self.height)
    }
}

/// Fixed-size 96×96 single-channel buffer handed to the classifier.
#[derive(Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    data: Vec<u8>,
}

impl SampleBuffer {
    pub const LEN: usize = (MODEL_INPUT_WIDTH * MODEL_INPUT_HEIGHT) as usize;

    /// An all-black buffer.
    pub fn zeroed() -> Self {
        Self {
            data: vec![0u8; Self::LEN],
        }
    }

    /// Wrap an existing row-major pixel vector.  Returns `None` unless it holds
    /// exactly [`SampleBuffer::LEN`] bytes.
    pub fn from_vec(data: Vec<u8>) -> Option<Self> {
        (data.len() == Self::LEN).then_some(Self { data })
    }

    pub fn width(&self) -> u32 {
        MODEL_INPUT_WIDTH
    }

    pub fn height(&self) -> u32 {
        MODEL_INPUT_HEIGHT
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[(y * MODEL_INPUT_WIDTH + x) as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mean = self.data.iter().map(|&p| u64::from(p)).sum::<u64>() / Self::LEN as u64;
        f.debug_struct("SampleBuffer")
            .field("width", &MODEL_INPUT_WIDTH)
            .field("height", &MODEL_INPUT_HEIGHT)
            .field("mean", &mean)
            .finish()
    }
}

/// A target located in one cell of the 3×3 grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub row: u8,
    pub col: u8,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Detection {
    pub fn new(row: u8, col: u8, confidence: f32) -> Self {
        Self {
            row,
            col,
            confidence,
        }
    }

    /// `true` for the center cell `(1, 1)`.
    pub fn is_centered(&self) -> bool {
        self.row == 1 && self.col == 1
    }
}

/// Result of one scan over an image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detection")]
pub enum ScanOutcome {
    Found(Detection),
    NotFound,
}

impl ScanOutcome {
    pub fn detection(&self) -> Option<&Detection> {
        match self {
            ScanOutcome::Found(d) => Some(d),
            ScanOutcome::NotFound => None,
        }
    }
}

impl From<Option<Detection>> for ScanOutcome {
    fn from(value: Option<Detection>) -> Self {
        value.map_or(ScanOutcome::NotFound, ScanOutcome::Found)
    }
}

/// Process-wide targeting state.  Persists across detection cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingState {
    #[default]
    Idle,
    Tracking,
    Centered,
    Firing,
    Cooldown,
}

impl std::fmt::Display for TargetingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TargetingState::Idle => "idle",
            TargetingState::Tracking => "tracking",
            TargetingState::Centered => "centered",
            TargetingState::Firing => "firing",
            TargetingState::Cooldown => "cooldown",
        };
        f.write_str(s)
    }
}

/// Logical actuation command issued by the targeting controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "command", content = "payload")]
pub enum ActuationCommand {
    /// Hold position; nothing is sent to the hardware.
    #[default]
    NoOp,
    /// Rotate the aiming axis by `steps` (negative = left).
    Aim { steps: i32 },
    /// Release one shot.
    Fire,
}

impl ActuationCommand {
    pub fn label(&self) -> &'static str {
        match self {
            ActuationCommand::NoOp => "no-op",
            ActuationCommand::Aim { .. } => "aim",
            ActuationCommand::Fire => "fire",
        }
    }
}

/// Summary of one completed detection cycle, suitable for structured logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub frame_id: u64,
    pub outcome: ScanOutcome,
    /// Controller state after the cycle.
    pub state: TargetingState,
    pub command: ActuationCommand,
    /// How long the driver should wait before the next capture.
    pub settle_ms: u64,
}

/// Error taxonomy of the detection core.  None of these are fatal: the loop
/// always degrades to "not found" / no-op.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TurretError {
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Region read failed for {region}: {details}")]
    RegionReadFailure { region: Region, details: String },

    #[error("Score unavailable: {0}")]
    ScoreUnavailable(String),

    #[error("Region {region} out of bounds for {image_width}x{image_height} image")]
    OutOfBounds {
        region: Region,
        image_width: u32,
        image_height: u32,
    },

    #[error("Actuation fault on {component}: {details}")]
    ActuationFault { component: String, details: String },
}
