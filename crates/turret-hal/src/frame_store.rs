//! Raw image access: capture on one side, region reads on the other.
//!
//! The detection core never holds pixels.  An [`ImageSource`] produces an
//! [`ImageDescriptor`] per cycle, and the scan engine asks a
//! [`RegionReader`] for the rectangles it wants to classify.  Both halves
//! usually share one backing store ([`MemoryFrameStore`] or
//! [`PgmStore`][crate::pgm::PgmStore]).

use std::sync::{Arc, Mutex};

use tracing::debug;
use turret_types::{ImageDescriptor, Region, TurretError};

use crate::camera::{Camera, GrayFrame};

/// Produces a fresh image per detection cycle.
pub trait ImageSource: Send {
    /// Capture a new image and return its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] when no image could be
    /// produced.  The caller skips the cycle.
    fn capture(&mut self) -> Result<ImageDescriptor, TurretError>;
}

/// Reads rectangular pixel regions of a previously captured image.
pub trait RegionReader: Send {
    /// Return the `region.width * region.height` bytes of `region`, row-major.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::RegionReadFailure`] if the backing store cannot
    /// serve the region (missing file, stale frame, short read).
    fn read_region(
        &mut self,
        image: &ImageDescriptor,
        region: Region,
    ) -> Result<Vec<u8>, TurretError>;
}

/// Destination for cropped frames.
pub trait FrameSink: Send {
    /// Persist `frame` and return the descriptor callers use to read it back.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::CaptureUnavailable`] when the frame cannot be
    /// stored.
    fn store(&mut self, frame: GrayFrame) -> Result<ImageDescriptor, TurretError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Slot {
    frame: Option<GrayFrame>,
    frame_id: u64,
    reads: u64,
}

/// Holds the most recent frame in memory.  Clones share the same slot, so one
/// handle can act as the sink while another serves region reads.
#[derive(Clone, Default)]
pub struct MemoryFrameStore {
    slot: Arc<Mutex<Slot>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame and return a descriptor with a new frame id.
    pub fn publish(&self, frame: GrayFrame) -> ImageDescriptor {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.frame_id += 1;
        let descriptor = ImageDescriptor::new(frame.width, frame.height, slot.frame_id);
        slot.frame = Some(frame);
        descriptor
    }

    /// Number of successful region reads served so far.
    pub fn reads(&self) -> u64 {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).reads
    }
}

impl FrameSink for MemoryFrameStore {
    fn store(&mut self, frame: GrayFrame) -> Result<ImageDescriptor, TurretError> {
        Ok(self.publish(frame))
    }
}

impl RegionReader for MemoryFrameStore {
    fn read_region(
        &mut self,
        image: &ImageDescriptor,
        region: Region,
    ) -> Result<Vec<u8>, TurretError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.frame_id != image.frame_id {
            return Err(TurretError::RegionReadFailure {
                region,
                details: format!(
                    "frame {} is stale, store holds frame {}",
                    image.frame_id, slot.frame_id
                ),
            });
        }
        let pixels = slot
            .frame
            .as_ref()
            .and_then(|f| f.copy_region(region))
            .ok_or_else(|| TurretError::RegionReadFailure {
                region,
                details: "region not available in stored frame".to_string(),
            })?;
        slot.reads += 1;
        Ok(pixels)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Camera-backed source
// ────────────────────────────────────────────────────────────────────────────

/// Grabs a frame from a [`Camera`], crops it to a square and hands it to a
/// [`FrameSink`].
pub struct CameraSource<C: Camera, S: FrameSink> {
    camera: C,
    sink: S,
    crop: u32,
}

impl<C: Camera, S: FrameSink> CameraSource<C, S> {
    pub fn new(camera: C, sink: S, crop: u32) -> Self {
        Self { camera, sink, crop }
    }
}

impl<C: Camera, S: FrameSink> ImageSource for CameraSource<C, S> {
    fn capture(&mut self) -> Result<ImageDescriptor, TurretError> {
        let frame = self.camera.capture()?;
        let gray = frame.center_crop_gray(self.crop)?;
        let descriptor = self.sink.store(gray)?;
        debug!(
            camera = self.camera.id(),
            frame_id = descriptor.frame_id,
            "frame captured"
        );
        Ok(descriptor)
    }
}
