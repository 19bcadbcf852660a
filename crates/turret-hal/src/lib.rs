//! `turret-hal` – collaborator boundary of the detection core.
//!
//! Everything the core consumes from the outside world is expressed as a
//! trait here, so drivers can be swapped without touching the scan or
//! targeting logic.
//!
//! # Modules
//!
//! - [`camera`] – [`Camera`][camera::Camera] frame grabbing plus the
//!   grayscale center crop that turns a sensor frame into the 288×288 image
//!   the scan engine works on.
//! - [`frame_store`] – [`ImageSource`][frame_store::ImageSource] and
//!   [`RegionReader`][frame_store::RegionReader], the two halves of raw image
//!   access, with an in-memory store and a camera-backed source.
//! - [`pgm`] – [`PgmStore`][pgm::PgmStore]: binary PGM persistence with
//!   row-by-row region reads.
//! - [`inference`] – [`InferenceEngine`][inference::InferenceEngine] and the
//!   normalisation of raw / quantized classifier output.
//! - [`timed`] – [`TimedEngine`][timed::TimedEngine]: enforces a timeout on
//!   every inference call.
//! - [`actuation`] – [`Aimer`][actuation::Aimer],
//!   [`Trigger`][actuation::Trigger], [`ReadinessSensor`][actuation::ReadinessSensor]
//!   and the [`TurretRig`][actuation::TurretRig] that dispatches commands.
//! - [`sim`] – simulated world, camera, engine and rig for demos and CI.

pub mod actuation;
pub mod camera;
pub mod frame_store;
pub mod inference;
pub mod pgm;
pub mod sim;
pub mod timed;

pub use actuation::{Aimer, ReadinessSensor, Trigger, TurretRig};
pub use camera::{Camera, CameraFrame, GrayFrame, PixelFormat, StillCamera};
pub use frame_store::{CameraSource, FrameSink, ImageSource, MemoryFrameStore, RegionReader};
pub use inference::{EngineOutput, InferenceEngine};
pub use pgm::{PgmRegionReader, PgmStore};
pub use timed::TimedEngine;
