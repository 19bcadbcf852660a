//! `turret-runtime` – the detection-to-actuation loop.
//!
//! # Modules
//!
//! - [`targeting`] – [`TargetingController`][targeting::TargetingController]:
//!   the persistent state machine that turns verified detections into
//!   no-op, aim or fire commands, gated by readiness and post-fire cooldown.
//! - [`miss_guard`] – [`MissGuard`][miss_guard::MissGuard]: counts
//!   consecutive empty cycles and, when enabled, tells the controller to give
//!   up on a lost target.
//! - [`detection_loop`] – [`DetectionLoop`][detection_loop::DetectionLoop]:
//!   one capture → scan → verify → decide → actuate cycle per
//!   [`tick`][detection_loop::DetectionLoop::tick].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable trace export.

pub mod detection_loop;
pub mod miss_guard;
pub mod targeting;
pub mod telemetry;

pub use detection_loop::{DetectionLoop, DetectionLoopConfig};
pub use miss_guard::MissGuard;
pub use targeting::{CooldownProfile, Decision, TargetingConfig, TargetingController};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
