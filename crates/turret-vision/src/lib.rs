//! `turret-vision` – hierarchical region search.
//!
//! Locates a target inside a 288×288 image by asking a binary classifier
//! about progressively smaller regions and reports the 3×3 grid cell it
//! lands in.
//!
//! # Modules
//!
//! - [`sampler`] – bounds-checked region reads and the bilinear resize to
//!   the 96×96 classifier input.
//! - [`scorer`] – [`ConfidenceScorer`][scorer::ConfidenceScorer]: wraps an
//!   engine and never fails.
//! - [`probe`] – [`RegionProbe`][probe::RegionProbe]: sample + score of one
//!   region, the unit every search is written against.
//! - [`grid`] – cell geometry and mapping of pixel points to global cells.
//! - [`scan`] – the [`ScanStrategy`][scan::ScanStrategy] trait with
//!   [`EscalatingSearch`][scan::EscalatingSearch] and
//!   [`CenterPrioritySearch`][scan::CenterPrioritySearch].
//! - [`verify`] – [`Verifier`][verify::Verifier]: any-of-N re-scoring of a
//!   candidate cell.

pub mod grid;
pub mod probe;
pub mod sampler;
pub mod scan;
pub mod scorer;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use probe::{RegionProbe, SamplingProbe};
pub use scan::{
    CenterPrioritySearch, EscalatingSearch, ScanConfig, ScanHit, ScanStrategy, StrategyKind,
};
pub use scorer::ConfidenceScorer;
pub use verify::Verifier;
