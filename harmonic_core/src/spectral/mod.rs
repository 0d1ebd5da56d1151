//! Ring-level spectral primitives.
//!
//! Splits a pixelized map into per-ring Fourier spectra aligned to a common
//! longitude origin, and provides the deterministic reductions used when
//! those spectra are projected onto harmonic tables.

pub mod accumulate;
pub mod fft;
pub mod phase;

pub use accumulate::{compensated_sum, weighted_sum};
pub use fft::{complex_ring_spectra, real_ring_spectra, RingFftPlans};
pub use phase::PhaseTable;
