//! # HEALPix Harmonic Core
//!
//! Forward spherical-harmonic transforms and angular power spectra for maps
//! on the HEALPix equal-area pixelization, including spin-weighted
//! (Q/U → E/B) fields.
//!
//! ## Quick Start
//!
//! ```rust
//! use healpix_harmonic_core::{EngineConfig, HarmonicEngine, PixelOrdering, SkyMaps, SpectrumKind};
//!
//! let engine = HarmonicEngine::new(EngineConfig::default()).unwrap();
//!
//! // N = 4: 192 pixels, lmax = 11
//! let map: Vec<f64> = (0..192).map(|i| (i as f64 * 0.1).sin()).collect();
//! let alm = engine.map2alm(&map, PixelOrdering::Ring).unwrap();
//! println!("a_00 = {}", alm.get(0, 0).unwrap());
//!
//! let spectra = engine
//!     .anafast(&SkyMaps::Intensity(&map), None, PixelOrdering::Ring, 2)
//!     .unwrap();
//! println!("C_1 = {}", spectra.get(SpectrumKind::TT).unwrap()[1]);
//! ```
//!
//! ## Core Modules
//!
//! - [`geometry`] - Iso-latitude ring layout per resolution
//! - [`legendre`] - Log-rescaled associated Legendre recurrence
//! - [`spin`] - Spin-weighted harmonic tables (analytic and table strategies)
//! - [`spectral`] - Per-ring FFTs and phase alignment
//! - [`transform`] - `map2alm`, `map2alm_spin` and `anafast`
//! - [`config`] - Engine configuration via TOML
//! - [`logging`] - JSON line-delimited transform log

pub mod alm;
pub mod cache;
pub mod config;
pub mod error;
pub mod geometry;
pub mod legendre;
pub mod logging;
pub mod pixel;
pub mod power;
pub mod spectral;
pub mod spin;
pub mod transform;

pub use alm::{alm_index, alm_size, Alm};
pub use cache::CacheStats;
pub use config::{ConfigError, EngineConfig};
pub use error::{TransformError, TransformResult};
pub use geometry::{Ring, RingSet};
pub use legendre::{LegendreBlock, LegendreRecurrence, LogTable, ScaledValue, DEFAULT_LIMIT_RANGE};
pub use pixel::PixelOrdering;
pub use power::{PowerSpectra, SkyMaps, SpectrumKind};
pub use rustfft::num_complex::Complex64;
pub use spectral::PhaseTable;
pub use spin::{
    AnalyticSpinBuilder, RecursiveWigner, SpinHarmonicBuilder, SpinHarmonicTable, SpinStrategy,
    TableSpinBuilder, WignerEvaluator,
};
pub use transform::{EngineCacheStats, HarmonicEngine};
