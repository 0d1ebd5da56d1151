//! Harmonic assembly: forward transforms and power spectra.
//!
//! [`HarmonicEngine`] owns every per-resolution cache (ring geometry, phase
//! tables, spin-harmonic tables) plus the shared log table, so independent
//! engines never share hidden state. Each transform runs as a map-reduce
//! over orders `m ∈ [0, lmax]`: every order writes its own slice of a
//! pre-sized [`Alm`] buffer, so the result does not depend on scheduling.

use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use ndarray::Array2;
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use serde::Serialize;

use crate::alm::Alm;
use crate::cache::{CacheStats, ResolutionCache};
use crate::config::EngineConfig;
use crate::error::{TransformError, TransformResult};
use crate::geometry::RingSet;
use crate::legendre::{LegendreBlock, LegendreRecurrence, LogTable};
use crate::logging::{log_transform, TransformLogEntry};
use crate::pixel::{self, PixelOrdering};
use crate::power::{accumulate_spectra, FieldHarmonics, PowerSpectra, SkyMaps};
use crate::spectral::{complex_ring_spectra, real_ring_spectra, weighted_sum, PhaseTable};
use crate::spin::{builder_for, SpinHarmonicBuilder, SpinHarmonicTable};

/// Occupancy and hit rates of the engine's caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCacheStats {
    pub rings: CacheStats,
    pub phases: CacheStats,
    pub spins: CacheStats,
}

/// Spherical-harmonic transform engine for HEALPix maps.
///
/// # Examples
///
/// ```
/// use healpix_harmonic_core::{EngineConfig, HarmonicEngine, PixelOrdering};
///
/// let engine = HarmonicEngine::new(EngineConfig::default()).unwrap();
/// let map = vec![1.0; 12 * 4 * 4];
/// let alm = engine.map2alm(&map, PixelOrdering::Ring).unwrap();
///
/// let a00 = alm.get(0, 0).unwrap();
/// assert!((a00.re - (4.0 * std::f64::consts::PI).sqrt()).abs() < 1e-12);
/// ```
pub struct HarmonicEngine {
    config: EngineConfig,
    rings: ResolutionCache<usize, RingSet>,
    phases: ResolutionCache<usize, PhaseTable>,
    spins: ResolutionCache<(i32, usize), SpinHarmonicTable>,
    logs: RwLock<Arc<LogTable>>,
    recurrence: LegendreRecurrence,
    spin_builder: Box<dyn SpinHarmonicBuilder>,
}

impl HarmonicEngine {
    pub fn new(config: EngineConfig) -> TransformResult<Self> {
        config.validate()?;
        let capacity = NonZeroUsize::new(config.cache_capacity).ok_or_else(|| {
            TransformError::invalid_parameter("cache_capacity", "0", ">= 1")
        })?;
        let recurrence = LegendreRecurrence::new(config.limit_range)?;
        let spin_builder = builder_for(config.spin_strategy, config.limit_range)?;

        tracing::debug!(
            strategy = spin_builder.name(),
            capacity = config.cache_capacity,
            parallel = config.parallel,
            "harmonic engine ready"
        );

        Ok(Self {
            rings: ResolutionCache::new("rings", capacity),
            phases: ResolutionCache::new("phases", capacity),
            spins: ResolutionCache::new("spins", capacity),
            logs: RwLock::new(Arc::new(LogTable::new())),
            recurrence,
            spin_builder,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ring layout for `nside`, built on first use.
    pub fn ring_geometry(&self, nside: usize) -> TransformResult<Arc<RingSet>> {
        pixel::check_nside(nside, self.config.max_nside)?;
        self.rings
            .get_or_try_insert_with(nside, |&n| RingSet::build(n))
    }

    /// `exp(−i m φ_r)` corrector for `nside`, built on first use.
    pub fn phase_table(&self, nside: usize) -> TransformResult<Arc<PhaseTable>> {
        let rings = self.ring_geometry(nside)?;
        self.phases
            .get_or_try_insert_with(nside, |_| Ok(PhaseTable::build(&rings)))
    }

    /// Plus/minus spin harmonics for `(spin, nside)`, built on first use
    /// with the configured strategy.
    pub fn spin_table(&self, spin: i32, nside: usize) -> TransformResult<Arc<SpinHarmonicTable>> {
        let rings = self.ring_geometry(nside)?;
        let logs = self.logs_to(4 * rings.lmax() + 4);
        self.spins.get_or_try_insert_with((spin, nside), |&(s, _)| {
            self.spin_builder.build(s, &rings, &logs)
        })
    }

    /// Normalized Legendre block `P̃_{lm}` of order `m` at the ring
    /// colatitudes of `nside`.
    pub fn legendre_block(&self, m: usize, nside: usize) -> TransformResult<LegendreBlock> {
        let rings = self.ring_geometry(nside)?;
        let logs = self.logs_to(2 * rings.lmax() + 2);
        self.recurrence
            .compute(m, rings.lmax(), &rings.cos_colatitudes(), &logs)
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            rings: self.rings.stats(),
            phases: self.phases.stats(),
            spins: self.spins.stats(),
        }
    }

    pub fn clear_caches(&self) {
        self.rings.clear();
        self.phases.clear();
        self.spins.clear();
    }

    /// Forward scalar transform
    /// `a_lm = Σ_r P̃_lm(θ_r) / (12N²) · F_r(m)`.
    pub fn map2alm(&self, map: &[f64], ordering: PixelOrdering) -> TransformResult<Alm> {
        let started = Instant::now();
        let nside = pixel::nside_from_npix(map.len())?;
        let alm = self.scalar_alm(map, nside, ordering)?;
        self.finish("map2alm", nside, None, started);
        Ok(alm)
    }

    /// Forward spin transform of a `(Q, U)` pair into `(E, B)`.
    ///
    /// With `T± = Σ_r Ω·±sY_lm(θ_r) · F±_r(m)` over the ring spectra of
    /// `Q ± iU`, `E = −(T⁺ + T⁻)/2` and `B = (T⁺ − T⁻)/(2i)`. Spin 0 is two
    /// scalar transforms.
    pub fn map2alm_spin(
        &self,
        q: &[f64],
        u: &[f64],
        spin: i32,
        ordering: PixelOrdering,
    ) -> TransformResult<(Alm, Alm)> {
        if q.len() != u.len() {
            return Err(TransformError::shape_mismatch(q.len(), u.len(), "U map"));
        }
        if spin == 0 {
            return Ok((self.map2alm(q, ordering)?, self.map2alm(u, ordering)?));
        }

        let started = Instant::now();
        let nside = pixel::nside_from_npix(q.len())?;
        let result = self.spin_alm(q, u, spin, nside, ordering)?;
        self.finish("map2alm_spin", nside, Some(spin), started);
        Ok(result)
    }

    /// L2 and L1 power spectra of `maps`, or cross-spectra against `cross`.
    ///
    /// Intensity input yields TT; polarization yields EE, BB, EB; full input
    /// yields TT, EE, BB, TE, EB, TB.
    pub fn anafast(
        &self,
        maps: &SkyMaps<'_>,
        cross: Option<&SkyMaps<'_>>,
        ordering: PixelOrdering,
        spin: i32,
    ) -> TransformResult<PowerSpectra> {
        let started = Instant::now();
        let npix = maps.pixel_count()?;
        let nside = pixel::nside_from_npix(npix)?;
        if let Some(other) = cross {
            if !maps.same_kind(other) {
                return Err(TransformError::shape_mismatch(
                    maps.kinds().len(),
                    other.kinds().len(),
                    "cross-spectrum map components",
                ));
            }
            let other_npix = other.pixel_count()?;
            if other_npix != npix {
                return Err(TransformError::shape_mismatch(
                    npix,
                    other_npix,
                    "cross-spectrum map",
                ));
            }
        }

        let first = self.field_harmonics(maps, nside, ordering, spin)?;
        let second = match cross {
            Some(other) => Some(self.field_harmonics(other, nside, ordering, spin)?),
            None => None,
        };
        let spectra =
            accumulate_spectra(maps.kinds(), pixel::lmax(nside), &first, second.as_ref())?;

        self.finish("anafast", nside, maps.polarization().map(|_| spin), started);
        Ok(spectra)
    }

    fn field_harmonics(
        &self,
        maps: &SkyMaps<'_>,
        nside: usize,
        ordering: PixelOrdering,
        spin: i32,
    ) -> TransformResult<FieldHarmonics> {
        let t = match maps.temperature() {
            Some(t) => Some(self.scalar_alm(t, nside, ordering)?),
            None => None,
        };
        let (e, b) = match maps.polarization() {
            Some((q, u)) if spin == 0 => (
                Some(self.scalar_alm(q, nside, ordering)?),
                Some(self.scalar_alm(u, nside, ordering)?),
            ),
            Some((q, u)) => {
                let (e, b) = self.spin_alm(q, u, spin, nside, ordering)?;
                (Some(e), Some(b))
            }
            None => (None, None),
        };
        Ok(FieldHarmonics { t, e, b })
    }

    fn scalar_alm(
        &self,
        map: &[f64],
        nside: usize,
        ordering: PixelOrdering,
    ) -> TransformResult<Alm> {
        let map = self.ring_ordered(map, nside, ordering)?;
        let rings = self.ring_geometry(nside)?;
        let phases = self.phase_table(nside)?;
        let spectra = real_ring_spectra(
            &map,
            &rings,
            &phases,
            self.config.real_fft,
            self.config.parallel,
        )?;

        let lmax = rings.lmax();
        let logs = self.logs_to(2 * lmax + 2);
        let logs: &LogTable = &logs;
        let cos = rings.cos_colatitudes();
        let scale = 1.0 / pixel::npix(nside) as f64;

        let mut alm = Alm::zeros(lmax);
        self.for_each_order(alm.order_slots_mut(), |(m, slot)| {
            let block = self.recurrence.compute(m, lmax, &cos, logs)?;
            let column = spectra.column(m);
            for (k, value) in slot.iter_mut().enumerate() {
                *value = weighted_sum(block.degree(m + k), column) * scale;
            }
            Ok(())
        })?;
        Ok(alm)
    }

    fn spin_alm(
        &self,
        q: &[f64],
        u: &[f64],
        spin: i32,
        nside: usize,
        ordering: PixelOrdering,
    ) -> TransformResult<(Alm, Alm)> {
        let q = self.ring_ordered(q, nside, ordering)?;
        let u = self.ring_ordered(u, nside, ordering)?;
        let rings = self.ring_geometry(nside)?;
        let phases = self.phase_table(nside)?;
        let table = self.spin_table(spin, nside)?;

        let plus_field: Vec<Complex64> = q
            .iter()
            .zip(u.iter())
            .map(|(&a, &b)| Complex64::new(a, b))
            .collect();
        let minus_field: Vec<Complex64> = plus_field.iter().map(|z| z.conj()).collect();
        let plus = complex_ring_spectra(&plus_field, &rings, &phases, self.config.parallel)?;
        let minus = complex_ring_spectra(&minus_field, &rings, &phases, self.config.parallel)?;

        let lmax = rings.lmax();
        let mut e = Alm::zeros(lmax);
        let mut b = Alm::zeros(lmax);
        let slots: Vec<_> = e
            .order_slots_mut()
            .into_iter()
            .zip(b.order_slots_mut())
            .map(|((m, e_slot), (_, b_slot))| (m, e_slot, b_slot))
            .collect();

        self.for_each_order(slots, |(m, e_slot, b_slot)| {
            spin_order(&table, &plus, &minus, m, e_slot, b_slot);
            Ok(())
        })?;
        Ok((e, b))
    }

    fn for_each_order<T, F>(&self, slots: Vec<T>, job: F) -> TransformResult<()>
    where
        T: Send,
        F: Fn(T) -> TransformResult<()> + Sync + Send,
    {
        if self.config.parallel {
            slots.into_par_iter().try_for_each(job)
        } else {
            slots.into_iter().try_for_each(job)
        }
    }

    fn ring_ordered<'a>(
        &self,
        map: &'a [f64],
        nside: usize,
        ordering: PixelOrdering,
    ) -> TransformResult<Cow<'a, [f64]>> {
        if map.len() != pixel::npix(nside) {
            return Err(TransformError::shape_mismatch(
                pixel::npix(nside),
                map.len(),
                "input map",
            ));
        }
        match ordering {
            PixelOrdering::Ring => Ok(Cow::Borrowed(map)),
            PixelOrdering::Nested => Ok(Cow::Owned(pixel::nested_to_ring(map)?)),
        }
    }

    /// Snapshot of the log table covering `[0, n)`. Growth swaps in an
    /// extended copy, so no guard outlives this call.
    fn logs_to(&self, n: usize) -> Arc<LogTable> {
        // The table only ever grows, so a poisoned lock still holds
        // valid entries.
        {
            let logs = self.logs.read().unwrap_or_else(PoisonError::into_inner);
            if logs.limit() >= n {
                return Arc::clone(&logs);
            }
        }
        let mut logs = self.logs.write().unwrap_or_else(PoisonError::into_inner);
        if logs.limit() < n {
            let mut grown = LogTable::clone(&logs);
            grown.extend_to(n);
            *logs = Arc::new(grown);
        }
        Arc::clone(&logs)
    }

    fn finish(&self, operation: &str, nside: usize, spin: Option<i32>, started: Instant) {
        let elapsed = started.elapsed();
        tracing::info!(
            operation,
            nside,
            spin = ?spin,
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "transform complete"
        );
        if let Some(path) = &self.config.log_path {
            let entry =
                TransformLogEntry::new(operation, nside, pixel::lmax(nside), spin, elapsed);
            if let Err(err) = log_transform(path, &entry) {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to write transform log"
                );
            }
        }
    }
}

fn spin_order(
    table: &SpinHarmonicTable,
    plus: &Array2<Complex64>,
    minus: &Array2<Complex64>,
    m: usize,
    e_slot: &mut [Complex64],
    b_slot: &mut [Complex64],
) {
    let plus_column = plus.column(m);
    let minus_column = minus.column(m);
    let plus_rows = table.plus(m);
    let minus_rows = table.minus(m);
    let half_i = Complex64::new(0.0, 0.5);

    for (k, (e, b)) in e_slot.iter_mut().zip(b_slot.iter_mut()).enumerate() {
        let tp = weighted_sum(plus_rows.row(k), plus_column);
        let tm = weighted_sum(minus_rows.row(k), minus_column);
        *e = -(tp + tm) * 0.5;
        // (T⁺ − T⁻)/(2i) = −(i/2)(T⁺ − T⁻)
        *b = -half_i * (tp - tm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn engine() -> HarmonicEngine {
        HarmonicEngine::new(EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_constant_map_monopole() {
        let engine = engine();
        let alm = engine.map2alm(&vec![1.0; 192], PixelOrdering::Ring).unwrap();
        assert_eq!(alm.lmax(), 11);
        assert!((alm.get(0, 0).unwrap().re - (4.0 * PI).sqrt()).abs() < 1e-12);
        for (m, order) in alm.orders().skip(1) {
            for v in order {
                assert!(v.norm() < 1e-12, "m={} {}", m, v);
            }
        }
        for l in (1..=11).step_by(2) {
            assert!(alm.get(l, 0).unwrap().norm() < 1e-10);
        }
    }

    #[test]
    fn test_caches_are_reused() {
        let engine = engine();
        let map = vec![0.5; 48];
        engine.map2alm(&map, PixelOrdering::Ring).unwrap();
        engine.map2alm(&map, PixelOrdering::Ring).unwrap();
        let stats = engine.cache_stats();
        assert_eq!(stats.rings.misses, 1);
        assert!(stats.rings.hits >= 2);
        assert_eq!(stats.phases.misses, 1);
        assert_eq!(stats.phases.hits, 1);
        assert_eq!(stats.spins.len, 0);

        engine.clear_caches();
        assert_eq!(engine.cache_stats().rings.len, 0);
    }

    #[test]
    fn test_spin_table_is_memoized_per_spin() {
        let engine = engine();
        let a = engine.spin_table(2, 2).unwrap();
        let b = engine.spin_table(2, 2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        engine.spin_table(-2, 2).unwrap();
        assert_eq!(engine.cache_stats().spins.len, 2);
    }

    #[test]
    fn test_legendre_block_at_ring_cosines() {
        let engine = engine();
        let block = engine.legendre_block(0, 2).unwrap();
        assert_eq!(block.values().dim(), (6, 7));
        assert!(block
            .degree(0)
            .iter()
            .all(|v| (v - (4.0 * PI).sqrt()).abs() < 1e-13));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        let engine = engine();
        assert!(matches!(
            engine.map2alm(&[0.0; 50], PixelOrdering::Ring),
            Err(TransformError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            engine.map2alm_spin(&[0.0; 48], &[0.0; 192], 2, PixelOrdering::Ring),
            Err(TransformError::ShapeMismatch { .. })
        ));
        // N = 3 has no nested ordering.
        assert!(matches!(
            engine.map2alm(&[0.0; 108], PixelOrdering::Nested),
            Err(TransformError::InvalidResolution { nside: 3, .. })
        ));
        assert!(matches!(
            engine.ring_geometry(0),
            Err(TransformError::InvalidResolution { .. })
        ));
    }

    #[test]
    fn test_max_nside_is_enforced() {
        let config = EngineConfig {
            max_nside: 2,
            ..EngineConfig::default()
        };
        let engine = HarmonicEngine::new(config).unwrap();
        assert!(engine.map2alm(&[1.0; 48], PixelOrdering::Ring).is_ok());
        assert!(matches!(
            engine.map2alm(&[1.0; 192], PixelOrdering::Ring),
            Err(TransformError::InvalidResolution { nside: 4, .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            cache_capacity: 0,
            ..EngineConfig::default()
        };
        match HarmonicEngine::new(config) {
            Err(TransformError::InvalidParameter {
                parameter, value, ..
            }) => {
                assert_eq!(parameter, "cache_capacity");
                assert_eq!(value, "0");
            }
            other => panic!("unexpected {:?}", other.err()),
        }

        let config = EngineConfig {
            limit_range: 1.5,
            ..EngineConfig::default()
        };
        let err = HarmonicEngine::new(config).err().unwrap();
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'limit_range' = '1.5': must satisfy 0 < limit_range < 1"
        );
    }

    #[test]
    fn test_engine_is_usable_from_rayon_tasks() {
        let engine = engine();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        let maps: Vec<Vec<f64>> = [2, 4, 8]
            .iter()
            .map(|&nside| {
                (0..pixel::npix(nside))
                    .map(|p| (p as f64 * 0.37).sin())
                    .collect()
            })
            .collect();
        let jobs: Vec<(i32, usize)> = (0..4)
            .flat_map(|_| [-2, 1, 2, 3])
            .flat_map(|spin| (0..maps.len()).map(move |k| (spin, k)))
            .collect();

        let results: Vec<bool> = pool.install(|| {
            jobs.par_iter()
                .map(|&(spin, k)| {
                    engine
                        .map2alm_spin(&maps[k], &maps[k], spin, PixelOrdering::Ring)
                        .is_ok()
                })
                .collect()
        });
        assert!(results.iter().all(|&ok| ok));
        assert_eq!(engine.cache_stats().spins.len, 12);

        let sequential = HarmonicEngine::new(EngineConfig {
            parallel: false,
            ..EngineConfig::default()
        })
        .unwrap();
        for &(spin, k) in &jobs[..12] {
            assert_eq!(
                engine
                    .map2alm_spin(&maps[k], &maps[k], spin, PixelOrdering::Ring)
                    .unwrap(),
                sequential
                    .map2alm_spin(&maps[k], &maps[k], spin, PixelOrdering::Ring)
                    .unwrap()
            );
        }
    }
}
