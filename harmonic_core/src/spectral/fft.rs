//! Per-ring Fourier decomposition of HEALPix maps.
//!
//! Every ring is transformed independently with a 1-D FFT, truncated to the
//! `3N` orders the harmonic assembly consumes (short polar rings are
//! zero-padded on the high-order side), stacked into a `(ring, order)`
//! array and phase-aligned with the [`PhaseTable`].
//!
//! Real maps can take a real-optimized path: each even-length ring is packed
//! into a half-length complex sequence, transformed, split into its even and
//! odd halves, and the upper half of the spectrum is restored by
//! conjugate-symmetric mirroring.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;

use ndarray::Array2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};

use super::phase::PhaseTable;
use crate::error::{TransformError, TransformResult};
use crate::geometry::{Ring, RingSet};
use crate::pixel;

/// FFT plans for every ring length of one resolution.
pub struct RingFftPlans {
    plans: HashMap<usize, Arc<dyn Fft<f64>>>,
}

impl RingFftPlans {
    /// Plans full-length transforms, and half-length ones when `real_fft`.
    pub fn for_rings(rings: &RingSet, real_fft: bool) -> Self {
        let mut planner = FftPlanner::new();
        let mut plans = HashMap::new();
        for ring in rings.iter() {
            let n = ring.ring_length;
            plans
                .entry(n)
                .or_insert_with(|| planner.plan_fft_forward(n));
            if real_fft && n % 2 == 0 {
                plans
                    .entry(n / 2)
                    .or_insert_with(|| planner.plan_fft_forward(n / 2));
            }
        }
        Self { plans }
    }

    fn plan(&self, len: usize) -> Arc<dyn Fft<f64>> {
        match self.plans.get(&len) {
            Some(plan) => Arc::clone(plan),
            None => FftPlanner::new().plan_fft_forward(len),
        }
    }

    /// Full complex DFT.
    pub fn complex_fft(&self, data: &[Complex64]) -> Vec<Complex64> {
        let mut buffer = data.to_vec();
        if !buffer.is_empty() {
            self.plan(buffer.len()).process(&mut buffer);
        }
        buffer
    }

    /// DFT of real data through a half-length complex transform, mirrored
    /// back to the full spectrum. Odd lengths take the complex path.
    pub fn real_fft(&self, data: &[f64]) -> Vec<Complex64> {
        let n = data.len();
        if n < 2 || n % 2 != 0 {
            let complex: Vec<Complex64> = data.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            return self.complex_fft(&complex);
        }

        let h = n / 2;
        let mut packed: Vec<Complex64> = data
            .chunks_exact(2)
            .map(|pair| Complex64::new(pair[0], pair[1]))
            .collect();
        self.plan(h).process(&mut packed);

        let mut spectrum = vec![Complex64::new(0.0, 0.0); n];
        for k in 0..=h {
            let zk = packed[k % h];
            let zc = packed[(h - k) % h].conj();
            let even = (zk + zc) * 0.5;
            let odd = (zk - zc) * Complex64::new(0.0, -0.5);
            let twiddle = Complex64::from_polar(1.0, -2.0 * PI * k as f64 / n as f64);
            spectrum[k] = even + twiddle * odd;
        }
        for k in h + 1..n {
            spectrum[k] = spectrum[n - k].conj();
        }
        spectrum
    }
}

/// Ring spectra of a real map, `(ring_count, 3N)`.
pub fn real_ring_spectra(
    map: &[f64],
    rings: &RingSet,
    phases: &PhaseTable,
    real_fft: bool,
    parallel: bool,
) -> TransformResult<Array2<Complex64>> {
    check_map_len(map.len(), rings)?;
    let plans = RingFftPlans::for_rings(rings, real_fft);
    let transform = |ring: &Ring| {
        let pixels = &map[ring.start_pixel..ring.start_pixel + ring.ring_length];
        if real_fft {
            plans.real_fft(pixels)
        } else {
            let complex: Vec<Complex64> = pixels.iter().map(|&v| Complex64::new(v, 0.0)).collect();
            plans.complex_fft(&complex)
        }
    };
    Ok(assemble(rings, phases, parallel, transform))
}

/// Ring spectra of a complex field such as `Q ± iU`.
pub fn complex_ring_spectra(
    field: &[Complex64],
    rings: &RingSet,
    phases: &PhaseTable,
    parallel: bool,
) -> TransformResult<Array2<Complex64>> {
    check_map_len(field.len(), rings)?;
    let plans = RingFftPlans::for_rings(rings, false);
    let transform = |ring: &Ring| {
        plans.complex_fft(&field[ring.start_pixel..ring.start_pixel + ring.ring_length])
    };
    Ok(assemble(rings, phases, parallel, transform))
}

fn assemble<F>(
    rings: &RingSet,
    phases: &PhaseTable,
    parallel: bool,
    transform: F,
) -> Array2<Complex64>
where
    F: Fn(&Ring) -> Vec<Complex64> + Sync,
{
    let orders = rings.lmax() + 1;
    let spectra: Vec<Vec<Complex64>> = if parallel {
        rings.rings().par_iter().map(&transform).collect()
    } else {
        rings.rings().iter().map(&transform).collect()
    };

    let mut out = Array2::zeros((rings.len(), orders));
    for (r, spectrum) in spectra.iter().enumerate() {
        let keep = spectrum.len().min(orders);
        for m in 0..keep {
            out[[r, m]] = spectrum[m];
        }
    }
    phases.apply(&mut out);
    out
}

fn check_map_len(len: usize, rings: &RingSet) -> TransformResult<()> {
    let expected = pixel::npix(rings.nside());
    if len != expected {
        return Err(TransformError::shape_mismatch(
            expected,
            len,
            "ring spectral transform input",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(data: &[f64]) -> Vec<Complex64> {
        let n = data.len();
        (0..n)
            .map(|k| {
                data.iter()
                    .enumerate()
                    .map(|(j, &v)| {
                        Complex64::from_polar(v, -2.0 * PI * (j * k) as f64 / n as f64)
                    })
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_real_fft_matches_naive_dft() {
        let rings = RingSet::build(3).unwrap();
        let plans = RingFftPlans::for_rings(&rings, true);
        let data: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).cos() + 0.1 * i as f64).collect();
        let fast = plans.real_fft(&data);
        let slow = naive_dft(&data);
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_real_fft_odd_length_falls_back() {
        let rings = RingSet::build(1).unwrap();
        let plans = RingFftPlans::for_rings(&rings, true);
        let data = [1.0, -2.0, 0.5];
        let fast = plans.real_fft(&data);
        let slow = naive_dft(&data);
        for (a, b) in fast.iter().zip(&slow) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_real_and_complex_paths_agree() {
        let nside = 4;
        let rings = RingSet::build(nside).unwrap();
        let phases = PhaseTable::build(&rings);
        let map: Vec<f64> = (0..pixel::npix(nside))
            .map(|i| ((i * 7 % 13) as f64 - 6.0) / 3.0)
            .collect();
        let a = real_ring_spectra(&map, &rings, &phases, true, false).unwrap();
        let b = real_ring_spectra(&map, &rings, &phases, false, true).unwrap();
        assert_eq!(a.dim(), (15, 12));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).norm() < 1e-12);
        }
    }

    #[test]
    fn test_short_rings_are_zero_padded() {
        let nside = 4;
        let rings = RingSet::build(nside).unwrap();
        let phases = PhaseTable::build(&rings);
        let map = vec![1.0; pixel::npix(nside)];
        let spec = real_ring_spectra(&map, &rings, &phases, true, false).unwrap();
        // First ring has 4 pixels: orders 4..12 must be exactly zero.
        for m in 4..12 {
            assert_eq!(spec[[0, m]], Complex64::new(0.0, 0.0));
        }
        assert!((spec[[0, 0]].re - 4.0).abs() < 1e-14);
        assert!((spec[[7, 0]].re - 16.0).abs() < 1e-14);
    }

    #[test]
    fn test_phase_alignment_makes_cosine_real() {
        let nside = 4;
        let rings = RingSet::build(nside).unwrap();
        let phases = PhaseTable::build(&rings);
        let mut map = vec![0.0; pixel::npix(nside)];
        for ring in rings.iter() {
            for j in 0..ring.ring_length {
                let phi = ring.longitude_offset + 2.0 * PI * j as f64 / ring.ring_length as f64;
                map[ring.start_pixel + j] = phi.cos();
            }
        }
        let spec = real_ring_spectra(&map, &rings, &phases, true, false).unwrap();
        for (r, ring) in rings.iter().enumerate() {
            let half = ring.ring_length as f64 / 2.0;
            assert!((spec[[r, 1]] - Complex64::new(half, 0.0)).norm() < 1e-12);
        }
    }

    #[test]
    fn test_rejects_wrong_length() {
        let rings = RingSet::build(2).unwrap();
        let phases = PhaseTable::build(&rings);
        let err = real_ring_spectra(&[0.0; 47], &rings, &phases, true, false);
        assert!(matches!(err, Err(TransformError::ShapeMismatch { .. })));
    }
}
