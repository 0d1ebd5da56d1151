//! Longitude phase alignment between rings.
//!
//! HEALPix rings start at different longitudes (`π/(4N)`-style half-pixel
//! offsets alternate through the belt, and cap rings start at `π/(4i)`), so
//! each ring's FFT has its own phase origin. Multiplying order `m` of ring
//! `r` by `exp(−i m φ_r)` moves every ring onto the `φ = 0` meridian.

use ndarray::Array2;
use rustfft::num_complex::Complex64;

use crate::geometry::RingSet;

/// Per-resolution diagonal corrector of shape `(ring_count, 3N)`.
#[derive(Debug, Clone)]
pub struct PhaseTable {
    nside: usize,
    values: Array2<Complex64>,
}

impl PhaseTable {
    pub fn build(rings: &RingSet) -> Self {
        let orders = rings.lmax() + 1;
        let values = Array2::from_shape_fn((rings.len(), orders), |(r, m)| {
            let phi = rings.rings()[r].longitude_offset;
            Complex64::from_polar(1.0, -(m as f64) * phi)
        });
        Self {
            nside: rings.nside(),
            values,
        }
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn values(&self) -> &Array2<Complex64> {
        &self.values
    }

    /// Multiplies a `(ring, order)` spectrum in place.
    pub fn apply(&self, spectrum: &mut Array2<Complex64>) {
        debug_assert_eq!(spectrum.dim(), self.values.dim());
        *spectrum *= &self.values;
    }
}
