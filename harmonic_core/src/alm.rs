//! Harmonic coefficient storage.
//!
//! Coefficients `a_lm` with `0 ≤ m ≤ l ≤ lmax` are kept in one flat buffer
//! ordered by `m`, then by `l`. Each order is a contiguous run of
//! `lmax − m + 1` values, which lets the per-order assembly write disjoint
//! slices in parallel.

use rustfft::num_complex::Complex64;

use crate::error::{TransformError, TransformResult};

/// Flat offset of `(l, m)`: `m(lmax+1) − m(m−1)/2 + (l − m)`.
pub fn alm_index(lmax: usize, l: usize, m: usize) -> usize {
    debug_assert!(m <= l && l <= lmax);
    m * (2 * lmax + 3 - m) / 2 + (l - m)
}

/// Number of coefficients up to `lmax`.
pub fn alm_size(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 2) / 2
}

/// Complex harmonic coefficients up to a band limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Alm {
    lmax: usize,
    values: Vec<Complex64>,
}

impl Alm {
    pub fn zeros(lmax: usize) -> Self {
        Self {
            lmax,
            values: vec![Complex64::new(0.0, 0.0); alm_size(lmax)],
        }
    }

    pub fn from_vec(lmax: usize, values: Vec<Complex64>) -> TransformResult<Self> {
        let expected = alm_size(lmax);
        if values.len() != expected {
            return Err(TransformError::shape_mismatch(
                expected,
                values.len(),
                "alm buffer",
            ));
        }
        Ok(Self { lmax, values })
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flat offset of `(l, m)`, or `None` outside `0 ≤ m ≤ l ≤ lmax`.
    pub fn index(&self, l: usize, m: usize) -> Option<usize> {
        (m <= l && l <= self.lmax).then(|| alm_index(self.lmax, l, m))
    }

    pub fn get(&self, l: usize, m: usize) -> Option<Complex64> {
        self.index(l, m).map(|idx| self.values[idx])
    }

    /// Coefficients of order `m` for `l = m..=lmax`.
    pub fn order(&self, m: usize) -> &[Complex64] {
        let start = alm_index(self.lmax, m, m);
        &self.values[start..start + self.lmax + 1 - m]
    }

    pub fn orders(&self) -> impl Iterator<Item = (usize, &[Complex64])> {
        (0..=self.lmax).map(move |m| (m, self.order(m)))
    }

    pub fn as_slice(&self) -> &[Complex64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Complex64> {
        self.values
    }

    /// Disjoint mutable slices, one per order, in increasing `m`.
    pub(crate) fn order_slots_mut(&mut self) -> Vec<(usize, &mut [Complex64])> {
        let lmax = self.lmax;
        let mut rest: &mut [Complex64] = &mut self.values;
        let mut slots = Vec::with_capacity(lmax + 1);
        for m in 0..=lmax {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(lmax + 1 - m);
            slots.push((m, head));
            rest = tail;
        }
        slots
    }
}
