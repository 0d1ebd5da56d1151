//! Angular power spectra from harmonic coefficients.
//!
//! Per order `m` the six canonical products are formed as real parts of
//! `a · b*`, accumulated with weight 1 for `m = 0` and 2 for `m > 0`
//! (`a_{l,−m} = (−1)^m a_{l,m}*` for real fields) and divided by `2l + 1`.
//! Two accumulators run side by side: L2 sums the products, L1 sums
//! `sign(v)·sqrt(|v|)`.

use std::fmt;

use ndarray::{Array2, ArrayView1};
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::alm::Alm;
use crate::error::{TransformError, TransformResult};

/// Spectrum combinations in canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectrumKind {
    TT,
    EE,
    BB,
    TE,
    EB,
    TB,
}

impl SpectrumKind {
    pub const ALL: [SpectrumKind; 6] = [
        SpectrumKind::TT,
        SpectrumKind::EE,
        SpectrumKind::BB,
        SpectrumKind::TE,
        SpectrumKind::EB,
        SpectrumKind::TB,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpectrumKind::TT => "TT",
            SpectrumKind::EE => "EE",
            SpectrumKind::BB => "BB",
            SpectrumKind::TE => "TE",
            SpectrumKind::EB => "EB",
            SpectrumKind::TB => "TB",
        }
    }
}

impl fmt::Display for SpectrumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const INTENSITY_KINDS: [SpectrumKind; 1] = [SpectrumKind::TT];
const POLARIZATION_KINDS: [SpectrumKind; 3] =
    [SpectrumKind::EE, SpectrumKind::BB, SpectrumKind::EB];

/// Input maps for a power-spectrum estimate, borrowed from the caller.
#[derive(Debug, Clone, Copy)]
pub enum SkyMaps<'a> {
    /// Temperature only
    Intensity(&'a [f64]),
    /// Stokes Q and U
    Polarization { q: &'a [f64], u: &'a [f64] },
    /// Temperature with Stokes Q and U
    Full {
        t: &'a [f64],
        q: &'a [f64],
        u: &'a [f64],
    },
}

impl<'a> SkyMaps<'a> {
    /// Spectra produced for this input kind, in canonical order.
    pub fn kinds(&self) -> &'static [SpectrumKind] {
        match self {
            SkyMaps::Intensity(_) => &INTENSITY_KINDS,
            SkyMaps::Polarization { .. } => &POLARIZATION_KINDS,
            SkyMaps::Full { .. } => &SpectrumKind::ALL,
        }
    }

    pub fn temperature(&self) -> Option<&'a [f64]> {
        match *self {
            SkyMaps::Intensity(t) | SkyMaps::Full { t, .. } => Some(t),
            SkyMaps::Polarization { .. } => None,
        }
    }

    pub fn polarization(&self) -> Option<(&'a [f64], &'a [f64])> {
        match *self {
            SkyMaps::Polarization { q, u } | SkyMaps::Full { q, u, .. } => Some((q, u)),
            SkyMaps::Intensity(_) => None,
        }
    }

    /// Common map length; every component must agree.
    pub fn pixel_count(&self) -> TransformResult<usize> {
        let lengths: Vec<usize> = match *self {
            SkyMaps::Intensity(t) => vec![t.len()],
            SkyMaps::Polarization { q, u } => vec![q.len(), u.len()],
            SkyMaps::Full { t, q, u } => vec![t.len(), q.len(), u.len()],
        };
        let first = lengths[0];
        match lengths.iter().find(|&&len| len != first) {
            Some(&other) => Err(TransformError::shape_mismatch(first, other, "sky map components")),
            None => Ok(first),
        }
    }

    pub fn same_kind(&self, other: &SkyMaps<'_>) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// Harmonic coefficients of one set of sky maps.
#[derive(Debug, Clone, Default)]
pub struct FieldHarmonics {
    pub t: Option<Alm>,
    pub e: Option<Alm>,
    pub b: Option<Alm>,
}

/// L2 and L1 spectra, `[kind][l]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectra {
    kinds: Vec<SpectrumKind>,
    l2: Array2<f64>,
    l1: Array2<f64>,
}

impl PowerSpectra {
    pub fn kinds(&self) -> &[SpectrumKind] {
        &self.kinds
    }

    pub fn lmax(&self) -> usize {
        self.l2.ncols() - 1
    }

    pub fn l2(&self) -> &Array2<f64> {
        &self.l2
    }

    pub fn l1(&self) -> &Array2<f64> {
        &self.l1
    }

    pub fn get(&self, kind: SpectrumKind) -> Option<ArrayView1<'_, f64>> {
        self.position(kind).map(|row| self.l2.row(row))
    }

    pub fn get_l1(&self, kind: SpectrumKind) -> Option<ArrayView1<'_, f64>> {
        self.position(kind).map(|row| self.l1.row(row))
    }

    fn position(&self, kind: SpectrumKind) -> Option<usize> {
        self.kinds.iter().position(|&k| k == kind)
    }
}

fn re_conj(a: Complex64, b: Complex64) -> f64 {
    (a * b.conj()).re
}

fn coefficient(alm: &Option<Alm>, l: usize, m: usize) -> TransformResult<Complex64> {
    alm.as_ref()
        .and_then(|a| a.get(l, m))
        .ok_or_else(|| {
            TransformError::invalid_parameter(
                "alm",
                format!("({}, {})", l, m),
                "present for every requested spectrum",
            )
        })
}

fn product(
    kind: SpectrumKind,
    first: &FieldHarmonics,
    second: &FieldHarmonics,
    cross: bool,
    l: usize,
    m: usize,
) -> TransformResult<f64> {
    let c = |alm: &Option<Alm>| coefficient(alm, l, m);
    Ok(match kind {
        SpectrumKind::TT => re_conj(c(&first.t)?, c(&second.t)?),
        SpectrumKind::EE => re_conj(c(&first.e)?, c(&second.e)?),
        SpectrumKind::BB => re_conj(c(&first.b)?, c(&second.b)?),
        SpectrumKind::TE => {
            let v = re_conj(c(&first.t)?, c(&second.e)?);
            if cross {
                (v + re_conj(c(&second.t)?, c(&first.e)?)) / 2.0
            } else {
                v
            }
        }
        SpectrumKind::EB => {
            let v = -re_conj(c(&first.e)?, c(&second.b)?);
            if cross {
                (v - re_conj(c(&second.e)?, c(&first.b)?)) / 2.0
            } else {
                v
            }
        }
        SpectrumKind::TB => {
            let v = -re_conj(c(&first.t)?, c(&second.b)?);
            if cross {
                (v - re_conj(c(&second.t)?, c(&first.b)?)) / 2.0
            } else {
                v
            }
        }
    })
}

/// Accumulates the requested spectra. Orders are summed in increasing `m`
/// for every degree, so the result is independent of how the coefficients
/// were produced.
pub fn accumulate_spectra(
    kinds: &[SpectrumKind],
    lmax: usize,
    first: &FieldHarmonics,
    second: Option<&FieldHarmonics>,
) -> TransformResult<PowerSpectra> {
    let cross = second.is_some();
    let second = second.unwrap_or(first);
    let mut l2 = Array2::zeros((kinds.len(), lmax + 1));
    let mut l1 = Array2::zeros((kinds.len(), lmax + 1));

    for (row, &kind) in kinds.iter().enumerate() {
        for l in 0..=lmax {
            let mut sum = 0.0;
            let mut sum_l1 = 0.0;
            for m in 0..=l {
                let weight = if m == 0 { 1.0 } else { 2.0 };
                let v = product(kind, first, second, cross, l, m)?;
                sum += weight * v;
                sum_l1 += weight * v.signum() * v.abs().sqrt();
            }
            let norm = (2 * l + 1) as f64;
            l2[[row, l]] = sum / norm;
            l1[[row, l]] = sum_l1 / norm;
        }
    }

    Ok(PowerSpectra {
        kinds: kinds.to_vec(),
        l2,
        l1,
    })
}
