//! Spin-weighted harmonic tables.
//!
//! For spin `s` and resolution `N` the table holds, per order `m`, the
//! pixel-area weighted values `Ω · sY_lm(θ_r, 0)` (plus) and
//! `Ω · ₋sY_lm(θ_r, 0)` (minus) for `l ∈ [m, lmax]` at every ring
//! colatitude `θ_r`. All pixels of a ring share one colatitude, so one value
//! per ring covers the whole map.
//!
//! Two strategies produce the same table (Goldberg convention with the
//! Condon–Shortley phase):
//! - [`TableSpinBuilder`] evaluates the harmonics through a
//!   [`WignerEvaluator`] for any spin;
//! - [`AnalyticSpinBuilder`] derives spin ±2 from the scalar Legendre block
//!   with the spin-raising ladder.

use std::f64::consts::PI;
use std::fmt::Debug;

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};
use crate::geometry::RingSet;
use crate::legendre::{
    check_cosines, LegendreRecurrence, LogTable, RecurrencePair, Rescale, ScaledValue,
};
use crate::pixel;

/// Which builder produces spin-harmonic tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpinStrategy {
    /// Wigner-evaluator table, any spin
    #[default]
    Table,
    /// Spin-2 ladder on the scalar recurrence
    Analytic,
}

/// Per-order plus/minus spin harmonics for one `(spin, N)`.
#[derive(Debug, Clone)]
pub struct SpinHarmonicTable {
    spin: i32,
    nside: usize,
    plus: Vec<Array2<f64>>,
    minus: Vec<Array2<f64>>,
}

impl SpinHarmonicTable {
    pub fn spin(&self) -> i32 {
        self.spin
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn lmax(&self) -> usize {
        pixel::lmax(self.nside)
    }

    /// `[l − m][ring]` values of `Ω · sY_lm`.
    pub fn plus(&self, m: usize) -> &Array2<f64> {
        &self.plus[m]
    }

    /// `[l − m][ring]` values of `Ω · ₋sY_lm`.
    pub fn minus(&self, m: usize) -> &Array2<f64> {
        &self.minus[m]
    }
}

/// Produces a spin-harmonic table for `(spin, N)`.
pub trait SpinHarmonicBuilder: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn build(
        &self,
        spin: i32,
        rings: &RingSet,
        logs: &LogTable,
    ) -> TransformResult<SpinHarmonicTable>;
}

/// Evaluates `sY_lm(θ, 0)` for `l ∈ [m, lmax]` at a batch of colatitudes
/// given as `(cos θ, sin θ)`; output is `[l − m][sample]`.
pub trait WignerEvaluator: Send + Sync + Debug {
    fn spin_harmonics(
        &self,
        spin: i32,
        m: usize,
        lmax: usize,
        cos_theta: &[f64],
        sin_theta: &[f64],
        logs: &LogTable,
    ) -> TransformResult<Array2<f64>>;
}

/// Builds the strategy selected in configuration.
pub fn builder_for(
    strategy: SpinStrategy,
    limit_range: f64,
) -> TransformResult<Box<dyn SpinHarmonicBuilder>> {
    Ok(match strategy {
        SpinStrategy::Table => {
            Box::new(TableSpinBuilder::new(RecursiveWigner::new(limit_range)?))
        }
        SpinStrategy::Analytic => Box::new(AnalyticSpinBuilder::new(limit_range)?),
    })
}

fn check_spin_range(spin: i32, lmax: usize, strategy: &str) -> TransformResult<()> {
    if spin.unsigned_abs() as usize > lmax {
        return Err(TransformError::unsupported_spin(spin, strategy));
    }
    Ok(())
}

/// Spin-weighted harmonics from a single-term seed and a three-term
/// recurrence in degree.
///
/// At `l₀ = max(m, |s|)` the Goldberg sum collapses to one term, which is
/// evaluated in the log domain. Higher degrees follow
/// `A_{l+1} sY_{l+1} = (x + s·m/(l(l+1))) sY_l − A_l sY_{l−1}` with
/// `A_l = sqrt((l²−m²)(l²−s²) / (l²(4l²−1)))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecursiveWigner {
    rescale: Rescale,
}

impl RecursiveWigner {
    pub fn new(limit_range: f64) -> TransformResult<Self> {
        Ok(Self {
            rescale: Rescale::new(limit_range)?,
        })
    }

    fn seed(
        spin: i64,
        m: i64,
        l0: i64,
        cos_theta: f64,
        sin_theta: f64,
        logs: &LogTable,
    ) -> ScaledValue {
        let lnf = |n: i64| logs.ln_factorial(n as usize);
        let r = 0.max(m - spin);
        debug_assert_eq!(r, (l0 - spin).min(l0 + m));

        let ln_pref = 0.5
            * (lnf(l0 + m) + lnf(l0 - m) + logs.ln((2 * l0 + 1) as usize)
                - (4.0 * PI).ln()
                - lnf(l0 + spin)
                - lnf(l0 - spin));
        let ln_c1 = lnf(l0 - spin) - lnf(r) - lnf(l0 - spin - r);
        let ln_c2 = lnf(l0 + spin) - lnf(r + spin - m) - lnf(l0 - r + m);

        // sin²(θ/2) and cos²(θ/2) without cancellation near either pole.
        let (sh2, ch2) = if cos_theta >= 0.0 {
            (
                sin_theta * sin_theta / (2.0 * (1.0 + cos_theta)),
                0.5 * (1.0 + cos_theta),
            )
        } else {
            (0.5 * (1.0 - cos_theta), sin_theta * sin_theta / (2.0 * (1.0 - cos_theta)))
        };
        let k = 2 * r + spin - m;
        let power = |p: i64, base: f64| if p == 0 { 0.0 } else { 0.5 * p as f64 * base.ln() };
        let ln_value = ln_pref + ln_c1 + ln_c2 + power(2 * l0 - k, sh2) + power(k, ch2);
        if !ln_value.is_finite() {
            return ScaledValue::ZERO;
        }

        let sign = if (m + l0 - r - spin).rem_euclid(2) == 0 { 1.0 } else { -1.0 };
        ScaledValue::new(sign, ln_value)
    }
}

impl WignerEvaluator for RecursiveWigner {
    fn spin_harmonics(
        &self,
        spin: i32,
        m: usize,
        lmax: usize,
        cos_theta: &[f64],
        sin_theta: &[f64],
        logs: &LogTable,
    ) -> TransformResult<Array2<f64>> {
        if m > lmax {
            return Err(TransformError::invalid_parameter(
                "m",
                m.to_string(),
                format!("<= lmax ({})", lmax),
            ));
        }
        if cos_theta.len() != sin_theta.len() {
            return Err(TransformError::shape_mismatch(
                cos_theta.len(),
                sin_theta.len(),
                "colatitude sines",
            ));
        }
        check_cosines(cos_theta)?;

        let mut out = Array2::zeros((lmax - m + 1, cos_theta.len()));
        let s = spin as i64;
        let mi = m as i64;
        let l0 = mi.max(s.abs());
        if l0 as usize > lmax {
            return Ok(out);
        }

        let amp = |l: i64| -> f64 {
            if l == 0 {
                return 0.0;
            }
            let l2 = (l * l) as f64;
            (((l * l - mi * mi) * (l * l - s * s)) as f64 / (l2 * (4.0 * l2 - 1.0))).sqrt()
        };

        for (sample, (&x, &sn)) in cos_theta.iter().zip(sin_theta).enumerate() {
            let mut pair = RecurrencePair::seed(Self::seed(s, mi, l0, x, sn, logs));
            for l in l0..=lmax as i64 {
                if l > l0 {
                    let lp = l - 1;
                    let shift = if s * mi == 0 {
                        0.0
                    } else {
                        (s * mi) as f64 / (lp * (lp + 1)) as f64
                    };
                    let a_next = amp(l);
                    pair.step((x + shift) / a_next, amp(lp) / a_next);
                    pair.renormalize(&self.rescale);
                }
                let v = pair.current().value();
                if !v.is_finite() {
                    return Err(TransformError::overflow_risk(l as usize, m));
                }
                out[[l as usize - m, sample]] = v;
            }
        }
        Ok(out)
    }
}

/// Table strategy: evaluates `±s` harmonics through a [`WignerEvaluator`].
#[derive(Debug, Clone, Default)]
pub struct TableSpinBuilder<W: WignerEvaluator = RecursiveWigner> {
    evaluator: W,
}

impl<W: WignerEvaluator> TableSpinBuilder<W> {
    pub fn new(evaluator: W) -> Self {
        Self { evaluator }
    }
}

impl<W: WignerEvaluator> SpinHarmonicBuilder for TableSpinBuilder<W> {
    fn name(&self) -> &'static str {
        "table"
    }

    fn build(
        &self,
        spin: i32,
        rings: &RingSet,
        logs: &LogTable,
    ) -> TransformResult<SpinHarmonicTable> {
        let lmax = rings.lmax();
        check_spin_range(spin, lmax, self.name())?;
        let cos = rings.cos_colatitudes();
        let sin = rings.sin_colatitudes();
        let area = rings.pixel_area();

        let orders: Vec<(Array2<f64>, Array2<f64>)> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                let plus = self.evaluator.spin_harmonics(spin, m, lmax, &cos, &sin, logs)?;
                let minus = self.evaluator.spin_harmonics(-spin, m, lmax, &cos, &sin, logs)?;
                Ok((plus * area, minus * area))
            })
            .collect::<TransformResult<_>>()?;

        let (plus, minus) = orders.into_iter().unzip();
        Ok(SpinHarmonicTable {
            spin,
            nside: rings.nside(),
            plus,
            minus,
        })
    }
}

/// Analytic strategy for spin 0 and ±2.
///
/// With `P̃ = 4π·λ_lm` from the scalar recurrence,
/// `±2Y_lm = α± λ_l + β± λ_{l−1}` where
/// `α± = w[(2m² − 2l)/sin²θ − l(l−1) ∓ 2m(l−1)cosθ/sin²θ]`,
/// `β± = 2wq(cosθ ± m)/sin²θ`, `q = sqrt((2l+1)/(2l−1)·(l²−m²))` and
/// `w = sqrt((l−2)!/(l+2)!)` (zero for `l ≤ 1`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticSpinBuilder {
    legendre: LegendreRecurrence,
}

impl AnalyticSpinBuilder {
    pub fn new(limit_range: f64) -> TransformResult<Self> {
        Ok(Self {
            legendre: LegendreRecurrence::new(limit_range)?,
        })
    }

    /// Ladder combination for one order: `(plus, minus)` for spin +2, each
    /// `[l − m][ring]`, in units of `P̃` (i.e. `4π · ±2Y_lm`).
    pub fn compute_legendre_spin2_m(
        &self,
        cos_theta: &[f64],
        sin_theta: &[f64],
        m: usize,
        lmax: usize,
        logs: &LogTable,
    ) -> TransformResult<(Array2<f64>, Array2<f64>)> {
        let block = self.legendre.compute(m, lmax, cos_theta, logs)?;
        let ext = block.with_lower_row();
        let rows = lmax - m + 1;
        let mut plus = Array2::zeros((rows, cos_theta.len()));
        let mut minus = Array2::zeros((rows, cos_theta.len()));
        let mf = m as f64;

        for k in 0..rows {
            let l = m + k;
            if l <= 1 {
                continue;
            }
            let lf = l as f64;
            let w = 1.0 / ((lf + 2.0) * (lf + 1.0) * lf * (lf - 1.0)).sqrt();
            let q = ((2.0 * lf + 1.0) / (2.0 * lf - 1.0) * (lf * lf - mf * mf)).sqrt();

            for (r, (&c, &sn)) in cos_theta.iter().zip(sin_theta).enumerate() {
                let s2 = sn * sn;
                let a = (2.0 * mf * mf - 2.0 * lf) / s2 - lf * (lf - 1.0);
                let b = 2.0 * mf * (lf - 1.0) * c / s2;
                let p_l = ext[[k + 1, r]];
                let p_lm1 = ext[[k, r]];
                plus[[k, r]] = w * ((a - b) * p_l + 2.0 * q * (c + mf) / s2 * p_lm1);
                minus[[k, r]] = w * ((a + b) * p_l + 2.0 * q * (c - mf) / s2 * p_lm1);
            }
        }
        Ok((plus, minus))
    }
}

impl SpinHarmonicBuilder for AnalyticSpinBuilder {
    fn name(&self) -> &'static str {
        "analytic"
    }

    fn build(
        &self,
        spin: i32,
        rings: &RingSet,
        logs: &LogTable,
    ) -> TransformResult<SpinHarmonicTable> {
        if !matches!(spin, 0 | 2 | -2) {
            return Err(TransformError::unsupported_spin(spin, self.name()));
        }
        let lmax = rings.lmax();
        check_spin_range(spin, lmax, self.name())?;
        let cos = rings.cos_colatitudes();
        let sin = rings.sin_colatitudes();
        // P̃ carries 4π; dividing by the pixel count leaves Ω · Y.
        let scale = 1.0 / pixel::npix(rings.nside()) as f64;

        let orders: Vec<(Array2<f64>, Array2<f64>)> = (0..=lmax)
            .into_par_iter()
            .map(|m| {
                if spin == 0 {
                    let block = self.legendre.compute(m, lmax, &cos, logs)?.into_values() * scale;
                    return Ok((block.clone(), block));
                }
                let (p2, m2) = self.compute_legendre_spin2_m(&cos, &sin, m, lmax, logs)?;
                let (p2, m2) = (p2 * scale, m2 * scale);
                Ok(if spin > 0 { (p2, m2) } else { (m2, p2) })
            })
            .collect::<TransformResult<_>>()?;

        let (plus, minus) = orders.into_iter().unzip();
        Ok(SpinHarmonicTable {
            spin,
            nside: rings.nside(),
            plus,
            minus,
        })
    }
}
