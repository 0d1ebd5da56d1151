//! Associated Legendre recurrence with log-domain rescaling.
//!
//! Values are produced per order `m` for every degree `l ∈ [m, L]` and a
//! batch of cosines in one pass over `l`. Each sample carries its mantissa
//! pair and log-scale separately ([`ScaledValue`]), so neither the seed
//! `(1 − x²)^{m/2}` nor the growth of the unnormalized recurrence can leave
//! the machine range before the final recombination.
//!
//! The returned normalization is `P̃_{l,m} = sqrt(4π(2l+1)(l−m)!/(l+m)!) P_{l,m}`,
//! i.e. `4π · Y_{lm}(θ, 0)` with the Condon–Shortley phase.

use std::f64::consts::PI;

use ndarray::{s, Array2, ArrayView1, Axis};

use crate::error::{TransformError, TransformResult};

/// Default down-scaling factor; mantissas are kept below `1 / limit_range`.
pub const DEFAULT_LIMIT_RANGE: f64 = 1e-10;

/// Memoized `ln k`, with `ln 0` defined as `0`.
///
/// Grows monotonically and never evicts.
#[derive(Debug, Clone)]
pub struct LogTable {
    values: Vec<f64>,
}

impl Default for LogTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LogTable {
    pub fn new() -> Self {
        Self { values: vec![0.0] }
    }

    pub fn with_limit(n: usize) -> Self {
        let mut table = Self::new();
        table.extend_to(n);
        table
    }

    /// Makes `ln k` available from the table for every `k ≤ n`.
    pub fn extend_to(&mut self, n: usize) {
        let start = self.values.len();
        if n < start {
            return;
        }
        self.values.reserve(n + 1 - start);
        for k in start..=n {
            self.values.push((k as f64).ln());
        }
    }

    /// Largest integer currently tabulated.
    pub fn limit(&self) -> usize {
        self.values.len() - 1
    }

    /// `ln k`; falls back to a direct evaluation past the table.
    pub fn ln(&self, k: usize) -> f64 {
        match self.values.get(k) {
            Some(v) => *v,
            None => (k as f64).ln(),
        }
    }

    /// `ln n!`
    pub fn ln_factorial(&self, n: usize) -> f64 {
        (2..=n).map(|k| self.ln(k)).sum()
    }

    /// `ln n!!`, zero for `n ≤ 0`.
    pub fn ln_double_factorial(&self, n: i64) -> f64 {
        if n <= 0 {
            return 0.0;
        }
        (1..=n).rev().step_by(2).map(|k| self.ln(k as usize)).sum()
    }
}

/// A value stored as `mantissa · exp(log_scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledValue {
    pub mantissa: f64,
    pub log_scale: f64,
}

impl ScaledValue {
    pub const ZERO: ScaledValue = ScaledValue {
        mantissa: 0.0,
        log_scale: 0.0,
    };

    pub fn new(mantissa: f64, log_scale: f64) -> Self {
        Self {
            mantissa,
            log_scale,
        }
    }

    /// Recombines with an additional log factor. The mantissa's own
    /// magnitude is folded into the exponent so that a small mantissa with a
    /// large scale does not overflow on the way.
    pub fn value_with(&self, extra_log: f64) -> f64 {
        if self.mantissa == 0.0 {
            return 0.0;
        }
        let magnitude = (self.mantissa.abs().ln() + self.log_scale + extra_log).exp();
        magnitude.copysign(self.mantissa)
    }

    pub fn value(&self) -> f64 {
        self.value_with(0.0)
    }
}

/// Rescaling policy shared by the scalar and spin recurrences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    limit_range: f64,
    ceiling: f64,
    log_step: f64,
}

impl Rescale {
    /// `limit_range` must lie in `(0, 1)`; the ceiling is its reciprocal.
    pub fn new(limit_range: f64) -> TransformResult<Self> {
        if !(limit_range > 0.0 && limit_range < 1.0) {
            return Err(TransformError::invalid_parameter(
                "limit_range",
                limit_range.to_string(),
                "0 < limit_range < 1",
            ));
        }
        Ok(Self {
            limit_range,
            ceiling: 1.0 / limit_range,
            log_step: -limit_range.ln(),
        })
    }

    pub fn limit_range(&self) -> f64 {
        self.limit_range
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }
}

impl Default for Rescale {
    fn default() -> Self {
        Self {
            limit_range: DEFAULT_LIMIT_RANGE,
            ceiling: 1.0 / DEFAULT_LIMIT_RANGE,
            log_step: -DEFAULT_LIMIT_RANGE.ln(),
        }
    }
}

/// Two consecutive recurrence terms sharing one log-scale.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecurrencePair {
    prev: f64,
    cur: f64,
    log_scale: f64,
}

impl RecurrencePair {
    pub(crate) fn seed(value: ScaledValue) -> Self {
        Self {
            prev: 0.0,
            cur: value.mantissa,
            log_scale: value.log_scale,
        }
    }

    /// `next = a·cur − b·prev`; the current term becomes the previous one.
    #[inline]
    pub(crate) fn step(&mut self, a: f64, b: f64) {
        let next = a * self.cur - b * self.prev;
        self.prev = self.cur;
        self.cur = next;
    }

    /// Pulls both terms back under the ceiling; returns the number of
    /// rescale events.
    #[inline]
    pub(crate) fn renormalize(&mut self, rescale: &Rescale) -> usize {
        let mut events = 0;
        while self.cur.is_finite() && self.cur.abs() > rescale.ceiling {
            self.cur *= rescale.limit_range;
            self.prev *= rescale.limit_range;
            self.log_scale += rescale.log_step;
            events += 1;
        }
        events
    }

    pub(crate) fn current(&self) -> ScaledValue {
        ScaledValue::new(self.cur, self.log_scale)
    }
}

/// Normalized Legendre values `[l − m][sample]` for one order.
#[derive(Debug, Clone)]
pub struct LegendreBlock {
    order: usize,
    lmax: usize,
    values: Array2<f64>,
    rescale_events: usize,
}

impl LegendreBlock {
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Values at degree `l` across all samples.
    pub fn degree(&self, l: usize) -> ArrayView1<'_, f64> {
        self.values.row(l - self.order)
    }

    /// Number of times a mantissa pair was pulled back under the ceiling.
    pub fn rescale_events(&self) -> usize {
        self.rescale_events
    }

    /// The block with the vanishing `l = m − 1` row prepended, which the
    /// spin ladder consumes as `P̃_{l−1,m}`.
    pub fn with_lower_row(&self) -> Array2<f64> {
        let (rows, samples) = self.values.dim();
        let mut extended = Array2::zeros((rows + 1, samples));
        extended.slice_mut(s![1.., ..]).assign(&self.values);
        extended
    }
}

/// Stabilized three-term recurrence for spin-0 Legendre functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegendreRecurrence {
    rescale: Rescale,
}

impl LegendreRecurrence {
    pub fn new(limit_range: f64) -> TransformResult<Self> {
        Ok(Self {
            rescale: Rescale::new(limit_range)?,
        })
    }

    pub fn rescale(&self) -> &Rescale {
        &self.rescale
    }

    /// Computes `P̃_{l,m}(x)` for `l = m…lmax` and every cosine in `x`.
    pub fn compute(
        &self,
        m: usize,
        lmax: usize,
        x: &[f64],
        logs: &LogTable,
    ) -> TransformResult<LegendreBlock> {
        if m > lmax {
            return Err(TransformError::invalid_parameter(
                "m",
                m.to_string(),
                format!("<= lmax ({})", lmax),
            ));
        }
        check_cosines(x)?;

        let rows = lmax - m + 1;
        let mut values = Array2::zeros((rows, x.len()));
        let degree_logs = degree_log_factors(m, lmax, logs);

        let mut pairs: Vec<RecurrencePair> = x
            .iter()
            .map(|&xi| RecurrencePair::seed(seed_pmm(m, xi)))
            .collect();

        let mut events = 0usize;
        for (k, l) in (m..=lmax).enumerate() {
            if l > m {
                let lm = (l - m) as f64;
                let a = (2 * l - 1) as f64 / lm;
                let b = (l + m - 1) as f64 / lm;
                for (pair, &xi) in pairs.iter_mut().zip(x) {
                    pair.step(a * xi, b);
                    events += pair.renormalize(&self.rescale);
                }
            }

            let norm = (4.0 * PI * (2 * l + 1) as f64).sqrt();
            let mut row = values.index_axis_mut(Axis(0), k);
            for (out, pair) in row.iter_mut().zip(&pairs) {
                let v = pair.current().value_with(degree_logs[k]) * norm;
                if !v.is_finite() {
                    return Err(TransformError::overflow_risk(l, m));
                }
                *out = v;
            }
        }

        Ok(LegendreBlock {
            order: m,
            lmax,
            values,
            rescale_events: events,
        })
    }
}

/// `ln sqrt((l−m)!/(l+m)!)` plus the seed's `ln (2m−1)!!`, for `l = m…lmax`.
fn degree_log_factors(m: usize, lmax: usize, logs: &LogTable) -> Vec<f64> {
    let mut out = Vec::with_capacity(lmax - m + 1);
    let mut acc = logs.ln_double_factorial(2 * m as i64 - 1) - 0.5 * logs.ln_factorial(2 * m);
    out.push(acc);
    for l in m + 1..=lmax {
        acc += 0.5 * (logs.ln(l - m) - logs.ln(l + m));
        out.push(acc);
    }
    out
}

/// `(−1)^m (1 − x²)^{m/2}` kept in the log domain.
fn seed_pmm(m: usize, x: f64) -> ScaledValue {
    if m == 0 {
        return ScaledValue::new(1.0, 0.0);
    }
    let sin2 = (1.0 - x) * (1.0 + x);
    if sin2 <= 0.0 {
        return ScaledValue::ZERO;
    }
    let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
    ScaledValue::new(sign, 0.5 * m as f64 * sin2.ln())
}

pub(crate) fn check_cosines(x: &[f64]) -> TransformResult<()> {
    if let Some(bad) = x.iter().find(|v| !(v.abs() <= 1.0)) {
        return Err(TransformError::invalid_parameter(
            "cos_colatitude",
            bad.to_string(),
            "-1 <= x <= 1",
        ));
    }
    Ok(())
}
