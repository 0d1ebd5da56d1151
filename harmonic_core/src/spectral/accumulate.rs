//! Deterministic compensated reductions for ring quadrature.
//!
//! Sums are formed as a fixed pairwise tree with Neumaier compensation, so
//! the result depends only on the input order and not on how work was split
//! across threads.

use std::cmp::Ordering;

use ndarray::ArrayView1;
use rustfft::num_complex::Complex64;

#[derive(Clone, Copy, Debug)]
struct AccumNode {
    sum: f64,
    compensation: f64,
}

impl AccumNode {
    fn from_value(value: f64) -> Self {
        Self {
            sum: value,
            compensation: 0.0,
        }
    }

    fn combine(self, other: Self) -> Self {
        let a = self.sum;
        let b = other.sum;
        let t = a + b;
        let lost = match a.abs().partial_cmp(&b.abs()) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => a - t + b,
            Some(Ordering::Less) => b - t + a,
            None => 0.0,
        };

        Self {
            sum: t,
            compensation: self.compensation + other.compensation + lost,
        }
    }

    fn finalize(self) -> f64 {
        self.sum + self.compensation
    }
}

fn reduce_nodes(mut nodes: Vec<AccumNode>) -> AccumNode {
    debug_assert!(!nodes.is_empty());
    while nodes.len() > 1 {
        let mut next = Vec::with_capacity((nodes.len() + 1) / 2);
        let mut idx = 0;
        while idx < nodes.len() {
            if idx + 1 < nodes.len() {
                next.push(nodes[idx].combine(nodes[idx + 1]));
                idx += 2;
            } else {
                next.push(nodes[idx]);
                idx += 1;
            }
        }
        nodes = next;
    }
    nodes[0]
}

/// Pairwise compensated sum.
pub fn compensated_sum<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let nodes: Vec<AccumNode> = values.into_iter().map(AccumNode::from_value).collect();
    if nodes.is_empty() {
        return 0.0;
    }
    reduce_nodes(nodes).finalize()
}

/// `Σ_r weights[r] · values[r]` with real and imaginary parts reduced
/// independently.
pub fn weighted_sum(weights: ArrayView1<'_, f64>, values: ArrayView1<'_, Complex64>) -> Complex64 {
    debug_assert_eq!(weights.len(), values.len());
    let re = compensated_sum(weights.iter().zip(values.iter()).map(|(w, v)| w * v.re));
    let im = compensated_sum(weights.iter().zip(values.iter()).map(|(w, v)| w * v.im));
    Complex64::new(re, im)
}
