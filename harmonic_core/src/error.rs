//! Error types for harmonic transform operations
//!
//! Every public entry point validates its inputs synchronously and reports
//! failures through [`TransformError`]. Rescaling inside the Legendre and
//! spin recurrences is transparent and never surfaces here unless the final
//! value cannot be represented.

use std::fmt;

/// Result type alias for transform operations
pub type TransformResult<T> = Result<T, TransformError>;

/// Error type for ring geometry, recurrences and harmonic assembly
#[derive(Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Resolution outside the supported range, or not a power of two where
    /// nested ordering requires one
    InvalidResolution { nside: usize, reason: String },

    /// Array length or shape inconsistent with the declared resolution
    ShapeMismatch {
        expected: usize,
        got: usize,
        context: String,
    },

    /// Spin without a defined ladder for the selected strategy
    UnsupportedSpin { spin: i32, strategy: String },

    /// Recombined recurrence value is not finite
    NumericOverflowRisk { degree: usize, order: usize },

    /// Invalid parameter value
    InvalidParameter {
        parameter: String,
        value: String,
        constraint: String,
    },
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::InvalidResolution { nside, reason } => {
                write!(f, "Invalid resolution nside={}: {}", nside, reason)
            }
            TransformError::ShapeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "Shape mismatch in {}: expected {} elements, got {}",
                    context, expected, got
                )
            }
            TransformError::UnsupportedSpin { spin, strategy } => {
                write!(
                    f,
                    "Spin {} is not supported by the {} harmonic builder",
                    spin, strategy
                )
            }
            TransformError::NumericOverflowRisk { degree, order } => {
                write!(
                    f,
                    "Recurrence value at l={}, m={} is not finite after rescaling",
                    degree, order
                )
            }
            TransformError::InvalidParameter {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = '{}': must satisfy {}",
                    parameter, value, constraint
                )
            }
        }
    }
}

impl std::error::Error for TransformError {}

impl TransformError {
    /// Create an invalid resolution error
    pub fn invalid_resolution(nside: usize, reason: impl Into<String>) -> Self {
        TransformError::InvalidResolution {
            nside,
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: usize, got: usize, context: impl Into<String>) -> Self {
        TransformError::ShapeMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    pub fn unsupported_spin(spin: i32, strategy: impl Into<String>) -> Self {
        TransformError::UnsupportedSpin {
            spin,
            strategy: strategy.into(),
        }
    }

    pub fn overflow_risk(degree: usize, order: usize) -> Self {
        TransformError::NumericOverflowRisk { degree, order }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        TransformError::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }
}
