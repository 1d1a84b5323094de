//! Focal loss operators
//!
//! Two variants of the focal loss for classification with class imbalance:
//!
//! - [`SoftmaxFocalLoss`] - probabilities normalized across mutually
//!   exclusive classes (single-label)
//! - [`SigmoidFocalLoss`] - independent per-class probabilities
//!   (multi-label)
//!
//! Both take `(N, C)` logits stored row-major in a flat tensor together
//! with one integer class label per row, and apply the
//! `(1 - p)^gamma` modulating factor with `alpha` class balancing.

mod sigmoid_focal;
mod softmax_focal;
mod traits;

pub use sigmoid_focal::SigmoidFocalLoss;
pub use softmax_focal::SoftmaxFocalLoss;
pub use traits::LossFn;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised when constructing a loss operator
#[derive(Debug, thiserror::Error)]
pub enum FocalLossError {
    /// Gamma must be finite and non-negative
    #[error("invalid gamma: {0} (must be finite and >= 0)")]
    InvalidGamma(f32),

    /// Alpha must be a finite balance factor in [0, 1]
    #[error("invalid alpha: {0} (must be in [0, 1])")]
    InvalidAlpha(f32),

    /// Class weight length must equal the number of classes
    #[error("class weight length mismatch: expected {expected}, got {actual}")]
    WeightLength { expected: usize, actual: usize },

    /// Unknown reduction mode
    #[error("unknown reduction mode: {0:?} (expected none, mean, or sum)")]
    UnknownReduction(String),
}

/// How per-sample losses are reduced to the operator's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    /// No reduction, return per-sample (or per-element) losses
    None,
    /// Average over samples
    #[default]
    Mean,
    /// Sum over samples
    Sum,
}

impl Reduction {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Reduction::None => "none",
            Reduction::Mean => "mean",
            Reduction::Sum => "sum",
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Reduction {
    type Err = FocalLossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Reduction::None),
            "mean" => Ok(Reduction::Mean),
            "sum" => Ok(Reduction::Sum),
            other => Err(FocalLossError::UnknownReduction(other.to_string())),
        }
    }
}

/// Shared configuration for both focal loss variants
///
/// Defaults match the standard detection settings: `gamma = 2.0`,
/// `alpha = 0.25`, mean reduction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocalLossConfig {
    /// Focusing parameter; larger values down-weight easy examples harder
    pub gamma: f32,
    /// Class balance factor for the positive class
    pub alpha: f32,
    /// Output reduction mode
    #[serde(default)]
    pub reduction: Reduction,
}

impl FocalLossConfig {
    /// Create a config with the given focusing and balance parameters
    pub fn new(gamma: f32, alpha: f32) -> Self {
        Self {
            gamma,
            alpha,
            reduction: Reduction::default(),
        }
    }

    /// Set the reduction mode
    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<(), FocalLossError> {
        if !self.gamma.is_finite() || self.gamma < 0.0 {
            return Err(FocalLossError::InvalidGamma(self.gamma));
        }
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) {
            return Err(FocalLossError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

impl Default for FocalLossConfig {
    fn default() -> Self {
        Self::new(2.0, 0.25)
    }
}

/// Decode float-encoded class labels and bounds-check them against `classes`
pub(crate) fn decode_labels(targets: &ndarray::Array1<f32>, classes: usize) -> Vec<usize> {
    targets
        .iter()
        .map(|&t| {
            let label = t as usize;
            assert!(
                label < classes,
                "Label {label} out of range for {classes} classes"
            );
            label
        })
        .collect()
}
