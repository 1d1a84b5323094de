//! Loss function trait

use crate::Tensor;

/// Trait for loss functions
pub trait LossFn {
    /// Compute loss given predictions and targets
    ///
    /// Predictions are `(N, C)` logits stored row-major in a flat tensor;
    /// targets carry one float-encoded class index per row. Returns the
    /// reduced loss with gradients set up for backpropagation.
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor;

    /// Name of the loss function
    fn name(&self) -> &str;
}
