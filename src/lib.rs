//! # Perdida
//!
//! Focal loss operators with autograd support and reference-verified gradients.
//!
//! Provides the two standard focal loss variants as differentiable operators
//! over a tape-based tensor:
//!
//! - [`SoftmaxFocalLoss`] - single-label classification, probabilities
//!   normalized across mutually exclusive classes
//! - [`SigmoidFocalLoss`] - multi-label classification, each class an
//!   independent binary decision
//!
//! Both down-weight easy examples via the `(1 - p)^gamma` modulating factor
//! and balance classes with `alpha`.
//!
//! ## Example
//!
//! ```
//! use perdida::{backward, FocalLossConfig, LossFn, SoftmaxFocalLoss, Tensor};
//!
//! let loss_fn = SoftmaxFocalLoss::new(2, FocalLossConfig::default()).unwrap();
//!
//! // Two samples, two classes, row-major logits
//! let logits = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], true);
//! let labels = Tensor::from_vec(vec![0.0, 1.0], false); // class indices
//!
//! let mut loss = loss_fn.forward(&logits, &labels);
//! backward(&mut loss, None);
//!
//! assert!(loss.data()[0] > 0.0);
//! assert!(logits.grad().is_some());
//! ```

pub mod autograd;
pub mod device;
pub mod loss;

pub use autograd::{backward, BackwardOp, Precision, Tensor};
pub use device::ComputeDevice;
pub use loss::{
    FocalLossConfig, FocalLossError, LossFn, Reduction, SigmoidFocalLoss, SoftmaxFocalLoss,
};
