//! Sigmoid focal loss for multi-label classification
//!
//! Every logit is an independent binary decision: the element at `(i, j)`
//! is a positive if `j == y_i` and a negative otherwise.
//!
//! ```text
//! positive: -alpha * (1-p)^gamma * ln(p)
//! negative: -(1-alpha) * p^gamma * ln(1-p)        p = sigmoid(x)
//! ```
//!
//! Computed in the numerically stable log-sigmoid form
//! `ln(sigmoid(x)) = -softplus(-x)` and `ln(1-sigmoid(x)) = -softplus(x)`.
//!
//! Element-wise gradient with respect to the logits:
//!
//! ```text
//! positive: alpha * (1-p)^gamma * (gamma * p * ln(p) - (1-p))
//! negative: (1-alpha) * p^gamma * (p - gamma * (1-p) * ln(1-p))
//! ```

use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

use crate::autograd::BackwardOp;
use crate::Tensor;

use super::{decode_labels, FocalLossConfig, FocalLossError, LossFn, Reduction};

/// Sigmoid focal loss operator
///
/// # Example
///
/// ```
/// use perdida::{backward, FocalLossConfig, LossFn, SigmoidFocalLoss, Tensor};
///
/// let loss_fn = SigmoidFocalLoss::new(2, FocalLossConfig::default()).unwrap();
/// let logits = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], true);
/// let labels = Tensor::from_vec(vec![0.0, 1.0], false);
///
/// let mut loss = loss_fn.forward(&logits, &labels);
/// backward(&mut loss, None);
/// assert!(loss.data()[0] > 0.0);
/// ```
pub struct SigmoidFocalLoss {
    num_classes: usize,
    gamma: f32,
    alpha: f32,
    reduction: Reduction,
    weight: Option<Array1<f32>>,
}

impl SigmoidFocalLoss {
    /// Create a new sigmoid focal loss over `num_classes` classes
    pub fn new(num_classes: usize, config: FocalLossConfig) -> Result<Self, FocalLossError> {
        config.validate()?;
        Ok(Self {
            num_classes,
            gamma: config.gamma,
            alpha: config.alpha,
            reduction: config.reduction,
            weight: None,
        })
    }

    /// Attach a per-class weight vector, indexed by the sample's target class
    pub fn with_weight(mut self, weight: Array1<f32>) -> Result<Self, FocalLossError> {
        if weight.len() != self.num_classes {
            return Err(FocalLossError::WeightLength {
                expected: self.num_classes,
                actual: weight.len(),
            });
        }
        self.weight = Some(weight);
        Ok(self)
    }

    /// Number of classes per row
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Numerically stable sigmoid: σ(x) = 1 / (1 + exp(-x))
    pub(crate) fn sigmoid(x: f32) -> f32 {
        if x >= 0.0 {
            let exp_neg = (-x).exp();
            1.0 / (1.0 + exp_neg)
        } else {
            let exp_x = x.exp();
            exp_x / (1.0 + exp_x)
        }
    }

    /// Numerically stable softplus: ln(1 + exp(x)) = max(x, 0) + ln(1 + exp(-|x|))
    fn softplus(x: f32) -> f32 {
        x.max(0.0) + (-x.abs()).exp().ln_1p()
    }

    /// Loss and gradient for one logit
    ///
    /// `positive` selects the target-class branch of the focal loss.
    fn element(&self, x: f32, positive: bool) -> (f32, f32) {
        let p = Self::sigmoid(x);
        let onem = Self::sigmoid(-x); // 1 - p without cancellation
        let log_p = -Self::softplus(-x); // ln(sigmoid(x))
        let log_onem = -Self::softplus(x); // ln(1 - sigmoid(x))

        if positive {
            let loss = -self.alpha * onem.powf(self.gamma) * log_p;
            let grad =
                self.alpha * onem.powf(self.gamma) * (self.gamma * p * log_p - onem);
            (loss, grad)
        } else {
            let loss = -(1.0 - self.alpha) * p.powf(self.gamma) * log_onem;
            let grad = (1.0 - self.alpha)
                * p.powf(self.gamma)
                * (p - self.gamma * onem * log_onem);
            (loss, grad)
        }
    }
}

struct SigmoidFocalBackward {
    pred_grad_cell: Rc<RefCell<Option<Array1<f32>>>>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
    /// Per-logit gradient of the reduced loss, upstream factor excluded
    grad: Array1<f32>,
}

impl BackwardOp for SigmoidFocalBackward {
    fn backward(&self) {
        let upstream = self.result_grad.borrow();
        let Some(upstream) = upstream.as_ref() else {
            return;
        };

        let mut scaled = self.grad.clone();
        if upstream.len() == 1 {
            // Scalar loss (mean or sum reduction)
            scaled *= upstream[0];
        } else {
            // Element-wise losses: upstream matches the logit layout
            scaled = &scaled * upstream;
        }

        let mut pred_grad = self.pred_grad_cell.borrow_mut();
        if let Some(existing) = pred_grad.as_mut() {
            *existing = &*existing + &scaled;
        } else {
            *pred_grad = Some(scaled);
        }
    }
}

impl LossFn for SigmoidFocalLoss {
    fn forward(&self, predictions: &Tensor, targets: &Tensor) -> Tensor {
        let n = targets.len();
        let classes = self.num_classes;
        assert_eq!(
            predictions.len(),
            n * classes,
            "Predictions must be num_samples * num_classes"
        );

        let pred_data = predictions.data();
        let labels = decode_labels(targets.data(), classes);

        // Mean divides by the number of samples, not elements, matching the
        // reference operator.
        let scale = match self.reduction {
            Reduction::Mean => 1.0 / n as f32,
            Reduction::Sum | Reduction::None => 1.0,
        };

        let mut element_losses = vec![0.0f32; n * classes];
        let mut grads = Array1::zeros(n * classes);

        for (i, &y) in labels.iter().enumerate() {
            let w = self.weight.as_ref().map_or(1.0, |w| w[y]);
            for j in 0..classes {
                let idx = i * classes + j;
                let (loss, grad) = self.element(pred_data[idx], j == y);
                element_losses[idx] = loss * w;
                grads[idx] = grad * w * scale;
            }
        }

        let mut loss = match self.reduction {
            Reduction::Mean => {
                let total: f32 = element_losses.iter().sum();
                Tensor::from_vec(vec![total * scale], true)
            }
            Reduction::Sum => Tensor::from_vec(vec![element_losses.iter().sum()], true),
            Reduction::None => Tensor::from_vec(element_losses, true),
        };

        if predictions.requires_grad() {
            loss.set_backward_op(Rc::new(SigmoidFocalBackward {
                pred_grad_cell: predictions.grad_cell(),
                result_grad: loss.grad_cell(),
                grad: grads,
            }));
        }

        loss
    }

    fn name(&self) -> &'static str {
        "SigmoidFocal"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::autograd::backward;
    use approx::assert_relative_eq;

    fn default_loss(classes: usize) -> SigmoidFocalLoss {
        SigmoidFocalLoss::new(classes, FocalLossConfig::default()).unwrap()
    }

    #[test]
    fn test_sigmoid_focal_reference_values() {
        // gamma=2, alpha=0.25, mean reduction
        let loss_fn = default_loss(2);
        let logits = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], true);
        let labels = Tensor::from_vec(vec![0.0, 1.0], false);

        let mut loss = loss_fn.forward(&logits, &labels);
        backward(&mut loss, None);

        assert_relative_eq!(loss.data()[0], 0.13562961, epsilon = 1e-5);

        let expected_grad = [-0.00657264, 0.11185755, 0.11185755, -0.00657264];
        let grad = logits.grad().unwrap();
        for (g, e) in grad.iter().zip(expected_grad.iter()) {
            assert_relative_eq!(*g, *e, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_sigmoid_basic() {
        assert_relative_eq!(SigmoidFocalLoss::sigmoid(0.0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(SigmoidFocalLoss::sigmoid(100.0), 1.0, epsilon = 1e-6);
        assert_relative_eq!(SigmoidFocalLoss::sigmoid(-100.0), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_sigmoid_symmetry() {
        // σ(x) + σ(-x) = 1
        for &x in &[1.0f32, 2.0, -3.0, 0.5] {
            assert_relative_eq!(
                SigmoidFocalLoss::sigmoid(x) + SigmoidFocalLoss::sigmoid(-x),
                1.0,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn test_softplus_matches_naive_for_moderate_values() {
        for &x in &[-3.0f32, -0.5, 0.0, 0.5, 3.0] {
            let naive = (1.0 + x.exp()).ln();
            assert_relative_eq!(SigmoidFocalLoss::softplus(x), naive, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_numerical_stability_extreme_logits() {
        let loss_fn = default_loss(2);
        let logits = Tensor::from_vec(vec![1000.0, -1000.0, -500.0, 800.0], true);
        let labels = Tensor::from_vec(vec![0.0, 1.0], false);

        let mut loss = loss_fn.forward(&logits, &labels);
        backward(&mut loss, None);

        assert!(loss.data()[0].is_finite());
        assert!(
            loss.data()[0] < 1e-4,
            "Confident correct predictions should have near-zero loss"
        );
        for g in &logits.grad().unwrap() {
            assert!(g.is_finite());
        }
    }

    #[test]
    fn test_gradient_direction() {
        let loss_fn = default_loss(2);
        let logits = Tensor::from_vec(vec![1.0, 0.0], true);
        let labels = Tensor::from_vec(vec![0.0], false);

        let mut loss = loss_fn.forward(&logits, &labels);
        backward(&mut loss, None);

        let grad = logits.grad().unwrap();
        // Target class: push logit higher
        assert!(grad[0] < 0.0);
        // Non-target class: push logit lower
        assert!(grad[1] > 0.0);
    }

    #[test]
    fn test_reduction_sum_is_n_times_mean() {
        let logits = vec![1.0, 0.0, -1.0, 0.0, 1.0, 2.0];
        let labels = vec![2.0, 1.0];

        let mean_fn = default_loss(3);
        let sum_fn = SigmoidFocalLoss::new(
            3,
            FocalLossConfig::default().with_reduction(Reduction::Sum),
        )
        .unwrap();

        let mean = mean_fn.forward(
            &Tensor::from_vec(logits.clone(), false),
            &Tensor::from_vec(labels.clone(), false),
        );
        let sum = sum_fn.forward(
            &Tensor::from_vec(logits, false),
            &Tensor::from_vec(labels, false),
        );

        assert_relative_eq!(sum.data()[0], mean.data()[0] * 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_reduction_none_returns_per_element_losses() {
        let loss_fn = SigmoidFocalLoss::new(
            2,
            FocalLossConfig::default().with_reduction(Reduction::None),
        )
        .unwrap();
        let logits = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], false);
        let labels = Tensor::from_vec(vec![0.0, 1.0], false);

        let loss = loss_fn.forward(&logits, &labels);
        assert_eq!(loss.len(), 4);

        let total: f32 = loss.data().iter().sum();
        assert_relative_eq!(total / 2.0, 0.13562961, epsilon = 1e-5);
    }

    #[test]
    fn test_class_weight_scales_row() {
        let unweighted = default_loss(2);
        let weighted = default_loss(2)
            .with_weight(ndarray::arr1(&[3.0, 1.0]))
            .unwrap();

        let logits = Tensor::from_vec(vec![1.0, 0.0], false);
        let labels = Tensor::from_vec(vec![0.0], false);

        let base = unweighted.forward(&logits, &labels);
        let tripled = weighted.forward(&logits, &labels);

        assert_relative_eq!(tripled.data()[0], 3.0 * base.data()[0], epsilon = 1e-5);
    }

    #[test]
    #[should_panic(expected = "num_samples * num_classes")]
    fn test_mismatched_lengths() {
        let loss_fn = default_loss(3);
        let logits = Tensor::from_vec(vec![1.0, 0.0], false);
        let labels = Tensor::from_vec(vec![0.0], false);
        loss_fn.forward(&logits, &labels);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_label_out_of_range() {
        let loss_fn = default_loss(2);
        let logits = Tensor::from_vec(vec![1.0, 0.0], false);
        let labels = Tensor::from_vec(vec![2.0], false);
        loss_fn.forward(&logits, &labels);
    }

    #[test]
    fn test_name() {
        assert_eq!(default_loss(2).name(), "SigmoidFocal");
    }
}
