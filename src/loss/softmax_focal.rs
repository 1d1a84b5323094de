//! Softmax focal loss for single-label classification
//!
//! Probabilities are normalized across mutually exclusive classes, then the
//! cross-entropy of the target class is modulated by `(1 - pt)^gamma` so
//! well-classified samples contribute little:
//!
//! ```text
//! FL_i = -alpha * w[y_i] * (1 - pt_i)^gamma * ln(pt_i)
//! pt_i = softmax(x_i)[y_i]
//! ```
//!
//! Gradient with respect to the logits, via the softmax Jacobian:
//!
//! ```text
//! ∂FL_i/∂x_ij = c_i * pt_i * ([j == y_i] - p_ij)
//! c_i = -alpha * w[y_i] * ((1-pt_i)^gamma / pt_i - gamma * (1-pt_i)^(gamma-1) * ln(pt_i))
//! ```

use ndarray::Array1;
use std::cell::RefCell;
use std::rc::Rc;

use crate::autograd::BackwardOp;
use crate::Tensor;

use super::{decode_labels, FocalLossConfig, FocalLossError, LossFn, Reduction};

/// Softmax focal loss operator
///
/// # Example
///
/// ```
/// use perdida::{backward, FocalLossConfig, LossFn, SoftmaxFocalLoss, Tensor};
///
/// let loss_fn = SoftmaxFocalLoss::new(3, FocalLossConfig::default()).unwrap();
/// let logits = Tensor::from_vec(vec![1.0, 0.0, -1.0, 0.0, 1.0, 2.0], true);
/// let labels = Tensor::from_vec(vec![2.0, 1.0], false);
///
/// let mut loss = loss_fn.forward(&logits, &labels);
/// backward(&mut loss, None);
/// assert!(loss.data()[0] > 0.0);
/// ```
pub struct SoftmaxFocalLoss {
    num_classes: usize,
    gamma: f32,
    alpha: f32,
    reduction: Reduction,
    weight: Option<Array1<f32>>,
}

impl SoftmaxFocalLoss {
    /// Create a new softmax focal loss over `num_classes` classes
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

    /// Log-softmax of one logit row (max-subtracted, log-sum-exp)
    fn log_softmax_row(row: &[f32]) -> Vec<f32> {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let sum_exp: f32 = row.iter().map(|&x| (x - max).exp()).sum();
        let lse = sum_exp.ln();
        row.iter().map(|&x| x - max - lse).collect()
    }
}

struct SoftmaxFocalBackward {
    pred_grad_cell: Rc<RefCell<Option<Array1<f32>>>>,
    result_grad: Rc<RefCell<Option<Array1<f32>>>>,
    /// Per-logit gradient of the reduced loss, upstream factor excluded
    grad: Array1<f32>,
    num_classes: usize,
}

impl BackwardOp for SoftmaxFocalBackward {
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
            // Per-sample losses: one upstream entry per row
            for (row, &g) in upstream.iter().enumerate() {
                for j in 0..self.num_classes {
                    scaled[row * self.num_classes + j] *= g;
                }
            }
        }

        let mut pred_grad = self.pred_grad_cell.borrow_mut();
        if let Some(existing) = pred_grad.as_mut() {
            *existing = &*existing + &scaled;
        } else {
            *pred_grad = Some(scaled);
        }
    }
}

impl LossFn for SoftmaxFocalLoss {
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

        let scale = match self.reduction {
            Reduction::Mean => 1.0 / n as f32,
            Reduction::Sum | Reduction::None => 1.0,
        };

        let mut sample_losses = vec![0.0f32; n];
        let mut grads = Array1::zeros(n * classes);

        for (i, &y) in labels.iter().enumerate() {
            let start = i * classes;
            let row: Vec<f32> = (0..classes).map(|j| pred_data[start + j]).collect();
            let log_probs = Self::log_softmax_row(&row);

            let log_pt = log_probs[y];
            let pt = log_pt.exp();
            let onem = 1.0 - pt;
            let w = self.weight.as_ref().map_or(1.0, |w| w[y]);

            sample_losses[i] = -self.alpha * w * onem.powf(self.gamma) * log_pt;

            // c = -alpha * w * ((1-pt)^g / pt - g * (1-pt)^(g-1) * ln(pt))
            //
            // When pt saturates to 1 the second term is the indeterminate
            // 0^(g-1) * 0 for fractional gamma; its limit is 0, so take it
            // directly instead of producing inf * 0.
            let focus_term = if self.gamma == 0.0 || onem == 0.0 {
                0.0
            } else {
                self.gamma * onem.powf(self.gamma - 1.0) * log_pt
            };
            let c = -self.alpha
                * w
                * (onem.powf(self.gamma) / pt.max(f32::MIN_POSITIVE) - focus_term);

            for (j, &log_p) in log_probs.iter().enumerate() {
                let p = log_p.exp();
                let indicator = if j == y { 1.0 } else { 0.0 };
                grads[start + j] = c * pt * (indicator - p) * scale;
            }
        }

        let mut loss = match self.reduction {
            Reduction::Mean => {
                let total: f32 = sample_losses.iter().sum();
                Tensor::from_vec(vec![total * scale], true)
            }
            Reduction::Sum => Tensor::from_vec(vec![sample_losses.iter().sum()], true),
            Reduction::None => Tensor::from_vec(sample_losses, true),
        };

        if predictions.requires_grad() {
            loss.set_backward_op(Rc::new(SoftmaxFocalBackward {
                pred_grad_cell: predictions.grad_cell(),
                result_grad: loss.grad_cell(),
                grad: grads,
                num_classes: classes,
            }));
        }

        loss
    }

    fn name(&self) -> &'static str {
        "SoftmaxFocal"
    }
}
