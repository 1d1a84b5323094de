//! Tape-based autograd support for the loss operators
//!
//! A deliberately small engine: tensors carry their data, an optional
//! gradient cell, and an optional backward operation. Loss operators compute
//! their analytic gradient during the forward pass and attach it as a
//! [`BackwardOp`] on the returned loss tensor.

mod backward;
pub mod precision;
mod tensor;

pub use backward::BackwardOp;
pub use precision::{f32_to_fp16, fp16_to_f32, Precision};
pub use tensor::Tensor;

/// Perform backward pass on a tensor
///
/// When no gradient is supplied the tensor is seeded with ones, the
/// conventional starting point for a scalar loss.
pub fn backward(tensor: &mut Tensor, grad_output: Option<ndarray::Array1<f32>>) {
    if let Some(grad) = grad_output {
        tensor.set_grad(grad);
    } else {
        let ones = ndarray::Array1::ones(tensor.len());
        tensor.set_grad(ones);
    }

    if let Some(op) = tensor.backward_op() {
        op.backward();
    }
}
