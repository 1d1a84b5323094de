//! Backward operation trait

/// A recorded backward operation
///
/// Implementations read the upstream gradient from the result tensor's
/// gradient cell and accumulate into the gradients of their inputs.
pub trait BackwardOp {
    /// Propagate gradients to the operation's inputs
    fn backward(&self);
}
