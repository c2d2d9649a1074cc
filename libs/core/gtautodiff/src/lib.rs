//! Small reverse-mode differentiation engine over `f64` tensors.
//!
//! Operations record a [Function] on their result whenever an input requires
//! gradients, and [Tensor::backward] accumulates gradients into leaves.
//! [Handle] exposes the recorded computation to [gtgraph::trace].

mod error;
mod function;
mod handle;
mod ops;
mod tensor;

pub use error::Error;
pub use function::{Function, FunctionKind};
pub use handle::Handle;
pub use tensor::Tensor;
