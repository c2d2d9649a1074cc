// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Shape {shape:?} does not hold {len} elements")]
    InvalidShape { shape: Vec<usize>, len: usize },
    #[error("Shapes {lhs:?} and {rhs:?} are incompatible for '{op}'")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
    #[error("Tensor of shape {0:?} is not a single-element tensor")]
    NotScalar(Vec<usize>),
    #[error("Tensor does not require gradients")]
    NoGrad,
}
