use std::rc::Rc;

use crate::Tensor;

// -----------------------------------------------------------------------------
// FunctionKind
// -----------------------------------------------------------------------------
/// Differentiable operations of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum FunctionKind {
    // binary
    Add,
    Sub,
    Mul,

    // unary
    Neg,
    Relu,
    Exp,
    Pow(i32),

    // reduction
    Sum,
}

impl FunctionKind {
    /// Operator name, e.g. `Mul`.
    #[inline]
    pub fn op_name(&self) -> &'static str {
        self.into()
    }
}

// -----------------------------------------------------------------------------
// Function
// -----------------------------------------------------------------------------
#[derive(Debug)]
struct _Function {
    kind: FunctionKind,
    inputs: Vec<Tensor>,
    output: Vec<f64>,
}

/// Record of an operation which produced a tensor.
///
/// Holds every input, including those which do not require gradients, so
/// that local derivatives can be evaluated during backward propagation.
#[derive(Debug, Clone)]
pub struct Function(Rc<_Function>);

impl Function {
    #[inline]
    pub(crate) fn new(kind: FunctionKind, inputs: Vec<Tensor>, output: Vec<f64>) -> Self {
        Self(Rc::new(_Function {
            kind,
            inputs,
            output,
        }))
    }

    #[inline]
    pub fn kind_enum(&self) -> FunctionKind {
        self.0.kind
    }

    /// Versioned name of the backward rule, e.g. `MulBackward0`.
    #[inline]
    pub fn kind(&self) -> String {
        format!("{}Backward0", self.0.kind.op_name())
    }

    #[inline]
    pub fn inputs(&self) -> &[Tensor] {
        &self.0.inputs
    }

    /// Gradients of the inputs given the gradient of the output.
    ///
    /// An input holding a single element which was broadcast receives the sum
    /// of the gradients over the broadcast elements.
    pub fn backward(&self, grad: &[f64]) -> Vec<Vec<f64>> {
        let inputs = &self.0.inputs;
        match self.0.kind {
            FunctionKind::Add => vec![
                _reduce_to(grad.to_vec(), &inputs[0]),
                _reduce_to(grad.to_vec(), &inputs[1]),
            ],
            FunctionKind::Sub => vec![
                _reduce_to(grad.to_vec(), &inputs[0]),
                _reduce_to(grad.iter().map(|g| -g).collect(), &inputs[1]),
            ],
            FunctionKind::Mul => {
                let lhs = inputs[0]._data();
                let rhs = inputs[1]._data();
                let dlhs = _zip_with(grad, &rhs, |g, r| g * r);
                let drhs = _zip_with(grad, &lhs, |g, l| g * l);
                vec![_reduce_to(dlhs, &inputs[0]), _reduce_to(drhs, &inputs[1])]
            }
            FunctionKind::Neg => vec![grad.iter().map(|g| -g).collect()],
            FunctionKind::Relu => {
                let x = inputs[0]._data();
                vec![_zip_with(grad, &x, |g, x| if x > 0.0 { g } else { 0.0 })]
            }
            FunctionKind::Exp => vec![_zip_with(grad, &self.0.output, |g, y| g * y)],
            FunctionKind::Pow(n) => {
                let x = inputs[0]._data();
                let n_f64 = n as f64;
                vec![_zip_with(grad, &x, |g, x| g * n_f64 * x.powi(n - 1))]
            }
            FunctionKind::Sum => vec![vec![grad[0]; inputs[0].numel()]],
        }
    }
}

/// Element `i` of `v`, or its only element when `v` was broadcast.
#[inline]
fn _at(v: &[f64], i: usize) -> f64 {
    if v.len() == 1 {
        v[0]
    } else {
        v[i]
    }
}

#[inline]
fn _zip_with(grad: &[f64], other: &[f64], f: impl Fn(f64, f64) -> f64) -> Vec<f64> {
    grad.iter()
        .enumerate()
        .map(|(i, &g)| f(g, _at(other, i)))
        .collect()
}

#[inline]
fn _reduce_to(grad: Vec<f64>, input: &Tensor) -> Vec<f64> {
    if input.numel() == 1 && grad.len() != 1 {
        vec![grad.iter().sum()]
    } else {
        grad
    }
}
