use crate::{Error, Function, FunctionKind, Tensor};

// -----------------------------------------------------------------------------
// helpers
// -----------------------------------------------------------------------------
impl Tensor {
    /// Result of an operation. A [Function] is recorded only if an input
    /// requires gradients.
    fn _record(
        kind: FunctionKind,
        inputs: Vec<Tensor>,
        data: Vec<f64>,
        shape: Vec<usize>,
    ) -> Self {
        let requires_grad = inputs.iter().any(Tensor::is_requires_grad);
        let grad_fn = requires_grad.then(|| Function::new(kind, inputs, data.clone()));
        Tensor::_raw(data, shape, requires_grad, grad_fn)
    }

    fn _unary(&self, kind: FunctionKind, f: impl Fn(f64) -> f64) -> Self {
        let data = self._data().iter().map(|&x| f(x)).collect();
        Self::_record(kind, vec![self.clone()], data, self.shape())
    }

    /// Elementwise binary operation. Shapes must match unless one side holds
    /// a single element, which is then broadcast.
    fn _binary(
        &self,
        rhs: &Tensor,
        kind: FunctionKind,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<Self, Error> {
        let (lshape, rshape) = (self.shape(), rhs.shape());
        let (lnum, rnum) = (self.numel(), rhs.numel());
        // two single elements keep the shape with more dimensions
        let keep_lhs = rnum == 1 && (lnum != 1 || lshape.len() >= rshape.len());
        let shape = if lshape == rshape || keep_lhs {
            lshape
        } else if lnum == 1 {
            rshape
        } else {
            return Err(Error::ShapeMismatch {
                op: kind.op_name(),
                lhs: lshape,
                rhs: rshape,
            });
        };

        let data = {
            let (l, r) = (self._data(), rhs._data());
            (0..shape.iter().product::<usize>())
                .map(|i| f(l[if lnum == 1 { 0 } else { i }], r[if rnum == 1 { 0 } else { i }]))
                .collect()
        };
        Ok(Self::_record(kind, vec![self.clone(), rhs.clone()], data, shape))
    }
}

// -----------------------------------------------------------------------------
// operations
// -----------------------------------------------------------------------------
impl Tensor {
    #[inline]
    pub fn try_add(&self, rhs: &Tensor) -> Result<Tensor, Error> {
        self._binary(rhs, FunctionKind::Add, |l, r| l + r)
    }

    #[inline]
    pub fn try_sub(&self, rhs: &Tensor) -> Result<Tensor, Error> {
        self._binary(rhs, FunctionKind::Sub, |l, r| l - r)
    }

    #[inline]
    pub fn try_mul(&self, rhs: &Tensor) -> Result<Tensor, Error> {
        self._binary(rhs, FunctionKind::Mul, |l, r| l * r)
    }

    #[inline]
    pub fn relu(&self) -> Tensor {
        self._unary(FunctionKind::Relu, |x| x.max(0.0))
    }

    #[inline]
    pub fn exp(&self) -> Tensor {
        self._unary(FunctionKind::Exp, f64::exp)
    }

    #[inline]
    pub fn powi(&self, n: i32) -> Tensor {
        self._unary(FunctionKind::Pow(n), |x| x.powi(n))
    }

    /// Sum of all elements as a scalar.
    #[inline]
    pub fn sum(&self) -> Tensor {
        let total = self._data().iter().sum();
        Self::_record(FunctionKind::Sum, vec![self.clone()], vec![total], Vec::new())
    }
}

impl std::ops::Neg for &Tensor {
    type Output = Tensor;

    #[inline]
    fn neg(self) -> Self::Output {
        self._unary(FunctionKind::Neg, |x| -x)
    }
}

impl std::ops::Neg for Tensor {
    type Output = Tensor;

    #[inline]
    fn neg(self) -> Self::Output {
        -&self
    }
}

/// Operators panic on incompatible shapes; the `try_*` methods report them instead.
macro_rules! _define_arithmetic_binary {
    ($tr:ident, $fn:ident, $try_fn:ident) => {
        impl std::ops::$tr<&Tensor> for &Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: &Tensor) -> Self::Output {
                match self.$try_fn(rhs) {
                    Ok(t) => t,
                    Err(e) => panic!("{e}"),
                }
            }
        }
        impl std::ops::$tr<Tensor> for &Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: Tensor) -> Self::Output {
                std::ops::$tr::$fn(self, &rhs)
            }
        }
        impl std::ops::$tr<&Tensor> for Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: &Tensor) -> Self::Output {
                std::ops::$tr::$fn(&self, rhs)
            }
        }
        impl std::ops::$tr<Tensor> for Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: Tensor) -> Self::Output {
                std::ops::$tr::$fn(&self, &rhs)
            }
        }
        impl std::ops::$tr<f64> for &Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                std::ops::$tr::$fn(self, &Tensor::scalar(rhs))
            }
        }
        impl std::ops::$tr<f64> for Tensor {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: f64) -> Self::Output {
                std::ops::$tr::$fn(&self, &Tensor::scalar(rhs))
            }
        }
        impl std::ops::$tr<&Tensor> for f64 {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: &Tensor) -> Self::Output {
                std::ops::$tr::$fn(&Tensor::scalar(self), rhs)
            }
        }
        impl std::ops::$tr<Tensor> for f64 {
            type Output = Tensor;

            #[inline]
            fn $fn(self, rhs: Tensor) -> Self::Output {
                std::ops::$tr::$fn(&Tensor::scalar(self), &rhs)
            }
        }
    };
}

_define_arithmetic_binary!(Add, add, try_add);
_define_arithmetic_binary!(Sub, sub, try_sub);
_define_arithmetic_binary!(Mul, mul, try_mul);

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_relu_expression() {
        let x = Tensor::from_vec(vec![-4.0]).requires_grad(true);
        let z = 2.0 * &x + 2.0 + &x;
        let q = z.relu() + &z * &x;
        let h = (&z * &z).relu();
        let y = &h + &q + &q * &x;

        y.backward().unwrap();

        assert_abs_diff_eq!(y.item().unwrap(), -20.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.grad().unwrap()[0], 46.0, epsilon = 1e-12);
    }

    #[test]
    fn test_add_same_operand() {
        let x = Tensor::scalar(1.5).requires_grad(true);
        let y = &x + &x;

        y.backward().unwrap();

        assert_eq!(y.item(), Ok(3.0));
        assert_eq!(x.grad(), Some(vec![2.0]));
    }

    #[rstest]
    #[case(vec![2], vec![3])]
    #[case(vec![2, 2], vec![4])]
    fn test_shape_mismatch(#[case] lshape: Vec<usize>, #[case] rshape: Vec<usize>) {
        let lhs = Tensor::new(vec![1.0; lshape.iter().product()], lshape.clone()).unwrap();
        let rhs = Tensor::new(vec![1.0; rshape.iter().product()], rshape.clone()).unwrap();

        let err = lhs.try_mul(&rhs).unwrap_err();

        assert_eq!(
            err,
            Error::ShapeMismatch {
                op: "Mul",
                lhs: lshape,
                rhs: rshape
            }
        );
    }

    #[test]
    #[should_panic(expected = "incompatible for 'Add'")]
    fn test_operator_panics_on_mismatch() {
        let _ = Tensor::from_vec(vec![1.0, 2.0]) + Tensor::from_vec(vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_broadcast() {
        let x = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], vec![2, 2])
            .unwrap()
            .requires_grad(true);
        let s = Tensor::scalar(3.0).requires_grad(true);

        let y = (10.0 - &x * &s).sum();
        y.backward().unwrap();

        assert_eq!(y.item(), Ok(10.0));
        assert_eq!(x.grad(), Some(vec![-3.0; 4]));
        assert_eq!(s.grad(), Some(vec![-10.0]));
    }

    #[test]
    fn test_unary() {
        let x = Tensor::from_vec(vec![-1.0, 0.5, 2.0]).requires_grad(true);

        let y = (x.powi(3) + x.exp() - x.relu()).sum();
        y.backward().unwrap();

        let grad = x.grad().unwrap();
        for (i, &v) in [-1.0f64, 0.5, 2.0].iter().enumerate() {
            let relu_grad = if v > 0.0 { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(grad[i], 3.0 * v * v + v.exp() - relu_grad, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_neg() {
        let x = Tensor::scalar(2.0).requires_grad(true);
        let y = -&x * 3.0;

        y.backward().unwrap();

        assert_eq!(y.item(), Ok(-6.0));
        assert_eq!(x.grad(), Some(vec![-3.0]));
        assert_eq!(y.grad_fn().unwrap().kind(), "MulBackward0");
    }

    #[test]
    fn test_no_record_without_grad() {
        let a = Tensor::scalar(3.0);
        let b = Tensor::scalar(2.0);

        let c = &a * &b;

        assert!(c.is_leaf());
        assert!(!c.is_requires_grad());
        assert_eq!(c.item(), Ok(6.0));
    }
}
