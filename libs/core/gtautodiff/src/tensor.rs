use std::{
    cell::{Ref, RefCell},
    collections::HashMap,
    rc::Rc,
};

use crate::{Error, Function};

// -----------------------------------------------------------------------------
// _Tensor
// Tensor
// -----------------------------------------------------------------------------
#[derive(Debug)]
pub(crate) struct _Tensor {
    pub(crate) data: Vec<f64>,
    pub(crate) shape: Vec<usize>,
    pub(crate) requires_grad: bool,
    pub(crate) grad: Option<Vec<f64>>,
    pub(crate) grad_fn: Option<Function>,
}

/// Shared handle of a row-major `f64` tensor.
///
/// Clones refer to the same storage. Two tensors are the same entity iff
/// [Tensor::ptr_eq] holds.
#[derive(Clone)]
pub struct Tensor(pub(crate) Rc<RefCell<_Tensor>>);

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.0.borrow();
        f.debug_struct("Tensor")
            .field("data", &inner.data)
            .field("shape", &inner.shape)
            .field("requires_grad", &inner.requires_grad)
            .field("grad_fn", &inner.grad_fn.as_ref().map(Function::kind))
            .finish()
    }
}

//
// ctor
//
impl Tensor {
    /// Create a leaf tensor from row-major `data`.
    ///
    /// An empty `shape` denotes a scalar holding exactly one element.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self, Error> {
        if shape.iter().product::<usize>() != data.len() {
            return Err(Error::InvalidShape {
                shape,
                len: data.len(),
            });
        }
        Ok(Self::_raw(data, shape, false, None))
    }

    /// Create a one-dimensional leaf tensor.
    #[inline]
    pub fn from_vec(data: Vec<f64>) -> Self {
        let shape = vec![data.len()];
        Self::_raw(data, shape, false, None)
    }

    /// Create a scalar leaf tensor.
    #[inline]
    pub fn scalar(value: f64) -> Self {
        Self::_raw(vec![value], Vec::new(), false, None)
    }

    /// Mark the tensor as requiring gradients.
    #[inline]
    pub fn requires_grad(self, requires_grad: bool) -> Self {
        self.0.borrow_mut().requires_grad = requires_grad;
        self
    }

    #[inline]
    pub(crate) fn _raw(
        data: Vec<f64>,
        shape: Vec<usize>,
        requires_grad: bool,
        grad_fn: Option<Function>,
    ) -> Self {
        Self(Rc::new(RefCell::new(_Tensor {
            data,
            shape,
            requires_grad,
            grad: None,
            grad_fn,
        })))
    }
}

//
// methods
//
impl Tensor {
    #[inline]
    pub fn data(&self) -> Vec<f64> {
        self.0.borrow().data.clone()
    }

    #[inline]
    pub(crate) fn _data(&self) -> Ref<'_, Vec<f64>> {
        Ref::map(self.0.borrow(), |t| &t.data)
    }

    #[inline]
    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().shape.clone()
    }

    #[inline]
    pub fn numel(&self) -> usize {
        self.0.borrow().data.len()
    }

    /// Value of a single-element tensor.
    #[inline]
    pub fn item(&self) -> Result<f64, Error> {
        let inner = self.0.borrow();
        match inner.data.as_slice() {
            [v] => Ok(*v),
            _ => Err(Error::NotScalar(inner.shape.clone())),
        }
    }

    #[inline]
    pub fn is_requires_grad(&self) -> bool {
        self.0.borrow().requires_grad
    }

    /// Accumulated gradient. Only leaves retain gradients.
    #[inline]
    pub fn grad(&self) -> Option<Vec<f64>> {
        self.0.borrow().grad.clone()
    }

    #[inline]
    pub fn zero_grad(&self) {
        self.0.borrow_mut().grad = None;
    }

    /// Operation which produced this tensor.
    #[inline]
    pub fn grad_fn(&self) -> Option<Function> {
        self.0.borrow().grad_fn.clone()
    }

    /// Whether the tensor was created by the user rather than by an operation.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.0.borrow().grad_fn.is_none()
    }

    /// Identity of the storage.
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    /// Check that two tensors are the same instance.
    ///
    /// Note that this comparison is not based on the contents of the tensors.
    #[inline]
    pub fn ptr_eq(lhs: &Self, rhs: &Self) -> bool {
        Rc::ptr_eq(&lhs.0, &rhs.0)
    }
}

//
// backward
//
impl Tensor {
    /// Propagate gradients from this single-element tensor to the leaves.
    ///
    /// Gradients are accumulated, so consecutive calls add up.
    pub fn backward(&self) -> Result<(), Error> {
        if self.numel() != 1 {
            return Err(Error::NotScalar(self.shape()));
        }
        if !self.is_requires_grad() {
            return Err(Error::NoGrad);
        }

        // A node propagates only after every consumer has contributed to its
        // gradient, so each function runs once. `refcount` holds the number
        // of consumers still pending.
        let mut refcount = _count_ref(self);
        let mut grads: HashMap<usize, Vec<f64>> = HashMap::new();
        grads.insert(self.id(), vec![1.0]);
        let mut stack = vec![self.clone()];

        while let Some(tensor) = stack.pop() {
            let Some(grad) = grads.remove(&tensor.id()) else {
                continue;
            };
            let Some(func) = tensor.grad_fn() else {
                let mut inner = tensor.0.borrow_mut();
                match inner.grad.as_mut() {
                    Some(acc) => acc.iter_mut().zip(&grad).for_each(|(a, g)| *a += g),
                    None => inner.grad = Some(grad),
                }
                continue;
            };

            for (input, input_grad) in func.inputs().iter().zip(func.backward(&grad)) {
                if !input.is_requires_grad() {
                    continue;
                }
                let id = input.id();
                match grads.get_mut(&id) {
                    Some(acc) => acc.iter_mut().zip(&input_grad).for_each(|(a, g)| *a += g),
                    None => {
                        grads.insert(id, input_grad);
                    }
                }
                let pending = match refcount.get_mut(&id) {
                    Some(count) => {
                        *count = count.saturating_sub(1);
                        *count
                    }
                    None => 0,
                };
                if pending == 0 {
                    stack.push(input.clone());
                }
            }
        }
        log::debug!("Gradients propagated through {} tensors", refcount.len());
        Ok(())
    }
}

/// Count consumers of every tensor reachable from `root` through inputs which
/// require gradients.
fn _count_ref(root: &Tensor) -> HashMap<usize, usize> {
    let mut refcount = HashMap::new();
    let mut stack = vec![root.clone()];
    refcount.insert(root.id(), 0);

    while let Some(tensor) = stack.pop() {
        let Some(func) = tensor.grad_fn() else {
            continue;
        };
        for input in func.inputs().iter().filter(|t| t.is_requires_grad()) {
            match refcount.get_mut(&input.id()) {
                Some(count) => *count += 1,
                None => {
                    refcount.insert(input.id(), 1);
                    stack.push(input.clone());
                }
            }
        }
    }
    refcount
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_new() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], vec![2, 3]).unwrap();

        assert_eq!(t.shape(), vec![2, 3]);
        assert_eq!(t.numel(), 6);
        assert!(t.is_leaf());
        assert!(!t.is_requires_grad());
        assert_eq!(t.grad(), None);
    }

    #[test]
    fn test_new_invalid_shape() {
        let err = Tensor::new(vec![1.0, 2.0], vec![3]).unwrap_err();

        assert_eq!(
            err,
            Error::InvalidShape {
                shape: vec![3],
                len: 2
            }
        );
    }

    #[test]
    fn test_item() {
        assert_eq!(Tensor::scalar(4.2).item(), Ok(4.2));
        assert_eq!(Tensor::from_vec(vec![4.2]).item(), Ok(4.2));
        assert_eq!(
            Tensor::from_vec(vec![1.0, 2.0]).item(),
            Err(Error::NotScalar(vec![2]))
        );
    }

    #[test]
    fn test_ptr_eq() {
        let a = Tensor::scalar(1.0);
        let b = a.clone();
        let c = Tensor::scalar(1.0);

        assert!(Tensor::ptr_eq(&a, &b));
        assert_eq!(a.id(), b.id());
        assert!(!Tensor::ptr_eq(&a, &c));
    }

    #[test]
    fn test_backward_mul() {
        let a = Tensor::scalar(3.0).requires_grad(true);
        let b = Tensor::scalar(2.0).requires_grad(true);
        let c = &a * &b;

        c.backward().unwrap();

        assert_eq!(c.item(), Ok(6.0));
        assert_eq!(a.grad(), Some(vec![2.0]));
        assert_eq!(b.grad(), Some(vec![3.0]));
        // intermediate gradients are not retained
        assert_eq!(c.grad(), None);
    }

    #[test]
    fn test_backward_shared_intermediate() {
        // y = x0 * x1, z = exp(y), w = y * z
        let x0 = Tensor::scalar(0.5).requires_grad(true);
        let x1 = Tensor::scalar(2.0).requires_grad(true);
        let y = &x0 * &x1;
        let z = y.exp();
        let w = &y * &z;

        w.backward().unwrap();

        // dw/dy = z + y * z
        let dwdy = 1f64.exp() * 2.0;
        assert_abs_diff_eq!(x0.grad().unwrap()[0], dwdy * 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x1.grad().unwrap()[0], dwdy * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_accumulates() {
        let x = Tensor::scalar(3.0).requires_grad(true);
        let y = &x * 2.0;

        y.backward().unwrap();
        y.backward().unwrap();

        assert_eq!(x.grad(), Some(vec![4.0]));
        x.zero_grad();
        assert_eq!(x.grad(), None);
    }

    #[test]
    fn test_backward_not_scalar() {
        let x = Tensor::from_vec(vec![1.0, 2.0]).requires_grad(true);
        let y = &x * 2.0;

        assert_eq!(y.backward(), Err(Error::NotScalar(vec![2])));
    }

    #[test]
    fn test_backward_no_grad() {
        let x = Tensor::scalar(1.0);
        let y = &x + 1.0;

        assert_eq!(y.backward(), Err(Error::NoGrad));
        assert!(y.grad_fn().is_none());
    }

    #[test]
    fn test_backward_constant_input() {
        let x = Tensor::scalar(3.0).requires_grad(true);
        let c = Tensor::scalar(5.0);
        let y = &x * &c;

        y.backward().unwrap();

        assert_eq!(x.grad(), Some(vec![5.0]));
        assert_eq!(c.grad(), None);
    }
}
