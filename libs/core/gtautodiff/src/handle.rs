use gtgraph::{Differentiable, Operation};

use crate::{Function, Tensor};

// -----------------------------------------------------------------------------
// Handle
// -----------------------------------------------------------------------------
/// Traceable view of a [Tensor].
///
/// Inputs of a [Function] which are leaves are exposed as [Handle::Leaf], a
/// payload-free view referring to the leaf storage. It shares the identity of
/// the leaf, so a leaf used several times is traced once.
#[derive(Debug, Clone)]
pub enum Handle {
    Tensor(Tensor),
    Leaf(Tensor),
}

impl From<Tensor> for Handle {
    #[inline]
    fn from(tensor: Tensor) -> Self {
        Handle::Tensor(tensor)
    }
}

impl From<&Tensor> for Handle {
    #[inline]
    fn from(tensor: &Tensor) -> Self {
        Handle::Tensor(tensor.clone())
    }
}

impl Handle {
    #[inline]
    pub fn tensor(&self) -> &Tensor {
        match self {
            Handle::Tensor(t) | Handle::Leaf(t) => t,
        }
    }
}

impl Differentiable for Handle {
    type Id = usize;
    type Op = Function;

    #[inline]
    fn id(&self) -> Self::Id {
        self.tensor().id()
    }

    #[inline]
    fn value(&self) -> Option<Vec<f64>> {
        match self {
            Handle::Tensor(t) => Some(t.data()),
            Handle::Leaf(_) => None,
        }
    }

    #[inline]
    fn grad(&self) -> Option<Vec<f64>> {
        match self {
            Handle::Tensor(t) => t.grad(),
            Handle::Leaf(_) => None,
        }
    }

    #[inline]
    fn view_of(&self) -> Option<Self> {
        match self {
            Handle::Tensor(_) => None,
            Handle::Leaf(t) => Some(Handle::Tensor(t.clone())),
        }
    }

    #[inline]
    fn grad_fn(&self) -> Option<Self::Op> {
        match self {
            Handle::Tensor(t) => t.grad_fn(),
            Handle::Leaf(_) => None,
        }
    }
}

impl Operation for Function {
    type Input = Handle;

    #[inline]
    fn kind(&self) -> String {
        Function::kind(self)
    }

    fn next(&self) -> Vec<Option<Self::Input>> {
        self.inputs()
            .iter()
            .map(|t| match (t.is_requires_grad(), t.is_leaf()) {
                (false, _) => None,
                (true, true) => Some(Handle::Leaf(t.clone())),
                (true, false) => Some(Handle::Tensor(t.clone())),
            })
            .collect()
    }
}
