use std::{collections::HashMap, hash::Hash};

use crate::graph::{Graph, NodeKey, OpNode, ValueNode};

// -----------------------------------------------------------------------------
// Differentiable
// Operation
// -----------------------------------------------------------------------------
/// A value tracked by a differentiation engine.
///
/// Every capability is an explicit, possibly empty, field so that the tracer
/// never needs to probe the handle for optional attributes.
pub trait Differentiable: Sized {
    /// Identity of the underlying entity.
    ///
    /// Two handles with equal ids are treated as the same node in a trace,
    /// regardless of their values.
    type Id: Eq + Hash;

    /// Record of the operation which produced a handle.
    type Op: Operation<Input = Self>;

    fn id(&self) -> Self::Id;

    /// Realized payload in row-major order.
    fn value(&self) -> Option<Vec<f64>>;

    /// Accumulated gradient in row-major order.
    fn grad(&self) -> Option<Vec<f64>>;

    /// Storage which this handle refers to.
    ///
    /// Some engines expose leaves through a wrapper (e.g. a gradient
    /// accumulator) which carries no payload by itself.
    #[inline]
    fn view_of(&self) -> Option<Self> {
        None
    }

    /// Operation which produced this handle. `None` for inputs.
    fn grad_fn(&self) -> Option<Self::Op>;
}

pub trait Operation {
    type Input;

    /// Kind of the operation as named by the engine, e.g. `MulBackward0`.
    fn kind(&self) -> String;

    /// Inputs of the operation. Empty slots stand for inputs which are not tracked.
    fn next(&self) -> Vec<Option<Self::Input>>;
}

// -----------------------------------------------------------------------------
// functions
// -----------------------------------------------------------------------------
/// Trace the computation which produced `root`.
#[inline]
pub fn trace<H: Differentiable>(root: &H) -> Graph {
    let mut tracer = Tracer::new();
    tracer.visit(root);
    tracer.finish()
}

/// Operator name of an operation kind.
///
/// Engines tag operation records with a generic suffix, `Backward` optionally
/// followed by a version number. The suffix is removed.
///
/// ```
/// assert_eq!(gtgraph::op_label("MulBackward0"), "Mul");
/// assert_eq!(gtgraph::op_label("Relu"), "Relu");
/// ```
pub fn op_label(kind: &str) -> &str {
    let unversioned = kind.trim_end_matches(|c: char| c.is_ascii_digit());
    match unversioned.strip_suffix("Backward") {
        Some(label) if !label.is_empty() => label,
        _ => kind,
    }
}

/// Reduce a payload to the scalar stored in a [ValueNode].
///
/// The first element in row-major order is taken, so single-element payloads
/// map to their only element. An empty payload has no value.
#[inline]
pub fn reduce(payload: &[f64]) -> Option<f64> {
    payload.first().copied()
}

// -----------------------------------------------------------------------------
// Tracer
// -----------------------------------------------------------------------------
/// Builds a [Graph] from handles.
///
/// Handle identities are registered in an arena which assigns sequential
/// indices on first sight, so node keys only depend on the traversal order
/// and not on memory addresses.
/// Several roots may be visited with the same tracer; shared sub-expressions
/// are then merged into a single graph.
pub struct Tracer<H: Differentiable> {
    registry: HashMap<H::Id, usize>,
    graph: Graph,
}

impl<H: Differentiable> Default for Tracer<H> {
    #[inline]
    fn default() -> Self {
        Self {
            registry: HashMap::new(),
            graph: Graph::new(),
        }
    }
}

impl<H: Differentiable> Tracer<H> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit `root` and everything it was computed from.
    pub fn visit(&mut self, root: &H) {
        // depth-first, pre-order. predecessors are pushed in reverse.
        let mut stack = self._expand(root);
        stack.reverse();
        while let Some(handle) = stack.pop() {
            let mut next = self._expand(&handle);
            next.reverse();
            stack.append(&mut next);
        }
    }

    #[inline]
    pub fn finish(self) -> Graph {
        self.graph
    }
}

// impls
impl<H: Differentiable> Tracer<H> {
    #[inline]
    fn _key(&mut self, handle: &H) -> NodeKey {
        let next = self.registry.len();
        let idx = *self.registry.entry(handle.id()).or_insert(next);
        NodeKey::new(format!("v{idx}"))
    }

    /// Add nodes and edges of a single handle and return predecessors still to visit.
    fn _expand(&mut self, handle: &H) -> Vec<H> {
        if _is_empty(handle) {
            log::warn!("Handle carries neither payload nor operation and is skipped");
            return Vec::new();
        }
        let key = self._key(handle);
        if self.graph.contains(&key) {
            return Vec::new();
        }

        let grad_fn = handle.grad_fn();
        let node = if let Some(storage) = handle.view_of() {
            _value_node(key.clone(), &storage)
        } else {
            _value_node(key.clone(), handle)
        };
        log::debug!("Traced value {key}: {:?}", node.value);
        self.graph.add_node(node);

        let Some(op) = grad_fn else {
            return Vec::new();
        };
        let kind = op.kind();
        let label = op_label(&kind);
        let op_key = NodeKey::new(format!("{key}/{label}"));
        self.graph.add_node(OpNode::new(op_key.clone(), label));
        self.graph.add_edge(op_key.clone(), key);

        let mut preds = Vec::new();
        for pred in op.next().into_iter().flatten() {
            if _is_empty(&pred) {
                log::warn!("Empty input of '{op_key}' is skipped");
                continue;
            }
            let pred_key = self._key(&pred);
            self.graph.add_edge(pred_key, op_key.clone());
            preds.push(pred);
        }
        preds
    }
}

#[inline]
fn _is_empty<H: Differentiable>(handle: &H) -> bool {
    handle.view_of().is_none() && handle.value().is_none() && handle.grad_fn().is_none()
}

#[inline]
fn _value_node<H: Differentiable>(key: NodeKey, source: &H) -> ValueNode {
    ValueNode::new(
        key,
        source.value().as_deref().and_then(reduce),
        source.grad().as_deref().and_then(reduce),
    )
}
