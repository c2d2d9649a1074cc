use std::{borrow::Borrow, collections::HashMap, fmt::Display, hash::Hash};

// -----------------------------------------------------------------------------
// NodeKey
// -----------------------------------------------------------------------------
/// Key of a node in [Graph].
///
/// Keys are produced by the tracer from the identity of the traced handle,
/// so two nodes never share a key unless they describe the same entity.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    #[inline]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeKey {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeKey {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeKey {
    #[inline]
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for NodeKey {
    #[inline]
    fn from(key: String) -> Self {
        Self(key)
    }
}

// -----------------------------------------------------------------------------
// ValueNode
// OpNode
// Node
// -----------------------------------------------------------------------------
/// A computed value. The key doubles as the display name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValueNode {
    pub key: NodeKey,
    pub value: Option<f64>,
    pub grad: Option<f64>,
}

impl ValueNode {
    #[inline]
    pub fn new(key: impl Into<NodeKey>, value: Option<f64>, grad: Option<f64>) -> Self {
        Self {
            key: key.into(),
            value,
            grad,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.key.as_str()
    }
}

/// An operation which produced a value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct OpNode {
    pub key: NodeKey,
    pub op: String,
}

impl OpNode {
    #[inline]
    pub fn new(key: impl Into<NodeKey>, op: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            op: op.into(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.op
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Value(ValueNode),
    Op(OpNode),
}

impl Node {
    #[inline]
    pub fn key(&self) -> &NodeKey {
        match self {
            Node::Value(node) => &node.key,
            Node::Op(node) => &node.key,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Node::Value(node) => node.name(),
            Node::Op(node) => node.name(),
        }
    }

    #[inline]
    pub fn as_value(&self) -> Option<&ValueNode> {
        match self {
            Node::Value(node) => Some(node),
            Node::Op(_) => None,
        }
    }

    #[inline]
    pub fn as_op(&self) -> Option<&OpNode> {
        match self {
            Node::Op(node) => Some(node),
            Node::Value(_) => None,
        }
    }
}

impl From<ValueNode> for Node {
    #[inline]
    fn from(node: ValueNode) -> Self {
        Node::Value(node)
    }
}

impl From<OpNode> for Node {
    #[inline]
    fn from(node: OpNode) -> Self {
        Node::Op(node)
    }
}

// -----------------------------------------------------------------------------
// Edge
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Edge {
    pub from: NodeKey,
    pub to: NodeKey,
}

impl Edge {
    #[inline]
    pub fn new(from: impl Into<NodeKey>, to: impl Into<NodeKey>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// Graph
// -----------------------------------------------------------------------------
/// Directed multigraph of value and operation nodes.
///
/// Nodes keep their insertion order, which makes every iteration over the graph
/// (and therefore its textual and DOT renderings) deterministic.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "_GraphRepr", into = "_GraphRepr")]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<NodeKey, usize>,
    edges: Vec<Edge>,
}

//
// ctor
//
impl Graph {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

//
// mutation
//
impl Graph {
    /// Insert a node, replacing the node with the same key if any.
    ///
    /// A replaced node keeps the position of the original one.
    pub fn add_node(&mut self, node: impl Into<Node>) {
        let node = node.into();
        match self.index.get(node.key()) {
            Some(&idx) => self.nodes[idx] = node,
            None => {
                self.index.insert(node.key().clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    /// Append an edge. Endpoints are not required to exist yet.
    #[inline]
    pub fn add_edge(&mut self, from: impl Into<NodeKey>, to: impl Into<NodeKey>) {
        self.edges.push(Edge::new(from, to));
    }
}

//
// queries
//
impl Graph {
    #[inline]
    pub fn find_node<Q>(&self, key: &Q) -> Option<&Node>
    where
        NodeKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&idx| &self.nodes[idx])
    }

    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        NodeKey: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Number of nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    #[inline]
    pub fn value_nodes(&self) -> impl Iterator<Item = &ValueNode> {
        self.nodes.iter().filter_map(Node::as_value)
    }

    #[inline]
    pub fn op_nodes(&self) -> impl Iterator<Item = &OpNode> {
        self.nodes.iter().filter_map(Node::as_op)
    }

    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[inline]
    pub fn edges_from<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.from.as_str() == key)
    }

    #[inline]
    pub fn edges_to<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.to.as_str() == key)
    }

    /// Edges having an endpoint which is not a node of this graph.
    pub fn dangling_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges
            .iter()
            .filter(|e| !self.index.contains_key(&e.from) || !self.index.contains_key(&e.to))
    }

    /// Keys of all nodes in a topological order of the edges,
    /// or `None` if the graph contains a directed cycle.
    ///
    /// Edges pointing to unknown keys are ignored.
    pub fn topological_order(&self) -> Option<Vec<&NodeKey>> {
        let mut indegree = vec![0usize; self.nodes.len()];
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        for edge in &self.edges {
            let (Some(&from), Some(&to)) = (self.index.get(&edge.from), self.index.get(&edge.to))
            else {
                continue;
            };
            indegree[to] += 1;
            outgoing[from].push(to);
        }

        // stack is reversed so that ready nodes are popped in insertion order
        let mut ready: Vec<usize> = (0..self.nodes.len())
            .rev()
            .filter(|&idx| indegree[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(idx) = ready.pop() {
            order.push(self.nodes[idx].key());
            for &next in &outgoing[idx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                }
            }
        }
        (order.len() == self.nodes.len()).then_some(order)
    }
}

//
// display
//
impl Display for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn opt(v: Option<f64>) -> String {
            v.map_or_else(|| "none".to_string(), |v| v.to_string())
        }

        writeln!(f, "Graph:")?;
        writeln!(f, "Nodes:")?;
        for node in self.value_nodes() {
            writeln!(
                f,
                "  {}: value={}, grad={}",
                node.name(),
                opt(node.value),
                opt(node.grad)
            )?;
        }
        for node in self.op_nodes() {
            writeln!(f, "  {}: {}", node.key, node.name())?;
        }
        writeln!(f, "Edges:")?;
        for edge in &self.edges {
            writeln!(f, "  {} -> {}", edge.from, edge.to)?;
        }
        Ok(())
    }
}

//
// ser/de
//
#[derive(serde::Serialize, serde::Deserialize)]
struct _GraphRepr {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl From<_GraphRepr> for Graph {
    fn from(repr: _GraphRepr) -> Self {
        let mut graph = Graph::new();
        for node in repr.nodes {
            graph.add_node(node);
        }
        graph.edges = repr.edges;
        graph
    }
}

impl From<Graph> for _GraphRepr {
    #[inline]
    fn from(graph: Graph) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}
