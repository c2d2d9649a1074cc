mod dot;
mod error;
mod graph;
mod trace;

pub use dot::{DotBuilder, Format, RankDir};
pub use error::Error;
pub use graph::{Edge, Graph, Node, NodeKey, OpNode, ValueNode};
pub use trace::{op_label, reduce, trace, Differentiable, Operation, Tracer};
