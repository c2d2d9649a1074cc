use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
    str::FromStr,
};

use itertools::Itertools;

use crate::{
    graph::{Graph, Node, ValueNode},
    Error,
};

// -----------------------------------------------------------------------------
// RankDir
// -----------------------------------------------------------------------------
/// Layout direction of a rendered graph.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum RankDir {
    /// Top to bottom
    #[strum(serialize = "TB")]
    #[serde(rename = "TB")]
    TopBottom,
    /// Left to right
    #[default]
    #[strum(serialize = "LR")]
    #[serde(rename = "LR")]
    LeftRight,
}

impl RankDir {
    #[inline]
    pub fn parse(s: &str) -> Result<Self, Error> {
        Self::from_str(s).map_err(|_| Error::InvalidRankDir(s.to_string()))
    }
}

// -----------------------------------------------------------------------------
// Format
// -----------------------------------------------------------------------------
/// Output format of a rendered graph.
///
/// Formats other than [Format::Dot] require the Graphviz `dot` executable.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Dot,
    #[default]
    Svg,
    Png,
    Pdf,
}

impl Format {
    #[inline]
    pub fn parse(s: &str) -> Result<Self, Error> {
        Self::from_str(s).map_err(|_| Error::InvalidFormat(s.to_string()))
    }

    #[inline]
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Dot => "dot",
            Format::Svg => "svg",
            Format::Png => "png",
            Format::Pdf => "pdf",
        }
    }
}

// -----------------------------------------------------------------------------
// DotBuilder
// -----------------------------------------------------------------------------
/// Graphviz representation of a traced [Graph].
///
/// Value nodes are drawn as records holding the value and the gradient,
/// operation nodes as plain nodes labelled with the operator.
#[derive(Debug, Clone)]
pub struct DotBuilder<'a> {
    graph: &'a Graph,
    name: String,
    rankdir: RankDir,
    precision: usize,
    graph_global_settings: BTreeMap<String, String>,
    node_global_settings: BTreeMap<String, String>,
}

impl<'a> DotBuilder<'a> {
    #[inline]
    pub fn new(graph: &'a Graph) -> Self {
        Self {
            graph,
            name: "GradientGraph".to_string(),
            rankdir: RankDir::default(),
            precision: 4,
            graph_global_settings: BTreeMap::new(),
            node_global_settings: BTreeMap::new(),
        }
    }
}

impl<'a> DotBuilder<'a> {
    /// Set the name of the graph.
    #[inline]
    pub fn with_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    #[inline]
    pub fn with_rankdir(&mut self, rankdir: RankDir) -> &mut Self {
        self.rankdir = rankdir;
        self
    }

    /// Set the layout direction from its Graphviz name, `TB` or `LR`.
    #[inline]
    pub fn with_rankdir_str(&mut self, rankdir: &str) -> Result<&mut Self, Error> {
        self.rankdir = RankDir::parse(rankdir)?;
        Ok(self)
    }

    /// Set the number of decimals of values and gradients.
    #[inline]
    pub fn with_precision(&mut self, precision: usize) -> &mut Self {
        self.precision = precision;
        self
    }

    /// Set a global setting for the graph.
    #[inline]
    pub fn with_graph_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.graph_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Set a global setting for the node.
    #[inline]
    pub fn with_node_setting(&mut self, key: &str, value: &str) -> &mut Self {
        self.node_global_settings
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Label of a value node: `{ data <value> | grad <grad> }`.
    ///
    /// A missing gradient is shown as zero.
    pub fn value_label(&self, node: &ValueNode) -> String {
        let prec = self.precision;
        let data = node
            .value
            .map_or_else(|| "n/a".to_string(), |v| format!("{v:.prec$}"));
        let grad = node.grad.unwrap_or(0.0);
        format!("{{ data {data} | grad {grad:.prec$} }}")
    }

    /// Generate a dot file.
    pub fn gen_dot(&self) -> String {
        let mut buf = String::new();

        buf += &format!("digraph {} {{\n", self.name);

        // graph settings
        buf += "  graph [\n";
        buf += &format!("    rankdir={};\n", self.rankdir);
        for (key, value) in &self.graph_global_settings {
            buf.push_str(&format!("    {}={};\n", key, value));
        }
        buf += "  ];\n\n";

        // node settings
        buf += "  node [\n";
        for (key, value) in &self.node_global_settings {
            buf.push_str(&format!("    {}={};\n", key, value));
        }
        buf += "  ];\n\n";

        // nodes
        buf += "  // nodes\n";
        for node in self.graph.nodes() {
            let annotations = match node {
                Node::Value(node) => [
                    format!("label=\"{}\"", _escape(&self.value_label(node))),
                    "shape=record".to_string(),
                ]
                .iter()
                .join(", "),
                Node::Op(node) => format!("label=\"{}\"", _escape(node.name())),
            };
            buf.push_str(&format!(
                "  \"{}\" [{annotations}];\n",
                _escape(node.key().as_str())
            ));
        }
        buf += "\n";

        // edges
        buf += "  // edges\n";
        for edge in self.graph.edges() {
            buf.push_str(&format!(
                "  \"{}\" -> \"{}\";\n",
                _escape(edge.from.as_str()),
                _escape(edge.to.as_str())
            ));
        }
        buf += "}\n";
        buf
    }

    /// Write `<base>.dot` and, unless `format` is [Format::Dot], let Graphviz
    /// render `<base>.<ext>` from it.
    ///
    /// Returns the path of the rendered file. Parent directories must exist.
    pub fn render(&self, base: impl AsRef<Path>, format: Format) -> Result<PathBuf, Error> {
        let base = base.as_ref();
        let dot_path = _with_suffix(base, "dot");
        std::fs::write(&dot_path, self.gen_dot())?;
        log::debug!("Graph source written to {:?}", dot_path);
        if format == Format::Dot {
            return Ok(dot_path);
        }

        let out_path = _with_suffix(base, format.extension());
        let output = Command::new("dot")
            .arg(format!("-T{}", format.extension()))
            .arg(&dot_path)
            .arg("-o")
            .arg(&out_path)
            .output()
            .map_err(|e| Error::Graphviz(format!("failed to execute 'dot': {e}")))?;
        if !output.status.success() {
            return Err(Error::Graphviz(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        log::debug!("Graph rendered to {:?}", out_path);
        Ok(out_path)
    }
}

/// Append an extension without replacing dots already in the file name.
#[inline]
fn _with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}

#[inline]
fn _escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::graph::OpNode;

    use super::*;

    fn sample() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(ValueNode::new("v0", Some(6.0), Some(1.0)));
        graph.add_node(OpNode::new("v0/Mul", "Mul"));
        graph.add_node(ValueNode::new("v1", Some(3.0), None));
        graph.add_node(ValueNode::new("v2", None, None));
        graph.add_edge("v0/Mul", "v0");
        graph.add_edge("v1", "v0/Mul");
        graph.add_edge("v2", "v0/Mul");
        graph
    }

    #[test]
    fn test_gen_dot() {
        let graph = sample();

        let dot = DotBuilder::new(&graph)
            .with_rankdir(RankDir::TopBottom)
            .with_node_setting("fontname", "Arial")
            .gen_dot();

        assert!(dot.starts_with("digraph GradientGraph {\n"));
        assert!(dot.contains("    rankdir=TB;\n"));
        assert!(dot.contains("    fontname=Arial;\n"));
        assert!(dot.contains(
            "  \"v0\" [label=\"{ data 6.0000 | grad 1.0000 }\", shape=record];\n"
        ));
        assert!(dot.contains("  \"v0/Mul\" [label=\"Mul\"];\n"));
        assert!(dot.contains("  \"v1\" -> \"v0/Mul\";\n"));
        assert!(dot.ends_with("}\n"));
    }

    #[rstest]
    #[case(0, Some(3.14159), Some(2.4), "{ data 3 | grad 2 }")]
    #[case(2, Some(3.14159), Some(2.5), "{ data 3.14 | grad 2.50 }")]
    #[case(2, Some(3.0), None, "{ data 3.00 | grad 0.00 }")]
    #[case(1, None, None, "{ data n/a | grad 0.0 }")]
    fn test_value_label(
        #[case] precision: usize,
        #[case] value: Option<f64>,
        #[case] grad: Option<f64>,
        #[case] expected: &str,
    ) {
        let graph = Graph::new();
        let mut builder = DotBuilder::new(&graph);
        builder.with_precision(precision);

        let label = builder.value_label(&ValueNode::new("v0", value, grad));

        assert_eq!(label, expected);
    }

    #[rstest]
    #[case("TB", RankDir::TopBottom)]
    #[case("LR", RankDir::LeftRight)]
    fn test_rankdir_parse(#[case] s: &str, #[case] expected: RankDir) {
        assert_eq!(RankDir::parse(s).unwrap(), expected);
        assert_eq!(expected.to_string(), s);
    }

    #[rstest]
    #[case("DIAGONAL")]
    #[case("lr")]
    #[case("")]
    fn test_rankdir_rejected(#[case] s: &str) {
        let graph = sample();
        let mut builder = DotBuilder::new(&graph);

        let err = builder.with_rankdir_str(s).map(|_| ()).unwrap_err();

        assert!(matches!(err, Error::InvalidRankDir(ref v) if v == s));
        // rejected configuration leaves the builder untouched
        assert!(builder.gen_dot().contains("rankdir=LR;"));
    }

    #[rstest]
    #[case("dot", Format::Dot)]
    #[case("svg", Format::Svg)]
    #[case("png", Format::Png)]
    #[case("pdf", Format::Pdf)]
    fn test_format_parse(#[case] s: &str, #[case] expected: Format) {
        assert_eq!(Format::parse(s).unwrap(), expected);
        assert_eq!(expected.extension(), s);
    }

    #[test]
    fn test_format_rejected() {
        assert!(matches!(Format::parse("bmp"), Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_render_dot() {
        let graph = sample();
        let dir = std::env::temp_dir().join(format!("gtgraph_dot_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let base = dir.join("UC-0001_TS_0001.simple");

        let path = DotBuilder::new(&graph).render(&base, Format::Dot).unwrap();

        assert_eq!(path, dir.join("UC-0001_TS_0001.simple.dot"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"v2\" -> \"v0/Mul\""));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_escape() {
        assert_eq!(_escape(r#"a"b\c"#), r#"a\"b\\c"#);
    }
}
