// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported layout direction '{0}'. Expected one of: TB, LR")]
    InvalidRankDir(String),
    #[error("Unsupported output format '{0}'. Expected one of: dot, svg, png, pdf")]
    InvalidFormat(String),
    #[error("Graphviz failed: {0}")]
    Graphviz(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
