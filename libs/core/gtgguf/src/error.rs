// -----------------------------------------------------------------------------
// Error
// -----------------------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid magic {0:?}. Not a GGUF file")]
    BadMagic([u8; 4]),
    #[error("Unsupported GGUF version {0}")]
    UnsupportedVersion(u32),
    #[error("Unsupported metadata value type {0}")]
    UnsupportedValueType(u32),
    #[error("Unsupported tensor type {0}. Only F32 is supported")]
    UnsupportedTensorType(u32),
    #[error("Array elements of '{key}' must share a single type")]
    MixedArray { key: String },
    #[error("Alignment {0} is not a power of two")]
    InvalidAlignment(u32),
    #[error("Tensor '{0}' not found")]
    TensorNotFound(String),
    #[error("Tensor index {index} out of range. The file holds {len} tensors")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Tensor '{0}' is already added")]
    DuplicateTensor(String),
    #[error("Tensor '{name}' has shape {shape:?} but {len} elements are given")]
    ShapeMismatch {
        name: String,
        shape: Vec<usize>,
        len: usize,
    },
    #[error("Corrupted data: {0}")]
    Corrupted(String),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
