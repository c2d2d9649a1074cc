//! Reader and writer of a subset of the GGUF v3 container.
//!
//! Metadata values of every GGUF type are supported; tensors are limited to
//! `F32` payloads. All numbers are little-endian.

mod codec;
mod error;
mod reader;
mod value;
mod writer;

pub use codec::{DEFAULT_ALIGNMENT, KEY_ALIGNMENT, KEY_ARCHITECTURE, KEY_DESCRIPTION, KEY_NAME};
pub use error::Error;
pub use reader::{GgufReader, GgufTensor, TensorInfo};
pub use value::{Value, ValueType};
pub use writer::GgufWriter;
