use std::path::Path;

use crate::{
    codec::{
        padding, write_string, write_u32, write_u64, DEFAULT_ALIGNMENT, GGML_TYPE_F32,
        KEY_ALIGNMENT, KEY_ARCHITECTURE, KEY_DESCRIPTION, KEY_NAME, MAGIC, VERSION,
    },
    Error, Value,
};

#[derive(Debug, Clone)]
struct _PendingTensor {
    name: String,
    shape: Vec<usize>,
    data: Vec<f32>,
}

// -----------------------------------------------------------------------------
// GgufWriter
// -----------------------------------------------------------------------------
/// Builder of a GGUF file.
///
/// Metadata keys keep their insertion order; adding an existing key replaces
/// its value in place.
#[derive(Debug, Clone)]
pub struct GgufWriter {
    kv: Vec<(String, Value)>,
    tensors: Vec<_PendingTensor>,
    alignment: u32,
}

impl GgufWriter {
    /// Create a writer whose `general.architecture` is `arch`.
    #[inline]
    pub fn new(arch: &str) -> Self {
        let mut writer = Self {
            kv: Vec::new(),
            tensors: Vec::new(),
            alignment: DEFAULT_ALIGNMENT,
        };
        writer.add_string(KEY_ARCHITECTURE, arch);
        writer
    }
}

//
// metadata
//
impl GgufWriter {
    pub fn add_value(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.kv.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.kv.push((key.to_string(), value)),
        }
        self
    }

    #[inline]
    pub fn add_string(&mut self, key: &str, value: &str) -> &mut Self {
        self.add_value(key, value)
    }

    #[inline]
    pub fn add_u32(&mut self, key: &str, value: u32) -> &mut Self {
        self.add_value(key, value)
    }

    #[inline]
    pub fn add_u64(&mut self, key: &str, value: u64) -> &mut Self {
        self.add_value(key, value)
    }

    #[inline]
    pub fn add_f32(&mut self, key: &str, value: f32) -> &mut Self {
        self.add_value(key, value)
    }

    #[inline]
    pub fn add_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.add_value(key, value)
    }

    #[inline]
    pub fn add_name(&mut self, name: &str) -> &mut Self {
        self.add_string(KEY_NAME, name)
    }

    #[inline]
    pub fn add_description(&mut self, description: &str) -> &mut Self {
        self.add_string(KEY_DESCRIPTION, description)
    }

    /// Align tensor data to `alignment` bytes instead of the default 32.
    ///
    /// `alignment` must be a non-zero power of two.
    pub fn set_alignment(&mut self, alignment: u32) -> Result<&mut Self, Error> {
        if !alignment.is_power_of_two() {
            return Err(Error::InvalidAlignment(alignment));
        }
        self.alignment = alignment;
        Ok(self.add_u32(KEY_ALIGNMENT, alignment))
    }
}

//
// tensors
//
impl GgufWriter {
    /// Add a tensor of the given row-major `shape`. Payloads are stored as `f32`.
    pub fn add_tensor(
        &mut self,
        name: &str,
        shape: &[usize],
        data: &[f64],
    ) -> Result<&mut Self, Error> {
        if self.tensors.iter().any(|t| t.name == name) {
            return Err(Error::DuplicateTensor(name.to_string()));
        }
        if shape.iter().product::<usize>() != data.len() {
            return Err(Error::ShapeMismatch {
                name: name.to_string(),
                shape: shape.to_vec(),
                len: data.len(),
            });
        }
        self.tensors.push(_PendingTensor {
            name: name.to_string(),
            shape: shape.to_vec(),
            data: data.iter().map(|&v| v as f32).collect(),
        });
        Ok(self)
    }

    #[inline]
    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }
}

//
// output
//
impl GgufWriter {
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let alignment = self.alignment as usize;
        let mut buf = Vec::new();

        // header
        buf.extend_from_slice(MAGIC);
        write_u32(&mut buf, VERSION);
        write_u64(&mut buf, self.tensors.len() as u64);
        write_u64(&mut buf, self.kv.len() as u64);

        // metadata
        for (key, value) in &self.kv {
            write_string(&mut buf, key);
            write_u32(&mut buf, value.value_type().tag());
            value.encode(key, &mut buf)?;
        }

        // tensor infos. dimensions are stored innermost first
        let mut offset = 0usize;
        for tensor in &self.tensors {
            write_string(&mut buf, &tensor.name);
            write_u32(&mut buf, tensor.shape.len() as u32);
            for &dim in tensor.shape.iter().rev() {
                write_u64(&mut buf, dim as u64);
            }
            write_u32(&mut buf, GGML_TYPE_F32);
            write_u64(&mut buf, offset as u64);
            let nbytes = tensor.data.len() * 4;
            offset += nbytes + padding(nbytes, alignment);
        }

        // tensor data
        buf.resize(buf.len() + padding(buf.len(), alignment), 0);
        for tensor in &self.tensors {
            for v in &tensor.data {
                buf.extend_from_slice(&v.to_le_bytes());
            }
            buf.resize(buf.len() + padding(tensor.data.len() * 4, alignment), 0);
        }
        Ok(buf)
    }

    /// Write the file at `path`. Parent directories must exist.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)?;
        log::debug!(
            "{} tensors and {} metadata entries written to {:?}",
            self.tensors.len(),
            self.kv.len(),
            path
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header() {
        let mut writer = GgufWriter::new("gradient-tracer");
        writer.add_description("Simple addition");

        let bytes = writer.to_bytes().unwrap();

        assert_eq!(&bytes[0..4], b"GGUF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 3);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 0);
        assert_eq!(u64::from_le_bytes(bytes[16..24].try_into().unwrap()), 2);
    }

    #[test]
    fn test_data_section_aligned() {
        let mut writer = GgufWriter::new("gradient-tracer");
        writer.add_tensor("a", &[3], &[1.0, 2.0, 3.0]).unwrap();
        writer.add_tensor("b", &[1], &[4.0]).unwrap();

        let bytes = writer.to_bytes().unwrap();

        // each tensor occupies a whole number of 32-byte blocks
        assert_eq!(bytes.len() % 32, 0);
        let tail = &bytes[bytes.len() - 64..];
        assert_eq!(f32::from_le_bytes(tail[0..4].try_into().unwrap()), 1.0);
        assert_eq!(f32::from_le_bytes(tail[32..36].try_into().unwrap()), 4.0);
    }

    #[test]
    fn test_duplicate_tensor() {
        let mut writer = GgufWriter::new("gradient-tracer");
        writer.add_tensor("result", &[1], &[1.0]).unwrap();

        let err = writer.add_tensor("result", &[1], &[2.0]).map(|_| ()).unwrap_err();

        assert!(matches!(err, Error::DuplicateTensor(ref n) if n == "result"));
        assert_eq!(writer.tensor_count(), 1);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut writer = GgufWriter::new("gradient-tracer");

        let err = writer.add_tensor("x", &[2, 2], &[1.0; 3]).map(|_| ()).unwrap_err();

        assert!(matches!(err, Error::ShapeMismatch { len: 3, .. }));
    }

    #[test]
    fn test_replace_key_in_place() {
        let mut writer = GgufWriter::new("gradient-tracer");
        writer.add_name("Mul").add_u32("x.count", 1).add_name("Add");

        assert_eq!(writer.kv.len(), 3);
        assert_eq!(writer.kv[1], (KEY_NAME.to_string(), Value::from("Add")));
    }

    #[test]
    fn test_invalid_alignment() {
        let mut writer = GgufWriter::new("gradient-tracer");

        assert!(matches!(
            writer.set_alignment(24).map(|_| ()),
            Err(Error::InvalidAlignment(24))
        ));
        assert!(writer.set_alignment(64).is_ok());
    }
}
