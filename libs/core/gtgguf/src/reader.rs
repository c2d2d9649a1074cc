use std::{collections::HashMap, path::Path};

use crate::{
    codec::{
        padding, read_array, read_len, read_string, read_u32, read_u64, DEFAULT_ALIGNMENT,
        GGML_TYPE_F32, KEY_ALIGNMENT, KEY_DESCRIPTION, KEY_NAME, MAGIC, VERSION,
    },
    Error, Value, ValueType,
};

// -----------------------------------------------------------------------------
// TensorInfo
// GgufTensor
// -----------------------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub name: String,
    /// Row-major shape, outermost dimension first.
    pub shape: Vec<usize>,
    /// Offset from the start of the data section.
    pub offset: usize,
    byte_len: usize,
}

impl TensorInfo {
    #[inline]
    pub fn numel(&self) -> usize {
        self.byte_len / 4
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GgufTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

// -----------------------------------------------------------------------------
// GgufReader
// -----------------------------------------------------------------------------
/// In-memory view of a GGUF file.
#[derive(Debug, Clone)]
pub struct GgufReader {
    version: u32,
    metadata: Vec<(String, Value)>,
    tensor_infos: Vec<TensorInfo>,
    by_name: HashMap<String, usize>,
    data: Vec<u8>,
}

impl GgufReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        log::debug!("Read {} bytes from {:?}", bytes.len(), path);
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut r = bytes;

        let magic: [u8; 4] = read_array(&mut r)?;
        if &magic != MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let version = read_u32(&mut r)?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let tensor_count = read_len(&mut r, 0)?;
        let kv_count = read_len(&mut r, 0)?;

        let mut metadata = Vec::with_capacity(kv_count.min(1024));
        for _ in 0..kv_count {
            let key = read_string(&mut r)?;
            let ty = ValueType::from_tag(read_u32(&mut r)?)?;
            let value = Value::decode(ty, &mut r)?;
            metadata.push((key, value));
        }

        let mut tensor_infos = Vec::with_capacity(tensor_count.min(1024));
        let mut by_name = HashMap::new();
        for i in 0..tensor_count {
            let name = read_string(&mut r)?;
            let n_dims = read_u32(&mut r)?;
            let mut shape = Vec::with_capacity(n_dims.min(8) as usize);
            for _ in 0..n_dims {
                shape.push(_to_usize(read_u64(&mut r)?)?);
            }
            shape.reverse();
            let byte_len = shape
                .iter()
                .try_fold(4usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| {
                    Error::Corrupted(format!("shape {shape:?} of tensor '{name}' overflows"))
                })?;
            let ty = read_u32(&mut r)?;
            if ty != GGML_TYPE_F32 {
                return Err(Error::UnsupportedTensorType(ty));
            }
            let offset = _to_usize(read_u64(&mut r)?)?;
            by_name.insert(name.clone(), i);
            tensor_infos.push(TensorInfo {
                name,
                shape,
                offset,
                byte_len,
            });
        }

        let alignment = metadata
            .iter()
            .find(|(k, _)| k == KEY_ALIGNMENT)
            .and_then(|(_, v)| v.as_u64())
            .unwrap_or(DEFAULT_ALIGNMENT as u64) as usize;
        if alignment == 0 {
            return Err(Error::Corrupted("zero alignment".to_string()));
        }
        let consumed = bytes.len() - r.len();
        let start = (consumed + padding(consumed, alignment)).min(bytes.len());
        let data = bytes[start..].to_vec();

        for info in &tensor_infos {
            let end = info.offset.checked_add(info.byte_len);
            if end.map_or(true, |end| end > data.len()) {
                return Err(Error::Corrupted(format!(
                    "payload of tensor '{}' exceeds the data section",
                    info.name
                )));
            }
        }

        Ok(Self {
            version,
            metadata,
            tensor_infos,
            by_name,
            data,
        })
    }
}

//
// metadata
//
impl GgufReader {
    #[inline]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Metadata in file order.
    #[inline]
    pub fn metadata(&self) -> &[(String, Value)] {
        &self.metadata
    }

    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[inline]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    #[inline]
    pub fn description(&self) -> Option<&str> {
        self.get_string(KEY_DESCRIPTION)
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.get_string(KEY_NAME)
    }
}

//
// tensors
//
impl GgufReader {
    #[inline]
    pub fn tensor_infos(&self) -> &[TensorInfo] {
        &self.tensor_infos
    }

    pub fn tensor(&self, name: &str) -> Result<GgufTensor, Error> {
        let idx = *self
            .by_name
            .get(name)
            .ok_or_else(|| Error::TensorNotFound(name.to_string()))?;
        self.tensor_at(idx)
    }

    pub fn tensor_at(&self, index: usize) -> Result<GgufTensor, Error> {
        let info = self.tensor_infos.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.tensor_infos.len(),
        })?;
        // bounds are validated on open
        let raw = &self.data[info.offset..info.offset + info.byte_len];
        let data = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(GgufTensor {
            name: info.name.clone(),
            shape: info.shape.clone(),
            data,
        })
    }

    /// All tensors in file order.
    pub fn tensors(&self) -> Result<Vec<GgufTensor>, Error> {
        (0..self.tensor_infos.len())
            .map(|i| self.tensor_at(i))
            .collect()
    }
}

#[inline]
fn _to_usize(v: u64) -> Result<usize, Error> {
    usize::try_from(v).map_err(|_| Error::Corrupted(format!("value {v} out of range")))
}
