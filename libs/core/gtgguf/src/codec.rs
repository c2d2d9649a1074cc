use std::io::Read;

use crate::Error;

pub(crate) const MAGIC: &[u8; 4] = b"GGUF";
pub(crate) const VERSION: u32 = 3;
pub(crate) const GGML_TYPE_F32: u32 = 0;

/// Alignment of the tensor data section unless `general.alignment` says otherwise.
pub const DEFAULT_ALIGNMENT: u32 = 32;

pub const KEY_ARCHITECTURE: &str = "general.architecture";
pub const KEY_ALIGNMENT: &str = "general.alignment";
pub const KEY_NAME: &str = "general.name";
pub const KEY_DESCRIPTION: &str = "general.description";

// -----------------------------------------------------------------------------
// encoding
// -----------------------------------------------------------------------------
#[inline]
pub(crate) fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_u64(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Zero padding which brings `len` to a multiple of `alignment`.
#[inline]
pub(crate) fn padding(len: usize, alignment: usize) -> usize {
    (alignment - len % alignment) % alignment
}

// -----------------------------------------------------------------------------
// decoding
// -----------------------------------------------------------------------------
#[inline]
pub(crate) fn read_array<const N: usize>(r: &mut impl Read) -> Result<[u8; N], Error> {
    let mut bytes = [0u8; N];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}

#[inline]
pub(crate) fn read_u32(r: &mut impl Read) -> Result<u32, Error> {
    Ok(u32::from_le_bytes(read_array(r)?))
}

#[inline]
pub(crate) fn read_u64(r: &mut impl Read) -> Result<u64, Error> {
    Ok(u64::from_le_bytes(read_array(r)?))
}

/// Read a length prefix and check that it fits into the remaining input.
#[inline]
pub(crate) fn read_len(r: &mut &[u8], elem_size: usize) -> Result<usize, Error> {
    let len = read_u64(r)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Corrupted(format!("length {len} out of range")))?;
    if len.saturating_mul(elem_size) > r.len() {
        return Err(Error::Corrupted(format!(
            "length {len} exceeds the remaining {} bytes",
            r.len()
        )));
    }
    Ok(len)
}

pub(crate) fn read_string(r: &mut &[u8]) -> Result<String, Error> {
    let len = read_len(r, 1)?;
    let mut bytes = vec![0u8; len];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8(bytes)?)
}
