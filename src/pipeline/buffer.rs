use crate::foundation::error::{GpuError, GpuResult};
use std::ops::{Deref, DerefMut};

/// What a buffer will be bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Byte storage a command buffer can bind, independent of where the bytes actually live.
pub trait GpuBuffer {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn usage(&self) -> BufferUsage;

    /// Copy `bytes` into the buffer starting at `offset`.
    fn upload(&mut self, bytes: &[u8], offset: usize) -> GpuResult<()>;

    /// Map the whole buffer for writing; dropping the mapping unmaps it.
    fn map(&mut self) -> BufferMapping<'_>;

    /// Read-only view used while drawing.
    fn contents(&self) -> &[u8];
}

/// Writable view of a mapped buffer.
#[derive(Debug)]
pub struct BufferMapping<'a> {
    bytes: &'a mut [u8],
}

impl<'a> BufferMapping<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }
}

impl Deref for BufferMapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl DerefMut for BufferMapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.bytes
    }
}

/// Host-memory buffer used by the software pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

impl CpuBuffer {
    /// A zero-filled buffer of `size` bytes.
    pub fn new(size: usize, usage: BufferUsage) -> Self {
        Self {
            usage,
            data: vec![0; size],
        }
    }

    pub fn from_bytes(bytes: &[u8], usage: BufferUsage) -> Self {
        Self {
            usage,
            data: bytes.to_vec(),
        }
    }

    /// Pack `f32` values little-endian.
    pub fn from_f32s(values: &[f32], usage: BufferUsage) -> Self {
        Self {
            usage,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Pack `u32` values little-endian.
    pub fn from_u32s(values: &[u32], usage: BufferUsage) -> Self {
        Self {
            usage,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    /// Pack `u16` values little-endian.
    pub fn from_u16s(values: &[u16], usage: BufferUsage) -> Self {
        Self {
            usage,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }
}

impl GpuBuffer for CpuBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn upload(&mut self, bytes: &[u8], offset: usize) -> GpuResult<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                GpuError::validation(format!(
                    "upload of {} bytes at offset {offset} overflows a {} byte buffer",
                    bytes.len(),
                    self.data.len()
                ))
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    fn map(&mut self) -> BufferMapping<'_> {
        BufferMapping::new(&mut self.data)
    }

    fn contents(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/buffer.rs"]
mod tests;
