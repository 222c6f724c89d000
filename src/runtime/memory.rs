use crate::bytecode::module::Id;
use crate::foundation::error::{GpuError, GpuResult};

/// One live allocation: where a value lives and what type it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInfo {
    pub addr: usize,
    pub size: usize,
    /// Declared type id of the stored value.
    pub ty: Id,
}

/// A saved stack position that [`ShaderMemory::reset_to`] can return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    sp: usize,
    records: usize,
}

impl Mark {
    pub fn stack_pointer(self) -> usize {
        self.sp
    }
}

/// Flat byte arena standing in for a GPU's register and local memory.
///
/// Allocation bumps a stack pointer and never reuses an address until the arena is rolled back
/// to an earlier [`Mark`]. The arena refuses to grow past its limit.
#[derive(Debug, Clone)]
pub struct ShaderMemory {
    bytes: Vec<u8>,
    sp: usize,
    limit: usize,
    records: Vec<VarInfo>,
}

impl ShaderMemory {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            sp: 0,
            limit,
            records: Vec::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tighten or relax the limit; it can never drop below what is already allocated.
    pub fn set_limit(&mut self, limit: usize) -> GpuResult<()> {
        if limit < self.sp {
            return Err(GpuError::ArenaExhausted {
                requested: self.sp,
                available: limit,
            });
        }
        self.limit = limit;
        Ok(())
    }

    pub fn stack_pointer(&self) -> usize {
        self.sp
    }

    pub fn available(&self) -> usize {
        self.limit - self.sp
    }

    /// Reserve `size` zeroed bytes for a value of type `ty`.
    pub fn alloc(&mut self, ty: Id, size: usize) -> GpuResult<VarInfo> {
        if size > self.available() {
            return Err(GpuError::ArenaExhausted {
                requested: size,
                available: self.available(),
            });
        }
        let addr = self.sp;
        self.sp += size;
        if self.bytes.len() < self.sp {
            self.bytes.resize(self.sp, 0);
        }
        self.bytes[addr..self.sp].fill(0);
        let info = VarInfo { addr, size, ty };
        self.records.push(info);
        Ok(info)
    }

    pub fn mark(&self) -> Mark {
        Mark {
            sp: self.sp,
            records: self.records.len(),
        }
    }

    /// Release everything allocated after `mark`.
    pub fn reset_to(&mut self, mark: Mark) {
        self.sp = mark.sp.min(self.sp);
        self.records.truncate(mark.records);
    }

    /// Live allocations in address order.
    pub fn records(&self) -> &[VarInfo] {
        &self.records
    }

    /// The allocation that starts at `addr`, if any.
    pub fn record_at(&self, addr: usize) -> Option<&VarInfo> {
        self.records
            .binary_search_by_key(&addr, |r| r.addr)
            .ok()
            .map(|i| &self.records[i])
    }

    fn check(&self, addr: usize, len: usize) -> GpuResult<()> {
        match addr.checked_add(len) {
            Some(end) if end <= self.sp => Ok(()),
            _ => Err(GpuError::execution(format!(
                "arena access {addr}..{} is outside the live region 0..{}",
                addr.saturating_add(len),
                self.sp
            ))),
        }
    }

    pub fn slice(&self, addr: usize, len: usize) -> GpuResult<&[u8]> {
        self.check(addr, len)?;
        Ok(&self.bytes[addr..addr + len])
    }

    pub fn slice_mut(&mut self, addr: usize, len: usize) -> GpuResult<&mut [u8]> {
        self.check(addr, len)?;
        Ok(&mut self.bytes[addr..addr + len])
    }

    pub fn write(&mut self, addr: usize, data: &[u8]) -> GpuResult<()> {
        self.slice_mut(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy(&mut self, src: usize, dst: usize, len: usize) -> GpuResult<()> {
        self.check(src, len)?;
        self.check(dst, len)?;
        self.bytes.copy_within(src..src + len, dst);
        Ok(())
    }

    pub fn read_u32(&self, addr: usize) -> GpuResult<u32> {
        let b = self.slice(addr, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/memory.rs"]
mod tests;
