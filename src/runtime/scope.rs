//! Id-to-address maps: the module-level [`Globals`] of one stage and the per-call [`Scope`].

use crate::bytecode::module::{Constant, Id, Program};
use crate::foundation::error::{GpuError, GpuResult};
use crate::runtime::memory::{ShaderMemory, VarInfo};
use crate::runtime::types::TypeTable;
use smallvec::SmallVec;

/// What an id resolves to inside an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The id's value is stored in the arena.
    Value(VarInfo),
    /// The id is a pointer to `pointee`-typed data at `addr`.
    Pointer { addr: usize, pointee: Id },
}

/// Module-scope bindings for one stage: constants and global variables.
#[derive(Debug, Clone, Default)]
pub struct Globals {
    slots: Vec<Option<Slot>>,
}

impl Globals {
    pub fn new(bound: u32) -> Self {
        Self {
            slots: vec![None; bound as usize],
        }
    }

    pub fn bind(&mut self, id: Id, slot: Slot) -> GpuResult<()> {
        let entry = self
            .slots
            .get_mut(id as usize)
            .ok_or_else(|| GpuError::execution(format!("id %{id} is outside the id bound")))?;
        *entry = Some(slot);
        Ok(())
    }

    pub fn get(&self, id: Id) -> Option<Slot> {
        self.slots.get(id as usize).copied().flatten()
    }

    /// Point global variable `id` at existing storage.
    pub fn bind_variable(&mut self, program: &Program, id: Id, addr: usize) -> GpuResult<()> {
        let var = program
            .variables
            .get(&id)
            .ok_or_else(|| GpuError::execution(format!("%{id} is not a global variable")))?;
        let (_, pointee) = program.pointee(var.ty)?;
        self.bind(id, Slot::Pointer { addr, pointee })
    }

    /// Allocate storage for global variable `id`, apply its initializer and bind it.
    pub fn allocate_variable(
        &mut self,
        program: &Program,
        types: &TypeTable,
        memory: &mut ShaderMemory,
        id: Id,
    ) -> GpuResult<VarInfo> {
        let var = program
            .variables
            .get(&id)
            .ok_or_else(|| GpuError::execution(format!("%{id} is not a global variable")))?;
        let (_, pointee) = program.pointee(var.ty)?;
        let info = memory.alloc(pointee, types.size(pointee)?)?;
        if let Some(init) = var.initializer {
            let bytes = constant_bytes(program, types, init)?;
            memory.write(info.addr, &bytes[..info.size.min(bytes.len())])?;
        }
        self.bind(id, Slot::Pointer {
            addr: info.addr,
            pointee,
        })?;
        Ok(info)
    }

    /// Allocate and fill one arena value per declared constant.
    pub fn bind_constants(
        &mut self,
        program: &Program,
        types: &TypeTable,
        memory: &mut ShaderMemory,
    ) -> GpuResult<()> {
        for (&id, constant) in &program.constants {
            let bytes = constant_bytes(program, types, id)?;
            let info = memory.alloc(constant.ty(), bytes.len())?;
            memory.write(info.addr, &bytes)?;
            self.bind(id, Slot::Value(info))?;
        }
        Ok(())
    }
}

/// Encoded bytes of constant `id`, sized to its type.
fn constant_bytes(program: &Program, types: &TypeTable, id: Id) -> GpuResult<Vec<u8>> {
    let constant = program
        .constants
        .get(&id)
        .ok_or_else(|| GpuError::execution(format!("%{id} is not a constant")))?;
    let size = types.size(constant.ty())?;
    let mut out = match constant {
        Constant::Literal { words, .. } => words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        Constant::Composite { constituents, .. } => {
            let mut out = Vec::with_capacity(size);
            for c in constituents {
                out.extend(constant_bytes(program, types, *c)?);
            }
            out
        }
    };
    if out.len() < size {
        return Err(GpuError::execution(format!(
            "constant %{id} encodes {} bytes, its type needs {size}",
            out.len()
        )));
    }
    out.truncate(size);
    Ok(out)
}

/// Per-call retargeting of global interface variables.
///
/// Each entry points one global variable at a different address for a single call, which is how
/// one compiled vertex program writes each triangle corner into its own slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceBindings {
    entries: SmallVec<[(Id, usize); 8]>,
}

impl InterfaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `var` at `addr` for the next call, replacing any earlier target.
    pub fn retarget(&mut self, var: Id, addr: usize) {
        match self.entries.iter_mut().find(|(id, _)| *id == var) {
            Some(entry) => entry.1 = addr,
            None => self.entries.push((var, addr)),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, usize)> + '_ {
        self.entries.iter().copied()
    }
}

/// Call frame of one function invocation.
#[derive(Debug, Clone)]
pub struct Scope {
    slots: Vec<Option<Slot>>,
    pub(crate) pc: usize,
}

impl Scope {
    /// Copy the stage globals and apply the call's interface overrides.
    pub fn new(globals: &Globals, bindings: &InterfaceBindings) -> GpuResult<Self> {
        let mut scope = Self {
            slots: globals.slots.clone(),
            pc: 0,
        };
        for (var, addr) in bindings.iter() {
            match scope.slot(var)? {
                Slot::Pointer { pointee, .. } => scope.bind(var, Slot::Pointer { addr, pointee })?,
                Slot::Value(_) => {
                    return Err(GpuError::execution(format!(
                        "interface binding %{var} is not a pointer"
                    )));
                }
            }
        }
        Ok(scope)
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn bind(&mut self, id: Id, slot: Slot) -> GpuResult<()> {
        let entry = self
            .slots
            .get_mut(id as usize)
            .ok_or_else(|| GpuError::execution(format!("id %{id} is outside the id bound")))?;
        *entry = Some(slot);
        Ok(())
    }

    pub fn slot(&self, id: Id) -> GpuResult<Slot> {
        self.slots
            .get(id as usize)
            .copied()
            .flatten()
            .ok_or_else(|| GpuError::execution(format!("id %{id} has no binding in scope")))
    }

    pub fn value(&self, id: Id) -> GpuResult<VarInfo> {
        match self.slot(id)? {
            Slot::Value(info) => Ok(info),
            Slot::Pointer { .. } => Err(GpuError::execution(format!(
                "id %{id} is a pointer, expected a value"
            ))),
        }
    }

    pub fn pointer(&self, id: Id) -> GpuResult<(usize, Id)> {
        match self.slot(id)? {
            Slot::Pointer { addr, pointee } => Ok((addr, pointee)),
            Slot::Value(_) => Err(GpuError::execution(format!(
                "id %{id} is a value, expected a pointer"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/scope.rs"]
mod tests;
