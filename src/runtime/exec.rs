//! Straight-line interpreter.
//!
//! [`Invocation::call`] builds a fresh [`Scope`] from the stage globals, allocates one arena record
//! per local intermediate and then executes the function body until it runs off the end or hits
//! `Return`.

use crate::bytecode::instr::{FloatOp, Instruction};
use crate::bytecode::module::{Id, LocalKind, Program};
use crate::foundation::core::Rgba;
use crate::foundation::error::{GpuError, GpuResult};
use crate::runtime::memory::ShaderMemory;
use crate::runtime::scope::{Globals, InterfaceBindings, Scope, Slot};
use crate::runtime::types::{RuntimeType, TypeTable};
use smallvec::SmallVec;

/// Lane index that `VectorShuffle` treats as undefined.
const UNDEFINED_LANE: u32 = u32::MAX;

/// Texture lookups performed by `ImageSample`.
pub trait TextureSource {
    /// Nearest-neighbour sample of the texture bound at `(set, binding)`.
    fn sample(&self, set: u32, binding: u32, uv: [f32; 2]) -> GpuResult<Rgba>;
}

/// A [`TextureSource`] with nothing bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextures;

impl TextureSource for NoTextures {
    fn sample(&self, set: u32, binding: u32, _uv: [f32; 2]) -> GpuResult<Rgba> {
        Err(GpuError::validation(format!(
            "no texture bound at set {set} binding {binding}"
        )))
    }
}

/// Arena bytes a call to `function` allocates for its locals.
pub fn local_footprint(program: &Program, types: &TypeTable, function: Id) -> GpuResult<usize> {
    let f = program.function(function)?;
    let mut total = 0usize;
    for local in &f.locals {
        total += match local.kind {
            LocalKind::Value => types.size(local.ty)?,
            LocalKind::Variable => types.size(program.pointee(local.ty)?.1)?,
            LocalKind::Pointer => 0,
        };
    }
    Ok(total)
}

/// Everything a stage needs to run: its program, layouts, globals and textures.
#[derive(Clone, Copy)]
pub struct Invocation<'a> {
    pub program: &'a Program,
    pub types: &'a TypeTable,
    pub globals: &'a Globals,
    pub textures: &'a dyn TextureSource,
}

impl<'a> Invocation<'a> {
    /// Run `function` once against `memory`.
    pub fn call(
        &self,
        function: Id,
        bindings: &InterfaceBindings,
        memory: &mut ShaderMemory,
    ) -> GpuResult<()> {
        let f = self.program.function(function)?;
        let mut scope = Scope::new(self.globals, bindings)?;
        for local in &f.locals {
            match local.kind {
                LocalKind::Value => {
                    let info = memory.alloc(local.ty, self.types.size(local.ty)?)?;
                    scope.bind(local.id, Slot::Value(info))?;
                }
                LocalKind::Variable => {
                    let (_, pointee) = self.program.pointee(local.ty)?;
                    let info = memory.alloc(pointee, self.types.size(pointee)?)?;
                    scope.bind(local.id, Slot::Pointer {
                        addr: info.addr,
                        pointee,
                    })?;
                }
                LocalKind::Pointer => {}
            }
        }

        while let Some(inst) = f.body.get(scope.pc) {
            scope.pc += 1;
            self.execute(inst, &mut scope, memory)?;
        }
        Ok(())
    }

    fn runtime(&self, ty: Id) -> GpuResult<&'a RuntimeType> {
        self.types.runtime(ty)
    }

    fn execute(
        &self,
        inst: &Instruction,
        scope: &mut Scope,
        memory: &mut ShaderMemory,
    ) -> GpuResult<()> {
        match inst {
            Instruction::Variable {
                result,
                initializer,
                ..
            } => {
                if let Some(init) = initializer {
                    let (addr, pointee) = scope.pointer(*result)?;
                    let src = scope.value(*init)?;
                    memory.copy(src.addr, addr, self.types.size(pointee)?)?;
                }
            }
            Instruction::Load {
                result, pointer, ..
            } => {
                let (addr, _) = scope.pointer(*pointer)?;
                let dst = scope.value(*result)?;
                memory.copy(addr, dst.addr, dst.size)?;
            }
            Instruction::Store { pointer, object } => {
                let (addr, pointee) = scope.pointer(*pointer)?;
                let src = scope.value(*object)?;
                let size = self.types.size(pointee)?;
                if size != src.size {
                    return Err(GpuError::execution(format!(
                        "store of {} bytes through a pointer to {size} bytes",
                        src.size
                    )));
                }
                memory.copy(src.addr, addr, size)?;
            }
            Instruction::AccessChain {
                result,
                base,
                indices,
                ..
            } => {
                let (mut addr, mut ty) = scope.pointer(*base)?;
                for index in indices {
                    let index = self.index_value(*index, scope, memory)?;
                    let (offset, member) = self.types.element(ty, index)?;
                    addr += offset;
                    ty = member;
                }
                scope.bind(*result, Slot::Pointer { addr, pointee: ty })?;
            }
            Instruction::CompositeConstruct {
                result,
                constituents,
                ..
            } => {
                let dst = scope.value(*result)?;
                let mut at = dst.addr;
                for c in constituents {
                    let src = scope.value(*c)?;
                    if at + src.size > dst.addr + dst.size {
                        return Err(GpuError::execution(format!(
                            "constituents of %{result} overflow its {} bytes",
                            dst.size
                        )));
                    }
                    memory.copy(src.addr, at, src.size)?;
                    at += src.size;
                }
                if at != dst.addr + dst.size {
                    return Err(GpuError::execution(format!(
                        "constituents of %{result} fill {} of {} bytes",
                        at - dst.addr,
                        dst.size
                    )));
                }
            }
            Instruction::CompositeExtract {
                result,
                composite,
                indices,
                ..
            } => {
                let src = scope.value(*composite)?;
                let mut addr = src.addr;
                let mut ty = src.ty;
                for index in indices {
                    let (offset, member) = self.types.element(ty, *index)?;
                    addr += offset;
                    ty = member;
                }
                let dst = scope.value(*result)?;
                memory.copy(addr, dst.addr, dst.size)?;
            }
            Instruction::VectorShuffle {
                result,
                vector_a,
                vector_b,
                components,
                ..
            } => {
                let a = scope.value(*vector_a)?;
                let b = scope.value(*vector_b)?;
                let dst = scope.value(*result)?;
                let lane = self
                    .runtime(a.ty)?
                    .scalar()
                    .ok_or_else(|| GpuError::execution("VectorShuffle operand is not a vector"))?
                    .bytes;
                let len_a = (a.size / lane) as u32;
                let len_b = (b.size / lane) as u32;
                let mut lanes: SmallVec<[u8; 32]> = SmallVec::with_capacity(dst.size);
                for &c in components {
                    if c == UNDEFINED_LANE {
                        lanes.extend(std::iter::repeat_n(0u8, lane));
                    } else if c < len_a {
                        let at = a.addr + c as usize * lane;
                        lanes.extend_from_slice(memory.slice(at, lane)?);
                    } else if c < len_a + len_b {
                        let at = b.addr + (c - len_a) as usize * lane;
                        lanes.extend_from_slice(memory.slice(at, lane)?);
                    } else {
                        return Err(GpuError::execution(format!(
                            "VectorShuffle lane {c} is out of range for {len_a}+{len_b} lanes"
                        )));
                    }
                }
                memory.write(dst.addr, &lanes)?;
            }
            Instruction::FNegate {
                result, operand, ..
            } => {
                let src = scope.value(*operand)?;
                let dst = scope.value(*result)?;
                let ty = self.runtime(dst.ty)?;
                let mut values = ty.read_components(memory.slice(src.addr, src.size)?)?;
                values.iter_mut().for_each(|v| *v = -*v);
                ty.write_components(memory.slice_mut(dst.addr, dst.size)?, &values)?;
            }
            Instruction::Float {
                op,
                result,
                lhs,
                rhs,
                ..
            } => {
                let dst = scope.value(*result)?;
                let ty = self.runtime(dst.ty)?;
                let a = self.components(*lhs, scope, memory)?;
                let b = self.components(*rhs, scope, memory)?;
                if a.len() != b.len() {
                    return Err(GpuError::execution(format!(
                        "{op:?} operands have {} and {} components",
                        a.len(),
                        b.len()
                    )));
                }
                let values: SmallVec<[f64; 16]> =
                    a.iter().zip(&b).map(|(x, y)| op.apply(*x, *y)).collect();
                ty.write_components(memory.slice_mut(dst.addr, dst.size)?, &values)?;
            }
            Instruction::VectorTimesScalar {
                result,
                vector,
                scalar,
                ..
            } => {
                let dst = scope.value(*result)?;
                let ty = self.runtime(dst.ty)?;
                let v = self.components(*vector, scope, memory)?;
                let s = self.components(*scalar, scope, memory)?;
                let s = s.first().copied().unwrap_or_default();
                let values: SmallVec<[f64; 16]> =
                    v.iter().map(|x| FloatOp::Mul.apply(*x, s)).collect();
                ty.write_components(memory.slice_mut(dst.addr, dst.size)?, &values)?;
            }
            Instruction::MatrixTimesVector {
                result,
                matrix,
                vector,
                ..
            } => {
                let m = scope.value(*matrix)?;
                let v = scope.value(*vector)?;
                let dst = scope.value(*result)?;
                let m_bytes: SmallVec<[u8; 64]> = memory.slice(m.addr, m.size)?.into();
                let v_bytes: SmallVec<[u8; 16]> = memory.slice(v.addr, v.size)?.into();
                self.runtime(m.ty)?.matrix_times_vector(
                    &m_bytes,
                    &v_bytes,
                    memory.slice_mut(dst.addr, dst.size)?,
                )?;
            }
            Instruction::MatrixTimesMatrix {
                result, lhs, rhs, ..
            } => {
                let a = scope.value(*lhs)?;
                let b = scope.value(*rhs)?;
                let dst = scope.value(*result)?;
                let a_bytes: SmallVec<[u8; 64]> = memory.slice(a.addr, a.size)?.into();
                let b_bytes: SmallVec<[u8; 64]> = memory.slice(b.addr, b.size)?.into();
                self.runtime(a.ty)?.matrix_times_matrix(
                    self.runtime(b.ty)?,
                    &a_bytes,
                    &b_bytes,
                    memory.slice_mut(dst.addr, dst.size)?,
                )?;
            }
            Instruction::ImageSample {
                result,
                sampled_image,
                coordinate,
                ..
            } => {
                let handle = scope.value(*sampled_image)?;
                let set = memory.read_u32(handle.addr)?;
                let binding = memory.read_u32(handle.addr + 4)?;
                let coord = self.components(*coordinate, scope, memory)?;
                let uv = [
                    coord.first().copied().unwrap_or_default() as f32,
                    coord.get(1).copied().unwrap_or_default() as f32,
                ];
                let texel = self.textures.sample(set, binding, uv)?;
                let dst = scope.value(*result)?;
                let ty = self.runtime(dst.ty)?;
                let values: SmallVec<[f64; 4]> = texel
                    .0
                    .iter()
                    .take(ty.component_count())
                    .map(|c| f64::from(*c))
                    .collect();
                ty.write_components(memory.slice_mut(dst.addr, dst.size)?, &values)?;
            }
            Instruction::Return => scope.pc = usize::MAX,
        }
        Ok(())
    }

    fn components(
        &self,
        id: Id,
        scope: &Scope,
        memory: &ShaderMemory,
    ) -> GpuResult<SmallVec<[f64; 16]>> {
        let info = scope.value(id)?;
        self.runtime(info.ty)?
            .read_components(memory.slice(info.addr, info.size)?)
    }

    /// Integer value of an access-chain index operand.
    fn index_value(&self, id: Id, scope: &Scope, memory: &ShaderMemory) -> GpuResult<u32> {
        let v = self
            .components(id, scope, memory)?
            .first()
            .copied()
            .ok_or_else(|| GpuError::execution(format!("index %{id} is not a scalar")))?;
        if v < 0.0 || v > f64::from(u32::MAX) {
            return Err(GpuError::execution(format!("index %{id} = {v} is out of range")));
        }
        Ok(v as u32)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/exec.rs"]
mod tests;
