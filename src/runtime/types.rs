//! Runtime type descriptors.
//!
//! Every declared [`Type`] maps 1:1 onto a [`RuntimeType`] that knows its byte size, how to find
//! a member inside itself, how to turn raw arena bytes into numbers, and how to blend three
//! instances of itself with barycentric weights. Layout is natural: members are packed back to
//! back with no padding or alignment.

use crate::bytecode::module::{Id, Program, Type};
use crate::foundation::error::{GpuError, GpuResult};
use crate::runtime::memory::ShaderMemory;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Byte size of an image or sampled-image handle: `[set: u32, binding: u32]`.
pub const HANDLE_BYTES: usize = 8;

/// Numeric interpretation of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    SInt,
    UInt,
    Bool,
}

/// A scalar with its byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub bytes: usize,
}

impl Scalar {
    pub const F32: Self = Self {
        kind: ScalarKind::Float,
        bytes: 4,
    };
    pub const U32: Self = Self {
        kind: ScalarKind::UInt,
        bytes: 4,
    };
    pub const BOOL: Self = Self {
        kind: ScalarKind::Bool,
        bytes: 4,
    };

    /// Read one little-endian scalar from the start of `src`, widened to `f64`.
    pub fn read(self, src: &[u8]) -> f64 {
        match (self.kind, self.bytes) {
            (ScalarKind::Float, 8) => f64::from_le_bytes(le(src)),
            (ScalarKind::Float, _) => f64::from(f32::from_le_bytes(le(src))),
            (ScalarKind::SInt, 1) => f64::from(src[0] as i8),
            (ScalarKind::SInt, 2) => f64::from(i16::from_le_bytes(le(src))),
            (ScalarKind::SInt, 4) => f64::from(i32::from_le_bytes(le(src))),
            (ScalarKind::SInt, _) => i64::from_le_bytes(le(src)) as f64,
            (ScalarKind::UInt, 1) => f64::from(src[0]),
            (ScalarKind::UInt, 2) => f64::from(u16::from_le_bytes(le(src))),
            (ScalarKind::UInt, 4) => f64::from(u32::from_le_bytes(le(src))),
            (ScalarKind::UInt, _) => u64::from_le_bytes(le(src)) as f64,
            (ScalarKind::Bool, _) => {
                if u32::from_le_bytes(le(src)) != 0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// Write `v` narrowed to this scalar. Integers round to nearest and saturate.
    pub fn write(self, dst: &mut [u8], v: f64) {
        let n = self.bytes;
        match self.kind {
            ScalarKind::Float if n == 8 => dst[..8].copy_from_slice(&v.to_le_bytes()),
            ScalarKind::Float => dst[..4].copy_from_slice(&(v as f32).to_le_bytes()),
            ScalarKind::SInt => {
                let v = v.round() as i64;
                let v = match n {
                    1 => i64::from(v.clamp(i8::MIN.into(), i8::MAX.into()) as i8),
                    2 => i64::from(v.clamp(i16::MIN.into(), i16::MAX.into()) as i16),
                    4 => i64::from(v.clamp(i32::MIN.into(), i32::MAX.into()) as i32),
                    _ => v,
                };
                dst[..n].copy_from_slice(&v.to_le_bytes()[..n]);
            }
            ScalarKind::UInt => {
                let max = if n >= 8 {
                    u64::MAX
                } else {
                    (1u64 << (n * 8)) - 1
                };
                let v = (v.round() as u64).min(max);
                dst[..n].copy_from_slice(&v.to_le_bytes()[..n]);
            }
            ScalarKind::Bool => dst[..4].copy_from_slice(&u32::from(v != 0.0).to_le_bytes()),
        }
    }
}

fn le<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&src[..N]);
    out
}

/// Runtime descriptor derived from a declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeType {
    Void,
    Scalar(Scalar),
    Vector {
        elem: Scalar,
        count: u32,
    },
    /// Column-major: `cols` columns of `rows` components each.
    Matrix {
        elem: Scalar,
        rows: u32,
        cols: u32,
    },
    Array {
        elem: Box<RuntimeType>,
        count: u32,
    },
    Struct {
        fields: Vec<RuntimeType>,
    },
    /// Pointers are resolved through the invocation scope and occupy no arena bytes.
    Pointer {
        pointee: Box<RuntimeType>,
    },
    Image,
    SampledImage,
}

/// Boxed copy of a value read out of the arena, for debugging and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Float(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
    /// Vector lanes, matrix columns, array elements or struct fields.
    Composite(Vec<Value>),
    Handle { set: u32, binding: u32 },
    Pointer,
}

impl Value {
    /// All numeric leaves in layout order.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<f64>) {
        match self {
            Self::Float(v) => out.push(*v),
            Self::Int(v) => out.push(*v as f64),
            Self::UInt(v) => out.push(*v as f64),
            Self::Bool(b) => out.push(f64::from(u8::from(*b))),
            Self::Composite(items) => items.iter().for_each(|v| v.flatten_into(out)),
            Self::Void | Self::Handle { .. } | Self::Pointer => {}
        }
    }
}

impl RuntimeType {
    pub fn size(&self) -> usize {
        match self {
            Self::Void | Self::Pointer { .. } => 0,
            Self::Scalar(s) => s.bytes,
            Self::Vector { elem, count } => elem.bytes * *count as usize,
            Self::Matrix { elem, rows, cols } => elem.bytes * (*rows as usize) * (*cols as usize),
            Self::Array { elem, count } => elem.size() * *count as usize,
            Self::Struct { fields } => fields.iter().map(RuntimeType::size).sum(),
            Self::Image | Self::SampledImage => HANDLE_BYTES,
        }
    }

    /// A vector of `count` instances of this scalar.
    pub fn vectorize(&self, count: u32) -> GpuResult<Self> {
        match self {
            Self::Scalar(elem) if (2..=4).contains(&count) => Ok(Self::Vector {
                elem: *elem,
                count,
            }),
            other => Err(GpuError::execution(format!(
                "cannot vectorize {other:?} into {count} lanes"
            ))),
        }
    }

    /// A `rows x cols` matrix of this scalar.
    pub fn matrixize(&self, rows: u32, cols: u32) -> GpuResult<Self> {
        match self {
            Self::Scalar(elem @ Scalar {
                kind: ScalarKind::Float,
                ..
            }) if (2..=4).contains(&rows) && (2..=4).contains(&cols) => Ok(Self::Matrix {
                elem: *elem,
                rows,
                cols,
            }),
            other => Err(GpuError::execution(format!(
                "cannot build a {rows}x{cols} matrix of {other:?}"
            ))),
        }
    }

    /// Byte offset of member, lane, column or element `index`.
    pub fn member_offset(&self, index: u32) -> Option<usize> {
        let i = index as usize;
        match self {
            Self::Vector { elem, count } if index < *count => Some(i * elem.bytes),
            Self::Matrix { elem, rows, cols } if index < *cols => {
                Some(i * *rows as usize * elem.bytes)
            }
            Self::Array { elem, count } if index < *count => Some(i * elem.size()),
            Self::Struct { fields } if i < fields.len() => {
                Some(fields[..i].iter().map(RuntimeType::size).sum())
            }
            _ => None,
        }
    }

    /// Type of member, lane, column or element `index`.
    pub fn member_type(&self, index: u32) -> Option<Self> {
        match self {
            Self::Vector { elem, count } if index < *count => Some(Self::Scalar(*elem)),
            Self::Matrix { elem, rows, cols } if index < *cols => Some(Self::Vector {
                elem: *elem,
                count: *rows,
            }),
            Self::Array { elem, count } if index < *count => Some((**elem).clone()),
            Self::Struct { fields } => fields.get(index as usize).cloned(),
            _ => None,
        }
    }

    /// Component scalar of a scalar, vector or matrix.
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            Self::Scalar(s) | Self::Vector { elem: s, .. } | Self::Matrix { elem: s, .. } => {
                Some(*s)
            }
            _ => None,
        }
    }

    /// Number of scalar components of a scalar, vector or matrix.
    pub fn component_count(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector { count, .. } => *count as usize,
            Self::Matrix { rows, cols, .. } => (*rows as usize) * (*cols as usize),
            _ => 0,
        }
    }

    /// Whether this type may cross the vertex-to-fragment interface.
    pub fn is_interpolatable(&self) -> bool {
        match self {
            Self::Scalar(_) | Self::Vector { .. } | Self::Matrix { .. } => true,
            Self::Array { elem, .. } => elem.is_interpolatable(),
            Self::Struct { fields } => fields.iter().all(RuntimeType::is_interpolatable),
            Self::Void | Self::Pointer { .. } | Self::Image | Self::SampledImage => false,
        }
    }

    /// Components of a numeric value, widened to `f64`.
    pub fn read_components(&self, src: &[u8]) -> GpuResult<SmallVec<[f64; 16]>> {
        let scalar = self.numeric_scalar()?;
        Ok((0..self.component_count())
            .map(|i| scalar.read(&src[i * scalar.bytes..]))
            .collect())
    }

    /// Store `values` into a numeric value, narrowing each component.
    pub fn write_components(&self, dst: &mut [u8], values: &[f64]) -> GpuResult<()> {
        let scalar = self.numeric_scalar()?;
        if values.len() != self.component_count() {
            return Err(GpuError::execution(format!(
                "{} components written to {self:?}",
                values.len()
            )));
        }
        for (i, v) in values.iter().enumerate() {
            scalar.write(&mut dst[i * scalar.bytes..], *v);
        }
        Ok(())
    }

    fn numeric_scalar(&self) -> GpuResult<Scalar> {
        self.scalar()
            .ok_or_else(|| GpuError::execution(format!("{self:?} is not a numeric type")))
    }

    /// `out = self * v` where `self` is the matrix type.
    pub fn matrix_times_vector(&self, m: &[u8], v: &[u8], out: &mut [u8]) -> GpuResult<()> {
        let Self::Matrix { elem, rows, cols } = *self else {
            return Err(GpuError::execution(format!("{self:?} is not a matrix")));
        };
        let (rows, cols) = (rows as usize, cols as usize);
        let mut result: SmallVec<[f64; 4]> = SmallVec::from_elem(0.0, rows);
        for c in 0..cols {
            let vc = elem.read(&v[c * elem.bytes..]);
            for (r, acc) in result.iter_mut().enumerate() {
                *acc += elem.read(&m[(c * rows + r) * elem.bytes..]) * vc;
            }
        }
        for (r, value) in result.iter().enumerate() {
            elem.write(&mut out[r * elem.bytes..], *value);
        }
        Ok(())
    }

    /// `out = self * rhs` for two matrix types with matching inner dimension.
    pub fn matrix_times_matrix(
        &self,
        rhs: &RuntimeType,
        a: &[u8],
        b: &[u8],
        out: &mut [u8],
    ) -> GpuResult<()> {
        let (
            Self::Matrix {
                elem,
                rows,
                cols: inner,
            },
            Self::Matrix {
                rows: rhs_rows,
                cols,
                ..
            },
        ) = (self, rhs)
        else {
            return Err(GpuError::execution(format!(
                "{self:?} * {rhs:?} is not a matrix product"
            )));
        };
        if inner != rhs_rows {
            return Err(GpuError::execution(format!(
                "matrix product dimension mismatch: {inner} columns * {rhs_rows} rows"
            )));
        }
        let (rows, inner, cols) = (*rows as usize, *inner as usize, *cols as usize);
        let n = elem.bytes;
        for c in 0..cols {
            for r in 0..rows {
                let sum: f64 = (0..inner)
                    .map(|k| elem.read(&a[(k * rows + r) * n..]) * elem.read(&b[(c * inner + k) * n..]))
                    .sum();
                elem.write(&mut out[(c * rows + r) * n..], sum);
            }
        }
        Ok(())
    }

    /// Blend three instances of this type into `out` as `a*wA + b*wB + c*wC`.
    ///
    /// A weight of exactly one copies that corner's bytes, so values at a corner are bit-exact.
    pub fn interpolate_bytes(
        &self,
        weights: [f32; 3],
        corners: [&[u8]; 3],
        out: &mut [u8],
    ) -> GpuResult<()> {
        let size = self.size();
        if let Some(k) = weights.iter().position(|w| *w == 1.0) {
            out[..size].copy_from_slice(&corners[k][..size]);
            return Ok(());
        }
        match self {
            Self::Scalar(_) | Self::Vector { .. } | Self::Matrix { .. } => {
                let Some(scalar) = self.scalar() else {
                    return Ok(());
                };
                let [wa, wb, wc] = weights.map(f64::from);
                for i in 0..self.component_count() {
                    let at = i * scalar.bytes;
                    let v = scalar.read(&corners[0][at..]) * wa
                        + scalar.read(&corners[1][at..]) * wb
                        + scalar.read(&corners[2][at..]) * wc;
                    scalar.write(&mut out[at..], v);
                }
                Ok(())
            }
            Self::Array { .. } | Self::Struct { .. } => {
                let mut index = 0;
                while let (Some(offset), Some(member)) =
                    (self.member_offset(index), self.member_type(index))
                {
                    let end = offset + member.size();
                    member.interpolate_bytes(
                        weights,
                        corners.map(|c| &c[offset..end]),
                        &mut out[offset..end],
                    )?;
                    index += 1;
                }
                Ok(())
            }
            other => Err(GpuError::execution(format!(
                "{other:?} cannot be interpolated"
            ))),
        }
    }

    /// Interpolate the three corner values stored at `corners` into `out`, all inside `memory`.
    pub fn interpolate(
        &self,
        weights: [f32; 3],
        corners: [usize; 3],
        out: usize,
        memory: &mut ShaderMemory,
    ) -> GpuResult<()> {
        let size = self.size();
        let mut staged: SmallVec<[u8; 256]> = SmallVec::with_capacity(size * 3);
        for addr in corners {
            staged.extend_from_slice(memory.slice(addr, size)?);
        }
        let (a, rest) = staged.split_at(size);
        let (b, c) = rest.split_at(size);
        self.interpolate_bytes(weights, [a, b, c], memory.slice_mut(out, size)?)
    }

    /// Box the value stored in `src`.
    pub fn read_value(&self, src: &[u8]) -> GpuResult<Value> {
        if src.len() < self.size() {
            return Err(GpuError::execution(format!(
                "{} bytes cannot hold {self:?}",
                src.len()
            )));
        }
        Ok(match self {
            Self::Void => Value::Void,
            Self::Pointer { .. } => Value::Pointer,
            Self::Scalar(s) => scalar_value(*s, src),
            Self::Image | Self::SampledImage => Value::Handle {
                set: u32::from_le_bytes(le(src)),
                binding: u32::from_le_bytes(le(&src[4..])),
            },
            composite => {
                let mut items = Vec::new();
                let mut index = 0;
                while let (Some(offset), Some(member)) =
                    (composite.member_offset(index), composite.member_type(index))
                {
                    items.push(member.read_value(&src[offset..])?);
                    index += 1;
                }
                Value::Composite(items)
            }
        })
    }
}

fn scalar_value(s: Scalar, src: &[u8]) -> Value {
    match s.kind {
        ScalarKind::Float => Value::Float(s.read(src)),
        ScalarKind::Bool => Value::Bool(s.read(src) != 0.0),
        ScalarKind::SInt => Value::Int(match s.bytes {
            8 => i64::from_le_bytes(le(src)),
            _ => s.read(src) as i64,
        }),
        ScalarKind::UInt => Value::UInt(match s.bytes {
            8 => u64::from_le_bytes(le(src)),
            _ => s.read(src) as u64,
        }),
    }
}

/// How to find the declared id of a member.
#[derive(Debug, Clone, PartialEq)]
enum Members {
    None,
    Repeated(Id),
    Fields(Vec<Id>),
}

/// Runtime descriptor plus the declared ids of its members.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLayout {
    pub runtime: RuntimeType,
    members: Members,
}

/// Runtime descriptors for every type declared by one program.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    layouts: HashMap<Id, TypeLayout>,
}

impl TypeTable {
    pub fn build(program: &Program) -> GpuResult<Self> {
        let mut table = Self::default();
        for (&id, ty) in &program.types {
            if !matches!(ty, Type::Function { .. }) {
                table.resolve(program, id)?;
            }
        }
        Ok(table)
    }

    fn resolve(&mut self, program: &Program, id: Id) -> GpuResult<RuntimeType> {
        if let Some(layout) = self.layouts.get(&id) {
            return Ok(layout.runtime.clone());
        }
        let (runtime, members) = match program.ty(id)? {
            Type::Void => (RuntimeType::Void, Members::None),
            Type::Bool => (RuntimeType::Scalar(Scalar::BOOL), Members::None),
            Type::Int { width, signed } => {
                let kind = if *signed {
                    ScalarKind::SInt
                } else {
                    ScalarKind::UInt
                };
                let bytes = *width as usize / 8;
                (RuntimeType::Scalar(Scalar { kind, bytes }), Members::None)
            }
            Type::Float { width } => (
                RuntimeType::Scalar(Scalar {
                    kind: ScalarKind::Float,
                    bytes: *width as usize / 8,
                }),
                Members::None,
            ),
            Type::Vector { elem, count } => (
                self.resolve(program, *elem)?.vectorize(*count)?,
                Members::Repeated(*elem),
            ),
            Type::Matrix { column, columns } => {
                let (elem, rows) = match self.resolve(program, *column)? {
                    RuntimeType::Vector { elem, count } => (elem, count),
                    other => {
                        return Err(GpuError::execution(format!(
                            "matrix column %{column} is {other:?}"
                        )));
                    }
                };
                (
                    RuntimeType::Scalar(elem).matrixize(rows, *columns)?,
                    Members::Repeated(*column),
                )
            }
            Type::Array { elem, length } => (
                RuntimeType::Array {
                    elem: Box::new(self.resolve(program, *elem)?),
                    count: *length,
                },
                Members::Repeated(*elem),
            ),
            Type::Struct { members } => {
                let fields = members
                    .iter()
                    .map(|m| self.resolve(program, *m))
                    .collect::<GpuResult<Vec<_>>>()?;
                (
                    RuntimeType::Struct { fields },
                    Members::Fields(members.clone()),
                )
            }
            Type::Pointer { pointee, .. } => (
                RuntimeType::Pointer {
                    pointee: Box::new(self.resolve(program, *pointee)?),
                },
                Members::None,
            ),
            Type::Image { .. } => (RuntimeType::Image, Members::None),
            Type::SampledImage { .. } => (RuntimeType::SampledImage, Members::None),
            Type::Function { .. } => {
                return Err(GpuError::execution(format!(
                    "function type %{id} has no runtime layout"
                )));
            }
        };
        self.layouts.insert(
            id,
            TypeLayout {
                runtime: runtime.clone(),
                members,
            },
        );
        Ok(runtime)
    }

    pub fn get(&self, id: Id) -> GpuResult<&TypeLayout> {
        self.layouts
            .get(&id)
            .ok_or_else(|| GpuError::execution(format!("no runtime layout for type %{id}")))
    }

    pub fn runtime(&self, id: Id) -> GpuResult<&RuntimeType> {
        Ok(&self.get(id)?.runtime)
    }

    pub fn size(&self, id: Id) -> GpuResult<usize> {
        Ok(self.get(id)?.runtime.size())
    }

    /// Byte offset and declared type id of member `index` of type `ty`.
    pub fn element(&self, ty: Id, index: u32) -> GpuResult<(usize, Id)> {
        let layout = self.get(ty)?;
        let member = match &layout.members {
            Members::Repeated(elem) => Some(*elem),
            Members::Fields(fields) => fields.get(index as usize).copied(),
            Members::None => None,
        };
        match (layout.runtime.member_offset(index), member) {
            (Some(offset), Some(member)) => Ok((offset, member)),
            _ => Err(GpuError::execution(format!(
                "index {index} is out of range for type %{ty}"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/runtime/types.rs"]
mod tests;
