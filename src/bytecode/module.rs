//! Program object graph: the parsed, id-indexed view of one shader module.
//!
//! Built once by [`crate::bytecode::parser::parse`] and immutable afterwards. Every id referenced
//! by an instruction lives in exactly one of the declaration tables.

use crate::bytecode::instr::Instruction;
use crate::foundation::error::{GpuError, GpuResult};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};

pub use spirv::{BuiltIn, Dim, ExecutionModel, StorageClass};

/// Numeric result id.
pub type Id = u32;

/// A declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Bool,
    Int { width: u32, signed: bool },
    Float { width: u32 },
    Vector { elem: Id, count: u32 },
    Matrix { column: Id, columns: u32 },
    Array { elem: Id, length: u32 },
    Struct { members: Vec<Id> },
    Pointer { storage: StorageClass, pointee: Id },
    Image { sampled: Id, dim: Dim },
    SampledImage { image: Id },
    Function { ret: Id, params: Vec<Id> },
}

impl Type {
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool | Self::Int { .. } | Self::Float { .. })
    }
}

/// Typed literal data.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Scalar literal; one word for 32-bit values, two (low first) for 64-bit.
    Literal {
        ty: Id,
        words: SmallVec<[u32; 2]>,
    },
    Composite {
        ty: Id,
        constituents: Vec<Id>,
    },
}

impl Constant {
    pub fn ty(&self) -> Id {
        match self {
            Self::Literal { ty, .. } | Self::Composite { ty, .. } => *ty,
        }
    }

    /// Low literal word, used for indices and array lengths.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::Literal { words, .. } => words.first().copied(),
            Self::Composite { .. } => None,
        }
    }
}

/// A module-scope variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Pointer type of the variable.
    pub ty: Id,
    pub storage: StorageClass,
    pub initializer: Option<Id>,
}

/// Decorations collected for one id (or one struct member).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decorations {
    pub location: Option<u32>,
    pub binding: Option<u32>,
    pub set: Option<u32>,
    pub builtin: Option<BuiltIn>,
    pub offset: Option<u32>,
    pub block: bool,
    /// Decorations without a dedicated field, as raw `(decoration, operands)`.
    pub other: Vec<(u32, Vec<u32>)>,
}

/// A value or variable declared inside a function body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Local {
    pub id: Id,
    /// Result type id. For [`LocalKind::Variable`] this is the pointer type.
    pub ty: Id,
    pub kind: LocalKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    /// Intermediate value stored in its own slot.
    Value,
    /// `Function`-storage variable; the slot holds the pointee.
    Variable,
    /// Pointer produced by an access chain; needs no storage.
    Pointer,
}

#[derive(Debug, Clone, Default)]
pub struct Function {
    pub id: Id,
    pub result_type: Id,
    pub function_type: Id,
    pub body: Vec<Instruction>,
    /// Label id -> offset of the first instruction after it.
    pub labels: HashMap<Id, usize>,
    pub locals: Vec<Local>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    pub model: ExecutionModel,
    pub function: Id,
    pub name: String,
    pub interface: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionModeDecl {
    pub entry: Id,
    pub mode: u32,
    pub operands: Vec<u32>,
}

/// One parsed shader module.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// `(major, minor)` from the header version word.
    pub version: (u8, u8),
    pub generator: u32,
    pub bound: u32,
    pub capabilities: Vec<u32>,
    pub ext_imports: BTreeMap<Id, String>,
    pub addressing_model: u32,
    pub memory_model: u32,
    pub entry_points: Vec<EntryPoint>,
    pub execution_modes: Vec<ExecutionModeDecl>,
    pub source_language: Option<(u32, u32)>,
    pub source_extensions: Vec<String>,
    pub names: HashMap<Id, String>,
    pub member_names: HashMap<(Id, u32), String>,
    pub decorations: HashMap<Id, Decorations>,
    pub member_decorations: HashMap<(Id, u32), Decorations>,
    pub types: BTreeMap<Id, Type>,
    pub constants: BTreeMap<Id, Constant>,
    pub variables: BTreeMap<Id, Variable>,
    pub functions: BTreeMap<Id, Function>,
}

static NO_DECORATIONS: Decorations = Decorations {
    location: None,
    binding: None,
    set: None,
    builtin: None,
    offset: None,
    block: false,
    other: Vec::new(),
};

impl Program {
    pub fn ty(&self, id: Id) -> GpuResult<&Type> {
        self.types
            .get(&id)
            .ok_or_else(|| GpuError::execution(format!("id %{id} is not a type")))
    }

    pub fn function(&self, id: Id) -> GpuResult<&Function> {
        self.functions
            .get(&id)
            .ok_or_else(|| GpuError::execution(format!("id %{id} is not a function")))
    }

    /// Storage class and pointee of a pointer type.
    pub fn pointee(&self, pointer_ty: Id) -> GpuResult<(StorageClass, Id)> {
        match self.ty(pointer_ty)? {
            Type::Pointer { storage, pointee } => Ok((*storage, *pointee)),
            other => Err(GpuError::execution(format!(
                "type %{pointer_ty} is not a pointer: {other:?}"
            ))),
        }
    }

    pub fn decorations(&self, id: Id) -> &Decorations {
        self.decorations.get(&id).unwrap_or(&NO_DECORATIONS)
    }

    pub fn member_decorations(&self, id: Id, member: u32) -> &Decorations {
        self.member_decorations
            .get(&(id, member))
            .unwrap_or(&NO_DECORATIONS)
    }

    pub fn name(&self, id: Id) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn entry_point(&self, model: ExecutionModel) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|ep| ep.model == model)
    }

    /// Global variables of one storage class, in id order.
    pub fn variables_in(&self, storage: StorageClass) -> impl Iterator<Item = (Id, &Variable)> {
        self.variables
            .iter()
            .filter(move |(_, v)| v.storage == storage)
            .map(|(id, v)| (*id, v))
    }
}
