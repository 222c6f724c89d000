use crate::bytecode::instr::{FloatOp, Instruction};
use crate::bytecode::module::{
    Constant, Decorations, Dim, EntryPoint, ExecutionModeDecl, ExecutionModel, Function, Id,
    Local, LocalKind, Program, StorageClass, Type, Variable,
};
use crate::bytecode::words::{HEADER_WORDS, InstructionIter, Operands, Word, words_from_bytes};
use crate::foundation::error::{GpuError, GpuResult};
use smallvec::SmallVec;
use spirv::Op;

/// Upper limit on the header's id bound; keeps the id table allocation sane for hostile input.
const MAX_ID_BOUND: u32 = 1 << 22;

/// Logical layout sections, in the order a module must present them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Empty,
    Capability,
    Extension,
    MemoryModel,
    EntryPoint,
    ExecutionMode,
    Source,
    Name,
    Annotation,
    Global,
    Function,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdKind {
    ExtImport,
    Type,
    Constant,
    Variable,
    Function,
    Label,
    Local,
}

const VALUE_KINDS: &[IdKind] = &[IdKind::Constant, IdKind::Variable, IdKind::Local];

/// Parse a little- or big-endian byte buffer into a [`Program`].
pub fn parse(bytes: &[u8]) -> GpuResult<Program> {
    let words = words_from_bytes(bytes)?;
    parse_words(&words)
}

/// Parse a host-endian word stream into a [`Program`].
pub fn parse_words(words: &[Word]) -> GpuResult<Program> {
    if words.len() < HEADER_WORDS {
        return Err(GpuError::malformed("module header is truncated"));
    }
    if words[0] != spirv::MAGIC_NUMBER {
        return Err(GpuError::malformed(format!(
            "bad magic number {:#010x}",
            words[0]
        )));
    }
    let version = words[1];
    let bound = words[3];
    if bound == 0 || bound > MAX_ID_BOUND {
        return Err(GpuError::malformed(format!("invalid id bound {bound}")));
    }

    let mut parser = Parser {
        program: Program {
            version: (((version >> 16) & 0xff) as u8, ((version >> 8) & 0xff) as u8),
            generator: words[2],
            bound,
            ..Program::default()
        },
        section: Section::Empty,
        kinds: vec![None; bound as usize],
        current: None,
    };
    for raw in InstructionIter::new(words, HEADER_WORDS) {
        let raw = raw?;
        let op = Op::from_u32(u32::from(raw.opcode))
            .ok_or_else(|| GpuError::unsupported_opcode(raw.opcode))?;
        let mut ops = Operands::new(op, raw.operands);
        parser.instruction(op, raw.opcode, &mut ops)?;
        ops.finish()?;
    }
    parser.finish()
}

struct Parser {
    program: Program,
    section: Section,
    kinds: Vec<Option<IdKind>>,
    current: Option<Function>,
}

impl Parser {
    fn enter(&mut self, section: Section, op: Op) -> GpuResult<()> {
        if section < self.section {
            return Err(GpuError::malformed(format!(
                "Op{op:?} appears after the {:?} section",
                self.section
            )));
        }
        self.section = section;
        Ok(())
    }

    fn define(&mut self, id: Id, kind: IdKind) -> GpuResult<()> {
        let slot = self
            .kinds
            .get_mut(id as usize)
            .filter(|_| id != 0)
            .ok_or_else(|| GpuError::malformed(format!("id %{id} is outside the id bound")))?;
        if let Some(prev) = slot {
            return Err(GpuError::malformed(format!(
                "id %{id} redefined (previously a {prev:?})"
            )));
        }
        *slot = Some(kind);
        Ok(())
    }

    fn require(&self, id: Id, allowed: &[IdKind]) -> GpuResult<()> {
        match self.kinds.get(id as usize).copied().flatten() {
            Some(kind) if allowed.contains(&kind) => Ok(()),
            Some(kind) => Err(GpuError::malformed(format!(
                "id %{id} is a {kind:?}, expected one of {allowed:?}"
            ))),
            None => Err(GpuError::malformed(format!(
                "id %{id} used before declaration"
            ))),
        }
    }

    fn ty(&self, id: Id) -> GpuResult<&Type> {
        self.require(id, &[IdKind::Type])?;
        self.program.ty(id)
    }

    fn add_type(&mut self, id: Id, ty: Type) -> GpuResult<()> {
        self.define(id, IdKind::Type)?;
        self.program.types.insert(id, ty);
        Ok(())
    }

    fn instruction(&mut self, op: Op, opcode: u16, ops: &mut Operands<'_>) -> GpuResult<()> {
        match op {
            Op::Capability => {
                self.enter(Section::Capability, op)?;
                let cap = ops.word()?;
                self.program.capabilities.push(cap);
            }
            Op::ExtInstImport => {
                self.enter(Section::Extension, op)?;
                let id = ops.id()?;
                let name = ops.string()?;
                self.define(id, IdKind::ExtImport)?;
                self.program.ext_imports.insert(id, name);
            }
            Op::MemoryModel => {
                self.enter(Section::MemoryModel, op)?;
                self.program.addressing_model = ops.word()?;
                self.program.memory_model = ops.word()?;
            }
            Op::EntryPoint => {
                self.enter(Section::EntryPoint, op)?;
                let raw_model = ops.word()?;
                let model = ExecutionModel::from_u32(raw_model).ok_or_else(|| {
                    GpuError::malformed(format!("unknown execution model {raw_model}"))
                })?;
                let function = ops.id()?;
                let name = ops.string()?;
                let interface = ops.rest().to_vec();
                self.program.entry_points.push(EntryPoint {
                    model,
                    function,
                    name,
                    interface,
                });
            }
            Op::ExecutionMode => {
                self.enter(Section::ExecutionMode, op)?;
                let entry = ops.id()?;
                let mode = ops.word()?;
                let operands = ops.rest().to_vec();
                self.program.execution_modes.push(ExecutionModeDecl {
                    entry,
                    mode,
                    operands,
                });
            }
            Op::Source => {
                self.enter(Section::Source, op)?;
                let language = ops.word()?;
                let version = ops.word()?;
                // Optional file id and inline source text.
                ops.rest();
                self.program.source_language = Some((language, version));
            }
            Op::SourceExtension => {
                self.enter(Section::Source, op)?;
                let ext = ops.string()?;
                self.program.source_extensions.push(ext);
            }
            Op::Name => {
                self.enter(Section::Name, op)?;
                let id = ops.id()?;
                let name = ops.string()?;
                self.program.names.insert(id, name);
            }
            Op::MemberName => {
                self.enter(Section::Name, op)?;
                let id = ops.id()?;
                let member = ops.word()?;
                let name = ops.string()?;
                self.program.member_names.insert((id, member), name);
            }
            Op::Decorate => {
                self.enter(Section::Annotation, op)?;
                let target = ops.id()?;
                let entry = self.program.decorations.entry(target).or_default();
                apply_decoration(entry, ops)?;
            }
            Op::MemberDecorate => {
                self.enter(Section::Annotation, op)?;
                let target = ops.id()?;
                let member = ops.word()?;
                let entry = self
                    .program
                    .member_decorations
                    .entry((target, member))
                    .or_default();
                apply_decoration(entry, ops)?;
            }

            Op::TypeVoid => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                self.add_type(id, Type::Void)?;
            }
            Op::TypeBool => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                self.add_type(id, Type::Bool)?;
            }
            Op::TypeInt => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let width = ops.word()?;
                let signed = match ops.word()? {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(GpuError::malformed(format!(
                            "OpTypeInt %{id}: invalid signedness {other}"
                        )));
                    }
                };
                if !matches!(width, 8 | 16 | 32 | 64) {
                    return Err(GpuError::malformed(format!(
                        "OpTypeInt %{id}: unsupported width {width}"
                    )));
                }
                self.add_type(id, Type::Int { width, signed })?;
            }
            Op::TypeFloat => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let width = ops.word()?;
                if !matches!(width, 32 | 64) {
                    return Err(GpuError::malformed(format!(
                        "OpTypeFloat %{id}: unsupported width {width}"
                    )));
                }
                self.add_type(id, Type::Float { width })?;
            }
            Op::TypeVector => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let elem = ops.id()?;
                let count = ops.word()?;
                if !self.ty(elem)?.is_scalar() {
                    return Err(GpuError::malformed(format!(
                        "OpTypeVector %{id}: component %{elem} is not a scalar"
                    )));
                }
                if !(2..=4).contains(&count) {
                    return Err(GpuError::malformed(format!(
                        "OpTypeVector %{id}: invalid component count {count}"
                    )));
                }
                self.add_type(id, Type::Vector { elem, count })?;
            }
            Op::TypeMatrix => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let column = ops.id()?;
                let columns = ops.word()?;
                let float_column = match self.ty(column)? {
                    Type::Vector { elem, .. } => {
                        matches!(self.program.ty(*elem)?, Type::Float { .. })
                    }
                    _ => false,
                };
                if !float_column || !(2..=4).contains(&columns) {
                    return Err(GpuError::malformed(format!(
                        "OpTypeMatrix %{id}: invalid column type %{column} x {columns}"
                    )));
                }
                self.add_type(id, Type::Matrix { column, columns })?;
            }
            Op::TypeImage => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let sampled = ops.id()?;
                let raw_dim = ops.word()?;
                // depth, arrayed, ms, sampled, format, optional access qualifier
                ops.rest();
                self.ty(sampled)?;
                let dim = Dim::from_u32(raw_dim)
                    .ok_or_else(|| GpuError::malformed(format!("unknown image dim {raw_dim}")))?;
                self.add_type(id, Type::Image { sampled, dim })?;
            }
            Op::TypeSampledImage => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let image = ops.id()?;
                if !matches!(self.ty(image)?, Type::Image { .. }) {
                    return Err(GpuError::malformed(format!(
                        "OpTypeSampledImage %{id}: %{image} is not an image type"
                    )));
                }
                self.add_type(id, Type::SampledImage { image })?;
            }
            Op::TypeArray => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let elem = ops.id()?;
                let length_id = ops.id()?;
                self.ty(elem)?;
                self.require(length_id, &[IdKind::Constant])?;
                let length = self
                    .program
                    .constants
                    .get(&length_id)
                    .and_then(Constant::as_u32)
                    .filter(|&n| n > 0)
                    .ok_or_else(|| {
                        GpuError::malformed(format!(
                            "OpTypeArray %{id}: length %{length_id} is not a positive literal"
                        ))
                    })?;
                self.add_type(id, Type::Array { elem, length })?;
            }
            Op::TypeStruct => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let members = ops.rest().to_vec();
                for &m in &members {
                    self.ty(m)?;
                }
                self.add_type(id, Type::Struct { members })?;
            }
            Op::TypePointer => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let raw_storage = ops.word()?;
                let pointee = ops.id()?;
                let storage = StorageClass::from_u32(raw_storage).ok_or_else(|| {
                    GpuError::malformed(format!("unknown storage class {raw_storage}"))
                })?;
                self.ty(pointee)?;
                self.add_type(id, Type::Pointer { storage, pointee })?;
            }
            Op::TypeFunction => {
                self.enter(Section::Global, op)?;
                let id = ops.id()?;
                let ret = ops.id()?;
                let params = ops.rest().to_vec();
                self.ty(ret)?;
                for &p in &params {
                    self.ty(p)?;
                }
                self.add_type(id, Type::Function { ret, params })?;
            }

            Op::Constant => {
                self.enter(Section::Global, op)?;
                let ty = ops.id()?;
                let id = ops.id()?;
                let words: SmallVec<[u32; 2]> = ops.rest().iter().copied().collect();
                let expected = match self.ty(ty)? {
                    Type::Int { width, .. } | Type::Float { width } => width.div_ceil(32),
                    other => {
                        return Err(GpuError::malformed(format!(
                            "OpConstant %{id}: type %{ty} is not numeric: {other:?}"
                        )));
                    }
                };
                if words.len() != expected as usize {
                    return Err(GpuError::malformed(format!(
                        "OpConstant %{id}: expected {expected} literal word(s), got {}",
                        words.len()
                    )));
                }
                self.define(id, IdKind::Constant)?;
                self.program
                    .constants
                    .insert(id, Constant::Literal { ty, words });
            }
            Op::ConstantComposite => {
                self.enter(Section::Global, op)?;
                let ty = ops.id()?;
                let id = ops.id()?;
                let constituents = ops.rest().to_vec();
                for &c in &constituents {
                    self.require(c, &[IdKind::Constant])?;
                }
                let expected = match self.ty(ty)? {
                    Type::Vector { count, .. } => *count as usize,
                    Type::Matrix { columns, .. } => *columns as usize,
                    Type::Array { length, .. } => *length as usize,
                    Type::Struct { members } => members.len(),
                    other => {
                        return Err(GpuError::malformed(format!(
                            "OpConstantComposite %{id}: type %{ty} is not a composite: {other:?}"
                        )));
                    }
                };
                if constituents.len() != expected {
                    return Err(GpuError::malformed(format!(
                        "OpConstantComposite %{id}: expected {expected} constituents, got {}",
                        constituents.len()
                    )));
                }
                self.define(id, IdKind::Constant)?;
                self.program
                    .constants
                    .insert(id, Constant::Composite { ty, constituents });
            }
            Op::Variable => {
                let ty = ops.id()?;
                let id = ops.id()?;
                let raw_storage = ops.word()?;
                let initializer = if ops.remaining() > 0 {
                    Some(ops.id()?)
                } else {
                    None
                };
                let storage = StorageClass::from_u32(raw_storage).ok_or_else(|| {
                    GpuError::malformed(format!("unknown storage class {raw_storage}"))
                })?;
                match self.ty(ty)? {
                    Type::Pointer { storage: s, .. } if *s == storage => {}
                    other => {
                        return Err(GpuError::malformed(format!(
                            "OpVariable %{id}: type %{ty} is not a {storage:?} pointer: {other:?}"
                        )));
                    }
                }
                if let Some(init) = initializer {
                    self.require(init, VALUE_KINDS)?;
                }
                if self.current.is_some() {
                    if storage != StorageClass::Function {
                        return Err(GpuError::malformed(format!(
                            "OpVariable %{id}: function-scope variable with {storage:?} storage"
                        )));
                    }
                    self.push(Instruction::Variable {
                        result_type: ty,
                        result: id,
                        initializer,
                    })?;
                } else {
                    self.enter(Section::Global, op)?;
                    if storage == StorageClass::Function {
                        return Err(GpuError::malformed(format!(
                            "OpVariable %{id}: Function storage at module scope"
                        )));
                    }
                    self.define(id, IdKind::Variable)?;
                    self.program.variables.insert(
                        id,
                        Variable {
                            ty,
                            storage,
                            initializer,
                        },
                    );
                }
            }

            Op::Function => {
                self.enter(Section::Function, op)?;
                if self.current.is_some() {
                    return Err(GpuError::malformed("nested OpFunction"));
                }
                let result_type = ops.id()?;
                let id = ops.id()?;
                let _control = ops.word()?;
                let function_type = ops.id()?;
                self.ty(result_type)?;
                if !matches!(self.ty(function_type)?, Type::Function { .. }) {
                    return Err(GpuError::malformed(format!(
                        "OpFunction %{id}: %{function_type} is not a function type"
                    )));
                }
                self.define(id, IdKind::Function)?;
                self.current = Some(Function {
                    id,
                    result_type,
                    function_type,
                    ..Function::default()
                });
            }
            Op::Label => {
                let id = ops.id()?;
                self.define(id, IdKind::Label)?;
                let f = self
                    .current
                    .as_mut()
                    .ok_or_else(|| GpuError::malformed("OpLabel outside of a function"))?;
                f.labels.insert(id, f.body.len());
            }
            Op::FunctionEnd => {
                let f = self
                    .current
                    .take()
                    .ok_or_else(|| GpuError::malformed("OpFunctionEnd without OpFunction"))?;
                self.program.functions.insert(f.id, f);
            }
            Op::Return => self.push(Instruction::Return)?,

            Op::Load => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let pointer = ops.id()?;
                // Optional memory access operands.
                ops.rest();
                self.push(Instruction::Load {
                    result_type,
                    result,
                    pointer,
                })?;
            }
            Op::Store => {
                let pointer = ops.id()?;
                let object = ops.id()?;
                ops.rest();
                self.push(Instruction::Store { pointer, object })?;
            }
            Op::AccessChain => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let base = ops.id()?;
                let indices = ops.rest().iter().copied().collect();
                self.push(Instruction::AccessChain {
                    result_type,
                    result,
                    base,
                    indices,
                })?;
            }
            Op::CompositeConstruct => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let constituents = ops.rest().iter().copied().collect();
                self.push(Instruction::CompositeConstruct {
                    result_type,
                    result,
                    constituents,
                })?;
            }
            Op::CompositeExtract => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let composite = ops.id()?;
                let indices = ops.rest().iter().copied().collect();
                self.push(Instruction::CompositeExtract {
                    result_type,
                    result,
                    composite,
                    indices,
                })?;
            }
            Op::VectorShuffle => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let vector_a = ops.id()?;
                let vector_b = ops.id()?;
                let components = ops.rest().iter().copied().collect();
                self.push(Instruction::VectorShuffle {
                    result_type,
                    result,
                    vector_a,
                    vector_b,
                    components,
                })?;
            }
            Op::FNegate => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let operand = ops.id()?;
                self.push(Instruction::FNegate {
                    result_type,
                    result,
                    operand,
                })?;
            }
            Op::FAdd => self.float(FloatOp::Add, ops)?,
            Op::FSub => self.float(FloatOp::Sub, ops)?,
            Op::FMul => self.float(FloatOp::Mul, ops)?,
            Op::FDiv => self.float(FloatOp::Div, ops)?,
            Op::VectorTimesScalar => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let vector = ops.id()?;
                let scalar = ops.id()?;
                self.push(Instruction::VectorTimesScalar {
                    result_type,
                    result,
                    vector,
                    scalar,
                })?;
            }
            Op::MatrixTimesVector => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let matrix = ops.id()?;
                let vector = ops.id()?;
                self.push(Instruction::MatrixTimesVector {
                    result_type,
                    result,
                    matrix,
                    vector,
                })?;
            }
            Op::MatrixTimesMatrix => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let lhs = ops.id()?;
                let rhs = ops.id()?;
                self.push(Instruction::MatrixTimesMatrix {
                    result_type,
                    result,
                    lhs,
                    rhs,
                })?;
            }
            Op::ImageSampleImplicitLod | Op::ImageSampleExplicitLod => {
                let result_type = ops.id()?;
                let result = ops.id()?;
                let sampled_image = ops.id()?;
                let coordinate = ops.id()?;
                // Image operands (bias, lod, ...) do not affect nearest sampling of level 0.
                ops.rest();
                self.push(Instruction::ImageSample {
                    result_type,
                    result,
                    sampled_image,
                    coordinate,
                })?;
            }

            _ => return Err(GpuError::unsupported_opcode(opcode)),
        }
        Ok(())
    }

    fn float(&mut self, op: FloatOp, ops: &mut Operands<'_>) -> GpuResult<()> {
        let result_type = ops.id()?;
        let result = ops.id()?;
        let lhs = ops.id()?;
        let rhs = ops.id()?;
        self.push(Instruction::Float {
            op,
            result_type,
            result,
            lhs,
            rhs,
        })
    }

    /// Append a body instruction to the open function, checking its ids.
    fn push(&mut self, inst: Instruction) -> GpuResult<()> {
        match &self.current {
            None => {
                return Err(GpuError::malformed(format!(
                    "{inst:?} outside of a function"
                )));
            }
            Some(f) if f.labels.is_empty() => {
                return Err(GpuError::malformed(format!(
                    "{inst:?} before the first OpLabel"
                )));
            }
            Some(_) => {}
        }
        for id in inst.operand_ids() {
            self.require(id, VALUE_KINDS)?;
        }
        if let Some((result_type, result)) = inst.result() {
            self.ty(result_type)?;
            self.define(result, IdKind::Local)?;
            let kind = match inst {
                Instruction::Variable { .. } => LocalKind::Variable,
                Instruction::AccessChain { .. } => LocalKind::Pointer,
                _ => LocalKind::Value,
            };
            if let Some(f) = self.current.as_mut() {
                f.locals.push(Local {
                    id: result,
                    ty: result_type,
                    kind,
                });
            }
        }
        if let Some(f) = self.current.as_mut() {
            f.body.push(inst);
        }
        Ok(())
    }

    fn finish(self) -> GpuResult<Program> {
        if self.current.is_some() {
            return Err(GpuError::malformed("missing OpFunctionEnd"));
        }
        let program = self.program;
        for ep in &program.entry_points {
            if !program.functions.contains_key(&ep.function) {
                return Err(GpuError::malformed(format!(
                    "entry point '{}' names undefined function %{}",
                    ep.name, ep.function
                )));
            }
            if let Some(bad) = ep
                .interface
                .iter()
                .find(|id| !program.variables.contains_key(id))
            {
                return Err(GpuError::malformed(format!(
                    "entry point '{}' interface id %{bad} is not a global variable",
                    ep.name
                )));
            }
        }
        let undecorated: Vec<Id> = program
            .decorations
            .keys()
            .copied()
            .filter(|id| {
                self.kinds
                    .get(*id as usize)
                    .copied()
                    .flatten()
                    .is_none()
            })
            .collect();
        if !undecorated.is_empty() {
            tracing::warn!(ids = ?undecorated, "decorations target undefined ids");
        }
        tracing::debug!(
            types = program.types.len(),
            constants = program.constants.len(),
            variables = program.variables.len(),
            functions = program.functions.len(),
            "parsed shader module"
        );
        Ok(program)
    }
}

fn apply_decoration(target: &mut Decorations, ops: &mut Operands<'_>) -> GpuResult<()> {
    use spirv::Decoration as D;

    let raw = ops.word()?;
    match spirv::Decoration::from_u32(raw) {
        Some(D::Location) => target.location = Some(ops.word()?),
        Some(D::Binding) => target.binding = Some(ops.word()?),
        Some(D::DescriptorSet) => target.set = Some(ops.word()?),
        Some(D::Offset) => target.offset = Some(ops.word()?),
        Some(D::Block) => target.block = true,
        Some(D::BuiltIn) => {
            let raw_builtin = ops.word()?;
            let builtin = spirv::BuiltIn::from_u32(raw_builtin).ok_or_else(|| {
                GpuError::malformed(format!("unknown builtin {raw_builtin}"))
            })?;
            target.builtin = Some(builtin);
        }
        _ => target.other.push((raw, ops.rest().to_vec())),
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/bytecode/parser.rs"]
mod tests;
