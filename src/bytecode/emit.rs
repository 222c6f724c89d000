//! Hand assembly of shader modules.
//!
//! [`ModuleBuilder`] writes the subset of the binary encoding that the parser accepts, keeping
//! each logical-layout section in its own buffer so callers may declare things in any order.

use crate::bytecode::module::{BuiltIn, Dim, ExecutionModel, Id, StorageClass};
use crate::bytecode::words::{Word, encode_string};
use spirv::{Decoration, Op};

/// Version word written into the header (1.0).
const VERSION_1_0: Word = 0x0001_0000;
/// Source language written by [`ModuleBuilder::source`] (GLSL).
const SOURCE_GLSL: Word = 2;

#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    next_id: Id,
    capabilities: Vec<Word>,
    ext_imports: Vec<Word>,
    memory_model: Vec<Word>,
    entry_points: Vec<Word>,
    execution_modes: Vec<Word>,
    debug: Vec<Word>,
    names: Vec<Word>,
    annotations: Vec<Word>,
    globals: Vec<Word>,
    functions: Vec<Word>,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(section: &mut Vec<Word>, op: Op, operands: &[Word]) {
    let word_count = (operands.len() + 1) as Word;
    section.push((word_count << 16) | op as Word);
    section.extend_from_slice(operands);
}

impl ModuleBuilder {
    /// A builder with `Capability Shader` and `MemoryModel Logical GLSL450` already emitted.
    pub fn new() -> Self {
        let mut b = Self {
            next_id: 1,
            capabilities: Vec::new(),
            ext_imports: Vec::new(),
            memory_model: Vec::new(),
            entry_points: Vec::new(),
            execution_modes: Vec::new(),
            debug: Vec::new(),
            names: Vec::new(),
            annotations: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        };
        b.capability(spirv::Capability::Shader);
        emit(
            &mut b.memory_model,
            Op::MemoryModel,
            &[
                spirv::AddressingModel::Logical as Word,
                spirv::MemoryModel::GLSL450 as Word,
            ],
        );
        b
    }

    /// Reserve a fresh result id.
    pub fn id(&mut self) -> Id {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn capability(&mut self, cap: spirv::Capability) {
        emit(&mut self.capabilities, Op::Capability, &[cap as Word]);
    }

    pub fn ext_inst_import(&mut self, name: &str) -> Id {
        let id = self.id();
        let mut ops = vec![id];
        ops.extend(encode_string(name));
        emit(&mut self.ext_imports, Op::ExtInstImport, &ops);
        id
    }

    pub fn entry_point(
        &mut self,
        model: ExecutionModel,
        function: Id,
        name: &str,
        interface: &[Id],
    ) {
        let mut ops = vec![model as Word, function];
        ops.extend(encode_string(name));
        ops.extend_from_slice(interface);
        emit(&mut self.entry_points, Op::EntryPoint, &ops);
    }

    pub fn execution_mode(&mut self, entry: Id, mode: spirv::ExecutionMode, operands: &[Word]) {
        let mut ops = vec![entry, mode as Word];
        ops.extend_from_slice(operands);
        emit(&mut self.execution_modes, Op::ExecutionMode, &ops);
    }

    pub fn source(&mut self, version: Word) {
        emit(&mut self.debug, Op::Source, &[SOURCE_GLSL, version]);
    }

    pub fn source_extension(&mut self, ext: &str) {
        emit(&mut self.debug, Op::SourceExtension, &encode_string(ext));
    }

    pub fn name(&mut self, target: Id, name: &str) {
        let mut ops = vec![target];
        ops.extend(encode_string(name));
        emit(&mut self.names, Op::Name, &ops);
    }

    pub fn member_name(&mut self, target: Id, member: u32, name: &str) {
        let mut ops = vec![target, member];
        ops.extend(encode_string(name));
        emit(&mut self.names, Op::MemberName, &ops);
    }

    pub fn decorate(&mut self, target: Id, decoration: Decoration, operands: &[Word]) {
        let mut ops = vec![target, decoration as Word];
        ops.extend_from_slice(operands);
        emit(&mut self.annotations, Op::Decorate, &ops);
    }

    pub fn member_decorate(
        &mut self,
        target: Id,
        member: u32,
        decoration: Decoration,
        operands: &[Word],
    ) {
        let mut ops = vec![target, member, decoration as Word];
        ops.extend_from_slice(operands);
        emit(&mut self.annotations, Op::MemberDecorate, &ops);
    }

    pub fn location(&mut self, target: Id, location: u32) {
        self.decorate(target, Decoration::Location, &[location]);
    }

    pub fn builtin(&mut self, target: Id, builtin: BuiltIn) {
        self.decorate(target, Decoration::BuiltIn, &[builtin as Word]);
    }

    /// Decorate a resource with its descriptor set and binding.
    pub fn set_binding(&mut self, target: Id, set: u32, binding: u32) {
        self.decorate(target, Decoration::DescriptorSet, &[set]);
        self.decorate(target, Decoration::Binding, &[binding]);
    }

    fn global(&mut self, op: Op, operands: &[Word]) {
        emit(&mut self.globals, op, operands);
    }

    fn type_with(&mut self, op: Op, operands: &[Word]) -> Id {
        let id = self.id();
        let mut ops = vec![id];
        ops.extend_from_slice(operands);
        self.global(op, &ops);
        id
    }

    pub fn type_void(&mut self) -> Id {
        self.type_with(Op::TypeVoid, &[])
    }

    pub fn type_bool(&mut self) -> Id {
        self.type_with(Op::TypeBool, &[])
    }

    pub fn type_int(&mut self, width: u32, signed: bool) -> Id {
        self.type_with(Op::TypeInt, &[width, Word::from(signed)])
    }

    pub fn type_float(&mut self, width: u32) -> Id {
        self.type_with(Op::TypeFloat, &[width])
    }

    pub fn type_vector(&mut self, elem: Id, count: u32) -> Id {
        self.type_with(Op::TypeVector, &[elem, count])
    }

    pub fn type_matrix(&mut self, column: Id, columns: u32) -> Id {
        self.type_with(Op::TypeMatrix, &[column, columns])
    }

    /// 2D sampled float image (`depth=0, arrayed=0, ms=0, sampled=1, format=Unknown`).
    pub fn type_image_2d(&mut self, sampled: Id) -> Id {
        self.type_with(Op::TypeImage, &[sampled, Dim::Dim2D as Word, 0, 0, 0, 1, 0])
    }

    pub fn type_sampled_image(&mut self, image: Id) -> Id {
        self.type_with(Op::TypeSampledImage, &[image])
    }

    /// Array type; `length` is the id of an integer constant.
    pub fn type_array(&mut self, elem: Id, length: Id) -> Id {
        self.type_with(Op::TypeArray, &[elem, length])
    }

    pub fn type_struct(&mut self, members: &[Id]) -> Id {
        self.type_with(Op::TypeStruct, members)
    }

    pub fn type_pointer(&mut self, storage: StorageClass, pointee: Id) -> Id {
        self.type_with(Op::TypePointer, &[storage as Word, pointee])
    }

    pub fn type_function(&mut self, ret: Id, params: &[Id]) -> Id {
        let mut ops = vec![ret];
        ops.extend_from_slice(params);
        self.type_with(Op::TypeFunction, &ops)
    }

    pub fn constant_u32(&mut self, ty: Id, value: u32) -> Id {
        let id = self.id();
        self.global(Op::Constant, &[ty, id, value]);
        id
    }

    pub fn constant_f32(&mut self, ty: Id, value: f32) -> Id {
        self.constant_u32(ty, value.to_bits())
    }

    pub fn constant_composite(&mut self, ty: Id, constituents: &[Id]) -> Id {
        let id = self.id();
        let mut ops = vec![ty, id];
        ops.extend_from_slice(constituents);
        self.global(Op::ConstantComposite, &ops);
        id
    }

    /// Module-scope variable; `pointer_ty` must be a pointer of the same storage class.
    pub fn variable(&mut self, pointer_ty: Id, storage: StorageClass) -> Id {
        let id = self.id();
        self.global(Op::Variable, &[pointer_ty, id, storage as Word]);
        id
    }

    /// Module-scope variable initialised from constant `init`.
    pub fn variable_with_initializer(
        &mut self,
        pointer_ty: Id,
        storage: StorageClass,
        init: Id,
    ) -> Id {
        let id = self.id();
        self.global(Op::Variable, &[pointer_ty, id, storage as Word, init]);
        id
    }

    /// Open a function and its single block. Returns the function id.
    pub fn begin_function(&mut self, result_ty: Id, function_ty: Id) -> Id {
        let id = self.id();
        let label = self.id();
        emit(
            &mut self.functions,
            Op::Function,
            &[result_ty, id, 0, function_ty],
        );
        emit(&mut self.functions, Op::Label, &[label]);
        id
    }

    fn body(&mut self, op: Op, operands: &[Word]) {
        emit(&mut self.functions, op, operands);
    }

    fn body_result(&mut self, op: Op, ty: Id, operands: &[Word]) -> Id {
        let id = self.id();
        let mut ops = vec![ty, id];
        ops.extend_from_slice(operands);
        self.body(op, &ops);
        id
    }

    /// Emit an arbitrary instruction into the function section.
    pub fn raw(&mut self, opcode: u16, operands: &[Word]) {
        let word_count = (operands.len() + 1) as Word;
        self.functions.push((word_count << 16) | Word::from(opcode));
        self.functions.extend_from_slice(operands);
    }

    pub fn local_variable(&mut self, pointer_ty: Id) -> Id {
        self.body_result(
            Op::Variable,
            pointer_ty,
            &[StorageClass::Function as Word],
        )
    }

    pub fn load(&mut self, ty: Id, pointer: Id) -> Id {
        self.body_result(Op::Load, ty, &[pointer])
    }

    pub fn store(&mut self, pointer: Id, object: Id) {
        self.body(Op::Store, &[pointer, object]);
    }

    pub fn access_chain(&mut self, pointer_ty: Id, base: Id, indices: &[Id]) -> Id {
        let mut ops = vec![base];
        ops.extend_from_slice(indices);
        self.body_result(Op::AccessChain, pointer_ty, &ops)
    }

    pub fn composite_construct(&mut self, ty: Id, constituents: &[Id]) -> Id {
        self.body_result(Op::CompositeConstruct, ty, constituents)
    }

    pub fn composite_extract(&mut self, ty: Id, composite: Id, indices: &[u32]) -> Id {
        let mut ops = vec![composite];
        ops.extend_from_slice(indices);
        self.body_result(Op::CompositeExtract, ty, &ops)
    }

    pub fn vector_shuffle(&mut self, ty: Id, a: Id, b: Id, components: &[u32]) -> Id {
        let mut ops = vec![a, b];
        ops.extend_from_slice(components);
        self.body_result(Op::VectorShuffle, ty, &ops)
    }

    pub fn fnegate(&mut self, ty: Id, operand: Id) -> Id {
        self.body_result(Op::FNegate, ty, &[operand])
    }

    pub fn fadd(&mut self, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.body_result(Op::FAdd, ty, &[lhs, rhs])
    }

    pub fn fsub(&mut self, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.body_result(Op::FSub, ty, &[lhs, rhs])
    }

    pub fn fmul(&mut self, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.body_result(Op::FMul, ty, &[lhs, rhs])
    }

    pub fn fdiv(&mut self, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.body_result(Op::FDiv, ty, &[lhs, rhs])
    }

    pub fn vector_times_scalar(&mut self, ty: Id, vector: Id, scalar: Id) -> Id {
        self.body_result(Op::VectorTimesScalar, ty, &[vector, scalar])
    }

    pub fn matrix_times_vector(&mut self, ty: Id, matrix: Id, vector: Id) -> Id {
        self.body_result(Op::MatrixTimesVector, ty, &[matrix, vector])
    }

    pub fn matrix_times_matrix(&mut self, ty: Id, lhs: Id, rhs: Id) -> Id {
        self.body_result(Op::MatrixTimesMatrix, ty, &[lhs, rhs])
    }

    pub fn image_sample(&mut self, ty: Id, sampled_image: Id, coordinate: Id) -> Id {
        self.body_result(Op::ImageSampleImplicitLod, ty, &[sampled_image, coordinate])
    }

    pub fn ret(&mut self) {
        self.body(Op::Return, &[]);
    }

    pub fn end_function(&mut self) {
        self.body(Op::FunctionEnd, &[]);
    }

    /// Header plus all sections, in logical-layout order.
    pub fn words(&self) -> Vec<Word> {
        let mut out = vec![spirv::MAGIC_NUMBER, VERSION_1_0, 0, self.next_id, 0];
        for section in [
            &self.capabilities,
            &self.ext_imports,
            &self.memory_model,
            &self.entry_points,
            &self.execution_modes,
            &self.debug,
            &self.names,
            &self.annotations,
            &self.globals,
            &self.functions,
        ] {
            out.extend_from_slice(section);
        }
        out
    }

    /// Little-endian byte encoding of [`ModuleBuilder::words`].
    pub fn to_bytes(&self) -> Vec<u8> {
        self.words().iter().flat_map(|w| w.to_le_bytes()).collect()
    }
}
