//! Ready-made shader modules for the `demo` command and the smoke tests.
//!
//! Vertex presets read `location 0: vec4 position` and `location 1: vec2 uv` and forward the uv as
//! `location 0`. Fragment presets write `location 0: vec4 color`.

use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::module::{BuiltIn, ExecutionModel, Id, StorageClass};
use spirv::Decoration;

/// Types every preset needs, declared up front.
struct Common {
    void: Id,
    fn_void: Id,
    float: Id,
    int: Id,
    vec2: Id,
    vec4: Id,
}

fn common(b: &mut ModuleBuilder) -> Common {
    b.ext_inst_import("GLSL.std.450");
    b.source(450);
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let int = b.type_int(32, true);
    let vec2 = b.type_vector(float, 2);
    let vec4 = b.type_vector(float, 4);
    Common {
        void,
        fn_void,
        float,
        int,
        vec2,
        vec4,
    }
}

/// `gl_PerVertex { vec4 Position; float PointSize; }` output block; returns the variable.
fn per_vertex_block(b: &mut ModuleBuilder, c: &Common) -> (Id, Id) {
    let block = b.type_struct(&[c.vec4, c.float]);
    b.name(block, "gl_PerVertex");
    b.member_name(block, 0, "gl_Position");
    b.member_name(block, 1, "gl_PointSize");
    b.member_decorate(
        block,
        0,
        Decoration::BuiltIn,
        &[BuiltIn::Position as u32],
    );
    b.member_decorate(
        block,
        1,
        Decoration::BuiltIn,
        &[BuiltIn::PointSize as u32],
    );
    b.decorate(block, Decoration::Block, &[]);
    let ptr_block = b.type_pointer(StorageClass::Output, block);
    let var = b.variable(ptr_block, StorageClass::Output);
    let ptr_position = b.type_pointer(StorageClass::Output, c.vec4);
    (var, ptr_position)
}

/// Vertex stage: `gl_Position = position; v_uv = uv;`
pub fn passthrough_vertex() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let c = common(&mut b);
    let zero = b.constant_u32(c.int, 0);

    let ptr_in_v4 = b.type_pointer(StorageClass::Input, c.vec4);
    let ptr_in_v2 = b.type_pointer(StorageClass::Input, c.vec2);
    let ptr_out_v2 = b.type_pointer(StorageClass::Output, c.vec2);
    let (per_vertex, ptr_position) = per_vertex_block(&mut b, &c);
    let in_position = b.variable(ptr_in_v4, StorageClass::Input);
    let in_uv = b.variable(ptr_in_v2, StorageClass::Input);
    let out_uv = b.variable(ptr_out_v2, StorageClass::Output);
    b.name(in_position, "a_position");
    b.name(in_uv, "a_uv");
    b.name(out_uv, "v_uv");
    b.location(in_position, 0);
    b.location(in_uv, 1);
    b.location(out_uv, 0);

    let main = b.begin_function(c.void, c.fn_void);
    let position = b.load(c.vec4, in_position);
    let slot = b.access_chain(ptr_position, per_vertex, &[zero]);
    b.store(slot, position);
    let uv = b.load(c.vec2, in_uv);
    b.store(out_uv, uv);
    b.ret();
    b.end_function();

    b.name(main, "main");
    b.entry_point(
        ExecutionModel::Vertex,
        main,
        "main",
        &[per_vertex, in_position, in_uv, out_uv],
    );
    b.to_bytes()
}

/// Vertex stage: `gl_Position = transform * position; v_uv = uv;` with
/// `uniform Transform { mat4 transform; }` at set 0, binding 2.
pub fn transformed_vertex() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let c = common(&mut b);
    let zero = b.constant_u32(c.int, 0);
    let mat4 = b.type_matrix(c.vec4, 4);

    let ubo = b.type_struct(&[mat4]);
    b.name(ubo, "Transform");
    b.member_decorate(ubo, 0, Decoration::Offset, &[0]);
    b.member_decorate(ubo, 0, Decoration::ColMajor, &[]);
    b.member_decorate(ubo, 0, Decoration::MatrixStride, &[16]);
    b.decorate(ubo, Decoration::Block, &[]);
    let ptr_ubo = b.type_pointer(StorageClass::Uniform, ubo);
    let ptr_uniform_mat4 = b.type_pointer(StorageClass::Uniform, mat4);
    let transform = b.variable(ptr_ubo, StorageClass::Uniform);
    b.set_binding(transform, 0, 2);

    let ptr_in_v4 = b.type_pointer(StorageClass::Input, c.vec4);
    let ptr_in_v2 = b.type_pointer(StorageClass::Input, c.vec2);
    let ptr_out_v2 = b.type_pointer(StorageClass::Output, c.vec2);
    let (per_vertex, ptr_position) = per_vertex_block(&mut b, &c);
    let in_position = b.variable(ptr_in_v4, StorageClass::Input);
    let in_uv = b.variable(ptr_in_v2, StorageClass::Input);
    let out_uv = b.variable(ptr_out_v2, StorageClass::Output);
    b.location(in_position, 0);
    b.location(in_uv, 1);
    b.location(out_uv, 0);

    let main = b.begin_function(c.void, c.fn_void);
    let m_ptr = b.access_chain(ptr_uniform_mat4, transform, &[zero]);
    let m = b.load(mat4, m_ptr);
    let position = b.load(c.vec4, in_position);
    let clip = b.matrix_times_vector(c.vec4, m, position);
    let slot = b.access_chain(ptr_position, per_vertex, &[zero]);
    b.store(slot, clip);
    let uv = b.load(c.vec2, in_uv);
    b.store(out_uv, uv);
    b.ret();
    b.end_function();

    b.entry_point(
        ExecutionModel::Vertex,
        main,
        "main",
        &[per_vertex, in_position, in_uv, out_uv],
    );
    b.to_bytes()
}

/// Fragment stage writing a constant color.
pub fn solid_color_fragment(color: [f32; 4]) -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let c = common(&mut b);
    let ptr_out_v4 = b.type_pointer(StorageClass::Output, c.vec4);
    let out_color = b.variable(ptr_out_v4, StorageClass::Output);
    b.name(out_color, "o_color");
    b.location(out_color, 0);
    let lanes = color.map(|v| b.constant_f32(c.float, v));
    let value = b.constant_composite(c.vec4, &lanes);

    let main = b.begin_function(c.void, c.fn_void);
    b.store(out_color, value);
    b.ret();
    b.end_function();

    b.entry_point(ExecutionModel::Fragment, main, "main", &[out_color]);
    b.execution_mode(main, spirv::ExecutionMode::OriginUpperLeft, &[]);
    b.to_bytes()
}

/// Fragment stage: `color = vec4(v_uv, 0, 1)`.
pub fn uv_color_fragment() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let c = common(&mut b);
    let ptr_in_v2 = b.type_pointer(StorageClass::Input, c.vec2);
    let ptr_out_v4 = b.type_pointer(StorageClass::Output, c.vec4);
    let in_uv = b.variable(ptr_in_v2, StorageClass::Input);
    let out_color = b.variable(ptr_out_v4, StorageClass::Output);
    b.location(in_uv, 0);
    b.location(out_color, 0);
    let f0 = b.constant_f32(c.float, 0.0);
    let f1 = b.constant_f32(c.float, 1.0);
    let zero_one = b.constant_composite(c.vec2, &[f0, f1]);

    let main = b.begin_function(c.void, c.fn_void);
    let uv = b.load(c.vec2, in_uv);
    let color = b.vector_shuffle(c.vec4, uv, zero_one, &[0, 1, 2, 3]);
    b.store(out_color, color);
    b.ret();
    b.end_function();

    b.entry_point(ExecutionModel::Fragment, main, "main", &[in_uv, out_color]);
    b.execution_mode(main, spirv::ExecutionMode::OriginUpperLeft, &[]);
    b.to_bytes()
}

/// Fragment stage: `color = texture(u_texture, v_uv) * tint` with
/// `uniform Material { vec4 tint; }` at set 0 binding 0 and `sampler2D` at set 0 binding 1.
pub fn textured_tint_fragment() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let c = common(&mut b);
    let zero = b.constant_u32(c.int, 0);

    let material = b.type_struct(&[c.vec4]);
    b.name(material, "Material");
    b.member_name(material, 0, "tint");
    b.member_decorate(material, 0, Decoration::Offset, &[0]);
    b.decorate(material, Decoration::Block, &[]);
    let ptr_material = b.type_pointer(StorageClass::Uniform, material);
    let ptr_uniform_v4 = b.type_pointer(StorageClass::Uniform, c.vec4);
    let material_var = b.variable(ptr_material, StorageClass::Uniform);
    b.set_binding(material_var, 0, 0);

    let image = b.type_image_2d(c.float);
    let sampled = b.type_sampled_image(image);
    let ptr_sampled = b.type_pointer(StorageClass::UniformConstant, sampled);
    let texture = b.variable(ptr_sampled, StorageClass::UniformConstant);
    b.name(texture, "u_texture");
    b.set_binding(texture, 0, 1);

    let ptr_in_v2 = b.type_pointer(StorageClass::Input, c.vec2);
    let ptr_out_v4 = b.type_pointer(StorageClass::Output, c.vec4);
    let in_uv = b.variable(ptr_in_v2, StorageClass::Input);
    let out_color = b.variable(ptr_out_v4, StorageClass::Output);
    b.location(in_uv, 0);
    b.location(out_color, 0);

    let main = b.begin_function(c.void, c.fn_void);
    let tex = b.load(sampled, texture);
    let uv = b.load(c.vec2, in_uv);
    let texel = b.image_sample(c.vec4, tex, uv);
    let tint_ptr = b.access_chain(ptr_uniform_v4, material_var, &[zero]);
    let tint = b.load(c.vec4, tint_ptr);
    let color = b.fmul(c.vec4, texel, tint);
    b.store(out_color, color);
    b.ret();
    b.end_function();

    b.entry_point(ExecutionModel::Fragment, main, "main", &[in_uv, out_color]);
    b.execution_mode(main, spirv::ExecutionMode::OriginUpperLeft, &[]);
    b.to_bytes()
}
