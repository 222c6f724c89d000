use super::*;
use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::module::ExecutionModel;
use crate::bytecode::presets;
use crate::pipeline::part::compile;

fn part(bytes: Vec<u8>) -> Arc<ShaderPart> {
    Arc::new(compile(&bytes).unwrap())
}

/// Fragment stage reading `vec4` at location 0 and writing it to location 0.
fn vec4_passthrough_fragment() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let vec4 = b.type_vector(float, 4);
    let ptr_in = b.type_pointer(StorageClass::Input, vec4);
    let ptr_out = b.type_pointer(StorageClass::Output, vec4);
    let input = b.variable(ptr_in, StorageClass::Input);
    let output = b.variable(ptr_out, StorageClass::Output);
    b.location(input, 0);
    b.location(output, 0);
    let main = b.begin_function(void, fn_void);
    let v = b.load(vec4, input);
    b.store(output, v);
    b.ret();
    b.end_function();
    b.entry_point(ExecutionModel::Fragment, main, "main", &[input, output]);
    b.to_bytes()
}

#[test]
fn packed_layout_interleaves_by_location() {
    let vertex = part(presets::passthrough_vertex());
    let layout = VertexLayout::packed(&vertex);
    assert_eq!(layout.stride(0), Some(24));
    assert_eq!(layout.attribute(0).unwrap().offset, 0);
    assert_eq!(layout.attribute(1).unwrap().offset, 16);
    assert!(layout.attribute(2).is_none());
    assert!(layout.stride(1).is_none());
}

#[test]
fn textured_pair_links_with_shared_varying_slots() {
    let vertex = part(presets::transformed_vertex());
    let fragment = part(presets::textured_tint_fragment());
    let layout = VertexLayout::packed(&vertex);
    let set = link(vertex, fragment, layout, 1 << 16).unwrap();
    let l = set.linkage();

    let keys: Vec<_> = l.uniforms.iter().map(|u| (u.set, u.binding, u.size)).collect();
    assert_eq!(keys, vec![(0, 0, 16), (0, 2, 64)]);
    assert_eq!(l.samplers.len(), 1);
    let sampler = l.samplers[0];
    let memory = set.initial_memory();
    assert_eq!(memory.read_u32(sampler.addr).unwrap(), 0);
    assert_eq!(memory.read_u32(sampler.addr + 4).unwrap(), 1);

    assert_eq!(l.outputs.len(), 2);
    let position = l.position.unwrap();
    assert_eq!(l.outputs[position.output].location, None);
    assert_eq!(position.offset, 0);
    let uv = l.outputs.iter().find(|o| o.location == Some(0)).unwrap();
    assert_eq!(uv.size, 8);
    for pair in uv.slots.windows(2) {
        assert_eq!(pair[1] - pair[0], 8);
    }

    assert_eq!(l.vertex_inputs.len(), 2);
    assert_eq!(l.color_output().unwrap().size, 16);
    assert!(l.capacity >= l.layout_bytes);
    assert_eq!(memory.limit(), l.capacity);
    assert_eq!(set.stage_mark().stack_pointer(), l.layout_bytes);
}

#[test]
fn uniform_shared_by_both_stages_gets_one_address() {
    let uniform_stage = |model: ExecutionModel| {
        let mut b = ModuleBuilder::new();
        let void = b.type_void();
        let fn_void = b.type_function(void, &[]);
        let float = b.type_float(32);
        let vec4 = b.type_vector(float, 4);
        let block = b.type_struct(&[vec4]);
        let ptr_block = b.type_pointer(StorageClass::Uniform, block);
        let ubo = b.variable(ptr_block, StorageClass::Uniform);
        b.set_binding(ubo, 0, 5);
        let ptr_out = b.type_pointer(StorageClass::Output, vec4);
        let out = b.variable(ptr_out, StorageClass::Output);
        match model {
            ExecutionModel::Vertex => b.builtin(out, BuiltIn::Position),
            _ => b.location(out, 0),
        }
        let main = b.begin_function(void, fn_void);
        b.ret();
        b.end_function();
        b.entry_point(model, main, "main", &[out]);
        b.to_bytes()
    };
    let vertex = part(uniform_stage(ExecutionModel::Vertex));
    let fragment = part(uniform_stage(ExecutionModel::Fragment));
    let set = link(vertex, fragment, VertexLayout::default(), 4096).unwrap();
    assert_eq!(set.linkage().uniforms.len(), 1);
    assert_eq!(set.linkage().uniform(0, 5).unwrap().size, 16);
}

#[test]
fn missing_varying_is_a_link_error() {
    let vertex = part(presets::passthrough_vertex());
    let fragment = part(vec4_passthrough_fragment());
    let layout = VertexLayout::packed(&vertex);
    let err = link(vertex, fragment, layout, 4096).unwrap_err();
    assert!(matches!(err, GpuError::Link(_)), "{err}");
    assert!(err.to_string().contains("location 0"), "{err}");
}

#[test]
fn stages_must_be_in_order() {
    let vertex = part(presets::passthrough_vertex());
    let fragment = part(presets::uv_color_fragment());
    let err = link(fragment, vertex, VertexLayout::default(), 4096).unwrap_err();
    assert!(matches!(err, GpuError::Link(_)));
}

#[test]
fn vertex_input_needs_a_layout_attribute() {
    let vertex = part(presets::passthrough_vertex());
    let fragment = part(presets::uv_color_fragment());
    let err = link(vertex, fragment, VertexLayout::default(), 4096).unwrap_err();
    assert!(err.to_string().contains("no attribute for location"), "{err}");
}

#[test]
fn oversized_layout_reports_arena_exhaustion() {
    let vertex = part(presets::passthrough_vertex());
    let fragment = part(presets::uv_color_fragment());
    let layout = VertexLayout::packed(&vertex);
    let err = link(vertex, fragment, layout, 64).unwrap_err();
    assert!(matches!(err, GpuError::ArenaExhausted { .. }), "{err}");
}

#[test]
fn private_globals_keep_their_initializer() {
    let vertex = part(presets::passthrough_vertex());
    let mut b = ModuleBuilder::new();
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let vec4 = b.type_vector(float, 4);
    let one = b.constant_f32(float, 1.0);
    let color = b.constant_composite(vec4, &[one, one, one, one]);
    let ptr_private = b.type_pointer(StorageClass::Private, vec4);
    let private = b.variable_with_initializer(ptr_private, StorageClass::Private, color);
    let ptr_out = b.type_pointer(StorageClass::Output, vec4);
    let out = b.variable(ptr_out, StorageClass::Output);
    b.location(out, 0);
    let main = b.begin_function(void, fn_void);
    let v = b.load(vec4, private);
    b.store(out, v);
    b.ret();
    b.end_function();
    b.entry_point(ExecutionModel::Fragment, main, "main", &[out]);
    let fragment = part(b.to_bytes());

    let layout = VertexLayout::packed(&vertex);
    let set = link(vertex, fragment, layout, 4096).unwrap();
    let memory = set.initial_memory();
    let last = memory.records().last().unwrap();
    assert_eq!(last.size, 16);
    assert_eq!(
        f32::from_bits(memory.read_u32(last.addr + 12).unwrap()),
        1.0
    );
}
