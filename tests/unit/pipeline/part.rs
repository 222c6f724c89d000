use super::*;
use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::presets;

#[test]
fn textured_fragment_reflects_bindings_and_inputs() {
    let part = compile(&presets::textured_tint_fragment()).unwrap();
    let r = part.reflection();
    assert_eq!(r.stage, ShaderStage::Fragment);
    assert_eq!(r.entry_point, "main");

    assert_eq!(r.uniforms.len(), 1);
    assert_eq!((r.uniforms[0].set, r.uniforms[0].binding), (0, 0));
    assert_eq!(r.uniforms[0].size, 16);

    assert_eq!(r.textures.len(), 1);
    assert_eq!(r.textures[0].binding, 1);
    assert_eq!(r.textures[0].name.as_deref(), Some("u_texture"));
    assert_eq!(r.textures[0].size, 8);

    assert_eq!(r.input_at(0).unwrap().size, 8);
    assert_eq!(r.output_at(0).unwrap().size, 16);
    assert!(r.input_at(1).is_none());
    assert!(r.instruction_count > 0);
}

#[test]
fn vertex_block_position_is_reported_as_builtin() {
    let part = compile(&presets::passthrough_vertex()).unwrap();
    let r = part.reflection();
    assert_eq!(part.stage(), ShaderStage::Vertex);
    let position = r
        .outputs
        .iter()
        .find(|o| o.builtin.is_some())
        .expect("position output");
    assert_eq!(position.builtin.as_deref(), Some("Position"));
    assert_eq!(position.location, None);
    assert_eq!(position.size, 20);
    assert_eq!(r.input_at(0).unwrap().name.as_deref(), Some("a_position"));
    assert_eq!(r.input_at(1).unwrap().size, 8);
    assert_eq!(r.output_at(0).unwrap().name.as_deref(), Some("v_uv"));
}

#[test]
fn module_without_entry_point_is_rejected() {
    let mut b = ModuleBuilder::new();
    b.type_float(32);
    let err = compile(&b.to_bytes()).unwrap_err();
    assert!(matches!(err, GpuError::Validation(_)), "{err}");
}

#[test]
fn uniform_without_binding_is_rejected() {
    let mut b = ModuleBuilder::new();
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let block = b.type_struct(&[float]);
    let ptr = b.type_pointer(StorageClass::Uniform, block);
    let ubo = b.variable(ptr, StorageClass::Uniform);
    let main = b.begin_function(void, fn_void);
    b.ret();
    b.end_function();
    b.entry_point(ExecutionModel::Fragment, main, "main", &[]);
    let _ = ubo;

    let err = compile(&b.to_bytes()).unwrap_err();
    assert!(err.to_string().contains("has no binding"), "{err}");
}

#[test]
fn identical_bytecode_hashes_identically() {
    let a = compile(&presets::uv_color_fragment()).unwrap();
    let b = compile(&presets::uv_color_fragment()).unwrap();
    let c = compile(&presets::solid_color_fragment([1.0, 0.0, 0.0, 1.0])).unwrap();
    assert_eq!(a.hash(), b.hash());
    assert_ne!(a.hash(), c.hash());
}
