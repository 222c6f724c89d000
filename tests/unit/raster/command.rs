use super::*;
use crate::bytecode::emit::ModuleBuilder;
use crate::bytecode::module::{BuiltIn, ExecutionModel, StorageClass};
use crate::bytecode::presets;
use crate::foundation::core::Extent;
use crate::foundation::opts::DeviceOpts;
use crate::pipeline::buffer::CpuBuffer;
use crate::pipeline::device::Device;
use crate::pipeline::texture::TextureFormat;
use crate::raster::depth_stencil::{CompareOp, DepthTest};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

fn device() -> Device {
    Device::new(DeviceOpts {
        max_arena_bytes: 1 << 16,
        cache_shader_parts: true,
    })
}

fn solid_set(device: &mut Device, color: [f32; 4]) -> ShaderSet {
    let vertex = device.compile(&presets::passthrough_vertex()).unwrap();
    let fragment = device
        .compile(&presets::solid_color_fragment(color))
        .unwrap();
    device.link(vertex, fragment).unwrap()
}

/// Full-screen triangle at depth `z`, laid out as `vec4 position, vec2 uv`.
fn fullscreen(z: f32) -> CpuBuffer {
    #[rustfmt::skip]
    let data = [
        -1.0, -1.0, z, 1.0, 0.0, 0.0,
        3.0, -1.0, z, 1.0, 0.0, 0.0,
        -1.0, 3.0, z, 1.0, 0.0, 0.0,
    ];
    CpuBuffer::from_f32s(&data, BufferUsage::Vertex)
}

fn frag_coord_fragment() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let vec4 = b.type_vector(float, 4);
    let ptr_in = b.type_pointer(StorageClass::Input, vec4);
    let ptr_out = b.type_pointer(StorageClass::Output, vec4);
    let coord = b.variable(ptr_in, StorageClass::Input);
    let out = b.variable(ptr_out, StorageClass::Output);
    b.builtin(coord, BuiltIn::FragCoord);
    b.location(out, 0);
    let main = b.begin_function(void, fn_void);
    let v = b.load(vec4, coord);
    b.store(out, v);
    b.ret();
    b.end_function();
    b.entry_point(ExecutionModel::Fragment, main, "main", &[coord, out]);
    b.to_bytes()
}

#[test]
fn non_triangle_topologies_are_rejected() {
    let mut cmd = CommandBuffer::new();
    cmd.set_pipeline_state(PipelineState {
        topology: PrimitiveTopology::LineList,
        ..Default::default()
    });
    let err = cmd.draw_indexed(3, 0).unwrap_err();
    assert!(matches!(err, GpuError::UnsupportedTopology(_)), "{err}");
}

#[test]
fn bindings_check_buffer_usage() {
    let uniform = CpuBuffer::new(16, BufferUsage::Uniform);
    let mut cmd = CommandBuffer::new();
    assert!(cmd.bind_vertex_buffer(0, &uniform, 0).is_err());
    assert!(cmd.bind_index_buffer(&uniform, IndexFormat::U16, 0).is_err());
    assert!(cmd.bind_uniform_buffer(0, 0, &uniform).is_ok());
}

#[test]
fn draw_needs_a_target_and_an_index_buffer() {
    let mut device = device();
    let set = solid_set(&mut device, RED);
    let mut color = Texture::new(Extent::new(2, 2).unwrap(), TextureFormat::Rgba8Unorm);

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    let err = cmd.draw_indexed(3, 0).unwrap_err();
    assert!(err.to_string().contains("render_to"), "{err}");

    cmd.render_to(RenderTarget::new(&mut color));
    let err = cmd.draw_indexed(3, 0).unwrap_err();
    assert!(err.to_string().contains("index buffer"), "{err}");
}

#[test]
fn depth_test_keeps_the_nearest_surface() {
    let mut device = device();
    let red = solid_set(&mut device, RED);
    let green = solid_set(&mut device, GREEN);
    let blue = solid_set(&mut device, BLUE);
    let near = fullscreen(0.5);
    let far = fullscreen(0.8);
    let nearest = fullscreen(0.2);
    let indices = CpuBuffer::from_u16s(&[0, 1, 2], BufferUsage::Index);
    let extent = Extent::new(4, 4).unwrap();
    let mut color = Texture::new(extent, TextureFormat::Rgba8Unorm);
    let mut depth = DepthStencilTexture::new(extent);

    {
        let mut cmd = CommandBuffer::new();
        cmd.set_pipeline_state(PipelineState {
            depth_stencil: DepthStencilState {
                depth_test: DepthTest {
                    enabled: true,
                    compare: CompareOp::LessThan,
                },
                ..Default::default()
            },
            ..Default::default()
        });
        cmd.render_to(
            RenderTarget::new(&mut color)
                .with_depth_stencil(&mut depth)
                .clear_color(Rgba::OPAQUE_BLACK)
                .clear_depth(1.0),
        );
        cmd.bind_index_buffer(&indices, IndexFormat::U16, 0).unwrap();

        for (set, vertices) in [(&red, &near), (&green, &far), (&blue, &nearest)] {
            cmd.set_shader_set(set);
            cmd.bind_vertex_buffer(0, vertices, 0).unwrap();
            cmd.draw_indexed(3, 0).unwrap();
        }
        let stats = cmd.finish();
        assert_eq!(stats.draws, 3);
        assert_eq!(stats.triangles, 3);
        assert_eq!(stats.fragments_shaded, 32);
        assert_eq!(stats.fragments_rejected, 16);
    }

    assert!(color.data().chunks_exact(4).all(|p| p == [0, 0, 255, 255]));
    assert!((depth.texel(2, 2).unwrap().depth - 0.2).abs() < 1e-6);
}

#[test]
fn frag_coord_reports_pixel_centers_depth_and_inverse_w() {
    let mut device = device();
    let vertex = device.compile(&presets::passthrough_vertex()).unwrap();
    let fragment = device.compile(&frag_coord_fragment()).unwrap();
    let set = device.link(vertex, fragment).unwrap();
    let vertices = fullscreen(0.25);
    let indices = CpuBuffer::from_u32s(&[0, 1, 2], BufferUsage::Index);
    let mut color = Texture::new(Extent::new(3, 2).unwrap(), TextureFormat::Rgba32Float);

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    cmd.render_to(RenderTarget::new(&mut color));
    cmd.bind_vertex_buffer(0, &vertices, 0).unwrap();
    cmd.bind_index_buffer(&indices, IndexFormat::U32, 0).unwrap();
    let stats = cmd.draw_indexed(3, 0).unwrap();
    assert_eq!(stats.fragments_shaded, 6);
    drop(cmd);

    for (x, y) in [(2, 1), (0, 0)] {
        let Rgba([fx, fy, z, inv_w]) = color.read(x, y).unwrap();
        assert_eq!((fx, fy), (x as f32 + 0.5, y as f32 + 0.5));
        assert!((z - 0.25).abs() < 1e-6, "{z}");
        assert!((inv_w - 1.0).abs() < 1e-6, "{inv_w}");
    }
}

#[test]
fn triangles_behind_the_eye_are_skipped() {
    let mut device = device();
    let set = solid_set(&mut device, RED);
    #[rustfmt::skip]
    let vertices = CpuBuffer::from_f32s(&[
        -1.0, -1.0, 0.0, -1.0, 0.0, 0.0,
        3.0, -1.0, 0.0, 1.0, 0.0, 0.0,
        -1.0, 3.0, 0.0, 1.0, 0.0, 0.0,
    ], BufferUsage::Vertex);
    let indices = CpuBuffer::from_u16s(&[0, 1, 2, 9], BufferUsage::Index);
    let mut color = Texture::new(Extent::new(2, 2).unwrap(), TextureFormat::Rgba8Unorm);

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    cmd.render_to(RenderTarget::new(&mut color));
    cmd.bind_vertex_buffer(0, &vertices, 0).unwrap();
    cmd.bind_index_buffer(&indices, IndexFormat::U16, 0).unwrap();
    let stats = cmd.draw_indexed(4, 0).unwrap();
    assert_eq!(stats.triangles, 0);
    assert_eq!(stats.triangles_skipped, 1);
    drop(cmd);
    assert!(color.data().iter().all(|b| *b == 0));
}

#[test]
fn out_of_range_vertex_fetch_is_reported() {
    let mut device = device();
    let set = solid_set(&mut device, RED);
    let vertices = fullscreen(0.0);
    let indices = CpuBuffer::from_u16s(&[0, 1, 7], BufferUsage::Index);
    let mut color = Texture::new(Extent::new(2, 2).unwrap(), TextureFormat::Rgba8Unorm);

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    cmd.render_to(RenderTarget::new(&mut color));
    cmd.bind_vertex_buffer(0, &vertices, 0).unwrap();
    cmd.bind_index_buffer(&indices, IndexFormat::U16, 0).unwrap();
    let err = cmd.draw_indexed(3, 0).unwrap_err();
    assert!(matches!(err, GpuError::Validation(_)), "{err}");
}

/// Fragment stage: `p += vec4(0.25, 0, 0, 0); color = p;` with a private `p = vec4(0.25, 0, 0, 1)`.
fn accumulating_private_fragment() -> Vec<u8> {
    let mut b = ModuleBuilder::new();
    let void = b.type_void();
    let fn_void = b.type_function(void, &[]);
    let float = b.type_float(32);
    let vec4 = b.type_vector(float, 4);
    let zero = b.constant_f32(float, 0.0);
    let quarter = b.constant_f32(float, 0.25);
    let one = b.constant_f32(float, 1.0);
    let init = b.constant_composite(vec4, &[quarter, zero, zero, one]);
    let step = b.constant_composite(vec4, &[quarter, zero, zero, zero]);
    let ptr_private = b.type_pointer(StorageClass::Private, vec4);
    let p = b.variable_with_initializer(ptr_private, StorageClass::Private, init);
    let ptr_out = b.type_pointer(StorageClass::Output, vec4);
    let out = b.variable(ptr_out, StorageClass::Output);
    b.location(out, 0);
    let main = b.begin_function(void, fn_void);
    let v = b.load(vec4, p);
    let next = b.fadd(vec4, v, step);
    b.store(p, next);
    b.store(out, next);
    b.ret();
    b.end_function();
    b.entry_point(ExecutionModel::Fragment, main, "main", &[out]);
    b.to_bytes()
}

#[test]
fn private_globals_start_from_their_initializer_every_invocation() {
    let mut device = device();
    let vertex = device.compile(&presets::passthrough_vertex()).unwrap();
    let fragment = device.compile(&accumulating_private_fragment()).unwrap();
    let set = device.link(vertex, fragment).unwrap();
    assert!(!set.linkage().private.is_empty());
    let vertices = fullscreen(0.0);
    let indices = CpuBuffer::from_u32s(&[0, 1, 2, 0, 1, 2], BufferUsage::Index);
    let mut color = Texture::new(Extent::new(4, 1).unwrap(), TextureFormat::Rgba32Float);

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    cmd.render_to(RenderTarget::new(&mut color));
    cmd.bind_vertex_buffer(0, &vertices, 0).unwrap();
    cmd.bind_index_buffer(&indices, IndexFormat::U32, 0).unwrap();
    let stats = cmd.draw_indexed(6, 0).unwrap();
    assert_eq!(stats.fragments_shaded, 8);
    drop(cmd);

    let reds: Vec<f32> = (0..4).map(|x| color.read(x, 0).unwrap().0[0]).collect();
    assert_eq!(reds, [0.5; 4]);
}

#[test]
fn depth_stencil_attachment_must_match_the_color_target() {
    let mut device = device();
    let set = solid_set(&mut device, RED);
    let vertices = fullscreen(0.5);
    let indices = CpuBuffer::from_u16s(&[0, 1, 2], BufferUsage::Index);
    let mut color = Texture::new(Extent::new(4, 4).unwrap(), TextureFormat::Rgba8Unorm);
    let mut depth = DepthStencilTexture::new(Extent::new(2, 2).unwrap());

    let mut cmd = CommandBuffer::new();
    cmd.set_shader_set(&set);
    cmd.set_pipeline_state(PipelineState {
        depth_stencil: DepthStencilState {
            depth_test: DepthTest {
                enabled: true,
                compare: CompareOp::LessThan,
            },
            ..Default::default()
        },
        ..Default::default()
    });
    cmd.render_to(RenderTarget::new(&mut color).with_depth_stencil(&mut depth));
    cmd.bind_vertex_buffer(0, &vertices, 0).unwrap();
    cmd.bind_index_buffer(&indices, IndexFormat::U16, 0).unwrap();
    let err = cmd.draw_indexed(3, 0).unwrap_err();
    assert!(matches!(err, GpuError::Validation(_)), "{err}");
    assert!(err.to_string().contains("2x2"), "{err}");
    drop(cmd);
    assert!(color.data().iter().all(|b| *b == 0));
}
