use super::*;
use crate::bytecode::presets;
use crate::foundation::error::GpuError;
use crate::pipeline::buffer::GpuBuffer;

fn opts(cache: bool) -> DeviceOpts {
    DeviceOpts {
        max_arena_bytes: 1 << 16,
        cache_shader_parts: cache,
    }
}

#[test]
fn identical_bytecode_reuses_the_cached_part() {
    let mut device = Device::new(opts(true));
    let a = device.compile(&presets::uv_color_fragment()).unwrap();
    let b = device.compile(&presets::uv_color_fragment()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    device.compile(&presets::passthrough_vertex()).unwrap();
    assert_eq!(device.cached_parts(), 2);
}

#[test]
fn cache_can_be_disabled() {
    let mut device = Device::new(opts(false));
    let a = device.compile(&presets::uv_color_fragment()).unwrap();
    let b = device.compile(&presets::uv_color_fragment()).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(device.cached_parts(), 0);
}

#[test]
fn link_uses_the_configured_arena_ceiling() {
    let mut device = Device::new(DeviceOpts {
        max_arena_bytes: 32,
        cache_shader_parts: true,
    });
    let vertex = device.compile(&presets::passthrough_vertex()).unwrap();
    let fragment = device.compile(&presets::uv_color_fragment()).unwrap();
    let err = device.link(vertex, fragment).unwrap_err();
    assert!(matches!(err, GpuError::ArenaExhausted { .. }));
}

#[test]
fn factories_size_resources() {
    let device = Device::new(opts(true));
    let buf = device.create_buffer(12, BufferUsage::Vertex);
    assert_eq!(buf.len(), 12);
    let init = device.create_buffer_init(&[1, 2], BufferUsage::Index);
    assert_eq!(init.contents(), &[1, 2]);

    let extent = Extent::new(4, 2).unwrap();
    let tex = device.create_texture(extent, TextureFormat::Rgba32Float);
    assert_eq!(tex.data().len(), 4 * 2 * 16);
    assert_eq!(device.create_depth_stencil(extent).extent(), extent);
}

#[test]
fn default_opts_have_a_positive_arena_ceiling() {
    let opts = DeviceOpts::default();
    assert!(opts.max_arena_bytes > 0);
    assert!(opts.cache_shader_parts);
}

#[test]
fn hash_collisions_do_not_share_parts() {
    let mut device = Device::new(opts(true));
    let solid = presets::solid_color_fragment([1.0, 0.0, 0.0, 1.0]);
    let uv = presets::uv_color_fragment();

    // File the solid part under the uv bytecode's hash, as a colliding entry would be.
    let solid_part = Arc::new(compile(&solid).unwrap());
    device
        .parts
        .entry(xxhash_rust::xxh3::xxh3_64(&uv))
        .or_default()
        .push(CachedPart {
            bytecode: solid.into_boxed_slice(),
            part: solid_part.clone(),
        });

    let part = device.compile(&uv).unwrap();
    assert!(!Arc::ptr_eq(&part, &solid_part));
    assert_eq!(part.reflection().inputs.len(), 1);
    assert_eq!(device.cached_parts(), 2);
    assert!(Arc::ptr_eq(&device.compile(&uv).unwrap(), &part));
}
