use crate::foundation::core::Extent;
use crate::foundation::error::GpuResult;
use crate::foundation::opts::DeviceOpts;
use crate::pipeline::buffer::{BufferUsage, CpuBuffer};
use crate::pipeline::linker::{ShaderSet, VertexLayout, link};
use crate::pipeline::part::{ShaderPart, compile};
use crate::pipeline::texture::{DepthStencilTexture, Texture, TextureFormat};
use std::collections::HashMap;
use std::sync::Arc;

/// Factory for shader sets, buffers and textures.
///
/// Compiled parts are cached by bytecode hash for the lifetime of the device. A hit also
/// requires the stored bytecode to match, so colliding modules get their own entries.
#[derive(Debug, Default)]
pub struct Device {
    opts: DeviceOpts,
    parts: HashMap<u64, Vec<CachedPart>>,
}

#[derive(Debug)]
struct CachedPart {
    bytecode: Box<[u8]>,
    part: Arc<ShaderPart>,
}

impl Device {
    pub fn new(opts: DeviceOpts) -> Self {
        Self {
            opts,
            parts: HashMap::new(),
        }
    }

    pub fn opts(&self) -> &DeviceOpts {
        &self.opts
    }

    /// Compile one stage, reusing an earlier part for identical bytecode.
    #[tracing::instrument(skip(self, bytecode), fields(bytes = bytecode.len()))]
    pub fn compile(&mut self, bytecode: &[u8]) -> GpuResult<Arc<ShaderPart>> {
        let key = xxhash_rust::xxh3::xxh3_64(bytecode);
        if self.opts.cache_shader_parts
            && let Some(hit) = self
                .parts
                .get(&key)
                .and_then(|bucket| bucket.iter().find(|c| *c.bytecode == *bytecode))
        {
            tracing::trace!(hash = key, "shader part cache hit");
            return Ok(hit.part.clone());
        }
        let part = Arc::new(compile(bytecode)?);
        if self.opts.cache_shader_parts {
            self.parts.entry(key).or_default().push(CachedPart {
                bytecode: bytecode.into(),
                part: part.clone(),
            });
        }
        Ok(part)
    }

    /// Link with a tightly packed vertex layout derived from the vertex inputs.
    pub fn link(
        &self,
        vertex: Arc<ShaderPart>,
        fragment: Arc<ShaderPart>,
    ) -> GpuResult<ShaderSet> {
        let layout = VertexLayout::packed(&vertex);
        self.link_with_layout(vertex, fragment, layout)
    }

    pub fn link_with_layout(
        &self,
        vertex: Arc<ShaderPart>,
        fragment: Arc<ShaderPart>,
        layout: VertexLayout,
    ) -> GpuResult<ShaderSet> {
        link(vertex, fragment, layout, self.opts.max_arena_bytes)
    }

    pub fn create_buffer(&self, size: usize, usage: BufferUsage) -> CpuBuffer {
        CpuBuffer::new(size, usage)
    }

    pub fn create_buffer_init(&self, bytes: &[u8], usage: BufferUsage) -> CpuBuffer {
        CpuBuffer::from_bytes(bytes, usage)
    }

    pub fn create_texture(&self, extent: Extent, format: TextureFormat) -> Texture {
        Texture::new(extent, format)
    }

    pub fn create_depth_stencil(&self, extent: Extent) -> DepthStencilTexture {
        DepthStencilTexture::new(extent)
    }

    /// Number of distinct compiled parts held by the cache.
    pub fn cached_parts(&self) -> usize {
        self.parts.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/device.rs"]
mod tests;
