use crate::foundation::core::Extent;
use crate::foundation::error::GpuResult;
use crate::pipeline::buffer::{BufferUsage, CpuBuffer};
use crate::pipeline::device::Device;
use crate::pipeline::linker::VertexLayout;
use crate::pipeline::texture::{DepthStencilTexture, Texture, TextureFormat};
use crate::raster::command::{CommandBuffer, DrawStats, IndexFormat, RenderTarget};
use crate::scene::desc::{Scene, TextureSpec};
use std::path::Path;

/// A rendered scene and the counters of its draw.
#[derive(Debug)]
pub struct SceneOutput {
    pub color: Texture,
    pub depth_stencil: Option<DepthStencilTexture>,
    pub stats: DrawStats,
}

impl Scene {
    /// Compile, link and draw this scene with the given stage bytecode.
    ///
    /// Texture paths are resolved against `base_dir`.
    #[tracing::instrument(skip_all, fields(width = self.width, height = self.height))]
    pub fn render(
        &self,
        device: &mut Device,
        vertex: &[u8],
        fragment: &[u8],
        base_dir: &Path,
    ) -> GpuResult<SceneOutput> {
        let extent = Extent::new(self.width, self.height)?;
        let vertex = device.compile(vertex)?;
        let fragment = device.compile(fragment)?;
        let layout = self
            .layout
            .clone()
            .unwrap_or_else(|| VertexLayout::packed(&vertex));
        let set = device.link_with_layout(vertex, fragment, layout)?;

        let vertices = CpuBuffer::from_f32s(&self.vertices, BufferUsage::Vertex);
        let indices = CpuBuffer::from_u32s(&self.indices, BufferUsage::Index);
        let uniforms: Vec<_> = self
            .uniforms
            .iter()
            .map(|u| {
                (
                    u.set,
                    u.binding,
                    CpuBuffer::from_f32s(&u.data, BufferUsage::Uniform),
                )
            })
            .collect();
        let textures = self
            .textures
            .iter()
            .map(|t| {
                let tex = match &t.source {
                    TextureSpec::Path { path } => Texture::load(&base_dir.join(path))?,
                    TextureSpec::Solid {
                        color,
                        width,
                        height,
                    } => Texture::solid(
                        Extent::new(*width, *height)?,
                        TextureFormat::Rgba8Unorm,
                        *color,
                    ),
                };
                Ok((t.set, t.binding, tex))
            })
            .collect::<GpuResult<Vec<_>>>()?;

        let mut color = device.create_texture(extent, self.format);
        let mut depth_stencil = self
            .pipeline
            .depth_stencil
            .is_enabled()
            .then(|| device.create_depth_stencil(extent));

        let stats = {
            let mut target = RenderTarget::new(&mut color)
                .clear_color(self.clear_color)
                .clear_depth(self.clear_depth)
                .clear_stencil(self.clear_stencil);
            if let Some(ds) = depth_stencil.as_mut() {
                target = target.with_depth_stencil(ds);
            }

            let mut cmd = CommandBuffer::new();
            cmd.set_shader_set(&set);
            cmd.set_pipeline_state(self.pipeline);
            cmd.render_to(target);
            for b in &set.layout().bindings {
                cmd.bind_vertex_buffer(b.binding, &vertices, 0)?;
            }
            cmd.bind_index_buffer(&indices, IndexFormat::U32, 0)?;
            for (s, binding, buffer) in &uniforms {
                cmd.bind_uniform_buffer(*s, *binding, buffer)?;
            }
            for (s, binding, tex) in &textures {
                cmd.bind_texture(*s, *binding, tex);
            }
            cmd.draw_indexed(self.indices.len() as u32, 0)?;
            cmd.finish()
        };

        Ok(SceneOutput {
            color,
            depth_stencil,
            stats,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/draw.rs"]
mod tests;
