//! Command buffer and the triangle rasterizer behind `draw_indexed`.

use crate::foundation::core::Rgba;
use crate::foundation::error::{GpuError, GpuResult};
use crate::pipeline::buffer::{BufferUsage, GpuBuffer};
use crate::pipeline::linker::ShaderSet;
use crate::pipeline::texture::{DepthStencilTexture, Texture};
use crate::raster::barycentric::{EdgeEvaluator, perspective_correct};
use crate::raster::depth_stencil::{DepthStencilState, run_test};
use crate::runtime::exec::TextureSource;
use crate::runtime::memory::ShaderMemory;
use crate::runtime::scope::InterfaceBindings;
use crate::runtime::types::RuntimeType;
use std::collections::BTreeMap;
use std::ops::AddAssign;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    PointList,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IndexFormat {
    U16,
    #[default]
    U32,
}

impl IndexFormat {
    pub fn bytes(self) -> usize {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }
}

/// Fixed-function state of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineState {
    pub topology: PrimitiveTopology,
    pub depth_stencil: DepthStencilState,
}

/// Color target plus optional depth/stencil attachment and the clears applied by `render_to`.
pub struct RenderTarget<'a> {
    color: &'a mut Texture,
    depth_stencil: Option<&'a mut DepthStencilTexture>,
    clear_color: Option<Rgba>,
    clear_depth: Option<f32>,
    clear_stencil: Option<u8>,
}

impl<'a> RenderTarget<'a> {
    pub fn new(color: &'a mut Texture) -> Self {
        Self {
            color,
            depth_stencil: None,
            clear_color: None,
            clear_depth: None,
            clear_stencil: None,
        }
    }

    pub fn with_depth_stencil(mut self, depth_stencil: &'a mut DepthStencilTexture) -> Self {
        self.depth_stencil = Some(depth_stencil);
        self
    }

    pub fn clear_color(mut self, color: Rgba) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = Some(depth);
        self
    }

    pub fn clear_stencil(mut self, stencil: u8) -> Self {
        self.clear_stencil = Some(stencil);
        self
    }
}

/// Counters accumulated over draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DrawStats {
    pub draws: u64,
    pub triangles: u64,
    /// Triangles dropped for zero area or a corner at or behind the eye (`w <= 0`).
    pub triangles_skipped: u64,
    pub fragments_shaded: u64,
    /// Covered pixels that failed the depth/stencil test.
    pub fragments_rejected: u64,
}

impl AddAssign for DrawStats {
    fn add_assign(&mut self, rhs: Self) {
        self.draws += rhs.draws;
        self.triangles += rhs.triangles;
        self.triangles_skipped += rhs.triangles_skipped;
        self.fragments_shaded += rhs.fragments_shaded;
        self.fragments_rejected += rhs.fragments_rejected;
    }
}

struct IndexBinding<'a> {
    buffer: &'a dyn GpuBuffer,
    format: IndexFormat,
    offset: usize,
}

impl IndexBinding<'_> {
    fn fetch(&self, i: usize) -> GpuResult<u32> {
        let n = self.format.bytes();
        let start = self.offset + i * n;
        let b = self
            .buffer
            .contents()
            .get(start..start + n)
            .ok_or_else(|| {
                GpuError::validation(format!("index {i} is past the end of the index buffer"))
            })?;
        Ok(match self.format {
            IndexFormat::U16 => u32::from(u16::from_le_bytes([b[0], b[1]])),
            IndexFormat::U32 => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
    }
}

struct BoundTextures<'a, 'b> {
    textures: &'b BTreeMap<(u32, u32), &'a Texture>,
}

impl TextureSource for BoundTextures<'_, '_> {
    fn sample(&self, set: u32, binding: u32, uv: [f32; 2]) -> GpuResult<Rgba> {
        self.textures
            .get(&(set, binding))
            .map(|t| t.sample_nearest(uv))
            .ok_or_else(|| {
                GpuError::validation(format!("no texture bound at set {set} binding {binding}"))
            })
    }
}

/// Records bindings and executes draws against one render target.
///
/// Not meant to be shared between threads; each draw runs to completion before returning.
pub struct CommandBuffer<'a> {
    shader_set: Option<&'a ShaderSet>,
    state: PipelineState,
    index: Option<IndexBinding<'a>>,
    vertex_buffers: BTreeMap<u32, (&'a dyn GpuBuffer, usize)>,
    uniforms: BTreeMap<(u32, u32), &'a dyn GpuBuffer>,
    textures: BTreeMap<(u32, u32), &'a Texture>,
    target: Option<RenderTarget<'a>>,
    memory: ShaderMemory,
    stats: DrawStats,
}

impl Default for CommandBuffer<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn expect_usage(buffer: &dyn GpuBuffer, usage: BufferUsage) -> GpuResult<()> {
    if buffer.usage() != usage {
        return Err(GpuError::validation(format!(
            "{:?} buffer bound as a {usage:?} buffer",
            buffer.usage()
        )));
    }
    Ok(())
}

impl<'a> CommandBuffer<'a> {
    pub fn new() -> Self {
        Self {
            shader_set: None,
            state: PipelineState::default(),
            index: None,
            vertex_buffers: BTreeMap::new(),
            uniforms: BTreeMap::new(),
            textures: BTreeMap::new(),
            target: None,
            memory: ShaderMemory::with_limit(0),
            stats: DrawStats::default(),
        }
    }

    pub fn set_shader_set(&mut self, set: &'a ShaderSet) {
        self.shader_set = Some(set);
    }

    pub fn set_pipeline_state(&mut self, state: PipelineState) {
        self.state = state;
    }

    pub fn bind_index_buffer(
        &mut self,
        buffer: &'a dyn GpuBuffer,
        format: IndexFormat,
        offset: usize,
    ) -> GpuResult<()> {
        expect_usage(buffer, BufferUsage::Index)?;
        self.index = Some(IndexBinding {
            buffer,
            format,
            offset,
        });
        Ok(())
    }

    /// Bind a vertex buffer to `binding`, starting `offset` bytes in.
    pub fn bind_vertex_buffer(
        &mut self,
        binding: u32,
        buffer: &'a dyn GpuBuffer,
        offset: usize,
    ) -> GpuResult<()> {
        expect_usage(buffer, BufferUsage::Vertex)?;
        self.vertex_buffers.insert(binding, (buffer, offset));
        Ok(())
    }

    pub fn bind_uniform_buffer(
        &mut self,
        set: u32,
        binding: u32,
        buffer: &'a dyn GpuBuffer,
    ) -> GpuResult<()> {
        expect_usage(buffer, BufferUsage::Uniform)?;
        self.uniforms.insert((set, binding), buffer);
        Ok(())
    }

    pub fn bind_texture(&mut self, set: u32, binding: u32, texture: &'a Texture) {
        self.textures.insert((set, binding), texture);
    }

    /// Attach `target` and apply its clears.
    #[tracing::instrument(skip_all)]
    pub fn render_to(&mut self, mut target: RenderTarget<'a>) {
        if let Some(color) = target.clear_color {
            target.color.clear(color);
        }
        if let Some(ds) = target.depth_stencil.as_deref_mut() {
            ds.clear(target.clear_depth, target.clear_stencil);
        }
        tracing::debug!(
            width = target.color.extent().width,
            height = target.color.extent().height,
            depth_stencil = target.depth_stencil.is_some(),
            "render target attached"
        );
        self.target = Some(target);
    }

    /// Totals over every draw recorded so far.
    pub fn stats(&self) -> DrawStats {
        self.stats
    }

    pub fn finish(self) -> DrawStats {
        self.stats
    }

    /// Draw `index_count / 3` triangles starting at index `first_index`.
    ///
    /// Trailing indices that do not form a whole triangle are ignored.
    #[tracing::instrument(skip(self))]
    pub fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> GpuResult<DrawStats> {
        if self.state.topology != PrimitiveTopology::TriangleList {
            return Err(GpuError::UnsupportedTopology(format!(
                "{:?}",
                self.state.topology
            )));
        }
        let Self {
            shader_set,
            state,
            index,
            vertex_buffers,
            uniforms,
            textures,
            target,
            memory,
            stats: totals,
        } = self;

        let set = shader_set.ok_or_else(|| GpuError::validation("no shader set bound"))?;
        let target = target
            .as_mut()
            .ok_or_else(|| GpuError::validation("render_to was not called"))?;
        let index = index
            .as_ref()
            .ok_or_else(|| GpuError::validation("no index buffer bound"))?;
        let ds_state = state.depth_stencil;
        if ds_state.is_enabled() && target.depth_stencil.is_none() {
            return Err(GpuError::validation(
                "depth/stencil testing needs a depth/stencil attachment",
            ));
        }
        if let Some(ds) = target.depth_stencil.as_deref()
            && ds.extent() != target.color.extent()
        {
            return Err(GpuError::validation(format!(
                "depth/stencil attachment is {}x{}, color target is {}x{}",
                ds.extent().width,
                ds.extent().height,
                target.color.extent().width,
                target.color.extent().height
            )));
        }

        let linkage = set.linkage();
        memory.clone_from(set.initial_memory());
        for slot in &linkage.uniforms {
            let buffer = uniforms.get(&(slot.set, slot.binding)).ok_or_else(|| {
                GpuError::validation(format!(
                    "no uniform buffer bound at set {} binding {}",
                    slot.set, slot.binding
                ))
            })?;
            let bytes = buffer.contents().get(..slot.size).ok_or_else(|| {
                GpuError::validation(format!(
                    "uniform buffer at set {} binding {} holds {} bytes, the shader reads {}",
                    slot.set,
                    slot.binding,
                    buffer.len(),
                    slot.size
                ))
            })?;
            memory.write(slot.addr, bytes)?;
        }
        for slot in &linkage.samplers {
            if !textures.contains_key(&(slot.set, slot.binding)) {
                return Err(GpuError::validation(format!(
                    "no texture bound at set {} binding {}",
                    slot.set, slot.binding
                )));
            }
        }
        let mut inputs = Vec::with_capacity(linkage.vertex_inputs.len());
        for input in &linkage.vertex_inputs {
            let binding = input.attribute.binding;
            let (buffer, offset) = vertex_buffers.get(&binding).ok_or_else(|| {
                GpuError::validation(format!("no vertex buffer bound at binding {binding}"))
            })?;
            let stride = set.layout().stride(binding).unwrap_or_default();
            inputs.push((input, buffer.contents(), offset + input.attribute.offset, stride));
        }

        let position = linkage
            .position
            .ok_or_else(|| GpuError::link("shader set has no position output"))?;
        let color_out = linkage
            .color_output()
            .copied()
            .ok_or_else(|| GpuError::link("shader set has no color output"))?;
        let varyings = linkage
            .outputs
            .iter()
            .filter(|o| o.location.is_some())
            .map(|o| Ok((set.vertex().types().runtime(o.pointee)?, o.slots)))
            .collect::<GpuResult<Vec<(&RuntimeType, [usize; 4])>>>()?;
        let color_ty = set.fragment().types().runtime(color_out.pointee)?;

        let bound = BoundTextures { textures };
        let vertex = set.vertex_invocation(&bound);
        let fragment = set.fragment_invocation(&bound);
        let extent = target.color.extent();
        let (width, height) = (f64::from(extent.width), f64::from(extent.height));

        let mut stats = DrawStats {
            draws: 1,
            ..DrawStats::default()
        };
        let mut bindings = InterfaceBindings::new();
        let no_overrides = InterfaceBindings::new();
        let mut row = Vec::new();

        for tri in 0..(index_count / 3) as usize {
            let mut screen = [[0f64; 2]; 3];
            let mut depth = [0f64; 3];
            let mut inv_w = [0f64; 3];
            let mut visible = true;

            for corner in 0..3 {
                let vertex_index = index.fetch(first_index as usize + tri * 3 + corner)?;
                set.begin_invocation(memory)?;
                for (input, bytes, base, stride) in &inputs {
                    let start = base + vertex_index as usize * stride;
                    let src = bytes.get(start..start + input.size).ok_or_else(|| {
                        GpuError::validation(format!(
                            "vertex {vertex_index} location {} reads past the end of its buffer",
                            input.location
                        ))
                    })?;
                    memory.write(input.addr, src)?;
                }
                if let Some(addr) = linkage.vertex_index {
                    memory.write(addr, &vertex_index.to_le_bytes())?;
                }
                if let Some(addr) = linkage.instance_index {
                    memory.write(addr, &0u32.to_le_bytes())?;
                }
                bindings.clear();
                for out in &linkage.outputs {
                    bindings.retarget(out.var, out.slots[corner]);
                }
                vertex.call(set.vertex().entry(), &bindings, memory)?;

                let at = linkage.outputs[position.output].slots[corner] + position.offset;
                let mut clip = [0f64; 4];
                for (i, c) in clip.iter_mut().enumerate() {
                    *c = f64::from(f32::from_bits(memory.read_u32(at + i * 4)?));
                }
                let w = clip[3];
                if !(w.is_finite() && w > 0.0) {
                    visible = false;
                    continue;
                }
                screen[corner] = [
                    (clip[0] / w + 1.0) / 2.0 * width,
                    (clip[1] / w + 1.0) / 2.0 * height,
                ];
                depth[corner] = clip[2] / w;
                inv_w[corner] = 1.0 / w;
            }

            let evaluator = if visible {
                EdgeEvaluator::new(screen[0], screen[1], screen[2])
            } else {
                None
            };
            let Some(evaluator) = evaluator else {
                tracing::trace!(tri, "triangle skipped");
                stats.triangles_skipped += 1;
                continue;
            };
            stats.triangles += 1;

            let xs = screen.map(|p| p[0]);
            let ys = screen.map(|p| p[1]);
            let x0 = xs.iter().copied().fold(f64::INFINITY, f64::min).floor().max(0.0) as i64;
            let x1 = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil().min(width - 1.0)
                as i64;
            let y0 = ys.iter().copied().fold(f64::INFINITY, f64::min).floor().max(0.0) as i64;
            let y1 = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil().min(height - 1.0)
                as i64;

            for y in y0..=y1 {
                let py = y as f64 + 0.5;
                evaluator.row(py, (x0..=x1).map(|x| x as f64 + 0.5), &mut row);
                for (x, weights) in (x0..=x1).zip(row.iter().copied()) {
                    if !EdgeEvaluator::inside(weights) {
                        continue;
                    }
                    let (corrected, one_over_w) = perspective_correct(weights, inv_w);
                    let z = corrected
                        .iter()
                        .zip(depth)
                        .map(|(b, d)| f64::from(*b) * d)
                        .sum::<f64>() as f32;

                    if ds_state.is_enabled()
                        && let Some(ds) = target.depth_stencil.as_deref_mut()
                        && let Some(stored) = ds.texel(x, y)
                    {
                        let outcome = run_test(&ds_state, stored, z);
                        ds.set_texel(x, y, outcome.texel);
                        if !outcome.passed {
                            stats.fragments_rejected += 1;
                            continue;
                        }
                    }

                    set.begin_invocation(memory)?;
                    for (ty, slots) in &varyings {
                        ty.interpolate(corrected, [slots[0], slots[1], slots[2]], slots[3], memory)?;
                    }
                    if let Some(addr) = linkage.frag_coord {
                        let coord = [x as f32 + 0.5, py as f32, z, one_over_w as f32];
                        let bytes: Vec<u8> = coord.iter().flat_map(|c| c.to_le_bytes()).collect();
                        memory.write(addr, &bytes)?;
                    }
                    fragment.call(set.fragment().entry(), &no_overrides, memory)?;

                    let c = color_ty.read_components(memory.slice(color_out.addr, color_out.size)?)?;
                    let channel = |i: usize, default: f32| c.get(i).map_or(default, |v| *v as f32);
                    target.color.write(
                        x,
                        y,
                        Rgba([
                            channel(0, 0.0),
                            channel(1, 0.0),
                            channel(2, 0.0),
                            channel(3, 1.0),
                        ]),
                    );
                    stats.fragments_shaded += 1;
                }
            }
        }

        tracing::debug!(
            triangles = stats.triangles,
            skipped = stats.triangles_skipped,
            shaded = stats.fragments_shaded,
            rejected = stats.fragments_rejected,
            "draw complete"
        );
        *totals += stats;
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/raster/command.rs"]
mod tests;
