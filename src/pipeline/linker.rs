//! Stage linker.
//!
//! Linking assigns every interface variable of a vertex/fragment pair a fixed arena address:
//! shared uniforms, sampler handles, vertex inputs, four slots per vertex output (three corners
//! plus the interpolated value the fragment stage reads) and fragment outputs. The resulting
//! arena image is captured once and restored at the start of every draw.

use crate::bytecode::module::{BuiltIn, Id, StorageClass};
use crate::foundation::error::{GpuError, GpuResult};
use crate::pipeline::part::{ShaderPart, ShaderStage, builtin_of};
use crate::runtime::exec::{Invocation, TextureSource, local_footprint};
use crate::runtime::memory::{Mark, ShaderMemory};
use crate::runtime::scope::Globals;
use crate::runtime::types::{RuntimeType, Scalar};
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

/// Stride of one vertex buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VertexBindingLayout {
    pub binding: u32,
    pub stride: usize,
}

/// Where the bytes of one vertex input live inside a vertex buffer.
///
/// Bytes are copied verbatim, so the buffer must already hold the shader's input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VertexAttribute {
    pub location: u32,
    pub binding: u32,
    pub offset: usize,
}

/// How vertex buffers map onto vertex shader inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct VertexLayout {
    pub bindings: Vec<VertexBindingLayout>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Tightly packed, interleaved layout in binding 0, attributes ordered by location.
    pub fn packed(vertex: &ShaderPart) -> Self {
        let mut inputs: Vec<_> = vertex
            .reflection()
            .inputs
            .iter()
            .filter_map(|v| v.location.map(|loc| (loc, v.size)))
            .collect();
        inputs.sort_unstable_by_key(|(loc, _)| *loc);

        let mut offset = 0;
        let attributes = inputs
            .into_iter()
            .map(|(location, size)| {
                let attr = VertexAttribute {
                    location,
                    binding: 0,
                    offset,
                };
                offset += size;
                attr
            })
            .collect();
        Self {
            bindings: vec![VertexBindingLayout {
                binding: 0,
                stride: offset,
            }],
            attributes,
        }
    }

    pub fn attribute(&self, location: u32) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    pub fn stride(&self, binding: u32) -> Option<usize> {
        self.bindings
            .iter()
            .find(|b| b.binding == binding)
            .map(|b| b.stride)
    }
}

/// Arena address of one uniform block, shared by both stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformSlot {
    pub set: u32,
    pub binding: u32,
    pub addr: usize,
    pub size: usize,
}

/// Arena address of one sampler handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSlot {
    pub set: u32,
    pub binding: u32,
    pub addr: usize,
}

/// One vertex input and the buffer bytes that feed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexInputSlot {
    pub var: Id,
    pub location: u32,
    pub addr: usize,
    pub size: usize,
    pub attribute: VertexAttribute,
}

/// Corner and interpolated storage of one vertex output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSlots {
    pub var: Id,
    pub location: Option<u32>,
    /// Declared pointee type.
    pub pointee: Id,
    pub size: usize,
    /// Corners 0..3, then the interpolated value.
    pub slots: [usize; 4],
}

/// Where the clip-space position lands inside the vertex outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSlot {
    /// Index into [`StageLinkage::outputs`].
    pub output: usize,
    /// Byte offset of the `vec4` inside that output.
    pub offset: usize,
}

/// A fragment output variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentOutputSlot {
    pub var: Id,
    pub location: u32,
    pub addr: usize,
    pub pointee: Id,
    pub size: usize,
}

/// Fixed address assignment for one linked shader set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageLinkage {
    pub uniforms: Vec<UniformSlot>,
    pub samplers: Vec<SamplerSlot>,
    pub vertex_inputs: Vec<VertexInputSlot>,
    pub vertex_index: Option<usize>,
    pub instance_index: Option<usize>,
    pub outputs: Vec<OutputSlots>,
    pub position: Option<PositionSlot>,
    pub fragment_outputs: Vec<FragmentOutputSlot>,
    pub frag_coord: Option<usize>,
    /// Arena range holding both stages' `Private` globals, reinitialized per invocation.
    pub private: Range<usize>,
    /// Arena bytes used by the linked layout itself.
    pub layout_bytes: usize,
    /// Layout plus the larger of the two stages' local footprints.
    pub capacity: usize,
}

impl StageLinkage {
    pub fn uniform(&self, set: u32, binding: u32) -> Option<&UniformSlot> {
        self.uniforms
            .iter()
            .find(|u| u.set == set && u.binding == binding)
    }

    pub fn color_output(&self) -> Option<&FragmentOutputSlot> {
        self.fragment_outputs.iter().find(|o| o.location == 0)
    }
}

/// A linked vertex/fragment pair with its arena image.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    vertex: Arc<ShaderPart>,
    fragment: Arc<ShaderPart>,
    layout: VertexLayout,
    linkage: StageLinkage,
    vertex_globals: Globals,
    fragment_globals: Globals,
    initial: ShaderMemory,
    stage_mark: Mark,
}

impl ShaderSet {
    pub fn vertex(&self) -> &ShaderPart {
        &self.vertex
    }

    pub fn fragment(&self) -> &ShaderPart {
        &self.fragment
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    pub fn linkage(&self) -> &StageLinkage {
        &self.linkage
    }

    /// Arena image right after linking.
    pub fn initial_memory(&self) -> &ShaderMemory {
        &self.initial
    }

    /// Fresh arena for one draw.
    pub fn begin_draw(&self) -> ShaderMemory {
        self.initial.clone()
    }

    /// Stack position every stage invocation starts from.
    pub fn stage_mark(&self) -> Mark {
        self.stage_mark
    }

    /// Roll `memory` back to the stage mark and put `Private` globals back to their initializers.
    pub fn begin_invocation(&self, memory: &mut ShaderMemory) -> GpuResult<()> {
        memory.reset_to(self.stage_mark);
        let private = &self.linkage.private;
        if !private.is_empty() {
            memory.write(private.start, self.initial.slice(private.start, private.len())?)?;
        }
        Ok(())
    }

    pub fn vertex_invocation<'a>(&'a self, textures: &'a dyn TextureSource) -> Invocation<'a> {
        Invocation {
            program: self.vertex.program(),
            types: self.vertex.types(),
            globals: &self.vertex_globals,
            textures,
        }
    }

    pub fn fragment_invocation<'a>(&'a self, textures: &'a dyn TextureSource) -> Invocation<'a> {
        Invocation {
            program: self.fragment.program(),
            types: self.fragment.types(),
            globals: &self.fragment_globals,
            textures,
        }
    }
}

/// Link a vertex part to a fragment part.
///
/// `max_arena_bytes` bounds the layout plus the locals of the larger stage; exceeding it is
/// reported as [`GpuError::ArenaExhausted`].
#[tracing::instrument(skip_all, fields(vertex = vertex.hash(), fragment = fragment.hash()))]
pub fn link(
    vertex: Arc<ShaderPart>,
    fragment: Arc<ShaderPart>,
    layout: VertexLayout,
    max_arena_bytes: usize,
) -> GpuResult<ShaderSet> {
    if vertex.stage() != ShaderStage::Vertex {
        return Err(GpuError::link(format!(
            "first part is a {:?} stage, expected vertex",
            vertex.stage()
        )));
    }
    if fragment.stage() != ShaderStage::Fragment {
        return Err(GpuError::link(format!(
            "second part is a {:?} stage, expected fragment",
            fragment.stage()
        )));
    }

    let mut memory = ShaderMemory::with_limit(max_arena_bytes);
    let mut linker = Linker {
        vertex: &vertex,
        fragment: &fragment,
        layout: &layout,
        memory: &mut memory,
        vertex_globals: Globals::new(vertex.program().bound),
        fragment_globals: Globals::new(fragment.program().bound),
        linkage: StageLinkage::default(),
    };
    linker.constants()?;
    linker.resources()?;
    linker.vertex_outputs()?;
    linker.vertex_inputs()?;
    linker.fragment_inputs()?;
    linker.fragment_outputs()?;
    linker.module_private()?;
    let Linker {
        vertex_globals,
        fragment_globals,
        mut linkage,
        ..
    } = linker;

    let locals = local_footprint(vertex.program(), vertex.types(), vertex.entry())?.max(
        local_footprint(fragment.program(), fragment.types(), fragment.entry())?,
    );
    linkage.layout_bytes = memory.stack_pointer();
    linkage.capacity = linkage.layout_bytes + locals;
    if linkage.capacity > max_arena_bytes {
        return Err(GpuError::ArenaExhausted {
            requested: linkage.capacity,
            available: max_arena_bytes,
        });
    }
    memory.set_limit(linkage.capacity)?;

    tracing::debug!(
        layout_bytes = linkage.layout_bytes,
        capacity = linkage.capacity,
        uniforms = linkage.uniforms.len(),
        samplers = linkage.samplers.len(),
        varyings = linkage.outputs.len(),
        "linked shader set"
    );

    let stage_mark = memory.mark();
    Ok(ShaderSet {
        vertex,
        fragment,
        layout,
        linkage,
        vertex_globals,
        fragment_globals,
        initial: memory,
        stage_mark,
    })
}

struct Linker<'a> {
    vertex: &'a ShaderPart,
    fragment: &'a ShaderPart,
    layout: &'a VertexLayout,
    memory: &'a mut ShaderMemory,
    vertex_globals: Globals,
    fragment_globals: Globals,
    linkage: StageLinkage,
}

impl Linker<'_> {
    fn constants(&mut self) -> GpuResult<()> {
        self.vertex_globals.bind_constants(
            self.vertex.program(),
            self.vertex.types(),
            self.memory,
        )?;
        self.fragment_globals.bind_constants(
            self.fragment.program(),
            self.fragment.types(),
            self.memory,
        )
    }

    fn pointee(part: &ShaderPart, var: Id) -> GpuResult<(Id, usize)> {
        let v = part
            .program()
            .variables
            .get(&var)
            .ok_or_else(|| GpuError::link(format!("%{var} is not a global variable")))?;
        let (_, pointee) = part.program().pointee(v.ty)?;
        Ok((pointee, part.types().size(pointee)?))
    }

    /// Uniform blocks and sampler handles, shared by `(set, binding)` across both stages.
    fn resources(&mut self) -> GpuResult<()> {
        let mut uniforms: BTreeMap<(u32, u32), UniformSlot> = BTreeMap::new();
        let mut samplers: BTreeMap<(u32, u32), SamplerSlot> = BTreeMap::new();

        for (part, globals) in [
            (self.vertex, &mut self.vertex_globals),
            (self.fragment, &mut self.fragment_globals),
        ] {
            for u in &part.reflection().uniforms {
                let slot = match uniforms.get(&(u.set, u.binding)) {
                    Some(slot) if slot.size != u.size => {
                        return Err(GpuError::link(format!(
                            "uniform at set {} binding {} is {} bytes in one stage and {} in the other",
                            u.set, u.binding, slot.size, u.size
                        )));
                    }
                    Some(slot) => *slot,
                    None => {
                        let (pointee, size) = Self::pointee(part, u.id)?;
                        let info = self.memory.alloc(pointee, size)?;
                        let slot = UniformSlot {
                            set: u.set,
                            binding: u.binding,
                            addr: info.addr,
                            size,
                        };
                        uniforms.insert((u.set, u.binding), slot);
                        slot
                    }
                };
                globals.bind_variable(part.program(), u.id, slot.addr)?;
            }

            for t in &part.reflection().textures {
                let (pointee, size) = Self::pointee(part, t.id)?;
                if !matches!(
                    part.types().runtime(pointee)?,
                    RuntimeType::Image | RuntimeType::SampledImage
                ) {
                    return Err(GpuError::link(format!(
                        "uniform constant %{} at set {} binding {} is not an image",
                        t.id, t.set, t.binding
                    )));
                }
                let slot = match samplers.get(&(t.set, t.binding)) {
                    Some(slot) => *slot,
                    None => {
                        let info = self.memory.alloc(pointee, size)?;
                        let mut handle = [0u8; 8];
                        handle[..4].copy_from_slice(&t.set.to_le_bytes());
                        handle[4..].copy_from_slice(&t.binding.to_le_bytes());
                        self.memory.write(info.addr, &handle[..size.min(8)])?;
                        let slot = SamplerSlot {
                            set: t.set,
                            binding: t.binding,
                            addr: info.addr,
                        };
                        samplers.insert((t.set, t.binding), slot);
                        slot
                    }
                };
                globals.bind_variable(part.program(), t.id, slot.addr)?;
            }
        }

        self.linkage.uniforms = uniforms.into_values().collect();
        self.linkage.samplers = samplers.into_values().collect();
        Ok(())
    }

    fn vertex_outputs(&mut self) -> GpuResult<()> {
        let part = self.vertex;
        for out in &part.reflection().outputs {
            let (pointee, size) = Self::pointee(part, out.id)?;
            let runtime = part.types().runtime(pointee)?;
            if out.location.is_some() && !runtime.is_interpolatable() {
                return Err(GpuError::link(format!(
                    "vertex output at location {:?} has a non-interpolatable type {runtime:?}",
                    out.location
                )));
            }

            let mut slots = [0usize; 4];
            for slot in &mut slots {
                *slot = self.memory.alloc(pointee, size)?.addr;
            }
            self.vertex_globals
                .bind_variable(part.program(), out.id, slots[0])?;

            if let Some((BuiltIn::Position, member)) = builtin_of(part.program(), out.id)? {
                let (offset, ty) = match member {
                    Some(m) => part.types().element(pointee, m)?,
                    None => (0, pointee),
                };
                let vec4 = RuntimeType::Vector {
                    elem: Scalar::F32,
                    count: 4,
                };
                if *part.types().runtime(ty)? != vec4 {
                    return Err(GpuError::link("vertex position output is not a vec4"));
                }
                self.linkage.position = Some(PositionSlot {
                    output: self.linkage.outputs.len(),
                    offset,
                });
            }

            self.linkage.outputs.push(OutputSlots {
                var: out.id,
                location: out.location,
                pointee,
                size,
                slots,
            });
        }
        if self.linkage.position.is_none() {
            return Err(GpuError::link("vertex stage does not write a Position built-in"));
        }
        Ok(())
    }

    fn vertex_inputs(&mut self) -> GpuResult<()> {
        let part = self.vertex;
        for input in &part.reflection().inputs {
            let (pointee, size) = Self::pointee(part, input.id)?;
            let addr = self.memory.alloc(pointee, size)?.addr;
            self.vertex_globals
                .bind_variable(part.program(), input.id, addr)?;

            match builtin_of(part.program(), input.id)? {
                Some((BuiltIn::VertexIndex | BuiltIn::VertexId, _)) => {
                    self.linkage.vertex_index = Some(addr);
                }
                Some((BuiltIn::InstanceIndex | BuiltIn::InstanceId, _)) => {
                    self.linkage.instance_index = Some(addr);
                }
                Some((other, _)) => {
                    return Err(GpuError::link(format!(
                        "unsupported vertex input built-in {other:?}"
                    )));
                }
                None => {
                    let location = input.location.ok_or_else(|| {
                        GpuError::link(format!("vertex input %{} has no location", input.id))
                    })?;
                    let attribute = *self.layout.attribute(location).ok_or_else(|| {
                        GpuError::link(format!(
                            "vertex layout has no attribute for location {location}"
                        ))
                    })?;
                    if self.layout.stride(attribute.binding).is_none() {
                        return Err(GpuError::link(format!(
                            "vertex layout has no stride for binding {}",
                            attribute.binding
                        )));
                    }
                    self.linkage.vertex_inputs.push(VertexInputSlot {
                        var: input.id,
                        location,
                        addr,
                        size,
                        attribute,
                    });
                }
            }
        }
        Ok(())
    }

    /// Fragment inputs read the interpolated slot of the vertex output at the same location.
    fn fragment_inputs(&mut self) -> GpuResult<()> {
        let part = self.fragment;
        for input in &part.reflection().inputs {
            let (pointee, size) = Self::pointee(part, input.id)?;
            match builtin_of(part.program(), input.id)? {
                Some((BuiltIn::FragCoord, _)) => {
                    let addr = self.memory.alloc(pointee, size)?.addr;
                    self.fragment_globals
                        .bind_variable(part.program(), input.id, addr)?;
                    self.linkage.frag_coord = Some(addr);
                }
                Some((other, _)) => {
                    return Err(GpuError::link(format!(
                        "unsupported fragment input built-in {other:?}"
                    )));
                }
                None => {
                    let location = input.location.ok_or_else(|| {
                        GpuError::link(format!("fragment input %{} has no location", input.id))
                    })?;
                    let output = self
                        .linkage
                        .outputs
                        .iter()
                        .find(|o| o.location == Some(location))
                        .ok_or_else(|| {
                            GpuError::link(format!(
                                "fragment input at location {location} has no matching vertex output"
                            ))
                        })?;
                    if output.size != size {
                        return Err(GpuError::link(format!(
                            "location {location} is {} bytes in the vertex stage and {size} in the fragment stage",
                            output.size
                        )));
                    }
                    self.fragment_globals
                        .bind_variable(part.program(), input.id, output.slots[3])?;
                }
            }
        }
        Ok(())
    }

    fn fragment_outputs(&mut self) -> GpuResult<()> {
        let part = self.fragment;
        for out in &part.reflection().outputs {
            let location = out.location.ok_or_else(|| {
                GpuError::link(format!(
                    "fragment output %{} has no location (built-in outputs are unsupported)",
                    out.id
                ))
            })?;
            let (pointee, size) = Self::pointee(part, out.id)?;
            let addr = self.memory.alloc(pointee, size)?.addr;
            self.fragment_globals
                .bind_variable(part.program(), out.id, addr)?;
            self.linkage.fragment_outputs.push(FragmentOutputSlot {
                var: out.id,
                location,
                addr,
                pointee,
                size,
            });
        }
        if self.linkage.color_output().is_none() {
            return Err(GpuError::link("fragment stage has no output at location 0"));
        }
        Ok(())
    }

    /// Module-scope variables that are neither interface nor resource.
    fn module_private(&mut self) -> GpuResult<()> {
        let start = self.memory.stack_pointer();
        for (part, globals) in [
            (self.vertex, &mut self.vertex_globals),
            (self.fragment, &mut self.fragment_globals),
        ] {
            for (&id, var) in &part.program().variables {
                match var.storage {
                    StorageClass::Input
                    | StorageClass::Output
                    | StorageClass::Uniform
                    | StorageClass::UniformConstant => {}
                    StorageClass::Private | StorageClass::Workgroup => {
                        globals.allocate_variable(part.program(), part.types(), self.memory, id)?;
                    }
                    other => {
                        return Err(GpuError::link(format!(
                            "global %{id} uses unsupported storage class {other:?}"
                        )));
                    }
                }
            }
        }
        self.linkage.private = start..self.memory.stack_pointer();
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/linker.rs"]
mod tests;
