//! softgpu is a CPU-only programmable pipeline: it decodes a straight-line subset of SPIR-V,
//! interprets vertex and fragment programs against a flat byte arena, and rasterizes indexed
//! triangle lists with perspective-correct interpolation and depth/stencil testing.
//!
//! # Pipeline overview
//!
//! 1. **Compile**: bytecode -> [`ShaderPart`] (parsed program, type layouts, reflection)
//! 2. **Link**: vertex part + fragment part -> [`ShaderSet`] (fixed arena addresses for every
//!    interface variable, shared uniforms, sampler handles)
//! 3. **Draw**: [`CommandBuffer::draw_indexed`] runs the vertex program per corner, rasterizes,
//!    tests depth/stencil, interpolates varyings and runs the fragment program per pixel
//!
//! Control-flow opcodes are reported as [`GpuError::UnsupportedOpcode`]; programs must be
//! straight-line. Execution is single-threaded and synchronous.
#![forbid(unsafe_code)]

pub mod bytecode;
pub mod foundation;
pub mod pipeline;
pub mod raster;
pub mod runtime;
pub mod scene;

pub use foundation::core::{Extent, Rgba};
pub use foundation::error::{GpuError, GpuResult};
pub use foundation::opts::DeviceOpts;
pub use pipeline::buffer::{BufferMapping, BufferUsage, CpuBuffer, GpuBuffer};
pub use pipeline::device::Device;
pub use pipeline::linker::{
    ShaderSet, StageLinkage, VertexAttribute, VertexBindingLayout, VertexLayout,
};
pub use pipeline::part::{Reflection, ShaderPart, ShaderStage, compile};
pub use pipeline::texture::{DepthStencilTexel, DepthStencilTexture, Texture, TextureFormat};
pub use raster::command::{
    CommandBuffer, DrawStats, IndexFormat, PipelineState, PrimitiveTopology, RenderTarget,
};
pub use raster::depth_stencil::{
    CompareOp, DepthStencilState, DepthState, DepthTest, StencilOp, StencilState, StencilTest,
};
pub use scene::desc::{Scene, TextureBinding, TextureSpec, UniformData};
pub use scene::draw::SceneOutput;
