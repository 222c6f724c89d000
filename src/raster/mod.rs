/// Screen-space barycentric weights and perspective correction.
pub mod barycentric;
/// Command buffer, render targets and the triangle loop.
pub mod command;
/// Depth/stencil fixed-function state.
pub mod depth_stencil;
