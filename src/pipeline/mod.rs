/// Buffer capability trait and the host-memory implementation.
pub mod buffer;
/// Compile/link entry points and resource factories.
pub mod device;
/// Stage linking and shader sets.
pub mod linker;
/// Compiled, reflected shader stages.
pub mod part;
/// Color and depth/stencil textures.
pub mod texture;
