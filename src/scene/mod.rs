//! JSON draw descriptions used by the `softgpu render` command.

/// Serde model of a scene file.
pub mod desc;
/// Drawing a scene through a [`crate::pipeline::device::Device`].
pub mod draw;
