//! Shader execution: runtime types, the byte arena, call frames and the interpreter.

/// Interpreter loop.
pub mod exec;
/// Bump-allocated shader memory.
pub mod memory;
/// Global and per-call id bindings.
pub mod scope;
/// Runtime type descriptors.
pub mod types;
