//! Shader bytecode: decoding, the parsed object graph, and hand assembly.

/// Hand assembler for test and demo modules.
pub mod emit;
/// Executable instruction set.
pub mod instr;
/// Parsed program tables.
pub mod module;
/// Binary decoder and validator.
pub mod parser;
/// Canned shader modules.
pub mod presets;
pub(crate) mod words;
