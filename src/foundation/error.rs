pub type GpuResult<T> = Result<T, GpuError>;

#[derive(thiserror::Error, Debug)]
pub enum GpuError {
    #[error("malformed bytecode: {0}")]
    MalformedBytecode(String),

    #[error("unsupported opcode {opcode}{}", .name.as_deref().map(|n| format!(" (Op{n})")).unwrap_or_default())]
    UnsupportedOpcode { opcode: u16, name: Option<String> },

    #[error("shader arena exhausted: requested {requested} bytes, {available} available")]
    ArenaExhausted { requested: usize, available: usize },

    #[error("unsupported topology: {0}")]
    UnsupportedTopology(String),

    #[error("link error: {0}")]
    Link(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GpuError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedBytecode(msg.into())
    }

    pub fn unsupported_opcode(opcode: u16) -> Self {
        let name = spirv::Op::from_u32(u32::from(opcode)).map(|op| format!("{op:?}"));
        Self::UnsupportedOpcode { opcode, name }
    }

    pub fn link(msg: impl Into<String>) -> Self {
        Self::Link(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
