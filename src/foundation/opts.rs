/// Default ceiling on one shader set's arena, in bytes.
pub const DEFAULT_MAX_ARENA_BYTES: usize = 1 << 20;

/// Device-wide options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceOpts {
    /// Upper bound for a linked layout plus the locals of its larger stage.
    ///
    /// Defaults to `SOFTGPU_MAX_ARENA_BYTES` when set to a positive integer.
    pub max_arena_bytes: usize,
    /// Reuse compiled parts for identical bytecode.
    pub cache_shader_parts: bool,
}

impl Default for DeviceOpts {
    fn default() -> Self {
        let max_arena_bytes = std::env::var("SOFTGPU_MAX_ARENA_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_ARENA_BYTES);
        Self {
            max_arena_bytes,
            cache_shader_parts: true,
        }
    }
}
