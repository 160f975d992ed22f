//! Engine error handling
//!
//! One error type shared by the registry, hot-reload, command and config
//! subsystems. Nothing in this core is fatal: callers log a failure and keep
//! the frame loop running, but every failure is an inspectable value rather
//! than a silent no-op.

use thiserror::Error;

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

/// Which registry collection a name was resolved against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    VertexShader,
    PixelShader,
    InputLayout,
    ConstantBuffer,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::VertexShader => "vertex shader",
            ResourceKind::PixelShader => "pixel shader",
            ResourceKind::InputLayout => "input layout",
            ResourceKind::ConstantBuffer => "constant buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("shader compilation failed for '{name}': {error}")]
    CompileFailed { name: String, error: String },

    #[error("failed to load shader binary for '{name}': {error}")]
    LoadFailed { name: String, error: String },

    #[error("buffer allocation failed for '{name}': {error}")]
    AllocationFailed { name: String, error: String },

    #[error("unknown {kind} '{name}'")]
    UnknownResource { kind: ResourceKind, name: String },

    #[error("constant buffer '{name}' holds {expected} bytes, update supplied {actual}")]
    BufferSize {
        name: String,
        expected: u32,
        actual: usize,
    },

    #[error("unknown command '{verb}'")]
    UnknownCommand { verb: String },

    #[error("malformed command '{verb}': {reason}")]
    MalformedCommand { verb: String, reason: String },

    #[error("failed to read config '{path}': {error}")]
    ConfigRead { path: String, error: String },
}
