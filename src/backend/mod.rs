//! Rendering backend capability
//!
//! The engine core never talks to a graphics API directly. Everything that
//! compiles, allocates, binds or frees a device resource goes through the
//! [`RenderBackend`] trait, and the shader registry is the sole owner of
//! every [`ResourceHandle`] a backend issues. Swapping a real device for the
//! [`headless`] recorder is how the test suite and the `config_check` tool
//! run without a GPU.

pub mod fs;
pub mod headless;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

/// Failure reported by a backend operation
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

pub type BackendResult<T> = Result<T, BackendError>;

/// Pipeline stage a constant buffer is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// Owned reference to a backend resource.
///
/// Move-only on purpose: a handle is released exactly once by passing it
/// back to [`RenderBackend::release`], and forbidding `Clone`/`Copy` makes a
/// double release unrepresentable. The registry owns every live handle; one
/// reaching `Drop` without a release is a leak and gets logged.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u64);

impl ResourceHandle {
    /// Mint a handle for a freshly created backend resource.
    pub fn from_raw(raw: u64) -> Self {
        ResourceHandle(raw)
    }

    /// The backend-side id, for logging and diagnostics.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Consume the handle without running the leak diagnostic.
    ///
    /// Backends call this inside `release` once the underlying resource is
    /// actually freed.
    pub fn into_raw(self) -> u64 {
        let raw = self.0;
        std::mem::forget(self);
        raw
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        log::warn!("resource handle {} dropped without backend release", self.0);
    }
}

/// Error from parsing an input layout descriptor string
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct LayoutParseError(pub String);

/// Data format of a single vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeFormat {
    Float,
    Float2,
    Float3,
    Float4,
    Uint,
    Uint4,
}

impl AttributeFormat {
    pub fn byte_size(&self) -> u32 {
        match self {
            AttributeFormat::Float | AttributeFormat::Uint => 4,
            AttributeFormat::Float2 => 8,
            AttributeFormat::Float3 => 12,
            AttributeFormat::Float4 | AttributeFormat::Uint4 => 16,
        }
    }
}

impl std::str::FromStr for AttributeFormat {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "float" => Ok(AttributeFormat::Float),
            "float2" => Ok(AttributeFormat::Float2),
            "float3" => Ok(AttributeFormat::Float3),
            "float4" => Ok(AttributeFormat::Float4),
            "uint" => Ok(AttributeFormat::Uint),
            "uint4" => Ok(AttributeFormat::Uint4),
            other => Err(LayoutParseError(format!(
                "unknown attribute format '{}'",
                other
            ))),
        }
    }
}

/// One vertex attribute in an input layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputElement {
    pub semantic: String,
    pub format: AttributeFormat,
}

/// Vertex input layout description.
///
/// Parsed from the config form `SEMANTIC:format` with elements separated by
/// `;`, e.g. `POSITION:float3;COLOR:float4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayoutDesc {
    pub elements: Vec<InputElement>,
}

impl InputLayoutDesc {
    pub fn new(elements: Vec<InputElement>) -> Self {
        InputLayoutDesc { elements }
    }

    /// Total byte stride of one vertex under this layout.
    pub fn stride(&self) -> u32 {
        self.elements.iter().map(|e| e.format.byte_size()).sum()
    }
}

impl std::str::FromStr for InputLayoutDesc {
    type Err = LayoutParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut elements = Vec::new();
        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (semantic, format) = match part.split_once(':') {
                Some(split) => split,
                None => {
                    return Err(LayoutParseError(format!(
                        "layout element '{}' is missing a ':format' suffix",
                        part
                    )))
                }
            };
            elements.push(InputElement {
                semantic: semantic.trim().to_string(),
                format: format.trim().parse()?,
            });
        }
        if elements.is_empty() {
            return Err(LayoutParseError("layout has no elements".to_string()));
        }
        Ok(InputLayoutDesc { elements })
    }
}

/// Narrow interface onto the graphics device.
///
/// Compile and load operations hand back an owned [`ResourceHandle`] or a
/// [`BackendError`]; bind operations accept `None` to bind a null resource,
/// which is how activation of an unregistered name behaves.
pub trait RenderBackend {
    fn compile_vertex_shader(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
    ) -> BackendResult<ResourceHandle>;

    fn compile_pixel_shader(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
    ) -> BackendResult<ResourceHandle>;

    fn load_vertex_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle>;

    fn load_pixel_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle>;

    fn compile_input_layout(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
        desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle>;

    fn load_input_layout_binary(
        &mut self,
        path: &Path,
        desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle>;

    fn allocate_constant_buffer(&mut self, byte_width: u32) -> BackendResult<ResourceHandle>;

    fn bind_vertex_shader(&mut self, handle: Option<&ResourceHandle>);

    fn bind_pixel_shader(&mut self, handle: Option<&ResourceHandle>);

    fn bind_input_layout(&mut self, handle: Option<&ResourceHandle>);

    fn update_and_bind_constant_buffer(
        &mut self,
        handle: &ResourceHandle,
        data: &[u8],
        slot: u32,
        stage: ShaderStage,
    );

    fn release(&mut self, handle: ResourceHandle);
}

/// Forwarding impl so a single-threaded caller can keep a second reference
/// to a backend the registry owns and inspect it afterwards.
impl<B: RenderBackend> RenderBackend for Rc<RefCell<B>> {
    fn compile_vertex_shader(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
    ) -> BackendResult<ResourceHandle> {
        self.borrow_mut().compile_vertex_shader(path, entry_point, model)
    }

    fn compile_pixel_shader(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
    ) -> BackendResult<ResourceHandle> {
        self.borrow_mut().compile_pixel_shader(path, entry_point, model)
    }

    fn load_vertex_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle> {
        self.borrow_mut().load_vertex_shader_binary(path)
    }

    fn load_pixel_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle> {
        self.borrow_mut().load_pixel_shader_binary(path)
    }

    fn compile_input_layout(
        &mut self,
        path: &Path,
        entry_point: &str,
        model: &str,
        desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle> {
        self.borrow_mut()
            .compile_input_layout(path, entry_point, model, desc)
    }

    fn load_input_layout_binary(
        &mut self,
        path: &Path,
        desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle> {
        self.borrow_mut().load_input_layout_binary(path, desc)
    }

    fn allocate_constant_buffer(&mut self, byte_width: u32) -> BackendResult<ResourceHandle> {
        self.borrow_mut().allocate_constant_buffer(byte_width)
    }

    fn bind_vertex_shader(&mut self, handle: Option<&ResourceHandle>) {
        self.borrow_mut().bind_vertex_shader(handle)
    }

    fn bind_pixel_shader(&mut self, handle: Option<&ResourceHandle>) {
        self.borrow_mut().bind_pixel_shader(handle)
    }

    fn bind_input_layout(&mut self, handle: Option<&ResourceHandle>) {
        self.borrow_mut().bind_input_layout(handle)
    }

    fn update_and_bind_constant_buffer(
        &mut self,
        handle: &ResourceHandle,
        data: &[u8],
        slot: u32,
        stage: ShaderStage,
    ) {
        self.borrow_mut()
            .update_and_bind_constant_buffer(handle, data, slot, stage)
    }

    fn release(&mut self, handle: ResourceHandle) {
        self.borrow_mut().release(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_desc_parses_elements() {
        let desc: InputLayoutDesc = "POSITION:float3;COLOR:float4".parse().unwrap();
        assert_eq!(desc.elements.len(), 2);
        assert_eq!(desc.elements[0].semantic, "POSITION");
        assert_eq!(desc.elements[0].format, AttributeFormat::Float3);
        assert_eq!(desc.elements[1].format, AttributeFormat::Float4);
        assert_eq!(desc.stride(), 28);
    }

    #[test]
    fn layout_desc_trims_and_skips_empty_parts() {
        let desc: InputLayoutDesc = " POSITION : float3 ; ".parse().unwrap();
        assert_eq!(desc.elements.len(), 1);
        assert_eq!(desc.elements[0].semantic, "POSITION");
    }

    #[test]
    fn layout_desc_rejects_bad_input() {
        assert!("".parse::<InputLayoutDesc>().is_err());
        assert!("POSITION".parse::<InputLayoutDesc>().is_err());
        assert!("POSITION:vec3".parse::<InputLayoutDesc>().is_err());
    }

    #[test]
    fn handle_into_raw_skips_leak_warning() {
        let handle = ResourceHandle::from_raw(7);
        assert_eq!(handle.raw(), 7);
        assert_eq!(handle.into_raw(), 7);
    }
}
