//! Device-free backend for tooling and tests.
//!
//! Issues sequential handles and records every call instead of touching a
//! GPU. The `config_check` tool replays configs against it; the test suite
//! asserts on its operation log. Compilation of chosen paths can be forced
//! to fail to exercise the recovery paths.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{
    BackendError, BackendResult, InputLayoutDesc, RenderBackend, ResourceHandle, ShaderStage,
};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    CompileVertexShader(PathBuf),
    CompilePixelShader(PathBuf),
    LoadVertexShaderBinary(PathBuf),
    LoadPixelShaderBinary(PathBuf),
    CompileInputLayout(PathBuf),
    LoadInputLayoutBinary(PathBuf),
    AllocateConstantBuffer(u32),
    BindVertexShader(Option<u64>),
    BindPixelShader(Option<u64>),
    BindInputLayout(Option<u64>),
    UpdateConstantBuffer {
        id: u64,
        len: usize,
        slot: u32,
        stage: ShaderStage,
    },
    Release(u64),
}

impl BackendOp {
    /// Whether this op created a resource (compile, load or allocate).
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            BackendOp::CompileVertexShader(_)
                | BackendOp::CompilePixelShader(_)
                | BackendOp::LoadVertexShaderBinary(_)
                | BackendOp::LoadPixelShaderBinary(_)
                | BackendOp::CompileInputLayout(_)
                | BackendOp::LoadInputLayoutBinary(_)
                | BackendOp::AllocateConstantBuffer(_)
        )
    }
}

/// Recording backend that never touches a device.
#[derive(Default)]
pub struct HeadlessBackend {
    next_id: u64,
    live: HashSet<u64>,
    /// Every call, in issue order
    pub ops: Vec<BackendOp>,
    /// Paths whose compile/load is forced to fail
    pub fail_paths: HashSet<PathBuf>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        HeadlessBackend::default()
    }

    /// Force every compile or load of `path` to fail.
    pub fn fail_path(&mut self, path: impl AsRef<Path>) {
        self.fail_paths.insert(path.as_ref().to_path_buf());
    }

    /// Number of handles issued and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.len()
    }

    /// Number of recorded resource-creation calls, attempts included.
    pub fn creation_calls(&self) -> usize {
        self.ops.iter().filter(|op| op.is_creation()).count()
    }

    fn issue(&mut self) -> ResourceHandle {
        self.next_id += 1;
        self.live.insert(self.next_id);
        ResourceHandle::from_raw(self.next_id)
    }

    fn check(&self, path: &Path) -> BackendResult<()> {
        if self.fail_paths.contains(path) {
            Err(BackendError(format!(
                "forced failure for {}",
                path.display()
            )))
        } else {
            Ok(())
        }
    }
}

impl RenderBackend for HeadlessBackend {
    fn compile_vertex_shader(
        &mut self,
        path: &Path,
        _entry_point: &str,
        _model: &str,
    ) -> BackendResult<ResourceHandle> {
        self.ops.push(BackendOp::CompileVertexShader(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn compile_pixel_shader(
        &mut self,
        path: &Path,
        _entry_point: &str,
        _model: &str,
    ) -> BackendResult<ResourceHandle> {
        self.ops.push(BackendOp::CompilePixelShader(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn load_vertex_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle> {
        self.ops
            .push(BackendOp::LoadVertexShaderBinary(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn load_pixel_shader_binary(&mut self, path: &Path) -> BackendResult<ResourceHandle> {
        self.ops
            .push(BackendOp::LoadPixelShaderBinary(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn compile_input_layout(
        &mut self,
        path: &Path,
        _entry_point: &str,
        _model: &str,
        _desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle> {
        self.ops.push(BackendOp::CompileInputLayout(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn load_input_layout_binary(
        &mut self,
        path: &Path,
        _desc: &InputLayoutDesc,
    ) -> BackendResult<ResourceHandle> {
        self.ops
            .push(BackendOp::LoadInputLayoutBinary(path.to_path_buf()));
        self.check(path)?;
        Ok(self.issue())
    }

    fn allocate_constant_buffer(&mut self, byte_width: u32) -> BackendResult<ResourceHandle> {
        self.ops.push(BackendOp::AllocateConstantBuffer(byte_width));
        Ok(self.issue())
    }

    fn bind_vertex_shader(&mut self, handle: Option<&ResourceHandle>) {
        self.ops
            .push(BackendOp::BindVertexShader(handle.map(|h| h.raw())));
    }

    fn bind_pixel_shader(&mut self, handle: Option<&ResourceHandle>) {
        self.ops
            .push(BackendOp::BindPixelShader(handle.map(|h| h.raw())));
    }

    fn bind_input_layout(&mut self, handle: Option<&ResourceHandle>) {
        self.ops
            .push(BackendOp::BindInputLayout(handle.map(|h| h.raw())));
    }

    fn update_and_bind_constant_buffer(
        &mut self,
        handle: &ResourceHandle,
        data: &[u8],
        slot: u32,
        stage: ShaderStage,
    ) {
        self.ops.push(BackendOp::UpdateConstantBuffer {
            id: handle.raw(),
            len: data.len(),
            slot,
            stage,
        });
    }

    fn release(&mut self, handle: ResourceHandle) {
        let id = handle.into_raw();
        if !self.live.remove(&id) {
            log::warn!("headless backend released unknown handle {}", id);
        }
        self.ops.push(BackendOp::Release(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issues_sequential_handles() {
        let mut backend = HeadlessBackend::new();
        let first = backend
            .compile_vertex_shader(Path::new("a.vs"), "main", "vs_5_0")
            .unwrap();
        let second = backend
            .compile_pixel_shader(Path::new("b.ps"), "main", "ps_5_0")
            .unwrap();
        assert_eq!(first.raw(), 1);
        assert_eq!(second.raw(), 2);
        assert_eq!(backend.live_handles(), 2);

        backend.release(first);
        backend.release(second);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn forced_failure_records_the_attempt() {
        let mut backend = HeadlessBackend::new();
        backend.fail_path("bad.vs");

        let result = backend.compile_vertex_shader(Path::new("bad.vs"), "main", "vs_5_0");
        assert!(result.is_err());
        assert_eq!(backend.creation_calls(), 1);
        assert_eq!(backend.live_handles(), 0);
    }
}
