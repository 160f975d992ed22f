//! Named GPU resource registry
//!
//! Shaders, input layouts and constant buffers are registered under symbolic
//! names so the command language and the hot-reload watcher can refer to
//! them without holding device pointers. That indirection is what lets a
//! recompiled shader slot in under its name while every bind site keeps
//! working.
//!
//! The registry is the sole owner of every backend handle. Overwriting a
//! name, swapping in a recompiled shader and tearing the registry down all
//! release the handle they displace.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::backend::fs::SourceFiles;
use crate::backend::{InputLayoutDesc, RenderBackend, ResourceHandle, ShaderStage};
use crate::constants::shader as shader_defaults;
use crate::error::{EngineError, EngineResult, ResourceKind};

/// Entry points and target models used when compiling from source
#[derive(Debug, Clone)]
pub struct ShaderConfig {
    pub vertex_entry_point: String,
    pub vertex_model: String,
    pub pixel_entry_point: String,
    pub pixel_model: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex_entry_point: shader_defaults::VERTEX_ENTRY_POINT.to_string(),
            vertex_model: shader_defaults::VERTEX_MODEL.to_string(),
            pixel_entry_point: shader_defaults::PIXEL_ENTRY_POINT.to_string(),
            pixel_model: shader_defaults::PIXEL_MODEL.to_string(),
        }
    }
}

/// A compiled shader tracked by name
struct ShaderEntry {
    source_path: PathBuf,
    handle: ResourceHandle,
    /// Source write time when the current handle was built. Gates the
    /// hot-reload recompile for this entry alone.
    last_write: SystemTime,
}

struct BufferEntry {
    handle: ResourceHandle,
    byte_width: u32,
}

/// Last-bound resource names, re-applied after a device reset
#[derive(Debug, Clone, Default)]
pub struct ActiveSelection {
    pub vertex_shader: Option<String>,
    pub pixel_shader: Option<String>,
    pub input_layout: Option<String>,
}

/// Name-keyed owner of the live rendering resources.
pub struct ShaderRegistry {
    backend: Box<dyn RenderBackend>,
    sources: Box<dyn SourceFiles>,
    config: ShaderConfig,
    vertex_shaders: HashMap<String, ShaderEntry>,
    pixel_shaders: HashMap<String, ShaderEntry>,
    input_layouts: HashMap<String, ResourceHandle>,
    constant_buffers: HashMap<String, BufferEntry>,
    active: ActiveSelection,
}

impl ShaderRegistry {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        sources: Box<dyn SourceFiles>,
        config: ShaderConfig,
    ) -> Self {
        Self {
            backend,
            sources,
            config,
            vertex_shaders: HashMap::new(),
            pixel_shaders: HashMap::new(),
            input_layouts: HashMap::new(),
            constant_buffers: HashMap::new(),
            active: ActiveSelection::default(),
        }
    }

    /// Compile a vertex shader from source and register it under `name`.
    ///
    /// On compile failure the previous entry, if any, is left untouched.
    pub fn add_vertex_shader(&mut self, name: &str, path: &Path) -> EngineResult<()> {
        let handle = self
            .backend
            .compile_vertex_shader(path, &self.config.vertex_entry_point, &self.config.vertex_model)
            .map_err(|e| EngineError::CompileFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        self.insert_vertex_entry(name, path, handle);
        Ok(())
    }

    /// Compile a pixel shader from source and register it under `name`.
    pub fn add_pixel_shader(&mut self, name: &str, path: &Path) -> EngineResult<()> {
        let handle = self
            .backend
            .compile_pixel_shader(path, &self.config.pixel_entry_point, &self.config.pixel_model)
            .map_err(|e| EngineError::CompileFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        self.insert_pixel_entry(name, path, handle);
        Ok(())
    }

    /// Register a vertex shader from a precompiled binary.
    pub fn add_vertex_shader_precompiled(&mut self, name: &str, path: &Path) -> EngineResult<()> {
        let handle = self
            .backend
            .load_vertex_shader_binary(path)
            .map_err(|e| EngineError::LoadFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        self.insert_vertex_entry(name, path, handle);
        Ok(())
    }

    /// Register a pixel shader from a precompiled binary.
    pub fn add_pixel_shader_precompiled(&mut self, name: &str, path: &Path) -> EngineResult<()> {
        let handle = self
            .backend
            .load_pixel_shader_binary(path)
            .map_err(|e| EngineError::LoadFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        self.insert_pixel_entry(name, path, handle);
        Ok(())
    }

    /// Build an input layout from the source of an already-registered
    /// vertex shader.
    ///
    /// The layout captures the shader source as it is now; it keeps no link
    /// back to the shader entry afterwards.
    pub fn add_input_layout(
        &mut self,
        name: &str,
        shader_name: &str,
        desc: &InputLayoutDesc,
    ) -> EngineResult<()> {
        let path = self.vertex_source_path(shader_name)?;
        let handle = self
            .backend
            .compile_input_layout(
                &path,
                &self.config.vertex_entry_point,
                &self.config.vertex_model,
                desc,
            )
            .map_err(|e| EngineError::CompileFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        if let Some(old) = self.input_layouts.insert(name.to_string(), handle) {
            self.backend.release(old);
        }
        log::debug!("added input layout '{}' from shader '{}'", name, shader_name);
        Ok(())
    }

    /// Build an input layout from a registered vertex shader's precompiled
    /// binary.
    pub fn add_input_layout_precompiled(
        &mut self,
        name: &str,
        shader_name: &str,
        desc: &InputLayoutDesc,
    ) -> EngineResult<()> {
        let path = self.vertex_source_path(shader_name)?;
        let handle = self
            .backend
            .load_input_layout_binary(&path, desc)
            .map_err(|e| EngineError::LoadFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        if let Some(old) = self.input_layouts.insert(name.to_string(), handle) {
            self.backend.release(old);
        }
        log::debug!("added input layout '{}' from shader '{}'", name, shader_name);
        Ok(())
    }

    /// Allocate a constant buffer of `byte_width` bytes under `name`.
    pub fn add_constant_buffer(&mut self, name: &str, byte_width: u32) -> EngineResult<()> {
        let handle = self
            .backend
            .allocate_constant_buffer(byte_width)
            .map_err(|e| EngineError::AllocationFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        let entry = BufferEntry { handle, byte_width };
        if let Some(old) = self.constant_buffers.insert(name.to_string(), entry) {
            self.backend.release(old.handle);
        }
        log::debug!("added constant buffer '{}' ({} bytes)", name, byte_width);
        Ok(())
    }

    /// Bind the named vertex shader and record it as active.
    ///
    /// An unregistered name binds a null shader; the name is recorded as
    /// active either way so a later load can take effect on refresh.
    pub fn activate_vertex_shader(&mut self, name: &str) {
        let handle = self.vertex_shaders.get(name).map(|e| &e.handle);
        if handle.is_none() {
            log::debug!("activating unknown vertex shader '{}' binds null", name);
        }
        self.backend.bind_vertex_shader(handle);
        self.active.vertex_shader = Some(name.to_string());
    }

    /// Bind the named pixel shader and record it as active.
    pub fn activate_pixel_shader(&mut self, name: &str) {
        let handle = self.pixel_shaders.get(name).map(|e| &e.handle);
        if handle.is_none() {
            log::debug!("activating unknown pixel shader '{}' binds null", name);
        }
        self.backend.bind_pixel_shader(handle);
        self.active.pixel_shader = Some(name.to_string());
    }

    /// Bind the named input layout and record it as active.
    pub fn activate_input_layout(&mut self, name: &str) {
        let handle = self.input_layouts.get(name);
        if handle.is_none() {
            log::debug!("activating unknown input layout '{}' binds null", name);
        }
        self.backend.bind_input_layout(handle);
        self.active.input_layout = Some(name.to_string());
    }

    /// Write `data` into the named buffer and bind it at `slot` for `stage`.
    ///
    /// The blob must be exactly the byte width the buffer was created with.
    pub fn update_constant_buffer(
        &mut self,
        name: &str,
        stage: ShaderStage,
        data: &[u8],
        slot: u32,
    ) -> EngineResult<()> {
        let entry = match self.constant_buffers.get(name) {
            Some(entry) => entry,
            None => {
                return Err(EngineError::UnknownResource {
                    kind: ResourceKind::ConstantBuffer,
                    name: name.to_string(),
                })
            }
        };
        if data.len() != entry.byte_width as usize {
            return Err(EngineError::BufferSize {
                name: name.to_string(),
                expected: entry.byte_width,
                actual: data.len(),
            });
        }
        self.backend
            .update_and_bind_constant_buffer(&entry.handle, data, slot, stage);
        Ok(())
    }

    /// Update a constant buffer from any plain-old-data value.
    pub fn update_constant_buffer_with<T: bytemuck::NoUninit>(
        &mut self,
        name: &str,
        stage: ShaderStage,
        value: &T,
        slot: u32,
    ) -> EngineResult<()> {
        self.update_constant_buffer(name, stage, bytemuck::bytes_of(value), slot)
    }

    /// Re-issue the recorded activations.
    ///
    /// Used after a device or surface reset invalidated the pipeline
    /// bindings without invalidating the resources themselves.
    pub fn refresh_active(&mut self) {
        if let Some(name) = self.active.vertex_shader.clone() {
            self.activate_vertex_shader(&name);
        }
        if let Some(name) = self.active.pixel_shader.clone() {
            self.activate_pixel_shader(&name);
        }
        if let Some(name) = self.active.input_layout.clone() {
            self.activate_input_layout(&name);
        }
    }

    /// Rebuild the named vertex shader if its source changed on disk.
    ///
    /// Returns `Ok(true)` when the live handle was replaced. A locked source
    /// file or a write time no newer than the entry's is a skip, not an
    /// error. A failed compile keeps the old handle and timestamp so the
    /// next poll retries.
    pub fn recompile_vertex_shader(&mut self, name: &str) -> EngineResult<bool> {
        let entry = match self.vertex_shaders.get_mut(name) {
            Some(entry) => entry,
            None => {
                return Err(EngineError::UnknownResource {
                    kind: ResourceKind::VertexShader,
                    name: name.to_string(),
                })
            }
        };
        if self.sources.is_locked(&entry.source_path) {
            return Ok(false);
        }
        let write_time = match self.sources.last_write_time(&entry.source_path) {
            Some(time) => time,
            None => return Ok(false),
        };
        if write_time <= entry.last_write {
            return Ok(false);
        }
        let new_handle = self
            .backend
            .compile_vertex_shader(
                &entry.source_path,
                &self.config.vertex_entry_point,
                &self.config.vertex_model,
            )
            .map_err(|e| EngineError::CompileFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        let old = std::mem::replace(&mut entry.handle, new_handle);
        entry.last_write = write_time;
        self.backend.release(old);
        log::info!("reloaded vertex shader '{}'", name);
        Ok(true)
    }

    /// Rebuild the named pixel shader if its source changed on disk.
    pub fn recompile_pixel_shader(&mut self, name: &str) -> EngineResult<bool> {
        let entry = match self.pixel_shaders.get_mut(name) {
            Some(entry) => entry,
            None => {
                return Err(EngineError::UnknownResource {
                    kind: ResourceKind::PixelShader,
                    name: name.to_string(),
                })
            }
        };
        if self.sources.is_locked(&entry.source_path) {
            return Ok(false);
        }
        let write_time = match self.sources.last_write_time(&entry.source_path) {
            Some(time) => time,
            None => return Ok(false),
        };
        if write_time <= entry.last_write {
            return Ok(false);
        }
        let new_handle = self
            .backend
            .compile_pixel_shader(
                &entry.source_path,
                &self.config.pixel_entry_point,
                &self.config.pixel_model,
            )
            .map_err(|e| EngineError::CompileFailed {
                name: name.to_string(),
                error: e.to_string(),
            })?;
        let old = std::mem::replace(&mut entry.handle, new_handle);
        entry.last_write = write_time;
        self.backend.release(old);
        log::info!("reloaded pixel shader '{}'", name);
        Ok(true)
    }

    /// Release every backend handle and empty the registry.
    ///
    /// Teardown only; the registry holds nothing afterwards.
    pub fn release_all(&mut self) {
        for (_, entry) in self.vertex_shaders.drain() {
            self.backend.release(entry.handle);
        }
        for (_, entry) in self.pixel_shaders.drain() {
            self.backend.release(entry.handle);
        }
        for (_, handle) in self.input_layouts.drain() {
            self.backend.release(handle);
        }
        for (_, entry) in self.constant_buffers.drain() {
            self.backend.release(entry.handle);
        }
        self.active = ActiveSelection::default();
        log::info!("released all shader resources");
    }

    pub fn vertex_shader(&self, name: &str) -> Option<&ResourceHandle> {
        self.vertex_shaders.get(name).map(|e| &e.handle)
    }

    pub fn pixel_shader(&self, name: &str) -> Option<&ResourceHandle> {
        self.pixel_shaders.get(name).map(|e| &e.handle)
    }

    pub fn input_layout(&self, name: &str) -> Option<&ResourceHandle> {
        self.input_layouts.get(name)
    }

    pub fn constant_buffer(&self, name: &str) -> Option<&ResourceHandle> {
        self.constant_buffers.get(name).map(|e| &e.handle)
    }

    /// Source path a vertex shader was registered from.
    pub fn vertex_shader_source(&self, name: &str) -> Option<&Path> {
        self.vertex_shaders.get(name).map(|e| e.source_path.as_path())
    }

    pub fn active(&self) -> &ActiveSelection {
        &self.active
    }

    pub fn vertex_shader_names(&self) -> Vec<String> {
        self.vertex_shaders.keys().cloned().collect()
    }

    pub fn pixel_shader_names(&self) -> Vec<String> {
        self.pixel_shaders.keys().cloned().collect()
    }

    pub fn input_layout_names(&self) -> Vec<String> {
        self.input_layouts.keys().cloned().collect()
    }

    pub fn constant_buffer_names(&self) -> Vec<String> {
        self.constant_buffers.keys().cloned().collect()
    }

    fn vertex_source_path(&self, shader_name: &str) -> EngineResult<PathBuf> {
        match self.vertex_shaders.get(shader_name) {
            Some(entry) if !entry.source_path.as_os_str().is_empty() => {
                Ok(entry.source_path.clone())
            }
            _ => Err(EngineError::UnknownResource {
                kind: ResourceKind::VertexShader,
                name: shader_name.to_string(),
            }),
        }
    }

    fn insert_vertex_entry(&mut self, name: &str, path: &Path, handle: ResourceHandle) {
        let entry = ShaderEntry {
            source_path: path.to_path_buf(),
            handle,
            last_write: self.stamp(path),
        };
        if let Some(old) = self.vertex_shaders.insert(name.to_string(), entry) {
            self.backend.release(old.handle);
        }
        log::debug!("added vertex shader '{}' from {}", name, path.display());
    }

    fn insert_pixel_entry(&mut self, name: &str, path: &Path, handle: ResourceHandle) {
        let entry = ShaderEntry {
            source_path: path.to_path_buf(),
            handle,
            last_write: self.stamp(path),
        };
        if let Some(old) = self.pixel_shaders.insert(name.to_string(), entry) {
            self.backend.release(old.handle);
        }
        log::debug!("added pixel shader '{}' from {}", name, path.display());
    }

    fn stamp(&self, path: &Path) -> SystemTime {
        self.sources
            .last_write_time(path)
            .unwrap_or_else(SystemTime::now)
    }
}
