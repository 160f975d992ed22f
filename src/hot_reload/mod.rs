//! Shader hot-reload
//!
//! A polling state machine layered on the shader registry. Once per frame
//! the owning loop calls [`ShaderWatcher::poll`], which re-checks source
//! write times and swaps recompiled shader objects into the registry while
//! rendering keeps running. Watching covers either one named shader or the
//! whole registry; a locked source file or an unchanged write time skips
//! the cycle, and a failed compile leaves the old shader bound so the next
//! poll retries.


use crate::backend::ShaderStage;
use crate::shaders::ShaderRegistry;

/// What the watcher is currently tracking
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WatchMode {
    #[default]
    Off,
    /// A single shader in one stage
    One { name: String, stage: ShaderStage },
    /// Every vertex and pixel shader in the registry
    All,
}

/// Drives shader recompilation from the frame loop.
#[derive(Debug, Default)]
pub struct ShaderWatcher {
    mode: WatchMode,
}

impl ShaderWatcher {
    pub fn new() -> Self {
        ShaderWatcher::default()
    }

    /// Watch a single shader. Replaces any previous watch target.
    pub fn watch(&mut self, name: &str, stage: ShaderStage) {
        log::info!("watching {:?} shader '{}' for changes", stage, name);
        self.mode = WatchMode::One {
            name: name.to_string(),
            stage,
        };
    }

    /// Watch every registered vertex and pixel shader.
    pub fn watch_all(&mut self) {
        log::info!("watching all shaders for changes");
        self.mode = WatchMode::All;
    }

    /// Stop watching entirely.
    pub fn stop(&mut self) {
        log::info!("shader watching stopped");
        self.mode = WatchMode::Off;
    }

    pub fn mode(&self) -> &WatchMode {
        &self.mode
    }

    /// Run one poll cycle against the registry.
    ///
    /// Called once per frame by the owning loop, between input processing
    /// and rendering. Returns the number of shaders replaced this cycle;
    /// recoverable failures are logged and do not stop the sweep.
    pub fn poll(&self, shaders: &mut ShaderRegistry) -> usize {
        match &self.mode {
            WatchMode::Off => 0,
            WatchMode::All => {
                let mut reloaded = 0;
                for name in shaders.vertex_shader_names() {
                    match shaders.recompile_vertex_shader(&name) {
                        Ok(true) => reloaded += 1,
                        Ok(false) => {}
                        Err(e) => log::warn!("hot-reload: {}", e),
                    }
                }
                for name in shaders.pixel_shader_names() {
                    match shaders.recompile_pixel_shader(&name) {
                        Ok(true) => reloaded += 1,
                        Ok(false) => {}
                        Err(e) => log::warn!("hot-reload: {}", e),
                    }
                }
                reloaded
            }
            WatchMode::One { name, stage } => {
                let result = match stage {
                    ShaderStage::Vertex => shaders.recompile_vertex_shader(name),
                    ShaderStage::Pixel => shaders.recompile_pixel_shader(name),
                };
                match result {
                    Ok(true) => 1,
                    Ok(false) => 0,
                    Err(e) => {
                        log::warn!("hot-reload: {}", e);
                        0
                    }
                }
            }
        }
    }
}
