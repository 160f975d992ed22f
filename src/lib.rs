//! Shader registry, hot-reload and command pipeline for a rendering engine.
//!
//! Resources live in a name-keyed [`ShaderRegistry`] so config commands and
//! the hot-reload watcher can refer to them without device pointers. A
//! line-oriented command language builds the registry from text config at
//! startup and from a console at runtime, and a per-frame poll swaps
//! recompiled shaders in while rendering keeps going. The graphics device
//! itself stays behind the [`RenderBackend`] capability.

pub mod backend;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod hot_reload;
pub mod shaders;

pub use backend::fs::{DiskSources, SourceFiles};
pub use backend::{InputLayoutDesc, RenderBackend, ResourceHandle, ShaderStage};
pub use commands::{Command, CommandExecutor};
pub use config::{ConfigBatches, Section};
pub use error::{EngineError, EngineResult};
pub use hot_reload::{ShaderWatcher, WatchMode};
pub use shaders::{ShaderConfig, ShaderRegistry};

/// Owning shell for the shader subsystem.
///
/// Bundles the registry with the hot-reload watcher and is the dispatch
/// target the command executor mutates. The embedding application drives
/// everything from one thread: replay the startup batch, replay the render
/// batch when the surface exists, then call [`Engine::poll_shaders`] once
/// per frame between input processing and rendering.
pub struct Engine {
    pub shaders: ShaderRegistry,
    pub watcher: ShaderWatcher,
}

impl Engine {
    pub fn new(
        backend: Box<dyn RenderBackend>,
        sources: Box<dyn SourceFiles>,
        config: ShaderConfig,
    ) -> Self {
        Self {
            shaders: ShaderRegistry::new(backend, sources, config),
            watcher: ShaderWatcher::new(),
        }
    }

    /// Run one hot-reload poll cycle. Returns the number of shaders
    /// replaced.
    pub fn poll_shaders(&mut self) -> usize {
        self.watcher.poll(&mut self.shaders)
    }

    /// Release every backend resource. The engine is done afterwards.
    pub fn shutdown(&mut self) {
        self.watcher.stop();
        self.shaders.release_all();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;
    use std::time::{Duration, SystemTime};

    use super::*;
    use crate::backend::fs::testing::FakeSources;
    use crate::backend::headless::HeadlessBackend;

    #[test]
    fn config_replay_then_poll_round_trip() {
        let text = "\
>startup
loadvs=main,shader.vs
loadps=main,shader.ps
loadcb=frame,64
watchall
>render
activatevs=main
activateps=main
";
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let sources = Rc::new(FakeSources::new());
        sources.set_write_time("shader.vs", SystemTime::UNIX_EPOCH + Duration::from_secs(100));
        sources.set_write_time("shader.ps", SystemTime::UNIX_EPOCH + Duration::from_secs(100));

        let mut engine = Engine::new(
            Box::new(backend.clone()),
            Box::new(sources.clone()),
            ShaderConfig::default(),
        );
        let mut executor = CommandExecutor::with_engine_commands();

        let batches = ConfigBatches::parse(text, Section::All);
        executor.run_startup(&mut engine, &batches.startup);
        executor.execute_batch(&mut engine, &batches.render);

        assert!(engine.shaders.vertex_shader("main").is_some());
        assert!(engine.shaders.constant_buffer("frame").is_some());
        assert_eq!(engine.shaders.active().pixel_shader.as_deref(), Some("main"));
        assert_eq!(*engine.watcher.mode(), WatchMode::All);

        // Quiet frame, then an edit shows up on the next poll.
        assert_eq!(engine.poll_shaders(), 0);
        sources.set_write_time("shader.ps", SystemTime::UNIX_EPOCH + Duration::from_secs(200));
        assert_eq!(engine.poll_shaders(), 1);

        engine.shutdown();
        assert!(engine.shaders.vertex_shader("main").is_none());
        assert_eq!(backend.borrow().live_handles(), 0);
    }

    #[test]
    fn shutdown_stops_the_watcher() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let mut engine = Engine::new(
            Box::new(backend),
            Box::new(FakeSources::new()),
            ShaderConfig::default(),
        );
        engine.watcher.watch("main", ShaderStage::Vertex);

        engine.shutdown();

        assert_eq!(*engine.watcher.mode(), WatchMode::Off);
        assert_eq!(engine.poll_shaders(), 0);
    }

    #[test]
    fn activation_survives_a_surface_reset() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let sources = Rc::new(FakeSources::new());
        sources.set_write_time("shader.vs", SystemTime::UNIX_EPOCH + Duration::from_secs(100));

        let mut engine = Engine::new(
            Box::new(backend.clone()),
            Box::new(sources),
            ShaderConfig::default(),
        );
        engine
            .shaders
            .add_vertex_shader("main", Path::new("shader.vs"))
            .unwrap();
        engine.shaders.activate_vertex_shader("main");
        let id = engine.shaders.vertex_shader("main").unwrap().raw();

        // Simulated reset: bindings gone, handles still valid.
        backend.borrow_mut().ops.clear();
        engine.shaders.refresh_active();

        assert!(backend
            .borrow()
            .ops
            .contains(&crate::backend::headless::BackendOp::BindVertexShader(Some(id))));
    }
}
