//! Replay an engine config against a headless backend and report what it
//! builds. Validates a config file without a GPU or a window; rejected
//! lines show up as warnings in the log.
//!
//! Usage: config_check <config-file>

use std::cell::RefCell;
use std::env;
use std::rc::Rc;

use anyhow::{bail, Context, Result};

use ember_engine::backend::headless::HeadlessBackend;
use ember_engine::{CommandExecutor, ConfigBatches, DiskSources, Engine, Section, ShaderConfig};

fn main() -> Result<()> {
    env_logger::init();

    let path = match env::args().nth(1) {
        Some(path) => path,
        None => bail!("usage: config_check <config-file>"),
    };

    let batches = ConfigBatches::load(&path, Section::All)
        .with_context(|| format!("loading {}", path))?;
    log::info!(
        "{}: {} startup command(s), {} render command(s)",
        path,
        batches.startup.len(),
        batches.render.len()
    );

    let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
    let mut engine = Engine::new(
        Box::new(backend.clone()),
        Box::new(DiskSources),
        ShaderConfig::default(),
    );
    let mut executor = CommandExecutor::with_engine_commands();

    executor.run_startup(&mut engine, &batches.startup);
    executor.execute_batch(&mut engine, &batches.render);

    print_group("vertex shaders", engine.shaders.vertex_shader_names());
    print_group("pixel shaders", engine.shaders.pixel_shader_names());
    print_group("input layouts", engine.shaders.input_layout_names());
    print_group("constant buffers", engine.shaders.constant_buffer_names());

    let active = engine.shaders.active();
    println!(
        "active: vs={} ps={} il={}",
        active.vertex_shader.as_deref().unwrap_or("-"),
        active.pixel_shader.as_deref().unwrap_or("-"),
        active.input_layout.as_deref().unwrap_or("-")
    );
    println!("watch mode: {:?}", engine.watcher.mode());
    println!(
        "{} backend operation(s) recorded",
        backend.borrow().ops.len()
    );

    engine.shutdown();
    Ok(())
}

fn print_group(label: &str, mut names: Vec<String>) {
    names.sort();
    if names.is_empty() {
        println!("{}: (none)", label);
    } else {
        println!("{}: {}", label, names.join(", "));
    }
}
