//! Command language and executor
//!
//! One command per line, `verb=arg1,arg2`. The executor dispatches through
//! a verb-indexed handler table built once at startup; the embedding
//! application can register more verbs for its own subsystems (console,
//! window, camera) with [`CommandExecutor::register`]. Batch replay keeps
//! file order, and a bad line is logged and dropped rather than aborting
//! the batch - a broken config must never take the frame loop down.

use std::collections::HashMap;
use std::path::Path;

use crate::backend::{InputLayoutDesc, ShaderStage};
use crate::constants::config::{ARG_DELIMITER, CMD_DELIMITER, COMMENT_CHAR};
use crate::error::{EngineError, EngineResult};
use crate::Engine;

/// One parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub args: Vec<String>,
}

impl Command {
    /// Parse a single line. Blank lines and comment lines yield `None`.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(COMMENT_CHAR) {
            return None;
        }
        let (verb, args) = match line.split_once(CMD_DELIMITER) {
            Some((verb, rest)) if !rest.trim().is_empty() => (
                verb.trim(),
                rest.split(ARG_DELIMITER)
                    .map(|arg| arg.trim().to_string())
                    .collect(),
            ),
            Some((verb, _)) => (verb.trim(), Vec::new()),
            None => (line, Vec::new()),
        };
        if verb.is_empty() {
            return None;
        }
        Some(Command {
            verb: verb.to_string(),
            args,
        })
    }
}

/// Operation bound to a verb
pub type CommandHandler = Box<dyn FnMut(&mut Engine, &Command) -> EngineResult<()>>;

/// Replays command lines against the engine through a verb-indexed table.
pub struct CommandExecutor {
    handlers: HashMap<String, CommandHandler>,
}

impl CommandExecutor {
    /// An executor with no verbs bound.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// An executor preloaded with the engine's built-in verbs.
    pub fn with_engine_commands() -> Self {
        let mut executor = Self::new();
        executor.register("loadvs", cmd_loadvs);
        executor.register("loadps", cmd_loadps);
        executor.register("loadvsbin", cmd_loadvsbin);
        executor.register("loadpsbin", cmd_loadpsbin);
        executor.register("loadil", cmd_loadil);
        executor.register("loadilbin", cmd_loadilbin);
        executor.register("loadcb", cmd_loadcb);
        executor.register("activatevs", cmd_activatevs);
        executor.register("activateps", cmd_activateps);
        executor.register("activateil", cmd_activateil);
        executor.register("watch", cmd_watch);
        executor.register("watchall", cmd_watchall);
        executor.register("stopwatch", cmd_stopwatch);
        executor.register("refresh", cmd_refresh);
        executor
    }

    /// Bind a verb to an operation, replacing any previous binding.
    pub fn register<F>(&mut self, verb: &str, handler: F)
    where
        F: FnMut(&mut Engine, &Command) -> EngineResult<()> + 'static,
    {
        self.handlers.insert(verb.to_string(), Box::new(handler));
    }

    /// Dispatch one parsed command.
    pub fn execute(&mut self, engine: &mut Engine, command: &Command) -> EngineResult<()> {
        match self.handlers.get_mut(&command.verb) {
            Some(handler) => handler(engine, command),
            None => Err(EngineError::UnknownCommand {
                verb: command.verb.clone(),
            }),
        }
    }

    /// Parse and run one console or config line.
    pub fn execute_command(&mut self, engine: &mut Engine, line: &str) -> EngineResult<()> {
        match Command::parse(line) {
            Some(command) => self.execute(engine, &command),
            None => Ok(()),
        }
    }

    /// Replay lines in order.
    ///
    /// Order matters: later commands rely on the registry state earlier
    /// ones created. Failed lines are logged and skipped.
    pub fn execute_batch<I, S>(&mut self, engine: &mut Engine, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            if let Err(e) = self.execute_command(engine, line.as_ref()) {
                log::warn!("dropped command '{}': {}", line.as_ref().trim(), e);
            }
        }
    }

    /// Replay an already-parsed startup batch in order.
    pub fn run_startup(&mut self, engine: &mut Engine, commands: &[Command]) {
        for command in commands {
            if let Err(e) = self.execute(engine, command) {
                log::warn!("dropped startup command '{}': {}", command.verb, e);
            }
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_args(command: &Command, expected: usize) -> EngineError {
    EngineError::MalformedCommand {
        verb: command.verb.clone(),
        reason: format!(
            "expected {} argument(s), got {}",
            expected,
            command.args.len()
        ),
    }
}

fn one_arg(command: &Command) -> EngineResult<&str> {
    match command.args.as_slice() {
        [a] => Ok(a.as_str()),
        _ => Err(wrong_args(command, 1)),
    }
}

fn two_args(command: &Command) -> EngineResult<(&str, &str)> {
    match command.args.as_slice() {
        [a, b] => Ok((a.as_str(), b.as_str())),
        _ => Err(wrong_args(command, 2)),
    }
}

fn three_args(command: &Command) -> EngineResult<(&str, &str, &str)> {
    match command.args.as_slice() {
        [a, b, c] => Ok((a.as_str(), b.as_str(), c.as_str())),
        _ => Err(wrong_args(command, 3)),
    }
}

fn parse_layout(command: &Command, desc: &str) -> EngineResult<InputLayoutDesc> {
    desc.parse().map_err(|e| EngineError::MalformedCommand {
        verb: command.verb.clone(),
        reason: format!("{}", e),
    })
}

fn parse_stage(command: &Command, stage: &str) -> EngineResult<ShaderStage> {
    match stage {
        "vs" | "VS" => Ok(ShaderStage::Vertex),
        "ps" | "PS" => Ok(ShaderStage::Pixel),
        other => Err(EngineError::MalformedCommand {
            verb: command.verb.clone(),
            reason: format!("unknown shader stage '{}'", other),
        }),
    }
}

fn cmd_loadvs(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, path) = two_args(command)?;
    engine.shaders.add_vertex_shader(name, Path::new(path))
}

fn cmd_loadps(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, path) = two_args(command)?;
    engine.shaders.add_pixel_shader(name, Path::new(path))
}

fn cmd_loadvsbin(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, path) = two_args(command)?;
    engine
        .shaders
        .add_vertex_shader_precompiled(name, Path::new(path))
}

fn cmd_loadpsbin(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, path) = two_args(command)?;
    engine
        .shaders
        .add_pixel_shader_precompiled(name, Path::new(path))
}

fn cmd_loadil(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, shader_name, layout) = three_args(command)?;
    let desc = parse_layout(command, layout)?;
    engine.shaders.add_input_layout(name, shader_name, &desc)
}

fn cmd_loadilbin(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, shader_name, layout) = three_args(command)?;
    let desc = parse_layout(command, layout)?;
    engine
        .shaders
        .add_input_layout_precompiled(name, shader_name, &desc)
}

fn cmd_loadcb(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, width) = two_args(command)?;
    let byte_width = width.parse().map_err(|_| EngineError::MalformedCommand {
        verb: command.verb.clone(),
        reason: format!("'{}' is not a byte width", width),
    })?;
    engine.shaders.add_constant_buffer(name, byte_width)
}

fn cmd_activatevs(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    engine.shaders.activate_vertex_shader(one_arg(command)?);
    Ok(())
}

fn cmd_activateps(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    engine.shaders.activate_pixel_shader(one_arg(command)?);
    Ok(())
}

fn cmd_activateil(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    engine.shaders.activate_input_layout(one_arg(command)?);
    Ok(())
}

fn cmd_watch(engine: &mut Engine, command: &Command) -> EngineResult<()> {
    let (name, stage) = two_args(command)?;
    let stage = parse_stage(command, stage)?;
    engine.watcher.watch(name, stage);
    Ok(())
}

fn cmd_watchall(engine: &mut Engine, _command: &Command) -> EngineResult<()> {
    engine.watcher.watch_all();
    Ok(())
}

fn cmd_stopwatch(engine: &mut Engine, _command: &Command) -> EngineResult<()> {
    engine.watcher.stop();
    Ok(())
}

fn cmd_refresh(engine: &mut Engine, _command: &Command) -> EngineResult<()> {
    engine.shaders.refresh_active();
    Ok(())
}
