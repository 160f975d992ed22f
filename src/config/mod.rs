//! Config file loading
//!
//! The engine is configured by a plain-text file split into two sections:
//!
//! ```text
//! >startup
//! loadvs=main,shader.vs
//! loadil=basic,main,POSITION:float3
//! # comment lines and blank lines are skipped everywhere
//! >render
//! activatevs=main
//! ```
//!
//! Startup lines are parsed into [`Command`] tuples and replayed before the
//! first frame; render lines are stored verbatim and replayed whenever the
//! render surface is (re)built. Both batches keep file line order - later
//! commands depend on the registry state earlier ones created.

use std::fs;
use std::path::Path;

use crate::commands::Command;
use crate::constants::config::{COMMENT_CHAR, RENDER_SECTION, STARTUP_SECTION};
use crate::error::{EngineError, EngineResult};

/// Which config sections to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Startup,
    Render,
    All,
}

#[derive(Clone, Copy)]
enum ActiveSection {
    None,
    Startup,
    Render,
    Unrecognized,
}

/// Ordered command batches read from a config file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigBatches {
    /// Parsed startup commands, in file order
    pub startup: Vec<Command>,
    /// Verbatim render command lines, in file order
    pub render: Vec<String>,
}

impl ConfigBatches {
    /// Read and parse a config file.
    pub fn load(path: impl AsRef<Path>, section: Section) -> EngineResult<ConfigBatches> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| EngineError::ConfigRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Ok(Self::parse(&text, section))
    }

    /// Parse config text into section-scoped batches.
    ///
    /// Lines before the first section marker, or under a marker that is not
    /// one of the two known sections, are skipped.
    pub fn parse(text: &str, section: Section) -> ConfigBatches {
        let mut current = ActiveSection::None;
        let mut batches = ConfigBatches::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(COMMENT_CHAR) {
                continue;
            }
            if line.starts_with('>') {
                current = match line {
                    STARTUP_SECTION => ActiveSection::Startup,
                    RENDER_SECTION => ActiveSection::Render,
                    _ => ActiveSection::Unrecognized,
                };
                continue;
            }
            match current {
                ActiveSection::Startup
                    if matches!(section, Section::Startup | Section::All) =>
                {
                    if let Some(command) = Command::parse(line) {
                        batches.startup.push(command);
                    }
                }
                ActiveSection::Render if matches!(section, Section::Render | Section::All) => {
                    batches.render.push(line.to_string());
                }
                _ => {}
            }
        }

        batches
    }
}
