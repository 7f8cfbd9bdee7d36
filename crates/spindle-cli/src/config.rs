//! Assembles the CLI's single `InstallConfig` options object from parsed
//! arguments, expanded requirements files, and an optional `spindle.toml`
//! settings layer — requirements-file expansion is an out-of-core concern;
//! this module is its thin implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use spindle_requirement::Requirement;

use crate::cli::InstallArgs;

/// The single options object `Env` construction is built from.
pub struct InstallConfig {
    pub roots: Vec<Requirement>,
    pub index_urls: Vec<String>,
    pub spindle_index_urls: Vec<String>,
    pub upload: bool,
    pub log_level: u8,
    pub registry: Option<PathBuf>,
    pub workers: usize,
}

/// Settings not worth repeating on every invocation, loaded from
/// `spindle.toml` in the current directory if present. CLI flags always
/// take precedence; this only fills in values the user left unset.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    #[serde(default)]
    index: Vec<String>,
    #[serde(default)]
    spindle_index: Vec<String>,
    #[serde(default)]
    log_level: Option<u8>,
}

impl FileSettings {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs_err::read_to_string(path)?;
        toml::from_str(&raw).with_context(|| format!("invalid settings file: {}", path.display()))
    }
}

impl InstallConfig {
    pub fn from_args(args: &InstallArgs) -> Result<Self> {
        let settings = FileSettings::load(Path::new("spindle.toml"))?;

        let mut roots = Vec::new();
        for file in &args.requirements {
            roots.extend(parse_requirements_file(file)?);
        }
        for spec in &args.packages {
            roots.push(Requirement::parse(spec).with_context(|| format!("invalid requirement {spec:?}"))?);
        }

        let index_urls = if args.index.is_empty() { settings.index } else { args.index.clone() };
        let spindle_index_urls = if args.spindle_index.is_empty() {
            settings.spindle_index
        } else {
            args.spindle_index.clone()
        };
        let log_level = if args.log_level == 1 {
            settings.log_level.unwrap_or(args.log_level)
        } else {
            args.log_level
        };

        Ok(InstallConfig {
            roots,
            index_urls,
            spindle_index_urls,
            upload: args.upload,
            log_level,
            registry: args.registry.clone(),
            workers: args.workers,
        })
    }
}

/// Expand a pip-style requirements file: one requirement per line, blank
/// lines and `#`-prefixed comments ignored.
fn parse_requirements_file(path: &Path) -> Result<Vec<Requirement>> {
    let raw = fs_err::read_to_string(path)?;
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| Requirement::parse(line).with_context(|| format!("invalid requirement {line:?} in {}", path.display())))
        .collect()
}
