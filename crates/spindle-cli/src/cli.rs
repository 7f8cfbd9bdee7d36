//! `clap`-derived argument parsing for the `install` subcommand, plus the
//! ambient flags (`--color`, `--quiet`, `--registry`) a CLI frontend carries
//! but the core pipeline doesn't specify.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "spindle", version, about = "Locate, build, and install packages from source")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve, build, and install one or more packages.
    Install(InstallArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Apply this choice to `owo_colors`'s global override, which every
    /// `OwoColorize` call in the report renderer consults. `Auto` defers to
    /// whether stderr (the stream the report is written to) is a terminal.
    pub fn apply(self) {
        match self {
            ColorChoice::Always => owo_colors::set_override(true),
            ColorChoice::Never => owo_colors::set_override(false),
            ColorChoice::Auto => {
                use std::io::IsTerminal;
                owo_colors::set_override(std::io::stderr().is_terminal());
            }
        }
    }
}

#[derive(Debug, Parser)]
pub struct InstallArgs {
    /// Read requirements from FILE, one per line (repeatable).
    #[arg(short = 'r', long = "requirements", value_name = "FILE")]
    pub requirements: Vec<PathBuf>,

    /// An upstream index to search, highest priority first (repeatable).
    #[arg(short = 'i', long = "index", value_name = "URL")]
    pub index: Vec<String>,

    /// A private index to search and to republish to with `--upload` (repeatable).
    #[arg(short = 'c', long = "spindle-index", value_name = "URL")]
    pub spindle_index: Vec<String>,

    /// Republish built wheels to the private index after installing.
    #[arg(short = 'u', long = "upload")]
    pub upload: bool,

    /// Verbosity, 0 (errors only) through 3 (trace).
    #[arg(short = 'l', long = "log-level", default_value_t = 1, value_name = "INT")]
    pub log_level: u8,

    /// Colorize output.
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Suppress all but the final report.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// A TOML manifest describing the local package registry to install
    /// from, in place of a real upstream index (real upstream HTTP clients
    /// are out of scope for the core; this is `spindle`'s offline stand-in,
    /// see `DESIGN.md`).
    #[arg(long, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// How many workers to give each pipeline stage.
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Package requirements, e.g. `curdling` or `"sure (== 0.1.2)"`.
    pub packages: Vec<String>,
}
