//! `Printer`: the CLI's stdout/stderr handle, respecting `--quiet`.
//!
//! Commands take a `Printer` by value and write through it rather than
//! calling `println!` directly, so tests can swap it for a sink and
//! `--quiet` has one place to take effect.

use std::io::{self, Write};

/// Which stream (if any) a [`Printer`] writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Printer {
    /// Write progress and summaries to stdout and stderr normally.
    Default,
    /// Suppress everything but the final error report.
    Quiet,
}

impl Printer {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        if quiet {
            Printer::Quiet
        } else {
            Printer::Default
        }
    }

    pub fn stdout(self) -> Stream {
        Stream { printer: self, target: Target::Stdout }
    }

    pub fn stderr(self) -> Stream {
        Stream { printer: self, target: Target::Stderr }
    }

    /// A stream for the final report, which `--quiet` does not suppress per
    /// its documented contract above.
    pub fn report(self) -> Stream {
        Stream { printer: Printer::Default, target: Target::Stderr }
    }

    pub fn is_quiet(self) -> bool {
        matches!(self, Printer::Quiet)
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Stdout,
    Stderr,
}

/// A `Write` handle for one of [`Printer`]'s streams. In `Quiet` mode every
/// write is a no-op rather than an error, so call sites don't need to
/// special-case it.
pub struct Stream {
    printer: Printer,
    target: Target,
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.printer.is_quiet() {
            return Ok(buf.len());
        }
        match self.target {
            Target::Stdout => io::stdout().write(buf),
            Target::Stderr => io::stderr().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.printer.is_quiet() {
            return Ok(());
        }
        match self.target {
            Target::Stdout => io::stdout().flush(),
            Target::Stderr => io::stderr().flush(),
        }
    }
}
