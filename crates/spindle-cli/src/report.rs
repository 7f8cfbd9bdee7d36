//! Renders `spindle_pipeline::env::Report` as a grouped-by-package-name
//! error report: for each failed requirement, the exception and the chain
//! of `dependency_of` requesters.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write as _;

use owo_colors::OwoColorize;

use spindle_pipeline::{Failure, Report};
use spindle_requirement::PackageName;

use crate::printer::Printer;

/// `true` if `report` carries any failure or conflict — callers use this to
/// decide the process exit code: non-zero when the final report carries a
/// non-empty error map.
pub fn has_errors(report: &Report) -> bool {
    !report.retrieve_failures.is_empty()
        || !report.conflicts.is_empty()
        || !report.install_failures.is_empty()
        || !report.upload_failures.is_empty()
}

pub fn render(report: &Report, printer: Printer) -> anyhow::Result<()> {
    let mut out = printer.report();

    writeln!(
        out,
        "{}",
        format!(
            "Built {} package(s), {} repeated",
            report.built, report.repeated
        )
        .dimmed()
    )?;

    if !report.retrieve_failures.is_empty() || !report.conflicts.is_empty() {
        writeln!(out, "{}", "Errors:".red().bold())?;
        render_retrieve_failures(&report.retrieve_failures, &mut out)?;
        render_conflicts(report, &mut out)?;
    }

    if !report.install_failures.is_empty() {
        writeln!(out, "{}", "Install failures:".red().bold())?;
        for failure in &report.install_failures {
            writeln!(out, "  {} {}: {}", "-".red(), failure.requirement, failure.error)?;
        }
    }

    if !report.upload_failures.is_empty() {
        writeln!(out, "{}", "Upload failures:".yellow().bold())?;
        for failure in &report.upload_failures {
            writeln!(out, "  {} {}: {}", "-".yellow(), failure.requirement, failure.error)?;
        }
    }

    Ok(())
}

fn render_retrieve_failures(failures: &[Failure], out: &mut impl std::io::Write) -> anyhow::Result<()> {
    let mut by_package: BTreeMap<String, Vec<&Failure>> = BTreeMap::new();
    for failure in failures {
        let package = failure
            .requirement
            .package_name()
            .map_or_else(|| failure.requirement.to_string(), PackageName::to_string);
        by_package.entry(package).or_default().push(failure);
    }

    for (package, failures) in by_package {
        writeln!(out, "  {}", package.bold())?;
        for failure in failures {
            let chain = requester_chain(failure);
            writeln!(out, "    {} {}: {}{}", "-".red(), failure.requirement, failure.error, chain)?;
        }
    }
    Ok(())
}

fn render_conflicts(report: &Report, out: &mut impl std::io::Write) -> anyhow::Result<()> {
    for conflict in &report.conflicts {
        match conflict {
            spindle_mapping::MappingError::VersionConflict { package, predicates, requesters } => {
                writeln!(out, "  {}", package.to_string().bold())?;
                writeln!(out, "    {} no version of {package} satisfies {predicates}", "-".red())?;
                for requester in requesters {
                    writeln!(out, "      required by {requester}")?;
                }
            }
        }
    }
    Ok(())
}

/// `Failure` records one level of requester; deeper chains live in
/// `Mapping::dependency_of_for`, which the CLI doesn't currently thread
/// through here (see DESIGN.md).
fn requester_chain(failure: &Failure) -> String {
    let mut chain = String::new();
    if let Some(requirement) = &failure.dependency_of {
        let _ = write!(chain, " <- required by {requirement}");
    }
    chain
}
