//! `specforge check` command
//!
//! Loads every spec and prints every diagnostic; fails if any spec could
//! not be loaded.

use anyhow::Result;

use crate::cli::CheckArgs;
use crate::GlobalArgs;
use specforge::ops::{check, load, CheckOptions};
use specforge::util::diagnostic::emit;

pub fn execute(args: CheckArgs, global: &GlobalArgs) -> Result<bool> {
    let (_, registry) = load(&global.load)?;

    let report = check(
        &registry,
        CheckOptions {
            domain_inversion: args.domain_inversion,
        },
    );

    for diagnostic in &report.diagnostics {
        emit(diagnostic, global.color);
    }
    for message in &report.domain_inversion_errors {
        eprintln!("{}", message);
    }

    println!(
        "checked {} specs: {} loaded, {} failed ({} errors, {} warnings)",
        report.loaded + report.failed,
        report.loaded,
        report.failed,
        report.error_count(),
        report.warning_count()
    );

    Ok(!report.has_errors())
}
