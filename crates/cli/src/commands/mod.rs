pub(crate) mod deploy;
pub(crate) mod plan;
pub(crate) mod status;
pub(crate) mod wipe;

use std::fmt::Display;
use std::path::Path;
use std::process;

use hoist_core::{Graph, ModuleDescription};
use hoist_engine::loader::JOURNAL_FILE;

use crate::{report_error, OutputFormat};

/// Unwrap `result` or report the error and exit with status 1.
pub(crate) fn or_exit<T, E: Display>(
    result: Result<T, E>,
    output: OutputFormat,
    quiet: bool,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn load_graph(path: &Path, output: OutputFormat, quiet: bool) -> Graph {
    let module = or_exit(ModuleDescription::from_path(path), output, quiet);
    or_exit(Graph::from_module(module), output, quiet)
}

/// Commands that inspect a deployment refuse directories without a journal
/// rather than reporting an empty deployment.
pub(crate) fn require_deployment(dir: &Path, output: OutputFormat, quiet: bool) {
    if !dir.join(JOURNAL_FILE).is_file() {
        report_error(
            &format!("error: no deployment found in '{}'", dir.display()),
            output,
            quiet,
        );
        process::exit(1);
    }
}
