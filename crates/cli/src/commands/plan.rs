use std::path::Path;

use hoist_core::batch;

use crate::commands::{load_graph, or_exit};
use crate::{print_report, OutputFormat};

pub(crate) fn cmd_plan(module: &Path, output: OutputFormat, quiet: bool) {
    let graph = load_graph(module, output, quiet);
    let batches = or_exit(batch(&graph), output, quiet);

    let mut lines = vec![format!(
        "{} future(s) in {} batch(es)",
        graph.len(),
        batches.len()
    )];
    for (index, members) in batches.iter().enumerate() {
        lines.push(format!("batch {}:", index));
        for id in members {
            let kind = graph.get(id).map(|f| f.kind().as_str()).unwrap_or("?");
            lines.push(format!("  {} ({})", id, kind));
        }
    }

    let json = serde_json::json!({
        "futures": graph.len(),
        "batches": batches,
    });
    print_report(lines.join("\n"), json, output, quiet);
}
