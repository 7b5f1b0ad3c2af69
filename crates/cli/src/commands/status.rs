use std::path::Path;
use std::sync::Arc;

use hoist_engine::{ExecutionStore, FileDeploymentLoader, StatusReport};

use crate::commands::{load_graph, or_exit, require_deployment};
use crate::{print_report, runtime, OutputFormat};

pub(crate) fn cmd_status(dir: &Path, module: Option<&Path>, output: OutputFormat, quiet: bool) {
    require_deployment(dir, output, quiet);
    let graph = module.map(|path| load_graph(path, output, quiet));

    let rt = runtime(output, quiet);
    let state = or_exit(
        rt.block_on(async {
            let store = ExecutionStore::open(Arc::new(FileDeploymentLoader::new(dir))).await?;
            Ok::<_, hoist_engine::EngineError>(store.snapshot().await)
        }),
        output,
        quiet,
    );

    let report = StatusReport::new(&state, graph.as_ref());
    print_report(report.to_text(), report.to_json(), output, quiet);
}
