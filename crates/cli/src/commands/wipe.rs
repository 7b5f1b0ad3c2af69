use std::path::Path;
use std::sync::Arc;

use hoist_core::FutureId;
use hoist_engine::{wipe, ExecutionStore, FileDeploymentLoader};

use crate::commands::{or_exit, require_deployment};
use crate::{print_report, runtime, OutputFormat};

pub(crate) fn cmd_wipe(dir: &Path, future_id: &str, output: OutputFormat, quiet: bool) {
    require_deployment(dir, output, quiet);
    let id = FutureId::from_raw(future_id);

    let rt = runtime(output, quiet);
    let wiped = or_exit(
        rt.block_on(async {
            let store = ExecutionStore::open(Arc::new(FileDeploymentLoader::new(dir))).await?;
            wipe(&store, &id).await
        }),
        output,
        quiet,
    );

    let text = wiped
        .iter()
        .map(|id| format!("wiped {}", id))
        .collect::<Vec<_>>()
        .join("\n");
    let json = serde_json::json!({ "wiped": wiped });
    print_report(text, json, output, quiet);
}

