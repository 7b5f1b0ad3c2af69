use std::path::Path;
use std::process;
use std::sync::Arc;

use hoist_core::module::load_parameters;
use hoist_core::{Address, FsArtifactResolver};
use hoist_engine::{
    DeploymentLoader, Deployer, EngineConfig, FileDeploymentLoader, HttpJsonRpcClient,
    MemoryDeploymentLoader, RunOptions,
};
use tracing::info;

use crate::commands::{load_graph, or_exit};
use crate::{print_report, report_error, runtime, OutputFormat};

pub(crate) struct DeployOptions<'a> {
    pub module: &'a Path,
    pub rpc_url: &'a str,
    pub artifacts: &'a Path,
    pub deployment_dir: Option<&'a Path>,
    pub parameters: Option<&'a Path>,
    pub config: Option<&'a Path>,
    pub default_sender: Option<&'a str>,
    pub confirmations: Option<u64>,
}

pub(crate) fn cmd_deploy(opts: DeployOptions<'_>, output: OutputFormat, quiet: bool) {
    // Everything that can be checked offline is checked before connecting.
    let graph = load_graph(opts.module, output, quiet);
    let parameters = or_exit(load_parameters(opts.parameters), output, quiet);

    let mut config = match opts.config {
        Some(path) => or_exit(EngineConfig::load(path), output, quiet),
        None => EngineConfig::default(),
    };
    if let Some(confirmations) = opts.confirmations {
        config.required_confirmations = confirmations;
    }

    let default_sender = opts.default_sender.map(|raw| {
        or_exit(
            raw.parse::<Address>()
                .map_err(|e| format!("invalid --default-sender '{}': {}", raw, e)),
            output,
            quiet,
        )
    });

    let loader: Arc<dyn DeploymentLoader> = match opts.deployment_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "using deployment directory");
            Arc::new(FileDeploymentLoader::new(dir))
        }
        None => {
            info!("no deployment directory given; the run will not be resumable");
            Arc::new(MemoryDeploymentLoader::new())
        }
    };

    let deployer = Deployer::new(
        Arc::new(HttpJsonRpcClient::new(opts.rpc_url)),
        Arc::new(FsArtifactResolver::new(opts.artifacts)),
        loader,
        config,
    );
    let options = RunOptions {
        parameters,
        default_sender,
        exit_after_pending: None,
    };

    let rt = runtime(output, quiet);
    let report = or_exit(rt.block_on(deployer.run(graph, options)), output, quiet);

    let success = report.is_success();
    print_report(report.to_text(), report.to_json(), output, quiet);
    if !success {
        if output == OutputFormat::Text {
            report_error("deployment did not complete", output, quiet);
        }
        process::exit(1);
    }
}
