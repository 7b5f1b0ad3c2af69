mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Resumable smart-contract deployments.
#[derive(Parser)]
#[command(name = "hoist", version, about = "Resumable smart-contract deployments")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a module, resuming any previous run in the deployment directory
    Deploy {
        /// Path to the module description JSON
        module: PathBuf,
        /// JSON-RPC endpoint of the node
        #[arg(long)]
        rpc_url: String,
        /// Directory holding compiled contract artifacts
        #[arg(long)]
        artifacts: PathBuf,
        /// Deployment directory; without it the run is kept in memory only
        #[arg(long)]
        deployment_dir: Option<PathBuf>,
        /// Module parameters JSON: {"<moduleId>": {"<name>": <value>}}
        #[arg(long)]
        parameters: Option<PathBuf>,
        /// Engine configuration TOML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Sender for futures that do not name one
        #[arg(long)]
        default_sender: Option<String>,
        /// Confirmations required before a transaction counts as final
        #[arg(long)]
        confirmations: Option<u64>,
    },

    /// Print the execution batches of a module without touching the network
    Plan {
        /// Path to the module description JSON
        module: PathBuf,
    },

    /// Show the recorded state of a deployment
    Status {
        /// Deployment directory
        deployment_dir: PathBuf,
        /// Module description, to list futures that have not started yet
        #[arg(long)]
        module: Option<PathBuf>,
    },

    /// Discard the recorded state of a future and everything depending on it
    Wipe {
        /// Deployment directory
        deployment_dir: PathBuf,
        /// Full future id, e.g. Apollo#Rocket
        future_id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Deploy {
            module,
            rpc_url,
            artifacts,
            deployment_dir,
            parameters,
            config,
            default_sender,
            confirmations,
        } => {
            commands::deploy::cmd_deploy(
                commands::deploy::DeployOptions {
                    module: &module,
                    rpc_url: &rpc_url,
                    artifacts: &artifacts,
                    deployment_dir: deployment_dir.as_deref(),
                    parameters: parameters.as_deref(),
                    config: config.as_deref(),
                    default_sender: default_sender.as_deref(),
                    confirmations,
                },
                cli.output,
                cli.quiet,
            );
        }
        Commands::Plan { module } => {
            commands::plan::cmd_plan(&module, cli.output, cli.quiet);
        }
        Commands::Status {
            deployment_dir,
            module,
        } => {
            commands::status::cmd_status(&deployment_dir, module.as_deref(), cli.output, cli.quiet);
        }
        Commands::Wipe {
            deployment_dir,
            future_id,
        } => {
            commands::wipe::cmd_wipe(&deployment_dir, &future_id, cli.output, cli.quiet);
        }
    }
}

/// Logs go to stderr so stdout stays parseable with `--output json`.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Build the runtime for the async commands.
pub(crate) fn runtime(output: OutputFormat, quiet: bool) -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to start async runtime: {}", e), output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a report on stdout in the requested format.
pub(crate) fn print_report(text: String, json: serde_json::Value, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => {
            let pretty = serde_json::to_string_pretty(&json)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if !quiet {
                println!("{}", text);
            }
        }
    }
}
