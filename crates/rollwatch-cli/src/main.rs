use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::elasticsearch::ElasticsearchArgs;
use commands::prometheus::PrometheusArgs;
use commands::sentry::SentryArgs;

#[derive(Parser, Debug)]
#[command(
    name = "rollwatch",
    about = "Watch a freshly deployed release and roll it back when failures show up",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every backend subcommand.
///
/// Value flags are optional so that `rollwatch.toml` can fill the gaps;
/// built-in defaults apply last.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Prevent hooks from running during rollback
    #[arg(long, global = true)]
    pub no_hooks: bool,

    /// Simulate a rollback
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Force resource update through delete/recreate if needed
    #[arg(long, global = true)]
    pub force: bool,

    /// Wait until resources are ready before marking the rollback successful
    #[arg(long, global = true)]
    pub wait: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Seconds allowed for any single operation during the rollback [default: 300]
    #[arg(long, global = true, value_name = "SECONDS")]
    pub rollback_timeout: Option<u64>,

    /// Seconds to wait before assuming the release is healthy [default: 300]
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Seconds between queries [default: 10]
    #[arg(short, long, global = true, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Roll back when a query returns more than this many results [default: 0]
    #[arg(long, visible_alias = "threshold", global = true, value_name = "COUNT")]
    pub expected_result_count: Option<u64>,

    /// Kubernetes namespace of the release
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Kubernetes context to use
    #[arg(long, global = true)]
    pub kube_context: Option<String>,

    /// Path to a rollwatch.toml file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Roll back when a PromQL query returns a non-empty result vector.
    ///
    /// Example: rollwatch prometheus frontend 'rate(http_requests_total{code=~"^5.*$"}[5m]) > 0'
    Prometheus(PrometheusArgs),
    /// Roll back when an Elasticsearch count exceeds the threshold.
    ///
    /// QUERY is either a path to a JSON query DSL file or a Lucene query
    /// string, e.g. 'status:500 AND kubernetes.labels.app:frontend'.
    Elasticsearch(ElasticsearchArgs),
    /// Roll back when matching Sentry events show up for the project.
    Sentry(SentryArgs),
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose { "rollwatch=debug" } else { "rollwatch=info" };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose)?;

    let file = commands::load_file_config(cli.global.config.as_deref())?;

    let outcome = match cli.command {
        Commands::Prometheus(args) => commands::prometheus::run(args, &cli.global, &file).await?,
        Commands::Elasticsearch(args) => {
            commands::elasticsearch::run(args, &cli.global, &file).await?
        }
        Commands::Sentry(args) => commands::sentry::run(args, &cli.global, &file).await?,
    };

    debug!(outcome = outcome.label(), "run finished");
    Ok(())
}
