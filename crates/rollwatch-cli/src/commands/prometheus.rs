use anyhow::Context;
use clap::Args;

use rollwatch_core::{FileConfig, RunOutcome};
use rollwatch_signal::PrometheusBackend;
use rollwatch_signal::prometheus::DEFAULT_ADDRESS;

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct PrometheusArgs {
    /// Release to monitor
    pub release: String,

    /// PromQL query; any returned series counts as a failure
    pub query: String,

    /// Prometheus address [default: http://localhost:9090]
    #[arg(long = "prometheus", value_name = "ADDR")]
    pub address: Option<String>,
}

pub async fn run(
    args: PrometheusArgs,
    global: &GlobalArgs,
    file: &FileConfig,
) -> anyhow::Result<RunOutcome> {
    let file_address = file.prometheus.as_ref().and_then(|p| p.address.clone());
    let address = super::address(args.address, file_address, DEFAULT_ADDRESS);

    let backend = PrometheusBackend::new(&address, &args.query)
        .with_context(|| format!("invalid prometheus address {address}"))?;

    super::watch(&args.release, global, file, &backend).await
}
