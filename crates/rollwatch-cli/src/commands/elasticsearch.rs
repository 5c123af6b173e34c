use anyhow::Context;
use clap::Args;

use rollwatch_core::{FileConfig, RunOutcome};
use rollwatch_signal::elasticsearch::DEFAULT_ADDRESS;
use rollwatch_signal::{CountQuery, ElasticsearchBackend};

use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ElasticsearchArgs {
    /// Release to monitor
    pub release: String,

    /// Path to a JSON query DSL file, or a Lucene query string
    pub query: String,

    /// Elasticsearch address [default: http://localhost:9200]
    #[arg(long = "elasticsearch", value_name = "ADDR")]
    pub address: Option<String>,
}

pub async fn run(
    args: ElasticsearchArgs,
    global: &GlobalArgs,
    file: &FileConfig,
) -> anyhow::Result<RunOutcome> {
    let file_address = file.elasticsearch.as_ref().and_then(|e| e.address.clone());
    let address = super::address(args.address, file_address, DEFAULT_ADDRESS);

    let backend = ElasticsearchBackend::new(&address, CountQuery::resolve(&args.query))
        .with_context(|| format!("invalid elasticsearch address {address}"))?;

    super::watch(&args.release, global, file, &backend).await
}
