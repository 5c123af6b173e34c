use anyhow::Context;
use clap::Args;

use rollwatch_core::{FileConfig, RunOutcome};
use rollwatch_signal::sentry::DEFAULT_ADDRESS;
use rollwatch_signal::{SentryBackend, SentryOptions, parse_tags};

use super::{address, pick};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct SentryArgs {
    /// Release to monitor
    pub release: String,

    /// Sentry address [default: http://localhost:9000]
    #[arg(long = "sentry", value_name = "ADDR")]
    pub address: Option<String>,

    /// Sentry API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Sentry organization slug
    #[arg(long)]
    pub organization: Option<String>,

    /// Sentry project slug
    #[arg(long)]
    pub project: Option<String>,

    /// Event message to match
    #[arg(long, default_value = "")]
    pub message: String,

    /// Treat --message as a regular expression
    #[arg(long)]
    pub regexp: bool,

    /// Tag filter as key=value; repeat or separate with commas
    #[arg(long = "tag", value_name = "KEY=VALUE", value_delimiter = ',')]
    pub tags: Vec<String>,
}

pub async fn run(
    args: SentryArgs,
    global: &GlobalArgs,
    file: &FileConfig,
) -> anyhow::Result<RunOutcome> {
    let section = file.sentry.clone().unwrap_or_default();

    let options = SentryOptions {
        address: address(args.address, section.address, DEFAULT_ADDRESS),
        api_key: pick(args.api_key, section.api_key).unwrap_or_default(),
        organization: pick(args.organization, section.organization).unwrap_or_default(),
        project: pick(args.project, section.project).unwrap_or_default(),
        message: args.message,
        use_regex: args.regexp,
        tags: parse_tags(&args.tags),
    };

    let backend = SentryBackend::new(options).context("invalid sentry settings")?;

    super::watch(&args.release, global, file, &backend).await
}
