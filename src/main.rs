mod aws;
mod config;
mod error;
mod fingerprint;
mod metrics;
mod reconciler;
mod run;
mod server;
mod tls;

use crate::aws::Metered;
use crate::config::{
    DEFAULT_CERTIFICATE_REVERSE_INDEX, DEFAULT_KEY_PREFIX, DEFAULT_REGION, KeyPrefix, RunConfig,
};
use crate::reconciler::Context;
use crate::tls::RustlsDialer;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Publish the TLS fingerprint of every EKS cluster's OIDC issuer to SSM.
#[derive(Parser, Debug)]
#[command(name = "oidc-fingerprint-indexer", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every cluster once, configured from flags.
    Run(RunArgs),
    /// Serve on-demand runs over HTTP, configured from the environment.
    Serve,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Reverse index of the certificate to fingerprint within chain, defaults to last cert defined.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CERTIFICATE_REVERSE_INDEX)]
    cert_reverse_index: usize,

    /// AWS region. A non-empty AWS_REGION overrides this.
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// SSM parameter key prefix.
    #[arg(long, value_name = "PREFIX", default_value = DEFAULT_KEY_PREFIX)]
    ssm_key_prefix: KeyPrefix,

    /// Overwrite SSM parameters.
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    ssm_overwrite: bool,

    /// Verify TLS certificate chains on read.
    #[arg(
        long,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    verify_cert_chain: bool,
}

impl From<RunArgs> for RunConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            certificate_reverse_index: args.cert_reverse_index,
            key_prefix: args.ssm_key_prefix,
            overwrite_existing: args.ssm_overwrite,
            verify_chain: args.verify_cert_chain,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("Starting oidc-fingerprint-indexer");

    match Cli::parse().command {
        Command::Run(args) => {
            let region = config::resolve_region(Some(args.region.as_str()));
            let ctx = context(args.into(), region).await;
            run::run(&ctx).await?;
        }
        Command::Serve => {
            let cfg = RunConfig::from_env()?;
            let probe_addr = config::probe_addr_from_env();
            let region = config::resolve_region(None);
            let ctx = Arc::new(context(cfg, region).await);

            tokio::select! {
                result = server::serve(probe_addr, ctx) => result?,
                _ = signal::ctrl_c() => tracing::debug!("Shutting down"),
            }
        }
    }

    Ok(())
}

async fn context(config: RunConfig, region: Option<String>) -> Context {
    let sdk_config = aws::load_sdk_config(region).await;
    let (clusters, store) = aws::create_clients(&sdk_config);

    Context {
        config,
        clusters,
        store,
        dialer: Arc::new(Metered::new(RustlsDialer)),
    }
}
