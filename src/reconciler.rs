use crate::aws::{ClusterDirectory, ParameterStore};
use crate::config::RunConfig;
use crate::error::Error;
use crate::fingerprint::{fingerprint, select};
use crate::metrics::ERRORS;
use crate::tls::{self, TlsDialer};
use std::fmt;
use std::sync::Arc;

pub struct Context {
    pub config: RunConfig,
    pub clusters: Arc<dyn ClusterDirectory>,
    pub store: Arc<dyn ParameterStore>,
    pub dialer: Arc<dyn TlsDialer>,
}

/// How a successful reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The parameter was already present and overwriting is off.
    Skipped { key: String },
    Published { key: String, fingerprint: String },
}

impl Outcome {
    pub fn metric_label(&self) -> &'static str {
        match self {
            Outcome::Skipped { .. } => "skipped",
            Outcome::Published { .. } => "published",
        }
    }
}

/// The step a reconciliation was on when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CheckExisting,
    ResolveIssuer,
    ReadChain,
    SelectAndFingerprint,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::CheckExisting => "check_existing",
            Stage::ResolveIssuer => "resolve_issuer",
            Stage::ReadChain => "read_chain",
            Stage::SelectAndFingerprint => "select_and_fingerprint",
            Stage::Publish => "publish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{stage}: {error}")]
pub struct Failure {
    pub stage: Stage,
    #[source]
    pub error: Error,
}

fn at(stage: Stage) -> impl FnOnce(Error) -> Failure {
    move |error| Failure { stage, error }
}

/// Bring one cluster's published fingerprint in line with its issuer.
///
/// Failures are returned, never raised: the caller decides how to count them.
pub async fn reconcile(cluster: &str, ctx: &Context) -> Result<Outcome, Failure> {
    let config = &ctx.config;
    let key = config.key_prefix.key_for(cluster);
    tracing::debug!(%cluster, %key, "Reconciling");

    if !config.overwrite_existing {
        tracing::debug!(%cluster, %key, "Checking for existing parameter");
        if ctx.store.exists(&key).await.map_err(at(Stage::CheckExisting))? {
            tracing::info!(%cluster, %key, "Parameter already exists, skipping");
            return Ok(Outcome::Skipped { key });
        }
    }

    let issuer = ctx
        .clusters
        .describe_issuer(cluster)
        .await
        .map_err(at(Stage::ResolveIssuer))?;

    let chain = tls::read_chain(ctx.dialer.as_ref(), &issuer, config.verify_chain)
        .await
        .map_err(at(Stage::ReadChain))?;

    let cert =
        select(&chain, config.certificate_reverse_index).map_err(at(Stage::SelectAndFingerprint))?;
    let digest = fingerprint(cert);

    tracing::debug!(%cluster, %key, "Setting parameter");
    ctx.store
        .put(&key, &digest, config.overwrite_existing)
        .await
        .map_err(at(Stage::Publish))?;

    tracing::info!(%cluster, %key, fingerprint = %digest, %issuer, "Published fingerprint");
    Ok(Outcome::Published {
        key,
        fingerprint: digest,
    })
}

/// Record a failed reconciliation. The run carries on with the next cluster.
pub fn error_policy(cluster: &str, failure: &Failure) {
    tracing::error!(
        %cluster,
        stage = %failure.stage,
        error = %failure.error,
        "Reconciliation error"
    );
    ERRORS
        .with_label_values(&[failure.error.metric_label()])
        .inc();
}
