use crate::error::Error;
use crate::metrics::{RECONCILE_COUNT, RECONCILE_DURATION, RUN_FAILURES};
use crate::reconciler::{Context, Outcome, error_policy, reconcile};
use serde::Serialize;

/// Tally of one run. Owned by the run, never shared between runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub clusters: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Published { .. } => self.published += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Reconcile every cluster once, in order.
///
/// Only a failed listing aborts the run. Individual cluster failures are
/// logged and counted, and turn the final result into
/// [`Error::PartialFailure`] once every cluster has had its turn.
pub async fn run(ctx: &Context) -> Result<RunSummary, Error> {
    tracing::info!(provider = ctx.clusters.provider_name(), "Listing clusters");
    let clusters = ctx.clusters.list_clusters().await.inspect_err(|error| {
        tracing::error!(%error, "Unable to list clusters");
    })?;

    let mut summary = RunSummary {
        clusters: clusters.len(),
        ..RunSummary::default()
    };

    for cluster in &clusters {
        let timer = RECONCILE_DURATION.start_timer();
        let result = reconcile(cluster, ctx).await;
        timer.observe_duration();

        match result {
            Ok(outcome) => {
                RECONCILE_COUNT
                    .with_label_values(&[outcome.metric_label()])
                    .inc();
                summary.record(&outcome);
            }
            Err(failure) => {
                RECONCILE_COUNT.with_label_values(&["failed"]).inc();
                error_policy(cluster, &failure);
                summary.failed += 1;
            }
        }
    }

    RUN_FAILURES.set(i64::try_from(summary.failed).unwrap_or(i64::MAX));
    tracing::info!(
        clusters = summary.clusters,
        published = summary.published,
        skipped = summary.skipped,
        failed = summary.failed,
        "Run finished"
    );

    if summary.failed > 0 {
        return Err(Error::PartialFailure {
            failures: summary.failed,
        });
    }

    Ok(summary)
}
