mod eks;
#[cfg(test)]
pub mod mock;
mod ssm;

pub use eks::EksDirectory;
pub use ssm::SsmStore;

use crate::error::{BoxError, Error};
use crate::metrics::API_CALL_DURATION;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_ssm::error::DisplayErrorContext;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Source of clusters and their OIDC issuers.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// All cluster names, across every page of results.
    async fn list_clusters(&self) -> Result<Vec<String>, Error>;

    /// The cluster's OIDC issuer URL.
    async fn describe_issuer(&self, cluster: &str) -> Result<String, Error>;
}

/// Flat string key/value store the fingerprints are published to.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Whether `key` is present, whatever its value.
    ///
    /// Only a definite "not found" answer is `Ok(false)`; any other failure
    /// is an [`Error::Store`].
    async fn exists(&self, key: &str) -> Result<bool, Error>;

    /// Write a plain string parameter. With `overwrite` false the store
    /// rejects the write if the key already exists.
    async fn put(&self, key: &str, value: &str, overwrite: bool) -> Result<(), Error>;
}

/// Wrapper which adds call latency metrics to any capability.
pub struct Metered<T> {
    pub(crate) inner: T,
}

impl<T> Metered<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub(crate) async fn observe<F, R>(&self, provider: &str, operation: &str, call: F) -> R
    where
        F: Future<Output = R>,
    {
        let start = Instant::now();
        let result = call.await;

        API_CALL_DURATION
            .with_label_values(&[provider, operation])
            .observe(start.elapsed().as_secs_f64());

        result
    }
}

#[async_trait]
impl<T: ClusterDirectory> ClusterDirectory for Metered<T> {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        self.observe(self.provider_name(), "list_clusters", self.inner.list_clusters())
            .await
    }

    async fn describe_issuer(&self, cluster: &str) -> Result<String, Error> {
        self.observe(
            self.provider_name(),
            "describe_cluster",
            self.inner.describe_issuer(cluster),
        )
        .await
    }
}

#[async_trait]
impl<T: ParameterStore> ParameterStore for Metered<T> {
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.observe(self.provider_name(), "get_parameter", self.inner.exists(key))
            .await
    }

    async fn put(&self, key: &str, value: &str, overwrite: bool) -> Result<(), Error> {
        self.observe(
            self.provider_name(),
            "put_parameter",
            self.inner.put(key, value, overwrite),
        )
        .await
    }
}

/// Render an SDK error with its whole source chain.
///
/// Timeouts, dispatch failures and credential errors only say "unhandled
/// error" through the SDK's own `Display`; the cause is further down.
pub(crate) fn sdk_error<E: std::error::Error>(err: E) -> BoxError {
    DisplayErrorContext(err).to_string().into()
}

/// Load the shared SDK configuration from the ambient credential chain.
/// Without a region the SDK's own resolution applies.
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(Region::new(region));
    }
    loader.load().await
}

/// Build the metered EKS directory and SSM store for one SDK configuration.
pub fn create_clients(
    sdk_config: &SdkConfig,
) -> (Arc<dyn ClusterDirectory>, Arc<dyn ParameterStore>) {
    (
        Arc::new(Metered::new(EksDirectory::new(sdk_config))),
        Arc::new(Metered::new(SsmStore::new(sdk_config))),
    )
}
