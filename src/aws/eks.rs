use crate::aws::ClusterDirectory;
use crate::aws::sdk_error;
use crate::error::Error;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eks::Client;

pub struct EksDirectory {
    client: Client,
}

impl EksDirectory {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterDirectory for EksDirectory {
    fn provider_name(&self) -> &'static str {
        "eks"
    }

    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        tracing::debug!("Listing clusters");
        let mut pages = self.client.list_clusters().into_paginator().items().send();

        let mut clusters = Vec::new();
        while let Some(cluster) = pages.next().await {
            clusters.push(cluster.map_err(|err| Error::List(sdk_error(err)))?);
        }

        Ok(clusters)
    }

    async fn describe_issuer(&self, cluster: &str) -> Result<String, Error> {
        tracing::debug!(%cluster, "Describing cluster");
        let response = self
            .client
            .describe_cluster()
            .name(cluster)
            .send()
            .await
            .map_err(|err| Error::Describe(sdk_error(err)))?;

        response
            .cluster()
            .and_then(|c| c.identity())
            .and_then(|identity| identity.oidc())
            .and_then(|oidc| oidc.issuer())
            .map(str::to_string)
            .ok_or_else(|| Error::Describe(format!("cluster {cluster} has no OIDC issuer").into()))
    }
}
