//! In-memory capabilities for tests. Every call is recorded so tests can
//! assert on what was, and wasn't, touched.

use super::{ClusterDirectory, ParameterStore};
use crate::config::RunConfig;
use crate::error::Error;
use crate::reconciler::Context;
use crate::tls::{CertificateChain, Endpoint, TlsDialer};
use async_trait::async_trait;
use rustls::pki_types::CertificateDer;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MockDirectory {
    /// `None` makes the listing call fail.
    pub clusters: Option<Vec<String>>,
    pub issuers: HashMap<String, String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockDirectory {
    pub fn new(clusters: &[(&str, &str)]) -> Self {
        Self {
            clusters: Some(clusters.iter().map(|(name, _)| name.to_string()).collect()),
            issuers: clusters
                .iter()
                .map(|(name, issuer)| (name.to_string(), issuer.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterDirectory for MockDirectory {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        self.calls.lock().unwrap().push("list".to_string());
        self.clusters
            .clone()
            .ok_or_else(|| Error::List("access denied".into()))
    }

    async fn describe_issuer(&self, cluster: &str) -> Result<String, Error> {
        self.calls.lock().unwrap().push(format!("describe:{cluster}"));
        self.issuers
            .get(cluster)
            .cloned()
            .ok_or_else(|| Error::Describe(format!("cluster {cluster} not found").into()))
    }
}

#[derive(Default)]
pub struct MockStore {
    pub params: Mutex<BTreeMap<String, String>>,
    /// Keys whose reads fail with something other than "not found".
    pub broken_reads: HashSet<String>,
    /// Keys whose writes fail.
    pub broken_writes: HashSet<String>,
    pub puts: Mutex<Vec<String>>,
    pub reads: Mutex<Vec<String>>,
}

impl MockStore {
    pub fn with(params: &[(&str, &str)]) -> Self {
        Self {
            params: Mutex::new(
                params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.params.lock().unwrap().get(key).cloned()
    }

    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ParameterStore for MockStore {
    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn exists(&self, key: &str) -> Result<bool, Error> {
        self.reads.lock().unwrap().push(key.to_string());
        if self.broken_reads.contains(key) {
            return Err(Error::Store("throttled".into()));
        }
        Ok(self.params.lock().unwrap().contains_key(key))
    }

    async fn put(&self, key: &str, value: &str, overwrite: bool) -> Result<(), Error> {
        self.puts.lock().unwrap().push(key.to_string());
        if self.broken_writes.contains(key) {
            return Err(Error::Store("write rejected".into()));
        }
        let mut params = self.params.lock().unwrap();
        if !overwrite && params.contains_key(key) {
            return Err(Error::Store(format!("parameter {key} already exists").into()));
        }
        params.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Serves a fixed chain per host. Unknown hosts fail to connect.
#[derive(Default)]
pub struct MockDialer {
    pub chains: HashMap<String, CertificateChain>,
    pub dials: Mutex<Vec<(Endpoint, bool)>>,
}

impl MockDialer {
    pub fn new(chains: &[(&str, CertificateChain)]) -> Self {
        Self {
            chains: chains
                .iter()
                .map(|(host, chain)| (host.to_string(), chain.clone()))
                .collect(),
            dials: Mutex::new(Vec::new()),
        }
    }

    pub fn dials(&self) -> Vec<(Endpoint, bool)> {
        self.dials.lock().unwrap().clone()
    }
}

#[async_trait]
impl TlsDialer for MockDialer {
    async fn dial(&self, endpoint: &Endpoint, verify: bool) -> Result<CertificateChain, Error> {
        self.dials.lock().unwrap().push((endpoint.clone(), verify));
        self.chains
            .get(&endpoint.host)
            .cloned()
            .ok_or_else(|| Error::Connection {
                endpoint: endpoint.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            })
    }
}

/// One set of doubles wired into a [`Context`], with handles kept for
/// assertions.
pub struct Harness {
    pub directory: Arc<MockDirectory>,
    pub store: Arc<MockStore>,
    pub dialer: Arc<MockDialer>,
}

impl Harness {
    pub fn new(directory: MockDirectory, store: MockStore, dialer: MockDialer) -> Self {
        Self {
            directory: Arc::new(directory),
            store: Arc::new(store),
            dialer: Arc::new(dialer),
        }
    }

    pub fn context(&self, config: RunConfig) -> Context {
        Context {
            config,
            clusters: self.directory.clone(),
            store: self.store.clone(),
            dialer: self.dialer.clone(),
        }
    }
}

/// A chain of `n` distinct fake certificates.
pub fn fake_chain(tag: &str, n: usize) -> CertificateChain {
    (0..n)
        .map(|i| CertificateDer::from(format!("{tag}-cert-{i}").into_bytes()))
        .collect()
}
