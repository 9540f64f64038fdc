use crate::error::Error;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

pub const DEFAULT_CERTIFICATE_REVERSE_INDEX: usize = 0;
pub const DEFAULT_KEY_PREFIX: &str = "/eks_cluster_oidc_fingerprints/";
pub const DEFAULT_OVERWRITE_EXISTING: bool = false;
pub const DEFAULT_VERIFY_CHAIN: bool = true;
pub const DEFAULT_REGION: &str = "us-west-2";

const DEFAULT_PROBE_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));

const REGION_ENV: &str = "AWS_REGION";

/// Parameter key prefix, always of the form `/segment[/segment...]/`.
///
/// Allowed characters are `[A-Za-z0-9_/.-]`, the prefix must start and end
/// with `/`, and there must be at least one character in between. The
/// trailing separator lets a cluster name be appended to form a unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parameter key for a cluster.
    pub fn key_for(&self, cluster: &str) -> String {
        format!("{}{}", self.0, cluster)
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self(DEFAULT_KEY_PREFIX.to_string())
    }
}

impl FromStr for KeyPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
            .ok_or_else(|| Error::Config(format!("key prefix '{s}' must start and end with '/'")))?;

        let valid = !inner.is_empty()
            && inner
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '-'));

        if !valid {
            return Err(Error::Config(format!(
                "key prefix '{s}' must match ^/[A-Za-z0-9_/.-]+/$"
            )));
        }

        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a single indexer run. Immutable once built.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Position counted from the end of the chain; 0 is the last certificate.
    pub certificate_reverse_index: usize,
    pub key_prefix: KeyPrefix,
    pub overwrite_existing: bool,
    pub verify_chain: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            certificate_reverse_index: DEFAULT_CERTIFICATE_REVERSE_INDEX,
            key_prefix: KeyPrefix::default(),
            overwrite_existing: DEFAULT_OVERWRITE_EXISTING,
            verify_chain: DEFAULT_VERIFY_CHAIN,
        }
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Malformed booleans fall back to their defaults with a warning. A
    /// malformed key prefix or reverse index is rejected outright: either
    /// would publish a value other than the one asked for.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_prefix = match lookup("SSM_KEY_PREFIX") {
            Some(val) => val.parse()?,
            None => {
                tracing::info!(key = "SSM_KEY_PREFIX", "not set, using default '{DEFAULT_KEY_PREFIX}'");
                KeyPrefix::default()
            }
        };

        let certificate_reverse_index = match lookup("CERT_REVERSE_INDEX") {
            Some(val) => val.parse::<usize>().map_err(|err| {
                Error::Config(format!(
                    "CERT_REVERSE_INDEX '{val}' is not a non-negative integer: {err}"
                ))
            })?,
            None => {
                tracing::info!(
                    key = "CERT_REVERSE_INDEX",
                    "not set, using default '{DEFAULT_CERTIFICATE_REVERSE_INDEX}'"
                );
                DEFAULT_CERTIFICATE_REVERSE_INDEX
            }
        };

        Ok(Self {
            certificate_reverse_index,
            key_prefix,
            overwrite_existing: parse_var(&lookup, "SSM_OVERWRITE", DEFAULT_OVERWRITE_EXISTING),
            verify_chain: parse_var(&lookup, "VERIFY_CERT_CHAIN", DEFAULT_VERIFY_CHAIN),
        })
    }
}

/// Address for the probe and invocation server.
pub fn probe_addr_from_env() -> SocketAddr {
    parse_var(&|key: &str| std::env::var(key).ok(), "PROBE_ADDR", DEFAULT_PROBE_ADDR)
}

/// Resolve the AWS region. A non-empty `AWS_REGION` always wins over the
/// explicit setting.
pub fn resolve_region(explicit: Option<&str>) -> Option<String> {
    pick_region(std::env::var(REGION_ENV).ok(), explicit)
}

fn pick_region(env: Option<String>, explicit: Option<&str>) -> Option<String> {
    match env.filter(|r| !r.is_empty()) {
        Some(region) => {
            tracing::info!(%region, "setting region from env variable");
            Some(region)
        }
        None => {
            if let Some(region) = explicit {
                tracing::info!(%region, "setting region from explicit setting");
            }
            explicit.map(str::to_string)
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(val) => val.parse::<T>().unwrap_or_else(|err| {
            tracing::warn!(%key, %val, %err, "invalid value, using default '{default}'");
            default
        }),
        None => {
            tracing::info!(%key, "not set, using default '{default}'");
            default
        }
    }
}
