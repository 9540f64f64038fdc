use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unable to list clusters: {0}")]
    List(#[source] BoxError),

    #[error("unable to describe cluster OIDC issuer: {0}")]
    Describe(#[source] BoxError),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("invalid URL scheme '{0}', supported schemes: [https]")]
    UnsupportedScheme(String),

    #[error("unable to read certificates from {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate reverse index {reverse_index} out of range for chain of {chain_len}")]
    IndexOutOfRange {
        reverse_index: usize,
        chain_len: usize,
    },

    #[error("parameter store error: {0}")]
    Store(#[source] BoxError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("indexer experienced {failures} failure(s) during run")]
    PartialFailure { failures: usize },
}

impl Error {
    /// Returns a label-safe string for metrics.
    /// Keep cardinality low — don't use dynamic strings.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::List(_) => "list",
            Error::Describe(_) => "describe",
            Error::InvalidUrl(_) => "invalid_url",
            Error::UnsupportedScheme(_) => "unsupported_scheme",
            Error::Connection { .. } => "connection",
            Error::IndexOutOfRange { .. } => "index_out_of_range",
            Error::Store(_) => "store",
            Error::Config(_) => "config",
            Error::PartialFailure { .. } => "partial_failure",
        }
    }
}
