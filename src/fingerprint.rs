//! Certificate selection and fingerprinting.
//!
//! The fingerprint is the SHA-1 digest of a certificate's DER encoding,
//! rendered as lowercase hex. This is the thumbprint format IAM expects for
//! OIDC identity providers, so published values can be compared across runs.

use crate::error::Error;
use rustls::pki_types::CertificateDer;
use sha1::{Digest, Sha1};

/// Pick a certificate counting from the end of the chain.
///
/// `reverse_index` 0 selects the last certificate, 1 the one before it, and
/// so on. Indexes that run past the front of the chain are a configuration
/// problem, reported as [`Error::IndexOutOfRange`].
pub fn select<'a, 'c>(
    chain: &'a [CertificateDer<'c>],
    reverse_index: usize,
) -> Result<&'a CertificateDer<'c>, Error> {
    reverse_index
        .checked_add(1)
        .and_then(|offset| chain.len().checked_sub(offset))
        .and_then(|index| chain.get(index))
        .ok_or(Error::IndexOutOfRange {
            reverse_index,
            chain_len: chain.len(),
        })
}

/// Compute the SHA-1 fingerprint of a DER-encoded certificate.
///
/// Returns 40 lowercase hex characters.
pub fn fingerprint(cert_der: &[u8]) -> String {
    format!("{:x}", Sha1::digest(cert_der))
}
