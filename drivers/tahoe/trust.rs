//! TLS trust policy for the gateway connection.
//!
//! The policy is resolved once at construction and baked into the HTTP
//! client; no global validation hooks are installed anywhere.

use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, ServerName};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{BackendError, Result};

/// How the certificate presented by the gateway is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Standard platform validation.
    System,
    /// All certificate checks disabled.
    AcceptAny,
    /// Exactly one certificate accepted, by digest of its DER encoding.
    /// A 20-byte value compares SHA-1, a 32-byte value SHA-256.
    Fingerprint(Vec<u8>),
}

impl TrustPolicy {
    /// Derive the policy from the option set.
    ///
    /// Plain-http endpoints always get `System` (the policy is never
    /// consulted without TLS). When both overrides are present, accept-any
    /// wins.
    pub fn from_options(use_ssl: bool, accept_any: bool, fingerprint: Option<&str>) -> Result<Self> {
        if !use_ssl {
            return Ok(TrustPolicy::System);
        }
        if accept_any {
            return Ok(TrustPolicy::AcceptAny);
        }
        match fingerprint {
            Some(hash) if !hash.trim().is_empty() => {
                Ok(TrustPolicy::Fingerprint(parse_fingerprint(hash)?))
            }
            _ => Ok(TrustPolicy::System),
        }
    }

    /// Configure a client builder for this policy.
    pub fn apply(&self, builder: reqwest::ClientBuilder) -> reqwest::ClientBuilder {
        match self {
            TrustPolicy::System => builder,
            TrustPolicy::AcceptAny => builder.danger_accept_invalid_certs(true),
            TrustPolicy::Fingerprint(digest) => {
                let tls = ClientConfig::builder()
                    .with_safe_defaults()
                    .with_custom_certificate_verifier(Arc::new(FingerprintVerifier {
                        pinned: digest.clone(),
                    }))
                    .with_no_client_auth();
                builder.use_preconfigured_tls(tls)
            }
        }
    }
}

/// Parse a hex fingerprint. Case-insensitive, `:` separators allowed.
fn parse_fingerprint(hash: &str) -> Result<Vec<u8>> {
    let cleaned: String = hash.trim().chars().filter(|c| *c != ':').collect();
    let digest = hex::decode(&cleaned).map_err(|e| {
        BackendError::Configuration(format!("invalid certificate fingerprint {:?}: {}", hash, e))
    })?;
    match digest.len() {
        20 | 32 => Ok(digest),
        n => Err(BackendError::Configuration(format!(
            "certificate fingerprint must be a SHA-1 or SHA-256 digest, got {} bytes",
            n
        ))),
    }
}

/// Accepts the one certificate whose digest matches the pinned value,
/// regardless of chain validity.
struct FingerprintVerifier {
    pinned: Vec<u8>,
}

impl ServerCertVerifier for FingerprintVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let presented = match self.pinned.len() {
            20 => Sha1::digest(&end_entity.0).to_vec(),
            _ => Sha256::digest(&end_entity.0).to_vec(),
        };
        if presented == self.pinned {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(format!(
                "certificate fingerprint {} does not match the pinned value",
                hex::encode(presented)
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_never_activates_a_policy() {
        let policy = TrustPolicy::from_options(false, true, Some("zz-not-hex")).unwrap();
        assert_eq!(policy, TrustPolicy::System);
    }

    #[test]
    fn accept_any_wins_over_fingerprint() {
        let sha256 = "ab".repeat(32);
        let policy = TrustPolicy::from_options(true, true, Some(&sha256)).unwrap();
        assert_eq!(policy, TrustPolicy::AcceptAny);
    }

    #[test]
    fn parses_hex_fingerprints() {
        let policy = TrustPolicy::from_options(true, false, Some(&"ab".repeat(32))).unwrap();
        assert_eq!(policy, TrustPolicy::Fingerprint(vec![0xab; 32]));

        let colon_separated = vec!["AB"; 20].join(":");
        let policy = TrustPolicy::from_options(true, false, Some(&colon_separated)).unwrap();
        assert_eq!(policy, TrustPolicy::Fingerprint(vec![0xab; 20]));
    }

    #[test]
    fn rejects_malformed_fingerprints() {
        let err = TrustPolicy::from_options(true, false, Some("not hex")).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));

        // valid hex, wrong digest length
        let err = TrustPolicy::from_options(true, false, Some("abcd")).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn blank_fingerprint_means_standard_validation() {
        let policy = TrustPolicy::from_options(true, false, Some("  ")).unwrap();
        assert_eq!(policy, TrustPolicy::System);
        let policy = TrustPolicy::from_options(true, false, None).unwrap();
        assert_eq!(policy, TrustPolicy::System);
    }

    #[test]
    fn verifier_accepts_only_the_pinned_certificate() {
        let der = b"not-a-real-certificate".to_vec();
        let verifier = FingerprintVerifier {
            pinned: Sha256::digest(&der).to_vec(),
        };
        let name = ServerName::try_from("gateway.example").unwrap();

        let mut scts = std::iter::empty::<&[u8]>();
        assert!(verifier
            .verify_server_cert(
                &Certificate(der.clone()),
                &[],
                &name,
                &mut scts,
                &[],
                SystemTime::now()
            )
            .is_ok());

        let mut scts = std::iter::empty::<&[u8]>();
        assert!(verifier
            .verify_server_cert(
                &Certificate(b"some other certificate".to_vec()),
                &[],
                &name,
                &mut scts,
                &[],
                SystemTime::now()
            )
            .is_err());
    }
}
