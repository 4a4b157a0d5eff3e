//! Envelope filter: activation policy, body transforms and counters.

use http::HeaderMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::binding::{RequestBinding, HEADER_ENCRYPTION_ENABLED};
use crate::envelope::Envelope;
use tokenvault_common::{Result, TransportSettings};
use tokenvault_crypto::SecretMaterial;

/// Counters for envelope processing.
#[derive(Debug, Default)]
struct Counters {
    decrypted_requests: AtomicU64,
    encrypted_responses: AtomicU64,
    decrypt_failures: AtomicU64,
    encryption_fallbacks: AtomicU64,
}

/// Point-in-time view of the filter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterMetrics {
    pub decrypted_requests: u64,
    pub encrypted_responses: u64,
    pub decrypt_failures: u64,
    /// Responses sent unencrypted because sealing failed or the body was too large.
    pub encryption_fallbacks: u64,
}

/// Transport envelope filter.
///
/// Holds read-only settings and the process secret; safe to share across
/// request tasks.
pub struct EnvelopeFilter {
    settings: TransportSettings,
    secrets: Arc<SecretMaterial>,
    counters: Counters,
}

impl EnvelopeFilter {
    pub fn new(settings: TransportSettings, secrets: Arc<SecretMaterial>) -> Self {
        Self {
            settings,
            secrets,
            counters: Counters::default(),
        }
    }

    /// Build a filter over the process-wide secret material.
    ///
    /// # Errors
    /// - `Config` if secret material was never installed
    pub fn from_global(settings: TransportSettings) -> Result<Self> {
        Ok(Self::new(settings, SecretMaterial::global()?))
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Whether envelope processing applies to a request.
    ///
    /// Requires the global switch, a path outside the exclusion list and
    /// the client's `X-Encryption-Enabled: true` signal.
    pub fn is_active(&self, path: &str, headers: &HeaderMap) -> bool {
        if !self.settings.enabled || self.settings.is_excluded(path) {
            return false;
        }
        headers
            .get(HEADER_ENCRYPTION_ENABLED)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Open an inbound envelope body bound to `binding`.
    pub fn decrypt_request(&self, binding: &RequestBinding, body: &[u8]) -> Result<Vec<u8>> {
        let result = Envelope::from_slice(body)
            .and_then(|envelope| envelope.open(self.secrets.transport_key(), &binding.aad()));

        match &result {
            Ok(_) => {
                self.counters.decrypted_requests.fetch_add(1, Ordering::Relaxed);
                debug!(
                    method = %binding.method,
                    path = %binding.path,
                    "Decrypted request envelope"
                );
            }
            Err(err) => {
                self.record_decrypt_failure();
                warn!(
                    method = %binding.method,
                    path = %binding.path,
                    error = %err,
                    "Request envelope rejected"
                );
            }
        }
        result
    }

    /// Seal an outbound body bound to `binding` and serialize the envelope.
    ///
    /// A failure is counted as a fallback; the caller emits the plaintext.
    pub fn encrypt_response(&self, binding: &RequestBinding, body: &[u8]) -> Result<Vec<u8>> {
        let result = Envelope::seal(self.secrets.transport_key(), body, &binding.aad())
            .and_then(|envelope| envelope.to_vec());

        match &result {
            Ok(_) => {
                self.counters.encrypted_responses.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.record_fallback();
                warn!(
                    method = %binding.method,
                    path = %binding.path,
                    error = %err,
                    "Response encryption failed, sending plaintext"
                );
            }
        }
        result
    }

    pub fn record_decrypt_failure(&self) {
        self.counters.decrypt_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fallback(&self) {
        self.counters.encryption_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn metrics(&self) -> FilterMetrics {
        FilterMetrics {
            decrypted_requests: self.counters.decrypted_requests.load(Ordering::Relaxed),
            encrypted_responses: self.counters.encrypted_responses.load(Ordering::Relaxed),
            decrypt_failures: self.counters.decrypt_failures.load(Ordering::Relaxed),
            encryption_fallbacks: self.counters.encryption_fallbacks.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use tokenvault_crypto::MasterKey;

    fn filter(enabled: bool) -> EnvelopeFilter {
        let settings = TransportSettings {
            enabled,
            excluded_paths: vec!["/health".to_string(), "/public/*".to_string()],
            ..TransportSettings::default()
        };
        let secrets = SecretMaterial::new(MasterKey::from_bytes([9u8; 32])).unwrap();
        EnvelopeFilter::new(settings, Arc::new(secrets))
    }

    fn signalled() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ENCRYPTION_ENABLED, HeaderValue::from_static("TRUE"));
        headers
    }

    #[test]
    fn test_activation_requires_all_conditions() {
        let on = filter(true);
        assert!(on.is_active("/api/tokens", &signalled()));
        assert!(!on.is_active("/api/tokens", &HeaderMap::new()));
        assert!(!on.is_active("/health", &signalled()));
        assert!(!on.is_active("/public/docs/index", &signalled()));
        assert!(on.is_active("/healthz", &signalled()));

        let off = filter(false);
        assert!(!off.is_active("/api/tokens", &signalled()));
    }

    #[test]
    fn test_false_signal_disables() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ENCRYPTION_ENABLED, HeaderValue::from_static("false"));
        assert!(!filter(true).is_active("/api/tokens", &headers));
    }

    #[test]
    fn test_response_then_request_roundtrip() {
        let filter = filter(true);
        let binding = RequestBinding::new("POST", "/api/tokens", "r1", "s1");

        let sealed = filter.encrypt_response(&binding, b"{\"ok\":true}").unwrap();
        let opened = filter.decrypt_request(&binding, &sealed).unwrap();
        assert_eq!(opened, b"{\"ok\":true}");

        let metrics = filter.metrics();
        assert_eq!(metrics.encrypted_responses, 1);
        assert_eq!(metrics.decrypted_requests, 1);
        assert_eq!(metrics.decrypt_failures, 0);
    }

    #[test]
    fn test_binding_mismatch_counts_failure() {
        let filter = filter(true);
        let sealed = filter
            .encrypt_response(&RequestBinding::new("POST", "/a", "", ""), b"{}")
            .unwrap();

        assert!(filter
            .decrypt_request(&RequestBinding::new("PUT", "/a", "", ""), &sealed)
            .is_err());
        assert!(filter
            .decrypt_request(&RequestBinding::new("POST", "/a", "", ""), b"plain json")
            .is_err());
        assert_eq!(filter.metrics().decrypt_failures, 2);
    }
}
