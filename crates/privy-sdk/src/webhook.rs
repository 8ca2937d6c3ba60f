//! Webhook delivery verification.
//!
//! Privy delivers webhooks through Svix. Each delivery carries three headers:
//!
//! - `svix-id`: the delivery id
//! - `svix-timestamp`: Unix seconds at which the delivery was signed
//! - `svix-signature`: space-separated `v1,<base64>` HMAC-SHA256 signatures of
//!   `"{id}.{timestamp}.{body}"`
//!
//! The body is only decoded after the timestamp and one of the signatures check out.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::HeaderMap;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use privy_core::Event;

use crate::config::PrivyConfig;
use crate::error::{PrivyError, Result, SignatureFailure};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery id.
pub const ID_HEADER: &str = "svix-id";
/// Header carrying the signing timestamp.
pub const TIMESTAMP_HEADER: &str = "svix-timestamp";
/// Header carrying the signature candidates.
pub const SIGNATURE_HEADER: &str = "svix-signature";

/// Maximum distance between the signing timestamp and the current time, either way.
pub const TOLERANCE_SECONDS: u64 = 5 * 60;

const KEY_PREFIX: &str = "whsec_";
const SIGNATURE_VERSION: &str = "v1";

/// One inbound webhook delivery, as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEnvelope {
    /// Delivery id.
    pub id: String,
    /// Signing time in Unix seconds.
    pub timestamp: i64,
    /// One or more space-separated signature candidates.
    pub signature: String,
    /// The raw request body.
    pub body: Vec<u8>,
}

impl WebhookEnvelope {
    /// Create an envelope from its parts.
    pub fn new(
        id: impl Into<String>,
        timestamp: i64,
        signature: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            signature: signature.into(),
            body: body.into(),
        }
    }

    /// Build an envelope from the delivery headers and the raw body.
    ///
    /// # Errors
    ///
    /// Returns `SignatureInvalid(MalformedHeader)` if a header is missing, is not
    /// visible ASCII, or the timestamp is not an integer.
    pub fn from_headers(headers: &HeaderMap, body: impl Into<Vec<u8>>) -> Result<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .ok_or_else(|| {
                    tracing::debug!(header = name, "Missing or unreadable webhook header");
                    PrivyError::SignatureInvalid(SignatureFailure::MalformedHeader)
                })
        };

        let id = header(ID_HEADER)?;
        let timestamp = header(TIMESTAMP_HEADER)?
            .trim()
            .parse()
            .map_err(|_| PrivyError::SignatureInvalid(SignatureFailure::MalformedHeader))?;
        let signature = header(SIGNATURE_HEADER)?;

        Ok(Self::new(id, timestamp, signature, body))
    }
}

/// Verifies webhook deliveries signed with one signing key.
#[derive(Clone)]
pub struct WebhookVerifier {
    mac: HmacSha256,
}

impl WebhookVerifier {
    /// Create a verifier from a signing key in its `whsec_<base64>` form. The prefix
    /// is optional.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if the key is not valid base64.
    pub fn new(signing_key: &str) -> Result<Self> {
        let encoded = signing_key.trim();
        let encoded = encoded.strip_prefix(KEY_PREFIX).unwrap_or(encoded);

        let key = BASE64
            .decode(encoded)
            .map_err(|e| PrivyError::Config(format!("invalid webhook signing key: {e}")))?;
        let mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| PrivyError::Config(format!("invalid webhook signing key: {e}")))?;

        Ok(Self { mac })
    }

    /// Create a verifier from the configured `webhook_signing_key`.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if no key is configured or it is invalid.
    pub fn from_config(config: &PrivyConfig) -> Result<Self> {
        let key = config
            .webhook_signing_key
            .as_deref()
            .ok_or_else(|| PrivyError::Config("webhook_signing_key is not set".to_string()))?;
        Self::new(key)
    }

    /// Compute the `v1,<base64>` signature of a delivery.
    #[must_use]
    pub fn sign(&self, id: &str, timestamp: i64, body: &[u8]) -> String {
        format!(
            "{SIGNATURE_VERSION},{}",
            BASE64.encode(self.digest(id, timestamp, body))
        )
    }

    /// Verify a delivery against the current time and decode its event.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, envelope: &WebhookEnvelope) -> Result<Event> {
        self.verify_at(envelope, Utc::now())
    }

    /// Verify a delivery as of `now` and decode its event.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid(TimestampOutOfTolerance)` if the delivery was signed more
    ///   than five minutes before or after `now`
    /// - `SignatureInvalid(Mismatch)` if no `v1` candidate matches
    /// - `PayloadUnreadable` if the verified body is not an event
    pub fn verify_at(&self, envelope: &WebhookEnvelope, now: DateTime<Utc>) -> Result<Event> {
        if now.timestamp().abs_diff(envelope.timestamp) > TOLERANCE_SECONDS {
            tracing::warn!(
                webhook_id = %envelope.id,
                timestamp = envelope.timestamp,
                "Webhook timestamp outside tolerance"
            );
            return Err(PrivyError::SignatureInvalid(
                SignatureFailure::TimestampOutOfTolerance,
            ));
        }

        let expected = self.digest(&envelope.id, envelope.timestamp, &envelope.body);

        let matched = envelope
            .signature
            .split_whitespace()
            .filter_map(|candidate| candidate.split_once(','))
            .filter(|(version, _)| *version == SIGNATURE_VERSION)
            .filter_map(|(_, signature)| BASE64.decode(signature).ok())
            .any(|signature| bool::from(expected.as_slice().ct_eq(&signature[..])));

        if !matched {
            tracing::warn!(webhook_id = %envelope.id, "Webhook signature mismatch");
            return Err(PrivyError::SignatureInvalid(SignatureFailure::Mismatch));
        }

        let event: Event =
            serde_json::from_slice(&envelope.body).map_err(PrivyError::PayloadUnreadable)?;
        tracing::debug!(
            webhook_id = %envelope.id,
            event_type = event.event_type(),
            "Webhook verified"
        );

        Ok(event)
    }

    fn digest(&self, id: &str, timestamp: i64, body: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.update(b".");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac.finalize().into_bytes().to_vec()
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}
