//! Identity token verification.
//!
//! Privy identity tokens are ES256 JWTs issued by `privy.io` for one application. Besides
//! the registered claims they carry a reduced user record:
//!
//! - `linked_accounts`: a JSON array encoded as a string, decoded in a second pass
//! - `custom_metadata`: an optional JSON object encoded as a string
//! - `guest`: `"t"` for guest users
//! - `cr`: creation time in Unix seconds, encoded as a string
//!
//! Signature and registered claims are checked first. A token that fails there is
//! rejected with a security error even if its custom claims are also broken.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use privy_core::{CustomMetadata, LinkedAccount, User};

use crate::error::{PrivyError, Result};

/// Issuer of every Privy identity token.
pub const ISSUER: &str = "privy.io";

/// Resolves the public key identity tokens are verified with.
#[async_trait]
pub trait VerificationKeyProvider: Send + Sync {
    /// Get the current verification key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be fetched or parsed.
    async fn verification_key(&self) -> Result<DecodingKey>;
}

#[async_trait]
impl<P: VerificationKeyProvider + ?Sized> VerificationKeyProvider for &P {
    async fn verification_key(&self) -> Result<DecodingKey> {
        (**self).verification_key().await
    }
}

#[async_trait]
impl<P: VerificationKeyProvider + ?Sized> VerificationKeyProvider for Arc<P> {
    async fn verification_key(&self) -> Result<DecodingKey> {
        (**self).verification_key().await
    }
}

/// A fixed verification key, for verifying tokens without calling the API.
#[derive(Clone)]
pub struct StaticVerificationKey(DecodingKey);

impl StaticVerificationKey {
    /// Parse an EC public key in PEM (`-----BEGIN PUBLIC KEY-----`) form, as found in
    /// the application settings.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::VerificationKey` if the PEM is not an EC public key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        parse_verification_key(pem).map(Self)
    }
}

#[async_trait]
impl VerificationKeyProvider for StaticVerificationKey {
    async fn verification_key(&self) -> Result<DecodingKey> {
        Ok(self.0.clone())
    }
}

/// Parse the PEM verification key published in the application settings.
pub(crate) fn parse_verification_key(pem: &str) -> Result<DecodingKey> {
    DecodingKey::from_ec_pem(pem.trim().as_bytes())
        .map_err(|e| PrivyError::VerificationKey(e.to_string()))
}

/// The user record carried by a verified identity token.
///
/// Tokens are size-limited, so this only holds what the token embeds. Use the REST
/// lookup when the full record is needed.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    /// The Privy DID of the user (`sub`).
    pub subject_id: String,
    /// Login methods linked to the user.
    pub linked_accounts: Vec<LinkedAccount>,
    /// Whether the user is a guest.
    pub is_guest: bool,
    /// Custom metadata, if the token carries any.
    pub custom_metadata: Option<CustomMetadata>,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
}

impl VerifiedIdentity {
    /// Convert into a partial [`User`] record.
    #[must_use]
    pub fn into_user(self) -> User {
        User {
            id: self.subject_id,
            created_at: Some(self.created_at),
            linked_accounts: self.linked_accounts,
            has_accepted_terms: false,
            is_guest: self.is_guest,
            custom_metadata: self.custom_metadata,
        }
    }
}

/// Claims as they appear in the token. Every custom claim is kept as raw JSON so that
/// decoding never fails before the registered claims have been validated.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<Value>,
    linked_accounts: Option<Value>,
    custom_metadata: Option<Value>,
    guest: Option<Value>,
    cr: Option<Value>,
}

/// Verifies identity tokens issued for one application.
pub struct IdentityTokenVerifier<P> {
    keys: P,
    validation: Validation,
}

impl<P: VerificationKeyProvider> IdentityTokenVerifier<P> {
    /// Create a verifier accepting tokens whose audience is `application_id`.
    pub fn new(application_id: &str, keys: P) -> Self {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.set_audience(&[application_id]);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        Self { keys, validation }
    }

    /// Verify a token and extract the identity it carries.
    ///
    /// # Errors
    ///
    /// - `TokenExpired`, `TokenNotYetValid`, `TokenSignatureInvalid`, `TokenIssuerInvalid`
    ///   or `TokenAudienceInvalid` if the token fails verification
    /// - `TokenMalformed` if the token cannot be parsed or its custom claims are invalid
    /// - the key provider's error if no verification key is available
    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        decode_header(token).map_err(|e| PrivyError::TokenMalformed(e.to_string()))?;

        let key = self.keys.verification_key().await?;

        let claims = decode::<RawClaims>(token, &key, &self.validation)
            .map_err(|e| {
                let err = token_error(&e);
                tracing::debug!(error = %e, "Identity token rejected");
                err
            })?
            .claims;

        let identity = extract_identity(claims)?;
        tracing::debug!(subject = %identity.subject_id, "Identity token verified");

        Ok(identity)
    }
}

fn token_error(e: &jsonwebtoken::errors::Error) -> PrivyError {
    match e.kind() {
        ErrorKind::ExpiredSignature => PrivyError::TokenExpired,
        ErrorKind::ImmatureSignature => PrivyError::TokenNotYetValid,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            PrivyError::TokenSignatureInvalid
        }
        ErrorKind::InvalidIssuer => PrivyError::TokenIssuerInvalid,
        ErrorKind::InvalidAudience => PrivyError::TokenAudienceInvalid,
        _ => PrivyError::TokenMalformed(e.to_string()),
    }
}

fn extract_identity(claims: RawClaims) -> Result<VerifiedIdentity> {
    let subject_id = match claims.sub {
        Some(Value::String(sub)) => sub,
        _ => return Err(PrivyError::TokenMalformed("sub is not a string".to_string())),
    };

    let linked_accounts = match claims.linked_accounts {
        Some(Value::String(encoded)) => serde_json::from_str::<Vec<LinkedAccount>>(&encoded)
            .map_err(|e| PrivyError::TokenMalformed(format!("linked_accounts: {e}")))?,
        _ => {
            return Err(PrivyError::TokenMalformed(
                "linked_accounts is not a string".to_string(),
            ))
        }
    };

    let custom_metadata = match claims.custom_metadata {
        Some(Value::String(encoded)) => Some(
            serde_json::from_str::<CustomMetadata>(&encoded)
                .map_err(|e| PrivyError::TokenMalformed(format!("custom_metadata: {e}")))?,
        ),
        _ => None,
    };

    let is_guest = matches!(claims.guest, Some(Value::String(ref guest)) if guest == "t");

    let created_at = claims
        .cr
        .as_ref()
        .and_then(unix_seconds)
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .ok_or_else(|| PrivyError::TokenMalformed("missing or invalid cr".to_string()))?;

    Ok(VerifiedIdentity {
        subject_id,
        linked_accounts,
        is_guest,
        custom_metadata,
        created_at,
    })
}

fn unix_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::String(seconds) => seconds.trim().parse().ok(),
        Value::Number(seconds) => seconds.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/es256_private.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/es256_public.pem");
    const UNRELATED_PUBLIC_KEY: &str = include_str!("../tests/fixtures/es256_unrelated_public.pem");

    const APP_ID: &str = "clpispdty00ycl80fpueukbhl";
    const USER_ID: &str = "did:privy:cfbsvtqo2c22202mo08847jdux2z";

    const LINKED_ACCOUNTS: &str = r#"[{"type":"email","address":"bilbo@privy.io","verified_at":969628260,"first_verified_at":969628260,"lv":969628261},{"type":"wallet","address":"0xABCDEF","chain_type":"ethereum","wallet_client":"privy","verified_at":969628260}]"#;

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    fn claims() -> Value {
        json!({
            "sid": "cm1lsx8yi00l3wh4hfxsqtsdq",
            "iss": ISSUER,
            "iat": now(),
            "aud": APP_ID,
            "sub": USER_ID,
            "exp": now() + 3600,
            "cr": "969628260",
            "linked_accounts": LINKED_ACCOUNTS,
            "custom_metadata": r#"{"plan":"pro","seats":3}"#,
        })
    }

    fn sign(claims: &Value) -> String {
        let key = EncodingKey::from_ec_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::ES256), claims, &key).unwrap()
    }

    fn with(mut claims: Value, field: &str, value: Value) -> Value {
        claims[field] = value;
        claims
    }

    fn without(mut claims: Value, field: &str) -> Value {
        claims.as_object_mut().unwrap().remove(field);
        claims
    }

    fn verifier() -> IdentityTokenVerifier<StaticVerificationKey> {
        IdentityTokenVerifier::new(APP_ID, StaticVerificationKey::from_pem(PUBLIC_KEY).unwrap())
    }

    /// Counts how often the key was requested.
    #[derive(Default)]
    struct CountingKeys(AtomicUsize);

    #[async_trait]
    impl VerificationKeyProvider for CountingKeys {
        async fn verification_key(&self) -> Result<DecodingKey> {
            self.0.fetch_add(1, Ordering::SeqCst);
            parse_verification_key(PUBLIC_KEY)
        }
    }

    #[tokio::test]
    async fn verifies_valid_token() {
        let identity = verifier().verify(&sign(&claims())).await.unwrap();

        assert_eq!(identity.subject_id, USER_ID);
        assert_eq!(identity.created_at.timestamp(), 969_628_260);
        assert!(!identity.is_guest);

        assert_eq!(identity.linked_accounts.len(), 2);
        let LinkedAccount::Email(email) = &identity.linked_accounts[0] else {
            panic!("expected email, got {:?}", identity.linked_accounts[0]);
        };
        assert_eq!(email.address.as_deref(), Some("bilbo@privy.io"));
        assert_eq!(
            email.verification.latest_verified_at.map(|at| at.timestamp()),
            Some(969_628_261)
        );
        assert!(matches!(identity.linked_accounts[1], LinkedAccount::Wallet(_)));

        let metadata = identity.custom_metadata.as_ref().unwrap();
        assert_eq!(metadata.get_string("plan"), Some("pro"));
        assert_eq!(metadata.get_number("seats"), Some(3));
    }

    #[tokio::test]
    async fn builds_partial_user() {
        let user = verifier().verify(&sign(&claims())).await.unwrap().into_user();

        assert_eq!(user.id, USER_ID);
        assert_eq!(user.email().and_then(|email| email.address.as_deref()), Some("bilbo@privy.io"));
        assert_eq!(user.wallet().and_then(|wallet| wallet.address.as_deref()), Some("0xABCDEF"));
        assert!(user.custom_metadata.is_some());
    }

    #[tokio::test]
    async fn guest_flag() {
        let guest = verifier()
            .verify(&sign(&with(claims(), "guest", json!("t"))))
            .await
            .unwrap();
        assert!(guest.is_guest);

        let not_guest = verifier()
            .verify(&sign(&with(claims(), "guest", json!("f"))))
            .await
            .unwrap();
        assert!(!not_guest.is_guest);
    }

    #[tokio::test]
    async fn metadata_is_optional() {
        let identity = verifier()
            .verify(&sign(&without(claims(), "custom_metadata")))
            .await
            .unwrap();
        assert!(identity.custom_metadata.is_none());

        let identity = verifier()
            .verify(&sign(&with(claims(), "custom_metadata", json!({"plan": "pro"}))))
            .await
            .unwrap();
        assert!(identity.custom_metadata.is_none());
    }

    #[tokio::test]
    async fn numeric_creation_time() {
        let identity = verifier()
            .verify(&sign(&with(claims(), "cr", json!(969_628_260))))
            .await
            .unwrap();
        assert_eq!(identity.created_at.timestamp(), 969_628_260);
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let token = sign(&with(claims(), "exp", json!(now() - 3600)));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenExpired));
        assert!(err.is_security_failure());
    }

    #[tokio::test]
    async fn rejects_immature_token() {
        let token = sign(&with(claims(), "nbf", json!(now() + 3600)));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenNotYetValid));
    }

    #[tokio::test]
    async fn rejects_other_audience() {
        let token = sign(&with(claims(), "aud", json!("another-app")));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenAudienceInvalid));
    }

    #[tokio::test]
    async fn rejects_other_issuer() {
        let token = sign(&with(claims(), "iss", json!("evil.io")));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenIssuerInvalid));
    }

    #[tokio::test]
    async fn rejects_token_signed_by_another_key() {
        let verifier = IdentityTokenVerifier::new(
            APP_ID,
            StaticVerificationKey::from_pem(UNRELATED_PUBLIC_KEY).unwrap(),
        );
        let err = verifier.verify(&sign(&claims())).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenSignatureInvalid));
    }

    #[tokio::test]
    async fn rejects_malformed_linked_accounts() {
        let token = sign(&with(claims(), "linked_accounts", json!("[{not json")));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
        assert!(!err.is_security_failure());

        let token = sign(&with(claims(), "linked_accounts", json!([])));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
    }

    #[tokio::test]
    async fn expiry_wins_over_malformed_claims() {
        let broken = with(claims(), "linked_accounts", json!("[{not json"));
        let token = sign(&with(broken, "exp", json!(now() - 3600)));

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenExpired));
    }

    #[tokio::test]
    async fn rejects_missing_creation_time() {
        let token = sign(&without(claims(), "cr"));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));

        let token = sign(&with(claims(), "cr", json!("yesterday")));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
    }

    #[tokio::test]
    async fn rejects_missing_subject() {
        let token = sign(&without(claims(), "sub"));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
    }

    #[tokio::test]
    async fn rejects_non_string_subject() {
        let token = sign(&with(claims(), "sub", json!(42)));
        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
    }

    #[tokio::test]
    async fn expiry_wins_over_non_string_subject() {
        let broken = with(claims(), "sub", json!(42));
        let token = sign(&with(broken, "exp", json!(now() - 3600)));

        let err = verifier().verify(&token).await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenExpired));
    }

    #[tokio::test]
    async fn garbage_is_rejected_before_key_lookup() {
        let keys = CountingKeys::default();
        let verifier = IdentityTokenVerifier::new(APP_ID, &keys);

        let err = verifier.verify("not-a-token").await.unwrap_err();
        assert!(matches!(err, PrivyError::TokenMalformed(_)));
        assert_eq!(keys.0.load(Ordering::SeqCst), 0);

        verifier.verify(&sign(&claims())).await.unwrap();
        assert_eq!(keys.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rejects_invalid_key_pem() {
        assert!(matches!(
            StaticVerificationKey::from_pem("not a key"),
            Err(PrivyError::VerificationKey(_))
        ));
    }
}
