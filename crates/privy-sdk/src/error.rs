//! Error types for the Privy SDK.

use std::fmt;

use thiserror::Error;

/// A result type using `PrivyError`.
pub type Result<T> = std::result::Result<T, PrivyError>;

/// Why a webhook delivery's signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFailure {
    /// No signature candidate matched the expected signature.
    Mismatch,
    /// The delivery timestamp is outside the accepted window.
    TimestampOutOfTolerance,
    /// A delivery header is missing or cannot be parsed.
    MalformedHeader,
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mismatch => "no matching signature found",
            Self::TimestampOutOfTolerance => "timestamp outside tolerance window",
            Self::MalformedHeader => "malformed delivery header",
        })
    }
}

/// The failed HTTP response an API error was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, decoded as UTF-8 with invalid sequences replaced.
    pub body: String,
}

/// An error reported by the Privy API.
///
/// Holds the `error` message of the response body, if there was one, and the response
/// itself when the error came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    message: Option<String>,
    response: Option<FailedResponse>,
}

impl ApiError {
    /// Create an error carrying `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            response: None,
        }
    }

    /// Create an error whose response had no readable message.
    #[must_use]
    pub const fn without_message() -> Self {
        Self {
            message: None,
            response: None,
        }
    }

    /// Attach the response the error was read from.
    #[must_use]
    pub fn with_response(mut self, response: FailedResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// The message reported by the API.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The failed response, if the error came from one.
    #[must_use]
    pub const fn response(&self) -> Option<&FailedResponse> {
        self.response.as_ref()
    }

    /// HTTP status of the failed response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|response| response.status)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message().unwrap_or("<no message>"))?;
        if let Some(status) = self.status() {
            write!(f, " (HTTP {status})")?;
        }
        Ok(())
    }
}

/// Errors that can occur when talking to Privy or verifying what it issued.
#[derive(Debug, Error)]
pub enum PrivyError {
    /// The application ID was rejected by the API.
    #[error("invalid application id: {0}")]
    InvalidApplicationId(ApiError),

    /// The application ID and secret pair was rejected by the API.
    #[error("invalid application secret: {0}")]
    InvalidApplicationSecret(ApiError),

    /// The requested user or resource does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(ApiError),

    /// The email address was rejected as invalid.
    #[error("invalid email address: {0}")]
    InvalidEmailAddress(ApiError),

    /// The phone number was rejected as invalid.
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(ApiError),

    /// The wallet address was rejected as invalid.
    #[error("invalid wallet address: {0}")]
    InvalidWalletAddress(ApiError),

    /// The custom metadata was rejected (bad shape or too large).
    #[error("invalid custom metadata: {0}")]
    InvalidCustomMetadata(ApiError),

    /// The API reported an error no rule recognises.
    #[error("remote error: {0}")]
    Remote(ApiError),

    /// The API asked for the request to be retried later.
    #[error("retryable HTTP {status} (retry after {retry_after:?})")]
    Retryable {
        /// HTTP status code of the response.
        status: u16,
        /// Raw `Retry-After` header value.
        retry_after: Option<String>,
    },

    /// The request could not be sent or its response could not be read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A webhook delivery failed signature verification.
    #[error("webhook signature invalid: {0}")]
    SignatureInvalid(SignatureFailure),

    /// A verified webhook delivery's body is not a readable event.
    #[error("webhook payload unreadable: {0}")]
    PayloadUnreadable(#[source] serde_json::Error),

    /// The identity token is structurally invalid or its claims cannot be decoded.
    #[error("malformed token: {0}")]
    TokenMalformed(String),

    /// The identity token has expired.
    #[error("token expired")]
    TokenExpired,

    /// The identity token is not valid yet.
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// The identity token signature does not verify.
    #[error("invalid token signature")]
    TokenSignatureInvalid,

    /// The identity token issuer is not Privy.
    #[error("invalid token issuer")]
    TokenIssuerInvalid,

    /// The identity token was issued for another application.
    #[error("invalid token audience")]
    TokenAudienceInvalid,

    /// The verification key could not be obtained or parsed.
    #[error("verification key unavailable: {0}")]
    VerificationKey(String),

    /// The SDK configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PrivyError {
    /// Returns `true` if this error means the looked-up resource does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }

    /// The API error behind a classified failure.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::InvalidApplicationId(e)
            | Self::InvalidApplicationSecret(e)
            | Self::ResourceNotFound(e)
            | Self::InvalidEmailAddress(e)
            | Self::InvalidPhoneNumber(e)
            | Self::InvalidWalletAddress(e)
            | Self::InvalidCustomMetadata(e)
            | Self::Remote(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` for cryptographic verdicts, which retrying cannot change.
    #[must_use]
    pub const fn is_security_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid(_)
                | Self::TokenExpired
                | Self::TokenNotYetValid
                | Self::TokenSignatureInvalid
                | Self::TokenIssuerInvalid
                | Self::TokenAudienceInvalid
        )
    }

    /// Returns `true` if the transport layer reported the failure as transient.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Retryable { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
