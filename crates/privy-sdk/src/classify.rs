//! Classification of Privy API error messages.
//!
//! The API reports failures as a JSON body with a single `error` string. Some of those
//! strings are fixed sentences, others embed caller-supplied values after a fixed
//! prefix. Rules are therefore tried in two tiers: every exact rule (case-insensitive)
//! in registration order, then every prefix rule (case-sensitive) in registration
//! order. A message no rule recognises becomes [`PrivyError::Remote`].
//!
//! Every classified error carries an [`ApiError`] holding the original message and,
//! when classified from a response, the response's status and body.

use serde::Deserialize;

use crate::error::{ApiError, FailedResponse, PrivyError};

/// Builds a typed error from the original message.
pub type ErrorConstructor = fn(ApiError) -> PrivyError;

/// Ordered exact-then-prefix rule table.
#[derive(Clone)]
pub struct ErrorClassifier {
    exact: Vec<(&'static str, ErrorConstructor)>,
    prefix: Vec<(&'static str, ErrorConstructor)>,
}

impl ErrorClassifier {
    /// Create a classifier with no rules. Every message falls through to `Remote`.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            exact: Vec::new(),
            prefix: Vec::new(),
        }
    }

    /// Register a rule matching the whole message, ignoring ASCII case.
    #[must_use]
    pub fn exact(mut self, pattern: &'static str, constructor: ErrorConstructor) -> Self {
        self.exact.push((pattern, constructor));
        self
    }

    /// Register a rule matching the start of the message, respecting case.
    #[must_use]
    pub fn prefix(mut self, pattern: &'static str, constructor: ErrorConstructor) -> Self {
        self.prefix.push((pattern, constructor));
        self
    }

    /// Map a message extracted from a failed response to a typed error.
    #[must_use]
    pub fn classify(&self, message: Option<&str>) -> PrivyError {
        let error = match message {
            Some(message) => ApiError::new(message),
            None => ApiError::without_message(),
        };
        self.classify_error(error)
    }

    /// Map a failed response to a typed error, keeping its status and body.
    #[must_use]
    pub fn classify_response(&self, status: u16, body: &[u8]) -> PrivyError {
        let response = FailedResponse {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        };
        let error = match extract_error_message(body) {
            Some(message) => ApiError::new(message),
            None => ApiError::without_message(),
        };
        self.classify_error(error.with_response(response))
    }

    fn classify_error(&self, error: ApiError) -> PrivyError {
        let Some(message) = error.message() else {
            return PrivyError::Remote(error);
        };

        let matched = self
            .exact
            .iter()
            .find(|(pattern, _)| pattern.eq_ignore_ascii_case(message))
            .or_else(|| {
                self.prefix
                    .iter()
                    .find(|(pattern, _)| message.starts_with(pattern))
            });

        match matched {
            Some((_, constructor)) => constructor(error),
            None => PrivyError::Remote(error),
        }
    }
}

impl Default for ErrorClassifier {
    /// The rule table for the messages the Privy API is known to return.
    fn default() -> Self {
        Self::empty()
            .exact("Invalid Privy app ID", PrivyError::InvalidApplicationId)
            .exact("Invalid app ID or app secret.", PrivyError::InvalidApplicationSecret)
            .exact("User not found", PrivyError::ResourceNotFound)
            .exact("User not found with provided email.", PrivyError::ResourceNotFound)
            .exact("User not found with provided Wallet address.", PrivyError::ResourceNotFound)
            .exact("User not found with provided phone number.", PrivyError::ResourceNotFound)
            .exact("User not found with provided Twitter username.", PrivyError::ResourceNotFound)
            .exact("User not found with provided Twitter subject.", PrivyError::ResourceNotFound)
            .exact("Discord user not found for provided username.", PrivyError::ResourceNotFound)
            .exact("Github user not found for provided username.", PrivyError::ResourceNotFound)
            .exact("[Input error] `address`: Invalid email address", PrivyError::InvalidEmailAddress)
            .exact("[Input error] `number`: Phone number is not valid", PrivyError::InvalidPhoneNumber)
            .exact("[Input error] `address`: Invalid Ethereum address", PrivyError::InvalidWalletAddress)
            .exact("Size of custom metadata object too big (>1KB)", PrivyError::InvalidCustomMetadata)
            .prefix("[Input error] `custom_metadata", PrivyError::InvalidCustomMetadata)
            .prefix("Twitter user with username ", PrivyError::ResourceNotFound)
            .prefix("Twitter user with subject ", PrivyError::ResourceNotFound)
    }
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("exact", &self.exact.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("prefix", &self.prefix.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .finish()
    }
}

/// Body of a failed API response.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Read the `error` field of a failed response body.
///
/// Returns `None` when the body is empty, not JSON, or has no string `error` field.
#[must_use]
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body).ok()?.error
}
