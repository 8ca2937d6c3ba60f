//! HTTP client for the Privy REST API.
//!
//! Every request is authenticated with the application credentials. Failed responses
//! are turned into typed errors by the [`ErrorClassifier`]; lookups that fail with
//! `ResourceNotFound` resolve to `None`.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use privy_core::{ApplicationSettings, CustomMetadata, User};

use crate::classify::ErrorClassifier;
use crate::config::PrivyConfig;
use crate::error::{PrivyError, Result};
use crate::pagination::{Page, PageSource, PageStream};
use crate::token::{
    parse_verification_key, IdentityTokenVerifier, VerificationKeyProvider, VerifiedIdentity,
};
use crate::webhook::WebhookVerifier;

/// Header carrying the application ID.
pub const APP_ID_HEADER: &str = "privy-app-id";
/// Header identifying the client library.
pub const CLIENT_HEADER: &str = "privy-client";

const CLIENT_NAME: &str = concat!("privy-rust:", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    #[serde(rename = "searchTerm")]
    search_term: &'a str,
    limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AddressRequest<'a> {
    address: &'a str,
}

#[derive(Debug, Serialize)]
struct PhoneRequest<'a> {
    number: &'a str,
}

#[derive(Debug, Serialize)]
struct UsernameRequest<'a> {
    username: &'a str,
}

#[derive(Debug, Serialize)]
struct SubjectRequest<'a> {
    subject: &'a str,
}

#[derive(Debug, Serialize)]
struct CustomUserIdRequest<'a> {
    custom_user_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CustomMetadataRequest<'a> {
    custom_metadata: &'a CustomMetadata,
}

/// Client for one Privy application.
///
/// Cloning is cheap; clones share the connection pool and the verification key cache.
#[derive(Clone)]
pub struct PrivyClient {
    client: reqwest::Client,
    config: Arc<PrivyConfig>,
    classifier: Arc<ErrorClassifier>,
    cached_key: Arc<RwLock<Option<DecodingKey>>>,
}

impl PrivyClient {
    /// Create a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if the configuration is invalid, or
    /// `PrivyError::Transport` if the HTTP client cannot be built.
    pub fn new(config: PrivyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Self::with_client(client, config)
    }

    /// Create a client with a custom reqwest client.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if the configuration is invalid.
    pub fn with_client(client: reqwest::Client, config: PrivyConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            client,
            config: Arc::new(config),
            classifier: Arc::new(ErrorClassifier::default()),
            cached_key: Arc::default(),
        })
    }

    /// Replace the rule table used to classify failed responses.
    #[must_use]
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Get the configuration of this client.
    #[must_use]
    pub fn config(&self) -> &PrivyConfig {
        &self.config
    }

    /// Stream every user of the application.
    ///
    /// The first page is fetched immediately, the following ones as the stream is
    /// consumed.
    ///
    /// # Errors
    ///
    /// Returns the error of the first page fetch.
    pub async fn find_all_users(&self) -> Result<PageStream<User>> {
        PageStream::start(UserPages {
            client: self.clone(),
        })
        .await
    }

    /// Stream every user matching a search term.
    ///
    /// # Errors
    ///
    /// Returns the error of the first page fetch.
    pub async fn search_users(&self, search_term: &str) -> Result<PageStream<User>> {
        PageStream::start(SearchPages {
            client: self.clone(),
            search_term: search_term.to_owned(),
        })
        .await
    }

    /// Find a user by Privy DID.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason other than the user not
    /// existing.
    pub async fn find_user_by_id(&self, id: &str) -> Result<Option<User>> {
        if is_blank(id) {
            return Ok(None);
        }

        let request = self.request(Method::GET, self.config.user_url(id)?);
        absent_if_not_found(self.send(request).await)
    }

    /// Find a user by email address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEmailAddress` if the address is rejected, or any other request
    /// error except the user not existing.
    pub async fn find_user_by_email(&self, address: &str) -> Result<Option<User>> {
        if is_blank(address) {
            return Ok(None);
        }
        self.find_user(("email", "address"), &AddressRequest { address })
            .await
    }

    /// Find a user by wallet address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWalletAddress` if the address is rejected, or any other request
    /// error except the user not existing.
    pub async fn find_user_by_wallet(&self, address: &str) -> Result<Option<User>> {
        if is_blank(address) {
            return Ok(None);
        }
        self.find_user(("wallet", "address"), &AddressRequest { address })
            .await
    }

    /// Find a user by phone number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPhoneNumber` if the number is rejected, or any other request
    /// error except the user not existing.
    pub async fn find_user_by_phone(&self, number: &str) -> Result<Option<User>> {
        if is_blank(number) {
            return Ok(None);
        }
        self.find_user(("phone", "number"), &PhoneRequest { number }).await
    }

    /// Find a user by Twitter username.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn find_user_by_twitter_username(&self, username: &str) -> Result<Option<User>> {
        if is_blank(username) {
            return Ok(None);
        }
        self.find_user(("twitter", "username"), &UsernameRequest { username })
            .await
    }

    /// Find a user by Twitter subject.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn find_user_by_twitter_subject(&self, subject: &str) -> Result<Option<User>> {
        if is_blank(subject) {
            return Ok(None);
        }
        self.find_user(("twitter", "subject"), &SubjectRequest { subject })
            .await
    }

    /// Find a user by Discord username.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn find_user_by_discord_username(&self, username: &str) -> Result<Option<User>> {
        if is_blank(username) {
            return Ok(None);
        }
        self.find_user(("discord", "username"), &UsernameRequest { username })
            .await
    }

    /// Find a user by GitHub username.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn find_user_by_github_username(&self, username: &str) -> Result<Option<User>> {
        if is_blank(username) {
            return Ok(None);
        }
        self.find_user(("github", "username"), &UsernameRequest { username })
            .await
    }

    /// Find a user by the ID assigned by a custom authentication provider.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn find_user_by_custom_auth_id(&self, custom_user_id: &str) -> Result<Option<User>> {
        if is_blank(custom_user_id) {
            return Ok(None);
        }
        self.find_user(("custom_auth", "id"), &CustomUserIdRequest { custom_user_id })
            .await
    }

    /// Replace the custom metadata of a user, returning the updated user.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCustomMetadata` if the metadata is rejected (too large or badly
    /// shaped), `ResourceNotFound` if the user does not exist, or any other request error.
    pub async fn set_custom_metadata(
        &self,
        user_id: &str,
        custom_metadata: &CustomMetadata,
    ) -> Result<User> {
        let request = self
            .request(Method::POST, self.config.custom_metadata_url(user_id)?)
            .json(&CustomMetadataRequest { custom_metadata });

        self.send(request).await
    }

    /// Delete a user. Returns `false` if the user did not exist.
    ///
    /// # Errors
    ///
    /// Returns any request error except the user not existing.
    pub async fn delete_user_by_id(&self, id: &str) -> Result<bool> {
        if is_blank(id) {
            return Ok(false);
        }

        let request = self.request(Method::DELETE, self.config.user_url(id)?);
        let deleted = match request.send().await {
            Ok(response) => self.check(response).await.map(|_| true),
            Err(e) => Err(e.into()),
        };

        match deleted {
            Err(e) if e.is_not_found() => Ok(false),
            other => other,
        }
    }

    /// Fetch the application settings.
    ///
    /// Also refreshes the cached verification key when caching is enabled.
    ///
    /// # Errors
    ///
    /// Returns `InvalidApplicationId`/`InvalidApplicationSecret` if the credentials are
    /// rejected, or any other request error.
    pub async fn application_settings(&self) -> Result<ApplicationSettings> {
        let settings = self.fetch_settings().await?;

        if self.config.cache_verification_key {
            match parse_verification_key(&settings.verification_key) {
                Ok(key) => *self.cached_key.write() = Some(key),
                Err(e) => tracing::warn!(error = %e, "Unusable verification key in settings"),
            }
        }

        Ok(settings)
    }

    /// Get the identity token verification key, from the cache when possible.
    ///
    /// # Errors
    ///
    /// Returns a request error if the settings cannot be fetched, or
    /// `PrivyError::VerificationKey` if the published key cannot be parsed.
    pub async fn verification_key(&self) -> Result<DecodingKey> {
        if self.config.cache_verification_key {
            let cached = self.cached_key.read().clone();
            if let Some(key) = cached {
                tracing::debug!("Verification key cache hit");
                return Ok(key);
            }
        }

        tracing::debug!("Fetching verification key");
        let settings = self.fetch_settings().await?;
        let key = parse_verification_key(&settings.verification_key)?;

        if self.config.cache_verification_key {
            *self.cached_key.write() = Some(key.clone());
        }

        Ok(key)
    }

    /// Verify an identity token issued for this application.
    ///
    /// # Errors
    ///
    /// See [`IdentityTokenVerifier::verify`].
    pub async fn user_from_identity_token(&self, token: &str) -> Result<VerifiedIdentity> {
        IdentityTokenVerifier::new(&self.config.application_id, self)
            .verify(token)
            .await
    }

    /// Create a webhook verifier from the configured signing key.
    ///
    /// # Errors
    ///
    /// Returns `PrivyError::Config` if no valid signing key is configured.
    pub fn webhook_verifier(&self) -> Result<WebhookVerifier> {
        WebhookVerifier::from_config(&self.config)
    }

    async fn fetch_settings(&self) -> Result<ApplicationSettings> {
        let request = self.request(Method::GET, self.config.settings_url()?);
        self.send(request).await
    }

    async fn find_user<B: Serialize + Sync>(
        &self,
        (kind, key): (&str, &str),
        body: &B,
    ) -> Result<Option<User>> {
        let request = self
            .request(Method::POST, self.config.lookup_url(kind, key)?)
            .json(body);

        absent_if_not_found(self.send(request).await)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(
                &self.config.application_id,
                Some(&self.config.application_secret),
            )
            .header(APP_ID_HEADER, &self.config.application_id)
            .header(CLIENT_HEADER, CLIENT_NAME)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let response = self.check(response).await?;
        Ok(response.json().await?)
    }

    /// Pass successful responses through and turn failed ones into typed errors.
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if let Some(retry_after) = response.headers().get(RETRY_AFTER) {
            let retry_after = retry_after.to_str().ok().map(str::to_owned);
            tracing::warn!(status = %status, retry_after = ?retry_after, "Privy API asked to retry");
            return Err(PrivyError::Retryable {
                status: status.as_u16(),
                retry_after,
            });
        }

        let body = response.bytes().await?;
        let error = self.classifier.classify_response(status.as_u16(), &body);

        tracing::debug!(status = %status, error = %error, "Privy API request failed");
        Err(error)
    }
}

impl std::fmt::Debug for PrivyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivyClient")
            .field("api_url", &self.config.api_url)
            .field("application_id", &self.config.application_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VerificationKeyProvider for PrivyClient {
    async fn verification_key(&self) -> Result<DecodingKey> {
        Self::verification_key(self).await
    }
}

/// Pages of `GET /api/v1/users`.
struct UserPages {
    client: PrivyClient,
}

#[async_trait]
impl PageSource<User> for UserPages {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<User>> {
        let mut query = vec![("limit", self.client.config.max_page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_owned()));
        }

        let request = self
            .client
            .request(Method::GET, self.client.config.users_url()?)
            .query(&query);

        self.client.send(request).await
    }
}

/// Pages of `POST /api/v1/users/search`.
struct SearchPages {
    client: PrivyClient,
    search_term: String,
}

#[async_trait]
impl PageSource<User> for SearchPages {
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<User>> {
        let body = SearchRequest {
            search_term: &self.search_term,
            limit: self.client.config.max_page_size,
            cursor,
        };

        let request = self
            .client
            .request(Method::POST, self.client.config.search_url()?)
            .json(&body);

        self.client.send(request).await
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn absent_if_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
