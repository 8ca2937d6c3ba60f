//! Client SDK for the Privy identity provider.
//!
//! This crate provides:
//!
//! - **`PrivyClient`**: user lookups, search, metadata updates and deletion over the REST API
//! - **Pagination**: lazy, cursor-driven streaming of user listings
//! - **Identity tokens**: ES256 verification with a cacheable verification key
//! - **Webhooks**: Svix signature and replay-window verification of deliveries
//! - **Error classification**: mapping the API's error messages to typed errors
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  REST  ┌──────────────────┐
//! │   PrivyClient    │───────▶│   Privy API      │
//! └───┬──────────┬───┘        └──────────────────┘
//!     │          │ failed responses
//!     │  ┌───────▼──────────┐
//!     │  │ ErrorClassifier  │
//!     │  └──────────────────┘
//!     │
//!     ├──▶ PageStream ◀── PageSource (users, search)
//!     │
//!     └──▶ IdentityTokenVerifier ◀── VerificationKeyProvider (key cache)
//!
//!          WebhookVerifier (standalone, signing key only)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use privy_sdk::{PrivyClient, PrivyConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PrivyClient::new(PrivyConfig::new("app-id", "app-secret"))?;
//!
//! // Verify the identity token sent by the frontend.
//! let identity = client.user_from_identity_token("eyJhbGciOiJFUzI1NiIs...").await?;
//! println!("Signed in: {}", identity.subject_id);
//!
//! // Walk every user, one page at a time.
//! let mut users = client.find_all_users().await?;
//! while let Some(user) = users.next().await? {
//!     println!("{} has {} linked accounts", user.id, user.linked_accounts.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod pagination;
pub mod token;
pub mod webhook;

pub use classify::{extract_error_message, ErrorClassifier, ErrorConstructor};
pub use client::PrivyClient;
pub use config::PrivyConfig;
pub use error::{ApiError, FailedResponse, PrivyError, Result, SignatureFailure};
pub use pagination::{Page, PageSource, PageStream};
pub use token::{
    IdentityTokenVerifier, StaticVerificationKey, VerificationKeyProvider, VerifiedIdentity,
};
pub use webhook::{WebhookEnvelope, WebhookVerifier};

pub use privy_core as model;
