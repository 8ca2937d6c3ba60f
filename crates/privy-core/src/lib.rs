//! Data model for the Privy identity provider.
//!
//! This crate provides the documents exchanged with the Privy API and its webhooks:
//!
//! - **Users**: the canonical user record and its linked accounts
//! - **Custom metadata**: the small typed key/value store attached to a user
//! - **Application settings**: the per-application document carrying the token verification key
//! - **Events**: webhook payloads, keyed by their `type` discriminator
//!
//! Linked accounts and events are closed tagged unions with an `Other` fallback, so a
//! tag introduced by the provider later still decodes, and re-encodes, without loss.
//!
//! # Example
//!
//! ```
//! use privy_core::{LinkedAccount, User};
//!
//! let user: User = serde_json::from_str(r#"{
//!     "id": "did:privy:cfbsvtqo2c22202mo08847jdux2z",
//!     "created_at": 969628260,
//!     "linked_accounts": [
//!         { "type": "email", "address": "bilbo@privy.io", "verified_at": 969628260 }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(user.email().and_then(|email| email.address.as_deref()), Some("bilbo@privy.io"));
//! assert!(matches!(user.linked_accounts[0], LinkedAccount::Email(_)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod event;
pub mod metadata;
pub mod settings;
pub mod user;

mod tagged;

pub use account::{
    DiscordAccount, EmailAccount, GithubAccount, GoogleAccount, LinkedAccount, LinkedInAccount,
    OtherAccount, PasskeyAccount, PhoneAccount, TwitterAccount, Verification, WalletAccount,
};
pub use event::{
    AccountEvent, Event, MfaEvent, OtherEvent, TestEvent, UserCreatedEvent, UserTransferredEvent,
};
pub use metadata::{CustomMetadata, MetadataValue};
pub use settings::ApplicationSettings;
pub use user::{User, UserReference};
