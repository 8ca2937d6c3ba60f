//! The canonical user record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{
    DiscordAccount, EmailAccount, GithubAccount, GoogleAccount, LinkedAccount, LinkedInAccount,
    PasskeyAccount, PhoneAccount, TwitterAccount, WalletAccount,
};
use crate::metadata::CustomMetadata;

/// A user of a Privy application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The Privy DID of the user (e.g. `did:privy:...`).
    pub id: String,
    /// When the user was created.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    /// Login methods linked to the user, in the order the provider lists them.
    #[serde(default)]
    pub linked_accounts: Vec<LinkedAccount>,
    /// Whether the user accepted the application's terms.
    #[serde(default)]
    pub has_accepted_terms: bool,
    /// Whether the user is a guest.
    #[serde(default)]
    pub is_guest: bool,
    /// Custom metadata set by the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<CustomMetadata>,
}

macro_rules! first_account {
    ($(#[$doc:meta] $name:ident => $variant:ident($account:ty);)*) => {
        $(
            #[$doc]
            #[must_use]
            pub fn $name(&self) -> Option<&$account> {
                self.linked_accounts.iter().find_map(|account| match account {
                    LinkedAccount::$variant(inner) => Some(inner),
                    _ => None,
                })
            }
        )*
    };
}

impl User {
    first_account! {
        /// The first linked wallet.
        wallet => Wallet(WalletAccount);
        /// The first linked email address.
        email => Email(EmailAccount);
        /// The first linked phone number.
        phone => Phone(PhoneAccount);
        /// The first linked Google account.
        google => Google(GoogleAccount);
        /// The first linked Twitter account.
        twitter => Twitter(TwitterAccount);
        /// The first linked Discord account.
        discord => Discord(DiscordAccount);
        /// The first linked GitHub account.
        github => Github(GithubAccount);
        /// The first linked LinkedIn account.
        linkedin => LinkedIn(LinkedInAccount);
        /// The first linked passkey.
        passkey => Passkey(PasskeyAccount);
    }
}

/// A reference to a user by ID only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReference {
    /// The Privy DID of the user.
    pub id: String,
}
