//! Linked accounts: the login methods attached to a user.
//!
//! Every account kind shares the [`Verification`] timestamps. Unknown kinds decode to
//! [`LinkedAccount::Other`], which keeps the raw tag and all remaining fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::tagged;

const WALLET: &str = "wallet";
const EMAIL: &str = "email";
const PHONE: &str = "phone";
const GOOGLE: &str = "google_oauth";
const TWITTER: &str = "twitter_oauth";
const DISCORD: &str = "discord_oauth";
const GITHUB: &str = "github_oauth";
const LINKEDIN: &str = "linkedin_oauth";
const PASSKEY: &str = "passkey";

/// Compact key used for `latest_verified_at` inside identity tokens.
const LATEST_VERIFIED_AT_SHORT: &str = "lv";

/// Verification timestamps common to all linked accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// When the account was verified.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub verified_at: Option<DateTime<Utc>>,
    /// When the account was first verified.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_verified_at: Option<DateTime<Utc>>,
    /// When the account was most recently verified.
    #[serde(
        default,
        with = "chrono::serde::ts_seconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_verified_at: Option<DateTime<Utc>>,
}

/// A user's wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    /// The wallet address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Chain type of the wallet address (superseded by `chain_id`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<String>,
    /// CAIP-2 chain ID during the most recent verification (e.g. `eip155:1`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Wallet client used for the most recent verification (`privy` for embedded wallets).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_client: Option<String>,
    /// Wallet client type used for the most recent verification (e.g. `metamask`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_client_type: Option<String>,
    /// Connector type used for the most recent verification (e.g. `injected`, `embedded`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<String>,
    /// HD wallet index, for embedded wallets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_index: Option<u32>,
    /// Whether the user imported this wallet. Absent for non-embedded wallets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported: Option<bool>,
    /// Recovery method of an embedded wallet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_method: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

impl WalletAccount {
    /// Returns `true` only if the wallet is known to have been imported.
    #[must_use]
    pub fn is_imported(&self) -> bool {
        self.imported == Some(true)
    }
}

/// A user's email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAccount {
    /// The email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneAccount {
    /// The phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's Google account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleAccount {
    /// The `sub` claim of the Google-issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The email of the Google account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The display name of the Google account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's Twitter account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterAccount {
    /// The `sub` claim of the Twitter-issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The Twitter username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The profile picture URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's Discord account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscordAccount {
    /// The `sub` claim of the Discord-issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The Discord username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The email of the Discord account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's GitHub account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubAccount {
    /// The `sub` claim of the GitHub-issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The GitHub username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The email of the GitHub account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's LinkedIn account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedInAccount {
    /// The `sub` claim of the LinkedIn-issued token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The email of the LinkedIn account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The public profile handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vanity_name: Option<String>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A user's passkey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeyAccount {
    /// The WebAuthn credential ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    /// Name of the authenticator holding the credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authenticator_name: Option<String>,
    /// Whether the passkey is enrolled as an MFA method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_in_mfa: Option<bool>,
    /// Verification timestamps.
    #[serde(flatten)]
    pub verification: Verification,
}

/// A linked account of a kind this crate does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherAccount {
    /// The raw `type` tag.
    pub account_type: String,
    /// Verification timestamps.
    pub verification: Verification,
    /// Every other field, as received.
    pub properties: Map<String, Value>,
}

impl OtherAccount {
    /// Integer timestamps become [`Verification`] fields, anything else stays a property.
    fn from_fields(account_type: String, mut fields: Map<String, Value>) -> Self {
        let verification = Verification {
            verified_at: take_timestamp(&mut fields, "verified_at"),
            first_verified_at: take_timestamp(&mut fields, "first_verified_at"),
            latest_verified_at: take_timestamp(&mut fields, "latest_verified_at"),
        };

        Self {
            account_type,
            verification,
            properties: fields,
        }
    }

    fn to_fields<E: serde::ser::Error>(&self) -> Result<Map<String, Value>, E> {
        let mut fields = self.properties.clone();
        fields.extend(tagged::to_fields::<_, E>(&self.verification)?);
        Ok(fields)
    }
}

fn take_timestamp(fields: &mut Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let at = fields
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))?;
    fields.remove(key);
    Some(at)
}

/// A login method linked to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedAccount {
    /// `wallet`
    Wallet(WalletAccount),
    /// `email`
    Email(EmailAccount),
    /// `phone`
    Phone(PhoneAccount),
    /// `google_oauth`
    Google(GoogleAccount),
    /// `twitter_oauth`
    Twitter(TwitterAccount),
    /// `discord_oauth`
    Discord(DiscordAccount),
    /// `github_oauth`
    Github(GithubAccount),
    /// `linkedin_oauth`
    LinkedIn(LinkedInAccount),
    /// `passkey`
    Passkey(PasskeyAccount),
    /// Any other tag.
    Other(OtherAccount),
}

impl LinkedAccount {
    /// The `type` tag of this account as it appears on the wire.
    #[must_use]
    pub fn account_type(&self) -> &str {
        match self {
            Self::Wallet(_) => WALLET,
            Self::Email(_) => EMAIL,
            Self::Phone(_) => PHONE,
            Self::Google(_) => GOOGLE,
            Self::Twitter(_) => TWITTER,
            Self::Discord(_) => DISCORD,
            Self::Github(_) => GITHUB,
            Self::LinkedIn(_) => LINKEDIN,
            Self::Passkey(_) => PASSKEY,
            Self::Other(other) => &other.account_type,
        }
    }

    /// The verification timestamps of this account.
    #[must_use]
    pub const fn verification(&self) -> &Verification {
        match self {
            Self::Wallet(account) => &account.verification,
            Self::Email(account) => &account.verification,
            Self::Phone(account) => &account.verification,
            Self::Google(account) => &account.verification,
            Self::Twitter(account) => &account.verification,
            Self::Discord(account) => &account.verification,
            Self::Github(account) => &account.verification,
            Self::LinkedIn(account) => &account.verification,
            Self::Passkey(account) => &account.verification,
            Self::Other(account) => &account.verification,
        }
    }
}

impl<'de> Deserialize<'de> for LinkedAccount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;

        if let Some(latest) = fields.remove(LATEST_VERIFIED_AT_SHORT) {
            fields.entry("latest_verified_at").or_insert(latest);
        }

        let account_type = tagged::take_tag::<D::Error>(&mut fields)?;

        match account_type.as_str() {
            WALLET => tagged::from_fields(fields).map(Self::Wallet),
            EMAIL => tagged::from_fields(fields).map(Self::Email),
            PHONE => tagged::from_fields(fields).map(Self::Phone),
            GOOGLE => tagged::from_fields(fields).map(Self::Google),
            TWITTER => tagged::from_fields(fields).map(Self::Twitter),
            DISCORD => tagged::from_fields(fields).map(Self::Discord),
            GITHUB => tagged::from_fields(fields).map(Self::Github),
            LINKEDIN => tagged::from_fields(fields).map(Self::LinkedIn),
            PASSKEY => tagged::from_fields(fields).map(Self::Passkey),
            _ => Ok(Self::Other(OtherAccount::from_fields(account_type.clone(), fields))),
        }
    }
}

impl Serialize for LinkedAccount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields: Result<Map<String, Value>, S::Error> = match self {
            Self::Wallet(account) => tagged::to_fields(account),
            Self::Email(account) => tagged::to_fields(account),
            Self::Phone(account) => tagged::to_fields(account),
            Self::Google(account) => tagged::to_fields(account),
            Self::Twitter(account) => tagged::to_fields(account),
            Self::Discord(account) => tagged::to_fields(account),
            Self::Github(account) => tagged::to_fields(account),
            Self::LinkedIn(account) => tagged::to_fields(account),
            Self::Passkey(account) => tagged::to_fields(account),
            Self::Other(account) => account.to_fields(),
        };

        tagged::with_tag(fields?, self.account_type()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(json: &str) -> LinkedAccount {
        serde_json::from_str(json).unwrap()
    }

    fn at(seconds: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(seconds, 0)
    }

    #[test]
    fn wallet() {
        let account = read(
            r#"{
                "type": "wallet",
                "address": "0x0123456789abcdef0123456789abcdef01234567",
                "imported": false,
                "wallet_index": 0,
                "chain_id": "eip155:1",
                "chain_type": "ethereum",
                "wallet_client": "privy",
                "wallet_client_type": "privy",
                "connector_type": "embedded",
                "verified_at": 1724800479,
                "first_verified_at": 1724800479,
                "latest_verified_at": 1724800479,
                "recovery_method": "privy"
            }"#,
        );

        let LinkedAccount::Wallet(wallet) = account else {
            panic!("expected a wallet, got {account:?}");
        };
        assert_eq!(wallet.address.as_deref(), Some("0x0123456789abcdef0123456789abcdef01234567"));
        assert!(!wallet.is_imported());
        assert_eq!(wallet.wallet_index, Some(0));
        assert_eq!(wallet.chain_id.as_deref(), Some("eip155:1"));
        assert_eq!(wallet.chain_type.as_deref(), Some("ethereum"));
        assert_eq!(wallet.connector_type.as_deref(), Some("embedded"));
        assert_eq!(wallet.verification.verified_at, at(1_724_800_479));
        assert_eq!(wallet.verification.first_verified_at, at(1_724_800_479));
        assert_eq!(wallet.verification.latest_verified_at, at(1_724_800_479));
    }

    #[test]
    fn email() {
        let account = read(
            r#"{
                "type": "email",
                "address": "johndoe@example.com",
                "verified_at": 1724800476,
                "first_verified_at": 1724800476,
                "latest_verified_at": 1725126079
            }"#,
        );

        let LinkedAccount::Email(email) = &account else {
            panic!("expected an email, got {account:?}");
        };
        assert_eq!(email.address.as_deref(), Some("johndoe@example.com"));
        assert_eq!(email.verification.first_verified_at, at(1_724_800_476));
        assert_eq!(email.verification.latest_verified_at, at(1_725_126_079));
        assert_eq!(account.account_type(), "email");
    }

    #[test]
    fn oauth_kinds() {
        let google = read(r#"{"type": "google_oauth", "subject": "1", "email": "a@b.c", "name": "A"}"#);
        assert!(matches!(google, LinkedAccount::Google(ref g) if g.name.as_deref() == Some("A")));

        let twitter = read(
            r#"{"type": "twitter_oauth", "subject": "2", "username": "johndoe", "profile_picture_url": "https://x/y.jpg"}"#,
        );
        assert!(matches!(twitter, LinkedAccount::Twitter(ref t) if t.username.as_deref() == Some("johndoe")));

        let discord = read(r#"{"type": "discord_oauth", "subject": "3", "username": "johndoe#0"}"#);
        assert!(matches!(discord, LinkedAccount::Discord(ref d) if d.subject.as_deref() == Some("3")));

        let github = read(r#"{"type": "github_oauth", "subject": "4", "username": "octocat"}"#);
        assert!(matches!(github, LinkedAccount::Github(ref g) if g.username.as_deref() == Some("octocat")));

        let linkedin = read(r#"{"type": "linkedin_oauth", "subject": "5", "email": "a@b.c"}"#);
        assert!(matches!(linkedin, LinkedAccount::LinkedIn(ref l) if l.subject.as_deref() == Some("5")));
    }

    #[test]
    fn phone_and_passkey() {
        let phone = read(r#"{"type": "phone", "number": "+12819374192", "verified_at": 1725378363}"#);
        assert!(matches!(phone, LinkedAccount::Phone(ref p) if p.number.as_deref() == Some("+12819374192")));

        let passkey = read(r#"{"type": "passkey", "credential_id": "aabbccddeeff"}"#);
        assert!(matches!(passkey, LinkedAccount::Passkey(ref p) if p.credential_id.as_deref() == Some("aabbccddeeff")));
    }

    #[test]
    fn short_latest_verified_at() {
        let account = read(r#"{"type": "email", "address": "a@b.c", "lv": 1725126079}"#);
        assert_eq!(account.verification().latest_verified_at, at(1_725_126_079));
    }

    #[test]
    fn unknown_type_is_kept() {
        let account = read(
            r#"{
                "type": "unsupported",
                "subject": "123456789",
                "name": "John Doe",
                "verified_at": 1725376993
            }"#,
        );

        let LinkedAccount::Other(other) = &account else {
            panic!("expected other, got {account:?}");
        };
        assert_eq!(other.account_type, "unsupported");
        assert_eq!(other.properties.len(), 2);
        assert_eq!(other.properties["subject"], "123456789");
        assert_eq!(other.properties["name"], "John Doe");
        assert_eq!(other.verification.verified_at, at(1_725_376_993));
    }

    #[test]
    fn unknown_type_survives_reencoding() {
        let original = serde_json::json!({
            "type": "farcaster",
            "fid": 4242,
            "owner_address": "0xabc",
            "signer": { "public_key": "ed25519:xyz" },
            "first_verified_at": 1725376993
        });

        let account: LinkedAccount = serde_json::from_value(original.clone()).unwrap();
        let encoded = serde_json::to_value(&account).unwrap();

        assert_eq!(encoded, original);
        assert_eq!(serde_json::from_value::<LinkedAccount>(encoded).unwrap(), account);
    }

    #[test]
    fn known_type_reencodes_with_tag() {
        let account = read(r#"{"type": "phone", "number": "+15550100", "verified_at": 1725378363}"#);
        let encoded = serde_json::to_value(&account).unwrap();

        assert_eq!(encoded["type"], "phone");
        assert_eq!(encoded["verified_at"], 1_725_378_363);
        assert!(encoded.get("first_verified_at").is_none());
    }

    #[test]
    fn missing_type_is_rejected() {
        let result = serde_json::from_str::<LinkedAccount>(r#"{"address": "a@b.c"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn known_type_with_missing_identifier() {
        let account = read(r#"{"type": "email", "verified_at": 1725378363}"#);
        assert!(matches!(account, LinkedAccount::Email(ref e) if e.address.is_none()));

        let passkey = read(r#"{"type": "passkey"}"#);
        assert!(matches!(passkey, LinkedAccount::Passkey(ref p) if p.credential_id.is_none()));
    }

    #[test]
    fn known_type_with_mistyped_field_is_rejected() {
        let result = serde_json::from_str::<LinkedAccount>(r#"{"type": "email", "address": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_type_keeps_non_integer_timestamps() {
        let account = read(
            r#"{"type": "farcaster", "fid": 1, "verified_at": "2024-09-01T00:00:00Z", "first_verified_at": 1.5}"#,
        );

        let LinkedAccount::Other(other) = &account else {
            panic!("expected other, got {account:?}");
        };
        assert_eq!(other.verification, Verification::default());
        assert_eq!(other.properties["verified_at"], "2024-09-01T00:00:00Z");
        assert_eq!(other.properties["first_verified_at"], 1.5);
    }

    #[test]
    fn unknown_type_keeps_null_timestamps() {
        let original = serde_json::json!({ "fid": 1, "type": "farcaster", "verified_at": null });

        let account: LinkedAccount = serde_json::from_value(original.clone()).unwrap();
        assert_eq!(account.verification().verified_at, None);
        assert_eq!(serde_json::to_value(&account).unwrap(), original);
    }
}
