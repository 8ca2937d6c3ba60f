//! Webhook event payloads.
//!
//! The `type` field selects the variant. Tags this crate does not know decode to
//! [`Event::Other`] so that newly introduced provider events never break a consumer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::account::LinkedAccount;
use crate::tagged;
use crate::user::{User, UserReference};

const TEST: &str = "privy.test";
const USER_CREATED: &str = "user.created";
const USER_AUTHENTICATED: &str = "user.authenticated";
const USER_LINKED_ACCOUNT: &str = "user.linked_account";
const USER_UNLINKED_ACCOUNT: &str = "user.unlinked_account";
const USER_UPDATED_ACCOUNT: &str = "user.updated_account";
const USER_TRANSFERRED_ACCOUNT: &str = "user.transferred_account";
const MFA_ENABLED: &str = "mfa.enabled";
const MFA_DISABLED: &str = "mfa.disabled";

/// Test delivery sent from the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEvent {
    /// Free-form message.
    pub message: String,
}

/// A user was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreatedEvent {
    /// The new user.
    pub user: User,
}

/// An event about one of a user's linked accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountEvent {
    /// The account involved.
    pub account: LinkedAccount,
    /// The user after the change.
    pub user: User,
}

/// A linked account moved from one user to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTransferredEvent {
    /// The account that was transferred.
    pub account: LinkedAccount,
    /// The user the account was taken from.
    #[serde(rename = "fromUser")]
    pub from_user: UserReference,
    /// The user the account was given to.
    #[serde(rename = "toUser")]
    pub to_user: UserReference,
    /// Whether the source user was deleted by the transfer.
    #[serde(rename = "deletedUser", default)]
    pub deleted_user: bool,
}

/// A multi-factor authentication method changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MfaEvent {
    /// The user whose MFA changed.
    pub user_id: String,
    /// The MFA method (e.g. `sms`, `totp`, `passkey`).
    pub method: String,
}

/// An event of a type this crate does not model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherEvent {
    /// The raw `type` tag.
    pub event_type: String,
    /// Every other field, as received.
    pub properties: Map<String, Value>,
}

/// A webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `privy.test`
    Test(TestEvent),
    /// `user.created`
    UserCreated(UserCreatedEvent),
    /// `user.authenticated`
    UserAuthenticated(AccountEvent),
    /// `user.linked_account`
    UserLinkedAccount(AccountEvent),
    /// `user.unlinked_account`
    UserUnlinkedAccount(AccountEvent),
    /// `user.updated_account`
    UserUpdatedAccount(AccountEvent),
    /// `user.transferred_account`
    UserTransferredAccount(UserTransferredEvent),
    /// `mfa.enabled`
    MfaEnabled(MfaEvent),
    /// `mfa.disabled`
    MfaDisabled(MfaEvent),
    /// Any other tag.
    Other(OtherEvent),
}

impl Event {
    /// The `type` tag of this event as it appears on the wire.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Test(_) => TEST,
            Self::UserCreated(_) => USER_CREATED,
            Self::UserAuthenticated(_) => USER_AUTHENTICATED,
            Self::UserLinkedAccount(_) => USER_LINKED_ACCOUNT,
            Self::UserUnlinkedAccount(_) => USER_UNLINKED_ACCOUNT,
            Self::UserUpdatedAccount(_) => USER_UPDATED_ACCOUNT,
            Self::UserTransferredAccount(_) => USER_TRANSFERRED_ACCOUNT,
            Self::MfaEnabled(_) => MFA_ENABLED,
            Self::MfaDisabled(_) => MFA_DISABLED,
            Self::Other(other) => &other.event_type,
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let event_type = tagged::take_tag::<D::Error>(&mut fields)?;

        match event_type.as_str() {
            TEST => tagged::from_fields(fields).map(Self::Test),
            USER_CREATED => tagged::from_fields(fields).map(Self::UserCreated),
            USER_AUTHENTICATED => tagged::from_fields(fields).map(Self::UserAuthenticated),
            USER_LINKED_ACCOUNT => tagged::from_fields(fields).map(Self::UserLinkedAccount),
            USER_UNLINKED_ACCOUNT => tagged::from_fields(fields).map(Self::UserUnlinkedAccount),
            USER_UPDATED_ACCOUNT => tagged::from_fields(fields).map(Self::UserUpdatedAccount),
            USER_TRANSFERRED_ACCOUNT => {
                tagged::from_fields(fields).map(Self::UserTransferredAccount)
            }
            MFA_ENABLED => tagged::from_fields(fields).map(Self::MfaEnabled),
            MFA_DISABLED => tagged::from_fields(fields).map(Self::MfaDisabled),
            _ => Ok(Self::Other(OtherEvent {
                event_type: event_type.clone(),
                properties: fields,
            })),
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields: Result<Map<String, Value>, S::Error> = match self {
            Self::Test(event) => tagged::to_fields(event),
            Self::UserCreated(event) => tagged::to_fields(event),
            Self::UserAuthenticated(event)
            | Self::UserLinkedAccount(event)
            | Self::UserUnlinkedAccount(event)
            | Self::UserUpdatedAccount(event) => tagged::to_fields(event),
            Self::UserTransferredAccount(event) => tagged::to_fields(event),
            Self::MfaEnabled(event) | Self::MfaDisabled(event) => tagged::to_fields(event),
            Self::Other(event) => Ok(event.properties.clone()),
        };

        tagged::with_tag(fields?, self.event_type()).serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r#"{
        "created_at": 969628260,
        "has_accepted_terms": false,
        "id": "did:privy:cfbsvtqo2c22202mo08847jdux2z",
        "is_guest": false,
        "linked_accounts": [
            {
                "address": "bilbo@privy.io",
                "first_verified_at": 969628260,
                "latest_verified_at": 969628260,
                "type": "email",
                "verified_at": 969628260
            }
        ],
        "mfa_methods": []
    }"#;

    const ACCOUNT: &str = r#"{
        "address": "bilbo@privy.io",
        "first_verified_at": 969628260,
        "latest_verified_at": 969628260,
        "type": "email",
        "verified_at": 969628260
    }"#;

    fn read(json: &str) -> Event {
        serde_json::from_str(json).unwrap()
    }

    fn account_event(event_type: &str) -> Event {
        read(&format!(
            r#"{{"type": "{event_type}", "account": {ACCOUNT}, "user": {USER}}}"#
        ))
    }

    #[test]
    fn test_event() {
        let event = read(r#"{"type": "privy.test", "message": "Hello, World!"}"#);
        assert_eq!(
            event,
            Event::Test(TestEvent {
                message: "Hello, World!".to_string()
            })
        );
    }

    #[test]
    fn user_created() {
        let event = read(&format!(r#"{{"type": "user.created", "user": {USER}}}"#));

        let Event::UserCreated(created) = event else {
            panic!("expected user.created, got {event:?}");
        };
        assert_eq!(created.user.id, "did:privy:cfbsvtqo2c22202mo08847jdux2z");
    }

    #[test]
    fn account_events_select_their_variant() {
        let cases = [
            USER_AUTHENTICATED,
            USER_LINKED_ACCOUNT,
            USER_UNLINKED_ACCOUNT,
            USER_UPDATED_ACCOUNT,
        ];

        for event_type in cases {
            let event = account_event(event_type);
            assert_eq!(event.event_type(), event_type);

            let inner = match &event {
                Event::UserAuthenticated(inner)
                | Event::UserLinkedAccount(inner)
                | Event::UserUnlinkedAccount(inner)
                | Event::UserUpdatedAccount(inner) => inner,
                other => panic!("unexpected variant {other:?}"),
            };
            assert!(matches!(inner.account, LinkedAccount::Email(_)));
            assert_eq!(inner.user.id, "did:privy:cfbsvtqo2c22202mo08847jdux2z");
        }
    }

    #[test]
    fn user_transferred_account() {
        let event = read(&format!(
            r#"{{
                "type": "user.transferred_account",
                "account": {ACCOUNT},
                "fromUser": {{ "id": "did:privy:from" }},
                "toUser": {USER},
                "deletedUser": true
            }}"#
        ));

        let Event::UserTransferredAccount(transfer) = event else {
            panic!("expected user.transferred_account, got {event:?}");
        };
        assert_eq!(transfer.from_user.id, "did:privy:from");
        assert_eq!(transfer.to_user.id, "did:privy:cfbsvtqo2c22202mo08847jdux2z");
        assert!(transfer.deleted_user);
    }

    #[test]
    fn mfa_events() {
        let enabled = read(r#"{"type": "mfa.enabled", "user_id": "did:privy:x", "method": "totp"}"#);
        let disabled = read(r#"{"type": "mfa.disabled", "user_id": "did:privy:x", "method": "sms"}"#);

        assert!(matches!(enabled, Event::MfaEnabled(ref e) if e.method == "totp"));
        assert!(matches!(disabled, Event::MfaDisabled(ref e) if e.method == "sms"));
    }

    #[test]
    fn unknown_type_is_kept() {
        let event = read(
            r#"{
                "type": "some.new.type",
                "wallet_id": "wallet-1",
                "nested": { "depth": 2 },
                "tags": ["a", "b"]
            }"#,
        );

        let Event::Other(other) = &event else {
            panic!("expected other, got {event:?}");
        };
        assert_eq!(other.event_type, "some.new.type");
        assert_eq!(other.properties.len(), 3);
        assert_eq!(other.properties["wallet_id"], "wallet-1");
        assert_eq!(other.properties["nested"]["depth"], 2);

        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded["type"], "some.new.type");
        assert_eq!(encoded["tags"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn known_type_with_wrong_shape_is_rejected() {
        let result = serde_json::from_str::<Event>(r#"{"type": "user.created", "user": 42}"#);
        assert!(result.is_err());
    }
}
