//! Application settings document.

use serde::{Deserialize, Serialize};

/// Settings of a Privy application, as returned by `GET /api/v1/apps/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ApplicationSettings {
    /// The application ID.
    pub id: String,
    /// The application name.
    #[serde(default)]
    pub name: String,
    /// PEM-encoded public key used to verify identity and access tokens.
    pub verification_key: String,
    /// Logo shown in the login modal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// Login modal theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    /// Login modal accent color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,
    /// Wallet login enabled.
    #[serde(default)]
    pub wallet_auth: bool,
    /// Email login enabled.
    #[serde(default)]
    pub email_auth: bool,
    /// SMS login enabled.
    #[serde(default)]
    pub sms_auth: bool,
    /// Google login enabled.
    #[serde(default)]
    pub google_oauth: bool,
    /// Twitter login enabled.
    #[serde(default)]
    pub twitter_oauth: bool,
    /// Discord login enabled.
    #[serde(default)]
    pub discord_oauth: bool,
    /// GitHub login enabled.
    #[serde(default)]
    pub github_oauth: bool,
    /// Apple login enabled.
    #[serde(default)]
    pub apple_oauth: bool,
    /// LinkedIn login enabled.
    #[serde(default)]
    pub linkedin_oauth: bool,
    /// TikTok login enabled.
    #[serde(default)]
    pub tiktok_oauth: bool,
    /// Terms and conditions link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_and_conditions_url: Option<String>,
    /// Privacy policy link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy_policy_url: Option<String>,
}
