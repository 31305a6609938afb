//! Inputs to the authentication flows.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Contact: email XOR phone
// ---------------------------------------------------------------------------

/// The identifier a flow is addressed to: exactly one of email or phone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contact {
    Email(String),
    Phone(String),
}

impl Contact {
    /// Builds a contact from the optional pair callers usually have.
    ///
    /// Returns `None` unless exactly one of the two is present.
    pub fn from_parts(email: Option<&str>, phone: Option<&str>) -> Option<Self> {
        match (email, phone) {
            (Some(email), None) => Some(Self::Email(email.to_string())),
            (None, Some(phone)) => Some(Self::Phone(phone.to_string())),
            _ => None,
        }
    }

    /// The JSON field name the service expects for this identifier.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Phone(_) => "phone",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Email(v) | Self::Phone(v) => v,
        }
    }

    pub fn is_email(&self) -> bool {
        matches!(self, Self::Email(_))
    }

    /// Inserts `"email": ...` or `"phone": ...` into a request body.
    pub fn insert_into(&self, body: &mut Map<String, Value>) {
        body.insert(self.field().to_string(), Value::String(self.value().to_string()));
    }
}

// ---------------------------------------------------------------------------
// OTP and OAuth enums
// ---------------------------------------------------------------------------

/// What a one-time password or link is being verified for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpType {
    Sms,
    PhoneChange,
    Signup,
    Invite,
    Magiclink,
    Recovery,
    EmailChange,
}

/// Third-party identity providers for the OAuth redirect flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Apple,
    Azure,
    Bitbucket,
    Discord,
    Facebook,
    Github,
    Gitlab,
    Google,
    Keycloak,
    Linkedin,
    Notion,
    Slack,
    Spotify,
    Twitch,
    Twitter,
    Workos,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Apple => "apple",
            Self::Azure => "azure",
            Self::Bitbucket => "bitbucket",
            Self::Discord => "discord",
            Self::Facebook => "facebook",
            Self::Github => "github",
            Self::Gitlab => "gitlab",
            Self::Google => "google",
            Self::Keycloak => "keycloak",
            Self::Linkedin => "linkedin",
            Self::Notion => "notion",
            Self::Slack => "slack",
            Self::Spotify => "spotify",
            Self::Twitch => "twitch",
            Self::Twitter => "twitter",
            Self::Workos => "workos",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Flow options
// ---------------------------------------------------------------------------

/// Options for password sign-up.
#[derive(Debug, Clone, Default)]
pub struct SignUpOptions {
    /// Where the confirmation email link should send the user.
    pub redirect_to: Option<String>,
    /// Initial `user_metadata`.
    pub data: Option<Value>,
    pub captcha_token: Option<String>,
}

/// Options for passwordless (OTP / magic link) sign-in.
#[derive(Debug, Clone)]
pub struct OtpOptions {
    pub email_redirect_to: Option<String>,
    /// Create the user if they do not exist yet. Defaults to `true`.
    pub should_create_user: bool,
    pub data: Option<Value>,
    pub captcha_token: Option<String>,
}

impl Default for OtpOptions {
    fn default() -> Self {
        Self {
            email_redirect_to: None,
            should_create_user: true,
            data: None,
            captcha_token: None,
        }
    }
}

/// Options for building an OAuth sign-in URL.
#[derive(Debug, Clone, Default)]
pub struct OAuthOptions {
    pub redirect_to: Option<String>,
    /// Space-separated provider scopes.
    pub scopes: Option<String>,
    /// Extra query parameters passed through to the provider.
    pub query_params: Vec<(String, String)>,
}

/// Attributes accepted by the update-user call. Unset fields are left
/// untouched on the service side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_requires_exactly_one() {
        assert_eq!(
            Contact::from_parts(Some("a@b.c"), None),
            Some(Contact::Email("a@b.c".into()))
        );
        assert_eq!(
            Contact::from_parts(None, Some("+100")),
            Some(Contact::Phone("+100".into()))
        );
        assert_eq!(Contact::from_parts(None, None), None);
        assert_eq!(Contact::from_parts(Some("a@b.c"), Some("+100")), None);
    }

    #[test]
    fn test_contact_insert_into_uses_field_name() {
        let mut body = Map::new();
        Contact::Phone("+100".into()).insert_into(&mut body);
        assert_eq!(Value::Object(body), json!({ "phone": "+100" }));
    }

    #[test]
    fn test_otp_type_serializes_snake_case() {
        assert_eq!(serde_json::to_value(OtpType::Magiclink).unwrap(), json!("magiclink"));
        assert_eq!(
            serde_json::to_value(OtpType::EmailChange).unwrap(),
            json!("email_change")
        );
    }

    #[test]
    fn test_provider_display_matches_serde() {
        assert_eq!(Provider::Github.to_string(), "github");
        assert_eq!(serde_json::to_value(Provider::Workos).unwrap(), json!("workos"));
    }

    #[test]
    fn test_otp_options_default_creates_user() {
        assert!(OtpOptions::default().should_create_user);
    }

    #[test]
    fn test_user_attributes_skips_unset_fields() {
        let attrs = UserAttributes {
            password: Some("hunter2".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&attrs).unwrap(), json!({ "password": "hunter2" }));
    }
}
