//! URL helpers: OAuth sign-in URLs and session redirects.
//!
//! After an OAuth, magic-link or recovery flow the service redirects back
//! to the application with the session tokens in the URL fragment (or, on
//! some platforms, the query string):
//!
//! ```text
//! myapp://callback#access_token=..&expires_in=3600&refresh_token=..&token_type=bearer&type=recovery
//! ```
//!
//! On failure the same redirect carries `error_description` instead.

use std::collections::HashMap;

use authforge_protocol::{OAuthOptions, Provider, Session};
use url::Url;

use crate::AuthError;

/// Where to send the user to sign in with a third-party provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthResponse {
    pub provider: Provider,
    pub url: String,
}

/// The session recovered from a redirect URL.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFromUrl {
    pub session: Session,
    /// The redirect's `type` parameter, e.g. `recovery` or `signup`.
    pub redirect_type: Option<String>,
}

/// Builds `<base>/authorize?provider=..` with the OAuth options applied.
pub(crate) fn oauth_sign_in_url(
    base: &str,
    provider: Provider,
    options: &OAuthOptions,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&format!("{}/authorize", base.trim_end_matches('/')))
        .map_err(|e| AuthError::InvalidUrl(format!("{base}: {e}")))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("provider", provider.as_str());
        if let Some(redirect_to) = &options.redirect_to {
            query.append_pair("redirect_to", redirect_to);
        }
        if let Some(scopes) = &options.scopes {
            query.append_pair("scopes", scopes);
        }
        for (name, value) in &options.query_params {
            query.append_pair(name, value);
        }
    }
    Ok(url)
}

/// Token parameters carried by a successful sign-in redirect.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RedirectTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub provider_token: Option<String>,
    pub redirect_type: Option<String>,
}

/// Extracts the session tokens from a redirect URL.
///
/// Parameters are read from the fragment when it is present, otherwise
/// from the query string. An `error_description` parameter is surfaced as
/// [`AuthError::Remote`].
pub(crate) fn parse_redirect(raw: &str) -> Result<RedirectTokens, AuthError> {
    let url = Url::parse(raw).map_err(|e| AuthError::InvalidUrl(format!("{raw}: {e}")))?;
    let params: HashMap<String, String> = match url.fragment().filter(|f| !f.is_empty()) {
        Some(fragment) => url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect(),
        None => url.query_pairs().into_owned().collect(),
    };

    if let Some(description) = params.get("error_description") {
        return Err(AuthError::Remote {
            message: description.clone(),
            code: params
                .get("error_code")
                .or_else(|| params.get("error"))
                .cloned(),
        });
    }

    let required = |name: &str| {
        params
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| AuthError::InvalidUrl(format!("no {name} detected")))
    };
    let access_token = required("access_token")?;
    let expires_in = required("expires_in")?
        .parse::<i64>()
        .map_err(|_| AuthError::InvalidUrl("expires_in is not a number".into()))?;

    Ok(RedirectTokens {
        access_token,
        refresh_token: required("refresh_token")?,
        token_type: required("token_type")?,
        expires_in,
        provider_token: params.get("provider_token").cloned(),
        redirect_type: params.get("type").cloned(),
    })
}
