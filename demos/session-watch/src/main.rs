//! Signs in with a password and prints every auth state change until
//! Ctrl-C, then signs out.
//!
//! ```text
//! AUTHFORGE_URL=https://example.com/auth/v1 \
//! AUTHFORGE_API_KEY=... AUTHFORGE_EMAIL=me@example.com AUTHFORGE_PASSWORD=... \
//! RUST_LOG=authforge_session=debug cargo run -p session-watch
//! ```

use authforge::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Settings {
    url: String,
    api_key: Option<String>,
    email: String,
    password: String,
}

impl Settings {
    /// Reads settings through `var`, so tests don't touch the process env.
    fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required = |name: &str| var(name).ok_or_else(|| format!("{name} is not set"));
        Ok(Self {
            url: required("AUTHFORGE_URL")?,
            api_key: var("AUTHFORGE_API_KEY"),
            email: required("AUTHFORGE_EMAIL")?,
            password: required("AUTHFORGE_PASSWORD")?,
        })
    }
}

fn describe(state: &AuthState) -> String {
    match &state.session {
        Some(session) => format!(
            "{:<16} user={} expires_at={}",
            state.event.to_string(),
            session.user().id,
            session
                .expires_at()
                .map_or_else(|| "never".to_string(), |at| at.to_string()),
        ),
        None => format!("{:<16} (no session)", state.event.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::load(|name| std::env::var(name).ok())?;

    let mut builder = AuthClient::builder().url(&settings.url);
    if let Some(key) = &settings.api_key {
        builder = builder.api_key(key);
    }
    let client = builder.build_http()?;

    client.on_auth_state_change(|state| println!("{}", describe(state)));

    client
        .sign_in_with_password(Some(&settings.email), None, &settings.password, None)
        .await?;
    eprintln!("signed in; watching session (Ctrl-C to sign out)");

    tokio::signal::ctrl_c().await?;
    if let Err(e) = client.sign_out().await {
        tracing::warn!(error = %e, "remote sign-out failed");
    }
    Ok(())
}
