//! The network half of a token refresh, on top of a [`Transport`].

use std::future::Future;
use std::sync::Arc;

use authforge_protocol::{Session, decode};
use authforge_session::{Clock, SessionError, TokenRefresher};
use authforge_transport::{Request, Transport};
use serde_json::json;

/// Exchanges a refresh token at `POST /token?grant_type=refresh_token`.
///
/// The access token, when known, is sent as the bearer credential.
pub struct TransportRefresher<T> {
    transport: Arc<T>,
    clock: Arc<dyn Clock>,
}

impl<T: Transport> TransportRefresher<T> {
    pub fn new(transport: Arc<T>, clock: Arc<dyn Clock>) -> Self {
        Self { transport, clock }
    }
}

impl<T: Transport> TokenRefresher for TransportRefresher<T> {
    fn refresh(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send {
        let mut request = Request::post("/token")
            .query("grant_type", "refresh_token")
            .json(json!({ "refresh_token": refresh_token }));
        if let Some(access_token) = access_token {
            request = request.bearer(access_token);
        }
        let transport = Arc::clone(&self.transport);
        let clock = Arc::clone(&self.clock);

        async move {
            let body = transport.request(request).await?;
            Ok(decode::session(&body, clock.now())?)
        }
    }
}
