//! Authenticated API client for the CBT portal backend.
//!
//! Every call is decorated with the current bearer token and a fresh
//! request id. A 401 triggers at most one token refresh and at most one
//! retry of the original request; the call never loops.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::refresh::RefreshCoordinator;
use super::transport::{
    generate_request_id, ApiResponse, PendingRequest, ReqwestTransport, Transport,
    REQUEST_ID_HEADER,
};
use super::ApiError;
use crate::auth::SessionStore;
use crate::config::Config;
use crate::models::{RefreshRequest, TokenPair};

const REFRESH_ENDPOINT: &str = "/auth/refresh";

/// Sends single attempts: header decoration, deadline and debug logging.
#[derive(Clone)]
struct Dispatcher {
    transport: Arc<dyn Transport>,
    deadline: Duration,
    debug: bool,
}

impl Dispatcher {
    async fn send(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let mut request = request.clone();
        decorate(&mut request.headers, token)?;

        if self.debug {
            debug!(
                method = %request.method,
                url = %request.url,
                request_id = request.request_id().unwrap_or_default(),
                body = ?request.body,
                "API request"
            );
        }

        let outcome = match tokio::time::timeout(self.deadline, self.transport.send(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::Network(format!(
                "Request to {} exceeded the {}ms deadline",
                request.url,
                self.deadline.as_millis()
            ))),
        };

        if self.debug {
            match &outcome {
                Ok(response) => debug!(
                    status = response.status.as_u16(),
                    url = %request.url,
                    body = %ApiError::truncate_body(&response.body),
                    "API response"
                ),
                Err(e) => debug!(url = %request.url, error = %e, "API error"),
            }
        }

        outcome
    }
}

fn decorate(headers: &mut HeaderMap, token: Option<&str>) -> Result<(), ApiError> {
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let request_id = HeaderValue::from_str(&generate_request_id())
        .map_err(|e| ApiError::InvalidRequest(format!("Bad request id: {}", e)))?;
    headers.insert(REQUEST_ID_HEADER, request_id);

    match token {
        Some(token) => {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::InvalidRequest("Access token is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        None => {
            headers.remove(header::AUTHORIZATION);
        }
    }
    Ok(())
}

/// One refresh attempt. Success stores the new pair; any failure clears
/// the session and reports `AuthExpired`.
async fn run_refresh(
    dispatcher: Dispatcher,
    session: SessionStore,
    url: String,
    refresh_token: String,
) -> Result<TokenPair, ApiError> {
    let request = PendingRequest::new(Method::POST, url)
        .json(&RefreshRequest {
            refresh_token: refresh_token.clone(),
        })?
        .without_refresh();

    let outcome = match dispatcher.send(&request, None).await {
        Ok(response) => response.into_json::<TokenPair>(),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(mut pair) if !pair.access_token.is_empty() => {
            if pair.refresh_token.is_empty() {
                pair.refresh_token = refresh_token;
            }
            session.set_tokens(pair.access_token.clone(), pair.refresh_token.clone());
            info!("Access token refreshed");
            Ok(pair)
        }
        Ok(_) => {
            warn!("Refresh response carried no access token; clearing session");
            session.clear();
            Err(ApiError::AuthExpired)
        }
        Err(e) => {
            warn!(error = %e, "Token refresh failed; clearing session");
            session.clear();
            Err(ApiError::AuthExpired)
        }
    }
}

/// API client for the CBT portal.
///
/// Clone is cheap: the config, transport, session and refresh coordinator
/// are shared.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    dispatcher: Dispatcher,
    session: SessionStore,
    refresher: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a client that talks HTTP via reqwest
    pub fn new(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, session, Arc::new(transport)))
    }

    pub fn with_transport(
        config: &Config,
        session: SessionStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config: Arc::new(config.clone()),
            dispatcher: Dispatcher {
                transport,
                deadline: config.timeout(),
                debug: config.debug,
            },
            session,
            refresher: Arc::new(RefreshCoordinator::new(config.dedupe_refresh)),
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Absolute URL for an API path such as `/courses/`
    pub fn url(&self, path: &str) -> String {
        self.config.api_url(path)
    }

    pub fn build(&self, method: Method, path: &str) -> PendingRequest {
        PendingRequest::new(method, self.url(path))
    }

    /// Send `request`, refreshing the access token and retrying once on 401.
    ///
    /// Any non-401 response is returned as-is, including other error
    /// statuses. `AuthExpired` means there was no refresh token or the
    /// refresh failed; whatever the single retry returns, a second 401
    /// included, goes back to the caller untouched.
    pub async fn execute(&self, request: PendingRequest) -> Result<ApiResponse, ApiError> {
        let sent_with = self.session.snapshot().access_token().map(str::to_string);
        let response = self.dispatcher.send(&request, sent_with.as_deref()).await?;

        if response.status != StatusCode::UNAUTHORIZED || !request.refresh_on_unauthorized {
            return Ok(response);
        }

        debug!(url = %request.url, "Unauthorized; attempting token refresh");
        let current = self.session.snapshot();
        let retry_token = match current.access_token() {
            // Another call rotated the tokens while this one was in flight
            Some(token) if sent_with.as_deref() != Some(token) => token.to_string(),
            _ => match current.refresh_token() {
                Some(refresh_token) => self.refresh_with(refresh_token.to_string()).await?.access_token,
                None => {
                    warn!(url = %request.url, "Unauthorized with no refresh token");
                    return Err(self.expire());
                }
            },
        };

        // Single retry; its outcome is final
        let retried = self.dispatcher.send(&request, Some(&retry_token)).await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!(url = %request.url, "Retried request still unauthorized");
        }
        Ok(retried)
    }

    /// Explicitly refresh the access token using the stored refresh token.
    pub async fn refresh_session(&self) -> Result<TokenPair, ApiError> {
        match self.session.snapshot().refresh_token() {
            Some(refresh_token) => self.refresh_with(refresh_token.to_string()).await,
            None => Err(self.expire()),
        }
    }

    async fn refresh_with(&self, refresh_token: String) -> Result<TokenPair, ApiError> {
        let dispatcher = self.dispatcher.clone();
        let session = self.session.clone();
        let url = self.url(REFRESH_ENDPOINT);
        self.refresher
            .run(refresh_token, move |token| {
                run_refresh(dispatcher, session, url, token).boxed()
            })
            .await
    }

    fn expire(&self) -> ApiError {
        self.session.clear();
        ApiError::AuthExpired
    }

    /// Execute and decode a JSON body; non-2xx becomes `ApiError::Application`.
    pub async fn request<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T, ApiError> {
        self.execute(request).await?.into_json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(self.build(Method::GET, path)).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.request(self.build(Method::GET, path).queries(query)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(self.build(Method::POST, path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(self.build(Method::PUT, path).json(body)?).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(self.build(Method::PATCH, path).json(body)?).await
    }

    /// DELETE, discarding any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self.execute(self.build(Method::DELETE, path)).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(ApiError::from_status(response.status, &response.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{respond, test_client, test_config, MockTransport};
    use crate::auth::Session;
    use crate::models::{Role, User};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const COURSES: &str = "/courses/";

    fn student() -> User {
        User {
            id: "s1".to_string(),
            role: Role::Student,
            ..User::default()
        }
    }

    fn logged_in() -> SessionStore {
        let session = SessionStore::in_memory();
        session.establish(student(), "a1", "r1");
        session
    }

    /// Courses succeed only for `accepted`; refresh with r1 yields a2/r2.
    fn rotating_backend(accepted: &'static str) -> MockTransport {
        MockTransport::new(move |req| {
            if req.url.ends_with(REFRESH_ENDPOINT) {
                let body = req.body.clone().unwrap_or_default();
                if body["refresh_token"] == "r1" {
                    return respond(200, json!({"access_token": "a2", "refresh_token": "r2", "expires_in": 900}));
                }
                return respond(400, json!({"message": "Invalid refresh token"}));
            }
            if req.bearer_token() == Some(accepted) {
                respond(200, json!({"courses": [], "total": 0}))
            } else {
                respond(401, json!({"detail": "Token expired"}))
            }
        })
    }

    #[tokio::test]
    async fn test_attaches_bearer_and_trace_headers() {
        let transport = Arc::new(rotating_backend("a1"));
        let client = test_client(transport.clone(), logged_in());

        let _: Value = client.get(COURSES).await.expect("courses");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].bearer_token(), Some("a1"));
        assert_eq!(
            requests[0].headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert!(requests[0].request_id().is_some());
        assert_eq!(requests[0].url, "http://localhost:8000/api/v1/courses/");
    }

    #[tokio::test]
    async fn test_no_authorization_header_without_token() {
        let transport = Arc::new(MockTransport::new(|_| respond(200, json!([]))));
        let client = test_client(transport.clone(), SessionStore::in_memory());

        let _: Value = client.get(COURSES).await.expect("public call");
        assert!(transport.requests()[0].bearer_token().is_none());
    }

    #[tokio::test]
    async fn test_refresh_then_retry_with_new_token() {
        let transport = Arc::new(rotating_backend("a2"));
        let session = logged_in();
        let client = test_client(transport.clone(), session.clone());

        let _: Value = client.get(COURSES).await.expect("retried call succeeds");

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].bearer_token(), Some("a1"));
        assert!(requests[1].url.ends_with(REFRESH_ENDPOINT));
        assert_eq!(requests[2].bearer_token(), Some("a2"));
        assert_ne!(requests[0].request_id(), requests[2].request_id());

        let snap = session.snapshot();
        assert_eq!(snap.access_token(), Some("a2"));
        assert_eq!(snap.refresh_token(), Some("r2"));
        assert!(snap.is_authenticated);
    }

    #[tokio::test]
    async fn test_refresh_rejected_clears_session() {
        let transport = Arc::new(rotating_backend("a2"));
        let session = SessionStore::in_memory();
        session.establish(student(), "a1", "revoked");
        let client = test_client(transport.clone(), session.clone());

        let err = client.get::<Value>(COURSES).await.unwrap_err();

        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
        assert_eq!(transport.count(COURSES), 1);
        assert_eq!(session.snapshot(), Session::default());
    }

    #[tokio::test]
    async fn test_refresh_network_failure_clears_session() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.ends_with(REFRESH_ENDPOINT) {
                Err(ApiError::Network("connection reset".to_string()))
            } else {
                respond(401, json!({}))
            }
        }));
        let session = logged_in();
        let client = test_client(transport, session.clone());

        let err = client.get::<Value>(COURSES).await.unwrap_err();
        assert!(err.is_auth_expired());
        assert!(!session.is_authenticated());
        assert!(session.snapshot().refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_no_session_fails_without_refresh() {
        let transport = Arc::new(rotating_backend("a1"));
        let client = test_client(transport.clone(), SessionStore::in_memory());

        let err = client.get::<Value>(COURSES).await.unwrap_err();

        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(transport.count(REFRESH_ENDPOINT), 0);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_access_token_without_refresh_token_fails_fast() {
        let transport = Arc::new(rotating_backend("a2"));
        let session = SessionStore::in_memory();
        session.establish(student(), "a1", "");
        let client = test_client(transport.clone(), session.clone());

        let err = client.get::<Value>(COURSES).await.unwrap_err();
        assert_eq!(err, ApiError::AuthExpired);
        assert_eq!(transport.count(REFRESH_ENDPOINT), 0);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_single_retry_bound() {
        // Refresh always works but the backend keeps rejecting the call
        let transport = Arc::new(rotating_backend("never"));
        let session = logged_in();
        let client = test_client(transport.clone(), session.clone());

        let err = client.get::<Value>(COURSES).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert!(!err.is_auth_expired());
        assert_eq!(transport.count(REFRESH_ENDPOINT), 1);
        assert_eq!(transport.count(COURSES), 2);

        // The refreshed pair is still valid and stays in place
        let snap = session.snapshot();
        assert!(snap.is_authenticated);
        assert_eq!(snap.access_token(), Some("a2"));
        assert_eq!(snap.refresh_token(), Some("r2"));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        for status in [400u16, 403, 404, 500, 503] {
            let transport = Arc::new(MockTransport::new(move |_| {
                respond(status, json!({"message": "nope", "code": "E_TEST"}))
            }));
            let session = logged_in();
            let client = test_client(transport.clone(), session.clone());

            let err = client.get::<Value>(COURSES).await.unwrap_err();

            assert_eq!(err.status(), Some(status));
            assert_eq!(err.code(), Some("E_TEST"));
            assert_eq!(transport.requests().len(), 1);
            assert!(session.is_authenticated());
        }
    }

    #[tokio::test]
    async fn test_unauthorized_without_refresh_flag_is_application_error() {
        let transport = Arc::new(MockTransport::new(|_| {
            respond(401, json!({"message": "Invalid credentials"}))
        }));
        let session = logged_in();
        let client = test_client(transport.clone(), session.clone());

        let request = client
            .build(Method::POST, "/auth/login")
            .json(&json!({"identifier": "x", "password": "y"}))
            .expect("body")
            .without_refresh();
        let err = client.request::<Value>(request).await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.count(REFRESH_ENDPOINT), 0);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_tokens_rotated_elsewhere_skip_refresh() {
        let session = logged_in();
        let rotator = session.clone();
        let transport = Arc::new(MockTransport::new(move |req| {
            if req.bearer_token() == Some("a1") {
                // Simulates a concurrent call finishing its refresh first
                rotator.set_tokens("a2", "r2");
                return respond(401, json!({}));
            }
            respond(200, json!([]))
        }));
        let client = test_client(transport.clone(), session);

        let _: Value = client.get(COURSES).await.expect("retry with rotated token");

        assert_eq!(transport.count(REFRESH_ENDPOINT), 0);
        assert_eq!(transport.requests()[1].bearer_token(), Some("a2"));
    }

    #[tokio::test]
    async fn test_concurrent_unauthorized_calls_share_refresh() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let transport = Arc::new(
            MockTransport::new(move |req| {
                if req.url.ends_with(REFRESH_ENDPOINT) {
                    // Rotating backend: r1 is only honoured once
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        return respond(200, json!({"access_token": "a2", "refresh_token": "r2"}));
                    }
                    return respond(400, json!({"message": "Refresh token reused"}));
                }
                match req.bearer_token() {
                    Some("a2") => respond(200, json!([])),
                    _ => respond(401, json!({})),
                }
            })
            .delay(REFRESH_ENDPOINT, Duration::from_millis(50)),
        );
        let session = logged_in();
        let client = test_client(transport.clone(), session.clone());

        let (a, b) = tokio::join!(client.get::<Value>(COURSES), client.get::<Value>("/departments/"));

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.snapshot().access_token(), Some("a2"));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_race_without_dedupe() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let counter = refreshes.clone();
        let transport = Arc::new(
            MockTransport::new(move |req| {
                if req.url.ends_with(REFRESH_ENDPOINT) {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        return respond(200, json!({"access_token": "a2", "refresh_token": "r2"}));
                    }
                    return respond(400, json!({"message": "Refresh token reused"}));
                }
                match req.bearer_token() {
                    Some("a2") => respond(200, json!([])),
                    _ => respond(401, json!({})),
                }
            })
            .delay(REFRESH_ENDPOINT, Duration::from_millis(50)),
        );
        let session = logged_in();
        let config = Config {
            dedupe_refresh: false,
            ..test_config()
        };
        let client = ApiClient::with_transport(&config, session.clone(), transport);

        let (a, b) = tokio::join!(client.get::<Value>(COURSES), client.get::<Value>("/departments/"));

        // The loser of the race logs everyone out
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert!(a.err().or(b.err()).is_some_and(|e| e.is_auth_expired()));
        assert_eq!(refreshes.load(Ordering::SeqCst), 2);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_network_error() {
        let transport = Arc::new(
            MockTransport::new(|_| respond(200, json!([])))
                .delay(COURSES, Duration::from_millis(500)),
        );
        let config = Config {
            timeout_ms: 20,
            ..test_config()
        };
        let client = ApiClient::with_transport(&config, logged_in(), transport);

        let err = client.get::<Value>(COURSES).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[tokio::test]
    async fn test_cancelled_call_never_refreshes() {
        let transport = Arc::new(
            MockTransport::new(|_| respond(401, json!({})))
                .delay(COURSES, Duration::from_millis(200)),
        );
        let session = logged_in();
        let client = test_client(transport.clone(), session.clone());

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), client.get::<Value>(COURSES)).await;

        assert!(cancelled.is_err());
        assert_eq!(transport.count(REFRESH_ENDPOINT), 0);
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_explicit_refresh_session() {
        let transport = Arc::new(rotating_backend("a2"));
        let session = logged_in();
        let client = test_client(transport, session.clone());

        let pair = client.refresh_session().await.expect("refresh");
        assert_eq!(pair.access_token, "a2");
        assert_eq!(session.snapshot().refresh_token(), Some("r2"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_token_when_not_rotated() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.url.ends_with(REFRESH_ENDPOINT) {
                return respond(200, json!({"access_token": "a2", "expires_in": 60}));
            }
            respond(200, json!([]))
        }));
        let session = logged_in();
        let client = test_client(transport, session.clone());

        client.refresh_session().await.expect("refresh");
        assert_eq!(session.snapshot().refresh_token(), Some("r1"));
    }

    #[tokio::test]
    async fn test_delete_discards_body() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert_eq!(req.method, Method::DELETE);
            respond(204, Value::Null)
        }));
        let client = test_client(transport, logged_in());
        client.delete("/courses/c1").await.expect("delete");
    }
}
