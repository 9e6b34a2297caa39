//! Login, registration, logout and account maintenance endpoints.

use reqwest::Method;
use tracing::{info, warn};

use super::{ApiClient, ApiError};
use crate::auth::SessionStore;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    TokenPair, User, UserUpdate,
};

/// Auth operations that keep the [`SessionStore`] in step with the backend.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn session(&self) -> &SessionStore {
        self.client.session()
    }

    /// Log in with an email address or matric number.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, ApiError> {
        let request = self
            .client
            .build(Method::POST, "/auth/login")
            .json(&LoginRequest {
                identifier: identifier.to_string(),
                password: password.to_string(),
            })?
            .without_refresh();

        let response = self.client.request::<LoginResponse>(request).await;
        self.establish(response)
    }

    pub async fn register(&self, details: &RegisterRequest) -> Result<User, ApiError> {
        let request = self
            .client
            .build(Method::POST, "/auth/register")
            .json(details)?
            .without_refresh();

        let response = self.client.request::<LoginResponse>(request).await;
        self.establish(response)
    }

    fn establish(&self, response: Result<LoginResponse, ApiError>) -> Result<User, ApiError> {
        match response {
            Ok(login) => {
                info!(user_id = %login.user.id, role = %login.user.role, "Logged in");
                self.session().establish(
                    login.user.clone(),
                    login.access_token,
                    login.refresh_token,
                );
                Ok(login.user)
            }
            Err(e) => {
                self.session().set_error(e.to_string());
                Err(e)
            }
        }
    }

    pub async fn refresh(&self) -> Result<TokenPair, ApiError> {
        self.client.refresh_session().await
    }

    /// Tell the backend, then clear the session whatever it answered.
    pub async fn logout(&self) {
        let request = self.client.build(Method::POST, "/auth/logout").without_refresh();
        match self.client.execute(request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => warn!(status = response.status.as_u16(), "Logout rejected by server"),
            Err(e) => warn!(error = %e, "Logout request failed"),
        }
        self.session().clear();
        info!("Logged out");
    }

    /// Re-fetch the current user's profile into the session.
    pub async fn fetch_profile(&self) -> Result<User, ApiError> {
        let user: User = self.client.get("/users/me").await?;
        self.session().set_user(user.clone());
        Ok(user)
    }

    pub async fn update_profile(&self, update: &UserUpdate) -> Result<User, ApiError> {
        let user: User = self.client.put("/users/me", update).await?;
        self.session().update_user(update);
        Ok(user)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        self.client
            .post(
                "/auth/change-password",
                &ChangePasswordRequest {
                    current_password: current_password.to_string(),
                    new_password: new_password.to_string(),
                },
            )
            .await
    }

    pub async fn verify_email(&self, token: &str) -> Result<MessageResponse, ApiError> {
        self.public_post("/auth/verify-email", &[("token", token)]).await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ApiError> {
        self.public_post("/auth/forgot-password", &[("email", email)]).await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<MessageResponse, ApiError> {
        self.public_post(
            "/auth/reset-password",
            &[("token", token), ("new_password", new_password)],
        )
        .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<MessageResponse, ApiError> {
        self.public_post("/auth/resend-verification", &[("email", email)]).await
    }

    /// POST with query parameters only; a 401 here is a plain error.
    async fn public_post(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<MessageResponse, ApiError> {
        let request = params
            .iter()
            .fold(self.client.build(Method::POST, path), |req, (k, v)| req.query(*k, *v))
            .without_refresh();
        self.client.request(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{respond, test_client, MockTransport};
    use crate::models::Role;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn login_backend() -> MockTransport {
        MockTransport::new(|req| {
            if req.url.ends_with("/auth/login") {
                let body = req.body.clone().unwrap_or_default();
                if body["password"] == "secret" {
                    return respond(200, json!({
                        "access_token": "a1",
                        "refresh_token": "r1",
                        "token_type": "bearer",
                        "expires_in": 900,
                        "user": {"id": "s1", "role": "student", "email": "ada@example.edu"}
                    }));
                }
                return respond(401, json!({"message": "Invalid credentials"}));
            }
            if req.url.ends_with("/courses/") && req.bearer_token() == Some("a1") {
                return respond(200, json!({"courses": []}));
            }
            respond(401, json!({}))
        })
    }

    #[tokio::test]
    async fn test_login_establishes_session_and_authorizes_calls() {
        let transport = Arc::new(login_backend());
        let session = SessionStore::in_memory();
        let client = test_client(transport.clone(), session.clone());
        let auth = AuthService::new(client.clone());

        let user = auth.login("ada@example.edu", "secret").await.expect("login");
        assert_eq!(user.role, Role::Student);

        let snap = session.snapshot();
        assert!(snap.is_authenticated);
        assert_eq!(snap.access_token(), Some("a1"));
        assert_eq!(snap.refresh_token(), Some("r1"));

        let _: Value = client.get("/courses/").await.expect("courses");
        let last = transport.requests().pop().expect("course request");
        assert_eq!(last.bearer_token(), Some("a1"));
    }

    #[tokio::test]
    async fn test_staff_login_with_null_columns() {
        let transport = Arc::new(MockTransport::new(|_| {
            respond(200, json!({
                "access_token": "a1",
                "refresh_token": "r1",
                "token_type": null,
                "user": {
                    "id": "l1",
                    "role": "lecturer",
                    "email": "tunde@example.edu",
                    "matric_number": null,
                    "program_id": null,
                    "last_login": null
                }
            }))
        }));
        let session = SessionStore::in_memory();
        let auth = AuthService::new(test_client(transport, session.clone()));

        let user = auth.login("tunde@example.edu", "secret").await.expect("login");

        assert_eq!(user.role, Role::Lecturer);
        assert_eq!(user.matric_number, "");
        assert!(session.is_authenticated());
        assert_eq!(session.snapshot().access_token(), Some("a1"));
    }

    #[tokio::test]
    async fn test_bad_credentials_record_error_without_refresh() {
        let transport = Arc::new(login_backend());
        let session = SessionStore::in_memory();
        session.set_tokens("stale", "r-stale");
        let auth = AuthService::new(test_client(transport.clone(), session.clone()));

        let err = auth.login("ada@example.edu", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid credentials");
        assert_eq!(transport.count("/auth/refresh"), 0);
        let snap = session.snapshot();
        assert!(!snap.is_authenticated);
        assert_eq!(snap.error.as_deref(), Some("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let transport = Arc::new(MockTransport::new(|_| {
            Err(ApiError::Network("offline".to_string()))
        }));
        let session = SessionStore::in_memory();
        session.establish(User::default(), "a1", "r1");
        let auth = AuthService::new(test_client(transport.clone(), session.clone()));

        auth.logout().await;

        assert!(!session.is_authenticated());
        assert!(session.snapshot().access_token.is_none());
        assert_eq!(transport.count("/auth/logout"), 1);
        assert_eq!(transport.requests()[0].bearer_token(), Some("a1"));
    }

    #[tokio::test]
    async fn test_register_uses_login_shape() {
        let transport = Arc::new(MockTransport::new(|req| {
            assert!(req.url.ends_with("/auth/register"));
            let body = req.body.clone().unwrap_or_default();
            assert_eq!(body["role"], "lecturer");
            respond(201, json!({
                "access_token": "a9",
                "refresh_token": "r9",
                "user": {"id": "l1", "role": "lecturer"}
            }))
        }));
        let session = SessionStore::in_memory();
        let auth = AuthService::new(test_client(transport, session.clone()));

        let details = RegisterRequest {
            first_name: "Tunde".to_string(),
            last_name: "Bello".to_string(),
            middle_name: String::new(),
            email: "tunde@example.edu".to_string(),
            matric_number: String::new(),
            password: "secret".to_string(),
            role: Role::Lecturer,
            department_id: "d1".to_string(),
            phone_number: "0800".to_string(),
        };
        let user = auth.register(&details).await.expect("register");

        assert_eq!(user.id, "l1");
        assert_eq!(session.snapshot().role(), Some(Role::Lecturer));
    }

    #[tokio::test]
    async fn test_profile_fetch_and_update() {
        let transport = Arc::new(MockTransport::new(|req| {
            if req.method == Method::PUT {
                return respond(200, json!({"id": "s1", "first_name": "Ada", "level": "ND2"}));
            }
            respond(200, json!({"id": "s1", "first_name": "Ada", "level": "ND1"}))
        }));
        let session = SessionStore::in_memory();
        session.set_tokens("a1", "r1");
        let auth = AuthService::new(test_client(transport, session.clone()));

        auth.fetch_profile().await.expect("profile");
        assert_eq!(session.snapshot().user.map(|u| u.level), Some("ND1".to_string()));

        let update = UserUpdate {
            level: Some("ND2".to_string()),
            ..UserUpdate::default()
        };
        auth.update_profile(&update).await.expect("update");
        let user = session.snapshot().user.expect("user");
        assert_eq!(user.level, "ND2");
        assert_eq!(user.first_name, "Ada");
    }

    #[tokio::test]
    async fn test_password_reset_sends_query_params() {
        let transport = Arc::new(MockTransport::new(|_| {
            respond(200, json!({"success": true, "message": "Password updated"}))
        }));
        let auth = AuthService::new(test_client(transport.clone(), SessionStore::in_memory()));

        let ack = auth.reset_password("tok", "n3w pass").await.expect("reset");
        assert!(ack.success);

        let request = &transport.requests()[0];
        assert!(request.url.ends_with("/auth/reset-password"));
        assert_eq!(
            request.query,
            vec![
                ("token".to_string(), "tok".to_string()),
                ("new_password".to_string(), "n3w pass".to_string()),
            ]
        );
        assert!(!request.refresh_on_unauthorized);
    }
}
