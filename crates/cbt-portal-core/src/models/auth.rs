//! Auth endpoint payloads.

use serde::{Deserialize, Serialize};

use super::{null_as_default, Role, User};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Email address or matric number
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub email: String,
    pub matric_number: String,
    pub password: String,
    pub role: Role,
    pub department_id: String,
    pub phone_number: String,
}

/// Response of `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response of `/auth/refresh`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    /// Empty when the backend does not rotate refresh tokens
    #[serde(default, deserialize_with = "null_as_default")]
    pub refresh_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub timestamp: Option<String>,
}
