//! Contract with the auth API (the transport collaborator).
//!
//! The session manager treats the transport as a black box: it sends typed
//! requests and gets typed responses or a [`TransportError`]. Timeout and
//! retry policy belong to the implementation, not to the session layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_auth::UserRecord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error ({0}): {1}")]
    Api(u16, String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// `POST /auth/login`
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Successful login exchange.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserRecord,
}

impl core::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("user", &self.user)
            .finish()
    }
}

/// `POST /auth/forgot-password`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// `POST /auth/logout`
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

impl core::fmt::Debug for LogoutRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogoutRequest")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Exchange credentials for tokens and the user record.
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, TransportError>;

    /// Ask the API to start a password reset for `request.email`.
    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), TransportError>;

    /// Invalidate the refresh token server-side.
    async fn logout(&self, request: &LogoutRequest) -> Result<(), TransportError>;
}
