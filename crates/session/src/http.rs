//! `reqwest`-backed implementation of [`AuthTransport`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::transport::{
    AuthTransport, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    TransportError,
};

/// HTTP client for the auth endpoints of the back-office API.
#[derive(Debug, Clone)]
pub struct HttpAuthTransport {
    api_url: String,
    client: reqwest::Client,
}

impl HttpAuthTransport {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a transport from configuration, applying the request timeout if one is set.
    pub fn from_config(config: &SessionConfig) -> Result<Self, TransportError> {
        Self::with_timeout(config.api_url.clone(), config.request_timeout)
    }

    pub fn with_timeout(
        api_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            api_url: api_url.into(),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, TransportError> {
        let resp = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(TransportError::Api(
                resp.status().as_u16(),
                resp.text().await.unwrap_or_default(),
            ));
        }

        Ok(resp)
    }
}

#[async_trait]
impl AuthTransport for HttpAuthTransport {
    async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, TransportError> {
        let resp = self.post("/auth/login", request).await?;
        resp.json()
            .await
            .map_err(|e| TransportError::Parse(e.to_string()))
    }

    async fn forgot_password(&self, request: &ForgotPasswordRequest) -> Result<(), TransportError> {
        self.post("/auth/forgot-password", request).await?;
        Ok(())
    }

    async fn logout(&self, request: &LogoutRequest) -> Result<(), TransportError> {
        self.post("/auth/logout", request).await?;
        Ok(())
    }
}
