//! `backoffice-session`
//!
//! **Responsibility:** client-side session lifecycle for the back-office.
//!
//! This crate provides:
//! - Durable credential storage (access token, refresh token, user record)
//! - Login / logout / forgot-password flows against the auth API
//! - Live validity checks and capability gating for protected views
//!
//! The API remains the authority: tokens are stored and read, never minted
//! or verified here.

pub mod config;
pub mod manager;
pub mod store;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use config::{ConfigError, SessionConfig};
pub use manager::{Clock, RestoredSession, SessionError, SessionManager, SystemClock};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};
pub use transport::{
    AuthTransport, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    TransportError,
};

#[cfg(feature = "http")]
pub use http::HttpAuthTransport;

pub use backoffice_auth::{
    AuthorizationDecision, GateOutcome, MatchMode, Permission, PermissionSet, SessionState,
    UserId, UserRecord,
};
