//! Session lifecycle: login, logout, restore, and live validity checks.
//!
//! # State
//!
//! The manager starts in [`SessionState::Unknown`]. `restore_session` is the
//! way out of `Unknown` at startup; a successful `login` moves any state to
//! `Authenticated`; `logout` or a detected expiry moves to
//! `Unauthenticated`. No timer runs: expiry is discovered only when a
//! caller asks.
//!
//! # Concurrency
//!
//! `login`, `logout` and `restore_session` are serialized by an in-flight
//! guard; a second call waits for the first to settle. The best-effort
//! server-side logout runs after the guard is released. Reads are
//! synchronous and see the last completed write.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use backoffice_auth::{
    AuthorizationDecision, GateOutcome, MatchMode, Permission, PermissionSet, SessionState,
    UserRecord, authorize, decode_claims, gate, is_token_expired,
};

use crate::config::SessionConfig;
use crate::store::{
    ACCESS_TOKEN_KEY, CredentialStore, FileCredentialStore, REFRESH_TOKEN_KEY, SESSION_KEYS,
    StoreError, USER_KEY,
};
use crate::transport::{
    AuthTransport, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    TransportError,
};

const DEFAULT_ENTRY_ROUTE: &str = "/login";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad credentials or an unreachable login endpoint. Nothing was stored.
    #[error("authentication failed: {0}")]
    Authentication(#[source] TransportError),

    /// A pass-through request (password reset) failed; surfaced verbatim.
    #[error(transparent)]
    Request(TransportError),

    /// The credential store could not persist the session. Nothing was kept.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Source of "now" for expiry evaluation.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// A session recovered from the credential store at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredSession {
    pub user: UserRecord,
    pub permissions: PermissionSet,
}

/// Owner of the session and the only writer of the credential store.
///
/// Construct once at process start, share by `Arc`, and call
/// [`SessionManager::restore_session`] before trusting any read.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn AuthTransport>,
    clock: Arc<dyn Clock>,
    entry_route: String,
    phase: RwLock<SessionState>,
    ready: AtomicBool,
    in_flight: Mutex<()>,
}

impl core::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionManager")
            .field("entry_route", &self.entry_route)
            .field("phase", &*self.phase.read())
            .field("ready", &self.ready.load(Ordering::Acquire))
            .finish()
    }
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, transport: Arc<dyn AuthTransport>) -> Self {
        Self {
            store,
            transport,
            clock: Arc::new(SystemClock),
            entry_route: DEFAULT_ENTRY_ROUTE.to_string(),
            phase: RwLock::new(SessionState::Unknown),
            ready: AtomicBool::new(false),
            in_flight: Mutex::new(()),
        }
    }

    /// Open the file store named by `config` and build a manager over it.
    pub fn from_config(
        config: &SessionConfig,
        transport: Arc<dyn AuthTransport>,
    ) -> Result<Self, StoreError> {
        let store = FileCredentialStore::open(&config.store_path)?;
        Ok(Self::new(Arc::new(store), transport).with_entry_route(config.entry_route.clone()))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_entry_route(mut self, entry_route: impl Into<String>) -> Self {
        self.entry_route = entry_route.into();
        self
    }

    pub fn entry_route(&self) -> &str {
        &self.entry_route
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Exchange credentials for a session.
    ///
    /// On success the previous session is replaced wholesale. On failure the
    /// store is left untouched.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<UserRecord, SessionError> {
        let _guard = self.in_flight.lock().await;

        let request = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };

        let response = self.transport.login(&request).await.map_err(|err| {
            warn!(identifier, error = %err, "login rejected");
            SessionError::Authentication(err)
        })?;

        self.write_session(&response)?;
        *self.phase.write() = SessionState::Authenticated;

        info!(user_id = %response.user.id, login = %response.user.login, "session started");
        Ok(response.user)
    }

    /// End the session.
    ///
    /// Local credentials are cleared first and unconditionally; the server is
    /// then asked to invalidate the refresh token on a best-effort basis.
    /// The in-flight guard is released before that call, so a slow server
    /// never holds up the next login.
    pub async fn logout(&self) {
        let refresh_token = {
            let _guard = self.in_flight.lock().await;
            self.clear_local()
        };

        if let Some(refresh_token) = refresh_token {
            revoke(Arc::clone(&self.transport), refresh_token).await;
        }
    }

    /// Start a password reset. Never touches local state.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), SessionError> {
        let request = ForgotPasswordRequest {
            email: email.to_string(),
        };

        self.transport
            .forgot_password(&request)
            .await
            .map_err(SessionError::Request)?;

        info!("password reset requested");
        Ok(())
    }

    /// Recover the persisted session at process start.
    ///
    /// Returns the user and permissions when a stored user exists and the
    /// stored token is still valid. Anything else (missing user, missing or
    /// expired token, undecodable data) triggers a full logout so no
    /// half-valid session survives. Marks the manager ready once the store
    /// is settled; the server-side revoke of a discarded session runs on the
    /// runtime in the background and never delays startup.
    pub async fn restore_session(&self) -> Option<RestoredSession> {
        let (restored, stale_refresh_token) = {
            let _guard = self.in_flight.lock().await;

            let outcome = match self.stored_user() {
                Some(user) if self.is_authenticated() => {
                    *self.phase.write() = SessionState::Authenticated;
                    info!(user_id = %user.id, "session restored");
                    let restored = RestoredSession {
                        user,
                        permissions: self.permissions(),
                    };
                    (Some(restored), None)
                }
                _ => {
                    info!("no valid stored session");
                    (None, self.clear_local())
                }
            };

            if self.ready.swap(true, Ordering::AcqRel) {
                debug!("session restore ran again after the session was already resolved");
            }

            outcome
        };

        if let Some(refresh_token) = stale_refresh_token {
            let transport = Arc::clone(&self.transport);
            match Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(revoke(transport, refresh_token));
                }
                Err(_) => revoke(transport, refresh_token).await,
            }
        }

        restored
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Synchronous reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether an access token is present and not expired. Recomputed on every call.
    pub fn is_authenticated(&self) -> bool {
        let token = self.read_slot(ACCESS_TOKEN_KEY);
        !is_token_expired(token.as_deref(), self.clock.now())
    }

    /// Whether the current access token (present or not) should be treated as expired.
    pub fn is_token_expired(&self) -> bool {
        !self.is_authenticated()
    }

    /// Permissions embedded in the current access token; empty when none can be read.
    pub fn permissions(&self) -> PermissionSet {
        self.read_slot(ACCESS_TOKEN_KEY)
            .as_deref()
            .and_then(decode_claims)
            .map(|claims| claims.permission_set())
            .unwrap_or_default()
    }

    /// The signed-in user, while both user and access token are stored.
    pub fn current_user(&self) -> Option<UserRecord> {
        self.read_slot(ACCESS_TOKEN_KEY)?;
        self.stored_user()
    }

    /// Bearer token for API calls, only while the session is valid.
    pub fn access_token(&self) -> Option<String> {
        let token = self.read_slot(ACCESS_TOKEN_KEY)?;
        if is_token_expired(Some(&token), self.clock.now()) {
            return None;
        }
        Some(token)
    }

    /// `false` until `restore_session` has completed once.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_loading(&self) -> bool {
        !self.is_ready()
    }

    /// Current session state.
    ///
    /// An `Authenticated` session whose token has since expired is moved to
    /// `Unauthenticated` here, and its slots are scrubbed unless a
    /// login/logout is in flight (that operation owns the store until it
    /// settles).
    pub fn state(&self) -> SessionState {
        let phase = *self.phase.read();
        if phase != SessionState::Authenticated || self.is_authenticated() {
            return phase;
        }

        match self.in_flight.try_lock() {
            Ok(_guard) => {
                self.scrub();
                info!("access token expired; session cleared");
            }
            Err(_) => debug!("access token expired while a session operation is in flight"),
        }

        let mut current = self.phase.write();
        if *current == SessionState::Authenticated && !self.is_authenticated() {
            *current = SessionState::Unauthenticated;
        }
        *current
    }

    /// Check the live permission set against `required`.
    pub fn authorize(&self, required: &[Permission], mode: MatchMode) -> AuthorizationDecision {
        authorize(&self.permissions(), required, mode)
    }

    /// Decide what a protected view renders for the live session.
    pub fn guard(&self, required: &[Permission], mode: MatchMode) -> GateOutcome {
        let state = self.state();
        gate(state, &self.authorize(required, mode), &self.entry_route)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Scrub every slot and mark the session ended. Returns the refresh
    /// token that was stored, for the server-side revoke.
    ///
    /// Must be called with `in_flight` held.
    fn clear_local(&self) -> Option<String> {
        let refresh_token = self.read_slot(REFRESH_TOKEN_KEY);

        self.scrub();
        *self.phase.write() = SessionState::Unauthenticated;
        info!("session cleared");

        refresh_token
    }

    fn write_session(&self, response: &LoginResponse) -> Result<(), SessionError> {
        let user = serde_json::to_string(&response.user).map_err(StoreError::from)?;

        let result = self
            .store
            .set(USER_KEY, &user)
            .and_then(|()| self.store.set(ACCESS_TOKEN_KEY, &response.access_token))
            .and_then(|()| match &response.refresh_token {
                Some(refresh_token) => self.store.set(REFRESH_TOKEN_KEY, refresh_token),
                None => self.store.remove(REFRESH_TOKEN_KEY),
            });

        if let Err(err) = result {
            error!(error = %err, "failed to persist session; discarding it");
            self.scrub();
            *self.phase.write() = SessionState::Unauthenticated;
            return Err(err.into());
        }

        Ok(())
    }

    /// Remove every session slot. Keeps going past failures so as much as
    /// possible is cleared.
    fn scrub(&self) {
        for key in SESSION_KEYS {
            if let Err(err) = self.store.remove(key) {
                error!(slot = key, error = %err, "failed to clear credential slot");
            }
        }
    }

    /// Read failures count as absence: the restrictive answer.
    fn read_slot(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                error!(slot = key, error = %err, "failed to read credential slot");
                None
            }
        }
    }

    fn stored_user(&self) -> Option<UserRecord> {
        let raw = self.read_slot(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                debug!(error = %err, "stored user record is unreadable");
                None
            }
        }
    }
}

/// Best-effort server-side invalidation of a refresh token. The local session
/// is already gone, so failure is logged and dropped.
async fn revoke(transport: Arc<dyn AuthTransport>, refresh_token: String) {
    if let Err(err) = transport.logout(&LogoutRequest { refresh_token }).await {
        warn!(error = %err, "server-side logout failed; refresh token left to expire");
    }
}
