//! `backoffice-auth` — pure session/authorization primitives (no IO).
//!
//! This crate is intentionally decoupled from HTTP and storage: it reads
//! claims out of an access token, evaluates expiry against a caller-supplied
//! clock, and turns permissions into allow/deny and navigation decisions.

pub mod authorize;
pub mod claims;
pub mod gate;
pub mod permissions;
pub mod user;

pub use authorize::{authorize, is_allowed, AuthorizationDecision, MatchMode};
pub use claims::{decode_claims, is_token_expired, TokenClaims};
pub use gate::{gate, GateOutcome, SessionState};
pub use permissions::{Permission, PermissionSet};
pub use user::{UserId, UserRecord};
