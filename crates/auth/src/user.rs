//! Cached identity of the signed-in user.

use serde::{Deserialize, Serialize};

/// Identifier of a user as issued by the back-office API.
///
/// The API is free to use numeric or string identifiers; both are kept
/// verbatim and never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserId::Numeric(id) => write!(f, "{id}"),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

/// User record returned by a successful login.
///
/// Immutable once stored; the next login replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub full_name: String,
    pub login: String,
    pub email: String,
}
