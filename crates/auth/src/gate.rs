//! Navigation gate: composes session validity with an authorization decision.

use serde::{Deserialize, Serialize};

use crate::{AuthorizationDecision, Permission};

/// Validity of the session as last judged by the session manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No judgment made yet (session restore has not completed).
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl SessionState {
    pub fn is_resolved(&self) -> bool {
        *self != SessionState::Unknown
    }
}

/// What a protected view should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GateOutcome {
    /// Session not resolved yet: render a neutral waiting state.
    Pending,

    /// No valid session: send the user to the entry point.
    Redirect { to: String },

    /// Valid session lacking the required capabilities.
    Denied {
        required: Vec<Permission>,
        missing: Vec<Permission>,
    },

    /// Render the protected content.
    Granted,
}

/// Decide what a protected view renders.
///
/// While the state is `Unknown` nothing is granted and nothing redirects.
pub fn gate(
    state: SessionState,
    decision: &AuthorizationDecision,
    entry_route: &str,
) -> GateOutcome {
    match state {
        SessionState::Unknown => GateOutcome::Pending,
        SessionState::Unauthenticated => GateOutcome::Redirect {
            to: entry_route.to_string(),
        },
        SessionState::Authenticated if decision.allowed => GateOutcome::Granted,
        SessionState::Authenticated => GateOutcome::Denied {
            required: decision.required.clone(),
            missing: decision.missing.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{authorize, MatchMode, PermissionSet};

    fn decision(held: &[&'static str], required: &[&'static str]) -> AuthorizationDecision {
        let granted: PermissionSet = held.iter().copied().map(Permission::from).collect();
        let required: Vec<Permission> = required.iter().copied().map(Permission::from).collect();
        authorize(&granted, &required, MatchMode::All)
    }

    #[test]
    fn unknown_state_waits_even_when_allowed() {
        let outcome = gate(SessionState::Unknown, &decision(&["a"], &["a"]), "/login");
        assert_eq!(outcome, GateOutcome::Pending);
    }

    #[test]
    fn unauthenticated_redirects_to_entry_route() {
        let outcome = gate(SessionState::Unauthenticated, &decision(&[], &[]), "/login");
        assert_eq!(outcome, GateOutcome::Redirect { to: "/login".to_string() });
    }

    #[test]
    fn authenticated_without_capability_is_denied() {
        let outcome = gate(
            SessionState::Authenticated,
            &decision(&["a"], &["a", "b"]),
            "/login",
        );

        assert_eq!(
            outcome,
            GateOutcome::Denied {
                required: vec![Permission::from("a"), Permission::from("b")],
                missing: vec![Permission::from("b")],
            }
        );
    }

    #[test]
    fn authenticated_with_capability_is_granted() {
        let outcome = gate(SessionState::Authenticated, &decision(&["a"], &["a"]), "/login");
        assert_eq!(outcome, GateOutcome::Granted);
    }

    #[test]
    fn denied_outcome_serializes_with_tag() {
        let outcome = gate(SessionState::Authenticated, &decision(&[], &["x"]), "/login");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "denied");
        assert_eq!(value["missing"][0], "x");
    }
}
