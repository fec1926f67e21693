use serde::{Deserialize, Serialize};

use crate::{Permission, PermissionSet};

/// How a list of required capabilities is matched against held permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Every required capability must be held.
    #[default]
    All,
    /// At least one required capability must be held.
    Any,
}

/// Outcome of an authorization check, with enough detail to explain a denial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub mode: MatchMode,
    pub required: Vec<Permission>,

    /// Required capabilities the session does not hold.
    ///
    /// Empty when allowed. For a failed `Any` check this is the whole
    /// required list.
    pub missing: Vec<Permission>,
}

/// Decide whether `granted` satisfies `required` under `mode`.
///
/// - No IO
/// - No panics
/// - An empty `required` list always allows (no restriction requested)
pub fn authorize(
    granted: &PermissionSet,
    required: &[Permission],
    mode: MatchMode,
) -> AuthorizationDecision {
    let missing: Vec<Permission> = required
        .iter()
        .filter(|p| !granted.contains(p))
        .cloned()
        .collect();

    let allowed = required.is_empty()
        || match mode {
            MatchMode::All => missing.is_empty(),
            MatchMode::Any => missing.len() < required.len(),
        };

    AuthorizationDecision {
        allowed,
        mode,
        required: required.to_vec(),
        missing: if allowed { Vec::new() } else { missing },
    }
}

/// Shorthand for `authorize(..).allowed`.
pub fn is_allowed(granted: &PermissionSet, required: &[Permission], mode: MatchMode) -> bool {
    authorize(granted, required, mode).allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn perms(names: &[&'static str]) -> Vec<Permission> {
        names.iter().copied().map(Permission::from).collect()
    }

    fn set(names: &[&'static str]) -> PermissionSet {
        perms(names).into_iter().collect()
    }

    #[test]
    fn all_mode_requires_every_capability() {
        let required = perms(&["A", "B"]);

        let denied = authorize(&set(&["A"]), &required, MatchMode::All);
        assert!(!denied.allowed);
        assert_eq!(denied.missing, perms(&["B"]));

        assert!(is_allowed(&set(&["A", "B", "C"]), &required, MatchMode::All));
    }

    #[test]
    fn any_mode_requires_one_capability() {
        let required = perms(&["A", "B"]);

        assert!(is_allowed(&set(&["B"]), &required, MatchMode::Any));

        let denied = authorize(&set(&["C"]), &required, MatchMode::Any);
        assert!(!denied.allowed);
        assert_eq!(denied.missing, required);
    }

    #[test]
    fn default_mode_is_all() {
        assert_eq!(MatchMode::default(), MatchMode::All);
    }

    #[test]
    fn empty_requirement_allows_without_permissions() {
        let decision = authorize(&PermissionSet::new(), &[], MatchMode::All);
        assert!(decision.allowed);
        assert!(decision.missing.is_empty());
        assert!(is_allowed(&PermissionSet::new(), &[], MatchMode::Any));
    }

    proptest! {
        /// Property: no requirement means no restriction, whatever is held.
        #[test]
        fn empty_requirement_always_allows(
            held in prop::collection::btree_set("[a-z]{1,8}", 0..8),
            any_mode in any::<bool>(),
        ) {
            let granted: PermissionSet = held.into_iter().map(Permission::from).collect();
            let mode = if any_mode { MatchMode::Any } else { MatchMode::All };
            prop_assert!(is_allowed(&granted, &[], mode));
        }

        /// Property: ALL implies ANY for non-empty requirements.
        #[test]
        fn all_implies_any(
            held in prop::collection::btree_set("[a-d]", 0..4),
            required in prop::collection::vec("[a-d]", 1..4),
        ) {
            let granted: PermissionSet = held.into_iter().map(Permission::from).collect();
            let required: Vec<Permission> = required.into_iter().map(Permission::from).collect();
            if is_allowed(&granted, &required, MatchMode::All) {
                prop_assert!(is_allowed(&granted, &required, MatchMode::Any));
            }
        }
    }
}
