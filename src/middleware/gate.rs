//! Route prefix → minimum role table and the decision over it.

use std::fmt;

use serde::Serialize;

use crate::auth::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateRule {
    pub prefix: &'static str,
    pub role: Role,
}

const fn rule(prefix: &'static str, role: Role) -> GateRule {
    GateRule { prefix, role }
}

pub const RULES: &[GateRule] = &[
    rule("/dashboard", Role::Viewer),
    rule("/dashboard/images", Role::Editor),
    rule("/dashboard/billing", Role::Admin),
    rule("/api/auth/whoami", Role::Viewer),
    rule("/api/lineage", Role::Viewer),
    rule("/api/images", Role::Editor),
    rule("/api/n8n", Role::Editor),
    rule("/api/billing", Role::Admin),
    rule("/api/admin", Role::Admin),
];

/// `/api/images` covers `/api/images` and `/api/images/...`, not `/api/imagesX`
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Longest matching rule for `path`, `None` when the path is public
pub fn matching_rule(path: &str) -> Option<&'static GateRule> {
    RULES
        .iter()
        .filter(|rule| covers(rule.prefix, path))
        .max_by_key(|rule| rule.prefix.len())
}

pub fn required_role(path: &str) -> Option<Role> {
    matching_rule(path).map(|rule| rule.role)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum GateDecision {
    Allow,
    Unauthenticated,
    Forbidden { required: Role, actual: Role },
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Allow => write!(f, "allow"),
            GateDecision::Unauthenticated => write!(f, "unauthenticated"),
            GateDecision::Forbidden { required, actual } => {
                write!(f, "forbidden (requires {}, has {})", required, actual)
            }
        }
    }
}

/// Pure gate decision for a request path and the caller's role, if any
pub fn decide(path: &str, role: Option<Role>) -> GateDecision {
    let Some(required) = required_role(path) else {
        return GateDecision::Allow;
    };
    match role {
        None => GateDecision::Unauthenticated,
        Some(actual) if actual.satisfies(required) => GateDecision::Allow,
        Some(actual) => GateDecision::Forbidden { required, actual },
    }
}

/// Pages redirect to the sign-in screen, API calls get a status code
pub fn is_api_path(path: &str) -> bool {
    covers("/api", path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        assert_eq!(required_role("/dashboard"), Some(Role::Viewer));
        assert_eq!(required_role("/dashboard/images/upload"), Some(Role::Editor));
        assert_eq!(required_role("/dashboard/billing"), Some(Role::Admin));
        assert_eq!(required_role("/dashboard/lineage"), Some(Role::Viewer));
    }

    #[test]
    fn matching_respects_segment_boundaries() {
        assert_eq!(required_role("/api/images"), Some(Role::Editor));
        assert_eq!(required_role("/api/images/gallery/a.png"), Some(Role::Editor));
        assert_eq!(required_role("/api/imagesX"), None);
        assert_eq!(required_role("/dashboardx"), None);
    }

    #[test]
    fn unlisted_paths_are_public() {
        for path in ["/", "/health", "/login", "/api/github/activity", "/api/auth/session", "/files/gallery/a.png"] {
            assert_eq!(required_role(path), None, "{} should be public", path);
            assert_eq!(decide(path, None), GateDecision::Allow);
        }
    }

    #[test]
    fn decisions_compare_by_rank() {
        assert_eq!(decide("/api/lineage/gallery/a.png", None), GateDecision::Unauthenticated);
        assert_eq!(decide("/api/lineage/gallery/a.png", Some(Role::Viewer)), GateDecision::Allow);
        assert_eq!(
            decide("/api/images", Some(Role::Viewer)),
            GateDecision::Forbidden { required: Role::Editor, actual: Role::Viewer }
        );
        assert_eq!(decide("/api/images", Some(Role::Admin)), GateDecision::Allow);
        assert_eq!(
            decide("/api/billing/usage", Some(Role::Editor)),
            GateDecision::Forbidden { required: Role::Admin, actual: Role::Editor }
        );
    }

    #[test]
    fn api_paths_are_told_apart_from_pages() {
        assert!(is_api_path("/api/images"));
        assert!(is_api_path("/api"));
        assert!(!is_api_path("/apiary"));
        assert!(!is_api_path("/dashboard"));
    }
}
