use hyper::{Method, StatusCode};
use serde::Serialize;

use crate::core::response::GatewayResponse;
use crate::identity::Principal;
use crate::routing::{RouteRule, RouteTable};
use crate::utils::{normalize_path, unix_now};

/// Why a request was denied admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DenialKind {
    /// The matched rule requires a verified identity and none was present
    Unauthorized,
    /// No configured rule covers the path and method
    Forbidden,
}

impl DenialKind {
    pub fn status(&self) -> StatusCode {
        match self {
            DenialKind::Unauthorized => StatusCode::UNAUTHORIZED,
            DenialKind::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DenialKind::Unauthorized => "Unauthorized",
            DenialKind::Forbidden => "Forbidden",
        }
    }
}

/// Diagnostic record for a denied request.
///
/// Carries the normalized denied path and a timestamp for observability;
/// the principal's identity is deliberately not part of the record.
#[derive(Debug, Clone, Serialize)]
pub struct RouteDenial {
    pub kind: DenialKind,
    pub path: String,
    pub timestamp: u64,
}

impl RouteDenial {
    fn new(kind: DenialKind, path: String) -> Self {
        Self {
            kind,
            path,
            timestamp: unix_now(),
        }
    }

    /// The user-visible denial response
    pub fn into_response(self) -> GatewayResponse {
        GatewayResponse::denial(self.kind.status(), self.kind.as_str(), &self.path)
    }
}

/// Authorization verdict for an inbound request
#[derive(Debug, Clone)]
pub enum AuthzVerdict {
    /// Admitted via a system public path; no rule applies
    AllowPublic,
    /// Admitted via the given route rule
    Allow(RouteRule),
    /// Denied; the denial carries status and diagnostics
    Deny(RouteDenial),
}

/// Decide whether a request may proceed past admission.
///
/// System public paths are checked first and always allowed. Configured
/// rules are scanned in table order and the first rule covering both the
/// path prefix and the method decides; placement in the table is the
/// tie-break for overlapping rules. Unknown routes are forbidden rather
/// than merely unauthenticated. Malformed paths are normalized, never
/// rejected with an error.
pub fn authorize(
    table: &RouteTable,
    path: &str,
    method: &Method,
    principal: Option<&Principal>,
) -> AuthzVerdict {
    let path = normalize_path(path);

    if RouteTable::is_system_public(&path) {
        return AuthzVerdict::AllowPublic;
    }

    let rule = match table.first_match(&path, method) {
        Some(rule) => rule,
        None => {
            let denial = RouteDenial::new(DenialKind::Forbidden, path);
            tracing::info!(path = %denial.path, method = %method, "no route configured, denying");
            return AuthzVerdict::Deny(denial);
        }
    };

    if !rule.requires_auth {
        return AuthzVerdict::Allow(rule.clone());
    }

    match principal {
        Some(p) if p.is_authenticated() => AuthzVerdict::Allow(rule.clone()),
        _ => {
            let denial = RouteDenial::new(DenialKind::Unauthorized, path);
            tracing::info!(
                path = %denial.path,
                method = %method,
                service = %rule.service,
                "route requires authentication, denying"
            );
            AuthzVerdict::Deny(denial)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteDefinition;

    fn definition(
        prefix: &str,
        methods: &[&str],
        requires_auth: bool,
    ) -> RouteDefinition {
        RouteDefinition {
            service: "users".to_string(),
            path_prefix: prefix.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            requires_auth,
            cache_enabled: false,
        }
    }

    fn example_table() -> RouteTable {
        RouteTable::from_definitions(&[
            definition("/api/users", &["GET"], false),
            definition("/api/users", &["POST", "PUT", "DELETE"], true),
        ])
        .unwrap()
    }

    fn authenticated() -> Principal {
        Principal::authenticated("Bearer", [("sub", "42")])
    }

    #[test]
    fn test_default_deny_unknown_route() {
        let verdict = authorize(&example_table(), "/api/orders", &Method::GET, None);
        match verdict {
            AuthzVerdict::Deny(denial) => {
                assert_eq!(denial.kind, DenialKind::Forbidden);
                assert_eq!(denial.path, "/api/orders");
                assert!(denial.timestamp > 0);
            }
            other => panic!("expected Deny403, got {:?}", other),
        }
    }

    #[test]
    fn test_default_deny_unknown_method() {
        // Prefix matches but no rule covers PATCH
        let verdict = authorize(&example_table(), "/api/users", &Method::PATCH, None);
        assert!(matches!(
            verdict,
            AuthzVerdict::Deny(RouteDenial {
                kind: DenialKind::Forbidden,
                ..
            })
        ));
    }

    #[test]
    fn test_system_paths_bypass_empty_table() {
        let table = RouteTable::default();
        for path in ["/health", "/health/live", "/health/ready", "/metrics"] {
            for method in [Method::GET, Method::POST, Method::DELETE] {
                let verdict = authorize(&table, path, &method, None);
                assert!(
                    matches!(verdict, AuthzVerdict::AllowPublic),
                    "{} {} should be public",
                    method,
                    path
                );
            }
        }
    }

    #[test]
    fn test_system_paths_cannot_be_shadowed() {
        // A configured rule over /health requiring auth must not win
        let table =
            RouteTable::from_definitions(&[definition("/health", &["GET"], true)]).unwrap();
        let verdict = authorize(&table, "/health", &Method::GET, None);
        assert!(matches!(verdict, AuthzVerdict::AllowPublic));
    }

    #[test]
    fn test_docs_sub_resources_are_public() {
        let table = RouteTable::default();
        let verdict = authorize(&table, "/docs/swagger-ui.css", &Method::GET, None);
        assert!(matches!(verdict, AuthzVerdict::AllowPublic));
    }

    #[test]
    fn test_auth_gate_denies_without_principal() {
        let verdict = authorize(&example_table(), "/api/users", &Method::POST, None);
        match verdict {
            AuthzVerdict::Deny(denial) => assert_eq!(denial.kind, DenialKind::Unauthorized),
            other => panic!("expected Deny401, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_gate_denies_anonymous_principal() {
        // An identity object without an authentication scheme is anonymous
        let anonymous = Principal::anonymous([("sub", "42")]);
        let verdict = authorize(
            &example_table(),
            "/api/users",
            &Method::POST,
            Some(&anonymous),
        );
        assert!(matches!(
            verdict,
            AuthzVerdict::Deny(RouteDenial {
                kind: DenialKind::Unauthorized,
                ..
            })
        ));
    }

    #[test]
    fn test_auth_gate_allows_authenticated_principal() {
        let principal = authenticated();
        let verdict = authorize(
            &example_table(),
            "/api/users",
            &Method::POST,
            Some(&principal),
        );
        assert!(matches!(verdict, AuthzVerdict::Allow(_)));
    }

    #[test]
    fn test_public_rule_ignores_identity() {
        let verdict = authorize(&example_table(), "/api/users/42", &Method::GET, None);
        assert!(matches!(verdict, AuthzVerdict::Allow(_)));
    }

    #[test]
    fn test_first_match_wins() {
        // Earlier rule requires auth; a later, laxer rule must not rescue
        // the request.
        let table = RouteTable::from_definitions(&[
            definition("/api/users", &["GET"], true),
            definition("/api/users", &["GET"], false),
        ])
        .unwrap();

        let verdict = authorize(&table, "/api/users", &Method::GET, None);
        assert!(matches!(
            verdict,
            AuthzVerdict::Deny(RouteDenial {
                kind: DenialKind::Unauthorized,
                ..
            })
        ));

        // And the reverse order allows
        let table = RouteTable::from_definitions(&[
            definition("/api/users", &["GET"], false),
            definition("/api/users", &["GET"], true),
        ])
        .unwrap();
        let verdict = authorize(&table, "/api/users", &Method::GET, None);
        assert!(matches!(verdict, AuthzVerdict::Allow(_)));
    }

    #[test]
    fn test_malformed_paths_never_panic() {
        let table = example_table();
        for path in ["", "//", "/api//users/", "api/users", "/api/users?x=1"] {
            let _ = authorize(&table, path, &Method::GET, None);
        }

        // Normalization still reaches the configured rule
        let verdict = authorize(&table, "/API//Users/", &Method::GET, None);
        assert!(matches!(verdict, AuthzVerdict::Allow(_)));
    }

    #[test]
    fn test_example_scenario() {
        let table = example_table();

        assert!(matches!(
            authorize(&table, "/api/users/42", &Method::GET, None),
            AuthzVerdict::Allow(_)
        ));
        assert!(matches!(
            authorize(&table, "/api/users", &Method::POST, None),
            AuthzVerdict::Deny(RouteDenial {
                kind: DenialKind::Unauthorized,
                ..
            })
        ));
        assert!(matches!(
            authorize(&table, "/api/orders", &Method::GET, None),
            AuthzVerdict::Deny(RouteDenial {
                kind: DenialKind::Forbidden,
                ..
            })
        ));
    }
}
