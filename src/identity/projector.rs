use hyper::header::{HeaderMap, HeaderName, HeaderValue};

use crate::identity::Principal;

/// Header proving to backends that the call came through the gateway
pub const GATEWAY_SECRET_HEADER: &str = "x-gateway-secret";

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Synonym claim names per canonical header, in precedence order. The
/// first non-blank value wins; blank values are skipped even if present.
const USER_ID_CLAIMS: &[&str] = &["nameidentifier", "sub", "user_id"];
const USER_EMAIL_CLAIMS: &[&str] = &["emailaddress", "email"];
const USER_ROLE_CLAIMS: &[&str] = &["role", "roles"];
const USER_NAME_CLAIMS: &[&str] = &["name", "preferred_username", "user_name"];

/// Derives the canonical backend-facing header set from a verified
/// principal and the pre-shared gateway secret.
pub struct IdentityProjector {
    secret: Option<String>,
}

impl IdentityProjector {
    /// Create a projector. Blank secrets are discarded here so a
    /// misconfigured empty value can never produce an empty secret header.
    pub fn new(gateway_secret: Option<String>) -> Self {
        let secret = gateway_secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { secret }
    }

    /// Compute the outbound header set for a request.
    ///
    /// The secret header is attached whenever a secret is configured,
    /// regardless of authentication state. Identity headers are attached
    /// only for authenticated principals; anonymous or absent identities
    /// produce none, so partial or guessed identity never reaches a
    /// backend. Extraction failures downgrade to "header absent" because
    /// admission was already decided by the authorizer.
    pub fn project(&self, principal: Option<&Principal>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(secret) = &self.secret {
            insert_header(&mut headers, GATEWAY_SECRET_HEADER, secret);
        }

        let principal = match principal {
            Some(p) if p.is_authenticated() => p,
            _ => return headers,
        };

        for (header, synonyms) in [
            (USER_ID_HEADER, USER_ID_CLAIMS),
            (USER_EMAIL_HEADER, USER_EMAIL_CLAIMS),
            (USER_ROLE_HEADER, USER_ROLE_CLAIMS),
            (USER_NAME_HEADER, USER_NAME_CLAIMS),
        ] {
            if let Some(value) = first_claim(principal, synonyms) {
                insert_header(&mut headers, header, value);
            }
        }

        headers
    }
}

/// First non-blank value among the synonym claim names
fn first_claim<'a>(principal: &'a Principal, synonyms: &[&str]) -> Option<&'a str> {
    synonyms.iter().find_map(|name| principal.claim_str(name))
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(header_value) => {
            headers.insert(HeaderName::from_static(name), header_value);
        }
        Err(_) => {
            // A claim value that is not a legal header value is dropped,
            // not propagated as an error
            tracing::debug!(header = name, "claim value not representable as header, skipping");
        }
    }
}
