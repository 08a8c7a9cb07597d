//! `Authorization` header parsing and authentication challenges.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lyra_store::Credentials;

/// Parse an `Authorization` header value.
///
/// Returns `None` for unknown schemes and malformed Basic payloads. Scheme
/// names are matched case-insensitively.
pub fn parse_authorization(value: &str) -> Option<Credentials> {
    let (scheme, rest) = value.trim().split_once(' ')?;
    let rest = rest.trim();

    if scheme.eq_ignore_ascii_case("basic") {
        let decoded = STANDARD.decode(rest).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        return Some(Credentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    if scheme.eq_ignore_ascii_case("bearer") && !rest.is_empty() {
        return Some(Credentials::Bearer(rest.to_string()));
    }

    None
}

/// `WWW-Authenticate` values sent with a 401, one per supported scheme.
pub fn challenges(realm: &str) -> [String; 2] {
    let realm = realm.replace('"', "'");
    [
        format!("Basic realm=\"{realm}\""),
        format!("Bearer realm=\"{realm}\""),
    ]
}
