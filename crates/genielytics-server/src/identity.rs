use axum::http::HeaderMap;

use genielytics_core::event::RecordPayload;

/// The acting user, as the identity proxy in front of the app reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
}

/// Extract the user from the proxy's forwarded headers.
///
/// `x-forwarded-user` carries the principal (usually an email address);
/// `x-forwarded-email` and `x-forwarded-preferred-username` refine it when
/// present. Returns `None` when the request did not come through the proxy.
pub fn from_headers(headers: &HeaderMap) -> Option<UserIdentity> {
    let user_id = header_value(headers, "x-forwarded-user")?;

    let user_email = header_value(headers, "x-forwarded-email").or_else(|| {
        if user_id.contains('@') {
            Some(user_id.clone())
        } else {
            None
        }
    });
    let user_name = header_value(headers, "x-forwarded-preferred-username");

    Some(UserIdentity {
        user_id,
        user_email,
        user_name,
    })
}

/// Local-development fallback: take identity from the payload itself.
/// Deployed instances always have the forwarded headers, which win.
pub fn from_payload(payload: &RecordPayload) -> Option<UserIdentity> {
    let user_id = payload.user_id.as_deref()?.trim();
    if user_id.is_empty() {
        return None;
    }
    Some(UserIdentity {
        user_id: user_id.to_string(),
        user_email: payload.user_email.clone(),
        user_name: payload.user_name.clone(),
    })
}

/// Resolve identity for routes without a payload (favorites, conversation
/// history): forwarded headers first, then an explicit `user_id` parameter.
pub fn resolve(headers: &HeaderMap, fallback_user_id: Option<&str>) -> Option<UserIdentity> {
    if let Some(identity) = from_headers(headers) {
        return Some(identity);
    }
    let user_id = fallback_user_id?.trim();
    if user_id.is_empty() {
        return None;
    }
    Some(UserIdentity {
        user_id: user_id.to_string(),
        user_email: if user_id.contains('@') {
            Some(user_id.to_string())
        } else {
            None
        },
        user_name: None,
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(name)?.to_str().ok()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_user_email_is_inferred_from_principal() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", "jane@example.com".parse().unwrap());

        let identity = from_headers(&headers).unwrap();
        assert_eq!(identity.user_id, "jane@example.com");
        assert_eq!(identity.user_email.as_deref(), Some("jane@example.com"));
        assert_eq!(identity.user_name, None);
    }

    #[test]
    fn explicit_email_and_username_headers_win() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", "u-123".parse().unwrap());
        headers.insert("x-forwarded-email", "jane@example.com".parse().unwrap());
        headers.insert(
            "x-forwarded-preferred-username",
            "Jane D".parse().unwrap(),
        );

        let identity = from_headers(&headers).unwrap();
        assert_eq!(identity.user_id, "u-123");
        assert_eq!(identity.user_email.as_deref(), Some("jane@example.com"));
        assert_eq!(identity.user_name.as_deref(), Some("Jane D"));
    }

    #[test]
    fn missing_headers_yield_none() {
        let headers = HeaderMap::new();
        assert!(from_headers(&headers).is_none());
        assert!(resolve(&headers, None).is_none());
        assert!(resolve(&headers, Some("  ")).is_none());
    }

    #[test]
    fn resolve_falls_back_to_explicit_user() {
        let headers = HeaderMap::new();
        let identity = resolve(&headers, Some("dev@local")).unwrap();
        assert_eq!(identity.user_id, "dev@local");
        assert_eq!(identity.user_email.as_deref(), Some("dev@local"));
    }

    #[test]
    fn headers_beat_the_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-user", "proxy@example.com".parse().unwrap());
        let identity = resolve(&headers, Some("someone-else")).unwrap();
        assert_eq!(identity.user_id, "proxy@example.com");
    }
}
