use axum::http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderName, HeaderValue,
};
use time::Duration;

pub const SESSION_COOKIE: &str = "token";

/// `Set-Cookie` header carrying a fresh session token.
pub fn session_cookie(
    token: &str,
    max_age: Duration,
    secure: bool,
) -> anyhow::Result<(HeaderName, HeaderValue)> {
    let mut value = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        max_age.whole_seconds()
    );
    if secure {
        value.push_str("; Secure");
    }
    Ok((SET_COOKIE, HeaderValue::from_str(&value)?))
}

/// `Set-Cookie` header that makes the browser drop the session cookie.
pub fn clear_session_cookie(secure: bool) -> (HeaderName, HeaderValue) {
    let value = if secure {
        HeaderValue::from_static("token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0")
    };
    (SET_COOKIE, value)
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(k, v)| (k, unquote(v)))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// Cookie values may be wrapped in double quotes (RFC 6265 `cookie-value`).
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_and_lives_as_long_as_token() {
        let (name, value) = session_cookie("abc.def.ghi", Duration::days(7), false).unwrap();
        assert_eq!(name, SET_COOKIE);
        let value = value.to_str().unwrap();
        assert!(value.starts_with("token=abc.def.ghi;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=604800"));
        assert!(!value.contains("Secure"));

        let (_, secure) = session_cookie("t", Duration::days(7), true).unwrap();
        assert!(secure.to_str().unwrap().ends_with("; Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let (_, value) = clear_session_cookie(false);
        let value = value.to_str().unwrap();
        assert!(value.starts_with("token=;"));
        assert!(value.contains("Max-Age=0"));
    }

    #[test]
    fn reads_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; token=abc.def"));
        headers.append(COOKIE, HeaderValue::from_static("token=later"));
        assert_eq!(read_cookie(&headers, "token"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "theme"), Some("dark"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_cookie_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=; other=1"));
        assert_eq!(read_cookie(&headers, "token"), None);
    }

    #[test]
    fn quoted_cookie_value_is_unquoted() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=\"abc.def\"; q=\"\""));
        assert_eq!(read_cookie(&headers, "token"), Some("abc.def"));
        assert_eq!(read_cookie(&headers, "q"), None);
    }
}
