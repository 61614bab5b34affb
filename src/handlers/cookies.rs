// Session cookie plumbing shared by the auth handlers
use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpResponse;
use time::Duration;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Deployment-level cookie attributes. Secure is the default; set
/// COOKIE_SECURE=false for plain-http local setups.
struct CookiePolicy {
    secure: bool,
    domain: Option<String>,
}

impl CookiePolicy {
    fn from_env() -> Self {
        Self {
            secure: std::env::var("COOKIE_SECURE").unwrap_or_else(|_| "true".to_string()) == "true",
            domain: std::env::var("COOKIE_DOMAIN").ok().filter(|d| !d.is_empty()),
        }
    }
}

fn auth_cookie<'a>(name: &'a str, value: String, ttl_seconds: i64, policy: &CookiePolicy) -> Cookie<'a> {
    let mut cookie = Cookie::build(name, value)
        .path("/")
        .max_age(Duration::seconds(ttl_seconds))
        .http_only(true)
        .secure(policy.secure)
        .same_site(SameSite::Strict)
        .finish();
    if let Some(d) = &policy.domain {
        cookie.set_domain(d.clone());
    }
    cookie
}

/// A zero-max-age cookie that evicts `name` from the browser jar.
fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .max_age(Duration::ZERO)
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

/// Attach fresh access and refresh cookies to `response`.
pub fn set_auth_cookies(
    mut response: HttpResponse,
    access_token: String,
    refresh_token: String,
    access_ttl: i64,
    refresh_ttl: i64,
) -> HttpResponse {
    let policy = CookiePolicy::from_env();
    for (name, token, ttl) in [
        (ACCESS_COOKIE_NAME, access_token, access_ttl),
        (REFRESH_COOKIE_NAME, refresh_token, refresh_ttl),
    ] {
        response.add_cookie(&auth_cookie(name, token, ttl, &policy)).ok();
    }
    response
}

/// Expire both session cookies.
pub fn clear_auth_cookies(mut response: HttpResponse) -> HttpResponse {
    for name in [ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME] {
        response.add_cookie(&expired_cookie(name)).ok();
    }
    response
}

/// Pull a token out of the request, preferring the cookie. Access tokens may
/// also arrive as a Bearer header from non-browser API clients.
pub fn extract_token(req: &actix_web::HttpRequest, cookie_name: &str) -> Option<String> {
    if let Some(cookie) = req.cookie(cookie_name) {
        let value = cookie.value().trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    if cookie_name != ACCESS_COOKIE_NAME {
        return None;
    }
    let header = req.headers().get("authorization")?.to_str().ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn cookie_wins_over_bearer_header() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_COOKIE_NAME, "from_cookie"))
            .insert_header(("authorization", "Bearer from_header"))
            .to_http_request();
        assert_eq!(
            extract_token(&req, ACCESS_COOKIE_NAME).as_deref(),
            Some("from_cookie")
        );
    }

    #[test]
    fn bearer_fallback_is_access_only() {
        let req = TestRequest::default()
            .insert_header(("authorization", "bearer spaced_token "))
            .to_http_request();
        assert_eq!(
            extract_token(&req, ACCESS_COOKIE_NAME).as_deref(),
            Some("spaced_token")
        );
        // Refresh tokens never come from the Authorization header
        assert_eq!(extract_token(&req, REFRESH_COOKIE_NAME), None);
    }

    #[test]
    fn empty_cookie_values_are_ignored() {
        let req = TestRequest::default()
            .cookie(Cookie::new(ACCESS_COOKIE_NAME, ""))
            .to_http_request();
        assert_eq!(extract_token(&req, ACCESS_COOKIE_NAME), None);
    }
}
