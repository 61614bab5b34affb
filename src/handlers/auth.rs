// handlers/auth.rs
//
// Session endpoints plus the token codecs (HS256 JWT or PASETO v4.local,
// selected by config) and the guard middleware for the protected API scope.
use actix_web::{get, post, web, HttpRequest, HttpResponse, Result};
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use pasetors::{
    claims::{Claims as PasetoClaims, ClaimsValidationRules},
    keys::SymmetricKey,
    local,
    token::UntrustedToken,
    version4::V4,
};
use rand_core::OsRng;
use serde_json::json;
use sha2::Sha256;
use time::{format_description::well_known::Rfc3339, Duration as TimeDuration, OffsetDateTime};

use crate::config::{AppConfig, TokenMode};
use crate::db::Database;
use crate::handlers::cookies::{
    clear_auth_cookies, extract_token, set_auth_cookies, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME,
};
use crate::handlers::logs;
use crate::models::user::{Claims, LoginRequest, RegisterRequest, Role, UserInfo, UserRecord};
use crate::time as clock;
use crate::types::ErrorResponse;

const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

fn base64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

fn sign_hs256(secret: &[u8], header_b64: &str, payload_b64: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    mac.update(signing_input.as_bytes());
    let sig = mac.finalize().into_bytes();
    base64url(&sig)
}

fn verify_hs256(secret: &[u8], token: &str) -> Option<(serde_json::Value, serde_json::Value)> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let (h, p, s) = (parts[0], parts[1], parts[2]);
    let expected_sig = sign_hs256(secret, h, p);
    if expected_sig != s {
        return None;
    }
    let header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(h).ok()?).ok()?;
    let payload = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(p).ok()?).ok()?;
    Some((header, payload))
}

fn default_secret(cfg: &AppConfig) -> Vec<u8> {
    if !cfg.security.paseto_v4_local_key_hex.is_empty() {
        hex::decode(cfg.security.paseto_v4_local_key_hex.trim())
            .unwrap_or_else(|_| cfg.security.paseto_v4_local_key_hex.clone().into_bytes())
    } else if !cfg.security.access_token.is_empty() {
        cfg.security.access_token.clone().into_bytes()
    } else {
        // Last resort
        b"parkpro_default_secret".to_vec()
    }
}

fn make_token_hmac(cfg: &AppConfig, claims: &Claims) -> String {
    let header = json!({"alg":"HS256","typ":"JWT"});
    let header_b64 = base64url(&serde_json::to_vec(&header).unwrap());
    let payload_b64 = base64url(&serde_json::to_vec(claims).unwrap());
    let key = default_secret(cfg);
    let sig = sign_hs256(&key, &header_b64, &payload_b64);
    format!("{}.{}.{}", header_b64, payload_b64, sig)
}

fn validate_token_hmac(cfg: &AppConfig, token: &str) -> Option<Claims> {
    let key = default_secret(cfg);
    if let Some((_h, p)) = verify_hs256(&key, token) {
        let claims: Claims = serde_json::from_value(p).ok()?;
        if claims.exp < clock::unix_now() {
            return None;
        }
        if claims.iss != cfg.security.token_iss || claims.aud != cfg.security.token_aud {
            return None;
        }
        Some(claims)
    } else if !cfg.security.access_token.is_empty() && cfg.security.access_token == token {
        // Static access token fallback (admin privileges)
        Some(static_token_claims(cfg))
    } else {
        None
    }
}

fn static_token_claims(cfg: &AppConfig) -> Claims {
    let iat = clock::unix_now();
    Claims {
        sub: "access".into(),
        name: "Access Token".into(),
        email: "access@local".into(),
        role: Role::Admin,
        iss: cfg.security.token_iss.clone(),
        aud: cfg.security.token_aud.clone(),
        iat,
        exp: iat + (cfg.security.auth_token_expiry_hours as i64) * 3600,
    }
}

fn paseto_key(cfg: &AppConfig) -> Option<SymmetricKey<V4>> {
    let hex = cfg.security.paseto_v4_local_key_hex.trim();
    if hex.len() < 64 {
        return None;
    }
    let bytes = hex::decode(hex).ok()?;
    SymmetricKey::<V4>::from(&bytes).ok()
}

fn make_token_paseto(cfg: &AppConfig, claims: &Claims) -> Option<String> {
    let key = paseto_key(cfg)?;
    let mut pclaims = PasetoClaims::new().ok()?;
    pclaims.issuer(&cfg.security.token_iss).ok()?;
    pclaims.audience(&cfg.security.token_aud).ok()?;
    pclaims.subject(&claims.sub).ok()?;
    let now = OffsetDateTime::now_utc();
    let iat_str = now.format(&Rfc3339).ok()?;
    pclaims.issued_at(&iat_str).ok()?;
    let exp = now + TimeDuration::seconds(claims.exp - claims.iat);
    let exp_str = exp.format(&Rfc3339).ok()?;
    pclaims.expiration(&exp_str).ok()?;
    // Additional claims
    pclaims
        .add_additional("name", serde_json::Value::String(claims.name.clone()))
        .ok()?;
    pclaims
        .add_additional("email", serde_json::Value::String(claims.email.clone()))
        .ok()?;
    pclaims
        .add_additional("role", serde_json::to_value(claims.role).ok()?)
        .ok()?;
    local::encrypt(&key, &pclaims, None, None).ok()
}

fn validate_token_paseto(cfg: &AppConfig, token: &str) -> Option<Claims> {
    let key = paseto_key(cfg)?;
    let utok = UntrustedToken::try_from(token).ok()?;
    let rules = ClaimsValidationRules::new();
    let trusted = local::decrypt(&key, &utok, &rules, None, None).ok()?;
    let pc = trusted.payload_claims()?;
    let iss = pc.get_claim("iss").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let aud = pc.get_claim("aud").and_then(|v| v.as_str()).unwrap_or("").to_string();
    if iss != cfg.security.token_iss || aud != cfg.security.token_aud {
        return None;
    }
    let sub = pc.get_claim("sub").and_then(|v| v.as_str()).unwrap_or("").to_string();
    // Additional
    let name = pc
        .get_claim("name")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();
    let email = pc
        .get_claim("email")
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_default();
    let role = pc
        .get_claim("role")
        .and_then(|v| serde_json::from_value::<Role>(v.clone()).ok())?;
    Some(Claims {
        sub,
        name,
        email,
        role,
        iss,
        aud,
        iat: 0,
        exp: 0,
    })
}

pub fn make_token(cfg: &AppConfig, claims: &Claims) -> Option<String> {
    match cfg.security.token_mode {
        TokenMode::JwtHmac => Some(make_token_hmac(cfg, claims)),
        TokenMode::PasetoV4Local => make_token_paseto(cfg, claims),
    }
}

pub fn validate_token(cfg: &AppConfig, token: &str) -> Option<Claims> {
    match cfg.security.token_mode {
        TokenMode::JwtHmac => validate_token_hmac(cfg, token),
        TokenMode::PasetoV4Local => {
            if !cfg.security.access_token.is_empty() && cfg.security.access_token == token {
                return Some(static_token_claims(cfg));
            }
            validate_token_paseto(cfg, token)
        }
    }
}

fn user_claims(cfg: &AppConfig, user: &UserRecord, ttl_seconds: i64) -> Claims {
    let iat = clock::unix_now();
    Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        iss: cfg.security.token_iss.clone(),
        aud: cfg.security.token_aud.clone(),
        iat,
        exp: iat + ttl_seconds,
    }
}

/// Mint the access/refresh pair for a user. The access token is echoed in
/// response bodies for Bearer-style clients; both land in HttpOnly cookies.
fn mint_session(cfg: &AppConfig, user: &UserRecord) -> Result<(String, String)> {
    let access_ttl = cfg.security.token_ttl_seconds as i64;
    let access = make_token(cfg, &user_claims(cfg, user, access_ttl))
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("token error"))?;
    let refresh_tok = make_token(cfg, &user_claims(cfg, user, REFRESH_TTL_SECONDS))
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("token error"))?;
    Ok((access, refresh_tok))
}

#[post("/register")]
pub async fn register(
    db: web::Data<Database>,
    cfg: web::Data<AppConfig>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    use crate::validation as v;

    let email = body.email.trim().to_lowercase();

    if let Err(e) = v::validate_display_name(&body.name) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_name", e)));
    }
    if let Err(e) = v::validate_email_strict(&email) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_email", e)));
    }
    if let Err(e) = v::password_strength(&body.password) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("weak_password", e)));
    }

    // Existing user?
    let users: Vec<UserRecord> = db.list("users").unwrap_or_default();
    if users.iter().any(|u| u.email == email) {
        return Ok(HttpResponse::Conflict()
            .json(ErrorResponse::new("email_taken", "Email already registered")));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(body.password.as_bytes(), &salt)
        .map_err(|_| actix_web::error::ErrorInternalServerError("hash error"))?
        .to_string();
    // The very first account becomes the admin; everyone after is a USER.
    let user = if users.is_empty() {
        UserRecord::new_admin(&body.name, &email, hash)
    } else {
        UserRecord::new_user(&body.name, &email, hash)
    };
    db.insert("users", &user.id, &user)
        .map_err(|_| actix_web::error::ErrorInternalServerError("db error"))?;

    logs::record_for_user(&db, &user, "User registered");

    let info = UserInfo::from(&user);
    let (access, refresh_tok) = mint_session(&cfg, &user)?;
    let response = HttpResponse::Created().json(json!({"user": info, "token": access}));
    Ok(set_auth_cookies(
        response,
        access,
        refresh_tok,
        cfg.security.token_ttl_seconds as i64,
        REFRESH_TTL_SECONDS,
    ))
}

#[post("/login")]
pub async fn login(
    db: web::Data<Database>,
    cfg: web::Data<AppConfig>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    use crate::validation as v;

    let email = body.email.trim().to_lowercase();

    if let Err(e) = v::validate_email_strict(&email) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_email", e)));
    }
    // Only sanity-check length on login; complexity is a registration rule
    if body.password.is_empty() || body.password.len() > 128 {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_password", "Invalid password")));
    }

    let users: Vec<UserRecord> = db.list("users").unwrap_or_default();
    if let Some(u) = users.iter().find(|u| u.email == email) {
        let parsed = PasswordHash::new(&u.password_hash)
            .map_err(|_| actix_web::error::ErrorInternalServerError("hash read error"))?;
        if Argon2::default()
            .verify_password(body.password.as_bytes(), &parsed)
            .is_ok()
        {
            logs::record_for_user(&db, u, "User login");

            let info = UserInfo::from(u);
            let (access, refresh_tok) = mint_session(&cfg, u)?;
            let response = HttpResponse::Ok().json(json!({"user": info, "token": access}));
            return Ok(set_auth_cookies(
                response,
                access,
                refresh_tok,
                cfg.security.token_ttl_seconds as i64,
                REFRESH_TTL_SECONDS,
            ));
        }
    }
    // Generic error to prevent user enumeration
    Ok(HttpResponse::Unauthorized()
        .json(ErrorResponse::new("invalid_credentials", "Invalid email or password")))
}

#[post("/logout")]
pub async fn logout() -> Result<HttpResponse> {
    let response = HttpResponse::NoContent().finish();
    Ok(clear_auth_cookies(response))
}

#[post("/refresh")]
pub async fn refresh(
    db: web::Data<Database>,
    cfg: web::Data<AppConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let refresh_token = extract_token(&req, REFRESH_COOKIE_NAME)
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("No refresh token"))?;

    let claims = validate_token(&cfg, &refresh_token)
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Invalid or expired refresh token"))?;

    // Re-read the user so rotated tokens pick up role changes
    let user: UserRecord = db
        .get("users", &claims.sub)
        .map_err(actix_web::error::ErrorInternalServerError)?
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Unknown user"))?;

    let (access, refresh_tok) = mint_session(&cfg, &user)?;
    let response = HttpResponse::NoContent().finish();
    Ok(set_auth_cookies(
        response,
        access,
        refresh_tok,
        cfg.security.token_ttl_seconds as i64,
        REFRESH_TTL_SECONDS,
    ))
}

#[get("/me")]
pub async fn me(
    db: web::Data<Database>,
    cfg: web::Data<AppConfig>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    if let Some(tok) = extract_token(&req, ACCESS_COOKIE_NAME) {
        if let Some(claims) = validate_token(&cfg, &tok) {
            // Static ops token has no user record behind it
            if claims.sub == "access" {
                return Ok(HttpResponse::Ok().json(json!({
                    "id": claims.sub,
                    "name": claims.name,
                    "email": claims.email,
                    "role": claims.role,
                })));
            }
            if let Some(user) = db
                .get::<UserRecord>("users", &claims.sub)
                .map_err(actix_web::error::ErrorInternalServerError)?
            {
                return Ok(HttpResponse::Ok().json(UserInfo::from(&user)));
            }
        }
    }
    Ok(HttpResponse::Unauthorized().json(ErrorResponse::new("unauthorized", "Not authenticated")))
}

use actix_web::body::BoxBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::HttpMessage;

pub async fn guard_api(
    req: ServiceRequest,
    next: actix_web::middleware::Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let cfg = req.app_data::<web::Data<AppConfig>>().cloned();
    if let Some(cfg) = cfg {
        if let Some(tok) = extract_token(req.request(), ACCESS_COOKIE_NAME) {
            if let Some(claims) = validate_token(&cfg, &tok) {
                req.extensions_mut().insert(claims);
                return next.call(req).await;
            }
        }
    }
    let (req, _pl) = req.into_parts();
    let resp = HttpResponse::Unauthorized()
        .json(ErrorResponse::new("unauthorized", "Not authenticated"));
    Ok(ServiceResponse::new(req, resp.map_into_boxed_body()))
}

/// Claims stored by [`guard_api`]; handlers behind the guard can rely on them.
pub fn current_claims(req: &HttpRequest) -> Result<Claims> {
    req.extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| actix_web::error::ErrorUnauthorized("Not authenticated"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::{SecurityConfig, ServerConfig};
    use actix_web::{test, App};
    use tempfile::tempdir;

    pub(crate) fn make_test_config(mode: TokenMode) -> AppConfig {
        AppConfig {
            security: SecurityConfig {
                access_token: "test_access".into(),
                auth_token_expiry_hours: 24,
                token_iss: "test_iss".into(),
                token_aud: "test_aud".into(),
                token_ttl_seconds: 3600,
                paseto_v4_local_key_hex:
                    "142f46b1b4acb0946e0d9413f29b331db345cf664b9307165eab7531fa32d8bd".into(),
                token_mode: mode,
            },
            server: ServerConfig {
                host: "localhost".into(),
                port: 8081,
                name: "test".into(),
            },
            sled_path: "test.db".into(),
            backup_dir: "backups".into(),
            backup_name_template: "backup_{{timestamp}}".into(),
            backup_interval: None,
            backup_retention: 10,
            cors_rules: vec![],
        }
    }

    fn make_test_claims() -> Claims {
        Claims {
            sub: "test_user".into(),
            name: "Test User".into(),
            email: "test@example.com".into(),
            role: Role::User,
            iss: "test_iss".into(),
            aud: "test_aud".into(),
            iat: clock::unix_now(),
            exp: clock::unix_now() + 3600,
        }
    }

    #[::core::prelude::v1::test]
    fn test_token_roundtrip_hmac() {
        let cfg = make_test_config(TokenMode::JwtHmac);
        let claims = make_test_claims();
        let token = make_token(&cfg, &claims).expect("make token");
        let decoded = validate_token(&cfg, &token).expect("validate token");
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.name, claims.name);
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.role, claims.role);
    }

    #[::core::prelude::v1::test]
    fn test_token_roundtrip_paseto() {
        let cfg = make_test_config(TokenMode::PasetoV4Local);
        let claims = make_test_claims();
        let token = make_token(&cfg, &claims).expect("make token");
        let decoded = validate_token(&cfg, &token).expect("validate token");
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.role, claims.role);
    }

    #[::core::prelude::v1::test]
    fn test_static_access_token() {
        let cfg = make_test_config(TokenMode::JwtHmac);
        let decoded = validate_token(&cfg, &cfg.security.access_token).expect("validate static token");
        assert_eq!(decoded.sub, "access");
        assert_eq!(decoded.role, Role::Admin);
    }

    #[::core::prelude::v1::test]
    fn test_hmac_token_rejects_tampered() {
        let cfg = make_test_config(TokenMode::JwtHmac);
        let claims = make_test_claims();
        let mut token = make_token(&cfg, &claims).expect("make token");
        token.push('x'); // tamper
        assert!(validate_token(&cfg, &token).is_none());
    }

    #[::core::prelude::v1::test]
    fn test_hmac_token_rejects_expired() {
        let cfg = make_test_config(TokenMode::JwtHmac);
        let mut claims = make_test_claims();
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;
        let token = make_token(&cfg, &claims).expect("make token");
        assert!(validate_token(&cfg, &token).is_none());
    }

    #[actix_web::test]
    async fn e2e_register_login_me() {
        let dir = tempdir().unwrap();
        let mut cfg = make_test_config(TokenMode::JwtHmac);
        cfg.sled_path = dir.path().join("sled").to_string_lossy().to_string();
        let db = Database::new(&cfg.sled_path).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db.clone()))
                .app_data(web::Data::new(cfg.clone()))
                .service(register)
                .service(login)
                .service(logout)
                .service(me),
        )
        .await;

        // First registered account becomes the admin
        let reg = RegisterRequest {
            name: "Admin User".into(),
            email: "admin@parking.com".into(),
            password: "Sup3r$trongPass1".into(),
        };
        let req = test::TestRequest::post().uri("/register").set_json(&reg).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let reg_resp: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(reg_resp["user"]["role"], "ADMIN");
        let token = reg_resp["token"].as_str().unwrap().to_string();

        // Second account is a plain user
        let reg2 = RegisterRequest {
            name: "John Doe".into(),
            email: "john@parking.com".into(),
            password: "Sup3r$trongPass1".into(),
        };
        let req = test::TestRequest::post().uri("/register").set_json(&reg2).to_request();
        let reg2_resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(reg2_resp["user"]["role"], "USER");

        // Duplicate email is a conflict
        let req = test::TestRequest::post().uri("/register").set_json(&reg2).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        // Bearer token drives /me
        let me_req = test::TestRequest::get()
            .uri("/me")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .to_request();
        let me_resp: serde_json::Value = test::call_and_read_body_json(&app, me_req).await;
        assert_eq!(me_resp["email"], "admin@parking.com");
        assert_eq!(me_resp["name"], "Admin User");

        // Login returns the same envelope
        let login_req = LoginRequest {
            email: "admin@parking.com".into(),
            password: "Sup3r$trongPass1".into(),
        };
        let req = test::TestRequest::post().uri("/login").set_json(&login_req).to_request();
        let login_resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(login_resp["token"].as_str().is_some());
        assert_eq!(login_resp["user"]["email"], "admin@parking.com");

        // Wrong password is a generic 401
        let bad = LoginRequest {
            email: "admin@parking.com".into(),
            password: "WrongPassword1!".into(),
        };
        let req = test::TestRequest::post().uri("/login").set_json(&bad).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn guard_accepts_bearer_and_cookie() {
        use actix_web::cookie::Cookie;

        async fn protected(req: HttpRequest) -> HttpResponse {
            match current_claims(&req) {
                Ok(c) => HttpResponse::Ok().json(serde_json::json!({"sub": c.sub})),
                Err(_) => HttpResponse::Unauthorized().finish(),
            }
        }

        let cfg = make_test_config(TokenMode::JwtHmac);
        let claims = make_test_claims();
        let token = make_token(&cfg, &claims).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(cfg.clone()))
                .wrap(actix_web::middleware::from_fn(guard_api))
                .route("/p", web::get().to(protected)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/p")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["sub"], claims.sub);

        let req = test::TestRequest::get()
            .uri("/p")
            .cookie(Cookie::new(ACCESS_COOKIE_NAME, token.clone()))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["sub"], claims.sub);

        let req = test::TestRequest::get().uri("/p").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
    }
}
