use anyhow::{anyhow, Result};
use regex::Regex;
use std::{
    fs,
    path::Path,
    path::PathBuf,
    time::Duration,
};

/// First matching rule wins; an origin with no matching rule is rejected.
pub fn is_origin_allowed(rules: &[CorsRule], origin: &str) -> bool {
    rules
        .iter()
        .find(|rule| origin_matches(&rule.origin, origin))
        .map(|rule| rule.action == CorsAction::Allow)
        .unwrap_or(false)
}

/// Union of request methods named by the allow rules. `None` means
/// unrestricted, either a rule says ALL or no allow rule exists.
pub fn allowed_methods(rules: &[CorsRule]) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for rule in rules.iter().filter(|r| r.action == CorsAction::Allow) {
        if rule.methods.iter().any(|m| m == "ALL") {
            return None;
        }
        for method in &rule.methods {
            if !out.contains(method) {
                out.push(method.clone());
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Union of request headers named by the allow rules, same convention as
/// [`allowed_methods`].
pub fn allowed_headers(rules: &[CorsRule]) -> Option<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for rule in rules.iter().filter(|r| r.action == CorsAction::Allow) {
        if rule.headers.iter().any(|h| h == "ALL") {
            return None;
        }
        for header in &rule.headers {
            if !out.contains(header) {
                out.push(header.clone());
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Wildcard origin match. `*` spans any run of characters, everything else
/// is literal, and the whole origin must match rather than a substring.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    let body = pattern
        .split('*')
        .map(|segment| regex::escape(segment))
        .collect::<Vec<_>>()
        .join(".*");
    match Regex::new(&format!("^{}$", body)) {
        Ok(re) => re.is_match(origin),
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct CorsRule {
    pub origin: String,
    pub action: CorsAction,
    pub methods: Vec<String>,
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorsAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sled_path: String,
    pub backup_dir: String,
    pub backup_name_template: String,
    pub backup_interval: Option<Duration>,
    pub backup_retention: usize,
    pub cors_rules: Vec<CorsRule>,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenMode {
    JwtHmac,
    PasetoV4Local,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Optional static token granting admin access, for ops tooling.
    pub access_token: String,
    pub auth_token_expiry_hours: u64,
    pub token_iss: String,
    pub token_aud: String,
    pub token_ttl_seconds: u64,
    pub paseto_v4_local_key_hex: String,
    pub token_mode: TokenMode,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
}

/// Durations like `250ms`, `30s`, `5m`, `2h`. The unit is required.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    // "ms" must come before "s", a millisecond value matches both suffixes
    let units: [(&str, fn(u64) -> Duration); 4] = [
        ("ms", Duration::from_millis),
        ("s", Duration::from_secs),
        ("m", |n| Duration::from_secs(n * 60)),
        ("h", |n| Duration::from_secs(n * 3600)),
    ];
    for (suffix, build) in units {
        if let Some(number) = s.strip_suffix(suffix) {
            return Ok(build(number.parse()?));
        }
    }
    Err(anyhow!("Invalid duration format: {}", s))
}

pub fn load_config_from_file(config_path: &str) -> AppConfig {
    // Load .env file if it exists
    let abs_config_path = Path::new(config_path)
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(config_path));

    if Path::new(config_path).exists() {
        match dotenvy::from_filename(config_path) {
            Ok(_) => tracing::info!("✓ Loaded .env file from: {}", abs_config_path.display()),
            Err(e) => tracing::warn!(
                "Failed to load .env file from {}: {}",
                abs_config_path.display(),
                e
            ),
        }
    } else {
        tracing::warn!(
            ".env file not found at: {} (using defaults)",
            abs_config_path.display()
        );
    }

    // Server configuration
    let server = ServerConfig {
        host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8081),
        name: std::env::var("SERVER_NAME").unwrap_or_else(|_| "parkpro_backend".to_string()),
    };

    // Sled configuration
    let db_name = std::env::var("DB_NAME").unwrap_or_else(|_| "parkpro_data".to_string());
    // Use a directory by default to avoid backup errors
    let db_path = std::env::var("DB_PATH").unwrap_or_else(|_| "data".to_string());
    let sled_path = if db_path.ends_with('/') {
        format!("{}{}", db_path, db_name)
    } else {
        format!("{}/{}", db_path, db_name)
    };

    let backup_dir =
        std::env::var("PERIODIC_BACKUP_PATH").unwrap_or_else(|_| "backups".to_string());
    let backup_name_template = std::env::var("PERIODIC_BACKUP_NAME")
        .unwrap_or_else(|_| "parkpro_data_backup_{{timestamp}}".to_string());
    let backup_interval = std::env::var("PERIODIC_BACKUP_DB")
        .ok()
        .and_then(|v| parse_duration(&v).ok());
    let backup_retention: usize = std::env::var("PERIODIC_BACKUP_RETENTION")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    // Load CORS rules from .env_cors file
    let cors_rules = load_cors_rules(".env_cors");

    // Security configuration
    let token_mode_env = std::env::var("TOKEN_MODE").unwrap_or_else(|_| "jwt_hmac".into());
    let token_mode = if token_mode_env.eq_ignore_ascii_case("paseto_v4_local") {
        TokenMode::PasetoV4Local
    } else {
        TokenMode::JwtHmac
    };

    let security = SecurityConfig {
        access_token: std::env::var("ACCESS_TOKEN").unwrap_or_default(),
        auth_token_expiry_hours: std::env::var("AUTH_TOKEN_EXPIRY_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .unwrap_or(24),
        token_iss: std::env::var("TOKEN_ISS").unwrap_or_else(|_| "parkpro_backend".into()),
        token_aud: std::env::var("TOKEN_AUD").unwrap_or_else(|_| "parkpro_console".into()),
        token_ttl_seconds: std::env::var("TOKEN_TTL_SECONDS")
            .unwrap_or_else(|_| "43200".into())
            .parse()
            .unwrap_or(43200),
        paseto_v4_local_key_hex: std::env::var("PASETO_V4_LOCAL_KEY_HEX").unwrap_or_default(),
        token_mode,
    };

    AppConfig {
        server,
        sled_path,
        backup_dir,
        backup_name_template,
        backup_interval,
        backup_retention,
        cors_rules,
        security,
    }
}

pub fn load_cors_rules(path: &str) -> Vec<CorsRule> {
    let mut rules = Vec::new();

    let abs_cors_path = Path::new(path)
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(path));

    if !Path::new(path).exists() {
        tracing::warn!(
            ".env_cors file not found at: {} (CORS will be disabled)",
            abs_cors_path.display()
        );
        return rules;
    }

    let content = match fs::read_to_string(path) {
        Ok(s) => {
            tracing::info!("✓ Loaded .env_cors file from: {}", abs_cors_path.display());
            s
        }
        Err(e) => {
            tracing::error!(
                "Failed to read .env_cors file from {}: {}",
                abs_cors_path.display(),
                e
            );
            return rules;
        }
    };

    rules.extend(
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(parse_cors_line),
    );
    rules
}

/// One rule per line: `origin [ALLOW|DENY] [methods] [headers]`.
/// The method and header columns are comma lists or the keyword ALL;
/// trailing columns default to ALLOW / ALL / ALL.
fn parse_cors_line(line: &str) -> Option<CorsRule> {
    let mut cols = line.split_whitespace();
    let origin = cols.next()?.to_string();
    let action = match cols.next() {
        Some(a) if a.eq_ignore_ascii_case("DENY") => CorsAction::Deny,
        _ => CorsAction::Allow,
    };
    let methods = csv_or_all(cols.next(), str::to_uppercase);
    let headers = csv_or_all(cols.next(), str::to_lowercase);
    Some(CorsRule {
        origin,
        action,
        methods,
        headers,
    })
}

fn csv_or_all(column: Option<&str>, normalize: fn(&str) -> String) -> Vec<String> {
    match column {
        Some(raw) if !raw.eq_ignore_ascii_case("ALL") => raw
            .split(',')
            .map(|item| normalize(item.trim()))
            .filter(|item| !item.is_empty())
            .collect(),
        _ => vec!["ALL".to_string()],
    }
}
