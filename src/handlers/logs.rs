// Activity log endpoints and the shared audit trail writer
use actix_web::{get, web, HttpRequest, HttpResponse, Result};

use crate::db::Database;
use crate::handlers::auth::current_claims;
use crate::models::parking::LogEntry;
use crate::models::user::{Claims, UserRecord};
use crate::time;
use crate::types::{paginate, ErrorResponse, ListQuery};

const DEFAULT_PAGE_SIZE: usize = 20;

/// Append an audit entry for the acting user. Failures are logged and
/// swallowed so a full log tree never blocks the triggering operation.
pub fn record(db: &Database, claims: &Claims, action: &str) {
    write_entry(db, &claims.sub, Some(claims.name.clone()), action);
}

/// Same as [`record`], for call sites that hold the user record instead of
/// token claims (registration and login happen before any token exists).
pub fn record_for_user(db: &Database, user: &UserRecord, action: &str) {
    write_entry(db, &user.id, Some(user.name.clone()), action);
}

fn write_entry(db: &Database, user_id: &str, user_name: Option<String>, action: &str) {
    let result = db.next_id("logs").and_then(|id| {
        let entry = LogEntry {
            id,
            user_id: user_id.to_string(),
            action: action.to_string(),
            timestamp: time::now(),
            user_name,
        };
        db.insert("logs", &crate::db::id_key(id), &entry)
    });
    if let Err(e) = result {
        tracing::warn!("failed to write activity log entry '{}': {}", action, e);
    }
}

/// List activity logs (admin only). Search matches the action text or the
/// user name, case-insensitive.
#[get("/logs")]
pub async fn list_logs(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let mut entries: Vec<LogEntry> = db
        .list("logs")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if let Some(term) = query.term() {
        entries.retain(|e| {
            e.action.to_lowercase().contains(&term)
                || e.user_name
                    .as_deref()
                    .map(|n| n.to_lowercase().contains(&term))
                    .unwrap_or(false)
        });
    }

    let page = query.page();
    let limit = query.limit_or(DEFAULT_PAGE_SIZE);
    Ok(HttpResponse::Ok().json(paginate(entries, page, limit)))
}
