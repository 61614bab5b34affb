// User administration endpoints (admin only)
use actix_web::{delete, get, put, web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::db::{id_key, Database};
use crate::handlers::auth::current_claims;
use crate::handlers::logs;
use crate::models::parking::{SlotRequest, Vehicle};
use crate::models::user::{Role, UserInfo, UserRecord};
use crate::types::{paginate, ErrorResponse, ListQuery};

const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

fn count_admins(users: &[UserRecord]) -> usize {
    users.iter().filter(|u| u.role == Role::Admin).count()
}

#[get("/users")]
pub async fn list_users(
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

    let mut users: Vec<UserRecord> = db
        .list("users")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    // User keys are uuids, so the tree order is meaningless; list by
    // registration time instead.
    users.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.email.cmp(&b.email))
    });

    if let Some(term) = query.term() {
        users.retain(|u| {
            u.name.to_lowercase().contains(&term) || u.email.to_lowercase().contains(&term)
        });
    }

    let infos: Vec<UserInfo> = users.iter().map(UserInfo::from).collect();
    let page = query.page();
    let limit = query.limit_or(DEFAULT_PAGE_SIZE);
    Ok(HttpResponse::Ok().json(paginate(infos, page, limit)))
}

#[get("/users/{id}")]
pub async fn get_user(
    path: web::Path<String>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let user_id = path.into_inner();
    let user: Option<UserRecord> = db
        .get("users", &user_id)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    match user {
        Some(u) => Ok(HttpResponse::Ok().json(UserInfo::from(&u))),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse::new("not_found", "User not found"))),
    }
}

#[put("/users/{id}/role")]
pub async fn update_user_role(
    path: web::Path<String>,
    payload: web::Json<UpdateRoleRequest>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let user_id = path.into_inner();
    let users: Vec<UserRecord> = db
        .list("users")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let mut user = match users.iter().find(|u| u.id == user_id).cloned() {
        Some(u) => u,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "User not found"))
            )
        }
    };

    // The console must never lock itself out
    if user.role == Role::Admin && payload.role == Role::User && count_admins(&users) <= 1 {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "last_admin",
            "Cannot demote the last remaining admin",
        )));
    }

    user.role = payload.role;
    db.update("users", &user_id, &user)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Role updated");

    Ok(HttpResponse::Ok().json(UserInfo::from(&user)))
}

/// Delete an account along with its vehicles and slot requests. Activity
/// log entries stay, they are the audit trail.
#[delete("/users/{id}")]
pub async fn delete_user(
    path: web::Path<String>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let user_id = path.into_inner();
    if user_id == claims.sub {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "forbidden",
            "You cannot delete your own account",
        )));
    }

    let users: Vec<UserRecord> = db
        .list("users")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let user = match users.iter().find(|u| u.id == user_id) {
        Some(u) => u.clone(),
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "User not found"))
            )
        }
    };
    if user.role == Role::Admin && count_admins(&users) <= 1 {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "last_admin",
            "Cannot delete the last remaining admin",
        )));
    }

    // Cascade to owned records
    let vehicles: Vec<Vehicle> = db
        .list("vehicles")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    for v in vehicles.iter().filter(|v| v.user_id == user_id) {
        db.delete("vehicles", &id_key(v.id))
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }
    let requests: Vec<SlotRequest> = db
        .list("requests")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    for r in requests.iter().filter(|r| r.user_id == user_id) {
        db.delete("requests", &id_key(r.id))
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    db.delete("users", &user_id)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "User deleted");

    Ok(HttpResponse::Ok().json(json!({"status": "deleted"})))
}
