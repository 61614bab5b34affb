// Slot request lifecycle: users file requests for their vehicles, admins
// approve (assigning a compatible slot) or reject, requesters may cancel
// while still pending. Approved and rejected are terminal.
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::db::{id_key, Database};
use crate::handlers::auth::current_claims;
use crate::handlers::logs;
use crate::models::parking::{ParkingSlot, RequestStatus, SlotRequest, SlotStatus, Vehicle};
use crate::models::user::UserRecord;
use crate::types::{paginate, ErrorResponse, PaginatedResponse};

const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Deserialize)]
pub struct RequestListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestListQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).max(1)
    }

    fn term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRequestRequest {
    #[serde(rename = "vehicleId")]
    pub vehicle_id: u64,
}

/// Approval may name a slot; without one the first compatible available
/// slot (ascending id) is assigned.
#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequestBody {
    #[serde(rename = "slotId", default)]
    pub slot_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct RequesterInfo {
    pub name: String,
    pub email: String,
}

/// A request as the console renders it: the record itself plus the vehicle
/// and, on admin listings, who filed it.
#[derive(Debug, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: SlotRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<Vehicle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<RequesterInfo>,
}

fn load_vehicle(db: &Database, id: u64) -> Result<Option<Vehicle>> {
    db.get("vehicles", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)
}

fn view(db: &Database, request: SlotRequest) -> Result<RequestView> {
    let vehicle = load_vehicle(db, request.vehicle_id)?;
    Ok(RequestView {
        request,
        vehicle,
        user: None,
    })
}

#[post("/requests")]
pub async fn create_request(
    db: web::Data<Database>,
    body: web::Json<CreateRequestRequest>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "forbidden",
            "Admins cannot submit slot requests",
        )));
    }

    let vehicle = match load_vehicle(&db, body.vehicle_id)? {
        Some(v) => v,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Vehicle not found"))
            )
        }
    };
    if vehicle.user_id != claims.sub {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "forbidden",
            "You can only request a slot for your own vehicle",
        )));
    }

    let id = db
        .next_id("requests")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let request = SlotRequest::new(id, &claims.sub, vehicle.id);
    db.insert("requests", &id_key(id), &request)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Slot request created");

    Ok(HttpResponse::Created().json(RequestView {
        request,
        vehicle: Some(vehicle),
        user: None,
    }))
}

#[get("/requests")]
pub async fn list_requests(
    db: web::Data<Database>,
    query: web::Query<RequestListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;

    let mut requests: Vec<SlotRequest> = db
        .list("requests")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if !claims.is_admin() {
        requests.retain(|r| r.user_id == claims.sub);
    }
    if let Some(status) = query.status {
        requests.retain(|r| r.request_status == status);
    }

    let vehicles: HashMap<u64, Vehicle> = db
        .list::<Vehicle>("vehicles")
        .map_err(actix_web::error::ErrorInternalServerError)?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();

    if let Some(term) = query.term() {
        requests.retain(|r| {
            let plate_hit = vehicles
                .get(&r.vehicle_id)
                .map(|v| v.plate_number.to_lowercase().contains(&term))
                .unwrap_or(false);
            let slot_hit = r
                .slot_number
                .as_deref()
                .map(|n| n.to_lowercase().contains(&term))
                .unwrap_or(false);
            plate_hit || slot_hit
        });
    }

    // Admin listings also carry the requester's identity
    let users: HashMap<String, UserRecord> = if claims.is_admin() {
        db.list::<UserRecord>("users")
            .map_err(actix_web::error::ErrorInternalServerError)?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect()
    } else {
        HashMap::new()
    };

    let page = paginate(requests, query.page(), query.limit());
    let items: Vec<RequestView> = page
        .items
        .into_iter()
        .map(|r| {
            let vehicle = vehicles.get(&r.vehicle_id).cloned();
            let user = users.get(&r.user_id).map(|u| RequesterInfo {
                name: u.name.clone(),
                email: u.email.clone(),
            });
            RequestView {
                request: r,
                vehicle,
                user,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(PaginatedResponse {
        items,
        meta: page.meta,
    }))
}

#[post("/requests/{id}/approve")]
pub async fn approve_request(
    path: web::Path<u64>,
    db: web::Data<Database>,
    body: Option<web::Json<ApproveRequestBody>>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let id = path.into_inner();
    let mut request: SlotRequest = match db
        .get("requests", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?
    {
        Some(r) => r,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Request not found"))
            )
        }
    };
    if !request.request_status.is_pending() {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "request_not_pending",
            "Only pending requests can be approved",
        )));
    }

    let vehicle = match load_vehicle(&db, request.vehicle_id)? {
        Some(v) => v,
        None => {
            return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
                "vehicle_missing",
                "The vehicle behind this request no longer exists",
            )))
        }
    };

    let mut slot: ParkingSlot = match body.and_then(|b| b.slot_id) {
        Some(slot_id) => {
            let slot: Option<ParkingSlot> = db
                .get("slots", &id_key(slot_id))
                .map_err(actix_web::error::ErrorInternalServerError)?;
            match slot {
                None => {
                    return Ok(HttpResponse::NotFound()
                        .json(ErrorResponse::new("not_found", "Slot not found")))
                }
                Some(s) if !s.accepts(&vehicle) => {
                    return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
                        "slot_unsuitable",
                        "Slot is unavailable or does not fit the vehicle",
                    )))
                }
                Some(s) => s,
            }
        }
        None => {
            let candidate = db
                .list::<ParkingSlot>("slots")
                .map_err(actix_web::error::ErrorInternalServerError)?
                .into_iter()
                .find(|s| s.accepts(&vehicle));
            match candidate {
                Some(s) => s,
                None => {
                    return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
                        "no_slot_available",
                        "No compatible slot available",
                    )))
                }
            }
        }
    };

    slot.status = SlotStatus::Unavailable;
    db.update("slots", &id_key(slot.id), &slot)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    request.approve_with(&slot);
    db.update("requests", &id_key(id), &request)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Slot request approved");

    Ok(HttpResponse::Ok().json(RequestView {
        request,
        vehicle: Some(vehicle),
        user: None,
    }))
}

#[post("/requests/{id}/reject")]
pub async fn reject_request(
    path: web::Path<u64>,
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

    let id = path.into_inner();
    let mut request: SlotRequest = match db
        .get("requests", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?
    {
        Some(r) => r,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Request not found"))
            )
        }
    };
    if !request.request_status.is_pending() {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "request_not_pending",
            "Only pending requests can be rejected",
        )));
    }

    request.reject();
    db.update("requests", &id_key(id), &request)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Slot request rejected");

    Ok(HttpResponse::Ok().json(view(&db, request)?))
}

/// Cancel a pending request. Only the requester can do this, and the record
/// disappears without an audit entry.
#[delete("/requests/{id}")]
pub async fn cancel_request(
    path: web::Path<u64>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    let id = path.into_inner();

    let request: SlotRequest = match db
        .get("requests", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?
    {
        Some(r) => r,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Request not found"))
            )
        }
    };

    if claims.is_admin() || request.user_id != claims.sub {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "forbidden",
            "Only the requester can cancel a request",
        )));
    }
    if !request.request_status.is_pending() {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "request_not_pending",
            "Only pending requests can be canceled",
        )));
    }

    db.delete("requests", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(json!({"status": "canceled"})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenMode;
    use crate::handlers::auth::tests::make_test_config;
    use crate::handlers::auth::{guard_api, make_token};
    use crate::models::parking::{SlotLocation, VehicleSize, VehicleType};
    use crate::models::user::{Claims, Role};
    use actix_web::{test, App};
    use tempfile::tempdir;

    fn claims_for(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.into(),
            name: sub.into(),
            email: format!("{}@test.dev", sub),
            role,
            iss: "test_iss".into(),
            aud: "test_aud".into(),
            iat: crate::time::unix_now(),
            exp: crate::time::unix_now() + 3600,
        }
    }

    fn seed_vehicle(db: &Database, user_id: &str, plate: &str, vt: VehicleType, size: VehicleSize) -> Vehicle {
        let id = db.next_id("vehicles").unwrap();
        let v = Vehicle {
            id,
            user_id: user_id.into(),
            plate_number: plate.into(),
            vehicle_type: vt,
            size,
            attributes: None,
            created_at: crate::time::now(),
        };
        db.insert("vehicles", &id_key(id), &v).unwrap();
        v
    }

    fn seed_slot(db: &Database, number: &str, size: VehicleSize, vt: VehicleType, status: SlotStatus) -> ParkingSlot {
        let id = db.next_id("slots").unwrap();
        let s = ParkingSlot {
            id,
            slot_number: number.into(),
            size,
            vehicle_type: vt,
            status,
            location: SlotLocation::North,
        };
        db.insert("slots", &id_key(id), &s).unwrap();
        s
    }

    fn seed_request(db: &Database, user_id: &str, vehicle_id: u64) -> SlotRequest {
        let id = db.next_id("requests").unwrap();
        let r = SlotRequest::new(id, user_id, vehicle_id);
        db.insert("requests", &id_key(id), &r).unwrap();
        r
    }

    fn seed_user(db: &Database, id: &str, name: &str) -> UserRecord {
        let u = UserRecord {
            id: id.into(),
            name: name.into(),
            email: format!("{}@test.dev", id),
            password_hash: "x".into(),
            role: Role::User,
            created_at: crate::time::now(),
        };
        db.insert("users", id, &u).unwrap();
        u
    }

    macro_rules! request_app {
        ($db:expr, $cfg:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new($cfg.clone()))
                    .wrap(actix_web::middleware::from_fn(guard_api))
                    .service(create_request)
                    .service(list_requests)
                    .service(approve_request)
                    .service(reject_request)
                    .service(cancel_request),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn create_checks_vehicle_ownership() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);

        // Owner files a pending request with no slot attached
        let token = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();
        let req = test::TestRequest::post()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({"vehicleId": v.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["requestStatus"], "pending");
        assert!(body.get("slotId").is_none());
        assert_eq!(body["vehicle"]["plateNumber"], "ABC123");

        // Somebody else's vehicle is off limits
        let stranger = make_token(&cfg, &claims_for("u2", Role::User)).unwrap();
        let req = test::TestRequest::post()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", stranger)))
            .set_json(serde_json::json!({"vehicleId": v.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

        // Unknown vehicle
        let req = test::TestRequest::post()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({"vehicleId": 999}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        // Admins do not queue for slots
        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();
        let req = test::TestRequest::post()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .set_json(serde_json::json!({"vehicleId": v.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "Slot request created");
    }

    #[actix_web::test]
    async fn approve_assigns_first_compatible_slot() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        seed_slot(&db, "P001", VehicleSize::Small, VehicleType::Car, SlotStatus::Available);
        seed_slot(&db, "P002", VehicleSize::Medium, VehicleType::Car, SlotStatus::Unavailable);
        let expected = seed_slot(&db, "P003", VehicleSize::Medium, VehicleType::Car, SlotStatus::Available);
        seed_slot(&db, "P004", VehicleSize::Medium, VehicleType::Car, SlotStatus::Available);
        let r = seed_request(&db, "u1", v.id);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);
        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["requestStatus"], "approved");
        assert_eq!(resp["slotId"], expected.id);
        assert_eq!(resp["slotNumber"], "P003");

        // The assigned slot is now occupied
        let stored: ParkingSlot = db.get("slots", &id_key(expected.id)).unwrap().unwrap();
        assert_eq!(stored.status, SlotStatus::Unavailable);

        // Terminal state: a second approval attempt conflicts
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert_eq!(entries.last().unwrap().action, "Slot request approved");
    }

    #[actix_web::test]
    async fn approve_rejects_unsuitable_or_missing_slots() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        let occupied = seed_slot(&db, "P001", VehicleSize::Medium, VehicleType::Car, SlotStatus::Unavailable);
        let wrong_size = seed_slot(&db, "P002", VehicleSize::Small, VehicleType::Car, SlotStatus::Available);
        let r = seed_request(&db, "u1", v.id);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);
        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();

        // Naming an occupied slot conflicts
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .set_json(serde_json::json!({"slotId": occupied.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        // Wrong size conflicts too
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .set_json(serde_json::json!({"slotId": wrong_size.id}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        // Unknown slot id is a 404
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .set_json(serde_json::json!({"slotId": 999}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        // No compatible slot anywhere: auto-selection conflicts
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "no_slot_available");

        // The request is still pending after all the failures
        let stored: SlotRequest = db.get("requests", &id_key(r.id)).unwrap().unwrap();
        assert_eq!(stored.request_status, RequestStatus::Pending);

        // Plain users cannot approve at all
        let user = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", user)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn reject_is_terminal_and_keeps_slot_fields_absent() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        let r = seed_request(&db, "u1", v.id);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);
        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();

        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/reject", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["requestStatus"], "rejected");
        assert!(resp.get("slotId").is_none());
        assert!(resp.get("slotNumber").is_none());

        // Rejected requests cannot be approved afterwards
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);

        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert_eq!(entries.last().unwrap().action, "Slot request rejected");
    }

    #[actix_web::test]
    async fn cancel_is_owner_only_pending_only_and_silent() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        let r = seed_request(&db, "u1", v.id);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);

        // Strangers and admins both get a 403
        let stranger = make_token(&cfg, &claims_for("u2", Role::User)).unwrap();
        let req = test::TestRequest::delete()
            .uri(&format!("/requests/{}", r.id))
            .insert_header(("authorization", format!("Bearer {}", stranger)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();
        let req = test::TestRequest::delete()
            .uri(&format!("/requests/{}", r.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);

        // The requester cancels; the record vanishes and nothing is logged
        let owner = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();
        let req = test::TestRequest::delete()
            .uri(&format!("/requests/{}", r.id))
            .insert_header(("authorization", format!("Bearer {}", owner)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "canceled");

        let remaining: Vec<SlotRequest> = db.list("requests").unwrap();
        assert!(remaining.is_empty());
        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert!(entries.is_empty());

        // Approved requests cannot be canceled
        let v2 = seed_vehicle(&db, "u1", "DEF456", VehicleType::Car, VehicleSize::Medium);
        seed_slot(&db, "P001", VehicleSize::Medium, VehicleType::Car, SlotStatus::Available);
        let r2 = seed_request(&db, "u1", v2.id);
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r2.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/requests/{}", r2.id))
            .insert_header(("authorization", format!("Bearer {}", owner)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn listing_scopes_by_role_and_searches_plate_or_slot() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        seed_user(&db, "u1", "John Doe");
        seed_user(&db, "u2", "Jane Smith");
        let v1 = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car, VehicleSize::Medium);
        let v2 = seed_vehicle(&db, "u2", "XYZ789", VehicleType::Motorcycle, VehicleSize::Small);
        let r1 = seed_request(&db, "u1", v1.id);
        seed_request(&db, "u2", v2.id);
        seed_slot(&db, "P005", VehicleSize::Medium, VehicleType::Car, SlotStatus::Available);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = request_app!(db, cfg);
        let admin = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();

        // Approve r1 so it has a slot number to search on
        let req = test::TestRequest::post()
            .uri(&format!("/requests/{}/approve", r1.id))
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        test::call_service(&app, req).await;

        // Users only see their own requests
        let owner = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();
        let req = test::TestRequest::get()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", owner)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);
        assert_eq!(resp["items"][0]["vehicle"]["plateNumber"], "ABC123");
        assert!(resp["items"][0].get("user").is_none());

        // Admins see everything, with the requester attached
        let req = test::TestRequest::get()
            .uri("/requests")
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 2);
        assert_eq!(resp["meta"]["itemsPerPage"], 5);
        assert_eq!(resp["items"][0]["user"]["name"], "John Doe");

        // Status filter
        let req = test::TestRequest::get()
            .uri("/requests?status=pending")
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);
        assert_eq!(resp["items"][0]["vehicle"]["plateNumber"], "XYZ789");

        // Search hits the plate number of the underlying vehicle
        let req = test::TestRequest::get()
            .uri("/requests?search=xyz")
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);

        // And the assigned slot number
        let req = test::TestRequest::get()
            .uri("/requests?search=p005")
            .insert_header(("authorization", format!("Bearer {}", admin)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);
        assert_eq!(resp["items"][0]["slotNumber"], "P005");
    }
}
