// Vehicle registry endpoints. Regular users operate on their own vehicles,
// admins see everything.
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::db::{id_key, Database};
use crate::handlers::auth::current_claims;
use crate::handlers::logs;
use crate::models::parking::{Vehicle, VehicleAttributes, VehicleSize, VehicleType};
use crate::models::user::Claims;
use crate::time;
use crate::types::{paginate, ErrorResponse, ListQuery};
use crate::validation;

const DEFAULT_PAGE_SIZE: usize = 5;

#[derive(Debug, Deserialize)]
pub struct CreateVehicleRequest {
    #[serde(rename = "plateNumber")]
    pub plate_number: String,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: VehicleType,
    pub size: VehicleSize,
    #[serde(default)]
    pub attributes: Option<VehicleAttributes>,
}

/// Partial update; the plate number is fixed at registration time.
#[derive(Debug, Deserialize)]
pub struct UpdateVehicleRequest {
    #[serde(rename = "vehicleType")]
    pub vehicle_type: Option<VehicleType>,
    pub size: Option<VehicleSize>,
    pub attributes: Option<VehicleAttributes>,
}

fn visible_to(claims: &Claims, vehicle: &Vehicle) -> bool {
    claims.is_admin() || vehicle.user_id == claims.sub
}

#[get("/vehicles")]
pub async fn list_vehicles(
    db: web::Data<Database>,
    query: web::Query<ListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;

    let mut vehicles: Vec<Vehicle> = db
        .list("vehicles")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if !claims.is_admin() {
        vehicles.retain(|v| v.user_id == claims.sub);
    }

    if let Some(term) = query.term() {
        vehicles.retain(|v| {
            v.plate_number.to_lowercase().contains(&term)
                || v.vehicle_type.to_string().contains(&term)
        });
    }

    let page = query.page();
    let limit = query.limit_or(DEFAULT_PAGE_SIZE);
    Ok(HttpResponse::Ok().json(paginate(vehicles, page, limit)))
}

#[post("/vehicles")]
pub async fn create_vehicle(
    db: web::Data<Database>,
    body: web::Json<CreateVehicleRequest>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;

    let plate = body.plate_number.trim().to_uppercase();
    if let Err(e) = validation::validate_plate_number(&plate) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_plate", e)));
    }
    if let Some(attrs) = &body.attributes {
        if let Some(year) = attrs.year {
            if let Err(e) = validation::validate_vehicle_year(year) {
                return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_year", e)));
            }
        }
    }

    let id = db
        .next_id("vehicles")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let vehicle = Vehicle {
        id,
        user_id: claims.sub.clone(),
        plate_number: plate,
        vehicle_type: body.vehicle_type,
        size: body.size,
        attributes: body.attributes.clone(),
        created_at: time::now(),
    };
    db.insert("vehicles", &id_key(id), &vehicle)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Vehicle added");

    Ok(HttpResponse::Created().json(vehicle))
}

#[get("/vehicles/{id}")]
pub async fn get_vehicle(
    path: web::Path<u64>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    let id = path.into_inner();

    let vehicle: Option<Vehicle> = db
        .get("vehicles", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;

    // Other users' vehicles are indistinguishable from missing ones
    match vehicle {
        Some(v) if visible_to(&claims, &v) => Ok(HttpResponse::Ok().json(v)),
        _ => Ok(HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Vehicle not found"))),
    }
}

#[put("/vehicles/{id}")]
pub async fn update_vehicle(
    path: web::Path<u64>,
    db: web::Data<Database>,
    body: web::Json<UpdateVehicleRequest>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    let id = path.into_inner();

    let vehicle: Option<Vehicle> = db
        .get("vehicles", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let mut vehicle = match vehicle {
        Some(v) if visible_to(&claims, &v) => v,
        _ => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Vehicle not found"))
            )
        }
    };

    if let Some(attrs) = &body.attributes {
        if let Some(year) = attrs.year {
            if let Err(e) = validation::validate_vehicle_year(year) {
                return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_year", e)));
            }
        }
    }

    if let Some(t) = body.vehicle_type {
        vehicle.vehicle_type = t;
    }
    if let Some(s) = body.size {
        vehicle.size = s;
    }
    if let Some(attrs) = &body.attributes {
        vehicle.attributes = Some(attrs.clone());
    }

    db.update("vehicles", &id_key(id), &vehicle)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Vehicle updated");

    Ok(HttpResponse::Ok().json(vehicle))
}

#[delete("/vehicles/{id}")]
pub async fn delete_vehicle(
    path: web::Path<u64>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    let id = path.into_inner();

    let vehicle: Option<Vehicle> = db
        .get("vehicles", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;
    match vehicle {
        Some(v) if visible_to(&claims, &v) => {
            db.delete("vehicles", &id_key(id))
                .map_err(actix_web::error::ErrorInternalServerError)?;
            logs::record(&db, &claims, "Vehicle deleted");
            Ok(HttpResponse::Ok().json(json!({"status": "deleted"})))
        }
        _ => Ok(HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Vehicle not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenMode;
    use crate::handlers::auth::tests::make_test_config;
    use crate::handlers::auth::{guard_api, make_token};
    use crate::models::user::Role;
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

    fn seed_vehicle(db: &Database, user_id: &str, plate: &str, vt: VehicleType) -> Vehicle {
        let id = db.next_id("vehicles").unwrap();
        let v = Vehicle {
            id,
            user_id: user_id.into(),
            plate_number: plate.into(),
            vehicle_type: vt,
            size: VehicleSize::Medium,
            attributes: None,
            created_at: crate::time::now(),
        };
        db.insert("vehicles", &id_key(id), &v).unwrap();
        v
    }

    macro_rules! vehicle_app {
        ($db:expr, $cfg:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new($cfg.clone()))
                    .wrap(actix_web::middleware::from_fn(guard_api))
                    .service(list_vehicles)
                    .service(create_vehicle)
                    .service(get_vehicle)
                    .service(update_vehicle)
                    .service(delete_vehicle),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn create_normalizes_and_validates_plate() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = vehicle_app!(db, cfg);
        let token = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();

        let req = test::TestRequest::post()
            .uri("/vehicles")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({
                "plateNumber": " abc123 ",
                "vehicleType": "car",
                "size": "medium",
                "attributes": {"color": "Blue", "model": "Toyota Camry", "year": 2020}
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["plateNumber"], "ABC123");
        assert_eq!(body["id"], 1);
        assert_eq!(body["userId"], "u1");
        assert_eq!(body["attributes"]["model"], "Toyota Camry");

        // Bad plate is rejected
        let req = test::TestRequest::post()
            .uri("/vehicles")
            .insert_header(("authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({
                "plateNumber": "???",
                "vehicleType": "car",
                "size": "small"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);

        // Creation was logged
        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "Vehicle added");
    }

    #[actix_web::test]
    async fn users_see_own_vehicles_admins_see_all() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        seed_vehicle(&db, "u1", "ABC123", VehicleType::Car);
        seed_vehicle(&db, "u2", "XYZ789", VehicleType::Motorcycle);
        seed_vehicle(&db, "u1", "DEF456", VehicleType::Truck);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = vehicle_app!(db, cfg);

        let user_token = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();
        let req = test::TestRequest::get()
            .uri("/vehicles")
            .insert_header(("authorization", format!("Bearer {}", user_token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 2);
        assert_eq!(resp["items"][0]["plateNumber"], "ABC123");
        assert_eq!(resp["items"][1]["plateNumber"], "DEF456");

        let admin_token = make_token(&cfg, &claims_for("boss", Role::Admin)).unwrap();
        let req = test::TestRequest::get()
            .uri("/vehicles")
            .insert_header(("authorization", format!("Bearer {}", admin_token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 3);

        // Search by plate fragment or by type name
        let req = test::TestRequest::get()
            .uri("/vehicles?search=xyz")
            .insert_header(("authorization", format!("Bearer {}", admin_token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);
        assert_eq!(resp["items"][0]["plateNumber"], "XYZ789");

        let req = test::TestRequest::get()
            .uri("/vehicles?search=truck")
            .insert_header(("authorization", format!("Bearer {}", admin_token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["meta"]["totalItems"], 1);
        assert_eq!(resp["items"][0]["plateNumber"], "DEF456");
    }

    #[actix_web::test]
    async fn foreign_vehicles_read_as_missing() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "owner", "ABC123", VehicleType::Car);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = vehicle_app!(db, cfg);

        let stranger = make_token(&cfg, &claims_for("stranger", Role::User)).unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/vehicles/{}", v.id))
            .insert_header(("authorization", format!("Bearer {}", stranger)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);

        let owner = make_token(&cfg, &claims_for("owner", Role::User)).unwrap();
        let req = test::TestRequest::get()
            .uri(&format!("/vehicles/{}", v.id))
            .insert_header(("authorization", format!("Bearer {}", owner)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::OK);
    }

    #[actix_web::test]
    async fn update_keeps_plate_fixed() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = vehicle_app!(db, cfg);
        let token = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();

        let req = test::TestRequest::put()
            .uri(&format!("/vehicles/{}", v.id))
            .insert_header(("authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({"vehicleType": "truck", "size": "large"}))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["vehicleType"], "truck");
        assert_eq!(resp["size"], "large");
        assert_eq!(resp["plateNumber"], "ABC123");

        let stored: Vehicle = db.get("vehicles", &id_key(v.id)).unwrap().unwrap();
        assert_eq!(stored.vehicle_type, VehicleType::Truck);
        assert_eq!(stored.plate_number, "ABC123");
    }

    #[actix_web::test]
    async fn delete_removes_and_logs() {
        let dir = tempdir().unwrap();
        let db = Database::new(dir.path().join("sled").to_str().unwrap()).unwrap();
        let v = seed_vehicle(&db, "u1", "ABC123", VehicleType::Car);
        let cfg = make_test_config(TokenMode::JwtHmac);
        let app = vehicle_app!(db, cfg);
        let token = make_token(&cfg, &claims_for("u1", Role::User)).unwrap();

        let req = test::TestRequest::delete()
            .uri(&format!("/vehicles/{}", v.id))
            .insert_header(("authorization", format!("Bearer {}", token)))
            .to_request();
        let resp: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp["status"], "deleted");

        let gone: Option<Vehicle> = db.get("vehicles", &id_key(v.id)).unwrap();
        assert!(gone.is_none());

        let entries: Vec<crate::models::parking::LogEntry> = db.list("logs").unwrap();
        assert_eq!(entries.last().unwrap().action, "Vehicle deleted");
    }
}
