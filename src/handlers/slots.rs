// Parking slot endpoints. Listing is open to every authenticated caller,
// but non-admins only ever see available slots; mutations are admin only.
use actix_web::{get, post, put, web, HttpRequest, HttpResponse, Result};
use serde::Deserialize;

use crate::db::{id_key, Database};
use crate::handlers::auth::current_claims;
use crate::handlers::logs;
use crate::models::parking::{ParkingSlot, SlotLocation, SlotStatus, VehicleSize, VehicleType};
use crate::types::{paginate, ErrorResponse};
use crate::validation;

const DEFAULT_PAGE_SIZE: usize = 10;

/// Slot listings take equality filters on top of the usual page/limit/search
/// trio, all combined by AND.
#[derive(Debug, Deserialize)]
pub struct SlotListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub search: Option<String>,
    pub status: Option<SlotStatus>,
    pub location: Option<SlotLocation>,
    pub size: Option<VehicleSize>,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: Option<VehicleType>,
}

impl SlotListQuery {
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
pub struct CreateSlotRequest {
    #[serde(rename = "slotNumber")]
    pub slot_number: String,
    pub size: VehicleSize,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: VehicleType,
    #[serde(default)]
    pub status: Option<SlotStatus>,
    pub location: SlotLocation,
}

/// `status` omitted (or an empty body) flips the current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSlotStatusRequest {
    #[serde(default)]
    pub status: Option<SlotStatus>,
}

#[get("/slots")]
pub async fn list_slots(
    db: web::Data<Database>,
    query: web::Query<SlotListQuery>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;

    let mut slots: Vec<ParkingSlot> = db
        .list("slots")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    // Non-admins never see occupied slots, whatever filters they send
    if !claims.is_admin() {
        slots.retain(|s| s.status == SlotStatus::Available);
    }

    if let Some(term) = query.term() {
        slots.retain(|s| s.slot_number.to_lowercase().contains(&term));
    }
    if let Some(status) = query.status {
        slots.retain(|s| s.status == status);
    }
    if let Some(location) = query.location {
        slots.retain(|s| s.location == location);
    }
    if let Some(size) = query.size {
        slots.retain(|s| s.size == size);
    }
    if let Some(vt) = query.vehicle_type {
        slots.retain(|s| s.vehicle_type == vt);
    }

    Ok(HttpResponse::Ok().json(paginate(slots, query.page(), query.limit())))
}

#[get("/slots/{id}")]
pub async fn get_slot(
    path: web::Path<u64>,
    db: web::Data<Database>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    let id = path.into_inner();

    let slot: Option<ParkingSlot> = db
        .get("slots", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;

    match slot {
        Some(s) if claims.is_admin() || s.status == SlotStatus::Available => {
            Ok(HttpResponse::Ok().json(s))
        }
        _ => Ok(HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Slot not found"))),
    }
}

#[post("/slots")]
pub async fn create_slot(
    db: web::Data<Database>,
    body: web::Json<CreateSlotRequest>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let claims = current_claims(&req)?;
    if !claims.is_admin() {
        return Ok(HttpResponse::Forbidden().json(ErrorResponse::new(
            "insufficient_permissions",
            "Admin role required",
        )));
    }

    let slot_number = body.slot_number.trim().to_uppercase();
    if let Err(e) = validation::validate_slot_number(&slot_number) {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse::new("invalid_slot_number", e)));
    }

    let slots: Vec<ParkingSlot> = db
        .list("slots")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    if slots.iter().any(|s| s.slot_number == slot_number) {
        return Ok(HttpResponse::Conflict().json(ErrorResponse::new(
            "slot_number_taken",
            "A slot with this number already exists",
        )));
    }

    let id = db
        .next_id("slots")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let slot = ParkingSlot {
        id,
        slot_number,
        size: body.size,
        vehicle_type: body.vehicle_type,
        status: body.status.unwrap_or(SlotStatus::Available),
        location: body.location,
    };
    db.insert("slots", &id_key(id), &slot)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Created().json(slot))
}

#[put("/slots/{id}/status")]
pub async fn update_slot_status(
    path: web::Path<u64>,
    db: web::Data<Database>,
    body: Option<web::Json<UpdateSlotStatusRequest>>,
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
    let slot: Option<ParkingSlot> = db
        .get("slots", &id_key(id))
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let mut slot = match slot {
        Some(s) => s,
        None => {
            return Ok(
                HttpResponse::NotFound().json(ErrorResponse::new("not_found", "Slot not found"))
            )
        }
    };

    slot.status = match body.and_then(|b| b.status) {
        Some(status) => status,
        None => slot.status.toggled(),
    };

    db.update("slots", &id_key(id), &slot)
        .map_err(actix_web::error::ErrorInternalServerError)?;

    logs::record(&db, &claims, "Slot status updated");

    Ok(HttpResponse::Ok().json(slot))
}
