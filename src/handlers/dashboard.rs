// Dashboard aggregates, computed by scanning the collections on each call.
use actix_web::{get, web, HttpRequest, HttpResponse, Result};
use serde::Serialize;

use crate::db::Database;
use crate::handlers::auth::current_claims;
use crate::models::parking::{
    ParkingSlot, RequestStatus, SlotLocation, SlotRequest, SlotStatus, Vehicle, VehicleType,
};

#[derive(Debug, Serialize)]
pub struct StatsData {
    #[serde(rename = "totalVehicles")]
    pub total_vehicles: usize,
    #[serde(rename = "availableSlots")]
    pub available_slots: usize,
    #[serde(rename = "pendingRequests")]
    pub pending_requests: usize,
    #[serde(rename = "occupiedSlots")]
    pub occupied_slots: usize,
}

/// One bar or pie segment.
#[derive(Debug, Serialize)]
pub struct ChartPoint {
    pub name: &'static str,
    pub value: usize,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: StatsData,
    #[serde(rename = "vehicleTypes")]
    pub vehicle_types: Vec<ChartPoint>,
    #[serde(rename = "requestStatuses")]
    pub request_statuses: Vec<ChartPoint>,
    #[serde(rename = "slotLocations")]
    pub slot_locations: Vec<ChartPoint>,
}

#[get("/dashboard/stats")]
pub async fn dashboard_stats(db: web::Data<Database>, req: HttpRequest) -> Result<HttpResponse> {
    current_claims(&req)?;

    let vehicles: Vec<Vehicle> = db
        .list("vehicles")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let slots: Vec<ParkingSlot> = db
        .list("slots")
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let requests: Vec<SlotRequest> = db
        .list("requests")
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let stats = StatsData {
        total_vehicles: vehicles.len(),
        available_slots: slots.iter().filter(|s| s.status == SlotStatus::Available).count(),
        pending_requests: requests
            .iter()
            .filter(|r| r.request_status == RequestStatus::Pending)
            .count(),
        occupied_slots: slots
            .iter()
            .filter(|s| s.status == SlotStatus::Unavailable)
            .count(),
    };

    // Zero-valued categories are kept so the charts have a stable shape
    let vehicle_types = VehicleType::ALL
        .iter()
        .map(|t| ChartPoint {
            name: t.label(),
            value: vehicles.iter().filter(|v| v.vehicle_type == *t).count(),
        })
        .collect();
    let request_statuses = RequestStatus::ALL
        .iter()
        .map(|st| ChartPoint {
            name: st.label(),
            value: requests.iter().filter(|r| r.request_status == *st).count(),
        })
        .collect();
    let slot_locations = SlotLocation::ALL
        .iter()
        .map(|loc| ChartPoint {
            name: loc.label(),
            value: slots.iter().filter(|s| s.location == *loc).count(),
        })
        .collect();

    Ok(HttpResponse::Ok().json(DashboardResponse {
        stats,
        vehicle_types,
        request_statuses,
        slot_locations,
    }))
}
