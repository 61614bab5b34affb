// src/models/parking.rs
//
// Domain records for the parking console: vehicles, slots, slot requests,
// and activity log entries. All wire names are camelCase and enum values
// lowercase, matching the console client.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Motorcycle,
    Truck,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Car, VehicleType::Motorcycle, VehicleType::Truck];

    /// Capitalized label used in dashboard chart series.
    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Car => "Car",
            VehicleType::Motorcycle => "Motorcycle",
            VehicleType::Truck => "Truck",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehicleType::Car => write!(f, "car"),
            VehicleType::Motorcycle => write!(f, "motorcycle"),
            VehicleType::Truck => write!(f, "truck"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Unavailable,
}

impl SlotStatus {
    pub fn toggled(self) -> SlotStatus {
        match self {
            SlotStatus::Available => SlotStatus::Unavailable,
            SlotStatus::Unavailable => SlotStatus::Available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotLocation {
    North,
    South,
    East,
    West,
}

impl SlotLocation {
    pub const ALL: [SlotLocation; 4] = [
        SlotLocation::North,
        SlotLocation::South,
        SlotLocation::East,
        SlotLocation::West,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SlotLocation::North => "North",
            SlotLocation::South => "South",
            SlotLocation::East => "East",
            SlotLocation::West => "West",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 3] = [
        RequestStatus::Pending,
        RequestStatus::Approved,
        RequestStatus::Rejected,
    ];

    pub fn is_pending(self) -> bool {
        matches!(self, RequestStatus::Pending)
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
        }
    }
}

/// Free-form vehicle details. Known keys are typed; anything else the
/// client sends is preserved as-is.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VehicleAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Vehicle {
    pub id: u64,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "plateNumber")]
    pub plate_number: String,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: VehicleType,
    pub size: VehicleSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<VehicleAttributes>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ParkingSlot {
    pub id: u64,
    #[serde(rename = "slotNumber")]
    pub slot_number: String,
    pub size: VehicleSize,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: VehicleType,
    pub status: SlotStatus,
    pub location: SlotLocation,
}

impl ParkingSlot {
    /// An available slot matching the vehicle's size and type can be assigned.
    pub fn accepts(&self, vehicle: &Vehicle) -> bool {
        self.status == SlotStatus::Available
            && self.size == vehicle.size
            && self.vehicle_type == vehicle.vehicle_type
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SlotRequest {
    pub id: u64,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "vehicleId")]
    pub vehicle_id: u64,
    #[serde(rename = "slotId", default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<u64>,
    #[serde(rename = "slotNumber", default, skip_serializing_if = "Option::is_none")]
    pub slot_number: Option<String>,
    #[serde(rename = "requestStatus")]
    pub request_status: RequestStatus,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl SlotRequest {
    pub fn new(id: u64, user_id: &str, vehicle_id: u64) -> Self {
        let ts = time::now();
        Self {
            id,
            user_id: user_id.to_string(),
            vehicle_id,
            slot_id: None,
            slot_number: None,
            request_status: RequestStatus::Pending,
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    /// Attach the assigned slot and mark the request approved.
    pub fn approve_with(&mut self, slot: &ParkingSlot) {
        self.slot_id = Some(slot.id);
        self.slot_number = Some(slot.slot_number.clone());
        self.request_status = RequestStatus::Approved;
        self.updated_at = time::now();
    }

    pub fn reject(&mut self) {
        self.request_status = RequestStatus::Rejected;
        self.updated_at = time::now();
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEntry {
    pub id: u64,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub action: String,
    pub timestamp: String,
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}
