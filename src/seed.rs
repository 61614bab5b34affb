// Demo data seeding. The console originally fabricated all of this
// client-side; the same deterministic generators now run server-side
// behind `db seed` and `serve --seed`.
use anyhow::Result;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{Duration, Utc};
use rand_core::OsRng;
use serde_json::Map;

use crate::db::{id_key, Database, COLLECTIONS};
use crate::logging;
use crate::models::parking::{
    LogEntry, ParkingSlot, RequestStatus, SlotLocation, SlotRequest, SlotStatus, Vehicle,
    VehicleAttributes, VehicleSize, VehicleType,
};
use crate::models::user::{Role, UserRecord};

pub const DEMO_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEMO_ADMIN_PASSWORD: &str = "Adm1n$Parking";
pub const DEMO_USER_PASSWORD: &str = "Us3r$Parking!";

const SLOT_COUNT: u64 = 70;
const LOG_BATCH: u64 = 20;

const LOG_ACTIONS: [&str; 10] = [
    "User login",
    "Vehicle added",
    "Vehicle updated",
    "Vehicle deleted",
    "Slot request created",
    "Slot request approved",
    "Slot request rejected",
    "Slot status updated",
    "User registered",
    "Profile updated",
];

/// Populate every collection with the demo fixtures. Non-empty collections
/// are left untouched unless `force` wipes them first.
pub fn seed_demo_data(db: &Database, force: bool) -> Result<()> {
    if force {
        for collection in COLLECTIONS {
            db.clear(collection)?;
            logging::log_collection_operation("clear", collection, None, true);
        }
    }

    let users = seed_users(db)?;
    seed_slots(db)?;
    let vehicles = seed_vehicles(db, &users)?;
    seed_requests(db, &users, &vehicles)?;
    seed_logs(db, &users)?;
    Ok(())
}

fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

fn seed_users(db: &Database) -> Result<Vec<UserRecord>> {
    if db.count("users")? > 0 {
        return db.list("users");
    }

    let roster = [
        ("Admin User", DEMO_ADMIN_EMAIL, Role::Admin),
        ("John Doe", "john@example.com", Role::User),
        ("Jane Smith", "jane@example.com", Role::User),
        ("Michael Johnson", "michael@example.com", Role::User),
        ("Sara Williams", "sara@example.com", Role::User),
    ];

    let mut users = Vec::with_capacity(roster.len());
    for (name, email, role) in roster {
        let password = if role == Role::Admin {
            DEMO_ADMIN_PASSWORD
        } else {
            DEMO_USER_PASSWORD
        };
        let hash = hash_password(password)?;
        let user = if role == Role::Admin {
            UserRecord::new_admin(name, email, hash)
        } else {
            UserRecord::new_user(name, email, hash)
        };
        db.insert("users", &user.id, &user)?;
        users.push(user);
    }

    logging::log_collection_operation("seed", "users", Some(users.len()), true);
    Ok(users)
}

fn seed_slots(db: &Database) -> Result<()> {
    if db.count("slots")? > 0 {
        return Ok(());
    }

    for i in 1..=SLOT_COUNT {
        let size = if i % 3 == 0 {
            VehicleSize::Large
        } else if i % 2 == 0 {
            VehicleSize::Medium
        } else {
            VehicleSize::Small
        };
        let vehicle_type = if i % 4 == 0 {
            VehicleType::Truck
        } else if i % 3 == 0 {
            VehicleType::Motorcycle
        } else {
            VehicleType::Car
        };
        let status = if i % 5 == 0 {
            SlotStatus::Unavailable
        } else {
            SlotStatus::Available
        };
        let location = SlotLocation::ALL[(i % 4) as usize];

        let id = db.next_id("slots")?;
        let slot = ParkingSlot {
            id,
            slot_number: format!("P{:03}", i),
            size,
            vehicle_type,
            status,
            location,
        };
        db.insert("slots", &id_key(id), &slot)?;
    }

    logging::log_collection_operation("seed", "slots", Some(SLOT_COUNT as usize), true);
    Ok(())
}

fn attributes(color: &str, model: &str, year: i32) -> Option<VehicleAttributes> {
    Some(VehicleAttributes {
        color: Some(color.to_string()),
        model: Some(model.to_string()),
        year: Some(year),
        extra: Map::new(),
    })
}

fn seed_vehicles(db: &Database, users: &[UserRecord]) -> Result<Vec<Vehicle>> {
    if db.count("vehicles")? > 0 {
        return db.list("vehicles");
    }

    let owner = match users.iter().find(|u| u.email == "john@example.com") {
        Some(u) => u,
        None => {
            logging::log_warning("seed: demo vehicle owner missing, skipping vehicles");
            return Ok(Vec::new());
        }
    };

    let fixtures = [
        ("ABC123", VehicleType::Car, VehicleSize::Medium, attributes("Blue", "Toyota Camry", 2020), "2023-05-15T10:30:00Z"),
        ("XYZ789", VehicleType::Motorcycle, VehicleSize::Small, attributes("Red", "Honda CBR", 2022), "2023-06-20T14:45:00Z"),
        ("DEF456", VehicleType::Truck, VehicleSize::Large, attributes("White", "Ford F-150", 2019), "2023-04-10T08:15:00Z"),
    ];

    let mut vehicles = Vec::with_capacity(fixtures.len());
    for (plate, vehicle_type, size, attrs, created_at) in fixtures {
        let id = db.next_id("vehicles")?;
        let vehicle = Vehicle {
            id,
            user_id: owner.id.clone(),
            plate_number: plate.to_string(),
            vehicle_type,
            size,
            attributes: attrs,
            created_at: created_at.to_string(),
        };
        db.insert("vehicles", &id_key(id), &vehicle)?;
        vehicles.push(vehicle);
    }

    logging::log_collection_operation("seed", "vehicles", Some(vehicles.len()), true);
    Ok(vehicles)
}

fn seed_requests(db: &Database, users: &[UserRecord], vehicles: &[Vehicle]) -> Result<()> {
    if db.count("requests")? > 0 {
        return Ok(());
    }

    let owner = match users.iter().find(|u| u.email == "john@example.com") {
        Some(u) => u,
        None => return Ok(()),
    };
    let v1 = vehicles.iter().find(|v| v.plate_number == "ABC123");
    let v2 = vehicles.iter().find(|v| v.plate_number == "XYZ789");
    let (v1, v2) = match (v1, v2) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            logging::log_warning("seed: demo vehicles missing, skipping requests");
            return Ok(());
        }
    };
    // The approved fixture points at P005, occupied by the slot generator
    let p005 = db
        .list::<ParkingSlot>("slots")?
        .into_iter()
        .find(|s| s.slot_number == "P005");

    let id = db.next_id("requests")?;
    let pending = SlotRequest {
        id,
        user_id: owner.id.clone(),
        vehicle_id: v1.id,
        slot_id: None,
        slot_number: None,
        request_status: RequestStatus::Pending,
        created_at: "2023-07-01T09:00:00Z".to_string(),
        updated_at: "2023-07-01T09:00:00Z".to_string(),
    };
    db.insert("requests", &id_key(id), &pending)?;

    let id = db.next_id("requests")?;
    let approved = SlotRequest {
        id,
        user_id: owner.id.clone(),
        vehicle_id: v2.id,
        slot_id: p005.as_ref().map(|s| s.id),
        slot_number: p005.as_ref().map(|s| s.slot_number.clone()),
        request_status: RequestStatus::Approved,
        created_at: "2023-06-25T11:30:00Z".to_string(),
        updated_at: "2023-06-26T10:15:00Z".to_string(),
    };
    db.insert("requests", &id_key(id), &approved)?;

    let id = db.next_id("requests")?;
    let rejected = SlotRequest {
        id,
        user_id: owner.id.clone(),
        vehicle_id: v1.id,
        slot_id: None,
        slot_number: None,
        request_status: RequestStatus::Rejected,
        created_at: "2023-06-20T14:00:00Z".to_string(),
        updated_at: "2023-06-21T09:45:00Z".to_string(),
    };
    db.insert("requests", &id_key(id), &rejected)?;

    logging::log_collection_operation("seed", "requests", Some(3), true);
    Ok(())
}

fn seed_logs(db: &Database, users: &[UserRecord]) -> Result<()> {
    if db.count("logs")? > 0 {
        return Ok(());
    }

    // Cycle the canonical actions over the first four demo users, one entry
    // per hour counting backwards, the way the console mocked its history.
    let actors: Vec<&UserRecord> = users.iter().take(4).collect();
    if actors.is_empty() {
        return Ok(());
    }

    for i in 1..=LOG_BATCH {
        let actor = actors[(i as usize) % actors.len()];
        let action = LOG_ACTIONS[(i as usize) % LOG_ACTIONS.len()];
        let timestamp = (Utc::now() - Duration::hours(i as i64)).to_rfc3339();

        let id = db.next_id("logs")?;
        let entry = LogEntry {
            id,
            user_id: actor.id.clone(),
            action: action.to_string(),
            timestamp,
            user_name: Some(actor.name.clone()),
        };
        db.insert("logs", &id_key(id), &entry)?;
    }

    logging::log_collection_operation("seed", "logs", Some(LOG_BATCH as usize), true);
    Ok(())
}
