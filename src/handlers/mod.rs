pub mod auth;
pub mod cookies;
pub mod dashboard;
pub mod logs;
pub mod requests;
pub mod slots;
pub mod users;
pub mod vehicles;
