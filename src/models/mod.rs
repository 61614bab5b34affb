pub mod parking;
pub mod user;
