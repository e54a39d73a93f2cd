pub mod admin;
pub mod agent;
pub mod availability;
pub mod bookings;
pub mod cleaners;
pub mod health;
