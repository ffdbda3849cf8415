pub mod appointment;
pub mod auth;
pub mod clock;
pub mod error;
pub mod schedule;
pub mod user;
