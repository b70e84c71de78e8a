pub mod auth;
pub mod clock_time;
pub mod error;
