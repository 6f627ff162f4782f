//! API Handlers

pub mod admin;
pub mod plots;
pub mod submissions;
pub mod uploads;
