/// Rollcall - student attendance tracking server
///
/// Students check in and out with geolocation over a REST API;
/// administrators manage student records and pull summaries and exports.

pub mod account;
pub mod admin;
pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod reporting;
pub mod server;
pub mod validation;
