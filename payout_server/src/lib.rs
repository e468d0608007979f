//! # Payout reconciliation server
//! This crate hosts the HTTP front end of the payout engine. It is responsible for:
//! Accepting payout data from upstream OTA integrations.
//! Exposing payouts, alerts and analytics to operators, scoped to one organization per request.
//! Carrying out operator actions: confirmations, manual overrides and alert resolution.
//! Running the periodic alert sweep.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The payout, alert and analytics routes. See [routes](routes/index.html).

pub mod alert_worker;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
