//! # Payout engine public API
//!
//! The `payout_api` module exposes the programmatic API of the payout reconciliation engine.
//!
//! * [`payout_query_api`] answers read-only questions about payouts, alerts and payout analytics.
//! * [`payout_flow_api`] drives every state change: importing OTA data, running the alert policy, confirming,
//!   overriding and settling payouts, and resolving alerts.
//!
//! [`payout_objects`] holds the request, filter and result types shared by both.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits the API needs.
//! Every call takes the organization it acts on explicitly.
//!
//! ```rust,ignore
//! use payout_engine::{db_types::OrganizationId, PayoutQueryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements PayoutManagement
//! let api = PayoutQueryApi::new(db);
//! let open_alerts = api.alerts(&OrganizationId::from("acme"), AlertQueryFilter::open()).await?;
//! ```

pub mod payout_flow_api;
pub mod payout_objects;
pub mod payout_query_api;
