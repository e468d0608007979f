//! Payout Reconciliation Engine
//!
//! Online travel agencies (OTAs) collect the guest's payment, keep a commission and remit the rest to the property.
//! This library reconciles those booking payouts: it derives commission and net payout from what the OTA reports,
//! raises alerts when the figures do not add up or a payout goes unconfirmed, and provides the audited operator
//! actions for confirming and manually overriding payouts.
//!
//! The library is divided into these sections:
//! 1. The pure business rules. [`mod@reconciliation`] relates guest payment, commission and net payout, and
//!    [`mod@alert_rules`] decides which alerts a payout deserves. Neither touches storage.
//! 2. Database management and control ([`mod@traits`] and the SQLite backend). You should never need to access the
//!    database directly. The exception is the data types used in the database, defined in [`mod@db_types`].
//! 3. The public API ([`mod@payout_api`]), made up of [`PayoutQueryApi`] for reads and [`PayoutFlowApi`] for every
//!    state change.
//!
//! The engine also emits events (see [`mod@events`]) when alerts are raised and when payouts are confirmed or
//! overridden, so that callers can hook notification delivery onto them.
//!
//! Every operation takes the organization it acts on as an explicit [`db_types::OrganizationId`] argument.
pub mod alert_rules;
pub mod db_types;
pub mod events;
pub mod payout_api;
pub mod reconciliation;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use payout_api::{
    payout_flow_api::PayoutFlowApi,
    payout_objects::{self, PayoutAnalytics},
    payout_query_api::PayoutQueryApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{PayoutDatabase, PayoutEngineError, PayoutManagement};
