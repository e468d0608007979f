//! #  Database management and control.
//!
//! This module provides the interfaces that define the contracts of the payout engine database *backends*.
//!
//! * [`PayoutManagement`] provides read-only queries over payouts, alerts and payout analytics. It is all that the
//!   read-only parts of the API need, which makes it easy to mock.
//! * [`PayoutDatabase`] defines the highest level of behaviour for backends: every state-changing operation, each
//!   executed atomically and guarded by the payout's version number.
mod data_objects;
mod payout_database;
mod payout_management;

pub use data_objects::{AlertsRecorded, OverrideResult};
pub use payout_database::{PayoutDatabase, PayoutEngineError};
pub use payout_management::PayoutManagement;
