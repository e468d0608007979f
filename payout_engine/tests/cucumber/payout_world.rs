use std::collections::HashMap;

use cucumber::World;
use log::*;
use payout_engine::{
    db_types::{Currency, OrganizationId, PayoutRecord},
    events::EventProducers,
    payout_objects::SweepResult,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    PayoutEngineError,
    PayoutFlowApi,
    PayoutQueryApi,
    SqliteDatabase,
};

#[derive(Debug, World)]
pub struct PayoutWorld {
    pub system: Option<PayoutSystem>,
    pub org: OrganizationId,
    /// Reservation code -> payout id
    pub payouts: HashMap<String, i64>,
    /// Copies of payouts taken just before an operation that is expected to fail
    pub snapshots: HashMap<String, PayoutRecord>,
    pub last_error: Option<PayoutEngineError>,
    pub last_sweep: Option<SweepResult>,
}

impl Default for PayoutWorld {
    fn default() -> Self {
        Self {
            system: None,
            org: OrganizationId::from("acme-hotels"),
            payouts: HashMap::new(),
            snapshots: HashMap::new(),
            last_error: None,
            last_sweep: None,
        }
    }
}

#[derive(Debug)]
pub struct PayoutSystem {
    pub db_path: String,
    pub api: PayoutFlowApi<SqliteDatabase>,
    pub query: PayoutQueryApi<SqliteDatabase>,
}

impl PayoutWorld {
    pub fn api(&self) -> &PayoutFlowApi<SqliteDatabase> {
        &self.system.as_ref().expect("PayoutFlowApi not initialised").api
    }

    pub fn query(&self) -> &PayoutQueryApi<SqliteDatabase> {
        &self.system.as_ref().expect("PayoutQueryApi not initialised").query
    }

    pub fn payout_id(&self, reservation: &str) -> i64 {
        *self.payouts.get(reservation).unwrap_or_else(|| panic!("No payout was imported for {reservation}"))
    }

    pub async fn payout(&self, reservation: &str) -> PayoutRecord {
        let id = self.payout_id(reservation);
        self.query().payout(&self.org, id).await.expect("Error fetching payout")
    }

    pub async fn snapshot(&mut self, reservation: &str) {
        let record = self.payout(reservation).await;
        self.snapshots.insert(reservation.to_string(), record);
    }

    pub async fn currency_of(&self, reservation: &str) -> Currency {
        self.payout(reservation).await.currency
    }
}

impl PayoutSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let api = PayoutFlowApi::new(db.clone(), EventProducers::default());
        let query = PayoutQueryApi::new(db);
        Self { db_path: url, api, query }
    }
}
