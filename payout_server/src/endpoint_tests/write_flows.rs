//! Write routes exercised against a real SQLite database, since their behaviour lives in the transactions.
use actix_web::{http::StatusCode, web, web::ServiceConfig};
use payout_engine::{
    db_types::{alert_types, Alert, AlertSeverity, Amount, PayoutRecord, PayoutStatus},
    events::EventProducers,
    payout_objects::{ExternalPayoutUpdate, OverrideRequest},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{AlertsRecorded, OverrideResult},
    PayoutDatabase,
    PayoutFlowApi,
    PayoutQueryApi,
    SqliteDatabase,
};
use serde_json::{json, Value};
use sqlx::{migrate::MigrateDatabase, Sqlite};

use super::helpers::{get_request, patch_request, post_request, Caller};
use crate::{
    data_objects::{ResolveAlertParams, VersionParams},
    routes::{
        AlertByIdRoute,
        AlertsRoute,
        ConfirmPayoutRoute,
        EvaluatePayoutRoute,
        ImportPayoutRoute,
        OverridePayoutRoute,
        PayoutByIdRoute,
        PayoutReceivedRoute,
        ResolveAlertRoute,
        UpdatePayoutRoute,
    },
};

const ORG: &str = "acme-hotels";
const OPERATOR: &str = "ops@acme-hotels.com";

struct TestServer {
    db: SqliteDatabase,
    flow_api: web::Data<PayoutFlowApi<SqliteDatabase>>,
    query_api: web::Data<PayoutQueryApi<SqliteDatabase>>,
}

impl TestServer {
    async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let flow_api = web::Data::new(PayoutFlowApi::new(db.clone(), EventProducers::default()));
        let query_api = web::Data::new(PayoutQueryApi::new(db.clone()));
        Self { db, flow_api, query_api }
    }

    fn configure(&self) -> impl FnOnce(&mut ServiceConfig) {
        let flow_api = self.flow_api.clone();
        let query_api = self.query_api.clone();
        move |cfg| {
            cfg.app_data(flow_api)
                .app_data(query_api)
                .service(ImportPayoutRoute::<SqliteDatabase>::new())
                .service(PayoutByIdRoute::<SqliteDatabase>::new())
                .service(UpdatePayoutRoute::<SqliteDatabase>::new())
                .service(ConfirmPayoutRoute::<SqliteDatabase>::new())
                .service(OverridePayoutRoute::<SqliteDatabase>::new())
                .service(EvaluatePayoutRoute::<SqliteDatabase>::new())
                .service(PayoutReceivedRoute::<SqliteDatabase>::new())
                .service(AlertsRoute::<SqliteDatabase>::new())
                .service(AlertByIdRoute::<SqliteDatabase>::new())
                .service(ResolveAlertRoute::<SqliteDatabase>::new());
        }
    }

    async fn import(&self, body: &Value) -> (StatusCode, String) {
        post_request(Caller::new(ORG, OPERATOR), "/payouts", Some(body), self.configure()).await.expect("Request failed")
    }

    async fn import_ok(&self, body: &Value) -> AlertsRecorded {
        let (status, body) = self.import(body).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        serde_json::from_str(&body).unwrap()
    }

    async fn post<T: serde::Serialize>(&self, caller: Caller<'_>, path: &str, body: Option<&T>) -> (StatusCode, String) {
        post_request(caller, path, body, self.configure()).await.expect("Request failed")
    }

    async fn get(&self, caller: Caller<'_>, path: &str) -> (StatusCode, String) {
        get_request(caller, path, self.configure()).await.expect("Request failed")
    }

    async fn tear_down(self) {
        let url = self.db.url().to_string();
        self.db.pool().close().await;
        Sqlite::drop_database(&url).await.unwrap();
    }
}

// Scenario A: 1000.00 THB at 15%
fn scenario_a(reservation: &str) -> Value {
    json!({
        "property_id": "villa-3",
        "reservation_code": reservation,
        "ota_platform": "booking_com",
        "guest_paid_amount": 100_000,
        "ota_commission_rate": "15",
        "currency": "THB",
        "hostaway_sync": true
    })
}

// Scenario B: as A, but the OTA reports a net payout of 900.00 THB
fn scenario_b(reservation: &str) -> Value {
    let mut body = scenario_a(reservation);
    body["net_payout_amount"] = json!(90_000);
    body
}

#[actix_web::test]
async fn import_derives_figures() {
    let server = TestServer::new().await;
    let recorded = server.import_ok(&scenario_a("HMA1")).await;
    let payout = recorded.payout;
    assert_eq!(payout.organization_id.as_str(), ORG);
    assert_eq!(payout.ota_commission_amount, Amount::from(15_000));
    assert_eq!(payout.net_payout_amount, Amount::from(85_000));
    assert_eq!(payout.payout_status, PayoutStatus::Pending);
    assert!(recorded.new_alerts.is_empty());
    assert!(payout.hostaway_sync);

    let (status, body) = server.import(&scenario_a("HMA1")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body,
        r#"{"error":"The request conflicts with the current state of the data. A payout for reservation HMA1 already exists"}"#
    );
    server.tear_down().await;
}

#[actix_web::test]
async fn import_rejects_bad_bodies() {
    let server = TestServer::new().await;
    let mut body = scenario_a("HMA2");
    body["organization_id"] = json!("rival-hotels");
    let (status, text) = server.import(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.starts_with(r#"{"error":"Could not read request body:"#), "{text}");

    let mut body = scenario_a("HMA2");
    body["ota_commission_rate"] = json!("150");
    let (status, text) = server.import(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{text}");

    let mut body = scenario_a("HMA2");
    body["ota_commission_amount"] = json!(120_000);
    body["ota_commission_rate"] = Value::Null;
    let (status, text) = server.import(&body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(text.starts_with(r#"{"error":"The request was rejected."#), "{text}");

    let (status, text) = post_request(Caller::anonymous(ORG), "/payouts", Some(&scenario_a("HMA2")), server.configure())
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text, r#"{"error":"The X-Acting-User header is required for this request."}"#);
    server.tear_down().await;
}

#[actix_web::test]
async fn mismatch_then_override() {
    let server = TestServer::new().await;
    let operator = Caller::new(ORG, OPERATOR);
    // Scenario B
    let recorded = server.import_ok(&scenario_b("HMB1")).await;
    let id = recorded.payout.id;
    assert_eq!(recorded.payout.payout_status, PayoutStatus::Discrepancy);
    assert_eq!(recorded.new_alerts.len(), 1);
    let alert = &recorded.new_alerts[0];
    assert_eq!(alert.alert_type, alert_types::COMMISSION_MISMATCH);
    assert_eq!(alert.severity, AlertSeverity::High);
    assert_eq!(alert.booking_payout_id, Some(id));

    // Scenario D
    let path = format!("/payouts/{id}/override");
    let blank = OverrideRequest::new(Amount::from(90_000), Amount::from(10_000), "  ");
    let (status, body) = server.post(operator, &path, Some(&blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The request was rejected. An override reason is required"}"#);

    let request = OverrideRequest::new(
        Amount::from(90_000),
        Amount::from(10_000),
        "OTA refunded guest directly, commission waived",
    );
    let (status, body) = server.post(Caller::anonymous(ORG), &path, Some(&request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    let (status, body) = server.get(operator, &format!("/payouts/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let unchanged: PayoutRecord = serde_json::from_str(&body).unwrap();
    assert_eq!(unchanged, recorded.payout);

    // Scenario C
    let (status, body) = server.post(operator, &path, Some(&request)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: OverrideResult = serde_json::from_str(&body).unwrap();
    assert!(result.payout.manual_override);
    assert_eq!(result.payout.payout_status, PayoutStatus::Confirmed);
    assert_eq!(result.payout.net_payout_amount, Amount::from(90_000));
    assert_eq!(result.payout.override_by.as_ref().map(|u| u.as_str()), Some(OPERATOR));
    assert_eq!(result.resolved_alerts.len(), 1);
    let resolved = &result.resolved_alerts[0];
    assert!(resolved.is_resolved);
    assert_eq!(
        resolved.resolution_notes.as_deref(),
        Some("Resolved by manual override: OTA refunded guest directly, commission waived")
    );

    let (status, body) = server.get(operator, "/alerts?open_only=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    let (status, body) = server.get(operator, &format!("/alerts/{}", resolved.id)).await;
    assert_eq!(status, StatusCode::OK);
    let alert: Alert = serde_json::from_str(&body).unwrap();
    assert_eq!(alert.resolved_by.as_ref().map(|u| u.as_str()), Some(OPERATOR));
    server.tear_down().await;
}

#[actix_web::test]
async fn confirmation() {
    let server = TestServer::new().await;
    let operator = Caller::new(ORG, OPERATOR);
    let payout = server.import_ok(&scenario_a("HME1")).await.payout;
    let path = format!("/payouts/{}/confirm", payout.id);

    let stale = VersionParams { expected_version: Some(payout.version + 1) };
    let (status, body) = server.post(operator, &path, Some(&stale)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("was modified concurrently"), "{body}");

    // Scenario E
    let current = VersionParams { expected_version: Some(payout.version) };
    let (status, body) = server.post(operator, &path, Some(&current)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let confirmed: PayoutRecord = serde_json::from_str(&body).unwrap();
    assert_eq!(confirmed.payout_status, PayoutStatus::Confirmed);
    assert_eq!(confirmed.payout_confirmed_by.as_ref().map(|u| u.as_str()), Some(OPERATOR));
    assert!(confirmed.payout_confirmed_at.is_some());
    assert_eq!(confirmed.version, payout.version + 1);

    let (status, body) = server.post::<VersionParams>(operator, &path, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("Cannot confirm a payout that is confirmed"), "{body}");

    let (status, body) = server.get(operator, "/alerts").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    server.tear_down().await;
}

#[actix_web::test]
async fn external_update_and_evaluation() {
    let server = TestServer::new().await;
    let operator = Caller::new(ORG, OPERATOR);
    let payout = server.import_ok(&scenario_a("HMU1")).await.payout;
    let path = format!("/payouts/{}", payout.id);

    let update = ExternalPayoutUpdate::default().with_net_payout(Amount::from(80_000));
    let (status, body) = patch_request(Caller::anonymous(ORG), &path, &update, server.configure()).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = patch_request(operator, &path, &update, server.configure()).await.unwrap();
    assert_eq!(status, StatusCode::OK, "{body}");
    let recorded: AlertsRecorded = serde_json::from_str(&body).unwrap();
    assert_eq!(recorded.payout.net_payout_amount, Amount::from(80_000));
    assert_eq!(recorded.payout.payout_status, PayoutStatus::Discrepancy);
    assert_eq!(recorded.new_alerts.len(), 1);

    let (status, body) = server.post::<()>(operator, &format!("{path}/evaluate"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let recorded: AlertsRecorded = serde_json::from_str(&body).unwrap();
    assert!(recorded.new_alerts.is_empty());
    assert!(!recorded.status_changed);

    let (status, _) = server.get(Caller::new("rival-hotels", OPERATOR), &path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = patch_request(Caller::new("rival-hotels", OPERATOR), &path, &update, server.configure()).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.tear_down().await;
}

#[actix_web::test]
async fn resolve_alerts() {
    let server = TestServer::new().await;
    let operator = Caller::new(ORG, OPERATOR);
    let recorded = server.import_ok(&scenario_b("HMR1")).await;
    let path = format!("/alerts/{}/resolve", recorded.new_alerts[0].id);

    let blank = ResolveAlertParams { resolution_notes: " ".into() };
    let (status, body) = server.post(operator, &path, Some(&blank)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The request was rejected. Resolution notes are required to resolve an alert"}"#);

    let notes = ResolveAlertParams { resolution_notes: "OTA confirmed the 900.00 THB by email".into() };
    let (status, body) = server.post(Caller::new("rival-hotels", OPERATOR), &path, Some(&notes)).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{body}");

    let (status, body) = server.post(operator, &path, Some(&notes)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let alert: Alert = serde_json::from_str(&body).unwrap();
    assert!(alert.is_resolved);
    assert_eq!(alert.resolution_notes.as_deref(), Some("OTA confirmed the 900.00 THB by email"));

    let (status, body) = server.post(operator, &path, Some(&notes)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("has already been resolved"), "{body}");

    // Resolving the alert does not settle the discrepancy
    let (_, body) = server.get(operator, &format!("/payouts/{}", recorded.payout.id)).await;
    let payout: PayoutRecord = serde_json::from_str(&body).unwrap();
    assert_eq!(payout.payout_status, PayoutStatus::Discrepancy);
    server.tear_down().await;
}

#[actix_web::test]
async fn received_is_terminal() {
    let server = TestServer::new().await;
    let operator = Caller::new(ORG, OPERATOR);
    let payout = server.import_ok(&scenario_a("HMS1")).await.payout;
    let path = format!("/payouts/{}/received", payout.id);

    let (status, body) = server.post::<VersionParams>(operator, &path, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let received: PayoutRecord = serde_json::from_str(&body).unwrap();
    assert_eq!(received.payout_status, PayoutStatus::Received);

    let (status, _) = server.post::<VersionParams>(operator, &path, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = server.post::<VersionParams>(operator, &format!("/payouts/{}/confirm", payout.id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    server.tear_down().await;
}
