use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::{TimeZone, Utc};
use payout_engine::{
    db_types::{alert_types, Alert, AlertSeverity, OrganizationId},
    PayoutQueryApi,
};

use super::helpers::{get_request, Caller};
use crate::{
    endpoint_tests::mocks::MockPayoutManager,
    routes::{AlertByIdRoute, AlertsRoute},
};

#[actix_web::test]
async fn search_open_alerts() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Caller::anonymous("acme-hotels"), "/alerts?open_only=true&severity=high", configure)
            .await
            .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let alerts: Vec<Alert> = serde_json::from_str(&body).unwrap();
    assert_eq!(alerts, vec![mismatch_alert()]);
    assert!(body.contains(r#""alert_type":"commission_mismatch""#), "{body}");
    assert!(body.contains(r#""severity":"high""#), "{body}");
}

#[actix_web::test]
async fn search_alerts_for_payout() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Caller::anonymous("acme-hotels"), "/alerts?payout_id=2", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn search_alerts_with_unknown_parameter() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Caller::anonymous("acme-hotels"), "/alerts?organization_id=rival", configure)
        .await
        .expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request query:"#), "{body}");
}

#[actix_web::test]
async fn fetch_alert_by_id() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request(Caller::anonymous("acme-hotels"), "/alerts/7", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let alert: Alert = serde_json::from_str(&body).unwrap();
    assert_eq!(alert, mismatch_alert());
}

#[actix_web::test]
async fn fetch_alert_from_another_organization() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(Caller::default(), "/alerts/7", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. The requested alert 7 does not exist"}"#);
}

fn configure(cfg: &mut ServiceConfig) {
    let mut payout_manager = MockPayoutManager::new();
    payout_manager
        .expect_search_alerts()
        .withf(|org, query| {
            org.as_str() == "acme-hotels" && query.open_only && query.severity == Some(AlertSeverity::High)
        })
        .returning(|_, _| Ok(vec![mismatch_alert()]));
    payout_manager
        .expect_search_alerts()
        .withf(|org, query| org.as_str() == "acme-hotels" && query.payout_id == Some(2) && !query.open_only)
        .returning(|_, _| Ok(vec![]));
    payout_manager.expect_fetch_alert().returning(|org, id| {
        let alert = mismatch_alert();
        Ok((org == &alert.organization_id && id == alert.id).then_some(alert))
    });
    let query_api = PayoutQueryApi::new(payout_manager);
    cfg.service(AlertsRoute::<MockPayoutManager>::new())
        .service(AlertByIdRoute::<MockPayoutManager>::new())
        .app_data(web::Data::new(query_api));
}

fn mismatch_alert() -> Alert {
    Alert {
        id: 7,
        organization_id: OrganizationId::from("acme-hotels"),
        booking_payout_id: Some(1),
        alert_type: alert_types::COMMISSION_MISMATCH.to_string(),
        alert_message: "Net payout 900.00 THB does not match the expected 850.00 THB".to_string(),
        severity: AlertSeverity::High,
        is_resolved: false,
        resolved_by: None,
        resolved_at: None,
        resolution_notes: None,
        created_at: Utc.with_ymd_and_hms(2024, 3, 12, 13, 30, 0).unwrap(),
    }
}
