use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Alert, NewAlert, OrganizationId, UserId},
    payout_api::payout_objects::AlertQueryFilter,
};

/// Inserts the alert unless an open alert of the same type already exists for the same payout, in which case `None`
/// is returned and nothing is written.
pub async fn insert_alert_if_new(
    alert: NewAlert,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Alert>, sqlx::Error> {
    let inserted: Option<Alert> = sqlx::query_as(
        r#"
            INSERT INTO payout_alerts (
                organization_id,
                booking_payout_id,
                alert_type,
                alert_message,
                severity,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(&alert.organization_id)
    .bind(alert.booking_payout_id)
    .bind(&alert.alert_type)
    .bind(&alert.alert_message)
    .bind(alert.severity)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    match &inserted {
        Some(a) => debug!("🗃️ Alert #{} ({}) raised for payout {:?}", a.id, a.alert_type, a.booking_payout_id),
        None => trace!("🗃️ {} alert for payout {:?} is already open", alert.alert_type, alert.booking_payout_id),
    }
    Ok(inserted)
}

pub async fn fetch_alert(
    org: &OrganizationId,
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Alert>, sqlx::Error> {
    let alert = sqlx::query_as("SELECT * FROM payout_alerts WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(org)
        .fetch_optional(conn)
        .await?;
    Ok(alert)
}

/// Fetches alerts according to criteria specified in the `AlertQueryFilter`, newest first.
pub async fn search_alerts(
    org: &OrganizationId,
    query: AlertQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<Alert>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM payout_alerts WHERE ");
    let mut where_clause = builder.separated(" AND ");
    where_clause.push("organization_id = ");
    where_clause.push_bind_unseparated(org.as_str().to_string());
    if query.open_only {
        where_clause.push("is_resolved = 0");
    }
    if let Some(payout_id) = query.payout_id {
        where_clause.push("booking_payout_id = ");
        where_clause.push_bind_unseparated(payout_id);
    }
    if let Some(alert_type) = query.alert_type {
        where_clause.push("alert_type = ");
        where_clause.push_bind_unseparated(alert_type);
    }
    if let Some(severity) = query.severity {
        where_clause.push("severity = ");
        where_clause.push_bind_unseparated(severity);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let alerts = builder.build_query_as::<Alert>().fetch_all(conn).await?;
    Ok(alerts)
}

/// Resolves the alert if it is still open. Returns `None` if the alert does not exist or was already resolved.
pub async fn resolve_alert(
    org: &OrganizationId,
    id: i64,
    notes: &str,
    by: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Alert>, sqlx::Error> {
    let alert = sqlx::query_as(
        r#"
            UPDATE payout_alerts SET
                is_resolved = TRUE,
                resolved_by = $1,
                resolved_at = $2,
                resolution_notes = $3
            WHERE id = $4 AND organization_id = $5 AND is_resolved = 0
            RETURNING *;
        "#,
    )
    .bind(by)
    .bind(now)
    .bind(notes)
    .bind(id)
    .bind(org)
    .fetch_optional(conn)
    .await?;
    Ok(alert)
}

/// Resolves every open alert of type `alert_type` attached to the payout, returning the resolved alerts.
pub async fn resolve_open_alerts_for_payout(
    payout_id: i64,
    alert_type: &str,
    notes: &str,
    by: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Alert>, sqlx::Error> {
    let alerts: Vec<Alert> = sqlx::query_as(
        r#"
            UPDATE payout_alerts SET
                is_resolved = TRUE,
                resolved_by = $1,
                resolved_at = $2,
                resolution_notes = $3
            WHERE booking_payout_id = $4 AND alert_type = $5 AND is_resolved = 0
            RETURNING *;
        "#,
    )
    .bind(by)
    .bind(now)
    .bind(notes)
    .bind(payout_id)
    .bind(alert_type)
    .fetch_all(conn)
    .await?;
    if !alerts.is_empty() {
        debug!("🗃️ {} open {alert_type} alerts for payout #{payout_id} resolved", alerts.len());
    }
    Ok(alerts)
}
