//! Queries against the `booking_payouts` table.
//!
//! Every `UPDATE` here is a compare-and-swap on the `version` column of the record that was read beforehand. The
//! update functions return `None` when the swap fails, i.e. when someone else modified the record in the meantime.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewPayoutRecord, OrganizationId, PayoutRecord, PayoutStatus, UserId},
    payout_api::payout_objects::{OverrideRequest, PayoutQueryFilter},
    reconciliation::Reconciliation,
    traits::PayoutEngineError,
};

/// Inserts a new payout in the `pending` state. Fails with `PayoutAlreadyExists` if the reservation has already been
/// imported for this organization and platform.
pub async fn insert_payout(
    payout: NewPayoutRecord,
    reconciliation: Reconciliation,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PayoutRecord, PayoutEngineError> {
    let net_payout = payout.reported_net_payout.unwrap_or(reconciliation.net_payout_amount);
    let reservation = payout.reservation_code.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO booking_payouts (
                organization_id,
                property_id,
                reservation_code,
                ota_platform,
                guest_paid_amount,
                ota_commission_amount,
                ota_commission_rate,
                net_payout_amount,
                currency,
                payout_status,
                hostaway_sync,
                email_parsed,
                check_out_date,
                created_at,
                updated_at,
                version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 1)
            RETURNING *;
        "#,
    )
    .bind(payout.organization_id)
    .bind(payout.property_id)
    .bind(payout.reservation_code)
    .bind(payout.ota_platform)
    .bind(reconciliation.guest_paid_amount)
    .bind(reconciliation.commission_amount)
    .bind(reconciliation.commission_rate)
    .bind(net_payout)
    .bind(payout.currency)
    .bind(PayoutStatus::Pending)
    .bind(payout.hostaway_sync)
    .bind(payout.email_parsed)
    .bind(payout.check_out_date)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(record) => Ok(record),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Payout for reservation {reservation} already exists");
            Err(PayoutEngineError::PayoutAlreadyExists(reservation))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payout(
    org: &OrganizationId,
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    let record = sqlx::query_as("SELECT * FROM booking_payouts WHERE id = $1 AND organization_id = $2")
        .bind(id)
        .bind(org)
        .fetch_optional(conn)
        .await?;
    Ok(record)
}

/// The current version of a payout, regardless of organization.
pub async fn fetch_version(id: i64, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version = sqlx::query_scalar("SELECT version FROM booking_payouts WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(version)
}

/// Fetches payouts according to criteria specified in the `PayoutQueryFilter`
///
/// Resulting payouts are ordered by `created_at` in ascending order
pub async fn search_payouts(
    org: &OrganizationId,
    query: PayoutQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutRecord>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM booking_payouts WHERE ");
    let mut where_clause = builder.separated(" AND ");
    where_clause.push("organization_id = ");
    where_clause.push_bind_unseparated(org.as_str().to_string());
    if let Some(platform) = query.platform {
        where_clause.push("ota_platform = ");
        where_clause.push_bind_unseparated(platform);
    }
    if let Some(status) = query.status {
        where_clause.push("payout_status = ");
        where_clause.push_bind_unseparated(status);
    }
    if let Some(property_id) = query.property_id {
        where_clause.push("property_id = ");
        where_clause.push_bind_unseparated(property_id);
    }
    if let Some(currency) = query.currency {
        where_clause.push("currency = ");
        where_clause.push_bind_unseparated(currency);
    }
    if let Some(since) = query.since {
        where_clause.push("julianday(created_at) >= julianday(");
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push("julianday(created_at) <= julianday(");
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("🗃️ Executing query: {}", builder.sql());
    let payouts = builder.build_query_as::<PayoutRecord>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_payouts: {}", payouts.len());
    Ok(payouts)
}

/// Every payout, for every organization, that has not been marked as received.
pub async fn fetch_unsettled_payouts(conn: &mut SqliteConnection) -> Result<Vec<PayoutRecord>, sqlx::Error> {
    let payouts = sqlx::query_as("SELECT * FROM booking_payouts WHERE payout_status != $1 ORDER BY id ASC")
        .bind(PayoutStatus::Received)
        .fetch_all(conn)
        .await?;
    Ok(payouts)
}

/// Overwrites the money fields and checkout date of `current` with the given values.
pub async fn update_figures(
    current: &PayoutRecord,
    updated: &PayoutRecord,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            UPDATE booking_payouts SET
                guest_paid_amount = $1,
                ota_commission_amount = $2,
                ota_commission_rate = $3,
                net_payout_amount = $4,
                check_out_date = $5,
                updated_at = $6,
                version = version + 1
            WHERE id = $7 AND version = $8
            RETURNING *;
        "#,
    )
    .bind(updated.guest_paid_amount)
    .bind(updated.ota_commission_amount)
    .bind(updated.ota_commission_rate)
    .bind(updated.net_payout_amount)
    .bind(updated.check_out_date)
    .bind(now)
    .bind(current.id)
    .bind(current.version)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

pub async fn update_status(
    current: &PayoutRecord,
    status: PayoutStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            UPDATE booking_payouts SET payout_status = $1, updated_at = $2, version = version + 1
            WHERE id = $3 AND version = $4
            RETURNING *;
        "#,
    )
    .bind(status)
    .bind(now)
    .bind(current.id)
    .bind(current.version)
    .fetch_optional(conn)
    .await?;
    if let Some(r) = &record {
        debug!("🗃️ Payout #{} status changed from {} to {status}", current.id, current.payout_status);
        trace!("🗃️ {r:?}");
    }
    Ok(record)
}

pub async fn confirm(
    current: &PayoutRecord,
    by: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            UPDATE booking_payouts SET
                payout_status = $1,
                payout_confirmed_by = $2,
                payout_confirmed_at = $3,
                updated_at = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING *;
        "#,
    )
    .bind(PayoutStatus::Confirmed)
    .bind(by)
    .bind(now)
    .bind(now)
    .bind(current.id)
    .bind(current.version)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}

/// Writes an operator override. A request without a commission rate keeps the stored one.
pub async fn apply_override(
    current: &PayoutRecord,
    request: &OverrideRequest,
    by: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            UPDATE booking_payouts SET
                net_payout_amount = $1,
                ota_commission_amount = $2,
                ota_commission_rate = COALESCE($3, ota_commission_rate),
                manual_override = TRUE,
                override_reason = $4,
                override_by = $5,
                override_at = $6,
                payout_status = $7,
                updated_at = $8,
                version = version + 1
            WHERE id = $9 AND version = $10
            RETURNING *;
        "#,
    )
    .bind(request.net_payout_amount)
    .bind(request.ota_commission_amount)
    .bind(request.ota_commission_rate)
    .bind(request.override_reason.trim())
    .bind(by)
    .bind(now)
    .bind(current.payout_status.after_override())
    .bind(now)
    .bind(current.id)
    .bind(current.version)
    .fetch_optional(conn)
    .await?;
    Ok(record)
}
