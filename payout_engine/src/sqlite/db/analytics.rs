//! Aggregate views over `booking_payouts`. SQLite does the grouping. The sums are accumulated here with checked
//! arithmetic, since SQLite's `SUM` fails the whole query on overflow. Averages are derived from the sums so that they
//! are rounded the same way everywhere.
use std::str::FromStr;

use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{Amount, Currency, OrganizationId, OtaPlatform, PayoutStatus},
    payout_api::payout_objects::{MonthlyTotals, PayoutAnalytics, PayoutTotals, PlatformTotals, StatusTotals},
    traits::PayoutEngineError,
};

#[derive(Debug, FromRow)]
struct GroupRow {
    group_key: String,
    currency: Currency,
    guest_paid: Amount,
    commission: Amount,
    net_payout: Amount,
}

#[derive(Debug)]
struct GroupSums {
    group_key: String,
    currency: Currency,
    count: i64,
    guest_paid: Amount,
    commission: Amount,
    net_payout: Amount,
}

impl GroupSums {
    fn start(row: GroupRow) -> Self {
        Self {
            group_key: row.group_key,
            currency: row.currency,
            count: 1,
            guest_paid: row.guest_paid,
            commission: row.commission,
            net_payout: row.net_payout,
        }
    }

    fn add(&mut self, row: &GroupRow) -> Result<(), PayoutEngineError> {
        let sums = (
            self.guest_paid.checked_add(row.guest_paid),
            self.commission.checked_add(row.commission),
            self.net_payout.checked_add(row.net_payout),
        );
        let (Some(guest_paid), Some(commission), Some(net_payout)) = sums else {
            return Err(PayoutEngineError::DatabaseError(format!(
                "The {} totals for group '{}' are too large to represent",
                self.currency, self.group_key
            )));
        };
        self.guest_paid = guest_paid;
        self.commission = commission;
        self.net_payout = net_payout;
        self.count += 1;
        Ok(())
    }

    fn totals(&self) -> PayoutTotals {
        PayoutTotals::from_sums(self.currency.clone(), self.count, self.guest_paid, self.commission, self.net_payout)
    }

    fn key<T: FromStr>(&self) -> Result<T, PayoutEngineError>
    where T::Err: std::fmt::Display {
        self.group_key.parse::<T>().map_err(|e| PayoutEngineError::DatabaseError(e.to_string()))
    }
}

async fn group_sums(
    org: &OrganizationId,
    group_expr: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<GroupSums>, PayoutEngineError> {
    let sql = format!(
        r#"
            SELECT
                {group_expr} AS group_key,
                currency,
                guest_paid_amount AS guest_paid,
                ota_commission_amount AS commission,
                net_payout_amount AS net_payout
            FROM booking_payouts
            WHERE organization_id = $1
            ORDER BY group_key, currency
        "#
    );
    let rows: Vec<GroupRow> = sqlx::query_as(&sql).bind(org).fetch_all(conn).await?;
    let mut groups: Vec<GroupSums> = Vec::new();
    for row in rows {
        match groups.last_mut() {
            Some(g) if g.group_key == row.group_key && g.currency == row.currency => g.add(&row)?,
            _ => groups.push(GroupSums::start(row)),
        }
    }
    Ok(groups)
}

pub async fn payout_analytics(
    org: &OrganizationId,
    conn: &mut SqliteConnection,
) -> Result<PayoutAnalytics, PayoutEngineError> {
    let by_platform = group_sums(org, "ota_platform", conn)
        .await?
        .iter()
        .map(|g| Ok(PlatformTotals { platform: g.key::<OtaPlatform>()?, totals: g.totals() }))
        .collect::<Result<Vec<_>, PayoutEngineError>>()?;
    let by_month = group_sums(org, "strftime('%Y-%m', COALESCE(check_out_date, created_at))", conn)
        .await?
        .iter()
        .map(|g| MonthlyTotals { month: g.group_key.clone(), totals: g.totals() })
        .collect();
    let by_status = group_sums(org, "payout_status", conn)
        .await?
        .iter()
        .map(|g| Ok(StatusTotals { status: g.key::<PayoutStatus>()?, totals: g.totals() }))
        .collect::<Result<Vec<_>, PayoutEngineError>>()?;
    Ok(PayoutAnalytics { by_platform, by_month, by_status })
}
