use chrono::{Duration, Utc};
use cucumber::{then, when};
use payout_engine::{
    db_types::{
        Alert,
        AlertSeverity,
        Amount,
        CommissionRate,
        Currency,
        NewPayoutRecord,
        OrganizationId,
        OtaPlatform,
        PayoutStatus,
        UserId,
    },
    payout_objects::{AlertQueryFilter, ExternalPayoutUpdate, OverrideRequest},
    traits::AlertsRecorded,
    PayoutEngineError,
};

use crate::cucumber::PayoutWorld;

fn currency(code: &str) -> Currency {
    Currency::new(code).expect("Not a valid currency code")
}

fn amount(value: &str, currency: &Currency) -> Amount {
    Amount::parse_in(value, currency).expect("Not a valid amount")
}

fn rate(value: &str) -> CommissionRate {
    value.parse().expect("Not a valid commission rate")
}

fn platform(value: &str) -> OtaPlatform {
    value.parse().expect("Not a valid OTA platform")
}

fn error_name(e: &PayoutEngineError) -> &'static str {
    match e {
        PayoutEngineError::Reconciliation(_) => "Reconciliation",
        PayoutEngineError::MissingReason => "MissingReason",
        PayoutEngineError::MissingResolutionNotes => "MissingResolutionNotes",
        PayoutEngineError::RecordNotFound(_) => "RecordNotFound",
        PayoutEngineError::AlertNotFound(_) => "AlertNotFound",
        PayoutEngineError::AlertAlreadyResolved(_) => "AlertAlreadyResolved",
        PayoutEngineError::ConcurrentModification { .. } => "ConcurrentModification",
        PayoutEngineError::IllegalStatusTransition { .. } => "IllegalStatusTransition",
        PayoutEngineError::PayoutAlreadyExists(_) => "PayoutAlreadyExists",
        PayoutEngineError::InvalidQuery(_) => "InvalidQuery",
        PayoutEngineError::DatabaseError(_) => "DatabaseError",
    }
}

fn new_payout(world: &PayoutWorld, platform_name: &str, reservation: &str, paid: &str, code: &str) -> NewPayoutRecord {
    let currency = currency(code);
    let paid = amount(paid, &currency);
    NewPayoutRecord::new(world.org.clone(), "villa-1", reservation, platform(platform_name), paid, currency)
}

async fn import(world: &mut PayoutWorld, payout: NewPayoutRecord) -> Result<AlertsRecorded, PayoutEngineError> {
    let reservation = payout.reservation_code.clone();
    let result = world.api().import_payout(payout).await;
    match &result {
        Ok(recorded) => {
            world.payouts.insert(reservation, recorded.payout.id);
        },
        Err(e) => world.last_error = Some(e.clone()),
    }
    result
}

fn remember<T>(world: &mut PayoutWorld, result: Result<T, PayoutEngineError>) {
    match result {
        Ok(_) => panic!("The operation was expected to fail, but succeeded"),
        Err(e) => world.last_error = Some(e),
    }
}

async fn alerts_of_type(world: &PayoutWorld, alert_type: &str, reservation: &str) -> Vec<Alert> {
    let id = world.payout_id(reservation);
    let filter = AlertQueryFilter::default().for_payout(id).with_alert_type(alert_type);
    world.query().alerts(&world.org, filter).await.expect("Error fetching alerts")
}

async fn the_alert(world: &PayoutWorld, alert_type: &str, reservation: &str) -> Alert {
    let mut alerts = alerts_of_type(world, alert_type, reservation).await;
    assert_eq!(alerts.len(), 1, "Expected exactly one {alert_type} alert for {reservation}");
    alerts.remove(0)
}

//------------------------------------------    Imports    -----------------------------------------------------------

#[when(expr = "I import a payout from {word} for reservation {word} of {word} {word} at {word}% commission")]
async fn import_with_rate(
    world: &mut PayoutWorld,
    platform: String,
    reservation: String,
    paid: String,
    code: String,
    pct: String,
) {
    let payout = new_payout(world, &platform, &reservation, &paid, &code).with_commission_rate(rate(&pct));
    import(world, payout).await.expect("Error importing payout");
}

#[when(
    expr = "I import a payout from {word} for reservation {word} of {word} {word} at {word}% commission with a \
            reported net payout of {word}"
)]
async fn import_with_reported_net(
    world: &mut PayoutWorld,
    platform: String,
    reservation: String,
    paid: String,
    code: String,
    pct: String,
    net: String,
) {
    let net = amount(&net, &currency(&code));
    let payout = new_payout(world, &platform, &reservation, &paid, &code)
        .with_commission_rate(rate(&pct))
        .with_reported_net_payout(net);
    import(world, payout).await.expect("Error importing payout");
}

#[when(expr = "I import a payout from {word} for reservation {word} of {word} {word} with {word} commission")]
async fn import_with_commission(
    world: &mut PayoutWorld,
    platform: String,
    reservation: String,
    paid: String,
    code: String,
    commission: String,
) {
    let commission = amount(&commission, &currency(&code));
    let payout = new_payout(world, &platform, &reservation, &paid, &code).with_commission_amount(commission);
    import(world, payout).await.expect("Error importing payout");
}

#[when(expr = "I try to import a payout from {word} for reservation {word} of {word} {word} with {word} commission")]
async fn try_import_with_commission(
    world: &mut PayoutWorld,
    platform: String,
    reservation: String,
    paid: String,
    code: String,
    commission: String,
) {
    let commission = amount(&commission, &currency(&code));
    let payout = new_payout(world, &platform, &reservation, &paid, &code).with_commission_amount(commission);
    let result = import(world, payout).await;
    assert!(result.is_err(), "The import was expected to fail, but succeeded");
}

#[when(expr = "I try to import a payout from {word} for reservation {word} of {word} {word} at {word}% commission")]
async fn try_import_with_rate(
    world: &mut PayoutWorld,
    platform: String,
    reservation: String,
    paid: String,
    code: String,
    pct: String,
) {
    let payout = new_payout(world, &platform, &reservation, &paid, &code).with_commission_rate(rate(&pct));
    let result = import(world, payout).await;
    assert!(result.is_err(), "The import was expected to fail, but succeeded");
}

#[when(expr = "the OTA reports a net payout of {word} for {word}")]
async fn external_net_payout(world: &mut PayoutWorld, net: String, reservation: String) {
    let currency = world.currency_of(&reservation).await;
    let update = ExternalPayoutUpdate::default().with_net_payout(amount(&net, &currency));
    let id = world.payout_id(&reservation);
    world.api().apply_external_update(&world.org, id, update).await.expect("Error applying OTA update");
}

//------------------------------------------    Alerts     -----------------------------------------------------------

#[when(expr = "I evaluate alerts for {word}")]
async fn evaluate_alerts(world: &mut PayoutWorld, reservation: String) {
    let id = world.payout_id(&reservation);
    world.api().evaluate_alerts(&world.org, id).await.expect("Error evaluating alerts");
}

#[when(expr = "I evaluate alerts for {word} {int} hours after it was imported")]
async fn evaluate_alerts_later(world: &mut PayoutWorld, reservation: String, hours: i64) {
    let payout = world.payout(&reservation).await;
    let at = payout.created_at + Duration::hours(hours);
    world.api().evaluate_alerts_at(&world.org, payout.id, at).await.expect("Error evaluating alerts");
}

#[when(expr = "the alert sweep runs {int} hours from now")]
async fn sweep_later(world: &mut PayoutWorld, hours: i64) {
    let at = Utc::now() + Duration::hours(hours);
    let result = world.api().sweep_alerts_at(at).await.expect("Error sweeping alerts");
    world.last_sweep = Some(result);
}

#[then(expr = "the sweep checked {int} payout(s) and raised {int} alert(s)")]
async fn check_sweep(world: &mut PayoutWorld, checked: usize, raised: usize) {
    let result = world.last_sweep.as_ref().expect("The alert sweep has not run");
    assert_eq!(result.payouts_checked, checked, "Unexpected number of payouts checked");
    assert_eq!(result.alerts_raised, raised, "Unexpected number of alerts raised");
}

#[when(expr = "{word} resolves the {word} alert for {word} with notes {string}")]
async fn resolve_alert(world: &mut PayoutWorld, user: String, alert_type: String, reservation: String, notes: String) {
    let alert = the_alert(world, &alert_type, &reservation).await;
    world.api().resolve_alert(&world.org, alert.id, &notes, &UserId::from(user)).await.expect("Error resolving alert");
}

#[when(expr = "{word} tries to resolve the {word} alert for {word} with notes {string}")]
async fn try_resolve_alert(
    world: &mut PayoutWorld,
    user: String,
    alert_type: String,
    reservation: String,
    notes: String,
) {
    let alert = the_alert(world, &alert_type, &reservation).await;
    let result = world.api().resolve_alert(&world.org, alert.id, &notes, &UserId::from(user)).await;
    remember(world, result);
}

#[then(expr = "the payout for {word} has {int} open {word} alert(s)")]
async fn check_open_alerts(world: &mut PayoutWorld, reservation: String, count: usize, alert_type: String) {
    let open = alerts_of_type(world, &alert_type, &reservation).await.into_iter().filter(|a| !a.is_resolved).count();
    assert_eq!(open, count, "Unexpected number of open {alert_type} alerts for {reservation}");
}

#[then(expr = "the payout for {word} has no alerts")]
async fn check_no_alerts(world: &mut PayoutWorld, reservation: String) {
    let id = world.payout_id(&reservation);
    let alerts =
        world.query().alerts(&world.org, AlertQueryFilter::default().for_payout(id)).await.expect("Error fetching alerts");
    assert!(alerts.is_empty(), "Expected no alerts for {reservation}, found {alerts:?}");
}

#[then(expr = "the {word} alert for {word} has severity {word}")]
async fn check_alert_severity(world: &mut PayoutWorld, alert_type: String, reservation: String, severity: String) {
    let alert = the_alert(world, &alert_type, &reservation).await;
    let severity: AlertSeverity = severity.parse().expect("Not a valid severity");
    assert_eq!(alert.severity, severity);
}

#[then(expr = "the {word} alert for {word} is resolved by {word} with notes {string}")]
async fn check_alert_resolved(
    world: &mut PayoutWorld,
    alert_type: String,
    reservation: String,
    user: String,
    notes: String,
) {
    let alert = the_alert(world, &alert_type, &reservation).await;
    assert!(alert.is_resolved, "The alert is still open");
    assert_eq!(alert.resolved_by, Some(UserId::from(user)));
    assert!(alert.resolved_at.is_some(), "The alert has no resolution time");
    assert_eq!(alert.resolution_notes.as_deref(), Some(notes.as_str()));
}

//------------------------------------------  Operator actions  -------------------------------------------------------

fn override_request(net: &str, commission: &str, reason: String, currency: &Currency) -> OverrideRequest {
    OverrideRequest::new(amount(net, currency), amount(commission, currency), reason)
}

#[when(expr = "{word} overrides the payout for {word} with a net payout of {word}, a commission of {word} and reason \
               {string}")]
async fn override_payout(
    world: &mut PayoutWorld,
    user: String,
    reservation: String,
    net: String,
    commission: String,
    reason: String,
) {
    let currency = world.currency_of(&reservation).await;
    let request = override_request(&net, &commission, reason, &currency);
    let id = world.payout_id(&reservation);
    world.api().override_payout(&world.org, id, request, &UserId::from(user)).await.expect("Error overriding payout");
}

#[when(expr = "{word} tries to override the payout for {word} with a net payout of {word}, a commission of {word} and \
               reason {string}")]
async fn try_override_payout(
    world: &mut PayoutWorld,
    user: String,
    reservation: String,
    net: String,
    commission: String,
    reason: String,
) {
    world.snapshot(&reservation).await;
    let currency = world.currency_of(&reservation).await;
    let request = override_request(&net, &commission, reason, &currency);
    let id = world.payout_id(&reservation);
    let result = world.api().override_payout(&world.org, id, request, &UserId::from(user)).await;
    remember(world, result);
}

#[when(expr = "{word} confirms the payout for {word}")]
async fn confirm_payout(world: &mut PayoutWorld, user: String, reservation: String) {
    let id = world.payout_id(&reservation);
    world.api().confirm_payout(&world.org, id, &UserId::from(user), None).await.expect("Error confirming payout");
}

#[when(expr = "{word} tries to confirm the payout for {word}")]
async fn try_confirm_payout(world: &mut PayoutWorld, user: String, reservation: String) {
    world.snapshot(&reservation).await;
    let id = world.payout_id(&reservation);
    let result = world.api().confirm_payout(&world.org, id, &UserId::from(user), None).await;
    remember(world, result);
}

#[when(expr = "{word} tries to confirm the payout for {word} at version {int}")]
async fn try_confirm_stale(world: &mut PayoutWorld, user: String, reservation: String, version: i64) {
    world.snapshot(&reservation).await;
    let id = world.payout_id(&reservation);
    let result = world.api().confirm_payout(&world.org, id, &UserId::from(user), Some(version)).await;
    remember(world, result);
}

#[when(expr = "the payout for {word} is received")]
async fn mark_received(world: &mut PayoutWorld, reservation: String) {
    let id = world.payout_id(&reservation);
    world.api().mark_received(&world.org, id, None).await.expect("Error marking payout as received");
}

#[when(expr = "I try to mark the payout for {word} as received")]
async fn try_mark_received(world: &mut PayoutWorld, reservation: String) {
    world.snapshot(&reservation).await;
    let id = world.payout_id(&reservation);
    let result = world.api().mark_received(&world.org, id, None).await;
    remember(world, result);
}

//------------------------------------------  Payout checks  ---------------------------------------------------------

#[then(expr = "the payout for {word} has a commission of {word} and a net payout of {word}")]
async fn check_figures(world: &mut PayoutWorld, reservation: String, commission: String, net: String) {
    let payout = world.payout(&reservation).await;
    assert_eq!(payout.ota_commission_amount, amount(&commission, &payout.currency), "Commission is incorrect");
    assert_eq!(payout.net_payout_amount, amount(&net, &payout.currency), "Net payout is incorrect");
}

#[then(expr = "the payout for {word} has status {word}")]
async fn check_status(world: &mut PayoutWorld, reservation: String, status: String) {
    let payout = world.payout(&reservation).await;
    let status: PayoutStatus = status.parse().expect("Not a valid payout status");
    assert_eq!(payout.payout_status, status);
}

#[then(expr = "the payout for {word} is at version {int}")]
async fn check_version(world: &mut PayoutWorld, reservation: String, version: i64) {
    let payout = world.payout(&reservation).await;
    assert_eq!(payout.version, version);
}

#[then(expr = "the payout for {word} was overridden by {word} with reason {string}")]
async fn check_override(world: &mut PayoutWorld, reservation: String, user: String, reason: String) {
    let payout = world.payout(&reservation).await;
    assert!(payout.manual_override, "Payout is not flagged as manually overridden");
    assert_eq!(payout.override_by, Some(UserId::from(user)));
    assert_eq!(payout.override_reason.as_deref(), Some(reason.as_str()));
    assert!(payout.override_at.is_some(), "Override time was not recorded");
}

#[then(expr = "the payout for {word} is not overridden")]
async fn check_not_overridden(world: &mut PayoutWorld, reservation: String) {
    let payout = world.payout(&reservation).await;
    assert!(!payout.manual_override, "Payout is flagged as manually overridden");
    assert!(payout.override_reason.is_none());
    assert!(payout.override_by.is_none());
}

#[then(expr = "the payout for {word} was confirmed by {word}")]
async fn check_confirmed(world: &mut PayoutWorld, reservation: String, user: String) {
    let payout = world.payout(&reservation).await;
    assert_eq!(payout.payout_confirmed_by, Some(UserId::from(user)));
    assert!(payout.payout_confirmed_at.is_some(), "Confirmation time was not recorded");
}

#[then(expr = "the payout for {word} is unchanged")]
async fn check_unchanged(world: &mut PayoutWorld, reservation: String) {
    let before = world.snapshots.get(&reservation).cloned().expect("No snapshot was taken");
    let after = world.payout(&reservation).await;
    assert_eq!(before, after, "The payout was modified");
}

#[then(expr = "the operation fails with {word}")]
async fn check_error(world: &mut PayoutWorld, expected: String) {
    let err = world.last_error.take().expect("No operation has failed");
    assert_eq!(error_name(&err), expected, "Unexpected error: {err}");
}

#[then(expr = "organization {word} cannot see the payout for {word}")]
async fn check_isolation(world: &mut PayoutWorld, org: String, reservation: String) {
    let id = world.payout_id(&reservation);
    let other = OrganizationId::from(org.as_str());
    let result = world.query().payout(&other, id).await;
    assert!(matches!(result, Err(PayoutEngineError::RecordNotFound(_))), "Payout leaked to {org}: {result:?}");
}
