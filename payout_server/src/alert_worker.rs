use log::*;
use payout_engine::{alert_rules::AlertPolicy, events::EventProducers, PayoutFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

const MIN_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// Starts the alert sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, the worker re-evaluates the alert policy for every payout that has not settled yet, across all
/// organizations. This is what raises missing confirmation alerts for payouts that nobody touches.
pub fn start_alert_sweep_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    policy: AlertPolicy,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    let interval = interval.max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = PayoutFlowApi::new(db, producers).with_policy(policy);
        info!("🕰️ Alert sweep worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running alert sweep job");
            match api.sweep_alerts().await {
                Ok(result) if result.alerts_raised > 0 => {
                    info!("🕰️ Alert sweep complete: {result}");
                },
                Ok(result) => {
                    debug!("🕰️ Alert sweep complete: {result}");
                },
                Err(e) => {
                    error!("🕰️ Error running alert sweep job: {e}");
                },
            }
        }
    })
}
