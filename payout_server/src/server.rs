use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use payout_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    PayoutFlowApi,
    PayoutQueryApi,
    SqliteDatabase,
};

use crate::{
    alert_worker::start_alert_sweep_worker,
    config::ServerConfig,
    errors::ServerError,
    middleware::OrganizationMiddlewareFactory,
    routes::{
        health,
        AlertByIdRoute,
        AlertsRoute,
        AnalyticsRoute,
        ConfirmPayoutRoute,
        EvaluatePayoutRoute,
        ImportPayoutRoute,
        OverridePayoutRoute,
        PayoutByIdRoute,
        PayoutReceivedRoute,
        PayoutsRoute,
        ResolveAlertRoute,
        UpdatePayoutRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 50;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.auto_migrate {
        info!("🗃️ Running database migrations");
        db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let _sweeper =
        start_alert_sweep_worker(db.clone(), producers.clone(), config.alert_policy, config.sweep_interval);
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// The event hooks the server installs. Notification delivery is out of scope, so alerts and overrides are only
/// written to the log, where an external shipper can pick them up.
pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_alert_raised(|ev| {
            Box::pin(async move {
                let alert = ev.alert;
                warn!(
                    "📬️ [{}] {} alert #{} raised for payout {:?}: {}",
                    alert.organization_id, alert.severity, alert.id, alert.booking_payout_id, alert.alert_message
                );
            })
        })
        .on_payout_confirmed(|ev| {
            Box::pin(async move {
                let payout = ev.payout;
                info!(
                    "📬️ [{}] Payout #{} ({}) confirmed by {}",
                    payout.organization_id,
                    payout.id,
                    payout.reservation_code,
                    payout.payout_confirmed_by.as_ref().map(|u| u.to_string()).unwrap_or_default()
                );
            })
        })
        .on_payout_overridden(|ev| {
            Box::pin(async move {
                let payout = ev.new_payout;
                info!(
                    "📬️ [{}] Payout #{} ({}) overridden. Net payout {} -> {}. Reason: {}. {} alerts resolved",
                    payout.organization_id,
                    payout.id,
                    payout.reservation_code,
                    ev.old_payout.net_payout_amount,
                    payout.net_payout_amount,
                    payout.override_reason.as_deref().unwrap_or_default(),
                    ev.resolved_alerts.len()
                );
            })
        });
    hooks
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let flow_api = PayoutFlowApi::new(db.clone(), producers.clone()).with_policy(config.alert_policy);
        let query_api = PayoutQueryApi::new(db.clone());
        let api_scope = web::scope("/api")
            .wrap(OrganizationMiddlewareFactory::new(config.default_organization.clone()))
            .service(PayoutsRoute::<SqliteDatabase>::new())
            .service(ImportPayoutRoute::<SqliteDatabase>::new())
            .service(PayoutByIdRoute::<SqliteDatabase>::new())
            .service(UpdatePayoutRoute::<SqliteDatabase>::new())
            .service(ConfirmPayoutRoute::<SqliteDatabase>::new())
            .service(OverridePayoutRoute::<SqliteDatabase>::new())
            .service(EvaluatePayoutRoute::<SqliteDatabase>::new())
            .service(PayoutReceivedRoute::<SqliteDatabase>::new())
            .service(AlertsRoute::<SqliteDatabase>::new())
            .service(AlertByIdRoute::<SqliteDatabase>::new())
            .service(ResolveAlertRoute::<SqliteDatabase>::new())
            .service(AnalyticsRoute::<SqliteDatabase>::new());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("payout::access_log"))
            .app_data(web::Data::new(flow_api))
            .app_data(web::Data::new(query_api))
            .configure(configure_extractors)
            .service(health)
            .service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Turns body, query and path extraction failures into [`ServerError`]s, so every error response has the same shape.
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default().error_handler(|e, _| ServerError::InvalidRequestBody(e.to_string()).into()),
    )
    .app_data(web::QueryConfig::default().error_handler(|e, _| ServerError::InvalidRequestQuery(e.to_string()).into()))
    .app_data(web::PathConfig::default().error_handler(|e, _| ServerError::InvalidRequestPath(e.to_string()).into()));
}
