//! Request handler definitions
//!
//! Handlers stay thin: they pull the organization, acting user and body out of the request, call the engine API and
//! turn the result into JSON. Anything more involved belongs in the engine.
//!
//! Every route under `/api` is scoped to the organization stamped on the request by the organization middleware.
//! Write routes additionally require the `X-Acting-User` header.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use payout_engine::{
    payout_objects::{AlertQueryFilter, ExternalPayoutUpdate, OverrideRequest, PayoutQueryFilter},
    traits::{PayoutDatabase, PayoutManagement},
    PayoutFlowApi,
    PayoutQueryApi,
};

use crate::{
    data_objects::{ImportPayoutParams, ResolveAlertParams, VersionParams},
    errors::ServerError,
    helpers::{ActingUser, Organization},
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Payouts  ----------------------------------------------------

route!(payouts => Get "/payouts" impl PayoutManagement);
/// Route handler for the payout search endpoint
///
/// All query parameters are optional: `platform`, `status`, `property_id`, `currency`, `since` and `until` (RFC 3339
/// timestamps, compared with the import time). Results are ordered oldest first.
pub async fn payouts<B: PayoutManagement>(
    org: Organization,
    query: web::Query<PayoutQueryFilter>,
    api: web::Data<PayoutQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET payouts for {} [{query}]", org.0);
    let payouts = api.payouts(&org.0, query).await?;
    Ok(HttpResponse::Ok().json(payouts))
}

route!(payout_by_id => Get "/payouts/{id}" impl PayoutManagement);
pub async fn payout_by_id<B: PayoutManagement>(
    org: Organization,
    path: web::Path<i64>,
    api: web::Data<PayoutQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET payout #{id} for {}", org.0);
    let payout = api.payout(&org.0, id).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(import_payout => Post "/payouts" impl PayoutDatabase);
/// Route handler for payout imports from upstream OTA integrations.
///
/// The commission and net payout are derived from the guest payment and the commission amount or rate. If the OTA
/// also reported a net payout, it is stored as reported and checked by the alert rules straight away. The response
/// carries the stored payout and any alerts the import raised.
pub async fn import_payout<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    body: web::Json<ImportPayoutParams>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let params = body.into_inner();
    info!(
        "💻️ POST payout import for {} from {}: reservation {} on {}",
        org.0, user.0, params.reservation_code, params.ota_platform
    );
    let recorded = api.import_payout(params.into_new_payout(org.0)).await?;
    Ok(HttpResponse::Created().json(recorded))
}

route!(update_payout => Patch "/payouts/{id}" impl PayoutDatabase);
/// Route handler for corrected figures re-reported by the OTA. Fields left out of the body keep their stored values.
pub async fn update_payout<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    body: web::Json<ExternalPayoutUpdate>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ PATCH payout #{id} for {} from {}", org.0, user.0);
    let recorded = api.apply_external_update(&org.0, id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(recorded))
}

route!(confirm_payout => Post "/payouts/{id}/confirm" impl PayoutDatabase);
/// Route handler for payout confirmation. Confirmation never resolves alerts.
///
/// The body is optional. If it carries an `expected_version`, the confirmation is refused with 409 Conflict if the
/// payout has changed since that version was read.
pub async fn confirm_payout<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    body: Option<web::Json<VersionParams>>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let expected_version = body.and_then(|b| b.expected_version);
    info!("💻️ POST confirm payout #{id} for {} by {}", org.0, user.0);
    let payout = api.confirm_payout(&org.0, id, &user.0, expected_version).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(override_payout => Post "/payouts/{id}/override" impl PayoutDatabase);
/// Route handler for manual overrides.
///
/// The body must carry `net_payout_amount`, `ota_commission_amount` and a non-blank `override_reason`, and may carry
/// `ota_commission_rate` (the stored rate is kept without it) and `expected_version`. A payout in `discrepancy` is confirmed by the override and its open
/// commission mismatch alerts are resolved.
pub async fn override_payout<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    body: web::Json<OverrideRequest>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST override payout #{id} for {} by {}", org.0, user.0);
    let result = api.override_payout(&org.0, id, body.into_inner(), &user.0).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(evaluate_payout => Post "/payouts/{id}/evaluate" impl PayoutDatabase);
pub async fn evaluate_payout<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ POST evaluate alerts for payout #{id} for {} by {}", org.0, user.0);
    let recorded = api.evaluate_alerts(&org.0, id).await?;
    Ok(HttpResponse::Ok().json(recorded))
}

route!(payout_received => Post "/payouts/{id}/received" impl PayoutDatabase);
/// Route handler for recording that the OTA has settled the payout. `received` is terminal.
pub async fn payout_received<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    body: Option<web::Json<VersionParams>>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    let expected_version = body.and_then(|b| b.expected_version);
    info!("💻️ POST payout #{id} received for {}, recorded by {}", org.0, user.0);
    let payout = api.mark_received(&org.0, id, expected_version).await?;
    Ok(HttpResponse::Ok().json(payout))
}

//----------------------------------------------   Alerts  ----------------------------------------------------

route!(alerts => Get "/alerts" impl PayoutManagement);
/// Route handler for the alert search endpoint. Optional query parameters: `open_only`, `payout_id`, `alert_type` and
/// `severity`. Newest alerts come first.
pub async fn alerts<B: PayoutManagement>(
    org: Organization,
    query: web::Query<AlertQueryFilter>,
    api: web::Data<PayoutQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET alerts for {} [{query}]", org.0);
    let alerts = api.alerts(&org.0, query).await?;
    Ok(HttpResponse::Ok().json(alerts))
}

route!(alert_by_id => Get "/alerts/{id}" impl PayoutManagement);
pub async fn alert_by_id<B: PayoutManagement>(
    org: Organization,
    path: web::Path<i64>,
    api: web::Data<PayoutQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ GET alert #{id} for {}", org.0);
    let alert = api.alert(&org.0, id).await?;
    Ok(HttpResponse::Ok().json(alert))
}

route!(resolve_alert => Post "/alerts/{id}/resolve" impl PayoutDatabase);
/// Route handler for alert resolution. Resolution notes are mandatory and an alert can only be resolved once.
pub async fn resolve_alert<B: PayoutDatabase>(
    org: Organization,
    user: ActingUser,
    path: web::Path<i64>,
    body: web::Json<ResolveAlertParams>,
    api: web::Data<PayoutFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    info!("💻️ POST resolve alert #{id} for {} by {}", org.0, user.0);
    let alert = api.resolve_alert(&org.0, id, &body.resolution_notes, &user.0).await?;
    Ok(HttpResponse::Ok().json(alert))
}

//----------------------------------------------   Analytics  ----------------------------------------------------

route!(analytics => Get "/analytics" impl PayoutManagement);
/// Route handler for the aggregate views: totals by platform, by month and by status, each split by currency.
pub async fn analytics<B: PayoutManagement>(
    org: Organization,
    api: web::Data<PayoutQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET analytics for {}", org.0);
    let analytics = api.analytics(&org.0).await?;
    Ok(HttpResponse::Ok().json(analytics))
}
