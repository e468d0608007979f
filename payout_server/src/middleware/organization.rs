//! Organization scoping middleware for the payout server.
//! This middleware can be placed on any route or service.
//!
//! Every payout and alert belongs to exactly one organization. The middleware reads the organization a request acts
//! on from the `X-Organization-Id` header, falling back to the configured default, and stores it in the request
//! extensions. Handlers pick it up with the [`crate::helpers::Organization`] extractor.
use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::trace;
use payout_engine::db_types::OrganizationId;

pub const ORGANIZATION_HEADER: &str = "X-Organization-Id";

pub struct OrganizationMiddlewareFactory {
    default_organization: OrganizationId,
}

impl OrganizationMiddlewareFactory {
    pub fn new(default_organization: OrganizationId) -> Self {
        OrganizationMiddlewareFactory { default_organization }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OrganizationMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = OrganizationMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OrganizationMiddlewareService {
            default_organization: self.default_organization.clone(),
            service: Rc::new(service),
        })
    }
}

pub struct OrganizationMiddlewareService<S> {
    default_organization: OrganizationId,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for OrganizationMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let org = req
            .headers()
            .get(ORGANIZATION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(OrganizationId::from)
            .unwrap_or_else(|| self.default_organization.clone());
        trace!("💻️ Request {} is scoped to organization {org}", req.path());
        req.extensions_mut().insert(org);
        let service = Rc::clone(&self.service);
        Box::pin(async move { service.call(req).await })
    }
}
