//! Request extractors shared by the route handlers.
use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ready, Ready};
use log::warn;
use payout_engine::db_types::{OrganizationId, UserId};

use crate::errors::ServerError;

pub const ACTING_USER_HEADER: &str = "X-Acting-User";

/// The organization the request acts on, as stamped by [`crate::middleware::OrganizationMiddlewareFactory`].
#[derive(Debug, Clone)]
pub struct Organization(pub OrganizationId);

impl FromRequest for Organization {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let org = req.extensions().get::<OrganizationId>().cloned().map(Organization).ok_or_else(|| {
            warn!("💻️ No organization found in request extensions. Is the organization middleware installed?");
            ServerError::Unspecified("The request is not scoped to an organization".into())
        });
        ready(org)
    }
}

/// The operator performing a write, taken from the `X-Acting-User` header. Requests without it are rejected.
#[derive(Debug, Clone)]
pub struct ActingUser(pub UserId);

impl FromRequest for ActingUser {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .headers()
            .get(ACTING_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| ActingUser(UserId::from(s)))
            .ok_or(ServerError::MissingActingUser);
        ready(user)
    }
}
