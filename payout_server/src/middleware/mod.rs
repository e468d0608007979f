mod organization;

pub use organization::{OrganizationMiddlewareFactory, OrganizationMiddlewareService, ORGANIZATION_HEADER};
