mod crm;
mod healthcheck;
mod hooks;
mod redirects;

use salvo::Router;

use crate::middleware::auth::AuthMiddleware;

// Re-export route constants from core
pub use waypost_core::constants::API_ROUTE_COMPONENT;

/// ## Summary
/// Constructs the versioned API router: the redirect mapping surface,
/// the CRM passthrough, the lifecycle webhook, and the healthcheck.
#[must_use]
pub fn routes() -> Router {
    Router::with_path(API_ROUTE_COMPONENT)
        .hoop(AuthMiddleware)
        .push(redirects::routes())
        .push(crm::routes())
        .push(hooks::routes())
        .push(healthcheck::routes())
}
