//! Depot wiring for the shared service clients and extension points.

use salvo::async_trait;
use std::sync::Arc;

use crate::error::AppResult;
use waypost_core::error::CoreError;
use waypost_service::content::ContentClient;
use waypost_service::crm::CrmClient;
use waypost_service::extensions::Extensions;

/// Injects the CRM client, content client, and extension points into the
/// depot once per request, built once at startup.
pub struct ServiceContextHandler {
    pub crm: CrmClient,
    pub content: ContentClient,
    pub extensions: Arc<Extensions>,
}

#[async_trait]
impl salvo::Handler for ServiceContextHandler {
    #[tracing::instrument(skip(self, _req, depot, _res, _ctrl))]
    async fn handle(
        &self,
        _req: &mut salvo::Request,
        depot: &mut salvo::Depot,
        _res: &mut salvo::Response,
        _ctrl: &mut salvo::FlowCtrl,
    ) {
        depot.inject(Arc::new(self.crm.clone()));
        depot.inject(Arc::new(self.content.clone()));
        depot.inject(Arc::clone(&self.extensions));
    }
}

/// ## Summary
/// Retrieves the CRM client from the depot.
///
/// ## Errors
/// Returns an error if the client is not found in the depot.
pub fn get_crm_from_depot(depot: &salvo::Depot) -> AppResult<Arc<CrmClient>> {
    depot
        .obtain::<Arc<CrmClient>>()
        .cloned()
        .map_err(|_err| CoreError::InvariantViolation("CRM client not found in depot").into())
}

/// ## Summary
/// Retrieves the content-store client from the depot.
///
/// ## Errors
/// Returns an error if the client is not found in the depot.
pub fn get_content_from_depot(depot: &salvo::Depot) -> AppResult<Arc<ContentClient>> {
    depot
        .obtain::<Arc<ContentClient>>()
        .cloned()
        .map_err(|_err| CoreError::InvariantViolation("Content client not found in depot").into())
}

/// ## Summary
/// Retrieves the extension points from the depot.
///
/// ## Errors
/// Returns an error if the extensions are not found in the depot.
pub fn get_extensions_from_depot(depot: &salvo::Depot) -> AppResult<Arc<Extensions>> {
    depot
        .obtain::<Arc<Extensions>>()
        .cloned()
        .map_err(|_err| CoreError::InvariantViolation("Extensions not found in depot").into())
}
