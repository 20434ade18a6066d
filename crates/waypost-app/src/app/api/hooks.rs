use salvo::{Depot, Request, Response, Router, handler, http::StatusCode, writing::Json};
use tracing::error;

use crate::config::get_config_from_depot;
use crate::context::get_crm_from_depot;
use crate::db_handler::get_db_from_depot;
use crate::error::{ErrorResponse, render_service_error};
use waypost_core::constants::HOOKS_ROUTE_COMPONENT;
use waypost_service::auth::require_capability;
use waypost_service::lifecycle::{CrmLifecycleEvent, handle};

/// ## Summary
/// POST /api/v2/hooks/crm - ingests a CRM lifecycle notification and
/// runs the synchronizer: template-to-event mapping copies and
/// delete-on-event-delete. Capability-gated like the write surface.
///
/// ## Errors
/// Returns HTTP 401/403 on capability failure, 400 on a malformed
/// notification body.
#[handler]
async fn crm_hook_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Ok(config) = get_config_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    if let Err(e) = require_capability(depot, &config.permissions.create) {
        render_service_error(res, &e);
        return;
    }

    let event: CrmLifecycleEvent = match req.parse_json().await {
        Ok(event) => event,
        Err(e) => {
            error!(error = ?e, "Failed to parse lifecycle notification");
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(ErrorResponse {
                code: "rest_invalid_param",
                error: "Invalid lifecycle notification".to_string(),
            }));
            return;
        }
    };

    let (Ok(provider), Ok(crm)) = (get_db_from_depot(depot), get_crm_from_depot(depot)) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    let mut conn = match provider.get_connection().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = ?e, "Failed to get database connection");
            res.status_code(StatusCode::SERVICE_UNAVAILABLE);
            return;
        }
    };

    match handle(&mut conn, &crm, &event).await {
        Ok(()) => res.render(Json(serde_json::json!({ "received": true }))),
        Err(e) => {
            error!(
                operation = %event.operation,
                object_name = %event.object_name,
                object_id = event.object_id,
                error = ?e,
                "Lifecycle handling failed"
            );
            render_service_error(res, &e);
        }
    }
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path(HOOKS_ROUTE_COMPONENT).push(Router::with_path("crm").post(crm_hook_handler))
}
