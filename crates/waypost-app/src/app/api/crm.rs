use salvo::{Depot, Request, Response, Router, handler, http::StatusCode, writing::Json};
use serde_json::Value;
use tracing::error;

use crate::config::get_config_from_depot;
use crate::context::get_crm_from_depot;
use crate::error::{ErrorResponse, render_service_error};
use waypost_core::constants::CRM_ROUTE_COMPONENT;
use waypost_service::auth::require_capability;

/// The pieces of a CRM call extracted from either the query string or a
/// JSON body. `json` may arrive as an object or as a string holding
/// serialized JSON, both of which the CRM protocol permits.
#[derive(Debug)]
struct CrmCall {
    entity: String,
    action: String,
    params: Value,
}

fn call_from_query(req: &Request) -> Option<CrmCall> {
    let entity = req.query::<String>("entity")?;
    let action = req.query::<String>("action")?;
    let params = req
        .query::<String>("json")
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));

    Some(CrmCall {
        entity,
        action,
        params,
    })
}

fn call_from_body(body: &Value) -> Option<CrmCall> {
    let entity = body.get("entity")?.as_str()?.to_string();
    let action = body.get("action")?.as_str()?.to_string();
    let params = match body.get("json") {
        None => Value::Object(serde_json::Map::new()),
        Some(Value::String(raw)) => serde_json::from_str(raw).ok()?,
        Some(other) => other.clone(),
    };

    Some(CrmCall {
        entity,
        action,
        params,
    })
}

/// ## Summary
/// Generic CRM API passthrough: any verb, `entity`/`action`/`json`
/// taken from the query string or the JSON body, response envelope
/// forwarded unchanged. Capability-gated.
///
/// ## Errors
/// Returns HTTP 401/403 on capability failure, 400 when the call cannot
/// be assembled or the CRM reports an error.
#[handler]
async fn crm_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Ok(config) = get_config_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    if let Err(e) = require_capability(depot, &config.permissions.crm) {
        render_service_error(res, &e);
        return;
    }

    let call = match call_from_query(req) {
        Some(call) => Some(call),
        None => req
            .parse_json::<Value>()
            .await
            .ok()
            .as_ref()
            .and_then(call_from_body),
    };

    let Some(call) = call else {
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(ErrorResponse {
            code: "rest_invalid_param",
            error: "entity and action are required".to_string(),
        }));
        return;
    };

    let Ok(crm) = get_crm_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    match crm.call(&call.entity, &call.action, &call.params).await {
        Ok(envelope) => res.render(Json(envelope)),
        Err(e) => {
            error!(entity = %call.entity, action = %call.action, error = ?e, "CRM call failed");
            render_service_error(res, &e);
        }
    }
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path(CRM_ROUTE_COMPONENT).goal(crm_handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_call_accepts_json_object() {
        let body = serde_json::json!({
            "entity": "Contact",
            "action": "get",
            "json": { "id": 12 }
        });

        let call = call_from_body(&body).unwrap();

        assert_eq!(call.entity, "Contact");
        assert_eq!(call.action, "get");
        assert_eq!(call.params, serde_json::json!({ "id": 12 }));
    }

    #[test]
    fn body_call_accepts_serialized_json_string() {
        let body = serde_json::json!({
            "entity": "Event",
            "action": "get",
            "json": "{\"is_template\": 1}"
        });

        let call = call_from_body(&body).unwrap();

        assert_eq!(call.params, serde_json::json!({ "is_template": 1 }));
    }

    #[test]
    fn body_call_defaults_params_when_json_missing() {
        let body = serde_json::json!({ "entity": "Contact", "action": "get" });

        let call = call_from_body(&body).unwrap();

        assert_eq!(call.params, serde_json::json!({}));
    }

    #[test]
    fn body_call_requires_entity_and_action() {
        assert!(call_from_body(&serde_json::json!({ "entity": "Contact" })).is_none());
        assert!(call_from_body(&serde_json::json!({ "action": "get" })).is_none());
    }
}
