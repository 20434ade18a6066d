use salvo::{Depot, Request, Response, Router, handler, http::StatusCode, writing::Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::get_config_from_depot;
use crate::context::{get_content_from_depot, get_crm_from_depot, get_extensions_from_depot};
use crate::db_handler::get_db_from_depot;
use crate::error::{ErrorResponse, render_service_error};
use waypost_core::constants::REDIRECT_ROUTE_COMPONENT;
use waypost_db::db::enums::{PageType, PostType};
use waypost_db::db::query;
use waypost_db::model::redirect::Redirect;
use waypost_service::auth::require_capability;
use waypost_service::redirect::{WriteRequest, create_or_update, delete};

/// ## Summary
/// The serialization contract for a mapping: exactly the documented
/// schema fields, applied at the API boundary independent of the storage
/// representation. Unknown/internal fields are never emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedirectRecord {
    pub id: i32,
    pub entity_id: i64,
    pub page_type: PageType,
    pub page_title: String,
    pub post_id: i64,
    pub post_type: PostType,
    pub post_title: String,
    pub is_active: bool,
}

impl From<Redirect> for RedirectRecord {
    fn from(row: Redirect) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            page_type: row.page_type,
            page_title: row.page_title,
            post_id: row.post_id,
            post_type: row.post_type,
            post_title: row.post_title,
            is_active: row.is_active,
        }
    }
}

/// ## Summary
/// Create-or-update request payload. `id` present means update. The
/// server fills `post_type`/`post_title`/`page_title` itself; they are
/// not accepted as input. `is_active` accepts a JSON boolean or 0|1.
#[derive(Debug, Deserialize)]
pub struct WriteBody {
    pub id: Option<i32>,
    pub entity_id: i64,
    pub page_type: PageType,
    pub post_id: i64,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_active: Option<bool>,
}

/// ## Summary
/// Delete request payload
#[derive(Debug, Deserialize)]
pub struct DeleteBody {
    pub id: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Str(String),
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(0)) => Ok(Some(false)),
        Some(Flag::Int(1)) => Ok(Some(true)),
        Some(Flag::Int(other)) => {
            Err(D::Error::custom(format!("is_active must be 0|1, got {other}")))
        }
        Some(Flag::Str(s)) => match s.as_str() {
            "0" => Ok(Some(false)),
            "1" => Ok(Some(true)),
            other => Err(D::Error::custom(format!("is_active must be 0|1, got {other}"))),
        },
    }
}

/// ## Summary
/// GET /api/v2/r - list all mappings. Public read; each row passes
/// through the [`RedirectRecord`] allow-list.
#[handler]
async fn list_handler(depot: &mut Depot, res: &mut Response) {
    let Ok(provider) = get_db_from_depot(depot) else {
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

    match query::redirect::get_all(&mut conn).await {
        Ok(rows) => {
            let records: Vec<RedirectRecord> = rows.into_iter().map(Into::into).collect();
            res.render(Json(records));
        }
        Err(e) => {
            error!(error = ?e, "Failed to list mappings");
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
            res.render(Json(ErrorResponse {
                code: "internal_error",
                error: "Failed to list mappings".to_string(),
            }));
        }
    }
}

/// ## Summary
/// GET /api/v2/r/`<id>` - fetch one mapping by id. Public read; an
/// absent mapping is an empty result, not an error.
#[handler]
async fn get_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(id) = req.param::<i32>("id") else {
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(ErrorResponse {
            code: "rest_invalid_param",
            error: "Mapping id required".to_string(),
        }));
        return;
    };

    let Ok(provider) = get_db_from_depot(depot) else {
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

    match query::redirect::get_by_id(&mut conn, id).await {
        Ok(Some(row)) => res.render(Json(RedirectRecord::from(row))),
        Ok(None) => res.render(Json(Vec::<RedirectRecord>::new())),
        Err(e) => {
            error!(error = ?e, "Failed to fetch mapping");
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

/// ## Summary
/// GET /api/v2/r/entity/`<entity_id>` - fetch the mapping for a CRM
/// entity, optionally filtered by `page_type`. Public read; an absent
/// mapping is an empty result.
#[handler]
async fn get_by_entity_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Some(entity_id) = req.param::<i64>("entity_id") else {
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(ErrorResponse {
            code: "rest_invalid_param",
            error: "Entity id required".to_string(),
        }));
        return;
    };

    let page_type = match req.query::<String>("page_type") {
        None => None,
        Some(raw) => match raw.as_str() {
            "event" => Some(PageType::Event),
            "contribution_page" => Some(PageType::ContributionPage),
            other => {
                res.status_code(StatusCode::BAD_REQUEST);
                res.render(Json(ErrorResponse {
                    code: "rest_invalid_param",
                    error: format!("Invalid page_type: {other}"),
                }));
                return;
            }
        },
    };

    let Ok(provider) = get_db_from_depot(depot) else {
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

    match query::redirect::get_by_entity(&mut conn, entity_id, page_type).await {
        Ok(Some(row)) => res.render(Json(RedirectRecord::from(row))),
        Ok(None) => res.render(Json(Vec::<RedirectRecord>::new())),
        Err(e) => {
            error!(error = ?e, "Failed to fetch mapping by entity");
            res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

/// ## Summary
/// POST|PATCH /api/v2/r - create or update a mapping, keyed by the
/// presence of `id` in the body. The server enriches the payload from
/// the content store and the CRM before persisting.
///
/// ## Errors
/// Returns HTTP 401/403 on capability failure, 400 on validation or CRM
/// failure, 409 for a duplicate create.
#[handler]
async fn create_or_update_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    tracing::debug!("Processing mapping write request");

    let Ok(config) = get_config_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    if let Err(e) = require_capability(depot, &config.permissions.create) {
        render_service_error(res, &e);
        return;
    }

    let body: WriteBody = match req.parse_json().await {
        Ok(b) => b,
        Err(e) => {
            error!(error = ?e, "Failed to parse mapping write request");
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(ErrorResponse {
                code: "rest_invalid_param",
                error: "Invalid request body".to_string(),
            }));
            return;
        }
    };

    if body.entity_id <= 0 || body.post_id <= 0 {
        res.status_code(StatusCode::BAD_REQUEST);
        res.render(Json(ErrorResponse {
            code: "rest_invalid_param",
            error: "entity_id and post_id must be positive".to_string(),
        }));
        return;
    }

    let (Ok(provider), Ok(crm), Ok(content), Ok(extensions)) = (
        get_db_from_depot(depot),
        get_crm_from_depot(depot),
        get_content_from_depot(depot),
        get_extensions_from_depot(depot),
    ) else {
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

    let request = WriteRequest {
        id: body.id,
        entity_id: body.entity_id,
        page_type: body.page_type,
        post_id: body.post_id,
        is_active: body.is_active,
    };
    let is_update = request.id.is_some();

    match create_or_update(&mut conn, &crm, &content, &extensions, request).await {
        Ok(Some(row)) => {
            tracing::info!(
                mapping_id = row.id,
                entity_id = row.entity_id,
                page_type = %row.page_type,
                "Mapping persisted"
            );

            if !is_update {
                res.status_code(StatusCode::CREATED);
            }
            res.render(Json(RedirectRecord::from(row)));
        }
        // Update aimed at a missing id: empty result, same as reads.
        Ok(None) => res.render(Json(Vec::<RedirectRecord>::new())),
        Err(e) => render_service_error(res, &e),
    }
}

/// ## Summary
/// DELETE /api/v2/r - delete a mapping by id.
///
/// ## Errors
/// Returns HTTP 401/403 on capability failure, 400 on a malformed body.
#[handler]
async fn delete_handler(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let Ok(config) = get_config_from_depot(depot) else {
        res.status_code(StatusCode::INTERNAL_SERVER_ERROR);
        return;
    };

    if let Err(e) = require_capability(depot, &config.permissions.delete) {
        render_service_error(res, &e);
        return;
    }

    let body: DeleteBody = match req.parse_json().await {
        Ok(b) => b,
        Err(e) => {
            error!(error = ?e, "Failed to parse delete request");
            res.status_code(StatusCode::BAD_REQUEST);
            res.render(Json(ErrorResponse {
                code: "rest_invalid_param",
                error: "Mapping id required".to_string(),
            }));
            return;
        }
    };

    let (Ok(provider), Ok(extensions)) =
        (get_db_from_depot(depot), get_extensions_from_depot(depot))
    else {
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

    match delete(&mut conn, &extensions, body.id).await {
        Ok(0) => res.render(Json(Vec::<RedirectRecord>::new())),
        Ok(count) => {
            tracing::info!(mapping_id = body.id, "Mapping deleted");
            res.render(Json(serde_json::json!({ "deleted": count })));
        }
        Err(e) => render_service_error(res, &e),
    }
}

#[must_use]
pub fn routes() -> Router {
    Router::with_path(REDIRECT_ROUTE_COMPONENT)
        .get(list_handler)
        .post(create_or_update_handler)
        .patch(create_or_update_handler)
        .delete(delete_handler)
        .push(Router::with_path("entity/<entity_id>").get(get_by_entity_handler))
        .push(Router::with_path("<id>").get(get_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RedirectRecord {
        RedirectRecord {
            id: 3,
            entity_id: 42,
            page_type: PageType::Event,
            page_title: "Gala".to_string(),
            post_id: 7,
            post_type: PostType::Page,
            post_title: "Landing".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn record_round_trip_preserves_exactly_the_schema_fields() {
        let json = serde_json::to_value(record()).unwrap();

        let keys: std::collections::BTreeSet<&str> =
            json.as_object().unwrap().keys().map(String::as_str).collect();
        let expected: std::collections::BTreeSet<&str> = [
            "id",
            "entity_id",
            "page_type",
            "page_title",
            "post_id",
            "post_type",
            "post_title",
            "is_active",
        ]
        .into();
        assert_eq!(keys, expected);

        let back: RedirectRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn record_rejects_unknown_fields() {
        let mut json = serde_json::to_value(record()).unwrap();
        json.as_object_mut()
            .unwrap()
            .insert("internal".to_string(), serde_json::json!(1));

        assert!(serde_json::from_value::<RedirectRecord>(json).is_err());
    }

    #[test]
    fn write_body_accepts_bool_and_numeric_flags() {
        let body: WriteBody = serde_json::from_str(
            r#"{"entity_id": 42, "page_type": "event", "post_id": 7, "is_active": 1}"#,
        )
        .unwrap();
        assert_eq!(body.is_active, Some(true));

        let body: WriteBody = serde_json::from_str(
            r#"{"entity_id": 42, "page_type": "event", "post_id": 7, "is_active": false}"#,
        )
        .unwrap();
        assert_eq!(body.is_active, Some(false));

        let body: WriteBody =
            serde_json::from_str(r#"{"entity_id": 42, "page_type": "event", "post_id": 7}"#)
                .unwrap();
        assert_eq!(body.is_active, None);
    }

    #[test]
    fn write_body_rejects_out_of_range_flag() {
        let result = serde_json::from_str::<WriteBody>(
            r#"{"entity_id": 42, "page_type": "event", "post_id": 7, "is_active": 2}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn write_body_requires_page_type_enum() {
        let result = serde_json::from_str::<WriteBody>(
            r#"{"entity_id": 42, "page_type": "banana", "post_id": 7}"#,
        );
        assert!(result.is_err());
    }
}
