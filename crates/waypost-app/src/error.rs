use salvo::http::StatusCode;
use salvo::writing::Json;
use thiserror::Error;

use waypost_service::error::ServiceError;

/// Application-level errors (HTTP layer)
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    ServiceError(#[from] waypost_service::error::ServiceError),

    #[error(transparent)]
    DatabaseError(#[from] waypost_db::error::DbError),

    #[error(transparent)]
    CoreError(#[from] waypost_core::error::CoreError),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Error response payload
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
}

/// ## Summary
/// Renders a service error with the status code the error taxonomy
/// dictates: 400 for validation and upstream CRM failures, 401/403 for
/// authorization (anonymous vs authenticated), 409 for duplicate
/// creates, 500 otherwise.
pub fn render_service_error(res: &mut salvo::Response, err: &ServiceError) {
    let (status, code) = match err {
        ServiceError::ValidationError(_) => (StatusCode::BAD_REQUEST, "rest_invalid_param"),
        ServiceError::CrmError(_) => (StatusCode::BAD_REQUEST, "crm_api_error"),
        ServiceError::Conflict(_) => (StatusCode::CONFLICT, "rest_create_error"),
        ServiceError::NotAuthenticated => (StatusCode::UNAUTHORIZED, "rest_forbidden"),
        ServiceError::AuthorizationError(_) => (StatusCode::FORBIDDEN, "rest_forbidden"),
        ServiceError::DatabaseError(_)
        | ServiceError::CoreError(_)
        | ServiceError::HttpError(_)
        | ServiceError::InvalidConfiguration(_) => {
            tracing::error!(error = ?err, "Internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    res.status_code(status);
    res.render(Json(ErrorResponse {
        code,
        error: err.to_string(),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn status_mapping_follows_taxonomy() {
        let mut res = salvo::Response::new();
        render_service_error(
            &mut res,
            &ServiceError::ValidationError("missing entity_id".to_string()),
        );
        assert_eq!(res.status_code, Some(StatusCode::BAD_REQUEST));

        let mut res = salvo::Response::new();
        render_service_error(&mut res, &ServiceError::Conflict("duplicate".to_string()));
        assert_eq!(res.status_code, Some(StatusCode::CONFLICT));

        let mut res = salvo::Response::new();
        render_service_error(&mut res, &ServiceError::NotAuthenticated);
        assert_eq!(res.status_code, Some(StatusCode::UNAUTHORIZED));

        let mut res = salvo::Response::new();
        render_service_error(
            &mut res,
            &ServiceError::AuthorizationError("no capability".to_string()),
        );
        assert_eq!(res.status_code, Some(StatusCode::FORBIDDEN));
    }
}
