//! Mapping API service functions.
//!
//! The write path validates input, enriches it from the content store
//! and the CRM, decides between insert and update, and routes the
//! resolved parameters through the extension points before persistence.
//! Reads go straight to the query layer; they have no policy of their
//! own.

use crate::content::ContentClient;
use crate::crm::CrmClient;
use crate::error::{ServiceError, ServiceResult};
use crate::extensions::{DeleteParams, Extensions, WriteParams};
use waypost_db::db::connection::DbConnection;
use waypost_db::db::enums::PageType;
use waypost_db::db::query;
use waypost_db::error::DbError;
use waypost_db::model::redirect::{NewRedirect, Redirect, RedirectChangeset};

/// A create-or-update request, before enrichment. `id` present means
/// update; absent means create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub id: Option<i32>,
    pub entity_id: i64,
    pub page_type: PageType,
    pub post_id: i64,
    pub is_active: Option<bool>,
}

/// The decision the create-or-update handler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlan {
    /// An `id` was supplied; update that row.
    Update(i32),
    /// No `id` and no existing row; insert.
    Insert,
    /// No `id` but a mapping already exists for this entity. Rejected so
    /// duplicates are never created silently.
    Conflict,
}

/// ## Summary
/// Decides between insert, update, and rejection. An explicit `id`
/// always means update; creates are rejected when a mapping for the
/// same `(entity_id, page_type)` already exists.
#[must_use]
pub const fn plan_write(id: Option<i32>, existing: Option<&Redirect>) -> WritePlan {
    match (id, existing) {
        (Some(id), _) => WritePlan::Update(id),
        (None, Some(_)) => WritePlan::Conflict,
        (None, None) => WritePlan::Insert,
    }
}

const CONFLICT_MESSAGE: &str =
    "Only one redirect per contribution page/event; send the mapping id to update it";

/// A unique-index collision is a client-caused conflict on every write
/// path, including an update that re-keys onto another row's entity.
fn duplicate_to_conflict(err: DbError) -> ServiceError {
    match err {
        DbError::Duplicate { .. } => ServiceError::Conflict(CONFLICT_MESSAGE.to_string()),
        other => other.into(),
    }
}

/// ## Summary
/// Creates or updates a mapping. Fills `post_type`/`post_title` from the
/// content store and `page_title` from the CRM before persisting; both
/// lookups abort the write on failure, so it is never partially applied.
/// Returns the post-write row, or `None` when an update targeted a
/// missing id.
///
/// ## Errors
/// - [`ServiceError::ValidationError`] for an unknown content id
/// - [`ServiceError::CrmError`] carrying the upstream message
/// - [`ServiceError::Conflict`] for a duplicate create, or an update
///   that would re-key onto another mapping's entity
#[tracing::instrument(skip(conn, crm, content, extensions, request), fields(
    entity_id = request.entity_id,
    page_type = %request.page_type,
    post_id = request.post_id,
))]
pub async fn create_or_update(
    conn: &mut DbConnection<'_>,
    crm: &CrmClient,
    content: &ContentClient,
    extensions: &Extensions,
    request: WriteRequest,
) -> ServiceResult<Option<Redirect>> {
    let item = content.lookup(request.post_id).await?.ok_or_else(|| {
        ServiceError::ValidationError(format!("Unknown content id {}", request.post_id))
    })?;

    let page_title = crm
        .entity_title(request.page_type, request.entity_id)
        .await?;

    let existing = query::redirect::get_by_entity(
        conn,
        request.entity_id,
        Some(request.page_type),
    )
    .await?;

    let params = WriteParams {
        id: request.id,
        entity_id: request.entity_id,
        page_type: request.page_type,
        page_title,
        post_id: item.id,
        post_type: item.kind,
        post_title: item.title,
        is_active: request.is_active.unwrap_or(false),
    };

    match plan_write(request.id, existing.as_ref()) {
        WritePlan::Conflict => Err(ServiceError::Conflict(CONFLICT_MESSAGE.to_string())),
        WritePlan::Update(id) => {
            let params = extensions.apply_before_update(params);
            let changes = RedirectChangeset {
                entity_id: Some(params.entity_id),
                page_type: Some(params.page_type),
                page_title: Some(params.page_title),
                post_id: Some(params.post_id),
                post_type: Some(params.post_type),
                post_title: Some(params.post_title),
                is_active: request.is_active.map(|_| params.is_active),
            };

            query::redirect::update(conn, id, changes)
                .await
                .map_err(duplicate_to_conflict)
        }
        WritePlan::Insert => {
            let params = extensions.apply_before_insert(params);
            let new = NewRedirect {
                entity_id: params.entity_id,
                page_type: params.page_type,
                page_title: params.page_title,
                post_id: params.post_id,
                post_type: params.post_type,
                post_title: params.post_title,
                is_active: params.is_active,
            };

            // Lost a create race; the unique index is authoritative.
            match query::redirect::insert(conn, new).await {
                Ok(row) => Ok(Some(row)),
                Err(err) => Err(duplicate_to_conflict(err)),
            }
        }
    }
}

/// ## Summary
/// Deletes a mapping by id after routing the parameters through the
/// `before_delete` extension point. Returns the deleted-row count; zero
/// means nothing matched.
///
/// ## Errors
/// Returns an error only on database failure.
#[tracing::instrument(skip(conn, extensions))]
pub async fn delete(
    conn: &mut DbConnection<'_>,
    extensions: &Extensions,
    id: i32,
) -> ServiceResult<usize> {
    let params = extensions.apply_before_delete(DeleteParams { id });

    Ok(query::redirect::delete_by_id(conn, params.id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_db::db::enums::PostType;

    fn existing_row() -> Redirect {
        Redirect {
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
    fn id_always_means_update() {
        assert_eq!(plan_write(Some(3), None), WritePlan::Update(3));
        assert_eq!(
            plan_write(Some(3), Some(&existing_row())),
            WritePlan::Update(3)
        );
    }

    #[test]
    fn create_over_existing_mapping_is_rejected() {
        assert_eq!(plan_write(None, Some(&existing_row())), WritePlan::Conflict);
    }

    #[test]
    fn create_without_existing_mapping_inserts() {
        assert_eq!(plan_write(None, None), WritePlan::Insert);
    }

    #[test]
    fn update_collision_is_a_conflict_not_an_internal_error() {
        let err = duplicate_to_conflict(DbError::Duplicate {
            entity_id: 42,
            page_type: "event".to_string(),
        });

        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn other_db_errors_pass_through_unchanged() {
        let err = duplicate_to_conflict(DbError::CoreError(
            waypost_core::error::CoreError::ParseError("bad row".to_string()),
        ));

        assert!(matches!(err, ServiceError::DatabaseError(_)));
    }
}
