//! Query layer for the `redirect` table.
//!
//! Absence is a normal outcome on every read path: lookups return
//! `Option`/empty `Vec`, deletes return a row count. Writes return the
//! freshly-read row so callers observe exactly what was persisted,
//! including defaults.

use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::db::connection::DbConnection;
use crate::db::enums::PageType;
use crate::db::schema;
use crate::error::{DbError, DbResult};
use crate::model::redirect::{NewRedirect, Redirect, RedirectChangeset};

impl RedirectChangeset {
    /// Whether the changeset carries no field at all. Diesel rejects an
    /// `UPDATE` with an empty `SET` clause, so empty changesets are
    /// answered with a plain read instead.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entity_id.is_none()
            && self.page_type.is_none()
            && self.page_title.is_none()
            && self.post_id.is_none()
            && self.post_type.is_none()
            && self.post_title.is_none()
            && self.is_active.is_none()
    }
}

/// ## Summary
/// Inserts a new mapping and returns the persisted row.
///
/// ## Errors
/// Returns [`DbError::Duplicate`] when a mapping already exists for the
/// same `(entity_id, page_type)` pair; other database failures pass
/// through.
#[tracing::instrument(skip(conn, new), fields(entity_id = new.entity_id, page_type = %new.page_type))]
pub async fn insert(conn: &mut DbConnection<'_>, new: NewRedirect) -> DbResult<Redirect> {
    diesel::insert_into(schema::redirect::table)
        .values(&new)
        .returning(Redirect::as_select())
        .get_result(conn)
        .await
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => DbError::Duplicate {
                entity_id: new.entity_id,
                page_type: new.page_type.to_string(),
            },
            other => other.into(),
        })
}

/// ## Summary
/// Applies a partial update keyed by the immutable `id` and returns the
/// post-write row, or `None` if no row has that id.
///
/// ## Errors
/// Returns [`DbError::Duplicate`] when the update would collide with
/// another mapping's `(entity_id, page_type)` pair.
#[tracing::instrument(skip(conn, changes))]
pub async fn update(
    conn: &mut DbConnection<'_>,
    id: i32,
    changes: RedirectChangeset,
) -> DbResult<Option<Redirect>> {
    if changes.is_empty() {
        return get_by_id(conn, id).await;
    }

    let result = diesel::update(schema::redirect::table.filter(schema::redirect::id.eq(id)))
        .set(&changes)
        .returning(Redirect::as_select())
        .get_result(conn)
        .await
        .optional();

    match result {
        Ok(row) => Ok(row),
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => Err(DbError::Duplicate {
            entity_id: changes.entity_id.unwrap_or_default(),
            page_type: changes
                .page_type
                .map(|t| t.to_string())
                .unwrap_or_default(),
        }),
        Err(other) => Err(other.into()),
    }
}

/// ## Summary
/// Fetches a mapping by its id.
///
/// ## Errors
/// Returns an error only on database failure; a missing row is `None`.
#[tracing::instrument(skip(conn))]
pub async fn get_by_id(conn: &mut DbConnection<'_>, id: i32) -> DbResult<Option<Redirect>> {
    let row = schema::redirect::table
        .filter(schema::redirect::id.eq(id))
        .select(Redirect::as_select())
        .first::<Redirect>(conn)
        .await
        .optional()?;

    Ok(row)
}

/// ## Summary
/// Fetches a mapping by CRM entity id. Without a `page_type` this
/// returns any mapping for that entity id; with one it is an exact-match
/// filter. Callers needing uniqueness must always pass the type.
///
/// ## Errors
/// Returns an error only on database failure; a missing row is `None`.
#[tracing::instrument(skip(conn))]
pub async fn get_by_entity(
    conn: &mut DbConnection<'_>,
    entity_id: i64,
    page_type: Option<PageType>,
) -> DbResult<Option<Redirect>> {
    let base = schema::redirect::table.filter(schema::redirect::entity_id.eq(entity_id));

    let row = match page_type {
        Some(page_type) => {
            base.filter(schema::redirect::page_type.eq(page_type))
                .select(Redirect::as_select())
                .first::<Redirect>(conn)
                .await
                .optional()?
        }
        None => {
            base.select(Redirect::as_select())
                .first::<Redirect>(conn)
                .await
                .optional()?
        }
    };

    Ok(row)
}

/// ## Summary
/// Returns all mappings.
///
/// ## Errors
/// Returns an error only on database failure.
#[tracing::instrument(skip(conn))]
pub async fn get_all(conn: &mut DbConnection<'_>) -> DbResult<Vec<Redirect>> {
    let rows = schema::redirect::table
        .select(Redirect::as_select())
        .load::<Redirect>(conn)
        .await?;

    Ok(rows)
}

/// ## Summary
/// Deletes a mapping by id, returning the number of deleted rows. Zero
/// is a normal outcome.
///
/// ## Errors
/// Returns an error only on database failure.
#[tracing::instrument(skip(conn))]
pub async fn delete_by_id(conn: &mut DbConnection<'_>, id: i32) -> DbResult<usize> {
    let count = diesel::delete(schema::redirect::table.filter(schema::redirect::id.eq(id)))
        .execute(conn)
        .await?;

    Ok(count)
}

/// ## Summary
/// Deletes the mapping for a CRM entity, returning the number of deleted
/// rows. Zero is a normal outcome.
///
/// ## Errors
/// Returns an error only on database failure.
#[tracing::instrument(skip(conn))]
pub async fn delete_for_entity(
    conn: &mut DbConnection<'_>,
    entity_id: i64,
    page_type: PageType,
) -> DbResult<usize> {
    let count = diesel::delete(
        schema::redirect::table
            .filter(schema::redirect::entity_id.eq(entity_id))
            .filter(schema::redirect::page_type.eq(page_type)),
    )
    .execute(conn)
    .await?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use crate::db::enums::PageType;
    use crate::model::redirect::RedirectChangeset;

    #[test]
    fn empty_changeset_is_detected() {
        assert!(RedirectChangeset::default().is_empty());
    }

    #[test]
    fn changeset_with_any_field_is_not_empty() {
        let changes = RedirectChangeset {
            is_active: Some(true),
            ..RedirectChangeset::default()
        };
        assert!(!changes.is_empty());

        let changes = RedirectChangeset {
            page_type: Some(PageType::Event),
            ..RedirectChangeset::default()
        };
        assert!(!changes.is_empty());
    }
}
