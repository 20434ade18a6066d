//! Lifecycle synchronizer.
//!
//! Keeps mappings consistent with CRM entity lifecycle signals without
//! administrator intervention: an event created from a template inherits
//! the template's redirect, and deleting an event removes its mapping so
//! nothing points at a nonexistent entity. Both reactions hit the store
//! directly - no REST hop - and treat missing templates or mappings as
//! expected no-ops.

use serde::Deserialize;

use crate::crm::CrmClient;
use crate::error::ServiceResult;
use waypost_db::db::connection::DbConnection;
use waypost_db::db::enums::PageType;
use waypost_db::db::query;
use waypost_db::error::DbError;
use waypost_db::model::redirect::{NewRedirect, Redirect};

/// A CRM entity lifecycle signal, as delivered by the webhook endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CrmLifecycleEvent {
    pub operation: String,
    pub object_name: String,
    pub object_id: i64,
    #[serde(default)]
    pub object: serde_json::Value,
}

/// The template-copy work extracted from a creation signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateCopy {
    pub event_id: i64,
    pub event_title: String,
    pub template_title: String,
}

#[derive(Debug, Default, Deserialize)]
struct EventObject {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    template_title: Option<String>,
}

/// ## Summary
/// Extracts a template-copy request from a lifecycle signal: only event
/// creations that name a source template qualify.
#[must_use]
pub fn wants_template_copy(event: &CrmLifecycleEvent) -> Option<TemplateCopy> {
    if event.operation != "create" || event.object_name != "Event" {
        return None;
    }

    let object: EventObject = serde_json::from_value(event.object.clone()).unwrap_or_default();

    let template_title = object.template_title.filter(|t| !t.is_empty())?;

    Some(TemplateCopy {
        event_id: event.object_id,
        event_title: object.title.unwrap_or_default(),
        template_title,
    })
}

/// ## Summary
/// Extracts the entity id of a deleted event, if the signal is an event
/// deletion.
#[must_use]
pub fn wants_delete(event: &CrmLifecycleEvent) -> Option<i64> {
    (event.operation == "delete" && event.object_name == "Event").then_some(event.object_id)
}

/// ## Summary
/// Copies a template's mapping to a newly created event: retitled to the
/// new event, re-keyed to the new entity id, the old `id` dropped so the
/// store assigns a fresh one. The source mapping is untouched.
#[must_use]
pub fn copy_for_event(source: &Redirect, event_id: i64, event_title: &str) -> NewRedirect {
    NewRedirect {
        entity_id: event_id,
        page_type: source.page_type,
        page_title: event_title.to_string(),
        post_id: source.post_id,
        post_type: source.post_type,
        post_title: source.post_title.clone(),
        is_active: source.is_active,
    }
}

/// ## Summary
/// Reacts to one lifecycle signal. Signals that match neither reaction
/// are ignored.
///
/// ## Errors
/// Returns an error on store or CRM failure; expected no-ops (no
/// template, ambiguous template, no mapping) are success.
#[tracing::instrument(skip(conn, crm, event), fields(
    operation = %event.operation,
    object_name = %event.object_name,
    object_id = event.object_id,
))]
pub async fn handle(
    conn: &mut DbConnection<'_>,
    crm: &CrmClient,
    event: &CrmLifecycleEvent,
) -> ServiceResult<()> {
    if let Some(copy) = wants_template_copy(event) {
        return copy_from_template(conn, crm, &copy).await;
    }

    if let Some(event_id) = wants_delete(event) {
        return delete_for_event(conn, event_id).await;
    }

    tracing::trace!("Lifecycle signal matched no reaction");
    Ok(())
}

async fn copy_from_template(
    conn: &mut DbConnection<'_>,
    crm: &CrmClient,
    copy: &TemplateCopy,
) -> ServiceResult<()> {
    let templates = crm.find_event_templates(&copy.template_title).await?;

    // Ambiguous or absent template: deliberately conservative no-op.
    if templates.len() != 1 {
        tracing::debug!(
            template_title = %copy.template_title,
            count = templates.len(),
            "Template lookup not unique, skipping redirect inheritance"
        );
        return Ok(());
    }

    let Some(source) =
        query::redirect::get_by_entity(conn, templates[0].id, Some(PageType::Event)).await?
    else {
        tracing::debug!(
            template_id = templates[0].id,
            "Template has no mapping, nothing to inherit"
        );
        return Ok(());
    };

    let new = copy_for_event(&source, copy.event_id, &copy.event_title);

    match query::redirect::insert(conn, new).await {
        Ok(row) => {
            tracing::info!(
                mapping_id = row.id,
                event_id = copy.event_id,
                template_id = templates[0].id,
                "Inherited redirect from template"
            );
            Ok(())
        }
        // The new event already has a mapping; inheritance loses.
        Err(DbError::Duplicate { .. }) => {
            tracing::debug!(event_id = copy.event_id, "Event already mapped, skipping");
            Ok(())
        }
        Err(other) => Err(other.into()),
    }
}

async fn delete_for_event(conn: &mut DbConnection<'_>, event_id: i64) -> ServiceResult<()> {
    let deleted = query::redirect::delete_for_entity(conn, event_id, PageType::Event).await?;

    if deleted == 0 {
        tracing::trace!(event_id, "Deleted event had no mapping");
    } else {
        tracing::info!(event_id, "Removed mapping for deleted event");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use waypost_db::db::enums::PostType;

    fn creation_event(object: serde_json::Value) -> CrmLifecycleEvent {
        CrmLifecycleEvent {
            operation: "create".to_string(),
            object_name: "Event".to_string(),
            object_id: 55,
            object,
        }
    }

    #[test_log::test]
    fn template_copy_requires_create_event_with_template_title() {
        let event = creation_event(serde_json::json!({
            "title": "Spring Gala",
            "template_title": "Gala Template"
        }));

        let copy = wants_template_copy(&event).unwrap();
        assert_eq!(copy.event_id, 55);
        assert_eq!(copy.event_title, "Spring Gala");
        assert_eq!(copy.template_title, "Gala Template");
    }

    #[test]
    fn plain_event_creation_is_ignored() {
        let event = creation_event(serde_json::json!({ "title": "Ad-hoc" }));
        assert_eq!(wants_template_copy(&event), None);

        let event = creation_event(serde_json::json!({ "template_title": "" }));
        assert_eq!(wants_template_copy(&event), None);
    }

    #[test]
    fn non_event_signals_are_ignored() {
        let mut event = creation_event(serde_json::json!({ "template_title": "T" }));
        event.object_name = "Contact".to_string();
        assert_eq!(wants_template_copy(&event), None);

        event.object_name = "Event".to_string();
        event.operation = "edit".to_string();
        assert_eq!(wants_template_copy(&event), None);
    }

    #[test]
    fn delete_reacts_only_to_event_deletion() {
        let event = CrmLifecycleEvent {
            operation: "delete".to_string(),
            object_name: "Event".to_string(),
            object_id: 42,
            object: serde_json::Value::Null,
        };
        assert_eq!(wants_delete(&event), Some(42));

        let mut other = event.clone();
        other.object_name = "ContributionPage".to_string();
        assert_eq!(wants_delete(&other), None);

        let mut other = event;
        other.operation = "create".to_string();
        assert_eq!(wants_delete(&other), None);
    }

    #[test]
    fn copy_rekeys_and_retitles_without_id() {
        let source = Redirect {
            id: 3,
            entity_id: 40,
            page_type: PageType::Event,
            page_title: "Gala Template".to_string(),
            post_id: 7,
            post_type: PostType::Page,
            post_title: "Landing".to_string(),
            is_active: true,
        };

        let new = copy_for_event(&source, 55, "Spring Gala");

        assert_eq!(new.entity_id, 55);
        assert_eq!(new.page_title, "Spring Gala");
        assert_eq!(new.post_id, source.post_id);
        assert_eq!(new.post_type, source.post_type);
        assert_eq!(new.post_title, source.post_title);
        assert_eq!(new.is_active, source.is_active);
        // Untouched source keeps its identity and entity.
        assert_eq!(source.id, 3);
        assert_eq!(source.entity_id, 40);
    }
}
