//! CRM REST API client.
//!
//! Speaks the CiviCRM v3 REST protocol: form-encoded `entity`, `action`,
//! `json` parameters plus the `api_key`/`key` pair, answered by an
//! envelope of `{is_error, error_message, count, values}`. Used for the
//! entity title lookups behind the mapping write path, the template
//! lookup in the lifecycle synchronizer, and the generic passthrough
//! endpoint.

use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};
use waypost_core::config::CrmConfig;
use waypost_db::db::enums::PageType;

#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    site_key: String,
}

/// An event template row returned by `Event.get {is_template: 1}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmEventTemplate {
    pub id: i64,
    pub title: Option<String>,
}

impl CrmClient {
    #[must_use]
    pub fn new(config: &CrmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            site_key: config.site_key.clone(),
        }
    }

    /// ## Summary
    /// Performs a raw CRM API call and returns the response envelope
    /// unchanged, for the passthrough endpoint.
    ///
    /// ## Errors
    /// Returns [`ServiceError::CrmError`] carrying the upstream message
    /// when the CRM reports `is_error`, or an HTTP error on transport
    /// failure.
    #[tracing::instrument(skip(self, params))]
    pub async fn call(&self, entity: &str, action: &str, params: &Value) -> ServiceResult<Value> {
        let response = self
            .http
            .post(&self.api_url)
            .form(&[
                ("entity", entity),
                ("action", action),
                ("json", &params.to_string()),
                ("api_key", &self.api_key),
                ("key", &self.site_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        if is_error(&response) {
            let message = response
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown CRM error")
                .to_string();
            return Err(ServiceError::CrmError(message));
        }

        Ok(response)
    }

    /// ## Summary
    /// Fetches the title of a CRM entity via `getsingle`.
    ///
    /// ## Errors
    /// Returns [`ServiceError::CrmError`] when the entity does not exist
    /// or the CRM call fails.
    #[tracing::instrument(skip(self))]
    pub async fn entity_title(&self, page_type: PageType, entity_id: i64) -> ServiceResult<String> {
        let response = self
            .call(
                page_type.crm_entity(),
                "getsingle",
                &serde_json::json!({ "id": entity_id, "return": "title" }),
            )
            .await?;

        response
            .get("title")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                ServiceError::CrmError(format!(
                    "No title for {} {entity_id}",
                    page_type.crm_entity()
                ))
            })
    }

    /// ## Summary
    /// Looks up event templates by exact title. The caller decides what
    /// to do with zero or several matches; the lifecycle synchronizer
    /// only acts on exactly one.
    ///
    /// ## Errors
    /// Returns an error when the CRM call fails.
    #[tracing::instrument(skip(self))]
    pub async fn find_event_templates(
        &self,
        template_title: &str,
    ) -> ServiceResult<Vec<CrmEventTemplate>> {
        let response = self
            .call(
                "Event",
                "get",
                &serde_json::json!({ "is_template": 1, "template_title": template_title }),
            )
            .await?;

        Ok(parse_template_values(response.get("values")))
    }
}

fn is_error(response: &Value) -> bool {
    match response.get("is_error") {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "1",
        _ => false,
    }
}

/// The CRM returns `values` either as an array or as an object keyed by
/// id, and ids either as numbers or numeric strings.
fn parse_template_values(values: Option<&Value>) -> Vec<CrmEventTemplate> {
    let rows: Vec<&Value> = match values {
        Some(Value::Array(rows)) => rows.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|row| {
            let id = json_i64(row.get("id")?)?;
            let title = row
                .get("title")
                .or_else(|| row.get("template_title"))
                .and_then(Value::as_str)
                .map(ToString::to_string);
            Some(CrmEventTemplate { id, title })
        })
        .collect()
}

fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_detected_in_all_shapes() {
        assert!(is_error(&serde_json::json!({ "is_error": 1 })));
        assert!(is_error(&serde_json::json!({ "is_error": "1" })));
        assert!(is_error(&serde_json::json!({ "is_error": true })));
        assert!(!is_error(&serde_json::json!({ "is_error": 0 })));
        assert!(!is_error(&serde_json::json!({ "count": 3 })));
    }

    #[test]
    fn template_values_parse_keyed_object() {
        let values = serde_json::json!({
            "7": { "id": "7", "title": "Annual Gala" },
            "9": { "id": 9, "template_title": "Workshop" }
        });

        let mut templates = parse_template_values(Some(&values));
        templates.sort_by_key(|t| t.id);

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].id, 7);
        assert_eq!(templates[0].title.as_deref(), Some("Annual Gala"));
        assert_eq!(templates[1].id, 9);
        assert_eq!(templates[1].title.as_deref(), Some("Workshop"));
    }

    #[test]
    fn template_values_parse_array() {
        let values = serde_json::json!([{ "id": 12, "title": "Gala" }]);

        let templates = parse_template_values(Some(&values));

        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].id, 12);
    }

    #[test]
    fn template_values_missing_is_empty() {
        assert!(parse_template_values(None).is_empty());
        assert!(parse_template_values(Some(&Value::Null)).is_empty());
    }
}
