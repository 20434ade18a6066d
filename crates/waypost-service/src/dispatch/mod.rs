//! Resolution dispatcher.
//!
//! Decides, once per qualifying request, whether the request targets a
//! known CRM entity page and where to send it. The decision steps are
//! pure functions over an explicit [`RequestContext`]; the orchestration
//! in [`resolve`] adds the store and content-store lookups. Every
//! failure mode is a pass-through - the dispatcher never surfaces an
//! error to the visitor.

use url::Url;

use crate::content::ContentClient;
use crate::extensions::{Extensions, TargetContext};
use waypost_core::constants::{CONTRIBUTION_URI_TOKENS, EVENT_URI_TOKENS, STRIPPED_QUERY_KEYS};
use waypost_db::db::connection::DbConnection;
use waypost_db::db::enums::PageType;
use waypost_db::db::query;

/// Explicit per-request input: the CRM-relative path and the ordered
/// query pairs, with no reliance on ambient request state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RequestContext {
    /// The CRM-relative path to classify: the `q` query parameter when
    /// the host routes CRM paths through it, else the URL path.
    #[must_use]
    pub fn crm_path(&self) -> &str {
        self.query
            .iter()
            .find(|(key, _)| key == "q")
            .map_or(self.path.as_str(), |(_, value)| value.as_str())
    }

    /// The `id` query parameter, when present and numeric.
    #[must_use]
    pub fn entity_id(&self) -> Option<i64> {
        self.query
            .iter()
            .find(|(key, _)| key == "id")
            .and_then(|(_, value)| value.parse().ok())
    }
}

/// The dispatcher's terminal action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Not an entity page, or no live mapping; normal host handling.
    PassThrough,
    /// Redirect the visitor and terminate the request.
    Redirect(Url),
}

/// ## Summary
/// Classifies a CRM-relative path. An *event page* iff all of
/// `civicrm/event/register` appear among the path segments, else a
/// *contribution page* iff all of `civicrm/contribute/transact` do.
/// Segment order is irrelevant by design; event is checked first.
#[must_use]
pub fn classify(crm_path: &str) -> Option<PageType> {
    let segments: Vec<&str> = crm_path.split('/').filter(|s| !s.is_empty()).collect();

    if EVENT_URI_TOKENS.iter().all(|t| segments.contains(t)) {
        return Some(PageType::Event);
    }

    if CONTRIBUTION_URI_TOKENS.iter().all(|t| segments.contains(t)) {
        return Some(PageType::ContributionPage);
    }

    None
}

/// ## Summary
/// Builds the destination URL: the target permalink plus the original
/// query pairs, with the denylisted CRM routing keys removed and `id`
/// re-keyed to `<page_type>_id` so it cannot collide with the
/// destination's own routing.
///
/// ## Errors
/// Returns `None` when the permalink is not a valid URL.
#[must_use]
pub fn build_destination(
    permalink: &str,
    query: &[(String, String)],
    page_type: PageType,
) -> Option<Url> {
    let mut url = Url::parse(permalink).ok()?;

    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            if STRIPPED_QUERY_KEYS.contains(&key.as_str()) {
                continue;
            }

            if key == "id" {
                pairs.append_pair(&format!("{}_id", page_type.as_str()), value);
            } else {
                pairs.append_pair(key, value);
            }
        }
    }

    Some(url)
}

/// ## Summary
/// Runs the full resolution state machine for one request. Pass-through
/// is the answer to every miss and every internal failure; a redirect is
/// only produced for an active mapping whose target resolves.
#[tracing::instrument(skip(conn, content, extensions, ctx), fields(path = %ctx.path))]
pub async fn resolve(
    conn: &mut DbConnection<'_>,
    content: &ContentClient,
    extensions: &Extensions,
    ctx: &RequestContext,
) -> Disposition {
    let Some(page_type) = classify(ctx.crm_path()) else {
        return Disposition::PassThrough;
    };

    let Some(entity_id) = ctx.entity_id() else {
        return Disposition::PassThrough;
    };

    let mapping = match query::redirect::get_by_entity(conn, entity_id, Some(page_type)).await {
        Ok(Some(mapping)) => mapping,
        Ok(None) => return Disposition::PassThrough,
        Err(e) => {
            tracing::debug!(error = ?e, "Mapping lookup failed, passing through");
            return Disposition::PassThrough;
        }
    };

    if !mapping.is_active {
        return Disposition::PassThrough;
    }

    let target = extensions.apply_override_target(
        mapping.post_id,
        &TargetContext {
            entity_id,
            page_type,
            query: &ctx.query,
        },
    );

    let item = match content.lookup(target).await {
        Ok(Some(item)) => item,
        Ok(None) => {
            tracing::debug!(target, "Redirect target has no content item, passing through");
            return Disposition::PassThrough;
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Content lookup failed, passing through");
            return Disposition::PassThrough;
        }
    };

    let Some(destination) = build_destination(&item.permalink, &ctx.query, page_type) else {
        tracing::debug!(permalink = %item.permalink, "Unparseable permalink, passing through");
        return Disposition::PassThrough;
    };

    let destination = extensions.apply_rewrite_destination(destination);

    tracing::info!(entity_id, %page_type, %destination, "Redirecting entity page");

    Disposition::Redirect(destination)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn event_path_matches_in_any_order() {
        assert_eq!(classify("civicrm/event/register"), Some(PageType::Event));
        assert_eq!(classify("register/civicrm/event"), Some(PageType::Event));
        assert_eq!(classify("event/register/civicrm"), Some(PageType::Event));
    }

    #[test]
    fn contribution_path_matches_all_three_tokens() {
        assert_eq!(
            classify("civicrm/contribute/transact"),
            Some(PageType::ContributionPage)
        );
        assert_eq!(
            classify("transact/contribute/civicrm"),
            Some(PageType::ContributionPage)
        );
    }

    #[test]
    fn two_of_three_tokens_never_match() {
        assert_eq!(classify("civicrm/event"), None);
        assert_eq!(classify("civicrm/contribute"), None);
        assert_eq!(classify("event/register"), None);
        assert_eq!(classify("civicrm/dashboard"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn extra_segments_do_not_prevent_a_match() {
        assert_eq!(
            classify("civicrm/event/register/extra"),
            Some(PageType::Event)
        );
    }

    #[test]
    fn crm_path_prefers_q_parameter() {
        let ctx = RequestContext {
            path: "/".to_string(),
            query: pairs(&[("q", "civicrm/event/register"), ("id", "42")]),
        };

        assert_eq!(ctx.crm_path(), "civicrm/event/register");
        assert_eq!(ctx.entity_id(), Some(42));
    }

    #[test]
    fn crm_path_falls_back_to_url_path() {
        let ctx = RequestContext {
            path: "/civicrm/contribute/transact".to_string(),
            query: pairs(&[("id", "9")]),
        };

        assert_eq!(classify(ctx.crm_path()), Some(PageType::ContributionPage));
    }

    #[test]
    fn missing_or_malformed_id_is_absent() {
        let ctx = RequestContext {
            path: "/".to_string(),
            query: pairs(&[("q", "civicrm/event/register")]),
        };
        assert_eq!(ctx.entity_id(), None);

        let ctx = RequestContext {
            path: "/".to_string(),
            query: pairs(&[("id", "forty-two")]),
        };
        assert_eq!(ctx.entity_id(), None);
    }

    #[test_log::test]
    fn destination_strips_denylist_and_rekeys_id() {
        let query = pairs(&[
            ("page", "CiviCRM"),
            ("q", "civicrm/event/register"),
            ("reset", "1"),
            ("noheader", "1"),
            ("civiwp", "CiviCRM"),
            ("id", "42"),
            ("utm_source", "newsletter"),
        ]);

        let url =
            build_destination("https://example.org/landing/", &query, PageType::Event).unwrap();

        assert_eq!(
            url.as_str(),
            "https://example.org/landing/?event_id=42&utm_source=newsletter"
        );
    }

    #[test]
    fn destination_rekeys_id_per_page_type() {
        let query = pairs(&[("id", "9")]);

        let url = build_destination(
            "https://example.org/donate/",
            &query,
            PageType::ContributionPage,
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://example.org/donate/?contribution_page_id=9"
        );
    }

    #[test]
    fn destination_preserves_existing_permalink_query() {
        let query = pairs(&[("id", "42")]);

        let url = build_destination("https://example.org/p/?p=123", &query, PageType::Event)
            .unwrap();

        assert_eq!(url.as_str(), "https://example.org/p/?p=123&event_id=42");
    }

    #[test]
    fn unparseable_permalink_is_none() {
        assert!(build_destination("not a url", &[], PageType::Event).is_none());
    }
}
