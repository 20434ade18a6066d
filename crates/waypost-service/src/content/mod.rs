//! Content-store client.
//!
//! Resolves a content id against the host CMS REST API to obtain the
//! permalink, title, and type used to enrich mapping writes and to build
//! redirect destinations. Probes the post endpoint first, then the page
//! endpoint; an id unknown to both is an absent result, not an error.

use serde::Deserialize;

use crate::error::ServiceResult;
use waypost_core::config::ContentConfig;
use waypost_db::db::enums::PostType;

#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    api_url: String,
}

/// A resolved content item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub kind: PostType,
    pub permalink: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    id: i64,
    link: String,
    title: ContentTitle,
}

#[derive(Debug, Deserialize)]
struct ContentTitle {
    rendered: String,
}

impl ContentClient {
    #[must_use]
    pub fn new(config: &ContentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    /// ## Summary
    /// Looks up a content item by id, probing posts then pages.
    ///
    /// ## Errors
    /// Returns an HTTP error on transport failure; an unknown id is
    /// `Ok(None)`.
    #[tracing::instrument(skip(self))]
    pub async fn lookup(&self, post_id: i64) -> ServiceResult<Option<ContentItem>> {
        for (endpoint, kind) in [("posts", PostType::Post), ("pages", PostType::Page)] {
            if let Some(item) = self.fetch(endpoint, kind, post_id).await? {
                return Ok(Some(item));
            }
        }

        Ok(None)
    }

    async fn fetch(
        &self,
        endpoint: &str,
        kind: PostType,
        post_id: i64,
    ) -> ServiceResult<Option<ContentItem>> {
        let url = format!("{}/{endpoint}/{post_id}", self.api_url);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::trace!(%url, status = %response.status(), "Content lookup miss");
            return Ok(None);
        }

        let body = response.json::<ContentResponse>().await?;

        Ok(Some(ContentItem {
            id: body.id,
            title: body.title.rendered,
            kind,
            permalink: body.link,
        }))
    }
}
