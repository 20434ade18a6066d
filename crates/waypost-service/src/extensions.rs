//! Enumerated extension points.
//!
//! The host can adjust write payloads, override the redirect target, or
//! rewrite the final destination URL without touching the mapping API or
//! the dispatcher. Each point is an ordered list of callbacks with typed
//! inputs and outputs, applied in registration order. All points default
//! to empty, leaving values unchanged.

use url::Url;

use waypost_db::db::enums::{PageType, PostType};

/// Resolved parameters of a mapping write, as they will be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteParams {
    pub id: Option<i32>,
    pub entity_id: i64,
    pub page_type: PageType,
    pub page_title: String,
    pub post_id: i64,
    pub post_type: PostType,
    pub post_title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteParams {
    pub id: i32,
}

/// Context handed to target overrides: where the visitor came from.
#[derive(Debug, Clone, Copy)]
pub struct TargetContext<'a> {
    pub entity_id: i64,
    pub page_type: PageType,
    pub query: &'a [(String, String)],
}

type WriteFilter = Box<dyn Fn(WriteParams) -> WriteParams + Send + Sync>;
type DeleteFilter = Box<dyn Fn(DeleteParams) -> DeleteParams + Send + Sync>;
type TargetFilter = Box<dyn Fn(i64, &TargetContext<'_>) -> i64 + Send + Sync>;
type UrlFilter = Box<dyn Fn(Url) -> Url + Send + Sync>;

#[derive(Default)]
pub struct Extensions {
    before_insert: Vec<WriteFilter>,
    before_update: Vec<WriteFilter>,
    before_delete: Vec<DeleteFilter>,
    override_target: Vec<TargetFilter>,
    rewrite_destination: Vec<UrlFilter>,
}

impl Extensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_insert(
        &mut self,
        filter: impl Fn(WriteParams) -> WriteParams + Send + Sync + 'static,
    ) -> &mut Self {
        self.before_insert.push(Box::new(filter));
        self
    }

    pub fn on_before_update(
        &mut self,
        filter: impl Fn(WriteParams) -> WriteParams + Send + Sync + 'static,
    ) -> &mut Self {
        self.before_update.push(Box::new(filter));
        self
    }

    pub fn on_before_delete(
        &mut self,
        filter: impl Fn(DeleteParams) -> DeleteParams + Send + Sync + 'static,
    ) -> &mut Self {
        self.before_delete.push(Box::new(filter));
        self
    }

    pub fn on_override_target(
        &mut self,
        filter: impl Fn(i64, &TargetContext<'_>) -> i64 + Send + Sync + 'static,
    ) -> &mut Self {
        self.override_target.push(Box::new(filter));
        self
    }

    pub fn on_rewrite_destination(
        &mut self,
        filter: impl Fn(Url) -> Url + Send + Sync + 'static,
    ) -> &mut Self {
        self.rewrite_destination.push(Box::new(filter));
        self
    }

    #[must_use]
    pub fn apply_before_insert(&self, params: WriteParams) -> WriteParams {
        self.before_insert.iter().fold(params, |p, f| f(p))
    }

    #[must_use]
    pub fn apply_before_update(&self, params: WriteParams) -> WriteParams {
        self.before_update.iter().fold(params, |p, f| f(p))
    }

    #[must_use]
    pub fn apply_before_delete(&self, params: DeleteParams) -> DeleteParams {
        self.before_delete.iter().fold(params, |p, f| f(p))
    }

    #[must_use]
    pub fn apply_override_target(&self, post_id: i64, context: &TargetContext<'_>) -> i64 {
        self.override_target
            .iter()
            .fold(post_id, |id, f| f(id, context))
    }

    #[must_use]
    pub fn apply_rewrite_destination(&self, url: Url) -> Url {
        self.rewrite_destination.iter().fold(url, |u, f| f(u))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extensions_leave_values_unchanged() {
        let extensions = Extensions::new();
        let context = TargetContext {
            entity_id: 42,
            page_type: PageType::Event,
            query: &[],
        };

        assert_eq!(extensions.apply_override_target(7, &context), 7);

        let url = Url::parse("https://example.org/landing/").unwrap();
        assert_eq!(extensions.apply_rewrite_destination(url.clone()), url);
    }

    #[test]
    fn filters_apply_in_registration_order() {
        let mut extensions = Extensions::new();
        extensions
            .on_override_target(|id, _ctx| id + 1)
            .on_override_target(|id, _ctx| id * 10);

        let context = TargetContext {
            entity_id: 42,
            page_type: PageType::Event,
            query: &[],
        };

        assert_eq!(extensions.apply_override_target(7, &context), 80);
    }

    #[test]
    fn write_filter_can_adjust_params() {
        let mut extensions = Extensions::new();
        extensions.on_before_insert(|mut params| {
            params.is_active = true;
            params
        });

        let params = WriteParams {
            id: None,
            entity_id: 42,
            page_type: PageType::Event,
            page_title: "Gala".to_string(),
            post_id: 7,
            post_type: PostType::Page,
            post_title: "Landing".to_string(),
            is_active: false,
        };

        assert!(extensions.apply_before_insert(params).is_active);
    }
}
