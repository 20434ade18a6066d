use diesel::{pg::Pg, prelude::*};

use crate::db::enums::{PageType, PostType};
use crate::db::schema;

/// A stored redirect mapping between a CRM entity page and a content
/// page. `page_title`/`post_title` are display caches and may go stale;
/// they are never used as lookup keys.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    Identifiable,
    Queryable,
    Selectable,
    serde::Serialize,
    serde::Deserialize,
)]
#[diesel(table_name = schema::redirect)]
#[diesel(check_for_backend(Pg))]
pub struct Redirect {
    pub id: i32,
    pub entity_id: i64,
    pub page_type: PageType,
    pub page_title: String,
    pub post_id: i64,
    pub post_type: PostType,
    pub post_title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Insertable)]
#[diesel(table_name = schema::redirect)]
pub struct NewRedirect {
    pub entity_id: i64,
    pub page_type: PageType,
    pub page_title: String,
    pub post_id: i64,
    pub post_type: PostType,
    pub post_title: String,
    pub is_active: bool,
}

/// Partial update keyed by the immutable `id`. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, AsChangeset)]
#[diesel(table_name = schema::redirect)]
pub struct RedirectChangeset {
    pub entity_id: Option<i64>,
    pub page_type: Option<PageType>,
    pub page_title: Option<String>,
    pub post_id: Option<i64>,
    pub post_type: Option<PostType>,
    pub post_title: Option<String>,
    pub is_active: Option<bool>,
}
