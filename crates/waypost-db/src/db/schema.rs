diesel::table! {
    redirect (id) {
        id -> Int4,
        entity_id -> Int8,
        page_type -> Text,
        page_title -> Text,
        post_id -> Int8,
        post_type -> Text,
        post_title -> Text,
        is_active -> Bool,
    }
}
