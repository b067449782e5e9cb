diesel::table! {
    annotations (id) {
        id -> Text,
        owner -> Text,
        body -> Text,
    }
}
