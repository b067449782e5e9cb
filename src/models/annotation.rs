use chrono::{DateTime, Utc};
use serde_derive::Serialize;
use serde_json::{Map, Value};

/// A stored annotation: a JSON object with a few fields owned by the service.
pub type Document = Map<String, Value>;

pub const QUOTE_LIMIT: usize = 256;

pub const ID: &str = "_id";
pub const PUBLIC_ID: &str = "id";
pub const USER: &str = "_user";
pub const QUOTE: &str = "quote";
pub const QUOTE_CLIPPED: &str = "qouteClipped";
pub const CREATED: &str = "created";
pub const UPDATED: &str = "updated";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S.000000";

#[derive(Debug, Serialize)]
pub struct AnnotationList {
    #[serde(rename = "responseTime")]
    pub response_time: u64,
    pub total: usize,
    pub rows: Vec<Document>,
}

impl AnnotationList {
    pub fn new(rows: Vec<Document>) -> Self {
        AnnotationList {
            // not measured
            response_time: 0,
            total: rows.len(),
            rows,
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time with the sub-second part zeroed out.
pub fn timestamp_now() -> String {
    format_timestamp(Utc::now())
}

pub fn stamp_create(body: Document, token: &str) -> Document {
    stamp(body, token, &timestamp_now(), false)
}

pub fn stamp_update(body: Document, token: &str) -> Document {
    stamp(body, token, &timestamp_now(), true)
}

fn stamp(mut doc: Document, token: &str, timestamp: &str, update: bool) -> Document {
    // service-owned fields are never taken from the caller
    doc.remove(QUOTE_CLIPPED);
    doc.remove(UPDATED);

    doc.insert(USER.to_owned(), Value::from(token));
    doc.insert(CREATED.to_owned(), Value::from(timestamp));
    if update {
        doc.insert(UPDATED.to_owned(), Value::from(timestamp));
    }

    clip_quote(&mut doc);
    doc
}

/// Truncates a string `quote` to [`QUOTE_LIMIT`] characters and records
/// whether anything was cut off.
pub fn clip_quote(doc: &mut Document) {
    let clipped = match doc.get_mut(QUOTE) {
        Some(Value::String(quote)) => match quote.char_indices().nth(QUOTE_LIMIT) {
            Some((cut, _)) => {
                quote.truncate(cut);
                true
            }
            None => false,
        },
        _ => return,
    };

    let flag = if clipped { "Y" } else { "N" };
    doc.insert(QUOTE_CLIPPED.to_owned(), Value::from(flag));
}

/// Splits an update into the fields to `$set` and the fields only written
/// when the upsert creates the document.
pub fn split_insert_only(mut doc: Document) -> (Document, Document) {
    let mut insert_only = Document::new();
    if let Some(created) = doc.remove(CREATED) {
        insert_only.insert(CREATED.to_owned(), created);
    }
    (doc, insert_only)
}

pub fn present(mut doc: Document) -> Document {
    if let Some(id) = doc.get(ID).cloned() {
        doc.insert(PUBLIC_ID.to_owned(), id);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeZone};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn timestamp_drops_sub_second_precision() {
        let at = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap()
            + chrono::Duration::milliseconds(891);
        assert_eq!(format_timestamp(at), "2021-03-04 05:06:07.000000");
    }

    #[test]
    fn timestamp_now_is_fixed_width() {
        let now = timestamp_now();
        assert_eq!(now.len(), 26);
        assert!(now.ends_with(".000000"));
        assert!(NaiveDateTime::parse_from_str(&now, TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn create_overwrites_owner_and_passes_other_fields() {
        let body = doc(json!({ "_user": "someone-else", "text": "hi", "tags": ["a"] }));
        let stamped = stamp(body, "tok1", "2020-01-01 00:00:00.000000", false);

        assert_eq!(stamped[USER], "tok1");
        assert_eq!(stamped[CREATED], "2020-01-01 00:00:00.000000");
        assert_eq!(stamped["text"], "hi");
        assert_eq!(stamped["tags"], json!(["a"]));
        assert!(!stamped.contains_key(UPDATED));
        assert!(!stamped.contains_key(QUOTE_CLIPPED));
    }

    #[test]
    fn create_discards_caller_supplied_service_fields() {
        let body = doc(json!({ "updated": "x", "qouteClipped": "Y", "created": "y" }));
        let stamped = stamp_create(body, "tok1");

        assert!(!stamped.contains_key(UPDATED));
        assert!(!stamped.contains_key(QUOTE_CLIPPED));
        assert_ne!(stamped[CREATED], "y");
    }

    #[test]
    fn update_sets_both_timestamps() {
        let stamped = stamp(Document::new(), "tok1", "2020-01-01 00:00:00.000000", true);
        assert_eq!(stamped[CREATED], stamped[UPDATED]);
    }

    #[test]
    fn long_quote_is_clipped() {
        let body = doc(json!({ "quote": "a".repeat(300) }));
        let stamped = stamp_create(body, "tok1");

        assert_eq!(stamped[QUOTE].as_str().unwrap().len(), QUOTE_LIMIT);
        assert_eq!(stamped[QUOTE_CLIPPED], "Y");
    }

    #[test]
    fn short_quote_is_untouched() {
        let exact = "b".repeat(QUOTE_LIMIT);
        for quote in ["", "short", exact.as_str()] {
            let stamped = stamp_create(doc(json!({ "quote": quote })), "tok1");
            assert_eq!(stamped[QUOTE], quote);
            assert_eq!(stamped[QUOTE_CLIPPED], "N");
        }
    }

    #[test]
    fn quote_is_clipped_on_characters() {
        let quote = "é".repeat(QUOTE_LIMIT + 1);
        let stamped = stamp_create(doc(json!({ "quote": quote })), "tok1");

        assert_eq!(stamped[QUOTE].as_str().unwrap().chars().count(), QUOTE_LIMIT);
        assert_eq!(stamped[QUOTE_CLIPPED], "Y");
    }

    #[test]
    fn non_string_quote_is_left_alone() {
        let stamped = stamp_create(doc(json!({ "quote": 42 })), "tok1");
        assert_eq!(stamped[QUOTE], 42);
        assert!(!stamped.contains_key(QUOTE_CLIPPED));
    }

    #[test]
    fn split_moves_created_out_of_set() {
        let stamped = stamp_update(doc(json!({ "text": "x" })), "tok1");
        let (set, insert_only) = split_insert_only(stamped);

        assert!(!set.contains_key(CREATED));
        assert!(set.contains_key(UPDATED));
        assert!(insert_only.contains_key(CREATED));
    }

    #[test]
    fn present_copies_store_identifier() {
        let presented = present(doc(json!({ "_id": "abc", "text": "x" })));
        assert_eq!(presented[PUBLIC_ID], "abc");
        assert_eq!(presented[ID], "abc");
    }

    #[test]
    fn list_counts_rows() {
        let list = AnnotationList::new(vec![Document::new(), Document::new()]);
        let value = serde_json::to_value(&list).unwrap();
        assert_eq!(value, json!({ "responseTime": 0, "total": 2, "rows": [{}, {}] }));
    }
}
