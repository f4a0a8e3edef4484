//! Change-event translation.
//!
//! The transport delivers raw bytes: arbitrary prefix metadata followed by a
//! JSON document whose `"u"` (upsert) or `"d"` (delete) key wraps a row image
//! of `{field: {"v": value}}` containers. Translation never panics and never
//! partially applies; a malformed envelope yields a typed error the consumer
//! logs and drops.

use serde_json::Value;
use thiserror::Error;
use time::{PrimitiveDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::domain::comments::CommentRecord;

/// Upstream row timestamps arrive as `yyyy-MM-dd HH:mm:ss`, assumed UTC.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A record-level mutation notification, already typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Upsert(CommentRecord),
    Delete(i64),
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("payload contains no JSON document")]
    MissingDocument,
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document carries neither an upsert nor a delete marker")]
    UnknownShape,
    #[error("field `{0}` is missing or not wrapped in a `v` container")]
    MissingField(&'static str),
    #[error("field `{0}` has an unexpected type")]
    FieldType(&'static str),
    #[error("timestamp `{value}` in field `{field}` does not match yyyy-MM-dd HH:mm:ss")]
    Timestamp {
        field: &'static str,
        value: String,
    },
}

/// Translate one transport payload.
///
/// `Ok(None)` is a heartbeat (empty payload); `Err` means the envelope was
/// malformed and the event must be dropped. The scan starts at the first `{`
/// byte because the transport prefixes metadata before the document.
pub fn translate(payload: &[u8]) -> Result<Option<ChangeEvent>, TranslateError> {
    if payload.is_empty() {
        return Ok(None);
    }

    let start = payload
        .iter()
        .position(|byte| *byte == b'{')
        .ok_or(TranslateError::MissingDocument)?;
    let root: Value = serde_json::from_slice(&payload[start..])?;

    if let Some(data) = root.get("u") {
        let record = unwrap_record(data)?;
        return Ok(Some(ChangeEvent::Upsert(record)));
    }
    if let Some(data) = root.get("d") {
        let record = unwrap_record(data)?;
        return Ok(Some(ChangeEvent::Delete(record.id)));
    }
    Err(TranslateError::UnknownShape)
}

fn unwrap_record(data: &Value) -> Result<CommentRecord, TranslateError> {
    Ok(CommentRecord {
        id: int_field(data, "id")?,
        content: string_field(data, "content")?,
        user_id: string_field(data, "user_id")?,
        likes: int_field(data, "likes")?,
        version: int_field(data, "version")?,
        created_at: timestamp_field(data, "created_at")?,
        updated_at: timestamp_field(data, "updated_at")?,
    })
}

fn wrapped<'a>(data: &'a Value, field: &'static str) -> Result<&'a Value, TranslateError> {
    data.get(field)
        .and_then(|container| container.get("v"))
        .ok_or(TranslateError::MissingField(field))
}

fn int_field(data: &Value, field: &'static str) -> Result<i64, TranslateError> {
    wrapped(data, field)?
        .as_i64()
        .ok_or(TranslateError::FieldType(field))
}

fn string_field(data: &Value, field: &'static str) -> Result<String, TranslateError> {
    wrapped(data, field)?
        .as_str()
        .map(str::to_string)
        .ok_or(TranslateError::FieldType(field))
}

fn timestamp_field(
    data: &Value,
    field: &'static str,
) -> Result<time::OffsetDateTime, TranslateError> {
    let raw = wrapped(data, field)?
        .as_str()
        .ok_or(TranslateError::FieldType(field))?;
    let parsed =
        PrimitiveDateTime::parse(raw, TIMESTAMP_FORMAT).map_err(|_| TranslateError::Timestamp {
            field,
            value: raw.to_string(),
        })?;
    Ok(parsed.assume_utc())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn upsert_payload() -> String {
        r#"{"u":{
            "id":{"v":42},
            "content":{"v":"first!"},
            "user_id":{"v":"u-7"},
            "likes":{"v":5},
            "version":{"v":3},
            "created_at":{"v":"2025-06-01 08:00:00"},
            "updated_at":{"v":"2025-06-02 09:30:00"}
        }}"#
            .to_string()
    }

    #[test]
    fn empty_payload_is_heartbeat() {
        assert!(matches!(translate(b""), Ok(None)));
    }

    #[test]
    fn prefix_bytes_before_document_are_skipped() {
        let payload = format!("binlog:0017:offset=9931 {}", upsert_payload());
        let event = translate(payload.as_bytes()).unwrap().unwrap();

        let ChangeEvent::Upsert(record) = event else {
            panic!("expected upsert");
        };
        assert_eq!(record.id, 42);
        assert_eq!(record.likes, 5);
        assert_eq!(record.user_id, "u-7");
        assert_eq!(record.created_at, datetime!(2025-06-01 08:00:00 UTC));
        assert_eq!(record.updated_at, datetime!(2025-06-02 09:30:00 UTC));
    }

    #[test]
    fn delete_marker_yields_delete_event() {
        let payload = upsert_payload().replace(r#""u":"#, r#""d":"#);
        let event = translate(payload.as_bytes()).unwrap().unwrap();
        assert_eq!(event, ChangeEvent::Delete(42));
    }

    #[test]
    fn payload_without_json_start_is_rejected() {
        let err = translate(b"plain text heartbeat-ish noise").unwrap_err();
        assert!(matches!(err, TranslateError::MissingDocument));
    }

    #[test]
    fn document_without_markers_is_unknown_shape() {
        let err = translate(br#"{"x":{"id":{"v":1}}}"#).unwrap_err();
        assert!(matches!(err, TranslateError::UnknownShape));
    }

    #[test]
    fn truncated_json_is_a_parse_error() {
        let err = translate(br#"{"u":{"id":{"v":1}"#).unwrap_err();
        assert!(matches!(err, TranslateError::Json(_)));
    }

    #[test]
    fn missing_value_container_fails_the_event() {
        let payload = upsert_payload().replace(r#""likes":{"v":5}"#, r#""likes":5"#);
        let err = translate(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, TranslateError::MissingField("likes")));
    }

    #[test]
    fn mistyped_field_fails_the_event() {
        let payload = upsert_payload().replace(r#""likes":{"v":5}"#, r#""likes":{"v":"five"}"#);
        let err = translate(payload.as_bytes()).unwrap_err();
        assert!(matches!(err, TranslateError::FieldType("likes")));
    }

    #[test]
    fn unparsable_timestamp_fails_the_event() {
        let payload = upsert_payload().replace("2025-06-02 09:30:00", "2025-06-02T09:30:00Z");
        let err = translate(payload.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            TranslateError::Timestamp {
                field: "updated_at",
                ..
            }
        ));
    }
}
