//! Mapping between backend documents and [`Task`] values.

use serde_json::{Map, Value, json};
use taskboard_core::{CreateTaskInput, Priority, Task, TaskId, TaskPatch, TaskStatus};
use thiserror::Error;
use time::OffsetDateTime;

use crate::document::{Document, FieldValue, Fields, parse_timestamp};

/// Wire field names.
pub mod field {
    /// Title.
    pub const TITLE: &str = "title";
    /// Description.
    pub const DESCRIPTION: &str = "description";
    /// Priority level, 1 to 3.
    pub const PRIORITY: &str = "priority";
    /// Completion flag.
    pub const COMPLETED: &str = "completed";
    /// Kanban status.
    pub const STATUS: &str = "status";
    /// Creation timestamp.
    pub const CREATED_AT: &str = "createdAt";
    /// Last write timestamp.
    pub const UPDATED_AT: &str = "updatedAt";
}

/// A document could not be turned into a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The document id or body is unusable.
    #[error("document {id:?} has no usable data")]
    MissingData {
        /// Offending document id.
        id: String,
    },
    /// A required field is absent.
    #[error("document {id}: missing field {field}")]
    MissingField {
        /// Offending document id.
        id: String,
        /// Wire name of the field.
        field: &'static str,
    },
    /// A field has the wrong type or an unknown value.
    #[error("document {id}: invalid {field}: {found}")]
    InvalidField {
        /// Offending document id.
        id: String,
        /// Wire name of the field.
        field: &'static str,
        /// The rejected value.
        found: String,
    },
}

/// Convert a stored document, using the current time for missing timestamps.
///
/// # Errors
/// Returns a [`ConversionError`] when the document violates the schema.
pub fn task_from_document(doc: &Document) -> Result<Task, ConversionError> {
    task_from_document_at(doc, OffsetDateTime::now_utc())
}

/// Convert a stored document, substituting `now` for missing or unparseable timestamps.
///
/// # Errors
/// Returns a [`ConversionError`] when the document violates the schema.
pub fn task_from_document_at(doc: &Document, now: OffsetDateTime) -> Result<Task, ConversionError> {
    let missing_data = || ConversionError::MissingData { id: doc.id.clone() };
    let id = TaskId::new(doc.id.as_str()).map_err(|_| missing_data())?;
    let Some(data) = doc.data.as_object() else {
        return Err(missing_data());
    };
    let reader = Reader { id: &doc.id, data };

    let title = match data.get(field::TITLE) {
        None | Some(Value::Null) => return Err(reader.missing(field::TITLE)),
        Some(Value::String(title)) if !title.trim().is_empty() => title.clone(),
        Some(other) => return Err(reader.invalid(field::TITLE, other)),
    };
    let description = reader
        .optional(field::DESCRIPTION, |value| value.as_str().map(str::to_owned))?
        .unwrap_or_default();
    let priority = reader
        .optional(field::PRIORITY, |value| value.as_u64().and_then(Priority::from_level))?
        .unwrap_or_default();
    let completed = reader
        .optional(field::COMPLETED, Value::as_bool)?
        .unwrap_or_default();
    let status = reader
        .optional(field::STATUS, |value| value.as_str().and_then(TaskStatus::from_wire))?
        .unwrap_or_default();

    let created_at = reader.timestamp(field::CREATED_AT).unwrap_or(now);
    let updated_at = reader.timestamp(field::UPDATED_AT).unwrap_or(now).max(created_at);

    Ok(Task {
        id,
        title,
        description,
        priority,
        completed,
        status,
        created_at,
        updated_at,
    })
}

struct Reader<'a> {
    id: &'a str,
    data: &'a Map<String, Value>,
}

impl Reader<'_> {
    fn missing(&self, field: &'static str) -> ConversionError {
        ConversionError::MissingField {
            id: self.id.to_owned(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, found: &Value) -> ConversionError {
        ConversionError::InvalidField {
            id: self.id.to_owned(),
            field,
            found: found.to_string(),
        }
    }

    /// `Ok(None)` when absent or null, an error when present but unparseable.
    fn optional<T>(
        &self,
        field: &'static str,
        parse: impl FnOnce(&Value) -> Option<T>,
    ) -> Result<Option<T>, ConversionError> {
        match self.data.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse(value).map(Some).ok_or_else(|| self.invalid(field, value)),
        }
    }

    fn timestamp(&self, field: &'static str) -> Option<OffsetDateTime> {
        self.data.get(field).and_then(parse_timestamp)
    }
}

/// Fields written when creating a task. Both timestamps are server-assigned.
#[must_use]
pub fn create_fields(input: &CreateTaskInput) -> Fields {
    let mut fields = Fields::new();
    fields.insert(field::TITLE.into(), json!(input.title()).into());
    fields.insert(field::DESCRIPTION.into(), json!(input.description()).into());
    fields.insert(field::PRIORITY.into(), json!(input.priority().level()).into());
    fields.insert(field::COMPLETED.into(), json!(false).into());
    fields.insert(field::STATUS.into(), json!(input.status().as_str()).into());
    fields.insert(field::CREATED_AT.into(), FieldValue::ServerTimestamp);
    fields.insert(field::UPDATED_AT.into(), FieldValue::ServerTimestamp);
    fields
}

/// Fields written for a patch. `updatedAt` is always refreshed.
#[must_use]
pub fn patch_fields(patch: &TaskPatch) -> Fields {
    let mut fields = Fields::new();
    if let Some(title) = &patch.title {
        fields.insert(field::TITLE.into(), json!(title).into());
    }
    if let Some(description) = &patch.description {
        fields.insert(field::DESCRIPTION.into(), json!(description).into());
    }
    if let Some(priority) = patch.priority {
        fields.insert(field::PRIORITY.into(), json!(priority.level()).into());
    }
    if let Some(completed) = patch.completed {
        fields.insert(field::COMPLETED.into(), json!(completed).into());
    }
    if let Some(status) = patch.status {
        fields.insert(field::STATUS.into(), json!(status.as_str()).into());
    }
    fields.insert(field::UPDATED_AT.into(), FieldValue::ServerTimestamp);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

    fn doc(data: Value) -> Document {
        Document {
            id: "doc-1".into(),
            data,
        }
    }

    fn convert(data: Value) -> Result<Task, ConversionError> {
        task_from_document_at(&doc(data), NOW)
    }

    #[test]
    fn full_document_converts() {
        let task = convert(json!({
            "title": "Ship",
            "description": "release 1.0",
            "priority": 1,
            "completed": true,
            "status": "in-progress",
            "createdAt": { "seconds": 1_700_000_000, "nanoseconds": 0 },
            "updatedAt": "2023-11-14T22:13:21Z",
        }))
        .unwrap_or_else(|err| panic!("valid document: {err}"));
        assert_eq!(task.id.as_str(), "doc-1");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.completed);
        assert_eq!(task.created_at, datetime!(2023-11-14 22:13:20 UTC));
        assert_eq!(task.updated_at, datetime!(2023-11-14 22:13:21 UTC));
    }

    #[test]
    fn optional_fields_fall_back_to_defaults() {
        let task = convert(json!({ "title": "Bare" })).unwrap_or_else(|err| panic!("valid document: {err}"));
        assert_eq!(task.description, "");
        assert_eq!(task.priority, Priority::Medium);
        assert!(!task.completed);
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.created_at, NOW);
        assert_eq!(task.updated_at, NOW);
    }

    #[test]
    fn updated_at_is_clamped_to_created_at() {
        let task = convert(json!({
            "title": "Skewed",
            "createdAt": "2024-06-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z",
        }))
        .unwrap_or_else(|err| panic!("valid document: {err}"));
        assert_eq!(task.updated_at, task.created_at);
    }

    #[test]
    fn schema_violations_are_reported_per_field() {
        assert_eq!(
            convert(json!({ "description": "no title" })),
            Err(ConversionError::MissingField {
                id: "doc-1".into(),
                field: field::TITLE
            })
        );
        let cases = [
            (json!({ "title": "  " }), field::TITLE),
            (json!({ "title": "x", "priority": 7 }), field::PRIORITY),
            (json!({ "title": "x", "completed": "yes" }), field::COMPLETED),
            (json!({ "title": "x", "status": "blocked" }), field::STATUS),
            (json!({ "title": "x", "description": 3 }), field::DESCRIPTION),
        ];
        for (data, expected) in cases {
            match convert(data) {
                Err(ConversionError::InvalidField { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
        assert!(matches!(convert(json!(["not", "an", "object"])), Err(ConversionError::MissingData { .. })));
    }

    #[test]
    fn write_fields_stamp_server_time() {
        let input = CreateTaskInput::new("A", "d", Priority::High).unwrap_or_else(|err| panic!("{err}"));
        let fields = create_fields(&input);
        assert_eq!(fields.get(field::PRIORITY), Some(&FieldValue::Value(json!(1))));
        assert_eq!(fields.get(field::STATUS), Some(&FieldValue::Value(json!("todo"))));
        assert_eq!(fields.get(field::CREATED_AT), Some(&FieldValue::ServerTimestamp));

        let patch = patch_fields(&TaskPatch::default());
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get(field::UPDATED_AT), Some(&FieldValue::ServerTimestamp));

        let moved = patch_fields(&TaskPatch::move_to(TaskStatus::Completed));
        assert_eq!(moved.get(field::COMPLETED), Some(&FieldValue::Value(json!(true))));
        assert_eq!(moved.get(field::STATUS), Some(&FieldValue::Value(json!("completed"))));
    }
}
