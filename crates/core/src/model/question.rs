use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::QuestionId;

/// Field names a host payload may use for the question text, in priority order.
const TEXT_FIELDS: [&str; 7] = [
    "text",
    "texto",
    "pergunta",
    "enunciado",
    "descricao",
    "descricao_curta",
    "titulo",
];

/// Field names a host payload may use for a previously saved answer.
const SEED_FIELDS: [&str; 3] = ["seededAnswer", "seeded_answer", "resposta"];

const GROUP_FIELDS: [&str; 2] = ["groupKey", "group_key"];

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while loading question records from a host payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    #[error("question payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("question payload must be a list, found {found}")]
    NotAList { found: &'static str },

    #[error("question at index {index} is not an object")]
    NotAnObject { index: usize },

    #[error("question at index {index} has no usable id")]
    MissingId { index: usize },

    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
}

//
// ─── QUESTION RECORD ──────────────────────────────────────────────────────────
//

/// A single survey item as handed over by the host.
///
/// Records are immutable once loaded. Besides the typed fields, every attribute
/// of the original payload object is kept so that dot-separated group-key paths
/// (e.g. `dimension.name`) can be resolved against nested data.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRecord {
    id: QuestionId,
    text: String,
    group_key: Option<String>,
    seeded_answer: Option<i64>,
    attributes: Map<String, Value>,
}

impl QuestionRecord {
    #[must_use]
    pub fn new(id: QuestionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            group_key: None,
            seeded_answer: None,
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Attach a raw previously-saved answer. It is validated when the session is built.
    #[must_use]
    pub fn with_seeded_answer(mut self, value: i64) -> Self {
        self.seeded_answer = Some(value);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn group_key(&self) -> Option<&str> {
        self.group_key.as_deref()
    }

    /// Raw seeded answer, not yet checked against the Likert range.
    #[must_use]
    pub fn seeded_answer(&self) -> Option<i64> {
        self.seeded_answer
    }

    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Follow a dot-separated path into the record.
    ///
    /// Payload attributes take precedence; `id`, `text`, `groupKey` and
    /// `seededAnswer` resolve to the typed fields otherwise. Array elements are
    /// addressed by numeric segments. Missing segments and `null` yield `None`.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let head = segments.next()?;

        let mut current = match self.attributes.get(head) {
            Some(value) => value.clone(),
            None => match head {
                "id" => Value::from(self.id.value()),
                "text" => Value::String(self.text.clone()),
                "groupKey" | "group_key" => Value::String(self.group_key.clone()?),
                "seededAnswer" | "seeded_answer" => Value::from(self.seeded_answer?),
                _ => return None,
            },
        };

        for segment in segments {
            current = match current {
                Value::Object(mut map) => map.remove(segment)?,
                Value::Array(mut items) => {
                    let index: usize = segment.parse().ok()?;
                    if index >= items.len() {
                        return None;
                    }
                    items.swap_remove(index)
                }
                _ => return None,
            };
        }

        (!current.is_null()).then_some(current)
    }

    /// Build a record from one element of a host payload.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::NotAnObject` or `RecordError::MissingId` when the
    /// element cannot describe a question.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, RecordError> {
        let Value::Object(object) = value else {
            return Err(RecordError::NotAnObject { index });
        };

        let id = object
            .get("id")
            .and_then(parse_id)
            .ok_or(RecordError::MissingId { index })?;

        let text = TEXT_FIELDS
            .iter()
            .find_map(|name| object.get(*name).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let group_key = GROUP_FIELDS
            .iter()
            .find_map(|name| object.get(*name))
            .and_then(|value| match value {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            });

        let seeded_answer = SEED_FIELDS
            .iter()
            .find_map(|name| object.get(*name))
            .and_then(parse_seed);

        let mut attributes = object.clone();
        attributes.remove("id");

        Ok(Self {
            id,
            text,
            group_key,
            seeded_answer,
            attributes,
        })
    }

    /// Parse the JSON list of questions a host embeds in its page.
    ///
    /// # Errors
    ///
    /// Returns `RecordError` when the payload is not a JSON list of question
    /// objects with unique ids. An empty list is valid.
    pub fn parse_payload(json: &str) -> Result<Vec<Self>, RecordError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RecordError::Malformed(e.to_string()))?;
        let Value::Array(items) = value else {
            return Err(RecordError::NotAList {
                found: json_kind(&value),
            });
        };

        let records = items
            .iter()
            .enumerate()
            .map(|(index, item)| Self::from_value(index, item))
            .collect::<Result<Vec<_>, _>>()?;
        ensure_unique_ids(&records)?;
        Ok(records)
    }
}

/// Reject record lists that reuse a question id.
///
/// # Errors
///
/// Returns `RecordError::DuplicateId` with the first repeated id.
pub fn ensure_unique_ids(records: &[QuestionRecord]) -> Result<(), RecordError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id()) {
            return Err(RecordError::DuplicateId(record.id()));
        }
    }
    Ok(())
}

fn parse_id(value: &Value) -> Option<QuestionId> {
    match value {
        Value::Number(n) => n.as_u64().map(QuestionId::new),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

// Numbers are truncated toward zero and numeric strings accepted; anything else
// (including `null`, `false`, `0`) means "no saved answer".
fn parse_seed(value: &Value) -> Option<i64> {
    let raw = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (raw != 0).then_some(raw)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_payload_with_alternate_field_names() {
        let payload = r#"[
            {"id": 1, "texto": "Gosto de desenhar", "dimensao": {"nome": "artes"}, "resposta": 4},
            {"id": "2", "pergunta": "Gosto de contas", "resposta": "3"},
            {"id": 3}
        ]"#;

        let records = QuestionRecord::parse_payload(payload).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].text(), "Gosto de desenhar");
        assert_eq!(records[0].seeded_answer(), Some(4));
        assert_eq!(records[1].id(), QuestionId::new(2));
        assert_eq!(records[1].seeded_answer(), Some(3));
        assert_eq!(records[2].text(), "");
        assert_eq!(records[2].seeded_answer(), None);
    }

    #[test]
    fn non_numeric_seed_is_dropped() {
        let record =
            QuestionRecord::from_value(0, &json!({"id": 9, "resposta": "maybe"})).unwrap();
        assert_eq!(record.seeded_answer(), None);

        let record = QuestionRecord::from_value(0, &json!({"id": 9, "resposta": 4.8})).unwrap();
        assert_eq!(record.seeded_answer(), Some(4));
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(
            QuestionRecord::parse_payload("[{"),
            Err(RecordError::Malformed(_))
        ));
        assert_eq!(
            QuestionRecord::parse_payload(r#"{"id": 1}"#),
            Err(RecordError::NotAList { found: "an object" })
        );
        assert_eq!(
            QuestionRecord::parse_payload(r#"[{"text": "no id"}]"#),
            Err(RecordError::MissingId { index: 0 })
        );
        assert_eq!(
            QuestionRecord::parse_payload(r#"[{"id": 1}, {"id": 1}]"#),
            Err(RecordError::DuplicateId(QuestionId::new(1)))
        );
    }

    #[test]
    fn empty_payload_is_valid() {
        assert!(QuestionRecord::parse_payload("[]").unwrap().is_empty());
    }

    #[test]
    fn lookup_follows_nested_paths() {
        let record = QuestionRecord::from_value(
            0,
            &json!({"id": 5, "dimensao": {"nome": "artes", "tags": ["a", "b"]}}),
        )
        .unwrap();

        assert_eq!(record.lookup("dimensao.nome"), Some(json!("artes")));
        assert_eq!(record.lookup("dimensao.tags.1"), Some(json!("b")));
        assert_eq!(record.lookup("dimensao.missing"), None);
        assert_eq!(record.lookup("dimensao.nome.deeper"), None);
        assert_eq!(record.lookup("id"), Some(json!(5)));
    }

    #[test]
    fn lookup_resolves_typed_fields_on_built_records() {
        let record = QuestionRecord::new(QuestionId::new(1), "Q").with_group_key("science");
        assert_eq!(record.lookup("groupKey"), Some(json!("science")));
        assert_eq!(record.lookup("text"), Some(json!("Q")));
        assert_eq!(record.lookup("seededAnswer"), None);
    }
}
