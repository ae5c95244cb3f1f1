//! Document headers and the payload-to-header projection.

use crate::revision::Revision;
use crate::types::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lightweight projection of a document used for change notification and
/// catalog listing. Never carries the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Document identity.
    #[serde(rename = "_id")]
    pub id: DocumentId,
    /// Revision of the current body.
    #[serde(rename = "_rev")]
    pub rev: Revision,
    /// Report time, float seconds since the Unix epoch.
    pub timestamp: f64,
    /// Host that produced the document.
    pub hostname: Option<String>,
    /// Document classification.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Free-form producer tag.
    pub tag: Option<String>,
    /// Run number, when the document belongs to one.
    pub run: Option<i64>,
}

/// A validated payload waiting for its revision.
///
/// Building every draft of a batch before touching the store is what makes a
/// single malformed payload abort the whole batch.
#[derive(Debug, Clone)]
pub struct Draft {
    id: DocumentId,
    timestamp: f64,
    hostname: Option<String>,
    kind: Option<String>,
    tag: Option<String>,
    run: Option<i64>,
    body: Map<String, Value>,
}

impl Draft {
    /// Validates a raw producer payload.
    ///
    /// A JSON string is accepted and parsed as the document. `now` is used
    /// when the payload carries neither `timestamp` nor `report_timestamp`.
    pub fn from_payload(payload: Value, now: f64) -> Result<Self, String> {
        let body = match payload {
            Value::Object(map) => map,
            Value::String(text) => match serde_json::from_str(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => return Err("payload string does not hold an object".into()),
                Err(e) => return Err(format!("payload string is not json: {e}")),
            },
            other => return Err(format!("payload is not an object: {}", kind_of(&other))),
        };

        let id = match body.get("_id") {
            None => DocumentId::generate(),
            Some(Value::String(s)) => DocumentId::new(s.as_str()),
            Some(other) => return Err(format!("_id must be a string, got {}", kind_of(other))),
        };

        let timestamp = match optional_f64(&body, "timestamp")? {
            Some(ts) => ts,
            None => optional_f64(&body, "report_timestamp")?.unwrap_or(now),
        };

        let run = match body.get("run") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_i64()
                    .ok_or_else(|| format!("run must be an integer, got {}", kind_of(v)))?,
            ),
        };

        Ok(Self {
            id,
            timestamp,
            hostname: optional_string(&body, "hostname")?,
            kind: optional_string(&body, "type")?,
            tag: optional_string(&body, "tag")?,
            run,
            body,
        })
    }

    /// Identity the draft will be stored under.
    #[must_use]
    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Assigns `rev` and returns the header plus the body with the header
    /// fields written back into it.
    #[must_use]
    pub fn commit(self, rev: Revision) -> (Header, Map<String, Value>) {
        let header = Header {
            id: self.id,
            rev,
            timestamp: self.timestamp,
            hostname: self.hostname,
            kind: self.kind,
            tag: self.tag,
            run: self.run,
        };

        let mut body = self.body;
        body.insert("_id".into(), Value::String(header.id.as_str().to_string()));
        body.insert("_rev".into(), Value::from(rev.as_u64()));
        body.insert(
            "timestamp".into(),
            serde_json::Number::from_f64(header.timestamp)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        body.insert("hostname".into(), opt_to_value(&header.hostname));
        body.insert("type".into(), opt_to_value(&header.kind));
        body.insert("tag".into(), opt_to_value(&header.tag));
        body.insert("run".into(), header.run.map(Value::from).unwrap_or(Value::Null));

        (header, body)
    }
}

fn optional_string(body: &Map<String, Value>, key: &str) -> Result<Option<String>, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{key} must be a string, got {}", kind_of(other))),
    }
}

fn optional_f64(body: &Map<String, Value>, key: &str) -> Result<Option<f64>, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(format!("{key} must be a number, got {}", kind_of(other))),
    }
}

fn opt_to_value(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
