//! JSON Schema-like type descriptors and the projection that re-assembles
//! a nested document from a flat snapshot.

use serde_json::{Map, Value};

use crate::core::{Snapshot, join_path};
use crate::error::{ProjectionError, SyncError};

const TYPE_KEY: &str = "type";
const PROPERTIES_KEY: &str = "properties";
const ADDITIONAL_PROPERTIES_KEY: &str = "additionalProperties";
const REQUIRED_KEY: &str = "required";

/// A recursive type descriptor parsed from a JSON Schema-like document.
///
/// Supported types are `string`, `number`, `integer`, `boolean` and
/// `object`. An object schema describes its children either through fixed
/// `properties` or through a single `additionalProperties` sub-schema
/// applied uniformly to every child key; when both are present the fixed
/// form wins during read-back.
///
/// # Examples
///
/// ```rust
/// use driftsync::core::Schema;
///
/// let schema = Schema::parse(r#"{
///     "type": "object",
///     "properties": {"port": {"type": "integer"}}
/// }"#).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    inner: Value,
}

impl Schema {
    /// Parse a schema from its JSON text.
    pub fn parse(json: &str) -> crate::error::Result<Self> {
        let inner: Value =
            serde_json::from_str(json).map_err(|e| SyncError::Parse(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Wrap an already-parsed schema document.
    pub fn from_value(inner: Value) -> Self {
        Self { inner }
    }

    /// The schema document itself, for embedding in wire payloads.
    pub fn as_value(&self) -> &Value {
        &self.inner
    }

    /// Re-assemble the nested document this schema describes from a flat
    /// snapshot, starting at the snapshot root.
    ///
    /// # Errors
    ///
    /// Fails if a required scalar is absent or does not coerce to its
    /// declared type, or if the schema itself is malformed.
    pub fn project(&self, snapshot: &Snapshot) -> Result<Value, ProjectionError> {
        project_at(&self.inner, snapshot, "")
    }
}

fn schema_type<'a>(schema: &'a Value, path: &str) -> Result<&'a str, ProjectionError> {
    schema
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| ProjectionError::MissingType {
            path: path.to_string(),
        })
}

fn project_at(schema: &Value, snapshot: &Snapshot, path: &str) -> Result<Value, ProjectionError> {
    match schema_type(schema, path)? {
        "string" => {
            let raw = require_value(snapshot, path)?;
            Ok(Value::String(raw.to_string()))
        }
        "integer" => {
            let raw = require_value(snapshot, path)?;
            let parsed: i64 = raw
                .parse()
                .map_err(|_| invalid(path, "integer", raw))?;
            Ok(Value::from(parsed))
        }
        "number" => {
            let raw = require_value(snapshot, path)?;
            let parsed: f64 = raw.parse().map_err(|_| invalid(path, "number", raw))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| invalid(path, "number", raw))
        }
        "boolean" => match require_value(snapshot, path)? {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            raw => Err(invalid(path, "boolean", raw)),
        },
        "object" => project_object(schema, snapshot, path),
        other => Err(ProjectionError::UnsupportedType {
            path: path.to_string(),
            ty: other.to_string(),
        }),
    }
}

fn project_object(
    schema: &Value,
    snapshot: &Snapshot,
    path: &str,
) -> Result<Value, ProjectionError> {
    let mut result = Map::new();

    if let Some(properties) = schema.get(PROPERTIES_KEY).and_then(Value::as_object) {
        // Fixed-properties form: emit only declared keys that are present;
        // unknown keys in the snapshot are dropped.
        for (key, sub_schema) in properties {
            if key == REQUIRED_KEY {
                continue;
            }
            let child_path = join_path(path, key);
            if snapshot.contains(&child_path) {
                result.insert(
                    key.clone(),
                    project_at(sub_schema, snapshot, &child_path)?,
                );
            }
        }
    } else if let Some(sub_schema) = schema.get(ADDITIONAL_PROPERTIES_KEY) {
        // Uniform form: every immediate child segment actually present
        // gets the same sub-schema.
        for segment in snapshot.child_segments(path) {
            let child_path = join_path(path, &segment);
            result.insert(segment, project_at(sub_schema, snapshot, &child_path)?);
        }
    }

    Ok(Value::Object(result))
}

fn require_value<'a>(snapshot: &'a Snapshot, path: &str) -> Result<&'a str, ProjectionError> {
    snapshot.get(path).ok_or_else(|| ProjectionError::Missing {
        path: path.to_string(),
    })
}

fn invalid(path: &str, expected: &'static str, value: &str) -> ProjectionError {
    ProjectionError::Invalid {
        path: path.to_string(),
        expected,
        value: value.to_string(),
    }
}
