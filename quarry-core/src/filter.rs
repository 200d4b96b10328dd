//! Filter criteria and translated query expressions

use crate::{ProjectId, TrackerId, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Field name to value mapping used for custom filters and field updates.
///
/// A `BTreeMap` so iteration order is independent of insertion order.
pub type FieldMap = BTreeMap<String, Value>;

// ============================================================================
// FILTER CRITERIA
// ============================================================================

/// Structured description of which items a query should return.
///
/// Every dimension is optional; `None` means no constraint on that dimension.
/// Set-valued dimensions are ordered sets, so two criteria built from the same
/// values in a different order compare (and serialize) equal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterCriteria {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_ids: Option<BTreeSet<ProjectId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_ids: Option<BTreeSet<TrackerId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_names: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_types: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_filters: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_fields: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projects(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.project_ids = Some(ids.into_iter().map(ProjectId::new).collect());
        self
    }

    pub fn with_trackers(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.tracker_ids = Some(ids.into_iter().map(TrackerId::new).collect());
        self
    }

    pub fn with_tracker_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.tracker_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_item_types<S: Into<String>>(mut self, types: impl IntoIterator<Item = S>) -> Self {
        self.item_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_statuses<S: Into<String>>(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.statuses = Some(statuses.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_custom(mut self, field: impl Into<String>, value: Value) -> Self {
        self.custom_filters.insert(field.into(), value);
        self
    }

    pub fn with_include_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.include_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_results(mut self, max: u32) -> Self {
        self.max_results = Some(max);
        self
    }

    /// True when no dimension constrains the query.
    pub fn is_unconstrained(&self) -> bool {
        fn unset<T>(set: &Option<BTreeSet<T>>) -> bool {
            set.as_ref().map_or(true, BTreeSet::is_empty)
        }
        unset(&self.project_ids)
            && unset(&self.tracker_ids)
            && unset(&self.tracker_names)
            && unset(&self.item_types)
            && unset(&self.statuses)
            && self.custom_filters.is_empty()
    }

    /// Collapse empty sets to `None` so `Some({})` and `None` canonicalize alike.
    pub fn normalized(mut self) -> Self {
        fn collapse<T>(set: &mut Option<BTreeSet<T>>) {
            if set.as_ref().is_some_and(BTreeSet::is_empty) {
                *set = None;
            }
        }
        collapse(&mut self.project_ids);
        collapse(&mut self.tracker_ids);
        collapse(&mut self.tracker_names);
        collapse(&mut self.item_types);
        collapse(&mut self.statuses);
        collapse(&mut self.include_fields);
        // Array filters are membership tests, so element order carries no meaning.
        for value in self.custom_filters.values_mut() {
            if let Value::Array(values) = value {
                values.sort_by_cached_key(Value::to_string);
                values.dedup();
            }
        }
        self
    }

    /// Canonical JSON serialization: sets as sorted arrays, maps sorted by key.
    pub fn canonical_json(&self) -> String {
        // serde_json without `preserve_order` sorts object keys, and every
        // collection here is already ordered.
        match serde_json::to_value(self.clone().normalized()) {
            Ok(value) => value.to_string(),
            Err(_) => String::from("{}"),
        }
    }

    /// Build criteria from loosely-typed JSON, reporting the first malformed field.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(ValidationError::invalid(
                    "criteria",
                    format!("expected an object, got {}", json_kind(other)),
                ))
            }
        };

        let mut criteria = Self::default();
        for (key, raw) in object {
            if raw.is_null() {
                continue;
            }
            match key.as_str() {
                "project_ids" => {
                    criteria.project_ids =
                        Some(id_set(key, raw)?.into_iter().map(ProjectId::new).collect())
                }
                "tracker_ids" => {
                    criteria.tracker_ids =
                        Some(id_set(key, raw)?.into_iter().map(TrackerId::new).collect())
                }
                "tracker_names" => criteria.tracker_names = Some(string_set(key, raw)?),
                "item_types" => criteria.item_types = Some(string_set(key, raw)?),
                "statuses" => criteria.statuses = Some(string_set(key, raw)?),
                "include_fields" => criteria.include_fields = Some(string_set(key, raw)?),
                "custom_filters" => {
                    let map = raw.as_object().ok_or_else(|| {
                        ValidationError::invalid(key, "expected an object of field to value")
                    })?;
                    criteria.custom_filters =
                        map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                }
                "max_results" => {
                    let max = raw
                        .as_u64()
                        .filter(|n| *n > 0 && *n <= u64::from(u32::MAX))
                        .ok_or_else(|| {
                            ValidationError::invalid(key, "expected a positive integer")
                        })?;
                    criteria.max_results = Some(max as u32);
                }
                other => {
                    return Err(ValidationError::invalid(other, "unknown filter dimension"));
                }
            }
        }
        Ok(criteria)
    }
}

/// Parse a JSON array of non-negative integers.
pub fn id_set(field: &str, raw: &Value) -> Result<BTreeSet<u64>, ValidationError> {
    let array = raw
        .as_array()
        .ok_or_else(|| ValidationError::invalid(field, "expected an array of integer ids"))?;
    array
        .iter()
        .map(|v| {
            v.as_u64().ok_or_else(|| {
                ValidationError::invalid(field, format!("non-integer id {}", v))
            })
        })
        .collect()
}

fn string_set(field: &str, raw: &Value) -> Result<BTreeSet<String>, ValidationError> {
    let array = raw
        .as_array()
        .ok_or_else(|| ValidationError::invalid(field, "expected an array of strings"))?;
    array
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ValidationError::invalid(field, format!("non-string value {}", v)))
        })
        .collect()
}

/// Human-readable JSON type name for error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// QUERY EXPRESSION
// ============================================================================

/// A translated server-side query plus the canonical criteria it came from.
///
/// Immutable once built; the digest is a pure function of both parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct QueryExpression {
    text: String,
    canonical: String,
}

impl QueryExpression {
    pub fn new(text: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            canonical: canonical.into(),
        }
    }

    /// The query string sent to the remote service.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Canonical serialization of the source criteria.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Lowercase hex SHA-256 of expression and canonical form.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Display for QueryExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
