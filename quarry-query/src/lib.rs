//! Quarry Query - Filter Translator
//!
//! Turns [`FilterCriteria`] into a single server-side query expression.
//! Clause order is fixed (projects, trackers, tracker names, item types,
//! statuses, custom filters by field name) so semantically equal criteria
//! always render byte-identical text and therefore share a cache key.

pub mod literal;

pub use literal::{check_field_name, escape_string, Clause, Literal};

use quarry_core::{FilterCriteria, ItemId, QueryExpression, ValidationError};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Expression used when no dimension constrains the query.
pub const UNCONSTRAINED: &str = "project.id > 0";

/// Page size used by `query_items` when the caller gives no bound.
pub const DEFAULT_MAX_RESULTS: u32 = 100;

/// Translate criteria into a query expression.
///
/// Fails with [`ValidationError`] for empty names, malformed custom filter
/// values, custom field names that are not plain identifiers, or a
/// `max_results` of zero.
pub fn translate(criteria: &FilterCriteria) -> Result<QueryExpression, ValidationError> {
    if criteria.max_results == Some(0) {
        return Err(ValidationError::invalid("max_results", "must be greater than 0"));
    }
    let criteria = criteria.clone().normalized();
    let clauses = clauses(&criteria)?;
    let text = render(&clauses);
    Ok(QueryExpression::new(text, criteria.canonical_json()))
}

/// Expression selecting items by id, used for batch reads.
pub fn items_by_id(ids: &BTreeSet<ItemId>) -> QueryExpression {
    id_membership("item.id", "item_ids", ids)
}

/// Expression selecting the direct children of the given parents.
pub fn children_of(parents: &BTreeSet<ItemId>) -> QueryExpression {
    id_membership("parent.id", "parent_ids", parents)
}

fn id_membership(field: &str, label: &str, ids: &BTreeSet<ItemId>) -> QueryExpression {
    let clause = Clause::membership(field, ids.iter().map(|id| Literal::number(id.get())));
    let mut canonical = serde_json::Map::new();
    canonical.insert(
        label.to_string(),
        json!(ids.iter().map(|id| id.get()).collect::<Vec<_>>()),
    );
    QueryExpression::new(clause.to_string(), Value::Object(canonical).to_string())
}

fn render(clauses: &[Clause]) -> String {
    if clauses.is_empty() {
        return UNCONSTRAINED.to_string();
    }
    clauses
        .iter()
        .map(Clause::to_string)
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn clauses(criteria: &FilterCriteria) -> Result<Vec<Clause>, ValidationError> {
    let mut out = Vec::new();

    if let Some(ids) = &criteria.project_ids {
        out.push(Clause::membership(
            "project.id",
            ids.iter().map(|id| Literal::number(id.get())),
        ));
    }
    if let Some(ids) = &criteria.tracker_ids {
        out.push(Clause::membership(
            "tracker.id",
            ids.iter().map(|id| Literal::number(id.get())),
        ));
    }
    if let Some(names) = &criteria.tracker_names {
        out.push(string_membership("tracker.name", "tracker_names", names)?);
    }
    if let Some(types) = &criteria.item_types {
        out.push(string_membership("type", "item_types", types)?);
    }
    if let Some(statuses) = &criteria.statuses {
        out.push(string_membership("status", "statuses", statuses)?);
    }

    // BTreeMap iteration is already sorted by field name.
    for (field, value) in &criteria.custom_filters {
        out.push(custom_clause(field, value)?);
    }

    Ok(out)
}

fn string_membership(
    field: &str,
    label: &str,
    values: &BTreeSet<String>,
) -> Result<Clause, ValidationError> {
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(ValidationError::empty(label));
    }
    Ok(Clause::membership(
        field,
        values.iter().map(|v| Literal::quoted(v.as_str())),
    ))
}

fn custom_clause(field: &str, value: &Value) -> Result<Clause, ValidationError> {
    check_field_name(field)?;
    let label = format!("custom_filters.{}", field);

    match value {
        Value::Array(values) => {
            if values.is_empty() {
                return Err(ValidationError::empty(label));
            }
            let literals = values
                .iter()
                .map(|v| Literal::from_json(&label, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Clause::membership(field, literals))
        }
        scalar => Ok(Clause::Eq {
            field: field.to_string(),
            value: Literal::from_json(&label, scalar)?,
        }),
    }
}
