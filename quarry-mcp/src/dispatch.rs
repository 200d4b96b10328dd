//! Tool call execution
//!
//! Arguments are checked against the tool's input schema, decoded into the
//! orchestrator's request types and run. Results go back to the client as
//! pretty-printed JSON text.

use crate::tools::{self, *};
use crate::types::CallToolResponse;
use quarry_core::{
    AssociationId, FieldMap, FilterCriteria, ItemId, OperationResult, ProjectId, QuarryError,
    TrackerId, ValidationError,
};
use quarry_orchestrator::{
    payload, AssociationAction, CreateItemRequest, ItemContextRequest, ItemUpdate, Orchestrator,
    ProjectRequest, ReadOptions, TrackerRequest,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Default depth of `quarry_get_hierarchy_tree`.
pub const DEFAULT_HIERARCHY_DEPTH: u32 = 3;

/// Default page size of `quarry_list_projects`.
pub const DEFAULT_PROJECT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("{}: {}", .0.kind(), .0)]
    Operation(#[from] QuarryError),
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        Self::Operation(QuarryError::from(err))
    }
}

impl ToolError {
    fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}

/// Validate tool input against a JSON Schema.
pub fn validate_tool_input(input: &JsonValue, schema: &JsonValue) -> Result<(), String> {
    let compiled =
        jsonschema::draft202012::new(schema).map_err(|e| format!("Invalid schema: {}", e))?;

    let errors: Vec<String> = compiled.iter_errors(input).map(|e| e.to_string()).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

// ============================================================================
// ARGUMENTS
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListProjectsArgs {
    #[serde(default = "first_page")]
    page: u32,
    #[serde(default = "default_project_page_size")]
    page_size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_project_page_size() -> u32 {
    DEFAULT_PROJECT_PAGE_SIZE
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemsBatchArgs {
    item_ids: Vec<ItemId>,
    #[serde(default)]
    fields: Option<BTreeSet<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateItemArgs {
    item_id: ItemId,
    fields: FieldMap,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkEntry {
    #[serde(rename = "itemId", alias = "item_id")]
    item_id: ItemId,
    fields: FieldMap,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BulkUpdateArgs {
    updates: Vec<BulkEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AssociationArgs {
    action: String,
    #[serde(default)]
    from_item_id: Option<ItemId>,
    #[serde(default)]
    to_item_id: Option<ItemId>,
    #[serde(default)]
    association_id: Option<AssociationId>,
    #[serde(default)]
    association_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HierarchyArgs {
    tracker_id: TrackerId,
    #[serde(default = "default_hierarchy_depth")]
    max_depth: u32,
}

fn default_hierarchy_depth() -> u32 {
    DEFAULT_HIERARCHY_DEPTH
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WikiArgs {
    project_id: ProjectId,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClearCacheArgs {
    #[serde(default)]
    pattern: Option<String>,
}

/// Split the cache controls off a read tool's arguments.
fn take_read_options(args: &mut Map<String, JsonValue>) -> ReadOptions {
    let mut options = ReadOptions::default();
    if let Some(true) = args.remove("bypass_cache").and_then(|v| v.as_bool()) {
        options = options.bypass();
    }
    if let Some(secs) = args.remove("cache_ttl_secs").and_then(|v| v.as_u64()) {
        options = options.with_ttl(Duration::from_secs(secs));
    }
    options
}

fn decode<T: DeserializeOwned>(tool: &str, args: Map<String, JsonValue>) -> Result<T, ToolError> {
    serde_json::from_value(JsonValue::Object(args)).map_err(|e| ToolError::invalid(tool, e.to_string()))
}

fn render(result: impl Into<OperationResult>) -> JsonValue {
    serde_json::to_value(result.into()).unwrap_or_else(|e| json!({"error": e.to_string()}))
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Run one tool against the orchestrator.
pub async fn dispatch(
    orchestrator: &Orchestrator,
    name: &str,
    arguments: JsonValue,
) -> Result<JsonValue, ToolError> {
    let tool = tools::find(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

    let arguments = match arguments {
        JsonValue::Null => JsonValue::Object(Map::new()),
        other => other,
    };
    validate_tool_input(&arguments, &tool.input_schema).map_err(|e| ToolError::invalid(name, e))?;
    let mut args = match arguments {
        JsonValue::Object(map) => map,
        other => return Err(ToolError::invalid(name, format!("expected an object, got {}", other))),
    };

    let value = match name {
        QUERY_ITEMS => {
            let options = take_read_options(&mut args);
            let criteria = FilterCriteria::from_json(&JsonValue::Object(args))?;
            render(orchestrator.query_items(&criteria, options).await?)
        }

        LIST_PROJECTS => {
            let options = take_read_options(&mut args);
            let args: ListProjectsArgs = decode(name, args)?;
            render(
                orchestrator
                    .list_projects(args.page, args.page_size, options)
                    .await?,
            )
        }

        GET_PROJECT_COMPLETE => {
            let options = take_read_options(&mut args);
            let request: ProjectRequest = decode(name, args)?;
            render(orchestrator.get_project_complete(&request, options).await?)
        }

        GET_TRACKER_COMPLETE => {
            let options = take_read_options(&mut args);
            let request: TrackerRequest = decode(name, args)?;
            render(orchestrator.get_tracker_complete(&request, options).await?)
        }

        GET_ITEMS_BATCH => {
            let options = take_read_options(&mut args);
            let args: ItemsBatchArgs = decode(name, args)?;
            let mut batch = orchestrator.get_items_batch(&args.item_ids, options).await?;
            if let Some(fields) = args.fields.filter(|f| !f.is_empty()) {
                batch.items = batch
                    .items
                    .iter()
                    .map(|item| payload::project_fields(item, &fields))
                    .collect();
            }
            render(batch)
        }

        GET_ITEM_WITH_CONTEXT => {
            let options = take_read_options(&mut args);
            let request: ItemContextRequest = decode(name, args)?;
            render(orchestrator.get_item_with_context(&request, options).await?)
        }

        CREATE_ITEM => {
            let request: CreateItemRequest = decode(name, args)?;
            render(orchestrator.create_item(request).await?)
        }

        UPDATE_ITEM => {
            let args: UpdateItemArgs = decode(name, args)?;
            render(
                orchestrator
                    .update_item_fields(args.item_id, args.fields)
                    .await?,
            )
        }

        BULK_UPDATE_ITEMS => {
            let args: BulkUpdateArgs = decode(name, args)?;
            let updates = args
                .updates
                .into_iter()
                .map(|entry| ItemUpdate::new(entry.item_id, entry.fields))
                .collect();
            render(orchestrator.bulk_update_items(updates).await?)
        }

        MANAGE_ASSOCIATIONS => {
            let args: AssociationArgs = decode(name, args)?;
            let action = AssociationAction::parse(
                &args.action,
                args.from_item_id,
                args.to_item_id,
                args.association_id,
                args.association_type,
            )?;
            render(orchestrator.manage_associations(action).await?)
        }

        GET_HIERARCHY_TREE => {
            let options = take_read_options(&mut args);
            let args: HierarchyArgs = decode(name, args)?;
            render(
                orchestrator
                    .get_hierarchy_tree(args.tracker_id, args.max_depth, options)
                    .await?,
            )
        }

        CONVERT_WIKI_TO_HTML => {
            let args: WikiArgs = decode(name, args)?;
            render(
                orchestrator
                    .convert_wiki_to_html(args.project_id, &args.content)
                    .await?,
            )
        }

        GET_STATS => serde_json::to_value(orchestrator.stats())
            .map_err(|e| ToolError::invalid(name, e.to_string()))?,

        CLEAR_CACHE => {
            let args: ClearCacheArgs = decode(name, args)?;
            let pattern = args.pattern.filter(|p| !p.is_empty());
            let removed = orchestrator.invalidate(pattern.as_deref());
            json!({ "removed": removed, "pattern": pattern })
        }

        other => return Err(ToolError::UnknownTool(other.to_string())),
    };

    Ok(value)
}

/// Run a tool and wrap the outcome as an MCP tool response.
///
/// Failures are reported in-band with `isError` set, never as protocol errors.
pub async fn call_tool(
    orchestrator: &Orchestrator,
    name: &str,
    arguments: JsonValue,
) -> CallToolResponse {
    tracing::debug!(tool = %name, "MCP tool call");

    match dispatch(orchestrator, name, arguments).await {
        Ok(value) => CallToolResponse::text(
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
        ),
        Err(e) => {
            tracing::warn!(tool = %name, error = %e, "MCP tool call failed");
            CallToolResponse::error(format!("Error: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tool_input_reports_every_problem() {
        let schema = tools::find(UPDATE_ITEM).unwrap().input_schema;
        let err = validate_tool_input(&json!({"fields": {}, "extra": 1}), &schema).unwrap_err();
        assert!(err.contains("item_id"));
        assert!(err.contains("extra"));
        assert!(err.contains(';'));
    }

    #[test]
    fn test_take_read_options() {
        let mut args = json!({"tracker_id": 4, "bypass_cache": true, "cache_ttl_secs": 30})
            .as_object()
            .cloned()
            .unwrap();
        let options = take_read_options(&mut args);
        assert!(options.bypass_cache);
        assert_eq!(options.ttl, Some(Duration::from_secs(30)));
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn test_bulk_entries_accept_both_id_spellings() {
        let args: BulkUpdateArgs = serde_json::from_value(json!({
            "updates": [
                {"itemId": 1, "fields": {"status": "Done"}},
                {"item_id": 2, "fields": {"status": "Done"}}
            ]
        }))
        .unwrap();
        assert_eq!(args.updates[1].item_id, ItemId::new(2));
    }

    #[test]
    fn test_operation_error_display_names_kind() {
        let err = ToolError::from(ValidationError::missing("from_item_id"));
        assert!(err.to_string().starts_with("validation: "));
    }
}
