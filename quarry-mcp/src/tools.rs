//! MCP tool definitions

use crate::types::Tool;
use serde_json::{json, Value as JsonValue};

pub const QUERY_ITEMS: &str = "quarry_query_items";
pub const LIST_PROJECTS: &str = "quarry_list_projects";
pub const GET_PROJECT_COMPLETE: &str = "quarry_get_project_complete";
pub const GET_TRACKER_COMPLETE: &str = "quarry_get_tracker_complete";
pub const GET_ITEMS_BATCH: &str = "quarry_get_items_batch";
pub const GET_ITEM_WITH_CONTEXT: &str = "quarry_get_item_with_context";
pub const CREATE_ITEM: &str = "quarry_create_item";
pub const UPDATE_ITEM: &str = "quarry_update_item";
pub const BULK_UPDATE_ITEMS: &str = "quarry_bulk_update_items";
pub const MANAGE_ASSOCIATIONS: &str = "quarry_manage_associations";
pub const GET_HIERARCHY_TREE: &str = "quarry_get_hierarchy_tree";
pub const CONVERT_WIKI_TO_HTML: &str = "quarry_convert_wiki_to_html";
pub const GET_STATS: &str = "quarry_get_stats";
pub const CLEAR_CACHE: &str = "quarry_clear_cache";

fn id(description: &str) -> JsonValue {
    json!({"type": "integer", "minimum": 0, "description": description})
}

fn flag(default: bool, description: &str) -> JsonValue {
    json!({"type": "boolean", "default": default, "description": description})
}

fn strings(description: &str) -> JsonValue {
    json!({"type": "array", "items": {"type": "string"}, "description": description})
}

fn ids(description: &str) -> JsonValue {
    json!({"type": "array", "items": {"type": "integer", "minimum": 0}, "description": description})
}

/// Object schema that rejects unknown properties.
fn object(properties: JsonValue, required: &[&str]) -> JsonValue {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Object schema for a read tool; adds the per-call cache controls.
fn read_object(mut properties: JsonValue, required: &[&str]) -> JsonValue {
    if let Some(map) = properties.as_object_mut() {
        map.insert(
            "bypass_cache".to_string(),
            flag(false, "Skip the cache and fetch fresh data (the cache is still refreshed)"),
        );
        map.insert(
            "cache_ttl_secs".to_string(),
            json!({
                "type": "integer",
                "minimum": 1,
                "description": "Optional: how long to cache this response, in seconds"
            }),
        );
    }
    object(properties, required)
}

fn tool(name: &str, description: &str, input_schema: JsonValue) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

/// Every tool the server offers.
pub fn catalog() -> Vec<Tool> {
    vec![
        tool(
            QUERY_ITEMS,
            "Find items with a single server-side query. Combines project, tracker, type, \
             status and custom field filters into one call.",
            read_object(
                json!({
                    "project_ids": ids("Optional: filter by project ids"),
                    "tracker_ids": ids("Optional: filter by tracker ids"),
                    "tracker_names": strings("Optional: filter by tracker names, e.g. ['Bugs']"),
                    "item_types": strings("Optional: filter by item types, e.g. ['Bug', 'Task']"),
                    "statuses": strings("Optional: filter by statuses, e.g. ['Open']"),
                    "custom_filters": {
                        "type": "object",
                        "description": "Optional: field equality filters; an array value matches any element"
                    },
                    "include_fields": strings("Optional: return only these fields of each item"),
                    "max_results": {
                        "type": "integer",
                        "minimum": 1,
                        "default": 100,
                        "description": "Maximum number of items to return"
                    }
                }),
                &[],
            ),
        ),
        tool(
            LIST_PROJECTS,
            "List projects, one page per call.",
            read_object(
                json!({
                    "page": {"type": "integer", "minimum": 1, "default": 1},
                    "page_size": {"type": "integer", "minimum": 1, "maximum": 500, "default": 100}
                }),
                &[],
            ),
        ),
        tool(
            GET_PROJECT_COMPLETE,
            "Get a project with its trackers and, optionally, all of its items in at most three calls.",
            read_object(
                json!({
                    "project_id": id("The project id"),
                    "include_trackers": flag(true, "Include tracker information"),
                    "include_items": flag(false, "Include every item of every tracker (may be large)")
                }),
                &["project_id"],
            ),
        ),
        tool(
            GET_TRACKER_COMPLETE,
            "Get a tracker with its items and field metadata in at most three calls.",
            read_object(
                json!({
                    "tracker_id": id("The tracker id"),
                    "include_items": flag(true, "Include tracker items"),
                    "include_fields_metadata": flag(false, "Include field metadata"),
                    "max_items": {
                        "type": "integer",
                        "minimum": 1,
                        "default": 500,
                        "description": "Maximum number of items to return"
                    }
                }),
                &["tracker_id"],
            ),
        ),
        tool(
            GET_ITEMS_BATCH,
            "Get many items by id in a single call.",
            read_object(
                json!({
                    "item_ids": ids("Item ids to fetch"),
                    "fields": strings("Optional: return only these fields of each item")
                }),
                &["item_ids"],
            ),
        ),
        tool(
            GET_ITEM_WITH_CONTEXT,
            "Get an item with its children, relations and parent in at most four calls.",
            read_object(
                json!({
                    "item_id": id("The item id"),
                    "include_children": flag(false, "Include child items"),
                    "include_relations": flag(false, "Include associations"),
                    "include_parent": flag(false, "Include the parent item")
                }),
                &["item_id"],
            ),
        ),
        tool(
            CREATE_ITEM,
            "Create an item in a tracker.",
            object(
                json!({
                    "tracker_id": id("Tracker to create the item in"),
                    "summary": {"type": "string", "minLength": 1, "description": "Item summary"},
                    "description": {"type": "string", "description": "Optional: item description"},
                    "fields": {"type": "object", "description": "Optional: additional fields"},
                    "parent_id": id("Optional: parent item id")
                }),
                &["tracker_id", "summary"],
            ),
        ),
        tool(
            UPDATE_ITEM,
            "Update fields of one item. Cached reads of the item are dropped.",
            object(
                json!({
                    "item_id": id("The item id"),
                    "fields": {"type": "object", "minProperties": 1, "description": "Fields to set"}
                }),
                &["item_id", "fields"],
            ),
        ),
        tool(
            BULK_UPDATE_ITEMS,
            "Update many items in a single call.",
            object(
                json!({
                    "updates": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "properties": {
                                "itemId": {"type": "integer", "minimum": 0},
                                "fields": {"type": "object", "minProperties": 1}
                            },
                            "required": ["itemId", "fields"],
                            "additionalProperties": false
                        },
                        "description": "Updates like [{'itemId': 1, 'fields': {'status': 'Done'}}]"
                    }
                }),
                &["updates"],
            ),
        ),
        tool(
            MANAGE_ASSOCIATIONS,
            "Create, list or delete associations between items.",
            object(
                json!({
                    "action": {"type": "string", "enum": ["create", "get", "delete"]},
                    "from_item_id": id("Source item (create, get)"),
                    "to_item_id": id("Target item (create)"),
                    "association_id": id("Association to delete (delete)"),
                    "association_type": {
                        "type": "string",
                        "description": "Optional: association type, defaults to 'related'"
                    }
                }),
                &["action"],
            ),
        ),
        tool(
            GET_HIERARCHY_TREE,
            "Get the parent/child tree of a tracker, one call per level.",
            read_object(
                json!({
                    "tracker_id": id("The tracker id"),
                    "max_depth": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 20,
                        "default": 3,
                        "description": "Deepest level to visit"
                    }
                }),
                &["tracker_id"],
            ),
        ),
        tool(
            CONVERT_WIKI_TO_HTML,
            "Render wiki markup to HTML in the context of a project. Never cached.",
            object(
                json!({
                    "project_id": id("Project whose wiki context renders the markup"),
                    "content": {"type": "string", "description": "Wiki markup to render"}
                }),
                &["project_id", "content"],
            ),
        ),
        tool(
            GET_STATS,
            "Get call, cache and rate-limit statistics.",
            object(json!({}), &[]),
        ),
        tool(
            CLEAR_CACHE,
            "Drop cached responses, optionally only keys starting with a prefix such as 'items/'.",
            object(
                json!({
                    "pattern": {"type": "string", "description": "Optional: key prefix to clear"}
                }),
                &[],
            ),
        ),
    ]
}

/// Definition of one tool by name.
pub fn find(name: &str) -> Option<Tool> {
    catalog().into_iter().find(|t| t.name == name)
}
