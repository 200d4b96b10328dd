//! JSON-RPC round trips through the MCP server against a scripted transport.

use quarry_mcp::McpServer;
use quarry_orchestrator::Orchestrator;
use quarry_test_utils::{item, test_config, MockTransport};
use quarry_transport::Method;
use serde_json::{json, Value};
use std::sync::Arc;

fn setup() -> (Arc<MockTransport>, McpServer) {
    let mock = Arc::new(MockTransport::new());
    let orchestrator = Orchestrator::with_transport(&test_config(), mock.clone()).unwrap();
    (mock, McpServer::new(orchestrator))
}

async fn call(server: &McpServer, id: u64, tool: &str, arguments: Value) -> Value {
    let line = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": tool, "arguments": arguments},
    })
    .to_string();
    let response = server.handle_line(&line).await.unwrap();
    assert_eq!(response.id, json!(id));
    response.result.unwrap()
}

fn text_of(result: &Value) -> Value {
    let text = result["content"][0]["text"].as_str().unwrap();
    serde_json::from_str(text).unwrap()
}

#[tokio::test(start_paused = true)]
async fn initialize_and_list_tools() {
    let (_, server) = setup();
    let response = server
        .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"t","version":"0"}}}"#)
        .await
        .unwrap();
    assert_eq!(response.result.unwrap()["protocolVersion"], "2024-11-05");

    let response = server
        .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, 14);
}

#[tokio::test(start_paused = true)]
async fn notifications_and_blank_lines_get_no_response() {
    let (_, server) = setup();
    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());
    assert!(server.handle_line("   ").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn protocol_errors_use_json_rpc_codes() {
    let (_, server) = setup();

    let parse = server.handle_line("{not json").await.unwrap();
    assert_eq!(parse.error.unwrap().code, -32700);
    assert_eq!(parse.id, Value::Null);

    let unknown = server
        .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#)
        .await
        .unwrap();
    assert_eq!(unknown.error.unwrap().code, -32601);
    assert_eq!(unknown.id, json!(7));

    let params = server
        .handle_line(r#"{"jsonrpc":"2.0","id":8,"method":"tools/call","params":{"arguments":{}}}"#)
        .await
        .unwrap();
    assert_eq!(params.error.unwrap().code, -32602);
}

#[tokio::test(start_paused = true)]
async fn query_tool_caches_and_reports_stats() {
    let (mock, server) = setup();
    mock.on_query(
        "project.id IN (123) AND status IN ('Open')",
        json!({"items": [item(1, "Login fails")], "total": 1}),
    );
    let args = json!({"project_ids": [123], "statuses": ["Open"]});

    let first = call(&server, 1, "quarry_query_items", args.clone()).await;
    assert_eq!(first["isError"], false);
    let body = text_of(&first);
    assert_eq!(body["operation"], "query");
    assert_eq!(body["items"][0]["id"], 1);

    call(&server, 2, "quarry_query_items", args).await;
    let stats = text_of(&call(&server, 3, "quarry_get_stats", json!({})).await);
    assert_eq!(stats["api_calls"], 1);
    assert_eq!(stats["cache_hits"], 1);
    assert_eq!(mock.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn bypass_cache_argument_forces_a_call() {
    let (mock, server) = setup();
    mock.on(Method::Get, "/v3/items/5", item(5, "x"));

    call(&server, 1, "quarry_get_item_with_context", json!({"item_id": 5})).await;
    call(
        &server,
        2,
        "quarry_get_item_with_context",
        json!({"item_id": 5, "bypass_cache": true}),
    )
    .await;

    assert_eq!(mock.calls_to(Method::Get, "/v3/items/5"), 2);
}

#[tokio::test(start_paused = true)]
async fn schema_violations_are_tool_errors_without_calls() {
    let (mock, server) = setup();

    let result = call(&server, 1, "quarry_update_item", json!({"item_id": 5})).await;
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("fields"));

    let result = call(
        &server,
        2,
        "quarry_query_items",
        json!({"project_ids": ["abc"]}),
    )
    .await;
    assert_eq!(result["isError"], true);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_tool_and_action_are_reported_in_band() {
    let (mock, server) = setup();

    let result = call(&server, 1, "quarry_delete_everything", json!({})).await;
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Unknown tool"));

    let result = call(
        &server,
        2,
        "quarry_manage_associations",
        json!({"action": "delete"}),
    )
    .await;
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("association_id"));
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_a_tool_error() {
    let (mock, server) = setup();
    mock.fail(Method::Get, "/v3/trackers/4", 502, "bad gateway");

    let result = call(&server, 1, "quarry_get_tracker_complete", json!({"tracker_id": 4})).await;

    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: transport"));
    assert!(text.contains("/v3/trackers/4"));
}

#[tokio::test(start_paused = true)]
async fn batch_fields_project_each_item() {
    let (mock, server) = setup();
    mock.on_query("item.id IN (1, 2)", json!([item(1, "a"), item(2, "b")]));

    let result = call(
        &server,
        1,
        "quarry_get_items_batch",
        json!({"item_ids": [2, 1, 2], "fields": ["name"]}),
    )
    .await;

    let body = text_of(&result);
    assert_eq!(body["items"][0], json!({"id": 1, "name": "a"}));
    assert_eq!(body["missing"], json!([]));
}

#[tokio::test(start_paused = true)]
async fn bulk_update_and_clear_cache_tools() {
    let (mock, server) = setup();
    mock.on(Method::Put, "/v3/items/fields", json!({"updated": 2}));
    mock.on(Method::Get, "/v3/projects/5", json!({"id": 5}));

    call(
        &server,
        1,
        "quarry_get_project_complete",
        json!({"project_id": 5, "include_trackers": false}),
    )
    .await;
    let result = call(
        &server,
        2,
        "quarry_bulk_update_items",
        json!({"updates": [
            {"itemId": 1, "fields": {"status": "Done"}},
            {"itemId": 2, "fields": {"status": "Done"}}
        ]}),
    )
    .await;
    assert_eq!(result["isError"], false);
    assert_eq!(text_of(&result)["operation"], "bulk_update");

    let cleared = text_of(&call(&server, 3, "quarry_clear_cache", json!({"pattern": "projects/"})).await);
    assert_eq!(cleared["removed"], 1);
    assert!(server.orchestrator().cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn serve_answers_each_request_line() {
    let (_, server) = setup();
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
        "\n",
    );
    let mut output = Vec::new();

    server.serve(input.as_bytes(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[0]["result"], json!({}));
    assert_eq!(lines[1]["id"], 2);
}

#[tokio::test(start_paused = true)]
async fn serve_survives_a_non_utf8_line() {
    let (_, server) = setup();
    let mut input = b"\xff\xfe\n".to_vec();
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#);
    input.push(b'\n');
    let mut output = Vec::new();

    server.serve(input.as_slice(), &mut output).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["error"]["code"], -32700);
    assert_eq!(lines[0]["id"], Value::Null);
    assert_eq!(lines[1]["id"], 7);
    assert_eq!(lines[1]["result"], json!({}));
}

#[tokio::test(start_paused = true)]
async fn wiki_tool_renders_without_caching() {
    let (mock, server) = setup();
    mock.on(
        Method::Post,
        "/v3/projects/3/wiki2html",
        json!({"html": "<h1>Title</h1>"}),
    );
    let args = json!({"project_id": 3, "content": "!1 Title"});

    call(&server, 1, "quarry_convert_wiki_to_html", args.clone()).await;
    let result = call(&server, 2, "quarry_convert_wiki_to_html", args).await;

    let body = text_of(&result);
    assert_eq!(body["operation"], "wiki");
    assert_eq!(body["html"], "<h1>Title</h1>");
    assert_eq!(mock.call_count(), 2);
    assert!(server.orchestrator().cache().is_empty());
}
