//! End-to-end scenarios against a scripted transport.

use quarry_core::{FieldMap, FilterCriteria, ItemId, ProjectId, QuarryError, TrackerId};
use quarry_orchestrator::{
    ItemContextRequest, ItemUpdate, Orchestrator, ProjectRequest, ReadOptions, TrackerRequest,
};
use quarry_test_utils::{item, script_cyclic_hierarchy, test_config, MockTransport};
use quarry_transport::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (Arc<MockTransport>, Orchestrator) {
    let mock = Arc::new(MockTransport::new());
    let orch = Orchestrator::with_transport(&test_config(), mock.clone()).unwrap();
    (mock, orch)
}

fn status(value: &str) -> FieldMap {
    let mut fields = FieldMap::new();
    fields.insert("status".to_string(), json!(value));
    fields
}

#[tokio::test(start_paused = true)]
async fn repeated_query_is_served_from_cache() {
    let (mock, orch) = setup();
    mock.on_query(
        "project.id IN (123) AND status IN ('Open')",
        json!({"items": [item(1, "Login fails")], "total": 1}),
    );
    let criteria = FilterCriteria::new()
        .with_projects([123])
        .with_statuses(["Open"]);

    let first = orch.query_items(&criteria, ReadOptions::default()).await.unwrap();
    let stats = orch.stats();
    assert_eq!((stats.api_calls, stats.cache_hits, stats.cache_misses), (1, 0, 1));

    let second = orch.query_items(&criteria, ReadOptions::default()).await.unwrap();
    let stats = orch.stats();
    assert_eq!(stats.api_calls, 1, "second call made no primitive call");
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn query_cache_expires_after_item_query_ttl() {
    let (mock, orch) = setup();
    mock.on_query("status IN ('Open')", json!([]));
    let criteria = FilterCriteria::new().with_statuses(["Open"]);

    orch.query_items(&criteria, ReadOptions::default()).await.unwrap();
    tokio::time::advance(Duration::from_secs(181)).await;
    orch.query_items(&criteria, ReadOptions::default()).await.unwrap();

    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn update_invalidates_cached_item() {
    let (mock, orch) = setup();
    mock.on(Method::Get, "/v3/items/100", item(100, "Login fails"));
    mock.on(Method::Put, "/v3/items/100/fields", json!({"id": 100}));
    let request = ItemContextRequest::new(ItemId::new(100));

    orch.get_item_with_context(&request, ReadOptions::default()).await.unwrap();
    orch.update_item_fields(ItemId::new(100), status("Closed"))
        .await
        .unwrap();
    let misses_before = orch.stats().cache_misses;
    orch.get_item_with_context(&request, ReadOptions::default()).await.unwrap();

    assert_eq!(orch.stats().cache_misses, misses_before + 1);
    assert_eq!(mock.calls_to(Method::Get, "/v3/items/100"), 2);
}

#[tokio::test(start_paused = true)]
async fn update_invalidates_batches_and_children_listing_the_item() {
    let (mock, orch) = setup();
    mock.on_query("item.id IN (100, 200)", json!([item(100, "a"), item(200, "b")]));
    mock.on(Method::Get, "/v3/items/7/children", json!([item(100, "a")]));
    mock.on(Method::Put, "/v3/items/100/fields", json!({}));

    let ids = [ItemId::new(200), ItemId::new(100)];
    orch.get_items_batch(&ids, ReadOptions::default()).await.unwrap();
    let mut request = ItemContextRequest::new(ItemId::new(7));
    request.include_children = true;
    mock.on(Method::Get, "/v3/items/7", item(7, "parent"));
    orch.get_item_with_context(&request, ReadOptions::default()).await.unwrap();
    assert!(orch.cache().get("items/batch/100,200").is_some());
    assert!(orch.cache().get("items/7/children").is_some());

    orch.update_item_fields(ItemId::new(100), status("Closed"))
        .await
        .unwrap();

    assert!(orch.cache().get("items/batch/100,200").is_none());
    assert!(orch.cache().get("items/7/children").is_none());
    assert!(orch.cache().get("items/7/item").is_some());
}

#[tokio::test(start_paused = true)]
async fn prefix_invalidation_keeps_other_prefixes() {
    let (mock, orch) = setup();
    mock.on(Method::Get, "/v3/projects/5", json!({"id": 5}));
    mock.on(Method::Get, "/v3/projects/5/trackers", json!([{"id": 10}]));
    mock.on(Method::Get, "/v3/items/1", item(1, "a"));
    mock.on_query(
        "project.id IN (5) AND tracker.id IN (10)",
        json!({"items": [item(1, "a")]}),
    );

    let mut project = ProjectRequest::new(ProjectId::new(5));
    project.include_items = true;
    orch.get_project_complete(&project, ReadOptions::default()).await.unwrap();
    orch.get_item_with_context(&ItemContextRequest::new(ItemId::new(1)), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(orch.stats().cache_size, 4);

    let removed = orch.invalidate(Some("items/"));

    assert_eq!(removed, 2);
    assert!(orch.cache().get("projects/5").is_some());
    assert!(orch.cache().get("projects/5/trackers").is_some());
    assert_eq!(orch.stats().cache_size, 2);
}

#[tokio::test(start_paused = true)]
async fn bulk_update_is_one_call_and_invalidates_every_item() {
    let (mock, orch) = setup();
    for id in [1u64, 2, 3] {
        mock.on(Method::Get, format!("/v3/items/{}", id), item(id, "x"));
    }
    mock.on(Method::Put, "/v3/items/fields", json!({"updated": 3}));

    for id in [1u64, 2, 3] {
        orch.get_item_with_context(&ItemContextRequest::new(ItemId::new(id)), ReadOptions::default())
            .await
            .unwrap();
    }
    mock.reset_calls();

    let updates = [1u64, 2, 3]
        .into_iter()
        .map(|id| ItemUpdate::new(ItemId::new(id), status("Closed")))
        .collect();
    let outcome = orch.bulk_update_items(updates).await.unwrap();

    assert_eq!(mock.call_count(), 1);
    let body = mock.calls()[0].body.clone().unwrap();
    assert_eq!(body["updates"].as_array().unwrap().len(), 3);
    assert_eq!(body["updates"][0]["itemId"], 1);
    assert!(!outcome.is_partial_failure());
    for id in [1u64, 2, 3] {
        assert!(orch.cache().get(&format!("items/{}/item", id)).is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn hierarchy_stops_at_max_depth_despite_cycles() {
    let (mock, orch) = setup();
    script_cyclic_hierarchy(&mock, 10);

    let tree = orch
        .get_hierarchy_tree(TrackerId::new(10), 2, ReadOptions::default())
        .await
        .unwrap();

    assert_eq!(tree.depth(), 2);
    assert_eq!(tree.node_count(), 4);
    assert_eq!(tree.levels_visited, 2);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn hierarchy_cuts_cycles_and_ends_when_frontier_empties() {
    let (mock, orch) = setup();
    script_cyclic_hierarchy(&mock, 10);

    let tree = orch
        .get_hierarchy_tree(TrackerId::new(10), 10, ReadOptions::default())
        .await
        .unwrap();

    assert_eq!(tree.node_count(), 5);
    assert_eq!(tree.cycles_cut, 2);
    assert_eq!(tree.depth(), 3);
    assert_eq!(tree.levels_visited, 4);
    assert_eq!(mock.call_count(), 4);

    let ids: Vec<u64> = tree.roots.iter().map(|n| n.id.get()).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(tree.roots[1].children[0].children[0].id, ItemId::new(5));
}

#[tokio::test(start_paused = true)]
async fn hierarchy_of_depth_zero_makes_no_call() {
    let (mock, orch) = setup();
    let tree = orch
        .get_hierarchy_tree(TrackerId::new(10), 0, ReadOptions::default())
        .await
        .unwrap();
    assert!(tree.roots.is_empty());
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_not_cached_and_not_retried() {
    let (mock, orch) = setup();
    mock.fail(Method::Get, "/v3/trackers/4", 502, "bad gateway");

    let err = orch
        .get_tracker_complete(&TrackerRequest::new(TrackerId::new(4)), ReadOptions::default())
        .await
        .unwrap_err();

    match err {
        QuarryError::Transport(e) => {
            assert_eq!(e.endpoint(), "/v3/trackers/4");
            assert_eq!(e.status(), Some(502));
            assert!(e.is_retryable());
        }
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(mock.call_count(), 1);
    assert!(orch.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn validation_error_makes_no_call() {
    let (mock, orch) = setup();
    let criteria = FilterCriteria::new().with_custom("bad field!", json!("x"));

    let err = orch
        .query_items(&criteria, ReadOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "validation");
    assert_eq!(mock.call_count(), 0);
    assert_eq!(orch.stats().cache_misses, 0);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_delays_the_overflow_call() {
    let mock = Arc::new(MockTransport::new());
    mock.on(Method::Get, "/v3/projects/1", json!({"id": 1}));
    let config = test_config().with_max_calls_per_minute(3);
    let orch = Orchestrator::with_transport(&config, mock.clone()).unwrap();
    let bypass = ReadOptions::default().bypass();
    let request = ProjectRequest {
        project_id: ProjectId::new(1),
        include_trackers: false,
        include_items: false,
    };

    let start = tokio::time::Instant::now();
    for _ in 0..3 {
        orch.get_project_complete(&request, bypass).await.unwrap();
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(orch.stats().remaining_calls, 0);

    orch.get_project_complete(&request, bypass).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(mock.call_count(), 4);
}
