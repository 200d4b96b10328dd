//! Quarry Test Utilities
//!
//! Shared test infrastructure for the Quarry workspace:
//! - A scripted [`MockTransport`] that records every primitive call
//! - Proptest generators for filter criteria
//! - Fixtures for configuration and remote payloads

pub use quarry_core::{FilterCriteria, ItemId, ProjectId, QuarryConfig, TrackerId};
pub use quarry_transport::{Method, Transport, TransportRequest};

pub use fixtures::*;
pub use generators::*;

use async_trait::async_trait;
use quarry_core::TransportError;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Path the orchestrator sends translated queries to.
pub const QUERY_PATH: &str = "/v3/items/query";

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

#[derive(Debug, Clone)]
enum Matcher {
    Path { method: Method, path: String },
    /// POST to the query endpoint carrying exactly this `queryString`.
    Query(String),
}

impl Matcher {
    fn matches(&self, request: &TransportRequest) -> bool {
        match self {
            Self::Path { method, path } => request.method == *method && request.path == *path,
            Self::Query(query) => {
                request.method == Method::Post
                    && request.path == QUERY_PATH
                    && request
                        .body
                        .as_ref()
                        .and_then(|body| body.get("queryString"))
                        .and_then(Value::as_str)
                        == Some(query.as_str())
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Fail { status: u16, message: String },
}

/// Transport serving scripted responses.
///
/// Routes match on method and path, or on the query string of a query call.
/// The most recently registered matching route wins, so a test can change a
/// response midway. Unmatched requests fail with a 404 status error.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<Vec<(Matcher, Reply)>>,
    calls: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method path` with `response`.
    pub fn on(&self, method: Method, path: impl Into<String>, response: Value) -> &Self {
        self.route(
            Matcher::Path {
                method,
                path: path.into(),
            },
            Reply::Ok(response),
        )
    }

    /// Answer the query call carrying `query_string` with `response`.
    pub fn on_query(&self, query_string: impl Into<String>, response: Value) -> &Self {
        self.route(Matcher::Query(query_string.into()), Reply::Ok(response))
    }

    /// Fail `method path` with an HTTP status.
    pub fn fail(
        &self,
        method: Method,
        path: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) -> &Self {
        self.route(
            Matcher::Path {
                method,
                path: path.into(),
            },
            Reply::Fail {
                status,
                message: message.into(),
            },
        )
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<TransportRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Requests received for one method and path.
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn route(&self, matcher: Matcher, reply: Reply) -> &Self {
        lock(&self.routes).push((matcher, reply));
        self
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, request: TransportRequest) -> Result<Value, TransportError> {
        lock(&self.calls).push(request.clone());
        let reply = lock(&self.routes)
            .iter()
            .rev()
            .find(|(matcher, _)| matcher.matches(&request))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Fail { status, message }) => Err(request.status_error(status, message)),
            None => Err(request.status_error(404, format!("no scripted response for {}", request))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Quarry inputs.

    use super::*;
    use proptest::collection::{btree_map, btree_set, vec};
    use proptest::option;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// A non-empty display name, sometimes carrying quotes or backslashes.
    pub fn arb_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 '\\\\-]{0,15}"
    }

    /// A custom field name the translator accepts.
    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,10}(\\.[a-z]{1,5})?"
    }

    fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            arb_name().prop_map(Value::from),
        ]
    }

    /// A scalar or a non-empty array of scalars.
    pub fn arb_custom_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            3 => arb_scalar(),
            1 => vec(arb_scalar(), 1..4).prop_map(Value::Array),
        ]
    }

    fn arb_ids() -> impl Strategy<Value = BTreeSet<u64>> {
        btree_set(1u64..100_000, 1..5)
    }

    fn arb_names() -> impl Strategy<Value = BTreeSet<String>> {
        btree_set(arb_name(), 1..4)
    }

    /// Criteria the translator always accepts.
    pub fn arb_filter_criteria() -> impl Strategy<Value = FilterCriteria> {
        (
            option::of(arb_ids()),
            option::of(arb_ids()),
            option::of(arb_names()),
            option::of(arb_names()),
            option::of(arb_names()),
            btree_map(arb_field_name(), arb_custom_value(), 0..4),
            option::of(btree_set(arb_field_name(), 1..4)),
            option::of(1u32..1000),
        )
            .prop_map(
                |(projects, trackers, tracker_names, item_types, statuses, custom, include, max)| {
                    let mut criteria = FilterCriteria::new();
                    criteria.project_ids =
                        projects.map(|ids| ids.into_iter().map(ProjectId::new).collect());
                    criteria.tracker_ids =
                        trackers.map(|ids| ids.into_iter().map(TrackerId::new).collect());
                    criteria.tracker_names = tracker_names;
                    criteria.item_types = item_types;
                    criteria.statuses = statuses;
                    criteria.custom_filters = custom;
                    criteria.include_fields = include;
                    criteria.max_results = max;
                    criteria
                },
            )
    }

    /// A list of item ids, possibly with repeats.
    pub fn arb_item_ids() -> impl Strategy<Value = Vec<ItemId>> {
        vec((1u64..500).prop_map(ItemId::new), 1..20)
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built configuration and remote payloads.

    use super::*;
    use serde_json::json;

    pub const TEST_BASE_URL: &str = "https://tracker.example.com/api";
    pub const TEST_API_KEY: &str = "test-key";

    /// Valid configuration with default limits.
    pub fn test_config() -> QuarryConfig {
        match QuarryConfig::new(TEST_BASE_URL, TEST_API_KEY) {
            Ok(config) => config,
            Err(e) => panic!("fixture configuration rejected: {}", e),
        }
    }

    /// A work item as the remote service returns it.
    pub fn item(id: u64, summary: &str) -> Value {
        json!({
            "id": id,
            "name": summary,
            "status": {"name": "Open"},
            "tracker": {"id": 10},
        })
    }

    /// A work item whose parent is `parent`.
    pub fn child_item(id: u64, parent: u64) -> Value {
        json!({
            "id": id,
            "name": format!("Item {}", id),
            "parent": {"id": parent},
        })
    }

    /// Script a tracker hierarchy whose parent links loop back on themselves.
    ///
    /// ```text
    /// depth 1:  1        2
    /// depth 2:  3        4
    /// depth 3:  1 (cut)  5
    /// depth 4:           4 (cut)
    /// ```
    ///
    /// Five distinct items; a full walk visits four levels and cuts two repeats.
    pub fn script_cyclic_hierarchy(mock: &MockTransport, tracker: u64) {
        mock.on(
            Method::Get,
            format!("/v3/trackers/{}/children", tracker),
            json!({"items": [{"id": 1, "name": "Epic A"}, {"id": 2, "name": "Epic B"}]}),
        );
        mock.on_query(
            "parent.id IN (1, 2)",
            json!({"items": [child_item(3, 1), child_item(4, 2)]}),
        );
        mock.on_query(
            "parent.id IN (3, 4)",
            json!({"items": [child_item(1, 3), child_item(5, 4)]}),
        );
        mock.on_query("parent.id IN (5)", json!({"items": [child_item(4, 5)]}));
    }
}
