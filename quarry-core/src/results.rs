//! Operation result types.
//!
//! Remote entities (projects, trackers, items, relations) stay as opaque JSON
//! values; the structure around them is typed per operation so callers can
//! match on the shape of what came back.

use crate::{AssociationId, ItemId, ProjectId, TrackerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of any orchestrator operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OperationResult {
    Projects(ProjectList),
    Query(QueryResult),
    Project(ProjectBundle),
    Tracker(TrackerBundle),
    Batch(ItemBatch),
    ItemContext(ItemContext),
    Mutation(MutationAck),
    BulkUpdate(BulkUpdateOutcome),
    Association(AssociationOutcome),
    Hierarchy(HierarchyTree),
    Wiki(WikiRendering),
}

macro_rules! impl_into_operation_result {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for OperationResult {
                fn from(value: $ty) -> Self {
                    OperationResult::$variant(value)
                }
            }
        )*
    };
}

impl_into_operation_result!(
    ProjectList => Projects,
    QueryResult => Query,
    ProjectBundle => Project,
    TrackerBundle => Tracker,
    ItemBatch => Batch,
    ItemContext => ItemContext,
    MutationAck => Mutation,
    BulkUpdateOutcome => BulkUpdate,
    AssociationOutcome => Association,
    HierarchyTree => Hierarchy,
    WikiRendering => Wiki,
);

/// One page of the project listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectList {
    pub page: u32,
    pub page_size: u32,
    pub projects: Vec<Value>,
}

/// Items matched by a single translated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Query string that was sent.
    pub expression: String,
    pub items: Vec<Value>,
    /// Total match count reported by the remote service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBundle {
    pub project_id: ProjectId,
    pub project: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trackers: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerBundle {
    pub tracker_id: TrackerId,
    pub tracker: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemBatch {
    pub items: Vec<Value>,
    /// Requested ids the remote service did not return.
    pub missing: Vec<ItemId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemContext {
    pub item_id: ItemId,
    pub item: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<Value>>,
    /// `Some(Value::Null)` never appears: a missing parent is `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Created,
    Updated,
}

/// Acknowledgment of a single-item write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationAck {
    pub kind: MutationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    /// Raw acknowledgment returned by the remote service.
    pub response: Value,
}

/// Outcome of one batched field update.
///
/// The remote contract for partial failure is not all-or-nothing, so the raw
/// response is kept and any per-item failure entries it reports are surfaced
/// separately instead of being folded into a single success flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkUpdateOutcome {
    pub item_ids: Vec<ItemId>,
    pub failures: Vec<Value>,
    pub response: Value,
}

impl BulkUpdateOutcome {
    pub fn requested(&self) -> usize {
        self.item_ids.len()
    }

    pub fn is_partial_failure(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AssociationOutcome {
    Created {
        from: ItemId,
        to: ItemId,
        association_type: String,
        response: Value,
    },
    Listed {
        item_id: ItemId,
        relations: Vec<Value>,
    },
    Deleted {
        association_id: AssociationId,
        response: Value,
    },
}

/// A node in a tracker hierarchy. Top-level items have depth 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: ItemId,
    pub depth: u32,
    pub item: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Deepest depth found in this subtree.
    pub fn max_depth(&self) -> u32 {
        self.children
            .iter()
            .map(HierarchyNode::max_depth)
            .max()
            .unwrap_or(self.depth)
    }

    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(HierarchyNode::node_count)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyTree {
    pub tracker_id: TrackerId,
    pub max_depth: u32,
    pub roots: Vec<HierarchyNode>,
    /// Levels that required a remote call.
    pub levels_visited: u32,
    /// Repeated ids dropped during the walk.
    pub cycles_cut: usize,
}

impl HierarchyTree {
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(HierarchyNode::node_count).sum()
    }

    pub fn depth(&self) -> u32 {
        self.roots.iter().map(HierarchyNode::max_depth).max().unwrap_or(0)
    }
}

/// Wiki markup rendered to HTML by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikiRendering {
    pub project_id: ProjectId,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: u64, depth: u32, children: Vec<HierarchyNode>) -> HierarchyNode {
        HierarchyNode {
            id: ItemId::new(id),
            depth,
            item: json!({"id": id}),
            children,
        }
    }

    #[test]
    fn test_operation_result_is_tagged() {
        let result: OperationResult = ItemBatch {
            items: vec![json!({"id": 1})],
            missing: vec![ItemId::new(2)],
        }
        .into();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["operation"], "batch");
        assert_eq!(value["missing"], json!([2]));
    }

    #[test]
    fn test_hierarchy_depth_and_count() {
        let tree = HierarchyTree {
            tracker_id: TrackerId::new(9),
            max_depth: 3,
            roots: vec![node(1, 1, vec![node(2, 2, vec![node(3, 3, vec![])])]), node(4, 1, vec![])],
            levels_visited: 3,
            cycles_cut: 0,
        };
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_bulk_outcome_partial_failure() {
        let outcome = BulkUpdateOutcome {
            item_ids: vec![ItemId::new(1), ItemId::new(2)],
            failures: vec![json!({"itemId": 2, "message": "locked"})],
            response: json!({}),
        };
        assert_eq!(outcome.requested(), 2);
        assert!(outcome.is_partial_failure());
    }

    #[test]
    fn test_association_outcome_serializes_action() {
        let outcome = AssociationOutcome::Deleted {
            association_id: AssociationId::new(5),
            response: Value::Null,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["action"], "deleted");
        assert_eq!(value["association_id"], 5);
    }
}
