//! Cache key scheme.
//!
//! Keys are a pure function of the read they address. Every key for a read
//! that returns item data starts with [`ITEMS_PREFIX`]; metadata reads start
//! with `projects/` or `trackers/`.

use quarry_core::{ItemId, ProjectId, QueryExpression, TrackerId};
use std::collections::BTreeSet;

pub const ITEMS_PREFIX: &str = "items/";
pub const QUERY_PREFIX: &str = "items/query/";
pub const PROJECTS_PREFIX: &str = "projects/";
pub const TRACKERS_PREFIX: &str = "trackers/";

pub fn project_list(page: u32, page_size: u32) -> String {
    format!("projects/list/page={}/size={}", page, page_size)
}

pub fn project(id: ProjectId) -> String {
    format!("projects/{}", id)
}

pub fn project_trackers(id: ProjectId) -> String {
    format!("projects/{}/trackers", id)
}

pub fn tracker(id: TrackerId) -> String {
    format!("trackers/{}", id)
}

pub fn tracker_fields(id: TrackerId) -> String {
    format!("trackers/{}/fields", id)
}

/// Prefix covering every per-item key of `id`.
pub fn item_prefix(id: ItemId) -> String {
    format!("items/{}/", id)
}

pub fn item(id: ItemId) -> String {
    format!("items/{}/item", id)
}

pub fn item_children(id: ItemId) -> String {
    format!("items/{}/children", id)
}

pub fn item_relations(id: ItemId) -> String {
    format!("items/{}/relations", id)
}

/// Root-level items of a tracker, as listed for hierarchy walks.
pub fn tracker_roots(id: TrackerId) -> String {
    format!("items/roots/{}", id)
}

/// Key for one page of a translated query.
pub fn query(expression: &QueryExpression, page_size: u32) -> String {
    format!("{}{}/size={}", QUERY_PREFIX, expression.digest(), page_size)
}

pub fn batch(ids: &BTreeSet<ItemId>) -> String {
    let ids = ids
        .iter()
        .map(ItemId::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!("items/batch/{}", ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_keys_share_prefix() {
        let id = ItemId::new(100);
        for key in [item(id), item_children(id), item_relations(id)] {
            assert!(key.starts_with(&item_prefix(id)));
            assert!(key.starts_with(ITEMS_PREFIX));
        }
        // 10 must not cover 100.
        assert!(!item(id).starts_with(&item_prefix(ItemId::new(10))));
    }

    #[test]
    fn test_item_bearing_keys_live_under_items() {
        let expr = QueryExpression::new("project.id > 0", "{}");
        let ids: BTreeSet<ItemId> = [3, 1].into_iter().map(ItemId::new).collect();
        assert!(query(&expr, 100).starts_with(QUERY_PREFIX));
        assert_eq!(batch(&ids), "items/batch/1,3");
        assert!(tracker_roots(TrackerId::new(5)).starts_with(ITEMS_PREFIX));
        assert!(project(ProjectId::new(5)).starts_with(PROJECTS_PREFIX));
        assert!(tracker_fields(TrackerId::new(5)).starts_with(TRACKERS_PREFIX));
    }

    #[test]
    fn test_query_key_includes_page_size() {
        let expr = QueryExpression::new("status IN ('Open')", "{}");
        assert_ne!(query(&expr, 100), query(&expr, 1000));
    }
}
