//! Breadth-first hierarchy walk.
//!
//! Level 1 is the tracker's root listing; each deeper level is a single
//! `parent.id IN (...)` query over the previous level's ids. The walk keeps a
//! visited set, so parent/child data that loops back on itself is cut rather
//! than followed, and it never asks for a level past `max_depth`.

use crate::orchestrator::Orchestrator;
use crate::payload;
use crate::requests::ReadOptions;
use quarry_core::{HierarchyNode, HierarchyTree, ItemId, QuarryResult, TrackerId};
use quarry_query::children_of;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Page size of each child-level query.
pub const LEVEL_PAGE_SIZE: u32 = 1000;

/// Items collected so far, keyed by id, with their children in arrival order.
#[derive(Default)]
struct Levels {
    items: BTreeMap<ItemId, (u32, Value)>,
    children: BTreeMap<ItemId, Vec<ItemId>>,
    roots: Vec<ItemId>,
    visited: HashSet<ItemId>,
    cycles_cut: usize,
}

impl Levels {
    /// Record an item unless the walk has seen it already.
    fn admit(&mut self, id: ItemId, depth: u32, item: Value, parent: Option<ItemId>) -> bool {
        if !self.visited.insert(id) {
            self.cycles_cut += 1;
            tracing::debug!(item_id = %id, depth, "repeated item cut from hierarchy");
            return false;
        }
        self.items.insert(id, (depth, item));
        match parent {
            Some(parent) => self.children.entry(parent).or_default().push(id),
            None => self.roots.push(id),
        }
        true
    }

    fn assemble(&mut self, id: ItemId) -> Option<HierarchyNode> {
        let (depth, item) = self.items.remove(&id)?;
        let children = self
            .children
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|child| self.assemble(child))
            .collect();
        Some(HierarchyNode {
            id,
            depth,
            item,
            children,
        })
    }
}

impl Orchestrator {
    /// Parent/child tree of a tracker, down to `max_depth` levels.
    ///
    /// Makes one call per level visited. `max_depth == 0` makes none.
    #[tracing::instrument(skip(self, options))]
    pub async fn get_hierarchy_tree(
        &self,
        tracker_id: TrackerId,
        max_depth: u32,
        options: ReadOptions,
    ) -> QuarryResult<HierarchyTree> {
        let mut levels = Levels::default();
        let mut levels_visited = 0;

        if max_depth > 0 {
            let roots = self.read_tracker_roots(tracker_id, options).await?;
            levels_visited = 1;

            let mut frontier = BTreeSet::new();
            for item in roots {
                if let Some(id) = payload::item_id(&item) {
                    if levels.admit(id, 1, item, None) {
                        frontier.insert(id);
                    }
                }
            }

            let mut depth = 1;
            while depth < max_depth && !frontier.is_empty() {
                depth += 1;
                let read = self
                    .run_query(
                        &children_of(&frontier),
                        LEVEL_PAGE_SIZE,
                        self.ttls().hierarchy,
                        options,
                    )
                    .await?;
                levels_visited += 1;

                let mut next = BTreeSet::new();
                for item in payload::entries(read.value()) {
                    let (Some(id), Some(parent)) = (payload::item_id(&item), payload::parent_id(&item))
                    else {
                        continue;
                    };
                    if !frontier.contains(&parent) {
                        continue;
                    }
                    if levels.admit(id, depth, item, Some(parent)) {
                        next.insert(id);
                    }
                }
                frontier = next;
            }
        }

        let roots = std::mem::take(&mut levels.roots)
            .into_iter()
            .filter_map(|id| levels.assemble(id))
            .collect();
        tracing::debug!(levels_visited, cycles_cut = levels.cycles_cut, "hierarchy walked");

        Ok(HierarchyTree {
            tracker_id,
            max_depth,
            roots,
            levels_visited,
            cycles_cut: levels.cycles_cut,
        })
    }
}
