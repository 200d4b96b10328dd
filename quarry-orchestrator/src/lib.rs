//! Quarry Orchestrator - Request Orchestration
//!
//! Composite read and write operations over a work-item tracker's REST API.
//! Each operation is answered with as few primitive calls as the remote API
//! allows; reads are served from a TTL cache when possible, every call passes
//! the sliding-window rate governor, and writes invalidate the reads they
//! make stale.
//!
//! | Operation | Calls on a cold cache |
//! |---|---|
//! | [`Orchestrator::list_projects`] | 1 |
//! | [`Orchestrator::query_items`] | 1 |
//! | [`Orchestrator::get_project_complete`] | at most 3 |
//! | [`Orchestrator::get_tracker_complete`] | at most 3 |
//! | [`Orchestrator::get_items_batch`] | 1 (0 for an empty list) |
//! | [`Orchestrator::get_item_with_context`] | at most 4 |
//! | [`Orchestrator::create_item`] | 1 |
//! | [`Orchestrator::update_item_fields`] | 1 |
//! | [`Orchestrator::bulk_update_items`] | 1 |
//! | [`Orchestrator::manage_associations`] | 1 |
//! | [`Orchestrator::get_hierarchy_tree`] | one per level, at most `max_depth` |
//! | [`Orchestrator::convert_wiki_to_html`] | 1, never cached |

mod hierarchy;
mod orchestrator;
pub mod payload;
mod reads;
pub mod requests;
pub mod stats;
mod wiki;
mod writes;

pub use hierarchy::LEVEL_PAGE_SIZE;
pub use orchestrator::Orchestrator;
pub use reads::{DEFAULT_TRACKER_ITEMS, MAX_PROJECT_PAGE_SIZE, PROJECT_ITEMS_PAGE_SIZE};
pub use requests::{
    AssociationAction, CreateItemRequest, ItemContextRequest, ItemUpdate, ProjectRequest,
    ReadOptions, TrackerRequest, DEFAULT_ASSOCIATION_TYPE,
};
pub use stats::{StatsRecorder, StatsSnapshot};
