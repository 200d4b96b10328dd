//! Read operations.
//!
//! Every primitive read goes through [`Orchestrator::cached_read`], so a
//! composite read makes at most one call per constituent and none when the
//! constituent is cached.

use crate::orchestrator::{query_request, CachePlan, Orchestrator};
use crate::payload;
use crate::requests::{ItemContextRequest, ProjectRequest, ReadOptions, TrackerRequest};
use quarry_cache::{keys, tags, CacheRead};
use quarry_core::{
    FilterCriteria, ItemBatch, ItemContext, ItemId, ProjectBundle, ProjectList, QuarryResult,
    QueryResult, TrackerBundle, TrackerId,
};
use quarry_query::{items_by_id, translate, DEFAULT_MAX_RESULTS};
use quarry_transport::TransportRequest;
use serde_json::Value;
use std::collections::BTreeSet;

/// Largest page the project listing accepts.
pub const MAX_PROJECT_PAGE_SIZE: u32 = 500;

/// Page size of the items query inside a project bundle.
pub const PROJECT_ITEMS_PAGE_SIZE: u32 = 1000;

/// Default page size of the items query inside a tracker bundle.
pub const DEFAULT_TRACKER_ITEMS: u32 = 500;

impl Orchestrator {
    /// One page of the project listing. Exactly one call on a cold cache.
    #[tracing::instrument(skip(self, options))]
    pub async fn list_projects(
        &self,
        page: u32,
        page_size: u32,
        options: ReadOptions,
    ) -> QuarryResult<ProjectList> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PROJECT_PAGE_SIZE);
        let read = self
            .cached_read(
                CachePlan::new(keys::project_list(page, page_size), self.ttls().project_list),
                options,
                TransportRequest::get("/v3/projects")
                    .with_query("page", page)
                    .with_query("pageSize", page_size),
            )
            .await?;

        Ok(ProjectList {
            page,
            page_size,
            projects: payload::entries(read.value()),
        })
    }

    /// Items matching `criteria`, fetched with a single translated query.
    #[tracing::instrument(skip(self, criteria, options))]
    pub async fn query_items(
        &self,
        criteria: &FilterCriteria,
        options: ReadOptions,
    ) -> QuarryResult<QueryResult> {
        let expression = translate(criteria)?;
        let page_size = criteria.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
        let read = self
            .run_query(&expression, page_size, self.ttls().item_query, options)
            .await?;

        let mut items = payload::entries(read.value());
        if let Some(fields) = criteria.include_fields.as_ref().filter(|f| !f.is_empty()) {
            items = items
                .iter()
                .map(|item| payload::project_fields(item, fields))
                .collect();
        }

        Ok(QueryResult {
            expression: expression.text().to_string(),
            total: payload::total(read.value()),
            items,
        })
    }

    /// A project with, optionally, its trackers and every item in them.
    ///
    /// At most three calls: project, trackers, and one query over all trackers.
    #[tracing::instrument(skip(self, options), fields(project_id = %request.project_id))]
    pub async fn get_project_complete(
        &self,
        request: &ProjectRequest,
        options: ReadOptions,
    ) -> QuarryResult<ProjectBundle> {
        let id = request.project_id;
        let project = self
            .cached_read(
                CachePlan::new(keys::project(id), self.default_ttl()),
                options,
                TransportRequest::get(format!("/v3/projects/{}", id)),
            )
            .await?
            .into_value();

        let trackers = if request.include_trackers || request.include_items {
            let read = self
                .cached_read(
                    CachePlan::new(keys::project_trackers(id), self.default_ttl()),
                    options,
                    TransportRequest::get(format!("/v3/projects/{}/trackers", id)),
                )
                .await?;
            Some(payload::entries(read.value()))
        } else {
            None
        };

        let items = match (&trackers, request.include_items) {
            (Some(trackers), true) => {
                let tracker_ids: Vec<u64> = trackers
                    .iter()
                    .filter_map(|t| t.get("id").and_then(Value::as_u64))
                    .collect();
                if tracker_ids.is_empty() {
                    Some(Vec::new())
                } else {
                    let criteria = FilterCriteria::new()
                        .with_projects([id.get()])
                        .with_trackers(tracker_ids);
                    let read = self
                        .run_query(
                            &translate(&criteria)?,
                            PROJECT_ITEMS_PAGE_SIZE,
                            self.ttls().item_query,
                            options,
                        )
                        .await?;
                    Some(payload::entries(read.value()))
                }
            }
            _ => None,
        };

        Ok(ProjectBundle {
            project_id: id,
            project,
            trackers: trackers.filter(|_| request.include_trackers),
            items,
        })
    }

    /// A tracker with, optionally, its items and field metadata. At most three calls.
    #[tracing::instrument(skip(self, options), fields(tracker_id = %request.tracker_id))]
    pub async fn get_tracker_complete(
        &self,
        request: &TrackerRequest,
        options: ReadOptions,
    ) -> QuarryResult<TrackerBundle> {
        let id = request.tracker_id;
        let tracker = self
            .cached_read(
                CachePlan::new(keys::tracker(id), self.default_ttl()),
                options,
                TransportRequest::get(format!("/v3/trackers/{}", id)),
            )
            .await?
            .into_value();

        let items = if request.include_items {
            let criteria = FilterCriteria::new().with_trackers([id.get()]);
            let page_size = request.max_items.unwrap_or(DEFAULT_TRACKER_ITEMS).max(1);
            let read = self
                .run_query(&translate(&criteria)?, page_size, self.ttls().item_query, options)
                .await?;
            Some(payload::entries(read.value()))
        } else {
            None
        };

        let fields = if request.include_fields_metadata {
            let read = self
                .cached_read(
                    CachePlan::new(keys::tracker_fields(id), self.ttls().field_metadata),
                    options,
                    TransportRequest::get(format!("/v3/trackers/{}/fields", id)),
                )
                .await?;
            Some(payload::entries(read.value()))
        } else {
            None
        };

        Ok(TrackerBundle {
            tracker_id: id,
            tracker,
            items,
            fields,
        })
    }

    /// Several items by id in one call. An empty request makes no call.
    #[tracing::instrument(skip(self, ids, options), fields(requested = ids.len()))]
    pub async fn get_items_batch(
        &self,
        ids: &[ItemId],
        options: ReadOptions,
    ) -> QuarryResult<ItemBatch> {
        let requested: BTreeSet<ItemId> = ids.iter().copied().collect();
        if requested.is_empty() {
            return Ok(ItemBatch {
                items: Vec::new(),
                missing: Vec::new(),
            });
        }

        let expression = items_by_id(&requested);
        let page_size = u32::try_from(requested.len()).unwrap_or(u32::MAX);
        let plan = requested.iter().fold(
            CachePlan::new(keys::batch(&requested), self.ttls().item_query).tagging_items(),
            |plan, id| plan.with_tag(tags::item(*id)),
        );
        let read = self
            .cached_read(plan, options, query_request(&expression, page_size))
            .await?;

        let items = payload::entries(read.value());
        let returned: BTreeSet<ItemId> = items.iter().filter_map(payload::item_id).collect();
        Ok(ItemBatch {
            missing: requested.difference(&returned).copied().collect(),
            items,
        })
    }

    /// An item plus whichever of its children, relations and parent were asked for.
    ///
    /// At most four calls: the item and one per requested relation kind.
    #[tracing::instrument(skip(self, options), fields(item_id = %request.item_id))]
    pub async fn get_item_with_context(
        &self,
        request: &ItemContextRequest,
        options: ReadOptions,
    ) -> QuarryResult<ItemContext> {
        let id = request.item_id;
        let item = self.read_item(id, options).await?.into_value();

        let children = if request.include_children {
            let read = self
                .cached_read(
                    CachePlan::new(keys::item_children(id), self.default_ttl())
                        .with_tag(tags::item(id))
                        .tagging_items(),
                    options,
                    TransportRequest::get(format!("/v3/items/{}/children", id)),
                )
                .await?;
            Some(payload::entries(read.value()))
        } else {
            None
        };

        let relations = if request.include_relations {
            Some(self.read_relations(id, options).await?)
        } else {
            None
        };

        let parent = match payload::parent_id(&item).filter(|_| request.include_parent) {
            Some(parent_id) => Some(self.read_item(parent_id, options).await?.into_value()),
            None => None,
        };

        Ok(ItemContext {
            item_id: id,
            item,
            children,
            relations,
            parent,
        })
    }

    pub(crate) async fn read_item(
        &self,
        id: ItemId,
        options: ReadOptions,
    ) -> QuarryResult<CacheRead<Value>> {
        self.cached_read(
            CachePlan::new(keys::item(id), self.default_ttl()).with_tag(tags::item(id)),
            options,
            TransportRequest::get(format!("/v3/items/{}", id)),
        )
        .await
    }

    pub(crate) async fn read_relations(
        &self,
        id: ItemId,
        options: ReadOptions,
    ) -> QuarryResult<Vec<Value>> {
        let read = self
            .cached_read(
                CachePlan::new(keys::item_relations(id), self.default_ttl())
                    .with_tag(tags::item(id))
                    .with_tag(tags::RELATIONS),
                options,
                TransportRequest::get(format!("/v3/items/{}/relations", id)),
            )
            .await?;
        Ok(payload::entries(read.value()))
    }

    pub(crate) async fn read_tracker_roots(
        &self,
        id: TrackerId,
        options: ReadOptions,
    ) -> QuarryResult<Vec<Value>> {
        let read = self
            .cached_read(
                CachePlan::new(keys::tracker_roots(id), self.ttls().hierarchy).tagging_items(),
                options,
                TransportRequest::get(format!("/v3/trackers/{}/children", id)),
            )
            .await?;
        Ok(payload::entries(read.value()))
    }
}
