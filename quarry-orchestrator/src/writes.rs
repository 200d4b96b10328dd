//! Write operations.
//!
//! Writes always reach the remote service, are never cached, and invalidate
//! the affected reads only once the service has accepted them.

use crate::orchestrator::Orchestrator;
use crate::requests::{AssociationAction, CreateItemRequest, ItemUpdate, ReadOptions};
use quarry_cache::{keys, tags};
use quarry_core::{
    AssociationOutcome, BulkUpdateOutcome, FieldMap, ItemId, MutationAck, MutationKind,
    QuarryResult, ValidationError,
};
use quarry_transport::TransportRequest;
use serde_json::{json, Value};

impl Orchestrator {
    /// Create an item in a tracker. Exactly one call.
    #[tracing::instrument(skip(self, request), fields(tracker_id = %request.tracker_id))]
    pub async fn create_item(&self, request: CreateItemRequest) -> QuarryResult<MutationAck> {
        request.validate()?;
        let tracker_id = request.tracker_id;
        let parent_id = request.parent_id;

        let mut body: serde_json::Map<String, Value> = request.fields.into_iter().collect();
        body.insert("tracker".to_string(), json!({ "id": tracker_id }));
        body.insert("summary".to_string(), Value::String(request.summary));
        if let Some(description) = request.description {
            body.insert("description".to_string(), Value::String(description));
        }
        if let Some(parent) = parent_id {
            body.insert("parent".to_string(), json!({ "id": parent }));
        }

        let response = self
            .call(TransportRequest::post(
                format!("/v3/trackers/{}/items", tracker_id),
                Value::Object(body),
            ))
            .await?;

        let cache = self.cache();
        cache.invalidate(Some(keys::QUERY_PREFIX));
        cache.remove(&keys::tracker_roots(tracker_id));
        if let Some(parent) = parent_id {
            cache.remove(&keys::item_children(parent));
        }

        let item_id = crate::payload::item_id(&response);
        tracing::info!(item_id = ?item_id.map(ItemId::get), "item created");
        Ok(MutationAck {
            kind: MutationKind::Created,
            item_id,
            response,
        })
    }

    /// Replace fields of one item. Exactly one call, then the item's reads are dropped.
    #[tracing::instrument(skip(self, fields), fields(field_count = fields.len()))]
    pub async fn update_item_fields(
        &self,
        item_id: ItemId,
        fields: FieldMap,
    ) -> QuarryResult<MutationAck> {
        if fields.is_empty() {
            return Err(ValidationError::empty("fields").into());
        }

        let response = self
            .call(TransportRequest::put(
                format!("/v3/items/{}/fields", item_id),
                Value::Object(fields.into_iter().collect()),
            ))
            .await?;

        self.invalidate_items([item_id]);
        Ok(MutationAck {
            kind: MutationKind::Updated,
            item_id: Some(item_id),
            response,
        })
    }

    /// Update many items in one batched call, however many there are.
    ///
    /// Any per-item failures the service reports are returned alongside the
    /// raw response; every listed item is invalidated either way.
    #[tracing::instrument(skip(self, updates), fields(updates = updates.len()))]
    pub async fn bulk_update_items(
        &self,
        updates: Vec<ItemUpdate>,
    ) -> QuarryResult<BulkUpdateOutcome> {
        if updates.is_empty() {
            return Err(ValidationError::empty("updates").into());
        }
        if let Some(update) = updates.iter().find(|u| u.fields.is_empty()) {
            return Err(
                ValidationError::empty(format!("updates[{}].fields", update.item_id)).into(),
            );
        }

        let item_ids: Vec<ItemId> = updates.iter().map(|u| u.item_id).collect();
        let body = json!({
            "updates": updates
                .into_iter()
                .map(|u| json!({ "itemId": u.item_id, "fields": u.fields }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .call(TransportRequest::put("/v3/items/fields", body))
            .await?;

        self.invalidate_items(item_ids.iter().copied());
        let failures = crate::payload::failures(&response);
        if !failures.is_empty() {
            tracing::warn!(
                failed = failures.len(),
                requested = item_ids.len(),
                "bulk update partially failed"
            );
        }

        Ok(BulkUpdateOutcome {
            item_ids,
            failures,
            response,
        })
    }

    /// Create, list or delete item associations. Exactly one call on a cold cache.
    #[tracing::instrument(skip(self, action), fields(action = action.name()))]
    pub async fn manage_associations(
        &self,
        action: AssociationAction,
    ) -> QuarryResult<AssociationOutcome> {
        match action {
            AssociationAction::Create {
                from,
                to,
                association_type,
            } => {
                let response = self
                    .call(TransportRequest::post(
                        "/v3/associations",
                        json!({
                            "from": { "id": from },
                            "to": { "id": to },
                            "type": association_type,
                        }),
                    ))
                    .await?;
                self.invalidate_items([from, to]);
                Ok(AssociationOutcome::Created {
                    from,
                    to,
                    association_type,
                    response,
                })
            }
            AssociationAction::Get { item_id } => Ok(AssociationOutcome::Listed {
                item_id,
                relations: self.read_relations(item_id, ReadOptions::default()).await?,
            }),
            AssociationAction::Delete { association_id } => {
                let response = self
                    .call(TransportRequest::delete(format!(
                        "/v3/associations/{}",
                        association_id
                    )))
                    .await?;
                // The service does not say which items the association joined.
                self.cache().invalidate_tag(tags::RELATIONS);
                Ok(AssociationOutcome::Deleted {
                    association_id,
                    response,
                })
            }
        }
    }
}
