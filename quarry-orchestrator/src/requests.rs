//! Operation inputs.
//!
//! These deserialize from the JSON arguments a tool caller sends, with the
//! same defaults the operations apply when a flag is omitted.

use quarry_core::{
    AssociationId, FieldMap, ItemId, ProjectId, TrackerId, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-call cache behavior for read operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// TTL for entries stored by this call; `None` uses the read family's default.
    pub ttl: Option<Duration>,
    /// Skip the cache lookup. The fresh response still replaces the cached entry.
    pub bypass_cache: bool,
}

impl ReadOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn bypass(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectRequest {
    pub project_id: ProjectId,
    #[serde(default = "default_true")]
    pub include_trackers: bool,
    #[serde(default)]
    pub include_items: bool,
}

impl ProjectRequest {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            include_trackers: true,
            include_items: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackerRequest {
    pub tracker_id: TrackerId,
    #[serde(default = "default_true")]
    pub include_items: bool,
    #[serde(default)]
    pub include_fields_metadata: bool,
    /// Page size of the items query; defaults to 500.
    #[serde(default)]
    pub max_items: Option<u32>,
}

impl TrackerRequest {
    pub fn new(tracker_id: TrackerId) -> Self {
        Self {
            tracker_id,
            include_items: true,
            include_fields_metadata: false,
            max_items: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemContextRequest {
    pub item_id: ItemId,
    #[serde(default)]
    pub include_children: bool,
    #[serde(default)]
    pub include_relations: bool,
    #[serde(default)]
    pub include_parent: bool,
}

impl ItemContextRequest {
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            include_children: false,
            include_relations: false,
            include_parent: false,
        }
    }

    pub fn with_everything(mut self) -> Self {
        self.include_children = true;
        self.include_relations = true;
        self.include_parent = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateItemRequest {
    pub tracker_id: TrackerId,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Extra item fields, sent alongside summary and description.
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub parent_id: Option<ItemId>,
}

impl CreateItemRequest {
    pub fn new(tracker_id: TrackerId, summary: impl Into<String>) -> Self {
        Self {
            tracker_id,
            summary: summary.into(),
            description: None,
            fields: FieldMap::new(),
            parent_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.summary.trim().is_empty() {
            return Err(ValidationError::empty("summary"));
        }
        for reserved in ["tracker", "parent"] {
            if self.fields.contains_key(reserved) {
                return Err(ValidationError::invalid(
                    format!("fields.{}", reserved),
                    "set through tracker_id / parent_id instead",
                ));
            }
        }
        Ok(())
    }
}

/// One entry of a bulk field update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemUpdate {
    pub item_id: ItemId,
    pub fields: FieldMap,
}

impl ItemUpdate {
    pub fn new(item_id: ItemId, fields: FieldMap) -> Self {
        Self { item_id, fields }
    }
}

// ============================================================================
// ASSOCIATIONS
// ============================================================================

/// Association type used when the caller names none.
pub const DEFAULT_ASSOCIATION_TYPE: &str = "related";

/// What `manage_associations` should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationAction {
    Create {
        from: ItemId,
        to: ItemId,
        association_type: String,
    },
    Get {
        item_id: ItemId,
    },
    Delete {
        association_id: AssociationId,
    },
}

impl AssociationAction {
    pub const NAMES: [&'static str; 3] = ["create", "get", "delete"];

    /// Build an action from its name and the ids it needs.
    ///
    /// `get` lists the relations of `from`. Unknown names and missing ids are
    /// rejected before any call is made.
    pub fn parse(
        action: &str,
        from: Option<ItemId>,
        to: Option<ItemId>,
        association_id: Option<AssociationId>,
        association_type: Option<String>,
    ) -> Result<Self, ValidationError> {
        match action.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create {
                from: from.ok_or_else(|| ValidationError::missing("from_item_id"))?,
                to: to.ok_or_else(|| ValidationError::missing("to_item_id"))?,
                association_type: association_type
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ASSOCIATION_TYPE.to_string()),
            }),
            "get" => Ok(Self::Get {
                item_id: from.ok_or_else(|| ValidationError::missing("from_item_id"))?,
            }),
            "delete" => Ok(Self::Delete {
                association_id: association_id
                    .ok_or_else(|| ValidationError::missing("association_id"))?,
            }),
            _ => Err(ValidationError::UnknownAction {
                action: action.to_string(),
                expected: Self::NAMES.join(", "),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Get { .. } => "get",
            Self::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_association_actions() {
        let create = AssociationAction::parse(
            "create",
            Some(ItemId::new(1)),
            Some(ItemId::new(2)),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            create,
            AssociationAction::Create {
                from: ItemId::new(1),
                to: ItemId::new(2),
                association_type: "related".to_string(),
            }
        );

        let get = AssociationAction::parse("GET", Some(ItemId::new(1)), None, None, None).unwrap();
        assert_eq!(get.name(), "get");

        let delete =
            AssociationAction::parse("delete", None, None, Some(AssociationId::new(9)), None)
                .unwrap();
        assert!(matches!(delete, AssociationAction::Delete { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_and_incomplete() {
        let err = AssociationAction::parse("link", None, None, None, None).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownAction { .. }));

        let err =
            AssociationAction::parse("create", Some(ItemId::new(1)), None, None, None).unwrap_err();
        assert!(matches!(err, ValidationError::RequiredFieldMissing { ref field } if field == "to_item_id"));

        assert!(AssociationAction::parse("delete", None, None, None, None).is_err());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let req: ProjectRequest = serde_json::from_value(json!({"project_id": 5})).unwrap();
        assert!(req.include_trackers);
        assert!(!req.include_items);

        let req: TrackerRequest = serde_json::from_value(json!({"tracker_id": 7})).unwrap();
        assert!(req.include_items);
        assert!(!req.include_fields_metadata);
        assert_eq!(req.max_items, None);

        assert!(serde_json::from_value::<ProjectRequest>(json!({"project_id": "five"})).is_err());
    }

    #[test]
    fn test_create_request_validation() {
        assert!(CreateItemRequest::new(TrackerId::new(1), "  ").validate().is_err());

        let mut req = CreateItemRequest::new(TrackerId::new(1), "Login fails");
        assert!(req.validate().is_ok());
        req.fields.insert("parent".to_string(), json!({"id": 3}));
        assert!(req.validate().is_err());
    }
}
