//! Response cache with explicit expiry and invalidation.
//!
//! Entries live in a concurrent map keyed by strings from [`keys`]. Reads past
//! an entry's TTL behave as misses and evict the entry on the spot; there is
//! no background sweeper. Writes elsewhere in the system make entries stale,
//! so every entry can be removed by key prefix or by tag.
//!
//! # Example
//!
//! ```ignore
//! let cache = ResponseCache::new(Duration::from_secs(300));
//! cache.set_tagged(keys::item(id), value, None, [tags::item(id)]);
//!
//! // A write to `id` drops everything that mentioned it.
//! cache.invalidate_tag(&tags::item(id));
//! ```

pub mod keys;
pub mod read;
pub mod store;

pub use read::CacheRead;
pub use store::ResponseCache;

/// Tag names attached to cache entries.
pub mod tags {
    use quarry_core::ItemId;

    /// Carried by every relation listing.
    pub const RELATIONS: &str = "relations";

    /// Carried by every entry whose payload contains (or was requested for) the item.
    pub fn item(id: ItemId) -> String {
        format!("item:{}", id)
    }
}
