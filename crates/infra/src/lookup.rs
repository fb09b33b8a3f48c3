//! Continuously-updated name -> id lookup tables, built by tailing the
//! shelf and gallery event streams.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;
use thiserror::Error;

use cms_core::AggregateId;
use cms_events::{Event, EventBus, EventEnvelope, Projection, Subscription};
use cms_gallery::{GalleryEvent, StackId};
use cms_shelf::{DocumentId, ShelfEvent};

use crate::event_store::StoredEvent;

/// The union of the two event streams a `LookupIndex` tails. Not a
/// domain event in its own right; it exists so one `Projection`
/// instance can fold both streams into one set of tables.
#[derive(Debug, Clone)]
pub enum CmsEvent {
    Shelf(ShelfEvent),
    Gallery(GalleryEvent),
}

impl Event for CmsEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CmsEvent::Shelf(e) => e.event_type(),
            CmsEvent::Gallery(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            CmsEvent::Shelf(e) => e.version(),
            CmsEvent::Gallery(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> chrono::DateTime<chrono::Utc> {
        match self {
            CmsEvent::Shelf(e) => e.occurred_at(),
            CmsEvent::Gallery(e) => e.occurred_at(),
        }
    }
}

fn decode_cms_event(env: &EventEnvelope<JsonValue>) -> Option<EventEnvelope<CmsEvent>> {
    let payload = match env.aggregate_type() {
        "shelf" => serde_json::from_value::<ShelfEvent>(env.payload().clone()).ok().map(CmsEvent::Shelf),
        "gallery" => serde_json::from_value::<GalleryEvent>(env.payload().clone()).ok().map(CmsEvent::Gallery),
        _ => None,
    }?;

    Some(EventEnvelope::new(env.event_id(), env.aggregate_id(), env.aggregate_type().to_string(), env.sequence_number(), payload))
}

fn decode_stored(stored: &StoredEvent) -> Option<EventEnvelope<CmsEvent>> {
    decode_cms_event(&stored.to_envelope())
}

#[derive(Debug, Error)]
pub enum LookupBusError {
    #[error("the lookup index's bridging bus is read-only")]
    ReadOnly,
}

/// Bridges the repository's `EventEnvelope<JsonValue>` bus into a typed
/// `EventEnvelope<CmsEvent>` stream for the lookup projection, dropping
/// payloads it cannot decode. Subscribing spawns a pump thread per
/// subscriber, mirroring the teacher's bus-subscription pump pattern.
pub struct JsonToCmsEventBus<B> {
    inner: Arc<B>,
}

impl<B> JsonToCmsEventBus<B> {
    pub fn new(inner: Arc<B>) -> Self {
        Self { inner }
    }
}

impl<B> EventBus<EventEnvelope<CmsEvent>> for JsonToCmsEventBus<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    type Error = LookupBusError;

    fn publish(&self, _message: EventEnvelope<CmsEvent>) -> Result<(), Self::Error> {
        Err(LookupBusError::ReadOnly)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<CmsEvent>> {
        let json_sub = self.inner.subscribe();
        let (tx, rx) = std::sync::mpsc::channel();

        std::thread::spawn(move || {
            while let Ok(env) = json_sub.recv() {
                if let Some(typed) = decode_cms_event(&env) {
                    if tx.send(typed).is_err() {
                        break;
                    }
                }
            }
        });

        Subscription::new(rx)
    }
}

/// The four name -> id tables, exactly per the lookup projection's
/// contract: no internal references ever escape, every reader gets an
/// owned copy.
#[derive(Debug, Default)]
pub struct LookupIndex {
    shelf_names: RwLock<HashMap<String, AggregateId>>,
    unique_names: RwLock<HashMap<AggregateId, HashMap<String, DocumentId>>>,
    gallery_names: RwLock<HashMap<String, AggregateId>>,
    stack_names: RwLock<HashMap<AggregateId, HashMap<String, StackId>>>,
}

impl LookupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shelf_id(&self, name: &str) -> Option<AggregateId> {
        self.shelf_names.read().expect("lookup index lock poisoned").get(name).copied()
    }

    pub fn document_id(&self, shelf_id: AggregateId, unique_name: &str) -> Option<DocumentId> {
        self.unique_names.read().expect("lookup index lock poisoned").get(&shelf_id).and_then(|m| m.get(unique_name)).copied()
    }

    pub fn gallery_id(&self, name: &str) -> Option<AggregateId> {
        self.gallery_names.read().expect("lookup index lock poisoned").get(name).copied()
    }

    pub fn stack_id(&self, gallery_id: AggregateId, stack_name: &str) -> Option<StackId> {
        self.stack_names.read().expect("lookup index lock poisoned").get(&gallery_id).and_then(|m| m.get(stack_name)).copied()
    }

    fn apply_event(&self, envelope: &EventEnvelope<CmsEvent>) {
        let aggregate_id = envelope.aggregate_id();
        match envelope.payload() {
            CmsEvent::Shelf(ShelfEvent::Created(e)) => {
                self.shelf_names.write().expect("lookup index lock poisoned").insert(e.name.clone(), aggregate_id);
            }
            CmsEvent::Shelf(ShelfEvent::DocumentAdded(e)) => {
                if let Some(unique_name) = &e.unique_name {
                    self.unique_names
                        .write()
                        .expect("lookup index lock poisoned")
                        .entry(aggregate_id)
                        .or_default()
                        .insert(unique_name.clone(), e.document_id);
                }
            }
            CmsEvent::Shelf(ShelfEvent::DocumentMadeUnique(e)) => {
                self.unique_names
                    .write()
                    .expect("lookup index lock poisoned")
                    .entry(aggregate_id)
                    .or_default()
                    .insert(e.unique_name.clone(), e.document_id);
            }
            CmsEvent::Shelf(ShelfEvent::DocumentMadeNonUnique(e)) => {
                if let Some(per_shelf) = self.unique_names.write().expect("lookup index lock poisoned").get_mut(&aggregate_id) {
                    per_shelf.retain(|_, id| *id != e.document_id);
                }
            }
            CmsEvent::Shelf(ShelfEvent::DocumentRemoved(e)) => {
                if let Some(per_shelf) = self.unique_names.write().expect("lookup index lock poisoned").get_mut(&aggregate_id) {
                    per_shelf.retain(|_, id| *id != e.document_id);
                }
            }
            CmsEvent::Shelf(_) => {}
            CmsEvent::Gallery(GalleryEvent::Created(e)) => {
                self.gallery_names.write().expect("lookup index lock poisoned").insert(e.name.clone(), aggregate_id);
            }
            CmsEvent::Gallery(GalleryEvent::ImageUploaded(e)) => {
                self.stack_names
                    .write()
                    .expect("lookup index lock poisoned")
                    .entry(aggregate_id)
                    .or_default()
                    .insert(e.original_name.clone(), e.stack_id);
            }
            CmsEvent::Gallery(GalleryEvent::StackRenamed(e)) => {
                let mut stacks = self.stack_names.write().expect("lookup index lock poisoned");
                if let Some(per_gallery) = stacks.get_mut(&aggregate_id) {
                    per_gallery.retain(|_, id| *id != e.stack_id);
                    per_gallery.insert(e.new_name.clone(), e.stack_id);
                }
            }
            CmsEvent::Gallery(GalleryEvent::StackDeleted(e)) => {
                if let Some(per_gallery) = self.stack_names.write().expect("lookup index lock poisoned").get_mut(&aggregate_id) {
                    per_gallery.retain(|_, id| *id != e.stack_id);
                }
            }
            CmsEvent::Gallery(_) => {}
        }
    }

    /// Rebuild a fresh index from already-stored events (no live bus
    /// involved); useful for tests and for cold-starting without a
    /// subscription.
    pub fn rebuild_from_stored(events: &[StoredEvent]) -> Self {
        let index = Self::new();
        let mut decoded: Vec<EventEnvelope<CmsEvent>> = events.iter().filter_map(decode_stored).collect();
        decoded.sort_by_key(|e| e.sequence_number());
        for env in &decoded {
            index.apply_event(env);
        }
        index
    }
}

/// `Projection` adapter: nominally mutable per the trait, but the actual
/// mutation happens through `LookupIndex`'s interior `RwLock`s, so a
/// shared `Arc<LookupIndex>` stays usable for reads while this handle is
/// being driven by a `ContinuousProjection`.
pub struct LookupProjection(pub Arc<LookupIndex>);

impl Projection for LookupProjection {
    type Ev = CmsEvent;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>) {
        self.0.apply_event(envelope);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use cms_gallery::Image;
    use cms_shelf::shelf::{DocumentMadeNonUnique, DocumentMadeUnique, ShelfCreated};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn envelope(aggregate_id: AggregateId, aggregate_type: &str, seq: u64, event: CmsEvent) -> EventEnvelope<CmsEvent> {
        EventEnvelope::new(Uuid::now_v7(), aggregate_id, aggregate_type, seq, event)
    }

    #[test]
    fn shelf_created_indexes_by_name() {
        let index = LookupIndex::new();
        let shelf_id = AggregateId::new();
        let created = ShelfEvent::Created(ShelfCreated { shelf_id, name: "Invoices".to_string(), occurred_at: now() });
        index.apply_event(&envelope(shelf_id, "shelf", 1, CmsEvent::Shelf(created)));
        assert_eq!(index.shelf_id("Invoices"), Some(shelf_id));
    }

    #[test]
    fn document_made_non_unique_clears_the_mapping() {
        let index = LookupIndex::new();
        let shelf_id = AggregateId::new();
        let document_id = DocumentId::new();

        let made_unique = ShelfEvent::DocumentMadeUnique(DocumentMadeUnique {
            document_id,
            unique_name: "slug".to_string(),
            occurred_at: now(),
        });
        index.apply_event(&envelope(shelf_id, "shelf", 1, CmsEvent::Shelf(made_unique)));
        assert_eq!(index.document_id(shelf_id, "slug"), Some(document_id));

        let made_non_unique = ShelfEvent::DocumentMadeNonUnique(DocumentMadeNonUnique { document_id, occurred_at: now() });
        index.apply_event(&envelope(shelf_id, "shelf", 2, CmsEvent::Shelf(made_non_unique)));
        assert_eq!(index.document_id(shelf_id, "slug"), None);
    }

    #[test]
    fn gallery_stack_renamed_moves_the_lookup_entry() {
        let index = LookupIndex::new();
        let gallery_id = AggregateId::new();
        let stack_id = StackId::new();
        let original =
            Image { variant: "original".to_string(), disk: "images".to_string(), path: "k1".to_string(), width: 10, height: 10, size_bytes: 5 };

        let uploaded = GalleryEvent::ImageUploaded(cms_gallery::gallery::ImageUploaded {
            stack_id,
            original_name: "a.png".to_string(),
            original,
            occurred_at: now(),
        });
        index.apply_event(&envelope(gallery_id, "gallery", 1, CmsEvent::Gallery(uploaded)));
        assert_eq!(index.stack_id(gallery_id, "a.png"), Some(stack_id));

        let renamed = GalleryEvent::StackRenamed(cms_gallery::gallery::StackRenamed {
            stack_id,
            new_name: "b.png".to_string(),
            occurred_at: now(),
        });
        index.apply_event(&envelope(gallery_id, "gallery", 2, CmsEvent::Gallery(renamed)));
        assert_eq!(index.stack_id(gallery_id, "a.png"), None);
        assert_eq!(index.stack_id(gallery_id, "b.png"), Some(stack_id));
    }

    #[test]
    fn stack_deleted_after_rename_does_not_resurrect_the_old_name() {
        let index = LookupIndex::new();
        let gallery_id = AggregateId::new();
        let stack_id = StackId::new();
        let original =
            Image { variant: "original".to_string(), disk: "images".to_string(), path: "k1".to_string(), width: 10, height: 10, size_bytes: 5 };

        index.apply_event(&envelope(
            gallery_id,
            "gallery",
            1,
            CmsEvent::Gallery(GalleryEvent::ImageUploaded(cms_gallery::gallery::ImageUploaded {
                stack_id,
                original_name: "a.png".to_string(),
                original,
                occurred_at: now(),
            })),
        ));
        index.apply_event(&envelope(
            gallery_id,
            "gallery",
            2,
            CmsEvent::Gallery(GalleryEvent::StackDeleted(cms_gallery::gallery::StackDeleted { stack_id, occurred_at: now() })),
        ));

        assert_eq!(index.stack_id(gallery_id, "a.png"), None);
    }
}
