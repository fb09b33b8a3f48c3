//! Aggregate repository (application-level orchestration).
//!
//! Flow: load history -> rehydrate aggregate -> decide -> persist -> publish.
//!
//! This module contains no IO itself beyond what `EventStore`/`EventBus`
//! already abstract; it composes those two traits into the `load` / `record`
//! / `commit` / `use_aggregate` vocabulary.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use cms_core::{Aggregate, AggregateId, ExpectedVersion};
use cms_events::{Event, EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum RepositoryError<E: std::error::Error> {
    /// Optimistic concurrency failure (e.g. stale aggregate version).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),
    /// The command was rejected by the aggregate's own decision logic.
    #[error("domain error: {0}")]
    Domain(E),
    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),
    /// Persisting to the event store failed.
    #[error("event store error: {0}")]
    Store(EventStoreError),
    /// Publication failed after a successful append (at-least-once; retry may duplicate).
    #[error("publication failed: {0}")]
    Publish(String),
}

impl<E: std::error::Error> From<EventStoreError> for RepositoryError<E> {
    fn from(value: EventStoreError) -> Self {
        match &value {
            EventStoreError::Concurrency(msg) => RepositoryError::Concurrency(msg.clone()),
            _ => RepositoryError::Store(value),
        }
    }
}

/// An aggregate loaded from the store, paired with events recorded but not
/// yet committed.
pub struct Loaded<A: Aggregate> {
    aggregate: A,
    base_version: u64,
    pending: Vec<A::Event>,
}

impl<A: Aggregate> Loaded<A> {
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    /// Apply `event` to the in-memory aggregate immediately and queue it for
    /// the next commit. This is the direct implementation of `record(name, payload)`.
    pub fn record(&mut self, event: A::Event) {
        self.aggregate.apply(&event);
        self.pending.push(event);
    }

    /// Decide and record in one step: calls `aggregate.handle(command)` and
    /// records every event it returns.
    pub fn handle(&mut self, command: &A::Command) -> Result<(), A::Error> {
        let events = self.aggregate.handle(command)?;
        for event in events {
            self.record(event);
        }
        Ok(())
    }
}

/// Repository that loads, mutates, and commits event-sourced aggregates
/// against an `EventStore` + `EventBus` pair.
pub struct AggregateRepository<S, B> {
    store: S,
    bus: B,
}

impl<S, B> AggregateRepository<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> AggregateRepository<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate an aggregate by replaying its stored history.
    pub fn load<A>(&self, id: AggregateId) -> Result<Loaded<A>, RepositoryError<A::Error>>
    where
        A: Aggregate<Id = AggregateId>,
        A::Event: Event + DeserializeOwned,
    {
        let history = self.store.load_stream(id)?;
        validate_loaded_stream(id, &history)?;
        let base_version = stream_version(&history);

        let mut aggregate = A::empty(id);
        apply_history(&mut aggregate, &history)?;

        Ok(Loaded {
            aggregate,
            base_version,
            pending: Vec::new(),
        })
    }

    /// Append `loaded`'s pending events and publish each one. On success,
    /// returns the committed, sequence-numbered events. On failure, the
    /// caller's in-memory aggregate and pending events are untouched — they
    /// must not be retried blindly, since the decision that produced them
    /// may no longer hold against the current stream.
    pub fn commit<A>(
        &self,
        aggregate_type: &str,
        loaded: &mut Loaded<A>,
    ) -> Result<Vec<StoredEvent>, RepositoryError<A::Error>>
    where
        A: Aggregate<Id = AggregateId>,
        A::Event: Event + Serialize,
    {
        if loaded.pending.is_empty() {
            return Ok(vec![]);
        }

        let id = *loaded.aggregate.id();
        let uncommitted = loaded
            .pending
            .iter()
            .map(|ev| UncommittedEvent::from_typed(id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let expected = ExpectedVersion::Exact(loaded.base_version);
        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| RepositoryError::Publish(format!("{e:?}")))?;
        }

        loaded.base_version += committed.len() as u64;
        loaded.pending.clear();

        Ok(committed)
    }

    /// Load an aggregate, run `f` against it, and commit if `f` succeeds.
    /// This is the `use(id, fn)` transaction boundary: `f` decides and
    /// records events, `use_aggregate` persists and publishes them. If `f`
    /// returns an error, any events it recorded are discarded and nothing is
    /// persisted.
    pub fn use_aggregate<A, T>(
        &self,
        id: AggregateId,
        aggregate_type: &str,
        f: impl FnOnce(&mut Loaded<A>) -> Result<T, A::Error>,
    ) -> Result<T, RepositoryError<A::Error>>
    where
        A: Aggregate<Id = AggregateId>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let mut loaded = self.load::<A>(id)?;
        let result = f(&mut loaded).map_err(RepositoryError::Domain)?;
        self.commit(aggregate_type, &mut loaded)?;
        Ok(result)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream<E: std::error::Error>(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), RepositoryError<E>> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(RepositoryError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number == 0 {
            return Err(RepositoryError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(RepositoryError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A, E: std::error::Error>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), RepositoryError<E>>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| RepositoryError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
