//! Aggregate root trait for event-sourced domain models.

/// Aggregate root marker + minimal interface.
///
/// This is intentionally small so domain crates can decide how they model
/// state transitions (pure functions, event application, etc.) without
/// bringing in any infrastructure concerns.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// For event-sourced aggregates this is the number of events applied
    /// (the stream revision).
    fn version(&self) -> u64;
}

/// An event-sourced aggregate: commands are decided against current state,
/// events are the only way that state ever changes.
///
/// `handle` is pure and must not mutate `self` — it inspects the current
/// state and either rejects the command or proposes the events that would
/// satisfy it. `apply` is the only place state changes, and it must never
/// fail: by the time an event reaches `apply` it is a fact, not a proposal.
pub trait Aggregate: AggregateRoot {
    /// The command vocabulary this aggregate accepts.
    type Command;

    /// The event vocabulary this aggregate emits.
    type Event;

    /// The error vocabulary `handle` can reject a command with.
    type Error: std::error::Error;

    /// Construct the zero-state aggregate for a given id, before any event
    /// has been applied. Used by repositories to seed replay.
    fn empty(id: Self::Id) -> Self;

    /// Decide what events (if any) satisfy `command` against current state.
    /// Must not mutate `self`.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Fold `event` into `self`. Infallible: events are facts.
    fn apply(&mut self, event: &Self::Event);
}

/// Optimistic concurrency precondition for an `EventStore::append` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the concurrency check entirely.
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream must be at exactly this version.
    Exact(u64),
}

impl ExpectedVersion {
    /// Whether `current` satisfies this precondition.
    pub fn matches(&self, current: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::NoStream => current == 0,
            ExpectedVersion::Exact(v) => *v == current,
        }
    }
}
