//! Projection runner utilities (read model builders).
//!
//! Read models are **disposable**; events are the source of truth.
//! This module provides deterministic replay and cursor/version tracking
//! without making storage assumptions.

use cms_core::AggregateId;

use crate::bus::{EventBus, Subscription};
use crate::{EventEnvelope, Projection};

/// Tracks projection progress for a single stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    aggregate_id: AggregateId,
    last_sequence_number: u64,
}

impl ProjectionCursor {
    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    StreamMismatch {
        expected: AggregateId,
        found: AggregateId,
    },
    NonMonotonicSequence {
        last: u64,
        found: u64,
    },
}

/// Runs envelopes through a projection and tracks progress.
///
/// A single `ProjectionRunner` enforces ordering against one stream at a
/// time; a lookup projection that folds many streams together (e.g.
/// `LookupIndex`) drives its `Projection` with events from many aggregates
/// and does not route them through a single runner's cursor.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursor: Option<ProjectionCursor>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursor: None,
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    /// Current cursor/version for this projection (if any envelopes were applied).
    pub fn cursor(&self) -> Option<ProjectionCursor> {
        self.cursor
    }

    /// Apply a single envelope, enforcing single-stream consistency and
    /// monotonic sequencing.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<(), ProjectionError> {
        let found_stream = envelope.aggregate_id();
        let found_seq = envelope.sequence_number();

        match self.cursor {
            None => {
                self.projection.apply(envelope);
                self.cursor = Some(ProjectionCursor {
                    aggregate_id: found_stream,
                    last_sequence_number: found_seq,
                });
                Ok(())
            }
            Some(mut c) => {
                if c.aggregate_id != found_stream {
                    return Err(ProjectionError::StreamMismatch {
                        expected: c.aggregate_id,
                        found: found_stream,
                    });
                }
                if found_seq <= c.last_sequence_number {
                    return Err(ProjectionError::NonMonotonicSequence {
                        last: c.last_sequence_number,
                        found: found_seq,
                    });
                }

                self.projection.apply(envelope);
                c.last_sequence_number = found_seq;
                self.cursor = Some(c);
                Ok(())
            }
        }
    }

    /// Apply many envelopes in order.
    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Rebuild a projection from scratch by replaying the full event history.
    ///
    /// The factory is used to create a fresh projection instance.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(P, Option<ProjectionCursor>), ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok((runner.projection, runner.cursor))
    }
}

/// A projection that replays history on construction and then keeps applying
/// events it receives from a live bus subscription.
///
/// Multi-stream lookup projections (e.g. `LookupIndex`) don't enforce
/// per-stream ordering across the whole projection, so this wraps a bare
/// `P: Projection` directly rather than a `ProjectionRunner`.
pub struct ContinuousProjection<P>
where
    P: Projection,
{
    projection: P,
}

impl<P> ContinuousProjection<P>
where
    P: Projection,
{
    /// Replay `history` into a fresh projection, then return a handle that
    /// keeps applying events delivered on `subscription`.
    pub fn start<'a, B>(
        factory: impl FnOnce() -> P,
        history: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
        bus: &B,
    ) -> (Self, Subscription<EventEnvelope<P::Ev>>)
    where
        P::Ev: 'a,
        B: EventBus<EventEnvelope<P::Ev>>,
    {
        let mut projection = factory();
        for env in history {
            projection.apply(env);
        }
        let subscription = bus.subscribe();
        (Self { projection }, subscription)
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn projection_mut(&mut self) -> &mut P {
        &mut self.projection
    }

    /// Apply one more event received from the live subscription.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) {
        self.projection.apply(envelope);
    }

    pub fn into_projection(self) -> P {
        self.projection
    }
}
