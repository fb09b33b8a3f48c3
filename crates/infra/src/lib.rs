//! Infrastructure layer: event store, aggregate repository, lookup
//! projections, the post-processor worker pool, streaming upload, and the
//! ambient config/telemetry/error-mapping stack.

pub mod config;
pub mod errors;
pub mod event_store;
pub mod lookup;
pub mod postprocessor;
pub mod repository;
pub mod telemetry;
pub mod upload;
