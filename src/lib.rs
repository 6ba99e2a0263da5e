//! Assignment engine for routing waste reports to volunteer verifiers.
//!
//! A fast in-memory ranking of volunteer load ([`registry`]) is kept close to
//! a durable system of record ([`store`]). [`selection`] picks and reserves
//! the least-loaded volunteers atomically, [`orchestrator`] drives one report
//! through to persisted assignments and notification intents, and
//! [`reconcile`] rebuilds the ranking when it drifts from the store.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod reconcile;
pub mod registry;
pub mod selection;
pub mod snapshot;
pub mod store;
pub mod util;

pub use config::EngineConfig;
pub use engine::AssignmentEngine;
pub use error::{EngineError, EngineResult, NotificationError};
pub use model::{AssignmentOutcome, AssignmentResult, ReportStatus};
