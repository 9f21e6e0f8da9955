//! Consequence-based saturation.
//!
//! - [`conclusion`]: the facts exchanged between contexts.
//! - [`context`]: per-root derived state and the activation protocol.
//! - [`state`]: the shared registry of contexts and work queues.
//! - [`rules`]: rule bodies, shared by derivation and retraction.
//! - [`engine`]: the parallel driver running rules to quiescence.
//! - [`incremental`]: seeding for delete/rederive maintenance.

pub mod conclusion;
pub mod context;
pub mod engine;
pub(crate) mod incremental;
pub mod rules;
pub mod state;

pub use conclusion::{Conclusion, ConclusionKind};
pub use context::{Context, ContextState};
pub use engine::{RuleStatistics, SaturationEngine};
pub use rules::{ConclusionVisitor, RuleMode};
pub use state::{ContextCreationListener, ListenerId, SaturationState};
