//! Entry points driving resolution over many issues.
//!
//! - [`resolve_all`]: sequential resolution of a batch of issues into a [`ResolutionReport`]
//! - [`run_swarm`]: concurrent workers pulling units from the store's queue

mod report;
mod swarm;

pub use report::{ResolutionReport, UnresolvedIssue, resolve_all};
pub use swarm::{WorkerReport, resolvers_per_credential, run_swarm, shared_resolvers};
