//! Quota-aware access to the remote REST API.
//!
//! # Implementation Model
//!
//! - [`CredentialPool`]: the ordered set of access tokens
//! - [`QuotaTracker`]: remaining calls and reset time of the active credential; rotates through
//!   the pool and waits for a reset when every credential is exhausted
//! - [`ApiClient`]: single and paginated GET calls, each authorized by the tracker, with one
//!   rotate-and-retry on HTTP 403
//!
//! Clones of an [`ApiClient`] share one tracker; the tracker serializes all access to its
//! mutable state.

mod call_stats;
mod client;
mod credentials;
mod endpoint;
mod quota;
mod transport;

pub use call_stats::{CallStats, CallTopic};
pub use client::ApiClient;
pub use credentials::{Credential, CredentialPool};
pub use endpoint::Endpoint;
pub use quota::{QuotaState, QuotaTracker};
pub use transport::{ApiResult, Transport};
