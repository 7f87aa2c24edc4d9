#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! fixtrail crate
//!
//! Collects bug-fix evidence from the GitHub REST API. For each tracked issue, the
//! [`timeline::TimelineResolver`] walks the issue's event timeline backwards from its last
//! close event, following commit references and cross-referenced issues, to find the commit
//! that fixed it.
//!
//! # Module Organization
//!
//! - [`api`]: quota-aware access to the remote API (credential pool, quota tracker, paginated calls)
//! - [`timeline`]: timeline events, the commit cache, and the fix-commit resolver
//! - [`store`]: the external store interface plus in-memory and file-backed implementations
//! - [`crawler`]: fetchers for issue lists, timelines and commits
//! - [`driver`]: batch resolution reports and swarm workers
//! - [`config`]: configuration loading and logging setup

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod api;
pub mod config;
pub mod crawler;
pub mod driver;
pub mod store;
pub mod timeline;
