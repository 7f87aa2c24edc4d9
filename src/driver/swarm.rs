//! Swarm mode: independent workers pulling units from the store's queue.
//!
//! Checkout atomicity is the store's responsibility ([`IssueStore::claim_next_unit`]). Workers
//! share quota state only when their resolvers share an [`ApiClient`].

use crate::Result;
use crate::api::{ApiClient, CredentialPool};
use crate::config::Config;
use crate::crawler::Crawler;
use crate::store::{IssueStore, Unit};
use crate::timeline::{ResolvedCommit, TimelineResolver};
use core::time::Duration;
use futures_util::future::join_all;
use ohno::IntoAppError;
use std::sync::Arc;

const LOG_TARGET: &str = "     swarm";

/// Counts for one finished worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,

    /// Units processed to completion
    pub processed: usize,

    /// Processed units for which a fix commit was found
    pub resolved: usize,

    /// Units whose processing failed
    pub failed: usize,
}

/// One resolver per configured credential, each with its own quota tracker.
pub fn resolvers_per_credential<S: IssueStore>(config: &Config, store: &Arc<S>) -> Result<Vec<TimelineResolver<S>>> {
    CredentialPool::new(&config.credentials)?
        .split()
        .into_iter()
        .map(|pool| -> Result<TimelineResolver<S>> {
            let client = ApiClient::with_pool(config, pool)?;
            Ok(TimelineResolver::from_config(config, client, Arc::clone(store)))
        })
        .collect()
}

/// `workers` resolvers sharing one client, and so one credential pool and quota tracker.
pub fn shared_resolvers<S: IssueStore>(config: &Config, store: &Arc<S>, workers: usize) -> Result<Vec<TimelineResolver<S>>> {
    let client = ApiClient::new(config)?;
    Ok((0..workers)
        .map(|_| TimelineResolver::from_config(config, client.clone(), Arc::clone(store)))
        .collect())
}

/// Run one worker per resolver until the queue is drained.
///
/// Before each claim, worker `i` waits `stagger * i`. Reports are returned in worker order.
///
/// # Errors
///
/// Fails if a worker task panics or a worker cannot reach the queue.
pub async fn run_swarm<S: IssueStore + 'static>(resolvers: Vec<TimelineResolver<S>>, stagger: Duration) -> Result<Vec<WorkerReport>> {
    log::info!(target: LOG_TARGET, "Starting {} worker(s)", resolvers.len());

    let results = join_all(
        resolvers
            .into_iter()
            .enumerate()
            .map(|(index, resolver)| tokio::spawn(run_worker(index, resolver, stagger))),
    )
    .await;

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        reports.push(result.into_app_err("swarm worker panicked")??);
    }

    let processed: usize = reports.iter().map(|r| r.processed).sum();
    let resolved: usize = reports.iter().map(|r| r.resolved).sum();
    log::info!(target: LOG_TARGET, "Swarm finished: {processed} unit(s) processed, {resolved} resolved");

    Ok(reports)
}

async fn run_worker<S: IssueStore>(index: usize, resolver: TimelineResolver<S>, stagger: Duration) -> Result<WorkerReport> {
    let crawler = Crawler::new(resolver.cache().clone());
    let store = Arc::clone(resolver.cache().store());
    let delay = stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
    let mut report = WorkerReport {
        worker: index,
        ..WorkerReport::default()
    };

    loop {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let Some(unit) = store.claim_next_unit().await? else {
            break;
        };

        match process_unit(&unit, &resolver, &crawler, store.as_ref()).await {
            Ok(commit) => {
                report.processed += 1;
                if commit.is_some() {
                    report.resolved += 1;
                }
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "Worker {index} failed on issue {}: {e:#}", unit.issue_id);
                report.failed += 1;
            }
        }
    }

    log::debug!(
        target: LOG_TARGET,
        "Worker {index} done: {} processed, {} resolved, {} failed ({})",
        report.processed,
        report.resolved,
        report.failed,
        resolver.cache().client().stats().summary()
    );
    Ok(report)
}

async fn process_unit<S: IssueStore>(unit: &Unit, resolver: &TimelineResolver<S>, crawler: &Crawler<S>, store: &S) -> Result<Option<ResolvedCommit>> {
    let Some(issue) = store.get_issue_by_id(unit.issue_id).await? else {
        log::warn!(target: LOG_TARGET, "Claimed issue {} is not in the store", unit.issue_id);
        store.record_resolution(unit, None).await?;
        return Ok(None);
    };

    let issue = if issue.timeline.is_none() {
        crawler.hydrate_issue(issue).await?
    } else {
        issue
    };

    let commit = resolver.resolve_fix_commit(&issue).await?;
    store.record_resolution(unit, commit.as_ref()).await?;
    Ok(commit)
}
