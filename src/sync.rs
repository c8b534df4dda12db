//! Sync Engine - Orchestrates integrations and repository synchronization
//!
//! For each integration the engine authenticates both hosts, lists the
//! source repositories, lets the target resolve or create their
//! counterparts, and then runs the ref sync for every repository through a
//! bounded worker pool. A failing repository never stops its siblings and a
//! failing integration never stops the next one.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{integration_directory_name, Config, Integration};
use crate::discovery::{Repository, Source, SourcePlugin, Target, TargetPlugin};
use crate::error::SyncError;
use crate::git::{GitCli, GitEngine};
use crate::mirror::{BranchRewriter, OutcomeState, RefSync, SyncOutcome};

/// What happened to an integration as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrationStatus {
    Completed,
    Skipped { reason: String },
}

/// Per-repository line of a report
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryReport {
    pub slug: String,
    pub state: OutcomeState,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Tallies over repository states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub done: usize,
    pub partial: usize,
    pub fatal: usize,
    pub dropped: usize,
    pub skipped_integrations: usize,
}

impl Counts {
    fn add(&mut self, other: Counts) {
        self.done += other.done;
        self.partial += other.partial;
        self.fatal += other.fatal;
        self.dropped += other.dropped;
        self.skipped_integrations += other.skipped_integrations;
    }
}

/// Result of one integration
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationReport {
    pub name: String,
    #[serde(flatten)]
    pub status: IntegrationStatus,
    /// In source listing order
    pub repositories: Vec<RepositoryReport>,
    /// Listed by the source but left out by the target
    pub dropped: Vec<String>,
}

impl IntegrationReport {
    pub fn skipped(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: IntegrationStatus::Skipped {
                reason: reason.into(),
            },
            repositories: Vec::new(),
            dropped: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, IntegrationStatus::Skipped { .. })
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts {
            dropped: self.dropped.len(),
            skipped_integrations: usize::from(self.is_skipped()),
            ..Default::default()
        };
        for repo in &self.repositories {
            match repo.state {
                OutcomeState::Done => counts.done += 1,
                OutcomeState::PartialFailure => counts.partial += 1,
                OutcomeState::FatalFailure => counts.fatal += 1,
            }
        }
        counts
    }
}

/// Result of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub integrations: Vec<IntegrationReport>,
    pub totals: Counts,
    pub duration_secs: f64,
}

impl RunReport {
    fn new(integrations: Vec<IntegrationReport>, duration: Duration) -> Self {
        let mut totals = Counts::default();
        for integration in &integrations {
            totals.add(integration.counts());
        }
        Self {
            integrations,
            totals,
            duration_secs: duration.as_secs_f64(),
        }
    }
}

/// The main sync engine that orchestrates repository synchronization
pub struct SyncEngine<E: GitEngine = GitCli> {
    engine: E,
    sync_root: PathBuf,
    max_parallel: usize,
    repository_timeout: Option<Duration>,
}

impl SyncEngine<GitCli> {
    /// Engine using the system git with the run settings from `config`
    pub fn from_config(config: &Config) -> Self {
        SyncEngine::new(GitCli::new(), config.sync_root())
            .with_max_parallel(config.sync.max_parallel)
            .with_repository_timeout(config.sync.repository_timeout())
    }
}

impl<E: GitEngine> SyncEngine<E> {
    /// Sequential engine without a per-repository timeout
    pub fn new(engine: E, sync_root: PathBuf) -> Self {
        Self {
            engine,
            sync_root,
            max_parallel: 1,
            repository_timeout: None,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_repository_timeout(mut self, limit: Option<Duration>) -> Self {
        self.repository_timeout = limit;
        self
    }

    /// Run every integration of `config` in order
    pub async fn run(&self, config: &Config) -> RunReport {
        let start_time = Instant::now();
        info!(
            "Starting synchronization of {} integrations",
            config.integrations.len()
        );

        let mut reports = Vec::with_capacity(config.integrations.len());
        for integration in &config.integrations {
            let span = info_span!("integration", name = %integration.name);
            let report = self.run_configured(integration, config).instrument(span).await;
            reports.push(report);
        }

        let report = RunReport::new(reports, start_time.elapsed());
        info!(
            "Sync completed in {:.2}s: {} done, {} partial, {} fatal, {} dropped, {} integrations skipped",
            report.duration_secs,
            report.totals.done,
            report.totals.partial,
            report.totals.fatal,
            report.totals.dropped,
            report.totals.skipped_integrations
        );
        report
    }

    async fn run_configured(&self, integration: &Integration, config: &Config) -> IntegrationReport {
        if !integration.enabled {
            info!("Integration disabled, skipping");
            return IntegrationReport::skipped(&integration.name, "disabled");
        }

        let plugins = SourcePlugin::from_config(&integration.source, config).and_then(|source| {
            let target = TargetPlugin::from_config(&integration.target)?;
            let rewriter = BranchRewriter::new(&integration.target.branch_modifiers)?;
            Ok((source, target, rewriter))
        });

        match plugins {
            Ok((source, target, rewriter)) => {
                self.run_integration(&integration.name, &source, &target, &rewriter)
                    .await
            }
            Err(e) => {
                error!(error = %e, "Failed to set up integration");
                IntegrationReport::skipped(&integration.name, e.to_string())
            }
        }
    }

    /// Mirror every repository `source` lists to `target`
    pub async fn run_integration<S, T>(
        &self,
        name: &str,
        source: &S,
        target: &T,
        rewriter: &BranchRewriter,
    ) -> IntegrationReport
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
    {
        if let Err(e) = source.authenticate().await {
            error!(provider = source.provider_name(), error = %e, "Source authentication failed");
            return IntegrationReport::skipped(name, format!("source authentication failed: {}", e));
        }
        if let Err(e) = target.authenticate().await {
            error!(provider = target.provider_name(), error = %e, "Target authentication failed");
            return IntegrationReport::skipped(name, format!("target authentication failed: {}", e));
        }

        let listed = match source.repositories(true).await {
            Ok(repos) => repos,
            Err(e) => {
                error!(error = %e, "Failed to list source repositories");
                return IntegrationReport::skipped(name, format!("repository listing failed: {}", e));
            }
        };
        let listed_slugs: Vec<String> = listed.iter().map(|r| r.slug.clone()).collect();
        info!("Source listed {} repositories", listed_slugs.len());

        let resolved = target.sync_check(listed).await;
        let dropped: Vec<String> = listed_slugs
            .into_iter()
            .filter(|slug| !resolved.iter().any(|r| &r.slug == slug))
            .collect();
        if !dropped.is_empty() {
            warn!(dropped = ?dropped, "Repositories left out by the target");
        }

        let repositories = self
            .sync_repositories(name, resolved, source, target, rewriter)
            .await;

        IntegrationReport {
            name: name.to_string(),
            status: IntegrationStatus::Completed,
            repositories,
            dropped,
        }
    }

    /// Ref sync for each repository, at most `max_parallel` at a time
    async fn sync_repositories<S, T>(
        &self,
        name: &str,
        repositories: Vec<Repository>,
        source: &S,
        target: &T,
        rewriter: &BranchRewriter,
    ) -> Vec<RepositoryReport>
    where
        S: Source + ?Sized,
        T: Target + ?Sized,
    {
        let work_root = self.sync_root.join(integration_directory_name(name));
        let ref_sync = RefSync::new(&self.engine, name, rewriter);
        let semaphore = Semaphore::new(self.max_parallel);

        debug!(
            "Syncing {} repositories with max_parallel={}",
            repositories.len(),
            self.max_parallel
        );

        let mut futures = FuturesUnordered::new();
        for (index, repo) in repositories.into_iter().enumerate() {
            let work_dir = work_root.join(&repo.slug);
            let semaphore = &semaphore;
            let ref_sync = &ref_sync;

            futures.push(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire().await.ok();
                let started = Instant::now();

                let sync = ref_sync.sync_repository(&repo, &work_dir, source, target);
                let outcome = match self.repository_timeout {
                    Some(limit) => match timeout(limit, sync).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(repository = %repo.slug, "Sync timed out after {}s", limit.as_secs());
                            SyncOutcome::fatal(SyncError::Timeout(limit.as_secs()))
                        }
                    },
                    None => sync.await,
                };

                info!(
                    repository = %repo.slug,
                    state = ?outcome.state(),
                    "Repository finished in {:.2}s",
                    started.elapsed().as_secs_f64()
                );
                (index, RepositoryReport {
                    slug: repo.slug,
                    state: outcome.state(),
                    outcome,
                })
            });
        }

        let mut results = Vec::new();
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, report)| report).collect()
    }
}
