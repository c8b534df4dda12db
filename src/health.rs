//! System health checks for repomirror
//!
//! This module provides preflight checks to verify the system is properly
//! configured before running a sync.

use std::path::Path;

use crate::config::{Config, Integration};
use crate::discovery::{Source, SourcePlugin, Target, TargetPlugin};
use crate::git::GitCli;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Sync directory status
    pub sync_dir: CheckResult,
    /// One entry per configured integration, in configuration order
    pub integrations: Vec<(String, CheckResult)>,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub async fn run(config: &Config) -> Self {
        let mut integrations = Vec::with_capacity(config.integrations.len());
        for integration in &config.integrations {
            let result = Self::check_integration(integration, config).await;
            integrations.push((integration.name.clone(), result));
        }

        Self {
            git: Self::check_git().await,
            sync_dir: Self::check_sync_dir(&config.sync_root()),
            integrations,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.all_checks().iter().all(|(_, result)| result.passed)
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    async fn check_git() -> CheckResult {
        match GitCli::new().version().await {
            Ok(version) => CheckResult::ok_with_details("Git installed", version),
            Err(e) => CheckResult::error_with_details("Git not usable", e.to_string()),
        }
    }

    /// Check the sync directory exists or can be created
    fn check_sync_dir(path: &Path) -> CheckResult {
        let display = path.display().to_string();
        if path.is_dir() {
            return CheckResult::ok_with_details("Sync directory exists", display);
        }
        if path.exists() {
            return CheckResult::error_with_details("Sync directory is not a directory", display);
        }

        let writable_ancestor = path
            .ancestors()
            .skip(1)
            .find(|p| p.is_dir())
            .and_then(|p| std::fs::metadata(p).ok())
            .is_some_and(|meta| !meta.permissions().readonly());

        if writable_ancestor {
            CheckResult::warning_with_details(
                "Sync directory does not exist yet",
                format!("{} will be created on first sync", display),
            )
        } else {
            CheckResult::error_with_details(
                "Sync directory cannot be created",
                format!("Run: mkdir -p {}", display),
            )
        }
    }

    /// Build both plugins and authenticate them
    async fn check_integration(integration: &Integration, config: &Config) -> CheckResult {
        if !integration.enabled {
            return CheckResult::warning_with_details("Integration disabled", "Skipped by sync");
        }

        let source = match SourcePlugin::from_config(&integration.source, config) {
            Ok(source) => source,
            Err(e) => return CheckResult::error_with_details("Source misconfigured", e.to_string()),
        };
        let target = match TargetPlugin::from_config(&integration.target) {
            Ok(target) => target,
            Err(e) => return CheckResult::error_with_details("Target misconfigured", e.to_string()),
        };

        if let Err(e) = source.authenticate().await {
            return CheckResult::error_with_details(
                format!("{} authentication failed", source.provider_name()),
                e.to_string(),
            );
        }
        if let Err(e) = target.authenticate().await {
            return CheckResult::error_with_details(
                format!("{} authentication failed", target.provider_name()),
                e.to_string(),
            );
        }

        CheckResult::ok_with_details(
            "Source and target authenticated",
            format!("{} → {}", integration.source.kind, integration.target.kind),
        )
    }

    /// Get all checks for iteration
    pub fn all_checks(&self) -> Vec<(String, &CheckResult)> {
        let mut checks = vec![
            ("Git Installation".to_string(), &self.git),
            ("Sync Directory".to_string(), &self.sync_dir),
        ];
        checks.extend(
            self.integrations
                .iter()
                .map(|(name, result)| (format!("Integration '{}'", name), result)),
        );
        checks
    }
}
