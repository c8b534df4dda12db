//! Repository discovery abstraction layer
//!
//! This module defines the capability contracts every hosting provider
//! implements: a [`Source`] lists repositories to mirror, a [`Target`] makes
//! sure each one exists on the receiving host. Concrete providers are a closed
//! set of variants ([`SourcePlugin`], [`TargetPlugin`]) selected by the `type`
//! string in configuration; adding a host means adding a variant.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::config::{Config, SourceConfig, TargetConfig};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::SyncError;
use crate::providers::{BitbucketCloud, BitbucketServer, GitHubTarget};

/// A repository as it moves through one integration
///
/// The source sets `source_url`, the target fills in `target_url`, and the
/// ref sync only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Repository {
    /// Stable name, unique within one integration
    pub slug: String,
    /// HTTPS clone URL on the source host
    pub source_url: String,
    /// Push URL on the target host
    pub target_url: String,
    pub description: String,
}

impl Repository {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            ..Default::default()
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    pub fn with_target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = url.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A `<type>/<key>` scope selector such as `project/TEST` or `org/acme`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kind {
    pub kind_type: String,
    pub key: String,
}

impl Kind {
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        match raw.split_once('/') {
            Some((kind_type, key)) if !kind_type.is_empty() && !key.is_empty() => Ok(Self {
                kind_type: kind_type.to_string(),
                key: key.to_string(),
            }),
            _ => Err(SyncError::Config(format!(
                "kind '{}' must look like '<type>/<key>'",
                raw
            ))),
        }
    }

    /// Error for a kind type the caller does not handle
    pub fn unsupported(&self, expected: &[&str]) -> SyncError {
        tracing::error!(kind = %self.kind_type, "Unsupported kind");
        SyncError::UnsupportedKind {
            kind: self.kind_type.clone(),
            expected: expected.join(", "),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind_type, self.key)
    }
}

/// A host repositories are read from
#[async_trait]
pub trait Source: CredentialProvider + Send + Sync {
    /// Verify the credentials can read the configured kind
    async fn authenticate(&self) -> Result<(), SyncError>;

    /// Every repository of the configured kind that passes the filter rules
    ///
    /// Pagination is followed to the end; the list is complete on return.
    async fn repositories(&self, include_metadata: bool) -> Result<Vec<Repository>, SyncError>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// A host repositories are mirrored to
#[async_trait]
pub trait Target: CredentialProvider + Send + Sync {
    /// Verify the credentials can write to the configured kind
    async fn authenticate(&self) -> Result<(), SyncError>;

    /// Resolve or create the target repository for every input repository
    ///
    /// Repositories whose target cannot be created are logged and left out;
    /// the survivors keep their relative order.
    async fn sync_check(&self, repos: Vec<Repository>) -> Vec<Repository>;

    /// Provider name for display/logging
    fn provider_name(&self) -> &'static str;
}

/// Supported source hosts
#[derive(Debug)]
pub enum SourcePlugin {
    BitbucketCloud(BitbucketCloud),
    BitbucketServer(BitbucketServer),
}

impl SourcePlugin {
    /// Build the adapter named by `source.type`
    pub fn from_config(source: &SourceConfig, config: &Config) -> Result<Self, SyncError> {
        match source.source_type.as_str() {
            "bitbucket-cloud" => Ok(Self::BitbucketCloud(BitbucketCloud::new(source, config)?)),
            "bitbucket-server" => Ok(Self::BitbucketServer(BitbucketServer::new(source, config)?)),
            other => Err(SyncError::Config(format!("unsupported source type '{}'", other))),
        }
    }

    fn inner(&self) -> &dyn Source {
        match self {
            Self::BitbucketCloud(cloud) => cloud,
            Self::BitbucketServer(server) => server,
        }
    }
}

impl CredentialProvider for SourcePlugin {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        self.inner().credentials()
    }
}

#[async_trait]
impl Source for SourcePlugin {
    async fn authenticate(&self) -> Result<(), SyncError> {
        self.inner().authenticate().await
    }

    async fn repositories(&self, include_metadata: bool) -> Result<Vec<Repository>, SyncError> {
        self.inner().repositories(include_metadata).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner().provider_name()
    }
}

/// Supported target hosts
#[derive(Debug)]
pub enum TargetPlugin {
    GitHub(GitHubTarget),
}

impl TargetPlugin {
    /// Build the adapter named by `target.type`
    pub fn from_config(target: &TargetConfig) -> Result<Self, SyncError> {
        match target.target_type.as_str() {
            "github-public" | "github" => Ok(Self::GitHub(GitHubTarget::new(target)?)),
            other => Err(SyncError::Config(format!("unsupported target type '{}'", other))),
        }
    }

    fn inner(&self) -> &dyn Target {
        match self {
            Self::GitHub(github) => github,
        }
    }
}

impl CredentialProvider for TargetPlugin {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        self.inner().credentials()
    }
}

#[async_trait]
impl Target for TargetPlugin {
    async fn authenticate(&self) -> Result<(), SyncError> {
        self.inner().authenticate().await
    }

    async fn sync_check(&self, repos: Vec<Repository>) -> Vec<Repository> {
        self.inner().sync_check(repos).await
    }

    fn provider_name(&self) -> &'static str {
        self.inner().provider_name()
    }
}
