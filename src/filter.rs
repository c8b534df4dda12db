//! Repository selection by include/exclude rules
//!
//! A rule wrapped in slashes (`/foo.*/`) is a regular expression matched
//! anywhere in the slug; any other rule is a literal name that must equal the
//! slug exactly.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::discovery::Repository;
use crate::error::SyncError;

/// A single literal-or-regex rule
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    /// Classify and compile a raw rule from configuration
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        if raw.len() >= 2 && raw.starts_with('/') && raw.ends_with('/') {
            let bare = &raw[1..raw.len() - 1];
            let regex = Regex::new(bare).map_err(|e| {
                SyncError::Config(format!("invalid pattern '{}': {}", raw, e))
            })?;
            Ok(Pattern::Regex(regex))
        } else {
            Ok(Pattern::Literal(raw.to_string()))
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Pattern::Regex(_))
    }

    pub fn is_match(&self, name: &str) -> bool {
        match self {
            Pattern::Literal(literal) => literal == name,
            Pattern::Regex(regex) => regex.is_match(name),
        }
    }
}

/// What an empty include list selects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyIncludePolicy {
    /// No include rules means every repository is a candidate
    #[default]
    All,
    /// No include rules means nothing is selected
    None,
}

/// Compiled include/exclude rules for one integration
#[derive(Debug, Clone)]
pub struct RepositoryFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
    empty_include: EmptyIncludePolicy,
}

impl RepositoryFilter {
    pub fn new(
        include: &[String],
        exclude: &[String],
        empty_include: EmptyIncludePolicy,
    ) -> Result<Self, SyncError> {
        let include = include
            .iter()
            .map(|p| Pattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude = exclude
            .iter()
            .map(|p| Pattern::parse(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            include,
            exclude,
            empty_include,
        })
    }

    /// Include stage: regex rules are consulted before literal names
    pub fn is_included(&self, slug: &str) -> bool {
        if self.include.is_empty() {
            return self.empty_include == EmptyIncludePolicy::All;
        }

        let regex_hit = self
            .include
            .iter()
            .filter(|p| p.is_regex())
            .any(|p| p.is_match(slug));

        regex_hit
            || self
                .include
                .iter()
                .filter(|p| !p.is_regex())
                .any(|p| p.is_match(slug))
    }

    pub fn is_excluded(&self, slug: &str) -> bool {
        self.exclude.iter().any(|p| p.is_match(slug))
    }

    pub fn matches(&self, slug: &str) -> bool {
        self.is_included(slug) && !self.is_excluded(slug)
    }

    /// Keep the repositories that pass both stages, in their original order
    pub fn apply(&self, repos: Vec<Repository>) -> Vec<Repository> {
        repos
            .into_iter()
            .filter(|repo| {
                let keep = self.matches(&repo.slug);
                if !keep {
                    tracing::debug!(repository = %repo.slug, "Repository filtered out");
                }
                keep
            })
            .collect()
    }
}

/// Filter `repos` by raw include/exclude rules
pub fn filter_repositories(
    repos: Vec<Repository>,
    include: &[String],
    exclude: &[String],
    empty_include: EmptyIncludePolicy,
) -> Result<Vec<Repository>, SyncError> {
    let filter = RepositoryFilter::new(include, exclude, empty_include)?;
    Ok(filter.apply(repos))
}
