use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{get_json, http_client, https_clone_link, paginate, supported_kind, CloneLink, Page};
use crate::config::{Config, SourceConfig};
use crate::credentials::{CredentialProvider, Credentials, EnvCredentials};
use crate::discovery::{Kind, Repository, Source};
use crate::error::SyncError;
use crate::filter::RepositoryFilter;

const DEFAULT_API: &str = "https://api.bitbucket.org/2.0";
const KINDS: &[&str] = &["project", "user"];

/// bitbucket.org (REST API 2.0)
#[derive(Debug)]
pub struct BitbucketCloud {
    api_base: String,
    kind: Kind,
    credentials: EnvCredentials,
    filter: RepositoryFilter,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct RepositoryPage {
    #[serde(default)]
    values: Vec<CloudRepository>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloudRepository {
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    links: CloudLinks,
    #[serde(default)]
    project: Option<ProjectRef>,
}

#[derive(Debug, Default, Deserialize)]
struct CloudLinks {
    #[serde(default)]
    clone: Vec<CloneLink>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    key: String,
}

impl BitbucketCloud {
    pub fn new(source: &SourceConfig, config: &Config) -> Result<Self, SyncError> {
        let credentials = EnvCredentials::new(&source.account_id, &source.access_token);
        credentials.ensure_present()?;

        let api_base = source
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_base,
            kind: supported_kind(&source.kind, KINDS)?,
            credentials,
            filter: RepositoryFilter::new(
                &source.repositories.include,
                &source.repositories.exclude,
                config.filters.empty_include,
            )?,
            client: http_client(config.sync.http_timeout())?,
        })
    }

    fn is_project(&self) -> bool {
        self.kind.kind_type == "project"
    }

    /// Workspace whose repositories are listed: the account itself for a
    /// project, the named user otherwise
    fn owner<'a>(&'a self, creds: &'a Credentials) -> &'a str {
        if self.is_project() {
            &creds.account_id
        } else {
            &self.kind.key
        }
    }

    async fn fetch_page(
        &self,
        url: String,
        creds: &Credentials,
    ) -> Result<Page<String, CloudRepository>, SyncError> {
        let page: RepositoryPage = get_json(&self.client, &url, &[], creds).await?;
        Ok(Page {
            items: page.values,
            next: page.next,
        })
    }
}

impl CredentialProvider for BitbucketCloud {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        self.credentials.credentials()
    }
}

#[async_trait]
impl Source for BitbucketCloud {
    async fn authenticate(&self) -> Result<(), SyncError> {
        let creds = self.credentials()?;
        let url = if self.is_project() {
            format!(
                "{}/workspaces/{}/projects/{}",
                self.api_base, creds.account_id, self.kind.key
            )
        } else {
            format!("{}/repositories/{}", self.api_base, self.kind.key)
        };

        let result: Result<serde_json::Value, _> = get_json(&self.client, &url, &[], &creds).await;
        match result {
            Ok(_) => {
                info!(kind = %self.kind, "Authenticated against Bitbucket Cloud");
                Ok(())
            }
            Err(SyncError::Auth(detail)) if self.is_project() => Err(SyncError::Auth(format!(
                "project {} not found, check user access ({})",
                self.kind.key, detail
            ))),
            Err(e) => Err(e),
        }
    }

    async fn repositories(&self, include_metadata: bool) -> Result<Vec<Repository>, SyncError> {
        let creds = self.credentials()?;
        let first = format!(
            "{}/repositories/{}?role=member&pagelen=100",
            self.api_base,
            self.owner(&creds)
        );

        let listed = paginate(first, |url| self.fetch_page(url, &creds)).await?;

        let mut repositories = Vec::new();
        for repo in listed {
            if self.is_project() {
                let in_project = repo
                    .project
                    .as_ref()
                    .is_some_and(|project| project.key == self.kind.key);
                if !in_project {
                    continue;
                }
            }
            let Some(clone_url) = https_clone_link(&repo.links.clone) else {
                warn!(repository = %repo.slug, "No HTTPS clone link, skipping");
                continue;
            };
            let mut entry = Repository::new(repo.slug).with_source_url(clone_url);
            if include_metadata {
                entry = entry.with_description(repo.description.unwrap_or_default());
            }
            repositories.push(entry);
        }

        debug!(kind = %self.kind, "Listed {} repositories", repositories.len());
        Ok(self.filter.apply(repositories))
    }

    fn provider_name(&self) -> &'static str {
        "bitbucket-cloud"
    }
}
