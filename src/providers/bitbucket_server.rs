use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{get_json, http_client, https_clone_link, paginate, supported_kind, CloneLink, Page};
use crate::config::{Config, SourceConfig};
use crate::credentials::{CredentialProvider, Credentials, EnvCredentials};
use crate::discovery::{Kind, Repository, Source};
use crate::error::SyncError;
use crate::filter::RepositoryFilter;

const KINDS: &[&str] = &["project", "user"];
const PAGE_LIMIT: &str = "100";

/// Self-hosted Bitbucket (REST API 1.0)
#[derive(Debug)]
pub struct BitbucketServer {
    api_base: String,
    kind: Kind,
    credentials: EnvCredentials,
    filter: RepositoryFilter,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryPage {
    #[serde(default)]
    values: Vec<ServerRepository>,
    #[serde(default = "last_page_when_missing")]
    is_last_page: bool,
    next_page_start: Option<u64>,
}

fn last_page_when_missing() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ServerRepository {
    slug: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    links: ServerLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ServerLinks {
    #[serde(default)]
    clone: Vec<CloneLink>,
}

impl BitbucketServer {
    pub fn new(source: &SourceConfig, config: &Config) -> Result<Self, SyncError> {
        let base_url = source
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| SyncError::Config("bitbucket-server requires base_url".to_string()))?;

        let credentials = EnvCredentials::new(&source.account_id, &source.access_token);
        credentials.ensure_present()?;

        Ok(Self {
            api_base: format!("{}/rest/api/1.0", base_url.trim_end_matches('/')),
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

    fn repositories_url(&self) -> String {
        let scope = if self.kind.kind_type == "project" {
            "projects"
        } else {
            "users"
        };
        format!("{}/{}/{}/repos", self.api_base, scope, self.kind.key)
    }

    async fn fetch_page(
        &self,
        url: &str,
        start: u64,
        creds: &Credentials,
    ) -> Result<Page<u64, ServerRepository>, SyncError> {
        let page: RepositoryPage = get_json(
            &self.client,
            url,
            &[("start", start.to_string()), ("limit", PAGE_LIMIT.to_string())],
            creds,
        )
        .await?;

        let next = if page.is_last_page {
            None
        } else {
            page.next_page_start
        };
        Ok(Page {
            items: page.values,
            next,
        })
    }
}

impl CredentialProvider for BitbucketServer {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        self.credentials.credentials()
    }
}

#[async_trait]
impl Source for BitbucketServer {
    async fn authenticate(&self) -> Result<(), SyncError> {
        let creds = self.credentials()?;
        let _: serde_json::Value = get_json(
            &self.client,
            &self.repositories_url(),
            &[("limit", "1".to_string())],
            &creds,
        )
        .await?;
        info!(kind = %self.kind, "Authenticated against Bitbucket Server");
        Ok(())
    }

    async fn repositories(&self, include_metadata: bool) -> Result<Vec<Repository>, SyncError> {
        let creds = self.credentials()?;
        let url = self.repositories_url();

        let listed = paginate(0, |start| self.fetch_page(&url, start, &creds)).await?;

        let mut repositories = Vec::with_capacity(listed.len());
        for repo in listed {
            let Some(clone_url) = https_clone_link(&repo.links.clone) else {
                warn!(repository = %repo.slug, "No HTTP clone link, skipping");
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
        "bitbucket-server"
    }
}
