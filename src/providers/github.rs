use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::supported_kind;
use crate::config::TargetConfig;
use crate::credentials::{CredentialProvider, Credentials, EnvCredentials};
use crate::discovery::{Kind, Repository, Target};
use crate::error::SyncError;

const KINDS: &[&str] = &["org", "user"];

/// GitHub (public or Enterprise) as a mirror target
pub struct GitHubTarget {
    client: Octocrab,
    kind: Kind,
    credentials: EnvCredentials,
    create_missing: bool,
}

impl std::fmt::Debug for GitHubTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubTarget")
            .field("kind", &self.kind)
            .field("credentials", &self.credentials)
            .field("create_missing", &self.create_missing)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct RemoteRepository {
    clone_url: String,
}

#[derive(Debug, Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Membership {
    #[serde(default)]
    state: Option<String>,
}

fn is_not_found(err: &octocrab::Error) -> bool {
    matches!(err, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

impl GitHubTarget {
    pub fn new(target: &TargetConfig) -> Result<Self, SyncError> {
        let credentials = EnvCredentials::new(&target.account_id, &target.access_token);
        let token = credentials.credentials()?.access_token;
        let kind = supported_kind(&target.kind, KINDS)?;

        let mut builder = Octocrab::builder().personal_token(token);
        if let Some(base_url) = target.base_url.as_deref().filter(|url| !url.is_empty()) {
            builder = builder.base_uri(base_url)?;
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            kind,
            credentials,
            create_missing: target.create_missing,
        })
    }

    fn is_org(&self) -> bool {
        self.kind.kind_type == "org"
    }

    async fn find(&self, slug: &str) -> Result<Option<String>, octocrab::Error> {
        let route = format!("/repos/{}/{}", self.kind.key, slug);
        match self.client.get::<RemoteRepository, _, ()>(route, None).await {
            Ok(repo) => Ok(Some(repo.clone_url)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, repo: &Repository) -> Result<String, SyncError> {
        let route = if self.is_org() {
            format!("/orgs/{}/repos", self.kind.key)
        } else {
            "/user/repos".to_string()
        };
        let body = json!({
            "name": repo.slug,
            "description": repo.description,
        });

        let created: RemoteRepository = self
            .client
            .post(route, Some(&body))
            .await
            .map_err(|e| SyncError::Creation {
                slug: repo.slug.clone(),
                detail: e.to_string(),
            })?;
        info!(repository = %repo.slug, owner = %self.kind.key, "Created target repository");
        Ok(created.clone_url)
    }

    /// Target URL for `repo`, or `None` when it has to be left out
    async fn resolve(&self, repo: &Repository) -> Option<String> {
        match self.find(&repo.slug).await {
            Ok(Some(url)) => {
                debug!(repository = %repo.slug, "Target repository exists");
                return Some(url);
            }
            Ok(None) => info!(repository = %repo.slug, "Repository not found on target"),
            Err(e) => {
                error!(repository = %repo.slug, error = %e, "Target lookup failed, skipping repository");
                return None;
            }
        }

        if !self.create_missing {
            warn!(repository = %repo.slug, "Creation disabled, skipping repository");
            return None;
        }

        match self.create(repo).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!(repository = %repo.slug, error = %e, "Repository creation failed, skipping repository");
                None
            }
        }
    }
}

impl CredentialProvider for GitHubTarget {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        self.credentials.credentials()
    }
}

#[async_trait]
impl Target for GitHubTarget {
    async fn authenticate(&self) -> Result<(), SyncError> {
        let creds = self.credentials()?;

        if self.is_org() {
            let route = format!("/orgs/{}/memberships/{}", self.kind.key, creds.account_id);
            let membership: Membership = self.client.get(route, None::<&()>).await.map_err(|e| {
                error!(organization = %self.kind.key, "Organization membership check failed");
                SyncError::Auth(format!(
                    "{} is not a member of organization {}: {}",
                    creds.account_id, self.kind.key, e
                ))
            })?;
            if membership.state.as_deref() == Some("pending") {
                return Err(SyncError::Auth(format!(
                    "membership of {} in {} is still pending",
                    creds.account_id, self.kind.key
                )));
            }
        } else {
            let user: AuthenticatedUser = self
                .client
                .get("/user", None::<&()>)
                .await
                .map_err(|e| SyncError::Auth(e.to_string()))?;
            if user.login != self.kind.key {
                error!(user = %self.kind.key, login = %user.login, "Kind username does not match token owner");
                return Err(SyncError::Auth(format!(
                    "token belongs to {}, cannot push to user {}",
                    user.login, self.kind.key
                )));
            }
        }

        info!(kind = %self.kind, "Authenticated against GitHub");
        Ok(())
    }

    async fn sync_check(&self, repos: Vec<Repository>) -> Vec<Repository> {
        let mut resolved = Vec::with_capacity(repos.len());
        for repo in repos {
            if let Some(url) = self.resolve(&repo).await {
                resolved.push(repo.with_target_url(url));
            }
        }
        resolved
    }

    fn provider_name(&self) -> &'static str {
        "github"
    }
}
