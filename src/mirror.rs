//! Ref-level mirroring of one repository
//!
//! The working copy's `origin` is the source repository. An ephemeral
//! `target` remote is attached for the duration of a sync, every tag and
//! branch is pushed with its own refspec, and a rejected ref is recorded
//! without stopping the others.

use serde::{Serialize, Serializer};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::BranchModifier;
use crate::credentials::{CredentialProvider, Credentials};
use crate::discovery::Repository;
use crate::error::SyncError;
use crate::filter::Pattern;
use crate::git::{GitEngine, PushStatus, RefSet};

/// Remote name of the source repository in every working copy
pub const SOURCE_REMOTE: &str = "origin";

/// Remote name attached while pushing to the target
pub const TARGET_REMOTE: &str = "target";

/// Terminal state of one repository sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeState {
    Done,
    PartialFailure,
    FatalFailure,
}

/// What happened to one repository
///
/// A ref listed in a `failed_*` list was attempted and not pushed; a ref in a
/// `synced_*` list was pushed or already up to date. With a fatal error no
/// ref was attempted and all lists stay empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SyncOutcome {
    pub synced_tags: Vec<String>,
    pub synced_branches: Vec<String>,
    pub failed_tags: Vec<String>,
    pub failed_branches: Vec<String>,
    #[serde(serialize_with = "serialize_error")]
    pub fatal_error: Option<SyncError>,
}

fn serialize_error<S: Serializer>(error: &Option<SyncError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

impl SyncOutcome {
    pub fn fatal(error: SyncError) -> Self {
        Self {
            fatal_error: Some(error),
            ..Default::default()
        }
    }

    pub fn state(&self) -> OutcomeState {
        if self.fatal_error.is_some() {
            OutcomeState::FatalFailure
        } else if self.failed_tags.is_empty() && self.failed_branches.is_empty() {
            OutcomeState::Done
        } else {
            OutcomeState::PartialFailure
        }
    }
}

/// Exact refspec for mirroring a tag
pub fn tag_refspec(tag: &str) -> String {
    format!("refs/tags/{}:refs/tags/{}", tag, tag)
}

/// Refspec pushing the fetched source branch to `destination` on the target
pub fn branch_refspec(branch: &str, destination: &str) -> String {
    format!("refs/remotes/{}/{}:refs/heads/{}", SOURCE_REMOTE, branch, destination)
}

/// Move the default branch to the front, keeping the others in order
///
/// Pushing it first lets the target pick a sensible HEAD.
pub fn reorder_default_branch(mut branches: Vec<String>, default_branch: &str) -> Vec<String> {
    match branches.iter().position(|b| b == default_branch) {
        None | Some(0) => branches,
        Some(index) if index == branches.len() - 1 => {
            branches.rotate_right(1);
            branches
        }
        Some(index) => {
            let default = branches.remove(index);
            branches.insert(0, default);
            branches
        }
    }
}

#[derive(Debug, Clone)]
enum Rewrite {
    Prefix(String),
    Rename(String),
}

/// Destination-name rules for branches, first match wins
#[derive(Debug, Clone, Default)]
pub struct BranchRewriter {
    rules: Vec<(Pattern, Rewrite)>,
}

impl BranchRewriter {
    pub fn new(modifiers: &[BranchModifier]) -> Result<Self, SyncError> {
        let rules = modifiers
            .iter()
            .map(|modifier| {
                let pattern = Pattern::parse(&modifier.pattern)?;
                // rename takes precedence over prefix
                let rewrite = match (&modifier.rename, &modifier.prefix) {
                    (Some(rename), _) => Rewrite::Rename(rename.clone()),
                    (None, Some(prefix)) => Rewrite::Prefix(prefix.clone()),
                    (None, None) => {
                        return Err(SyncError::Config(format!(
                            "branch modifier '{}' needs a prefix or a rename",
                            modifier.name
                        )))
                    }
                };
                Ok((pattern, rewrite))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    /// Branch name to create on the target for source branch `branch`
    pub fn destination(&self, branch: &str) -> String {
        self.rules
            .iter()
            .find(|(pattern, _)| pattern.is_match(branch))
            .map(|(_, rewrite)| match rewrite {
                Rewrite::Prefix(prefix) => format!("{}{}", prefix, branch),
                Rewrite::Rename(name) => name.clone(),
            })
            .unwrap_or_else(|| branch.to_string())
    }
}

/// Mirrors the refs of repositories belonging to one integration
pub struct RefSync<'a, E: GitEngine + ?Sized> {
    engine: &'a E,
    integration: &'a str,
    rewriter: &'a BranchRewriter,
}

impl<'a, E: GitEngine + ?Sized> RefSync<'a, E> {
    pub fn new(engine: &'a E, integration: &'a str, rewriter: &'a BranchRewriter) -> Self {
        Self {
            engine,
            integration,
            rewriter,
        }
    }

    /// Bring the target of `repo` up to date with its source
    ///
    /// `work_dir` is the working copy location; it is cloned when missing
    /// and reused otherwise.
    pub async fn sync_repository<S, T>(
        &self,
        repo: &Repository,
        work_dir: &Path,
        source: &S,
        target: &T,
    ) -> SyncOutcome
    where
        S: CredentialProvider + Sync + ?Sized,
        T: CredentialProvider + Sync + ?Sized,
    {
        let source_auth = match source.credentials() {
            Ok(creds) => creds,
            Err(e) => return self.fatal(repo, "Failed to fetch source credentials", e),
        };
        let target_auth = match target.credentials() {
            Ok(creds) => creds,
            Err(e) => return self.fatal(repo, "Failed to fetch target credentials", e),
        };

        if let Err(e) = self.acquire_local_copy(repo, work_dir, &source_auth).await {
            return self.fatal(repo, "Failed to prepare local copy", e);
        }

        if let Err(e) = self.engine.add_remote(work_dir, TARGET_REMOTE, &repo.target_url).await {
            error!(
                integration = %self.integration,
                repository = %repo.slug,
                error = %e,
                "Failed to set target remote"
            );
        }

        let outcome = match self.transfer_refs(repo, work_dir, &source_auth, &target_auth).await {
            Ok(outcome) => outcome,
            Err(e) => self.fatal(repo, "Failed to get remote refs", e),
        };

        if let Err(e) = self.engine.remove_remote(work_dir, TARGET_REMOTE).await {
            warn!(
                integration = %self.integration,
                repository = %repo.slug,
                error = %e,
                "Failed to remove target remote"
            );
        }

        outcome
    }

    fn fatal(&self, repo: &Repository, message: &str, err: SyncError) -> SyncOutcome {
        error!(
            integration = %self.integration,
            repository = %repo.slug,
            error = %err,
            "{}", message
        );
        SyncOutcome::fatal(err)
    }

    async fn acquire_local_copy(
        &self,
        repo: &Repository,
        work_dir: &Path,
        source_auth: &Credentials,
    ) -> Result<(), SyncError> {
        if !work_dir.exists() {
            info!(
                integration = %self.integration,
                repository = %repo.slug,
                "Cloning {} into {}", repo.source_url, work_dir.display()
            );
            return self
                .engine
                .clone_repository(&repo.source_url, work_dir, source_auth)
                .await;
        }

        debug!("Reusing local copy at {}", work_dir.display());
        self.engine.open_repository(work_dir).await?;

        // Keep origin pointed at the current source location
        let current = self.engine.remote_url(work_dir, SOURCE_REMOTE).await?;
        let matches = current
            .as_deref()
            .is_some_and(|url| crate::git::remote_urls_match(url, &repo.source_url));
        if !matches {
            warn!(
                integration = %self.integration,
                repository = %repo.slug,
                "Origin URL changed, updating to {}", repo.source_url
            );
            self.engine
                .add_remote(work_dir, SOURCE_REMOTE, &repo.source_url)
                .await?;
        }
        Ok(())
    }

    async fn transfer_refs(
        &self,
        repo: &Repository,
        work_dir: &Path,
        source_auth: &Credentials,
        target_auth: &Credentials,
    ) -> Result<SyncOutcome, SyncError> {
        let status = self.engine.fetch(work_dir, SOURCE_REMOTE, source_auth).await?;
        debug!(repository = %repo.slug, "Fetch from origin: {:?}", status);

        let RefSet {
            tags,
            branches,
            default_branch,
        } = self
            .engine
            .list_remote_refs(work_dir, SOURCE_REMOTE, source_auth)
            .await?;
        let branches = reorder_default_branch(branches, &default_branch);

        info!(
            integration = %self.integration,
            repository = %repo.slug,
            tags = tags.len(),
            branches = branches.len(),
            default_branch = %default_branch,
            "Pushing refs to target"
        );

        let mut outcome = SyncOutcome::default();

        for tag in tags {
            let refspec = tag_refspec(&tag);
            match self.push(work_dir, &refspec, target_auth).await {
                Ok(()) => outcome.synced_tags.push(tag),
                Err(e) => {
                    error!(
                        integration = %self.integration,
                        repository = %repo.slug,
                        tag = %tag,
                        error = %e,
                        "Tag could not be synced"
                    );
                    outcome.failed_tags.push(tag);
                }
            }
        }

        for branch in branches {
            let refspec = branch_refspec(&branch, &self.rewriter.destination(&branch));
            match self.push(work_dir, &refspec, target_auth).await {
                Ok(()) => outcome.synced_branches.push(branch),
                Err(e) => {
                    error!(
                        integration = %self.integration,
                        repository = %repo.slug,
                        branch = %branch,
                        error = %e,
                        "Branch could not be synced"
                    );
                    outcome.failed_branches.push(branch);
                }
            }
        }

        if !outcome.failed_tags.is_empty() {
            warn!(
                integration = %self.integration,
                repository = %repo.slug,
                failed_tags = ?outcome.failed_tags,
                "Some tags not synced"
            );
        }
        if !outcome.failed_branches.is_empty() {
            warn!(
                integration = %self.integration,
                repository = %repo.slug,
                failed_branches = ?outcome.failed_branches,
                "Some branches not synced"
            );
        }

        Ok(outcome)
    }

    async fn push(&self, work_dir: &Path, refspec: &str, auth: &Credentials) -> Result<(), SyncError> {
        match self.engine.push(work_dir, TARGET_REMOTE, refspec, auth).await? {
            PushStatus::UpToDate => debug!("{} already up to date", refspec),
            PushStatus::Pushed => debug!("Pushed {}", refspec),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{FetchStatus, MockGitEngine};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct StaticCredentials(Result<Credentials, SyncError>);

    impl CredentialProvider for StaticCredentials {
        fn credentials(&self) -> Result<Credentials, SyncError> {
            self.0.clone()
        }
    }

    fn ok_creds() -> StaticCredentials {
        StaticCredentials(Ok(Credentials::new("user", "token")))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn repo() -> Repository {
        Repository::new("repo-2")
            .with_source_url("https://host/repo-2.git")
            .with_target_url("https://ghhost/repo-2.git")
    }

    fn refs(tags: &[&str], branches: &[&str], default_branch: &str) -> RefSet {
        RefSet {
            tags: strings(tags),
            branches: strings(branches),
            default_branch: default_branch.to_string(),
        }
    }

    /// Engine for a fresh clone; pushes are recorded and fail for `failing`
    fn engine_for_clone(ref_set: RefSet, failing: &'static [&'static str]) -> (MockGitEngine, Arc<Mutex<Vec<String>>>) {
        let pushed = Arc::new(Mutex::new(Vec::new()));
        let mut engine = MockGitEngine::new();

        engine.expect_clone_repository().times(1).returning(|_, _, _| Ok(()));
        engine.expect_add_remote().times(1).returning(|_, _, _| Ok(()));
        engine
            .expect_fetch()
            .times(1)
            .returning(|_, _, _| Ok(FetchStatus::UpToDate));
        engine
            .expect_list_remote_refs()
            .times(1)
            .returning(move |_, _, _| Ok(ref_set.clone()));

        let log = pushed.clone();
        engine.expect_push().returning(move |_, remote, refspec, _| {
            assert_eq!(remote, TARGET_REMOTE);
            log.lock().unwrap().push(refspec.to_string());
            if failing.iter().any(|f| refspec.contains(f)) {
                Err(SyncError::Push {
                    refspec: refspec.to_string(),
                    detail: "remote rejected".to_string(),
                })
            } else {
                Ok(PushStatus::Pushed)
            }
        });
        engine.expect_remove_remote().times(1).returning(|_, _| Ok(()));

        (engine, pushed)
    }

    #[test]
    fn test_reorder_default_branch() {
        assert_eq!(
            reorder_default_branch(strings(&["b", "a", "main"]), "main"),
            strings(&["main", "b", "a"])
        );
        assert_eq!(
            reorder_default_branch(strings(&["main", "b"]), "main"),
            strings(&["main", "b"])
        );
        assert_eq!(
            reorder_default_branch(strings(&["a", "main"]), "main"),
            strings(&["main", "a"])
        );
        assert_eq!(
            reorder_default_branch(strings(&["x", "main", "y", "z"]), "main"),
            strings(&["main", "x", "y", "z"])
        );
    }

    #[test]
    fn test_reorder_default_branch_absent_or_empty() {
        assert!(reorder_default_branch(Vec::new(), "main").is_empty());
        assert_eq!(
            reorder_default_branch(strings(&["a", "b"]), "master"),
            strings(&["a", "b"])
        );
    }

    #[test]
    fn test_refspecs() {
        assert_eq!(tag_refspec("v1.0"), "refs/tags/v1.0:refs/tags/v1.0");
        assert_eq!(
            branch_refspec("feature/x", "feature/x"),
            "refs/remotes/origin/feature/x:refs/heads/feature/x"
        );
    }

    #[test]
    fn test_branch_rewriter() {
        let rewriter = BranchRewriter::new(&[
            BranchModifier {
                name: "trunk".to_string(),
                pattern: "trunk".to_string(),
                prefix: Some("ignored/".to_string()),
                rename: Some("main".to_string()),
            },
            BranchModifier {
                name: "releases".to_string(),
                pattern: "/^release-/".to_string(),
                prefix: Some("legacy/".to_string()),
                rename: None,
            },
        ])
        .unwrap();

        assert_eq!(rewriter.destination("trunk"), "main");
        assert_eq!(rewriter.destination("release-1.2"), "legacy/release-1.2");
        assert_eq!(rewriter.destination("dev"), "dev");
        assert_eq!(BranchRewriter::default().destination("dev"), "dev");
    }

    #[test]
    fn test_branch_rewriter_requires_action() {
        let result = BranchRewriter::new(&[BranchModifier {
            name: "noop".to_string(),
            pattern: "dev".to_string(),
            prefix: None,
            rename: None,
        }]);
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn test_outcome_state() {
        assert_eq!(SyncOutcome::default().state(), OutcomeState::Done);
        let partial = SyncOutcome {
            failed_tags: strings(&["v2"]),
            ..Default::default()
        };
        assert_eq!(partial.state(), OutcomeState::PartialFailure);
        assert_eq!(
            SyncOutcome::fatal(SyncError::Config("x".into())).state(),
            OutcomeState::FatalFailure
        );
    }

    #[tokio::test]
    async fn test_all_refs_pushed_default_branch_first() {
        let temp = TempDir::new().unwrap();
        let work_dir = temp.path().join("repo-2");
        let (engine, pushed) = engine_for_clone(refs(&["v1"], &["dev", "main"], "main"), &[]);
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &work_dir, &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::Done);
        assert_eq!(outcome.synced_tags, strings(&["v1"]));
        assert_eq!(outcome.synced_branches, strings(&["main", "dev"]));
        assert_eq!(
            *pushed.lock().unwrap(),
            strings(&[
                "refs/tags/v1:refs/tags/v1",
                "refs/remotes/origin/main:refs/heads/main",
                "refs/remotes/origin/dev:refs/heads/dev",
            ])
        );
    }

    #[tokio::test]
    async fn test_failed_tag_does_not_block_other_refs() {
        let temp = TempDir::new().unwrap();
        let work_dir = temp.path().join("repo-2");
        let (engine, pushed) =
            engine_for_clone(refs(&["v1", "v2", "v3"], &["main", "dev"], "main"), &["tags/v2"]);
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &work_dir, &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::PartialFailure);
        assert_eq!(outcome.failed_tags, strings(&["v2"]));
        assert_eq!(outcome.synced_tags, strings(&["v1", "v3"]));
        assert!(outcome.failed_branches.is_empty());
        assert_eq!(outcome.synced_branches, strings(&["main", "dev"]));
        assert_eq!(pushed.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_failed_branch_recorded_by_source_name() {
        let temp = TempDir::new().unwrap();
        let work_dir = temp.path().join("repo-2");
        let (engine, _) = engine_for_clone(refs(&[], &["main", "release-1"], "main"), &["release-1"]);
        let rewriter = BranchRewriter::new(&[BranchModifier {
            name: "releases".to_string(),
            pattern: "/^release-/".to_string(),
            prefix: Some("legacy/".to_string()),
            rename: None,
        }])
        .unwrap();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &work_dir, &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.failed_branches, strings(&["release-1"]));
        assert_eq!(outcome.synced_branches, strings(&["main"]));
    }

    #[tokio::test]
    async fn test_source_credential_failure_is_fatal_without_pushes() {
        let temp = TempDir::new().unwrap();
        // No expectations: any engine call panics
        let engine = MockGitEngine::new();
        let rewriter = BranchRewriter::default();
        let broken = StaticCredentials(Err(SyncError::Config("Account ID not found".into())));

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), temp.path(), &broken, &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::FatalFailure);
        assert!(outcome.failed_tags.is_empty());
        assert!(outcome.failed_branches.is_empty());
        assert_eq!(
            outcome.fatal_error,
            Some(SyncError::Config("Account ID not found".into()))
        );
    }

    #[tokio::test]
    async fn test_clone_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut engine = MockGitEngine::new();
        engine.expect_clone_repository().times(1).returning(|_, dest, _| {
            Err(SyncError::LocalCopy {
                path: dest.display().to_string(),
                detail: "repository not found".to_string(),
            })
        });
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &temp.path().join("repo-2"), &ok_creds(), &ok_creds())
            .await;

        assert!(matches!(outcome.fatal_error, Some(SyncError::LocalCopy { .. })));
        assert!(outcome.synced_branches.is_empty());
    }

    #[tokio::test]
    async fn test_existing_copy_is_reused_and_origin_kept() {
        let temp = TempDir::new().unwrap();
        let mut engine = MockGitEngine::new();
        engine.expect_open_repository().times(1).returning(|_| Ok(()));
        engine
            .expect_remote_url()
            .times(1)
            .returning(|_, _| Ok(Some("https://user@host/repo-2".to_string())));
        engine
            .expect_add_remote()
            .times(1)
            .returning(|_, name, _| {
                assert_eq!(name, TARGET_REMOTE);
                Ok(())
            });
        engine
            .expect_fetch()
            .returning(|_, _, _| Ok(FetchStatus::UpToDate));
        engine
            .expect_list_remote_refs()
            .returning(|_, _, _| Ok(refs(&["v1"], &["main"], "main")));
        engine
            .expect_push()
            .times(2)
            .returning(|_, _, _, _| Ok(PushStatus::UpToDate));
        engine.expect_remove_remote().times(1).returning(|_, _| Ok(()));
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), temp.path(), &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::Done);
        assert_eq!(outcome.synced_tags, strings(&["v1"]));
    }

    #[tokio::test]
    async fn test_attach_failure_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let mut engine = MockGitEngine::new();
        engine.expect_clone_repository().returning(|_, _, _| Ok(()));
        engine.expect_add_remote().returning(|path, name, _| {
            Err(SyncError::LocalCopy {
                path: path.display().to_string(),
                detail: format!("failed to set remote '{}'", name),
            })
        });
        engine
            .expect_fetch()
            .returning(|_, _, _| Ok(FetchStatus::Updated));
        engine
            .expect_list_remote_refs()
            .returning(|_, _, _| Ok(refs(&[], &["main"], "main")));
        engine.expect_push().times(1).returning(|_, remote, refspec, _| {
            Err(SyncError::Push {
                refspec: refspec.to_string(),
                detail: format!("'{}' does not appear to be a git repository", remote),
            })
        });
        engine.expect_remove_remote().returning(|_, _| Ok(()));
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &temp.path().join("repo-2"), &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::PartialFailure);
        assert_eq!(outcome.failed_branches, strings(&["main"]));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal_and_remote_detached() {
        let temp = TempDir::new().unwrap();
        let mut engine = MockGitEngine::new();
        engine.expect_clone_repository().returning(|_, _, _| Ok(()));
        engine.expect_add_remote().returning(|_, _, _| Ok(()));
        engine.expect_fetch().returning(|_, remote, _| {
            Err(SyncError::Fetch {
                remote: remote.to_string(),
                detail: "connection reset".to_string(),
            })
        });
        engine.expect_remove_remote().times(1).returning(|_, _| Ok(()));
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &temp.path().join("repo-2"), &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::FatalFailure);
        assert!(matches!(outcome.fatal_error, Some(SyncError::Fetch { .. })));
        assert!(outcome.failed_tags.is_empty());
    }

    #[tokio::test]
    async fn test_detach_failure_does_not_change_outcome() {
        let temp = TempDir::new().unwrap();
        let mut engine = MockGitEngine::new();
        engine.expect_clone_repository().returning(|_, _, _| Ok(()));
        engine.expect_add_remote().returning(|_, _, _| Ok(()));
        engine
            .expect_fetch()
            .returning(|_, _, _| Ok(FetchStatus::UpToDate));
        engine
            .expect_list_remote_refs()
            .returning(|_, _, _| Ok(refs(&[], &["main"], "main")));
        engine
            .expect_push()
            .returning(|_, _, _, _| Ok(PushStatus::Pushed));
        engine.expect_remove_remote().returning(|path, _| {
            Err(SyncError::LocalCopy {
                path: path.display().to_string(),
                detail: "locked".to_string(),
            })
        });
        let rewriter = BranchRewriter::default();

        let outcome = RefSync::new(&engine, "it", &rewriter)
            .sync_repository(&repo(), &temp.path().join("repo-2"), &ok_creds(), &ok_creds())
            .await;

        assert_eq!(outcome.state(), OutcomeState::Done);
    }
}
