//! Common test utilities and helpers for repomirror tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use repomirror::{CredentialProvider, Credentials, Repository, Source, SyncError, Target};

/// Scratch area holding source repositories, target repositories and the
/// sync directory, with environment variables restored on drop
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub original_env: Vec<(String, Option<String>)>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for dir in ["sources", "targets", "sync", "scratch"] {
            std::fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create test dir");
        }

        Self {
            temp_dir,
            original_env: Vec::new(),
        }
    }

    pub fn set_env_var(&mut self, key: &str, value: &str) {
        self.original_env.push((key.to_string(), env::var(key).ok()));
        env::set_var(key, value);
    }

    pub fn sources(&self) -> PathBuf {
        self.temp_dir.path().join("sources")
    }

    pub fn targets(&self) -> PathBuf {
        self.temp_dir.path().join("targets")
    }

    pub fn sync_root(&self) -> PathBuf {
        self.temp_dir.path().join("sync")
    }

    pub fn scratch(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.temp_dir.path().join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }
}

impl Drop for TestEnvironment {
    fn drop(&mut self) {
        // Restore original environment variables
        for (key, value) in self.original_env.iter().rev() {
            match value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }
}

/// Run git in `dir`, panicking with its stderr on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Mirror Test", "-c", "user.email=mirror@example.com"])
        .args(args)
        .output()
        .expect("Failed to execute git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Commit a file change in a working repository
pub fn commit(work: &Path, file: &str, content: &str) {
    std::fs::write(work.join(file), content).expect("Failed to write file");
    git(work, &["add", file]);
    git(work, &["commit", "-q", "-m", &format!("update {}", file)]);
}

/// A bare source repository named `<name>.git` with `default_branch` plus
/// the extra `branches` and `tags`, each on its own commit
pub fn create_source_repo(
    env: &TestEnvironment,
    name: &str,
    default_branch: &str,
    branches: &[&str],
    tags: &[&str],
) -> PathBuf {
    let work = env.scratch().join(name);
    std::fs::create_dir_all(&work).expect("Failed to create work dir");
    git(&work, &["init", "-q", "-b", default_branch]);
    commit(&work, "README.md", name);

    for tag in tags {
        commit(&work, "VERSION", tag);
        git(&work, &["tag", tag]);
    }
    for branch in branches {
        git(&work, &["checkout", "-q", "-b", branch, default_branch]);
        commit(&work, "BRANCH", branch);
    }
    git(&work, &["checkout", "-q", default_branch]);

    let bare = env.sources().join(format!("{}.git", name));
    git(
        &env.sources(),
        &["clone", "-q", "--bare", work.to_str().unwrap(), bare.to_str().unwrap()],
    );
    bare
}

/// An empty bare target repository named `<name>.git`
pub fn create_target_repo(env: &TestEnvironment, name: &str) -> PathBuf {
    let bare = env.targets().join(format!("{}.git", name));
    git(&env.targets(), &["init", "-q", "--bare", bare.to_str().unwrap()]);
    bare
}

/// Place a tag named `tag` on an unrelated commit in `target`
pub fn plant_conflicting_tag(env: &TestEnvironment, target: &Path, tag: &str) {
    let work = env.scratch().join(format!("conflict-{}", tag));
    std::fs::create_dir_all(&work).expect("Failed to create work dir");
    git(&work, &["init", "-q", "-b", "main"]);
    commit(&work, "OTHER", "unrelated history");
    git(&work, &["tag", tag]);
    git(
        &work,
        &["push", "-q", target.to_str().unwrap(), &format!("refs/tags/{}:refs/tags/{}", tag, tag)],
    );
}

/// Short names of the refs under `prefix` (e.g. `refs/tags/`) in `repo`
pub fn ref_names(repo: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = git(repo, &["for-each-ref", "--format=%(refname)", prefix])
        .lines()
        .filter_map(|line| line.strip_prefix(prefix).map(str::to_string))
        .collect();
    names.sort();
    names
}

pub fn rev_parse(repo: &Path, rev: &str) -> String {
    git(repo, &["rev-parse", rev]).trim().to_string()
}

/// Source serving a fixed list of local repositories
pub struct LocalSource {
    pub repositories: Vec<Repository>,
}

impl LocalSource {
    pub fn new(paths: &[(&str, &Path)]) -> Self {
        Self {
            repositories: paths
                .iter()
                .map(|(slug, path)| Repository::new(*slug).with_source_url(path.to_str().unwrap()))
                .collect(),
        }
    }
}

impl CredentialProvider for LocalSource {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        Ok(Credentials::anonymous())
    }
}

#[async_trait]
impl Source for LocalSource {
    async fn authenticate(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn repositories(&self, _include_metadata: bool) -> Result<Vec<Repository>, SyncError> {
        Ok(self.repositories.clone())
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

/// Target resolving `<slug>` to `<root>/<slug>.git` when it exists
pub struct LocalTarget {
    pub root: PathBuf,
}

impl CredentialProvider for LocalTarget {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        Ok(Credentials::anonymous())
    }
}

#[async_trait]
impl Target for LocalTarget {
    async fn authenticate(&self) -> Result<(), SyncError> {
        Ok(())
    }

    async fn sync_check(&self, repos: Vec<Repository>) -> Vec<Repository> {
        repos
            .into_iter()
            .filter_map(|repo| {
                let path = self.root.join(format!("{}.git", repo.slug));
                path.exists()
                    .then(|| repo.with_target_url(path.to_str().unwrap()))
            })
            .collect()
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
