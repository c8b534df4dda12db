use async_trait::async_trait;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::credentials::Credentials;
use crate::error::SyncError;

/// Default branch assumed when the remote does not advertise a symbolic HEAD
pub const FALLBACK_DEFAULT_BRANCH: &str = "master";

/// Tags and branches advertised by a remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSet {
    pub tags: Vec<String>,
    pub branches: Vec<String>,
    pub default_branch: String,
}

impl RefSet {
    /// Parse the output of `git ls-remote --symref`
    pub fn parse_ls_remote(output: &str) -> Self {
        let mut tags = Vec::new();
        let mut branches = Vec::new();
        let mut default_branch = None;

        for line in output.lines() {
            let Some((left, refname)) = line.split_once('\t') else {
                continue;
            };
            let refname = refname.trim();

            if let Some(target) = left.strip_prefix("ref: ") {
                if refname == "HEAD" {
                    default_branch = target.strip_prefix("refs/heads/").map(str::to_string);
                }
                continue;
            }

            if let Some(tag) = refname.strip_prefix("refs/tags/") {
                // Peeled entries repeat an annotated tag
                if !tag.ends_with("^{}") {
                    tags.push(tag.to_string());
                }
            } else if let Some(branch) = refname.strip_prefix("refs/heads/") {
                branches.push(branch.to_string());
            }
        }

        Self {
            tags,
            branches,
            default_branch: default_branch.unwrap_or_else(|| FALLBACK_DEFAULT_BRANCH.to_string()),
        }
    }
}

/// Result of a fetch that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Updated,
    UpToDate,
}

/// Result of a single-refspec push that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Pushed,
    UpToDate,
}

/// Operations the ref sync needs from a git implementation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitEngine: Send + Sync {
    /// Clone `url` into `dest` as a working copy
    async fn clone_repository(&self, url: &str, dest: &Path, auth: &Credentials) -> Result<(), SyncError>;

    /// Check that `path` holds a usable working copy
    async fn open_repository(&self, path: &Path) -> Result<(), SyncError>;

    /// Current URL of a remote, if it exists
    async fn remote_url(&self, repo: &Path, name: &str) -> Result<Option<String>, SyncError>;

    /// Register `name` → `url`, replacing an existing remote of that name
    async fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), SyncError>;

    async fn remove_remote(&self, repo: &Path, name: &str) -> Result<(), SyncError>;

    /// Fetch all branches and tags from `remote`
    async fn fetch(&self, repo: &Path, remote: &str, auth: &Credentials) -> Result<FetchStatus, SyncError>;

    /// Tags, branches and default branch advertised by `remote`
    async fn list_remote_refs(&self, repo: &Path, remote: &str, auth: &Credentials) -> Result<RefSet, SyncError>;

    /// Push exactly one refspec to `remote`
    async fn push(
        &self,
        repo: &Path,
        remote: &str,
        refspec: &str,
        auth: &Credentials,
    ) -> Result<PushStatus, SyncError>;
}

/// Git engine backed by the system `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            binary: "git".to_string(),
        }
    }

    /// Output of `git --version`, used as an availability probe
    pub async fn version(&self) -> Result<String, SyncError> {
        let mut cmd = self.command(None, None);
        cmd.arg("--version");
        let output = Self::run(cmd, "--version").await.map_err(SyncError::Config)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Base command with prompts disabled and credentials passed as an
    /// HTTP header through the environment
    fn command(&self, repo: Option<&Path>, auth: Option<&Credentials>) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.binary);
        if let Some(repo) = repo {
            cmd.arg("-C").arg(repo);
        }

        cmd.env("GIT_TERMINAL_PROMPT", "0");
        if let Some(header) = auth.and_then(Credentials::basic_auth_header) {
            cmd.env("GIT_CONFIG_COUNT", "1")
                .env("GIT_CONFIG_KEY_0", "http.extraHeader")
                .env("GIT_CONFIG_VALUE_0", format!("Authorization: {}", header));
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }

    /// Run to completion; a non-zero exit becomes the trimmed stderr
    async fn run(mut cmd: AsyncCommand, what: &str) -> Result<Output, String> {
        let output = cmd
            .output()
            .await
            .map_err(|e| format!("failed to execute git {}: {}", what, e))?;

        if output.status.success() {
            Ok(output)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Err(match (stderr.is_empty(), stdout.is_empty()) {
                (false, _) => stderr,
                (true, false) => stdout,
                (true, true) => format!("git {} exited with {}", what, output.status),
            })
        }
    }
}

#[async_trait]
impl GitEngine for GitCli {
    async fn clone_repository(&self, url: &str, dest: &Path, auth: &Credentials) -> Result<(), SyncError> {
        let local_copy_error = |detail: String| SyncError::LocalCopy {
            path: dest.display().to_string(),
            detail,
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| local_copy_error(format!("failed to create parent directory: {}", e)))?;
        }

        debug!("Cloning {} into {}", url, dest.display());
        let mut cmd = self.command(None, Some(auth));
        cmd.arg("clone").arg("--no-checkout").arg(url).arg(dest);

        Self::run(cmd, "clone").await.map_err(local_copy_error)?;
        Ok(())
    }

    async fn open_repository(&self, path: &Path) -> Result<(), SyncError> {
        let mut cmd = self.command(Some(path), None);
        cmd.args(["rev-parse", "--git-dir"]);

        let local_copy_error = |detail: String| SyncError::LocalCopy {
            path: path.display().to_string(),
            detail,
        };

        let output = Self::run(cmd, "rev-parse").await.map_err(local_copy_error)?;

        // Anything but ".git" means git walked up into an enclosing repository
        let git_dir = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if git_dir != ".git" {
            return Err(local_copy_error(format!(
                "not the root of a git working copy (git dir: {})",
                git_dir
            )));
        }
        Ok(())
    }

    async fn remote_url(&self, repo: &Path, name: &str) -> Result<Option<String>, SyncError> {
        let mut cmd = self.command(Some(repo), None);
        cmd.args(["remote", "get-url", name]);

        // A missing remote is an ordinary answer here
        match Self::run(cmd, "remote get-url").await {
            Ok(output) => Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn add_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), SyncError> {
        let exists = self.remote_url(repo, name).await?.is_some();

        let mut cmd = self.command(Some(repo), None);
        if exists {
            debug!("Remote '{}' already exists in {}, updating URL", name, repo.display());
            cmd.args(["remote", "set-url", name, url]);
        } else {
            cmd.args(["remote", "add", name, url]);
        }

        Self::run(cmd, "remote add")
            .await
            .map(|_| ())
            .map_err(|detail| SyncError::LocalCopy {
                path: repo.display().to_string(),
                detail: format!("failed to set remote '{}': {}", name, detail),
            })
    }

    async fn remove_remote(&self, repo: &Path, name: &str) -> Result<(), SyncError> {
        let mut cmd = self.command(Some(repo), None);
        cmd.args(["remote", "remove", name]);

        Self::run(cmd, "remote remove")
            .await
            .map(|_| ())
            .map_err(|detail| SyncError::LocalCopy {
                path: repo.display().to_string(),
                detail: format!("failed to remove remote '{}': {}", name, detail),
            })
    }

    async fn fetch(&self, repo: &Path, remote: &str, auth: &Credentials) -> Result<FetchStatus, SyncError> {
        let mut cmd = self.command(Some(repo), Some(auth));
        cmd.args(["fetch", "--tags", "--force", "--prune", remote]);

        let output = Self::run(cmd, "fetch").await.map_err(|detail| SyncError::Fetch {
            remote: remote.to_string(),
            detail,
        })?;

        // git reports ref updates on stderr and stays silent when nothing changed
        if output.stderr.iter().all(u8::is_ascii_whitespace) {
            Ok(FetchStatus::UpToDate)
        } else {
            Ok(FetchStatus::Updated)
        }
    }

    async fn list_remote_refs(&self, repo: &Path, remote: &str, auth: &Credentials) -> Result<RefSet, SyncError> {
        let mut cmd = self.command(Some(repo), Some(auth));
        cmd.args(["ls-remote", "--symref", remote]);

        let output = Self::run(cmd, "ls-remote").await.map_err(|detail| SyncError::Fetch {
            remote: remote.to_string(),
            detail,
        })?;

        Ok(RefSet::parse_ls_remote(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn push(
        &self,
        repo: &Path,
        remote: &str,
        refspec: &str,
        auth: &Credentials,
    ) -> Result<PushStatus, SyncError> {
        let mut cmd = self.command(Some(repo), Some(auth));
        cmd.args(["push", "--porcelain", remote, refspec]);

        let output = Self::run(cmd, "push").await.map_err(|detail| SyncError::Push {
            refspec: refspec.to_string(),
            detail,
        })?;

        Ok(parse_push_porcelain(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Interpret `git push --porcelain` output of a successful push
fn parse_push_porcelain(stdout: &str) -> PushStatus {
    let up_to_date = stdout
        .lines()
        .filter(|line| line.len() > 1 && line.as_bytes()[1] == b'\t')
        .all(|line| line.starts_with('='));

    let any_ref_line = stdout
        .lines()
        .any(|line| line.len() > 1 && line.as_bytes()[1] == b'\t');

    if (any_ref_line && up_to_date) || stdout.contains("Everything up-to-date") {
        PushStatus::UpToDate
    } else {
        PushStatus::Pushed
    }
}

/// Compare clone URLs ignoring embedded user names, case and a `.git` suffix
pub fn remote_urls_match(actual: &str, expected: &str) -> bool {
    let normalize = |url: &str| -> String {
        let url = url.trim().trim_end_matches('/').trim_end_matches(".git");
        let url = match url.split_once("://") {
            Some((scheme, rest)) => {
                let rest = match rest.split_once('/') {
                    Some((authority, path)) => {
                        let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
                        format!("{}/{}", host, path)
                    }
                    None => rest.rsplit_once('@').map_or(rest, |(_, h)| h).to_string(),
                };
                format!("{}://{}", scheme, rest)
            }
            None => url.to_string(),
        };
        url.to_lowercase()
    };

    normalize(actual) == normalize(expected)
}
