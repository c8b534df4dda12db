//! Error taxonomy for the synchronization core.
//!
//! Host adapters and the git engine report failures as [`SyncError`]. The
//! orchestrator decides from the variant how far a failure reaches: a whole
//! integration, one repository, or a single ref.

use thiserror::Error;

/// Failures raised while mirroring repositories.
///
/// Variants carry rendered messages rather than source errors so that a
/// repository outcome can be cloned into reports and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Missing environment variable, malformed kind, invalid pattern.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials rejected or no access to the configured kind.
    #[error("authorization failed: {0}")]
    Auth(String),

    /// Kind type outside the set the adapter understands.
    #[error("unsupported kind '{kind}' (expected one of: {expected})")]
    UnsupportedKind { kind: String, expected: String },

    /// The local working copy could not be cloned or opened.
    #[error("local copy error at '{path}': {detail}")]
    LocalCopy { path: String, detail: String },

    /// Fetching from (or listing refs of) the source remote failed.
    #[error("fetch from '{remote}' failed: {detail}")]
    Fetch { remote: String, detail: String },

    /// A single ref push was rejected or could not reach the remote.
    #[error("push of '{refspec}' failed: {detail}")]
    Push { refspec: String, detail: String },

    /// The target repository could not be created.
    #[error("could not create repository '{slug}': {detail}")]
    Creation { slug: String, detail: String },

    /// A repository sync exceeded `sync.repository_timeout`.
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Transport or decoding failure while talking to a host REST API.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Http(err.to_string())
    }
}

impl From<octocrab::Error> for SyncError {
    fn from(err: octocrab::Error) -> Self {
        SyncError::Http(err.to_string())
    }
}
