//! Credential resolution for host adapters and git transport
//!
//! Configuration never holds secrets: `account_id` and `access_token` name
//! environment variables, which are read each time credentials are needed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::env;
use std::fmt;

use crate::error::SyncError;

/// An account id / access token pair
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub account_id: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(account_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Empty credentials, used for local remotes that need no authentication
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.account_id.is_empty() && self.access_token.is_empty()
    }

    /// `Authorization` header value for HTTP basic auth
    pub fn basic_auth_header(&self) -> Option<String> {
        if self.is_anonymous() {
            return None;
        }
        let encoded = STANDARD.encode(format!("{}:{}", self.account_id, self.access_token));
        Some(format!("Basic {}", encoded))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Anything that can hand out credentials for its host
pub trait CredentialProvider {
    fn credentials(&self) -> Result<Credentials, SyncError>;
}

/// Credentials looked up from named environment variables
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    account_id_var: String,
    access_token_var: String,
}

impl EnvCredentials {
    pub fn new(account_id_var: impl Into<String>, access_token_var: impl Into<String>) -> Self {
        Self {
            account_id_var: account_id_var.into(),
            access_token_var: access_token_var.into(),
        }
    }

    /// Fail early when either variable is missing
    pub fn ensure_present(&self) -> Result<(), SyncError> {
        self.credentials().map(|_| ())
    }

    fn lookup(var: &str, what: &str) -> Result<String, SyncError> {
        if var.is_empty() {
            return Err(SyncError::Config(format!("{} variable name is empty", what)));
        }
        env::var(var).map_err(|_| {
            tracing::error!(variable = %var, "{} not found in environment", what);
            SyncError::Config(format!("{} not found: environment variable '{}' is not set", what, var))
        })
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<Credentials, SyncError> {
        let account_id = Self::lookup(&self.account_id_var, "Account ID")?;
        let access_token = Self::lookup(&self.access_token_var, "Access token")?;
        Ok(Credentials {
            account_id,
            access_token,
        })
    }
}
