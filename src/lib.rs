//! repomirror - Repository mirroring between hosting providers
//!
//! repomirror lists repositories on a source host, makes sure each one exists
//! on a target host, and pushes every tag and branch individually so that a
//! single rejected ref never blocks the rest of the repository.
//!
//! ## Core Features
//!
//! - **Sources**: Bitbucket Cloud and Bitbucket Server
//! - **Targets**: GitHub, with on-demand repository creation
//! - **Filtering**: Literal and `/regex/` include/exclude rules
//! - **Failure isolation**: per ref, per repository and per integration
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Source/target contracts and provider selection
//! - [`filter`]: Repository include/exclude rules
//! - [`mirror`]: Ref-level sync of one repository
//! - [`sync`]: Orchestration over integrations and repositories

pub mod config;
pub mod credentials;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod git;
pub mod health;
pub mod mirror;
pub mod providers;
pub mod sync;
pub mod telemetry;

pub use config::Config;
pub use credentials::{CredentialProvider, Credentials, EnvCredentials};
pub use discovery::{Kind, Repository, Source, SourcePlugin, Target, TargetPlugin};
pub use error::SyncError;
pub use filter::{filter_repositories, EmptyIncludePolicy, RepositoryFilter};
pub use git::{GitCli, GitEngine};
pub use health::HealthCheck;
pub use mirror::{BranchRewriter, OutcomeState, RefSync, SyncOutcome};
pub use sync::{IntegrationReport, IntegrationStatus, RunReport, SyncEngine};
