//! Concrete hosting providers
//!
//! Bitbucket sources talk plain REST through `reqwest`; the GitHub target
//! goes through `octocrab`. Helpers shared by the REST adapters live here.

mod bitbucket_cloud;
mod bitbucket_server;
mod github;

pub use bitbucket_cloud::BitbucketCloud;
pub use bitbucket_server::BitbucketServer;
pub use github::GitHubTarget;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::credentials::Credentials;
use crate::discovery::Kind;
use crate::error::SyncError;

/// Hard ceiling on pages followed for a single listing
pub const MAX_PAGES: usize = 1000;

/// One page of a listing and the cursor of the next one, if any
#[derive(Debug)]
pub struct Page<C, T> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

/// Follow `fetch` from `first` until a page comes back without a cursor
///
/// Stops with a warning after [`MAX_PAGES`] pages.
pub async fn paginate<C, T, F, Fut>(first: C, mut fetch: F) -> Result<Vec<T>, SyncError>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<Page<C, T>, SyncError>>,
{
    let mut items = Vec::new();
    let mut cursor = Some(first);
    let mut pages = 0;

    while let Some(current) = cursor.take() {
        if pages >= MAX_PAGES {
            warn!("Reached maximum pagination limit ({} pages)", MAX_PAGES);
            break;
        }
        let page = fetch(current).await?;
        pages += 1;
        items.extend(page.items);
        cursor = page.next;
    }

    debug!("Collected {} items over {} pages", items.len(), pages);
    Ok(items)
}

/// Parse `raw` and make sure its type is one of `expected`
pub(crate) fn supported_kind(raw: &str, expected: &[&str]) -> Result<Kind, SyncError> {
    let kind = Kind::parse(raw)?;
    if expected.contains(&kind.kind_type.as_str()) {
        Ok(kind)
    } else {
        Err(kind.unsupported(expected))
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("repomirror/", env!("CARGO_PKG_VERSION"))),
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(SyncError::from)
}

/// Map rejected credentials to `Auth` and other failures to `Http`
pub(crate) fn check_response(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Err(
            SyncError::Auth(format!("{} returned {}", url, status)),
        ),
        _ => Err(SyncError::Http(format!("{} returned {}", url, status))),
    }
}

/// Authenticated GET decoding a JSON body
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
    creds: &Credentials,
) -> Result<T, SyncError> {
    debug!("GET {}", url);
    let response = client
        .get(url)
        .query(query)
        .basic_auth(&creds.account_id, Some(&creds.access_token))
        .send()
        .await?;
    Ok(check_response(response)?.json().await?)
}

/// Entry of a Bitbucket `links.clone` array
#[derive(Debug, Deserialize)]
pub(crate) struct CloneLink {
    pub href: String,
    pub name: String,
}

/// The HTTPS clone URL among a repository's clone links
pub(crate) fn https_clone_link(links: &[CloneLink]) -> Option<String> {
    links
        .iter()
        .find(|link| link.name.starts_with("http"))
        .map(|link| link.href.clone())
}
