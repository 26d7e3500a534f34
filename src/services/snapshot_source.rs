//! Collaborators the review tracker is wired to.
//!
//! The tracker never talks to GitHub or the OS directly: it is fed snapshots
//! by a [`SnapshotSource`] and hands arrivals to a [`Notifier`].

use crate::config::GitHubSettings;
use crate::error::AcquisitionError;
use crate::models::ReviewItem;
use crate::services::credentials::CredentialService;
use crate::services::github_client::{GitHubClient, GitHubClientConfig};
use futures::future::{BoxFuture, FutureExt};

/// Future returned by [`SnapshotSource::fetch`].
pub type FetchFuture<'a> = BoxFuture<'a, Result<Vec<ReviewItem>, AcquisitionError>>;

/// Produces the current ordered list of open review requests.
///
/// Implementations bound their own duration (request timeouts); the tracker
/// additionally gives up after its fetch timeout.
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> FetchFuture<'_>;
}

/// Emits user alerts for newly arrived review requests.
///
/// Fire-and-forget: failures are the notifier's own concern.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, items: &[ReviewItem]);
}

/// How the GitHub source obtains its token.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// Use this token as-is.
    Fixed(String),

    /// Resolve on every fetch (environment, then keychain), so a token
    /// saved while running is picked up by the next poll.
    Stored,
}

/// Snapshot source backed by the GitHub search API.
#[derive(Debug, Clone)]
pub struct GitHubSnapshotSource {
    settings: GitHubSettings,
    token: TokenSource,
}

impl GitHubSnapshotSource {
    pub fn new(settings: GitHubSettings, token: TokenSource) -> Self {
        Self { settings, token }
    }

    /// Build a client with the current token.
    pub fn client(&self) -> Result<GitHubClient, AcquisitionError> {
        let token = match &self.token {
            TokenSource::Fixed(token) => token.clone(),
            TokenSource::Stored => CredentialService::resolve_token()
                .map_err(|e| AcquisitionError::unauthorized(e.to_string()))?
                .map(|(token, _)| token)
                .ok_or_else(AcquisitionError::missing_token)?,
        };

        GitHubClient::new(GitHubClientConfig {
            base_url: self.settings.base_url.clone(),
            token,
            timeout_secs: self.settings.timeout_secs,
        })
    }
}

impl SnapshotSource for GitHubSnapshotSource {
    fn fetch(&self) -> FetchFuture<'_> {
        async move {
            let client = self.client()?;
            client
                .fetch_review_items(self.settings.max_items, self.settings.fetch_size_metrics)
                .await
        }
        .boxed()
    }
}
