//! Core YouTube API client functionality and authentication management.

use crate::auth::Authenticator;
use crate::error::{ApiError, AuthError};
use crate::youtube_api::{
    channels::Channel,
    playlist_items::PlaylistItem,
    subscriptions::Subscription,
    types::{ListResponse, Page, PagedStream},
    videos::Video,
};
use eyre::Context;
use http::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

/// The most items any list endpoint returns per page, and the most ids it accepts per call.
pub const MAX_RESULTS: usize = 50;

/// Error reasons Google uses for quota exhaustion and rate limiting.
const RATE_LIMIT_REASONS: &[&str] = &[
    "quotaExceeded",
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "dailyLimitExceeded",
];

/// Client for the read-only parts of the YouTube Data API v3 that this tool needs.
///
/// Every request first asks the shared [`Authenticator`] for a bearer token, which transparently
/// refreshes an expired access token. Clones share the authenticator and the connection pool.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    auth: Arc<Mutex<Authenticator>>,
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl YouTubeClient {
    /// Creates a client that talks to `base_url` (normally [`crate::config::YOUTUBE_API_BASE`]).
    ///
    /// `timeout` bounds every request; a request that exceeds it fails with
    /// [`ApiError::Transport`].
    pub fn new(auth: Authenticator, base_url: &str, timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build YouTube API HTTP client")?;
        Ok(Self {
            auth: Arc::new(Mutex::new(auth)),
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    ///
    /// Concurrent callers serialize on the authenticator so that at most one refresh is in
    /// flight.
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        self.auth.lock().await.bearer_token().await
    }

    /// Makes an authenticated `GET` request and decodes the JSON response.
    ///
    /// Returns `Ok(None)` for `404 Not Found`, which some endpoints use for an empty result.
    /// `401 Unauthorized` means the token was revoked behind our back and becomes
    /// [`AuthError::Rejected`]; every other non-success status becomes an [`ApiError`].
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<Option<T>> {
        let access_token = self.fresh_access_token().await?;
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(endpoint, "resource not found");
            return Ok(None);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(endpoint, "access token rejected");
            return Err(AuthError::Rejected {
                endpoint: endpoint.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_failure(endpoint, status, &body).into());
        }

        let decoded = response.json().await.map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })?;
        Ok(Some(decoded))
    }

    /// Like [`Self::get_json`], but a `404` is an error too.
    async fn get_required<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<T> {
        self.get_json(endpoint, query_params).await?.ok_or_else(|| {
            eyre::Report::new(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: StatusCode::NOT_FOUND,
                message: "not found".to_string(),
            })
        })
    }

    /// Returns a paginated stream of every channel the authenticated user is subscribed to.
    ///
    /// Uses `subscriptions.list` with `mine=true`. The stream yields raw
    /// [`Subscription`] resources; de-duplication by channel happens in
    /// [`crate::subscriptions::unique_channels`].
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/subscriptions/list>
    #[instrument(skip(self))]
    pub fn list_my_subscriptions(
        &self,
    ) -> impl Stream<Item = eyre::Result<Subscription>> + Send + use<'_> {
        PagedStream::new(move |page_token| async move {
            let response = self.list_subscriptions_internal(page_token).await?;
            Ok(Page::from(response))
        })
    }

    /// Looks up the `contentDetails` of the given channels.
    ///
    /// Ids are sent in batches of [`MAX_RESULTS`]. Channels that no longer exist are silently
    /// absent from the result, so callers must check which ids came back.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    #[instrument(skip(self, channel_ids), fields(channels = channel_ids.len()))]
    pub async fn list_channels(&self, channel_ids: &[String]) -> eyre::Result<Vec<Channel>> {
        let mut channels = Vec::with_capacity(channel_ids.len());
        for batch in channel_ids.chunks(MAX_RESULTS) {
            let ids = batch.join(",");
            let max_results = MAX_RESULTS.to_string();
            let response: ListResponse<Channel> = self
                .get_required(
                    "channels",
                    &[
                        ("part", "contentDetails"),
                        ("id", &ids),
                        ("maxResults", &max_results),
                    ],
                )
                .await
                .context("look up channel upload playlists")?;
            tracing::debug!(
                requested = batch.len(),
                returned_items = response.items.len(),
                "fetched channels"
            );
            channels.extend(response.items);
        }
        Ok(channels)
    }

    /// Returns a paginated stream of the items in a playlist, in playlist order.
    ///
    /// For a channel's uploads playlist that order is newest first. A playlist that does not
    /// exist (YouTube answers `404 playlistNotFound` for channels that never uploaded) yields an
    /// empty stream.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self))]
    pub fn list_playlist_items(
        &self,
        playlist_id: &str,
    ) -> impl Stream<Item = eyre::Result<PlaylistItem>> + Send + use<'_> {
        let playlist_id = playlist_id.to_string();
        PagedStream::new(move |page_token| {
            let playlist_id = playlist_id.clone();
            async move {
                let response = self
                    .list_playlist_items_internal(&playlist_id, page_token)
                    .await?;
                Ok(Page::from(response))
            }
        })
    }

    /// Fetches the `contentDetails` (and thus the duration) of the given videos.
    ///
    /// Ids are sent in batches of [`MAX_RESULTS`]. Deleted or private videos are absent from the
    /// result.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, video_ids), fields(videos = video_ids.len()))]
    pub async fn list_videos(&self, video_ids: &[String]) -> eyre::Result<Vec<Video>> {
        let mut videos = Vec::with_capacity(video_ids.len());
        for batch in video_ids.chunks(MAX_RESULTS) {
            let ids = batch.join(",");
            let max_results = MAX_RESULTS.to_string();
            let response: ListResponse<Video> = self
                .get_required(
                    "videos",
                    &[
                        ("part", "contentDetails"),
                        ("id", &ids),
                        ("maxResults", &max_results),
                    ],
                )
                .await
                .context("fetch video durations")?;
            tracing::debug!(
                requested = batch.len(),
                returned_items = response.items.len(),
                "fetched videos"
            );
            videos.extend(response.items);
        }
        Ok(videos)
    }

    /// Internal method to call the `subscriptions.list` API for one page.
    ///
    /// Used by [`Self::list_my_subscriptions`] to handle pagination.
    async fn list_subscriptions_internal(
        &self,
        page_token: Option<String>,
    ) -> eyre::Result<ListResponse<Subscription>> {
        let max_results = MAX_RESULTS.to_string();
        let mut query_params = vec![
            ("part", "snippet"),
            ("mine", "true"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let subscriptions: ListResponse<Subscription> = self
            .get_required("subscriptions", &query_params)
            .await
            .context("list subscriptions")?;

        tracing::debug!(
            total_results = subscriptions.page_info.total_results,
            returned_items = subscriptions.items.len(),
            "fetched subscriptions"
        );

        Ok(subscriptions)
    }

    /// Internal method to call the `playlistItems.list` API for one page.
    ///
    /// Used by [`Self::list_playlist_items`] to handle pagination.
    async fn list_playlist_items_internal(
        &self,
        playlist_id: &str,
        page_token: Option<String>,
    ) -> eyre::Result<ListResponse<PlaylistItem>> {
        let max_results = MAX_RESULTS.to_string();
        let mut query_params = vec![
            ("part", "snippet,contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let items: Option<ListResponse<PlaylistItem>> = self
            .get_json("playlistItems", &query_params)
            .await
            .with_context(|| format!("list items of playlist {playlist_id}"))?;
        let Some(items) = items else {
            tracing::debug!(playlist_id, "playlist not found, treating as empty");
            return Ok(ListResponse::empty());
        };

        tracing::debug!(
            playlist_id,
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            "fetched playlist items"
        );

        Ok(items)
    }
}

/// The JSON error envelope used by Google APIs.
#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Debug, Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Turns a non-success response into the matching [`ApiError`].
fn classify_failure(endpoint: &str, status: StatusCode, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<GoogleErrorBody>(body).ok();
    let reason = parsed
        .as_ref()
        .and_then(|b| b.error.errors.first())
        .map(|d| d.reason.clone())
        .unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && RATE_LIMIT_REASONS.contains(&reason.as_str()))
    {
        return ApiError::RateLimited {
            endpoint: endpoint.to_string(),
            status,
            reason: if reason.is_empty() {
                "tooManyRequests".to_string()
            } else {
                reason
            },
        };
    }

    let message = match parsed {
        Some(b) if !b.error.message.is_empty() => b.error.message,
        _ => body.trim().to_string(),
    };
    ApiError::Status {
        endpoint: endpoint.to_string(),
        status,
        message,
    }
}
