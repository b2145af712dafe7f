//! Measures how much new video a YouTube user's subscriptions publish per day.
//!
//! A run is a straight line: authenticate, list the subscribed channels, collect each channel's
//! uploads of the trailing 365 days with their durations, and divide the total by 365. Any
//! failure along the way aborts the run; there is no partial result.

use crate::aggregate::{Aggregator, UploadSummary};
use crate::auth::{Authenticator, CredentialStore};
use crate::config::Config;
use crate::subscriptions::list_subscribed_channels;
use crate::window::UploadWindow;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use jiff::Timestamp;

pub mod aggregate;
pub mod auth;
pub mod average;
pub mod config;
pub mod duration;
pub mod error;
pub mod oauth;
pub mod subscriptions;
pub mod window;
pub mod youtube_api;

/// Runs the whole pipeline with the window ending at `now`.
///
/// Credentials are checked before the first API call, so a missing or revoked credential fails
/// without touching the Data API.
pub async fn compute_upload_summary(
    config: &Config,
    store: impl CredentialStore + 'static,
    now: Timestamp,
) -> eyre::Result<UploadSummary> {
    let auth = Authenticator::new(store)
        .interactive(config.interactive_login)
        .timeout(config.request_timeout);
    let client = YouTubeClient::new(auth, &config.api_base, config.request_timeout)?;
    client
        .fresh_access_token()
        .await
        .context("authorize to YouTube")?;

    let channels = list_subscribed_channels(&client).await?;
    let window = UploadWindow::ending_at(now);
    Aggregator::new(&client, window)
        .ordering(config.ordering)
        .concurrency(config.concurrency)
        .run(&channels)
        .await
}
