//! Collects the uploads of every subscribed channel within the window and sums their length.

use crate::average::DailyAverage;
use crate::duration::parse_duration;
use crate::error::ApiError;
use crate::subscriptions::Channel;
use crate::window::{UploadWindow, parse_timestamp};
use crate::youtube_api::YouTubeClient;
use crate::youtube_api::playlist_items::PlaylistItem;
use eyre::Context;
use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};
use jiff::Timestamp;
use std::collections::{HashMap, HashSet};
use tracing::instrument;

/// What we may assume about the order of a channel's uploads playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadOrdering {
    /// Newest first, so paging can stop at the first upload older than the window.
    ///
    /// This is how YouTube orders uploads playlists in practice, but it is not documented.
    #[default]
    NewestFirst,
    /// No ordering guarantee: fetch every page and filter.
    Unordered,
}

/// An upload that falls inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub video_id: String,
    pub published_at: Timestamp,
}

/// Everything one channel published within the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUploads {
    pub channel: Channel,
    pub video_count: usize,
    pub total_seconds: u64,
    pub first_published: Option<Timestamp>,
    pub last_published: Option<Timestamp>,
}

impl ChannelUploads {
    /// Sums the durations of `uploads`.
    ///
    /// Uploads without an entry in `durations` (the video was deleted or made private between
    /// listing and lookup) are left out.
    pub fn from_uploads(
        channel: Channel,
        uploads: &[Upload],
        durations: &HashMap<String, u64>,
    ) -> Self {
        let mut summary = Self {
            channel,
            video_count: 0,
            total_seconds: 0,
            first_published: None,
            last_published: None,
        };
        for upload in uploads {
            let Some(&seconds) = durations.get(&upload.video_id) else {
                tracing::debug!(video_id = upload.video_id, "video vanished, not counted");
                continue;
            };
            summary.video_count += 1;
            summary.total_seconds += seconds;
            summary.first_published = Some(match summary.first_published {
                Some(first) => first.min(upload.published_at),
                None => upload.published_at,
            });
            summary.last_published = Some(match summary.last_published {
                Some(last) => last.max(upload.published_at),
                None => upload.published_at,
            });
        }
        summary
    }
}

/// The complete result of a run.
#[derive(Debug, Clone)]
pub struct UploadSummary {
    pub window: UploadWindow,
    /// One entry per subscribed channel, in subscription order.
    pub channels: Vec<ChannelUploads>,
}

impl UploadSummary {
    pub fn total_seconds(&self) -> u64 {
        self.channels.iter().map(|c| c.total_seconds).sum()
    }

    pub fn video_count(&self) -> usize {
        self.channels.iter().map(|c| c.video_count).sum()
    }

    pub fn daily_average(&self) -> DailyAverage {
        DailyAverage::from_total_seconds(self.total_seconds())
    }
}

/// Reads playlist items until the window is exhausted and returns the ones inside it.
///
/// With [`UploadOrdering::NewestFirst`] the stream is dropped at the first item older than the
/// window, so later pages are never requested. Video ids are de-duplicated.
pub async fn uploads_in_window(
    items: impl Stream<Item = eyre::Result<PlaylistItem>>,
    window: &UploadWindow,
    ordering: UploadOrdering,
) -> eyre::Result<Vec<Upload>> {
    let mut items = std::pin::pin!(items);
    let mut seen = HashSet::new();
    let mut uploads = Vec::new();
    while let Some(item) = items.next().await {
        let item = item?;
        let published_at = parse_timestamp(item.published_at())?;
        if window.contains(published_at) {
            if seen.insert(item.content_details.video_id.clone()) {
                uploads.push(Upload {
                    video_id: item.content_details.video_id,
                    published_at,
                });
            }
        } else if window.is_before(published_at) && ordering == UploadOrdering::NewestFirst {
            tracing::trace!(%published_at, "reached uploads older than the window");
            break;
        }
    }
    Ok(uploads)
}

/// Drives the per-channel work of a run.
#[derive(Debug, Clone)]
pub struct Aggregator<'a> {
    client: &'a YouTubeClient,
    window: UploadWindow,
    ordering: UploadOrdering,
    concurrency: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(client: &'a YouTubeClient, window: UploadWindow) -> Self {
        Self {
            client,
            window,
            ordering: UploadOrdering::default(),
            concurrency: 1,
        }
    }

    pub fn ordering(mut self, ordering: UploadOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// How many channels may be fetched at the same time (at least one).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Computes the uploads of every channel.
    ///
    /// The first failure for any channel aborts the run and drops the remaining in-flight work:
    /// leaving a channel out would silently undercount.
    #[instrument(skip_all, fields(channels = channels.len(), window = %self.window))]
    pub async fn run(&self, channels: &[Channel]) -> eyre::Result<UploadSummary> {
        let playlists = self.resolve_upload_playlists(channels).await?;

        let total = playlists.len();
        let mut results: Vec<(usize, ChannelUploads)> = stream::iter(playlists.into_iter().enumerate())
            .map(|(index, (channel, playlist_id))| async move {
                let uploads = self.channel_uploads(channel, &playlist_id).await?;
                tracing::info!(
                    channel = uploads.channel.title,
                    videos = uploads.video_count,
                    seconds = uploads.total_seconds,
                    "{}/{} channels",
                    index + 1,
                    total
                );
                Ok::<_, eyre::Report>((index, uploads))
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        results.sort_by_key(|(index, _)| *index);
        Ok(UploadSummary {
            window: self.window,
            channels: results.into_iter().map(|(_, uploads)| uploads).collect(),
        })
    }

    /// Pairs every channel with its uploads playlist.
    async fn resolve_upload_playlists(
        &self,
        channels: &[Channel],
    ) -> eyre::Result<Vec<(Channel, String)>> {
        let ids: Vec<String> = channels.iter().map(|c| c.id.clone()).collect();
        let mut uploads_by_id: HashMap<String, String> = self
            .client
            .list_channels(&ids)
            .await?
            .into_iter()
            .filter_map(|c| {
                let uploads = c.uploads_playlist()?.to_string();
                Some((c.id, uploads))
            })
            .collect();

        channels
            .iter()
            .map(|channel| match uploads_by_id.remove(&channel.id) {
                Some(playlist_id) => Ok((channel.clone(), playlist_id)),
                None => Err(eyre::Report::new(ApiError::MissingUploads(
                    channel.id.clone(),
                ))),
            })
            .collect()
    }

    #[instrument(skip(self, channel), fields(channel = channel.title))]
    async fn channel_uploads(
        &self,
        channel: Channel,
        playlist_id: &str,
    ) -> eyre::Result<ChannelUploads> {
        let uploads = uploads_in_window(
            self.client.list_playlist_items(playlist_id),
            &self.window,
            self.ordering,
        )
        .await
        .with_context(|| format!("list uploads of {} ({})", channel.title, channel.id))?;

        let ids: Vec<String> = uploads.iter().map(|u| u.video_id.clone()).collect();
        let mut durations = HashMap::with_capacity(ids.len());
        for video in self
            .client
            .list_videos(&ids)
            .await
            .with_context(|| format!("fetch durations for {} ({})", channel.title, channel.id))?
        {
            let seconds = parse_duration(&video.content_details.duration)?;
            durations.insert(video.id, seconds);
        }

        Ok(ChannelUploads::from_uploads(channel, &uploads, &durations))
    }
}
