//! YouTube PlaylistItems API types.

use serde::Deserialize;

/// A `playlistItem` resource, i.e. one video in a playlist.
///
/// Timestamps are kept as the raw strings the API sent; the aggregator parses them so that an
/// unexpected encoding is reported as a parse failure rather than a decoding failure of the
/// whole page.
///
/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#resource>
#[derive(Debug, Deserialize)]
pub struct PlaylistItem {
    pub snippet: PlaylistItemSnippet,
    #[serde(rename = "contentDetails")]
    pub content_details: PlaylistItemContentDetails,
}

impl PlaylistItem {
    /// When the video itself was published.
    ///
    /// Falls back to the time it was added to the playlist, which for an uploads playlist is the
    /// upload time. `videoPublishedAt` is missing for private videos.
    pub fn published_at(&self) -> &str {
        self.content_details
            .video_published_at
            .as_deref()
            .unwrap_or(&self.snippet.published_at)
    }
}

/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#snippet>
#[derive(Debug, Deserialize)]
pub struct PlaylistItemSnippet {
    /// The date and time that the item was added to the playlist (ISO 8601).
    #[serde(rename = "publishedAt")]
    pub published_at: String,
    #[serde(default)]
    pub title: String,
}

/// See: <https://developers.google.com/youtube/v3/docs/playlistItems#contentDetails>
#[derive(Debug, Deserialize)]
pub struct PlaylistItemContentDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// The date and time that the video was published to YouTube (ISO 8601).
    #[serde(rename = "videoPublishedAt")]
    pub video_published_at: Option<String>,
}
