//! YouTube Channels API types.

use serde::Deserialize;

/// A `channel` resource, requested with `part=contentDetails` only.
///
/// See: <https://developers.google.com/youtube/v3/docs/channels#resource>
#[derive(Debug, Deserialize)]
pub struct Channel {
    /// The ID that YouTube uses to uniquely identify the channel.
    pub id: String,
    #[serde(rename = "contentDetails")]
    pub content_details: Option<ChannelContentDetails>,
}

impl Channel {
    /// The playlist that holds every video the channel uploaded.
    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .as_ref()?
            .related_playlists
            .uploads
            .as_deref()
    }
}

/// See: <https://developers.google.com/youtube/v3/docs/channels#contentDetails>
#[derive(Debug, Deserialize)]
pub struct ChannelContentDetails {
    #[serde(rename = "relatedPlaylists", default)]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelatedPlaylists {
    /// The ID of the playlist that contains the channel's uploaded videos.
    pub uploads: Option<String>,
}
