//! YouTube Videos API types.

use serde::Deserialize;

/// A `video` resource, requested with `part=contentDetails`.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    pub id: String,
    #[serde(rename = "contentDetails")]
    pub content_details: VideoContentDetails,
}

/// See: <https://developers.google.com/youtube/v3/docs/videos#contentDetails>
#[derive(Debug, Deserialize)]
pub struct VideoContentDetails {
    /// The length of the video as an ISO 8601 duration, e.g. `PT15M33S`.
    ///
    /// Upcoming premieres and live streams report `P0D`.
    pub duration: String,
}
