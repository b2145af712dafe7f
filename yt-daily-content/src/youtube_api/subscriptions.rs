//! YouTube Subscriptions API types.

use serde::Deserialize;

/// A `subscription` resource links the authenticated user to a channel they follow.
///
/// See: <https://developers.google.com/youtube/v3/docs/subscriptions#resource>
#[derive(Debug, Deserialize)]
pub struct Subscription {
    /// The ID of the subscription itself, not of the channel.
    pub id: String,
    pub snippet: SubscriptionSnippet,
}

/// See: <https://developers.google.com/youtube/v3/docs/subscriptions#snippet>
#[derive(Debug, Deserialize)]
pub struct SubscriptionSnippet {
    /// The title of the subscribed channel.
    pub title: String,
    #[serde(rename = "resourceId")]
    pub resource_id: ResourceId,
}

/// Identifies the resource a subscription points at.
#[derive(Debug, Deserialize)]
pub struct ResourceId {
    /// Always `youtube#channel` for subscriptions.
    pub kind: Option<String>,
    #[serde(rename = "channelId")]
    pub channel_id: String,
}
