//! The set of channels the user is subscribed to.

use crate::youtube_api::YouTubeClient;
use crate::youtube_api::subscriptions::Subscription;
use eyre::Context;
use std::collections::HashSet;
use tokio_stream::{Stream, StreamExt};

/// A subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Channel {
    pub id: String,
    pub title: String,
}

/// Fetches every subscription of the authenticated user, one entry per channel.
pub async fn list_subscribed_channels(client: &YouTubeClient) -> eyre::Result<Vec<Channel>> {
    let channels = unique_channels(client.list_my_subscriptions()).await?;
    tracing::info!(channels = channels.len(), "fetched subscriptions");
    Ok(channels)
}

/// Drains a subscription stream into channels, keeping the first entry for each channel id.
///
/// Any error ends the listing; a partial list would make every later number wrong.
pub async fn unique_channels(
    subscriptions: impl Stream<Item = eyre::Result<Subscription>>,
) -> eyre::Result<Vec<Channel>> {
    let mut subscriptions = std::pin::pin!(subscriptions);
    let mut seen = HashSet::new();
    let mut channels = Vec::new();
    while let Some(subscription) = subscriptions.next().await {
        let subscription = subscription.context("fetch subscription")?;
        let id = subscription.snippet.resource_id.channel_id;
        if seen.insert(id.clone()) {
            channels.push(Channel {
                id,
                title: subscription.snippet.title,
            });
        } else {
            tracing::debug!(channel_id = id, "skipping duplicate subscription");
        }
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subscription(id: &str, channel_id: &str, title: &str) -> eyre::Result<Subscription> {
        Ok(serde_json::from_value(serde_json::json!({
            "id": id,
            "snippet": {
                "title": title,
                "resourceId": { "kind": "youtube#channel", "channelId": channel_id }
            }
        }))?)
    }

    #[tokio::test]
    async fn duplicates_are_counted_once() {
        let raw = tokio_stream::iter(vec![
            subscription("s1", "UCa", "Alpha"),
            subscription("s2", "UCb", "Beta"),
            subscription("s3", "UCa", "Alpha (again)"),
        ]);
        let channels = unique_channels(raw).await.unwrap();
        assert_eq!(
            channels,
            vec![
                Channel {
                    id: "UCa".into(),
                    title: "Alpha".into()
                },
                Channel {
                    id: "UCb".into(),
                    title: "Beta".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn no_subscriptions() {
        let channels = unique_channels(tokio_stream::empty()).await.unwrap();
        assert!(channels.is_empty());
    }

    #[tokio::test]
    async fn error_aborts_listing() {
        let raw = tokio_stream::iter(vec![
            subscription("s1", "UCa", "Alpha"),
            Err(eyre::eyre!("quota exceeded")),
        ]);
        assert!(unique_channels(raw).await.is_err());
    }
}
