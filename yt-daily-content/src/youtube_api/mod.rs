//! YouTube Data API v3 client library.
//!
//! Only the read-only list endpoints needed to measure subscription uploads are covered:
//!
//! * `subscriptions.list`: the channels the user follows
//! * `channels.list`: each channel's uploads playlist
//! * `playlistItems.list`: the uploads, newest first
//! * `videos.list`: each upload's duration
//!
//! List endpoints that page are exposed as lazy [`Stream`](tokio_stream::Stream)s built on
//! [`PagedStream`]; endpoints that take a set of ids batch them internally.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tokio_stream::StreamExt;
//! use yt_daily_content::auth::{Authenticator, FileCredentialStore};
//! use yt_daily_content::config::YOUTUBE_API_BASE;
//! use yt_daily_content::youtube_api::YouTubeClient;
//!
//! # async fn example() -> eyre::Result<()> {
//! let auth = Authenticator::new(FileCredentialStore::new("auth"));
//! let client = YouTubeClient::new(auth, YOUTUBE_API_BASE, std::time::Duration::from_secs(30))?;
//!
//! let mut subscriptions = std::pin::pin!(client.list_my_subscriptions());
//! while let Some(subscription) = subscriptions.next().await {
//!     println!("{}", subscription?.snippet.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod channels;
pub mod client;
pub mod playlist_items;
pub mod subscriptions;
pub mod types;
pub mod videos;

pub use client::YouTubeClient;
pub use types::{ListResponse, Page, PageInfo, PagedStream};
