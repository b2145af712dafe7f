//! Shared list-response types and the pagination stream.

use serde::Deserialize;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

/// One page of a `*.list` call: the items plus where to continue.
#[derive(Debug)]
pub struct Page<T> {
    pub items: VecDeque<T>,
    pub next_page_token: Option<String>,
}

impl<T> From<ListResponse<T>> for Page<T> {
    fn from(response: ListResponse<T>) -> Self {
        Self {
            items: response.items,
            next_page_token: response.next_page_token,
        }
    }
}

type PendingPage<'a, F, T> = Pin<Box<dyn Future<Output = eyre::Result<(F, Page<T>)>> + Send + 'a>>;

/// A lazy stream over every item of a paginated list endpoint.
///
/// The fetcher is called with `None` for the first page and with the previous page's
/// `nextPageToken` afterwards. Pages are only requested once the consumer has drained the
/// previous one, so dropping the stream early (e.g. once uploads fall out of the time window)
/// avoids fetching the remaining pages at all. The stream cannot be restarted, and it ends
/// after the first error.
pub struct PagedStream<'a, T, F> {
    buffered: VecDeque<T>,
    pending: Option<PendingPage<'a, F, T>>,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut + Send + 'a,
        Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
    {
        Self {
            buffered: VecDeque::new(),
            pending: Some(Box::pin(async move {
                let page = fetcher(None).await?;
                Ok((fetcher, page))
            })),
        }
    }
}

impl<T: Unpin, F> Unpin for PagedStream<'_, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut + Send + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + Send + 'a,
{
    type Item = eyre::Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            let Some(pending) = self.pending.as_mut() else {
                return Poll::Ready(None);
            };

            match pending.as_mut().poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    self.pending = None;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok((fetcher, page))) => {
                    self.buffered.extend(page.items);
                    // queue the next page, but don't poll it until the buffer runs dry
                    self.pending = page.next_page_token.map(|token| {
                        Box::pin(async move {
                            let page = fetcher(Some(token)).await?;
                            Ok((fetcher, page))
                        }) as PendingPage<'a, F, T>
                    });
                }
            }
        }
    }
}

/// The envelope shared by every `*.list` response of the Data API.
///
/// See: <https://developers.google.com/youtube/v3/docs/subscriptions/list#response>
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "VecDeque::new")]
    pub items: VecDeque<T>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

impl<T> ListResponse<T> {
    pub fn empty() -> Self {
        Self {
            items: VecDeque::new(),
            page_info: PageInfo::default(),
            next_page_token: None,
        }
    }
}

/// Paging details for lists of resources.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Deserialize)]
pub struct PageInfo {
    /// The total number of results in the result set.
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    /// The number of results included in the API response.
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}
