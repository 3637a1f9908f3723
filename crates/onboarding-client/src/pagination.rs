//! Paginated listing.
//!
//! A background task fetches pages one after another and hands them to the
//! consumer through a single-slot channel, so at most one page is buffered
//! ahead of the reader. A terminal fetch error goes into a single-slot error
//! cell. The cell is only meaningful once the page channel has closed:
//! drain pages with [`PageStream::next_page`] until it returns `None`, then
//! call [`PageStream::finish`] exactly once.

use crate::error::{ApiError, ApiResult};
use serde::Deserialize;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One page of a list response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    /// Token for the next page; absent on the last page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Consumer side of a paginated listing.
pub struct PageStream<T> {
    pages: mpsc::Receiver<Vec<T>>,
    error: oneshot::Receiver<ApiError>,
}

impl<T> PageStream<T> {
    /// Next page, or `None` once the producer is done.
    pub async fn next_page(&mut self) -> Option<Vec<T>> {
        self.pages.recv().await
    }

    /// Report how the listing ended.
    ///
    /// Call after [`next_page`](Self::next_page) has returned `None`. Calling
    /// it earlier abandons the pages not yet read.
    pub async fn finish(self) -> ApiResult<()> {
        let PageStream { pages, error } = self;
        drop(pages);

        match error.await {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }

    /// Drain every page into one list.
    pub async fn collect_all(mut self) -> ApiResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page().await {
            items.extend(page);
        }
        self.finish().await?;
        Ok(items)
    }
}

/// Start a paginated listing.
///
/// `fetch` is called with `None` for the first page and with the previous
/// page's `next_page_token` afterwards. The producer stops on the last page,
/// on the first error, or when the consumer drops the stream.
pub fn paginate<T, F, Fut>(mut fetch: F) -> PageStream<T>
where
    T: Send + 'static,
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = ApiResult<Page<T>>> + Send,
{
    let (page_tx, page_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut token: Option<String> = None;
        let mut fetched = 0u32;

        loop {
            let page = match fetch(token.clone()).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(pages = fetched, error = %err, "Page fetch failed, stopping listing");
                    let _ = error_tx.send(err);
                    return;
                }
            };
            fetched += 1;

            let next = page.next_page_token.filter(|t| !t.is_empty());
            if next.is_some() && next == token {
                let _ = error_tx.send(ApiError::InvalidResponse(
                    "pagination token did not advance".to_string(),
                ));
                return;
            }

            if page_tx.send(page.items).await.is_err() {
                debug!(pages = fetched, "Page consumer dropped, stopping listing");
                return;
            }

            match next {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(pages = fetched, "Listing complete");
    });

    PageStream {
        pages: page_rx,
        error: error_rx,
    }
}
