//! Lazy streaming over cursor-paginated listings.
//!
//! A [`PageStream`] holds one page at a time and only asks its [`PageSource`] for the
//! next page once every item of the current one has been handed out. The stream ends
//! when the last page carried no cursor, or when a fetched page comes back empty even
//! if it still carries a cursor.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Deserializer};

use crate::error::{PrivyError, Result};

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Page<T> {
    /// Items of this page, in server order. `null` on the wire decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
    /// Cursor of the following page, if the server reported one.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Create a page.
    #[must_use]
    pub fn new(data: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { data, next_cursor }
    }

    /// Returns `true` if the page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Fetches pages of a listing by cursor.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetch the page at `cursor`, or the first page when `cursor` is `None`.
    ///
    /// # Errors
    ///
    /// Returns the classified error of the failed request.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page<T>>;
}

/// Forward-only, single-pass sequence over every item of a paginated listing.
///
/// Not meant for concurrent pulls: `next` takes `&mut self`. After `next` returns an
/// error the stream must be dropped.
pub struct PageStream<T> {
    items: std::vec::IntoIter<T>,
    next_cursor: Option<String>,
    source: Box<dyn PageSource<T>>,
}

impl<T: Send + 'static> PageStream<T> {
    /// Create a stream from an already fetched first page.
    pub fn new(first_page: Page<T>, source: impl PageSource<T> + 'static) -> Self {
        let mut stream = Self {
            items: Vec::new().into_iter(),
            next_cursor: None,
            source: Box::new(source),
        };
        stream.adopt(first_page);
        stream
    }

    /// Fetch the first page from `source` and create a stream from it.
    ///
    /// # Errors
    ///
    /// Returns the error of the first page fetch.
    pub async fn start(source: impl PageSource<T> + 'static) -> Result<Self> {
        let first_page = source.fetch_page(None).await?;
        Ok(Self::new(first_page, source))
    }

    /// Pull the next item, fetching the following page if the current one is used up.
    ///
    /// Returns `Ok(None)` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Returns the error of a failed page fetch.
    pub async fn next(&mut self) -> Result<Option<T>> {
        if let Some(item) = self.items.next() {
            return Ok(Some(item));
        }

        let Some(cursor) = self.next_cursor.take() else {
            return Ok(None);
        };

        tracing::debug!(cursor = %cursor, "Fetching next page");
        let page = self.source.fetch_page(Some(&cursor)).await?;

        if page.is_empty() {
            tracing::debug!(cursor = %cursor, "Empty page, listing exhausted");
            return Ok(None);
        }

        self.adopt(page);
        Ok(self.items.next())
    }

    /// Drain every remaining item into a vector.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failed page fetch.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(item) = self.next().await? {
            all.push(item);
        }
        Ok(all)
    }

    /// Adapt into a [`Stream`]. The stream ends after yielding the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        futures::stream::try_unfold(self, |mut pages| async move {
            let item = pages.next().await?;
            Ok::<_, PrivyError>(item.map(|item| (item, pages)))
        })
    }

    fn adopt(&mut self, page: Page<T>) {
        self.items = page.data.into_iter();
        self.next_cursor = page.next_cursor.filter(|cursor| !cursor.is_empty());
    }
}

impl<T> std::fmt::Debug for PageStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageStream")
            .field("remaining_in_page", &self.items.len())
            .field("next_cursor", &self.next_cursor)
            .finish_non_exhaustive()
    }
}
