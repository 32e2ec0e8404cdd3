//! Lazy, cancellable enumeration of a paged collection.
//!
//! A [`Paginator`] turns repeated page requests into one logical sequence of
//! items. Nothing is requested until the first [`Paginator::next`] call, and a
//! new page is only requested once every item of the previous one has been
//! handed out.
//!
//! ## Sequence semantics
//!
//! - `Some(Ok(item))` - a decoded item, in server order.
//! - `Some(Err(Error::Item(..)))` - an entry of the current page failed to
//!   decode. The sequence continues; the caller decides whether to stop.
//! - `Some(Err(Error::PageRequest { .. }))` - a page request failed. This is
//!   the last value of the sequence.
//! - `None` - the listing is exhausted, or the token was cancelled. Cancelling
//!   is not a failure and yields no error.

use crate::client::{AzureClient, Cursor};
use azhound_core::{Error, ItemError, ListQuery, Resource, Result};
use futures::Stream;
use std::{mem, sync::Arc, vec};
use tokio_util::sync::CancellationToken;

enum State<R> {
    /// A page must be requested; `None` means the first page.
    Fetch(Option<Cursor>),
    /// Handing out the items of a fetched page.
    Page {
        items: vec::IntoIter<core::result::Result<R, ItemError>>,
        next: Option<Cursor>,
    },
    Done,
}

pub struct Paginator<C, R> {
    client: Arc<C>,
    query: ListQuery,
    token: CancellationToken,
    state: State<R>,
    pages: usize,
}

impl<C, R> Paginator<C, R>
where
    C: AzureClient,
    R: Resource,
{
    pub fn new(client: Arc<C>, query: ListQuery, token: CancellationToken) -> Self {
        Self {
            client,
            query,
            token,
            state: State::Fetch(None),
            pages: 0,
        }
    }

    /// Number of pages successfully retrieved so far.
    pub const fn pages(&self) -> usize {
        self.pages
    }

    /// Returns the next item of the listing.
    pub async fn next(&mut self) -> Option<Result<R>> {
        loop {
            match mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::Page { mut items, next } => {
                    if let Some(item) = items.next() {
                        self.state = State::Page { items, next };
                        return Some(item.map_err(Error::from));
                    }
                    match next {
                        Some(cursor) => self.state = State::Fetch(Some(cursor)),
                        None => {
                            tracing::debug!(pages = self.pages, "listing exhausted");
                            return None;
                        }
                    }
                }
                State::Fetch(cursor) => {
                    if self.token.is_cancelled() {
                        tracing::debug!(pages = self.pages, "cancelled before next page request");
                        return None;
                    }

                    let request =
                        self.client
                            .list_page::<R>(&self.query, cursor.as_ref(), self.pages);

                    let result = tokio::select! {
                        biased;
                        () = self.token.cancelled() => {
                            tracing::debug!(page = self.pages, "cancelled during page request");
                            return None;
                        }
                        result = request => result,
                    };

                    match result {
                        Ok(page) => {
                            tracing::trace!(
                                page = self.pages,
                                items = page.items.len(),
                                more = page.next.is_some(),
                                "fetched page"
                            );
                            self.pages += 1;
                            self.state = State::Page {
                                items: page.items.into_iter(),
                                next: page.next,
                            };
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
            }
        }
    }

    /// Adapts the paginator into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<R>> + Send {
        futures::stream::unfold(self, |mut paginator| async move {
            let item = paginator.next().await?;
            Some((item, paginator))
        })
    }
}
