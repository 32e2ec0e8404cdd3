//! Streaming collection of directory objects.
//!
//! A [`Collector`] turns a paged, fallible listing into an ordered stream of
//! tenant-annotated [`Envelope`]s. Each [`Collector::collect`] call starts one
//! run: a producer task drives a [`Paginator`] and publishes into a bounded
//! channel; the caller consumes the [`Collection`].
//!
//! ## Structure
//!
//! - [`paginator`] - lazy, cancellable page enumeration.
//! - [`envelope`] - tags items with kind and tenant.
//! - [`coordinator`] - the producer loop and its fail-fast policy.
//! - [`summary`] - run lifecycle and the end-of-run report.
//!
//! ## Guarantees
//!
//! - Envelopes arrive in server order, without drops or duplicates.
//! - The stream closes exactly once, after the last publish.
//! - Errors never travel on the stream; they end it and surface in the
//!   [`RunSummary`].

pub mod coordinator;
pub mod envelope;
pub mod paginator;
pub mod summary;

use crate::{
    client::AzureClient,
    sink::{Sink, drain},
    telemetry::increment_collections,
};
use azhound_core::{Envelope, Error, ListQuery, Resource, Result};
use coordinator::feed_envelopes;
use paginator::Paginator;
use std::sync::Arc;
use summary::{RunState, RunStateCell, RunSummary};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The consumer side of a run.
pub type EnvelopeStream<R> = ReceiverStream<Envelope<R>>;

/// Starts collection runs against a shared client.
pub struct Collector<C> {
    client: Arc<C>,
    stream_buffer_size: usize,
}

impl<C> Clone for Collector<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            stream_buffer_size: self.stream_buffer_size,
        }
    }
}

impl<C: AzureClient> Collector<C> {
    /// Creates a collector publishing through a channel of
    /// `stream_buffer_size` envelopes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `stream_buffer_size` is zero.
    pub fn new(client: Arc<C>, stream_buffer_size: usize) -> Result<Self> {
        if stream_buffer_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "stream buffer size must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            client,
            stream_buffer_size,
        })
    }

    /// Starts collecting `R` under `token`.
    ///
    /// The tenant context is read from the client once, here, and used for
    /// every envelope of the run. Must be called within a Tokio runtime.
    pub fn collect<R: Resource>(&self, query: ListQuery, token: CancellationToken) -> Collection<R> {
        let tenant = self.client.tenant_info();
        let (envelope_tx, envelope_rx) = mpsc::channel(self.stream_buffer_size);
        let state = Arc::new(RunStateCell::new());

        increment_collections();
        tracing::info!(
            kind = %R::KIND,
            tenant_id = %tenant.tenant_id,
            filter = query.filter.as_deref().unwrap_or_default(),
            "collecting {}s",
            R::LABEL
        );

        let span = tracing::info_span!("collect", kind = %R::KIND);
        let paginator = Paginator::new(Arc::clone(&self.client), query, token.clone());
        let task = tokio::spawn(
            feed_envelopes(paginator, tenant, envelope_tx, token, Arc::clone(&state))
                .instrument(span),
        );

        Collection {
            envelopes: ReceiverStream::new(envelope_rx),
            handle: CollectionHandle { task, state },
        }
    }
}

/// An in-progress run: its output stream plus the producer handle.
pub struct Collection<R> {
    envelopes: EnvelopeStream<R>,
    handle: CollectionHandle,
}

impl<R: Resource> Collection<R> {
    pub fn state(&self) -> RunState {
        self.handle.state()
    }

    /// Splits the run into its stream and producer handle.
    pub fn into_parts(self) -> (EnvelopeStream<R>, CollectionHandle) {
        (self.envelopes, self.handle)
    }

    /// Drains every envelope into `sink`, then waits for the producer.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if writing fails (the producer then observes a
    /// dropped stream and stops), or [`Error::Task`] if the producer panicked.
    /// A failed run is not an error here: inspect [`RunSummary::outcome`].
    pub async fn drain_into<S>(self, sink: &mut S) -> Result<RunSummary>
    where
        S: Sink<Envelope<R>>,
    {
        let (envelopes, handle) = self.into_parts();
        let drained = drain(envelopes, sink).await;
        let summary = handle.finish().await?;
        drained?;
        Ok(summary)
    }
}

/// Handle on a run's producer task.
pub struct CollectionHandle {
    task: JoinHandle<RunSummary>,
    state: Arc<RunStateCell>,
}

impl CollectionHandle {
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Waits for the producer task to terminate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Task`] if the producer panicked or was aborted.
    pub async fn finish(self) -> Result<RunSummary> {
        self.task.await.map_err(|e| Error::Task {
            context: e.to_string(),
        })
    }
}
