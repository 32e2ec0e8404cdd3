use super::{
    envelope::tag,
    paginator::Paginator,
    summary::{Outcome, RunState, RunStateCell, RunSummary},
};
use crate::{
    client::AzureClient,
    telemetry::{
        decrement_collections_inflight, increment_collection_failures,
        increment_collections_inflight, increment_items_emitted, record_collection_duration,
    },
};
use azhound_core::{Envelope, Error, Resource, TenantContext};
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Drives a paginator and publishes tagged items onto the output stream.
///
/// This is the producer half of a collection run. It owns the only sender of
/// the output channel, so the stream closes exactly once: when this function
/// returns and `envelope_tx` is dropped.
///
/// # Arguments
///
/// - `paginator`: The listing to drive, bound to the same `token`.
/// - `tenant`: Tenant context resolved before the run; copied into every
///   envelope.
/// - `envelope_tx`: Sender side of the output stream.
/// - `token`: Cancellation token shared with the paginator.
/// - `state`: Lifecycle cell observed by the [`Collection`](super::Collection).
///
/// # Behavior
///
/// - Publishes in server order, awaiting channel capacity (never drops).
/// - Stops at the first item or page error (fail-fast). Envelopes already
///   published stay in the channel.
/// - Cancellation, while waiting for a page or for capacity, ends the run
///   without an error.
/// - If the consumer drops the stream, the run fails with
///   [`Error::ChannelError`].
pub async fn feed_envelopes<C, R>(
    mut paginator: Paginator<C, R>,
    tenant: TenantContext,
    envelope_tx: mpsc::Sender<Envelope<R>>,
    token: CancellationToken,
    state: Arc<RunStateCell>,
) -> RunSummary
where
    C: AzureClient,
    R: Resource,
{
    let start = Instant::now();
    let mut count: u64 = 0;

    state.advance(RunState::Idle, RunState::Enumerating);
    increment_collections_inflight();

    let outcome = loop {
        if token.is_cancelled() {
            break Outcome::Cancelled;
        }

        let item = match paginator.next().await {
            Some(Ok(item)) => item,
            Some(Err(e)) => break Outcome::Failed(e),
            None if token.is_cancelled() => break Outcome::Cancelled,
            None => break Outcome::Completed,
        };

        tracing::trace!(id = item.id(), "found {}", R::LABEL);
        let envelope = tag(item, &tenant);

        let sent = tokio::select! {
            biased;
            () = token.cancelled() => break Outcome::Cancelled,
            sent = envelope_tx.send(envelope) => sent,
        };

        if sent.is_err() {
            break Outcome::Failed(Error::ChannelError {
                context: "output stream receiver dropped".to_string(),
            });
        }
        count += 1;
        increment_items_emitted(1);
    };

    state.advance(RunState::Enumerating, outcome.state());

    match &outcome {
        Outcome::Completed => {}
        Outcome::Cancelled => {
            tracing::info!(
                kind = %R::KIND,
                pages = paginator.pages(),
                "collection cancelled"
            );
        }
        Outcome::Failed(e) => {
            increment_collection_failures();
            tracing::error!(
                error = %e,
                kind = %R::KIND,
                tenant_id = %tenant.tenant_id,
                pages = paginator.pages(),
                "unable to continue processing {}s",
                R::LABEL
            );
        }
    }

    let closed = state.close();
    debug_assert!(closed, "output stream closed twice");
    drop(envelope_tx);

    let elapsed = start.elapsed();
    decrement_collections_inflight();
    record_collection_duration(elapsed.as_secs_f64() * 1000.0);
    tracing::info!(count, "finished listing all {}s", R::LABEL);

    RunSummary {
        kind: R::KIND,
        count,
        elapsed,
        outcome,
    }
}
