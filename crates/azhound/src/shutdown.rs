//! Signal-driven cancellation.
//!
//! [`SignalContext`] owns the [`CancellationToken`] a run is executed under.
//! A listener task cancels the token when the process receives an interrupt
//! or termination signal; every suspension point of the pipeline (page
//! requests, channel publishes) races that token.
//!
//! Cancellation is idempotent: a second signal, or a `cancel()` after the
//! fact, changes nothing.

use core::{fmt, future::Future};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The signal that ended a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => f.write_str("Ctrl+C"),
            Self::Terminate => f.write_str("SIGTERM"),
        }
    }
}

pub struct SignalContext {
    token: CancellationToken,
    listener: JoinHandle<Option<Signal>>,
}

impl SignalContext {
    /// Listens for Ctrl+C and, on Unix, SIGTERM.
    pub fn install() -> Self {
        Self::from_signal(wait_for_signal())
    }

    /// Cancels the context's token when `signal` resolves.
    pub fn from_signal<F>(signal: F) -> Self
    where
        F: Future<Output = Signal> + Send + 'static,
    {
        let token = CancellationToken::new();
        let watched = token.clone();

        let listener = tokio::spawn(async move {
            tokio::select! {
                () = watched.cancelled() => None,
                signal = signal => {
                    tracing::info!("Received {signal} signal, cancelling collection");
                    watched.cancel();
                    Some(signal)
                }
            }
        });

        Self { token, listener }
    }

    /// The token to run under. Clones share cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the token and waits for the listener to exit.
    ///
    /// Returns the signal that cancelled the run, if any. Anything still tied
    /// to the token (in-flight requests, blocked publishes) is released.
    pub async fn shutdown(self) -> Option<Signal> {
        self.token.cancel();
        match self.listener.await {
            Ok(signal) => signal,
            Err(_e) => {
                tracing::warn!("Signal listener did not exit cleanly: {_e}");
                None
            }
        }
    }
}

async fn wait_for_signal() -> Signal {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_e) => {
                tracing::error!("Failed to install SIGTERM handler: {_e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(_e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {_e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => Signal::Interrupt,
        () = terminate => Signal::Terminate,
    }
}
