//! Graceful shutdown coordination.
//!
//! A [`ShutdownSignal`] is cloned into every task that must stop on
//! SIGTERM/SIGINT; a [`ConnectionTracker`] hands out one token per
//! connection so the server can wait for in-flight requests before
//! exiting.
//!
//! # Example
//!
//! ```rust,ignore
//! use abacus_server::ShutdownSignal;
//!
//! let shutdown = ShutdownSignal::with_os_signals();
//! shutdown.recv().await;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast;

/// Cloneable shutdown trigger and waiter.
///
/// All clones observe the same state: triggering any clone wakes every
/// task waiting on any other clone.
///
/// # Example
///
/// ```rust
/// use abacus_server::ShutdownSignal;
///
/// let shutdown = ShutdownSignal::new();
/// let observer = shutdown.clone();
///
/// shutdown.trigger();
/// assert!(observer.is_shutdown());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    /// Whether shutdown has been triggered.
    triggered: Arc<AtomicBool>,

    /// Wakes tasks blocked in [`ShutdownSignal::recv`].
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers shutdown. Idempotent; only the first call notifies.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // Send fails when nobody is waiting, which is fine.
            let _ = self.sender.send(());
        }
    }

    /// Whether shutdown has been triggered.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// A future resolving when shutdown triggers. Resolves immediately
    /// if it already has.
    pub fn recv(&self) -> ShutdownReceiver {
        let mut receiver = self.sender.subscribe();
        ShutdownReceiver {
            triggered: Arc::clone(&self.triggered),
            receiver: Box::pin(async move {
                let _ = receiver.recv().await;
            }),
        }
    }

    /// A signal wired to SIGTERM and SIGINT.
    ///
    /// Spawns a listener task onto the current runtime; the task
    /// panics if the process cannot register signal handlers.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let listener = signal.clone();

        tokio::spawn(async move {
            wait_for_os_signal().await;
            listener.trigger();
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`ShutdownSignal::recv`].
pub struct ShutdownReceiver {
    triggered: Arc<AtomicBool>,
    receiver: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.triggered.load(Ordering::SeqCst) {
            return Poll::Ready(());
        }

        match self.receiver.as_mut().poll(cx) {
            Poll::Ready(_) => Poll::Ready(()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Blocks until the OS asks the process to stop.
///
/// Unix waits for SIGTERM or SIGINT; elsewhere only Ctrl+C.
async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, shutting down");
            }
            _ = sigint.recv() => {
                tracing::info!("SIGINT received, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to wait for Ctrl+C");
        tracing::info!("Ctrl+C received, shutting down");
    }
}

/// Counts live connections for the shutdown drain.
///
/// # Example
///
/// ```rust
/// use abacus_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.acquire();
/// assert_eq!(tracker.active_connections(), 1);
///
/// drop(token);
/// assert_eq!(tracker.active_connections(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<std::sync::atomic::AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Takes a token for one connection. Hold it for the connection's
    /// lifetime; dropping it releases the count.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Resolves once every token has been dropped. Resolves
    /// immediately when none are held.
    pub async fn wait_for_shutdown(&self) {
        while self.active.load(Ordering::SeqCst) > 0 {
            self.notify.notified().await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// One live connection. Dropping it releases the tracker count.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<std::sync::atomic::AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        let prev = self.active.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.notify.notify_waiters();
        }
    }
}
