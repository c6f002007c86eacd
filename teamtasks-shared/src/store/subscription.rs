/// Live subscription handles
///
/// A [`Subscription`] owns the receiving end of a `watch` channel fed by a
/// background task, plus a cancellation guard for that task. It always holds
/// the latest snapshot; intermediate snapshots may be skipped by slow readers.
///
/// Dropping the handle cancels the background task. Each subscription is
/// singly owned, so it is released exactly once.

use futures::stream::{self, Stream};
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Handle to a live query result
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
    _guard: DropGuard,
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wraps a receiver whose producer stops when `token` is cancelled
    pub fn new(rx: watch::Receiver<T>, token: CancellationToken) -> Self {
        Self {
            rx,
            _guard: token.drop_guard(),
        }
    }

    /// Returns the latest snapshot
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Waits for the next snapshot
    ///
    /// Returns `None` once the producer has stopped.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        let snapshot = self.rx.borrow_and_update().clone();
        Some(snapshot)
    }

    /// Derives a subscription by applying `f` to every snapshot
    pub fn map<U, F>(self, f: F) -> Subscription<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + 'static,
    {
        let initial = f(&self.rx.borrow());
        let (tx, rx) = watch::channel(initial);
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let mut inner = self;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    changed = inner.rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let mapped = {
                            let snapshot = inner.rx.borrow_and_update();
                            f(&snapshot)
                        };
                        if tx.send(mapped).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Subscription::new(rx, token)
    }

    /// Converts the subscription into a stream
    ///
    /// The stream yields the current snapshot first, then every change, and
    /// ends when the producer stops.
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        stream::unfold((self, true), |(mut sub, first)| async move {
            if first {
                let snapshot = sub.current();
                return Some((snapshot, (sub, false)));
            }
            let snapshot = sub.changed().await?;
            Some((snapshot, (sub, false)))
        })
    }
}

/// Spawns a producer task and returns its subscription
///
/// `producer` receives the sending half and a token that is cancelled when
/// the subscription is dropped.
pub fn spawn_producer<T, F, Fut>(initial: T, producer: F) -> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
    F: FnOnce(watch::Sender<T>, CancellationToken) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = watch::channel(initial);
    let token = CancellationToken::new();
    tokio::spawn(producer(tx, token.clone()));
    Subscription::new(rx, token)
}
