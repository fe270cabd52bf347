//! Single-shot completions.
//!
//! Backends that are driven by callbacks use [`pending`] to
//! turn a callback into a future. The [`Completer`] half is
//! handed to whatever finishes the work and the [`Completion`]
//! half is awaited.

use core::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{BackendError, BackendErrorKind};

/// Creates a linked [`Completer`] and [`Completion`].
pub fn pending<T>() -> (Completer<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Completer { tx }, Completion { rx })
}

/// Completes a [`Completion`].
///
/// Dropping a `Completer` without completing it resolves the
/// [`Completion`] with [`BackendErrorKind::Abandoned`].
#[derive(Debug)]
pub struct Completer<T> {
    tx: oneshot::Sender<Result<T, BackendError>>,
}

impl<T> Completer<T> {
    /// Completes the operation with `result`.
    pub fn complete(self, result: Result<T, BackendError>) {
        if self.tx.send(result).is_err() {
            // Callers cannot cancel, but they can stop
            // listening.
            debug!("completion dropped before the operation finished");
        }
    }

    /// Completes the operation successfully.
    pub fn resolve(self, value: T) {
        self.complete(Ok(value))
    }

    /// Fails the operation.
    pub fn reject(self, err: BackendError) {
        self.complete(Err(err))
    }

    /// Reports whether the [`Completion`] has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The result of a pending backend operation.
#[derive(Debug)]
#[must_use = "futures do nothing unless polled"]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, BackendError>>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, BackendError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|res| {
            res.unwrap_or_else(|_| {
                Err(BackendError::msg(
                    BackendErrorKind::Abandoned,
                    "operation dropped without completing",
                ))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("device busy")]
    struct Busy;

    #[tokio::test]
    async fn test_resolve() {
        let (completer, completion) = pending();
        completer.resolve(42u32);
        assert_eq!(completion.await.expect("should resolve"), 42);
    }

    #[tokio::test]
    async fn test_reject_keeps_cause() {
        let (completer, completion) = pending::<()>();
        completer.reject(BackendError::new(BackendErrorKind::Operation, Busy));
        let err = completion.await.expect_err("should reject");
        assert_eq!(err.kind(), BackendErrorKind::Operation);
        assert!(err.downcast_ref::<Busy>().is_some());
    }

    #[tokio::test]
    async fn test_dropped_completer_is_abandoned() {
        let (completer, completion) = pending::<Vec<u8>>();
        drop(completer);
        let err = completion.await.expect_err("should be abandoned");
        assert_eq!(err.kind(), BackendErrorKind::Abandoned);
    }

    #[tokio::test]
    async fn test_completes_from_another_task() {
        let (completer, completion) = pending();
        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            completer.resolve("done");
        });
        assert_eq!(completion.await.expect("should resolve"), "done");
        handle.await.expect("task should not panic");
    }

    #[test]
    fn test_dropped_completion() {
        let (completer, completion) = pending::<u8>();
        drop(completion);
        assert!(completer.is_closed());
        // Completing after the receiver is gone is not an error.
        completer.resolve(1);
    }
}
