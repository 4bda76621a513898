//! One-shot asset promises
//!
//! Loads run anywhere (a worker thread, an async runtime, a test). The
//! resolving side sends exactly one result; the render thread polls the
//! promise between ticks and never blocks on it.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::assets::AssetError;

/// Outcome of polling a promise
#[derive(Debug)]
pub enum AssetPoll<T> {
    /// Not resolved yet
    Pending,
    /// Resolved with a value
    Ready(T),
    /// Rejected, or the resolver was dropped unresolved
    Failed(AssetError),
}

/// Receiving half, polled by the controller
#[derive(Debug)]
pub struct AssetPromise<T> {
    receiver: Receiver<Result<T, AssetError>>,
    settled: bool,
}

/// Sending half, handed to the loader
#[derive(Debug)]
pub struct AssetResolver<T> {
    sender: Sender<Result<T, AssetError>>,
}

/// Create a connected promise/resolver pair
pub fn promise<T>() -> (AssetPromise<T>, AssetResolver<T>) {
    let (sender, receiver) = bounded(1);
    (
        AssetPromise {
            receiver,
            settled: false,
        },
        AssetResolver { sender },
    )
}

impl<T> AssetPromise<T> {
    /// Promise that is already resolved
    pub fn ready(value: T) -> Self {
        let (promise, resolver) = promise();
        resolver.resolve(value);
        promise
    }

    /// Promise that is already rejected
    pub fn failed(error: AssetError) -> Self {
        let (promise, resolver) = promise();
        resolver.reject(error);
        promise
    }

    /// Check for a result without blocking
    ///
    /// Yields `Ready` or `Failed` at most once; later polls stay `Pending`.
    pub fn poll(&mut self) -> AssetPoll<T> {
        if self.settled {
            return AssetPoll::Pending;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.settled = true;
                match result {
                    Ok(value) => AssetPoll::Ready(value),
                    Err(err) => AssetPoll::Failed(err),
                }
            }
            Err(TryRecvError::Empty) => AssetPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.settled = true;
                AssetPoll::Failed(AssetError::Dropped)
            }
        }
    }

    /// Whether a result has already been taken
    pub fn is_settled(&self) -> bool {
        self.settled
    }
}

impl<T> AssetResolver<T> {
    /// Deliver the loaded value
    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    /// Deliver a load failure
    pub fn reject(self, error: AssetError) {
        self.complete(Err(error));
    }

    /// Deliver a result
    pub fn complete(self, result: Result<T, AssetError>) {
        // The promise may already be gone; nothing is waiting then
        if self.sender.send(result).is_err() {
            log::trace!("Asset resolved after its promise was dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pending_until_resolved() {
        let (mut promise, resolver) = promise::<u32>();
        assert!(matches!(promise.poll(), AssetPoll::Pending));
        resolver.resolve(7);
        assert!(matches!(promise.poll(), AssetPoll::Ready(7)));
        assert!(matches!(promise.poll(), AssetPoll::Pending));
        assert!(promise.is_settled());
    }

    #[test]
    fn test_dropped_resolver_fails() {
        let (mut promise, resolver) = promise::<u32>();
        drop(resolver);
        assert!(matches!(promise.poll(), AssetPoll::Failed(AssetError::Dropped)));
    }

    #[test]
    fn test_resolves_from_worker_thread() {
        let (mut promise, resolver) = promise::<String>();
        thread::spawn(move || resolver.resolve("loaded".to_string()))
            .join()
            .unwrap();
        match promise.poll() {
            AssetPoll::Ready(value) => assert_eq!(value, "loaded"),
            other => panic!("unexpected poll result {other:?}"),
        }
    }

    #[test]
    fn test_resolve_after_promise_dropped() {
        let (promise, resolver) = promise::<u32>();
        drop(promise);
        resolver.resolve(1);
    }
}
