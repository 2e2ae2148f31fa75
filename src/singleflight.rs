//! Single-Flight Coordinator
//!
//! Collapses concurrent loads of the same key into one execution. The first
//! caller for a key (the leader) runs the load; every caller that arrives
//! while it is in flight waits on a completion signal and receives a clone of
//! the leader's result, error included.
//!
//! # Design
//!
//! - `calls` maps key → receiver of a `watch` channel carrying the result
//! - The map lock is held only to register or remove a call, never while the
//!   load itself runs, so slow keys do not block unrelated ones
//! - The leader publishes its result before unregistering, so a caller that
//!   grabs the receiver in between still sees the finished value
//! - If the leader's future is dropped mid-flight, a guard unregisters the
//!   key and waiters observe a dropped sender instead of hanging

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::{Error, Result};

type Slot<T> = Option<Result<T>>;
type Calls<T> = Mutex<HashMap<String, watch::Receiver<Slot<T>>>>;

enum Role<T> {
    Leader(watch::Sender<Slot<T>>),
    Waiter(watch::Receiver<Slot<T>>),
}

/// Deduplicates concurrent work per key
pub struct FlightGroup<T> {
    calls: Calls<T>,
}

impl<T> Default for FlightGroup<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` for `key` unless a call is already in flight, in which case
    /// wait for and return that call's result.
    pub async fn run<F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_shared(key, f).await.0
    }

    /// Like [`run`](Self::run), also reporting whether the result was shared
    /// from another caller's execution (`true`) or produced here (`false`).
    pub async fn run_shared<F, Fut>(&self, key: &str, f: F) -> (Result<T>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let role = {
            let mut calls = self.calls.lock();
            match calls.get(key) {
                Some(rx) => Role::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    calls.insert(key.to_owned(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Waiter(rx) => (Self::wait(rx).await, true),
            Role::Leader(tx) => {
                let _guard = CallGuard {
                    calls: &self.calls,
                    key,
                };
                let result = f().await;
                tx.send_replace(Some(result.clone()));
                (result, false)
            }
        }
    }

    /// Number of keys with a call currently in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }

    async fn wait(mut rx: watch::Receiver<Slot<T>>) -> Result<T> {
        match rx.wait_for(Option::is_some).await {
            Ok(slot) => match &*slot {
                Some(result) => result.clone(),
                None => Err(abandoned()),
            },
            Err(_) => Err(abandoned()),
        }
    }
}

fn abandoned() -> Error {
    Error::Internal("in-flight call abandoned".to_string())
}

/// Unregisters the leader's key on completion or cancellation
struct CallGuard<'a, T> {
    calls: &'a Calls<T>,
    key: &'a str,
}

impl<T> Drop for CallGuard<'_, T> {
    fn drop(&mut self) {
        self.calls.lock().remove(self.key);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use futures::future::join_all;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_do_returns_value() {
        let flight = FlightGroup::new();
        let v = flight
            .run("key", || async { Ok("bar".to_string()) })
            .await
            .unwrap();
        assert_eq!(v, "bar");
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_do_returns_error() {
        let flight: FlightGroup<String> = FlightGroup::new();
        let err = flight
            .run("key", || async { Err(Error::loader("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err, Error::loader("boom"));
    }

    /// Spawns `n` callers for one key whose work blocks on `gate`. The tests
    /// run on the current-thread runtime, so one sleep lets every spawned task
    /// reach its first await before the gate opens.
    async fn fan_out(
        n: usize,
        result: Result<String>,
    ) -> (Arc<AtomicUsize>, Vec<(Result<String>, bool)>) {
        let flight = Arc::new(FlightGroup::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let flight = Arc::clone(&flight);
                let calls = Arc::clone(&calls);
                let gate = Arc::clone(&gate);
                let result = result.clone();
                tokio::spawn(async move {
                    flight
                        .run_shared("key", || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            gate.notified().await;
                            result
                        })
                        .await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(flight.in_flight(), 1);
        gate.notify_waiters();

        let results = join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(flight.in_flight(), 0);
        (calls, results)
    }

    #[tokio::test]
    async fn test_do_dedupes_concurrent_calls() {
        let (calls, results) = fan_out(10, Ok("bar".to_string())).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|(r, _)| r.as_deref() == Ok("bar")));
        assert_eq!(results.iter().filter(|(_, shared)| !shared).count(), 1);
    }

    #[tokio::test]
    async fn test_do_shares_identical_error() {
        let (calls, results) = fan_out(10, Err(Error::loader("db down"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for (result, _) in results {
            assert_eq!(result, Err(Error::loader("db down")));
        }
    }

    #[tokio::test]
    async fn test_new_generation_after_completion() {
        let flight = FlightGroup::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = flight
                .run("key", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1u32)
                })
                .await
                .unwrap();
            assert_eq!(v, 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let flight = Arc::new(FlightGroup::new());
        let gate = Arc::new(Notify::new());

        let slow = {
            let flight = Arc::clone(&flight);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                flight
                    .run("slow", || async move {
                        gate.notified().await;
                        Ok(1u32)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let fast = flight.run("fast", || async { Ok(2u32) }).await;
        assert_eq!(fast, Ok(2));
        assert_eq!(flight.in_flight(), 1);

        gate.notify_waiters();
        assert_eq!(slow.await.unwrap(), Ok(1));
    }

    #[tokio::test]
    async fn test_abandoned_leader_releases_waiters() {
        let flight = Arc::new(FlightGroup::<u32>::new());

        let leader = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run("key", || futures::future::pending::<Result<u32>>())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move { flight.run("key", || async { Ok(7) }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        leader.abort();
        let result = waiter.await.unwrap();
        assert_eq!(result, Err(abandoned()));
        assert_eq!(flight.in_flight(), 0);

        // Next call starts a fresh generation
        assert_eq!(flight.run("key", || async { Ok(9) }).await, Ok(9));
    }
}
