//! FIFO mutual-exclusion gate around the shared session.
//!
//! Two logical operations must never interleave their command/response
//! exchanges on the one Telnet session, or replies get attributed to the
//! wrong request. The serializer hands out one guard at a time, in the order
//! callers asked for it. Release is the guard's `Drop`, so it happens on every
//! exit path: early return, `?`, panic, or the caller's future being dropped.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::{debug, trace};
use tokio::sync::{Mutex, MutexGuard};

/// FIFO lock over a resource.
///
/// Built on `tokio::sync::Mutex`, whose waiters are woken strictly in
/// arrival order.
#[derive(Debug)]
pub struct CommandSerializer<T> {
    inner: Mutex<T>,
    next_ticket: AtomicU64,
}

impl<T> CommandSerializer<T> {
    /// Wrap a resource.
    pub fn new(resource: T) -> Self {
        Self {
            inner: Mutex::new(resource),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Wait for every earlier holder to release, then take the lock.
    ///
    /// Never fails, only waits.
    pub async fn acquire(&self) -> SerializerGuard<'_, T> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        trace!("serializer: ticket {} queued", ticket);

        let queued_at = Instant::now();
        let guard = self.inner.lock().await;

        debug!(
            "serializer: ticket {} acquired after {:?}",
            ticket,
            queued_at.elapsed()
        );
        SerializerGuard {
            guard,
            ticket,
            acquired_at: Instant::now(),
        }
    }

    /// Take the lock only if nobody holds it right now.
    pub fn try_acquire(&self) -> Option<SerializerGuard<'_, T>> {
        let guard = self.inner.try_lock().ok()?;
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        debug!("serializer: ticket {} acquired without waiting", ticket);
        Some(SerializerGuard {
            guard,
            ticket,
            acquired_at: Instant::now(),
        })
    }

    /// Run `f` while holding the lock; released when `f` finishes.
    pub async fn with_lock<R>(&self, f: impl AsyncFnOnce(&mut T) -> R) -> R {
        let mut guard = self.acquire().await;
        f(&mut *guard).await
    }

    /// Consume the serializer and return the resource.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Exclusive access to the serialized resource.
///
/// Dropping the guard releases the lock to the next queued caller.
pub struct SerializerGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    ticket: u64,
    acquired_at: Instant,
}

impl<T> SerializerGuard<'_, T> {
    /// This holder's position in the acquisition order.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl<T: fmt::Debug> fmt::Debug for SerializerGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerGuard")
            .field("ticket", &self.ticket)
            .field("resource", &*self.guard)
            .finish()
    }
}

impl<T> Deref for SerializerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SerializerGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for SerializerGuard<'_, T> {
    fn drop(&mut self) {
        debug!(
            "serializer: ticket {} released after {:?}",
            self.ticket,
            self.acquired_at.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[test]
    fn test_second_acquire_waits_for_release() {
        let serializer = CommandSerializer::new(Vec::<&str>::new());

        let mut a = task::spawn(serializer.acquire());
        let mut guard_a = assert_ready!(a.poll());
        guard_a.push("a");

        let mut b = task::spawn(serializer.acquire());
        assert_pending!(b.poll());
        assert_pending!(b.poll());

        drop(guard_a);
        assert!(b.is_woken());
        let mut guard_b = assert_ready!(b.poll());
        guard_b.push("b");
        assert_eq!(*guard_b, vec!["a", "b"]);
    }

    #[test]
    fn test_fifo_order() {
        let serializer = CommandSerializer::new(());
        let first = serializer.try_acquire().unwrap();

        let mut second = task::spawn(serializer.acquire());
        let mut third = task::spawn(serializer.acquire());
        assert_pending!(second.poll());
        assert_pending!(third.poll());

        drop(first);
        // Only the earliest waiter may proceed
        assert_pending!(third.poll());
        let second_guard = assert_ready!(second.poll());
        assert_pending!(third.poll());

        drop(second_guard);
        assert_ready!(third.poll());
    }

    #[test]
    fn test_guard_debug_shows_ticket() {
        let serializer = CommandSerializer::new(7u32);
        let first = serializer.try_acquire().unwrap();
        assert_eq!(
            format!("{:?}", first),
            "SerializerGuard { ticket: 1, resource: 7 }"
        );
        drop(first);
        let second = serializer.try_acquire().unwrap();
        assert_eq!(second.ticket(), 2);
    }

    #[test]
    fn test_try_acquire_when_held() {
        let serializer = CommandSerializer::new(0u32);
        let guard = serializer.try_acquire().unwrap();
        assert!(serializer.try_acquire().is_none());
        drop(guard);
        assert!(serializer.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_released_on_error_path() {
        let serializer = CommandSerializer::new(0u32);

        async fn step(serializer: &CommandSerializer<u32>) -> Result<(), String> {
            let mut guard = serializer.acquire().await;
            *guard += 1;
            "device said no".parse::<u32>().map_err(|e| e.to_string())?;
            *guard += 1;
            Ok(())
        }

        assert!(step(&serializer).await.is_err());
        let guard = serializer.try_acquire().unwrap();
        assert_eq!(*guard, 1);
    }

    #[tokio::test]
    async fn test_released_when_future_dropped() {
        let serializer = Arc::new(CommandSerializer::new(()));

        let holder = {
            let serializer = serializer.clone();
            tokio::spawn(async move {
                let _guard = serializer.acquire().await;
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };
        tokio::task::yield_now().await;
        holder.abort();
        let _ = holder.await;

        let guard = tokio::time::timeout(Duration::from_secs(1), serializer.acquire()).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_operations_never_interleave() {
        let serializer = CommandSerializer::new(Vec::new());

        let operations = (0..4u32).map(|op| {
            serializer.with_lock(async move |log: &mut Vec<(u32, u32)>| {
                for step in 0..3 {
                    log.push((op, step));
                    tokio::task::yield_now().await;
                }
            })
        });
        futures_util::future::join_all(operations).await;

        let log = serializer.into_inner();
        assert_eq!(log.len(), 12);
        for chunk in log.chunks(3) {
            let op = chunk[0].0;
            assert_eq!(chunk, &[(op, 0), (op, 1), (op, 2)]);
        }
    }
}
