//! In-process implementations of the collaborator traits.
//!
//! Used by the test suites and for running the pipeline without Redis.
//! Each fake can be switched into a failing mode to exercise the error paths.

use crate::error::{Error, Result};
use crate::records::Subscription;
use crate::signal::Signal;
use crate::traits::{DurableQueue, IdempotencyGuard, NotificationChannel, SubscriberDirectory};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Lists and expiring keys held in memory.
///
/// Lists are stored newest-first, matching the Redis layout
/// (push to head, pop from tail).
#[derive(Default)]
pub struct InMemoryStore {
    lists: DashMap<String, VecDeque<String>>,
    keys: DashMap<String, Instant>,
    unavailable: AtomicBool,
    failing_lists: DashSet<String>,
    dequeue_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with a dependency error.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make writes to one list fail while everything else keeps working.
    pub fn fail_writes_to(&self, list: &str) {
        self.failing_lists.insert(list.to_string());
    }

    /// Number of `dequeue` calls served so far.
    pub fn dequeue_calls(&self) -> usize {
        self.dequeue_calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a list, newest first.
    pub fn entries(&self, list: &str) -> Vec<String> {
        self.lists
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Dependency("in-memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, list: &str) -> Result<()> {
        self.check_available()?;
        if self.failing_lists.contains(list) {
            return Err(Error::Dependency(format!("writes to '{}' are failing", list)));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableQueue for InMemoryStore {
    async fn enqueue(&self, queue: &str, payload: &str) -> Result<()> {
        self.check_writable(queue)?;
        self.lists
            .entry(queue.to_string())
            .or_default()
            .push_front(payload.to_string());
        Ok(())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<String>> {
        self.dequeue_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .lists
            .get_mut(queue)
            .and_then(|mut list| list.pop_back()))
    }

    async fn mirror(&self, feed: &str, payload: &str, max_len: usize) -> Result<()> {
        self.check_writable(feed)?;
        let mut list = self.lists.entry(feed.to_string()).or_default();
        list.push_front(payload.to_string());
        list.truncate(max_len.max(1));
        Ok(())
    }

    async fn depth(&self, queue: &str) -> Result<usize> {
        self.check_available()?;
        Ok(self.lists.get(queue).map(|l| l.len()).unwrap_or(0))
    }

    async fn peek(&self, queue: &str, limit: usize) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self
            .lists
            .get(queue)
            .map(|l| l.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl IdempotencyGuard for InMemoryStore {
    async fn try_acquire(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_secs);
        match self.keys.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if *held.get() > now {
                    Ok(false)
                } else {
                    held.insert(expires_at);
                    Ok(true)
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(expires_at);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.keys.remove(key);
        Ok(())
    }
}

/// Fixed set of subscriptions.
#[derive(Default)]
pub struct StaticDirectory {
    subscriptions: Vec<Subscription>,
    unavailable: AtomicBool,
    lookups: AtomicUsize,
}

impl StaticDirectory {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions,
            ..Default::default()
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberDirectory for StaticDirectory {
    async fn find_active_subscriptions_by_symbol(
        &self,
        symbol: &str,
    ) -> Result<Vec<Subscription>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Dependency("subscriber directory unavailable".to_string()));
        }
        Ok(self
            .subscriptions
            .iter()
            .filter(|s| s.is_active && s.coin_symbol == symbol)
            .cloned()
            .collect())
    }
}

/// Channel that records sends instead of delivering them.
#[derive(Default)]
pub struct RecordingChannel {
    sent: DashMap<String, Vec<String>>,
    failing_recipients: DashSet<String>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sends to `recipient` fail.
    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients.insert(recipient.to_string());
    }

    /// Symbols successfully sent to `recipient`, in send order.
    pub fn sent_to(&self, recipient: &str) -> Vec<String> {
        self.sent
            .get(recipient)
            .map(|s| s.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn send(&self, recipient: &str, signal: &Signal) -> Result<()> {
        if self.failing_recipients.contains(recipient) {
            return Err(Error::Notification(format!("send to {} rejected", recipient)));
        }
        self.sent
            .entry(recipient.to_string())
            .or_default()
            .push(signal.symbol.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_is_fifo() {
        let store = InMemoryStore::new();
        for payload in ["a", "b", "c"] {
            store.enqueue("q", payload).await.unwrap();
        }
        assert_eq!(store.dequeue("q").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.dequeue("q").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.dequeue("q").await.unwrap().as_deref(), Some("c"));
        assert_eq!(store.dequeue("q").await.unwrap(), None);
        assert_eq!(store.dequeue("never-created").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mirror_evicts_oldest() {
        let store = InMemoryStore::new();
        for i in 0..=5 {
            store.mirror("feed", &format!("entry-{}", i), 5).await.unwrap();
        }
        assert_eq!(store.depth("feed").await.unwrap(), 5);
        let survivors = store.peek("feed", 10).await.unwrap();
        assert_eq!(survivors.first().map(String::as_str), Some("entry-5"));
        assert!(!survivors.contains(&"entry-0".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_window_expiry() {
        let store = InMemoryStore::new();
        assert!(store.try_acquire("k", 300).await.unwrap());
        assert!(!store.try_acquire("k", 300).await.unwrap());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(store.try_acquire("k", 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_frees_key() {
        let store = InMemoryStore::new();
        assert!(store.try_acquire("k", 300).await.unwrap());
        store.release("k").await.unwrap();
        assert!(store.try_acquire("k", 300).await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_modes() {
        let store = InMemoryStore::new();
        store.fail_writes_to("feed");
        assert!(store.mirror("feed", "x", 10).await.is_err());
        assert!(store.enqueue("q", "x").await.is_ok());

        store.set_unavailable(true);
        assert!(matches!(store.dequeue("q").await, Err(Error::Dependency(_))));
        assert!(store.try_acquire("k", 1).await.is_err());
    }
}
