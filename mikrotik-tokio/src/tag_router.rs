//! Tag-based multiplexing (L5): the map from tag to the channel that should
//! receive its replies.

use std::collections::HashMap;

use mikrotik_proto::CommandResponse;
use tokio::sync::mpsc::Sender;

use crate::error::DeviceResult;

/// Owns the `tag -> subscriber` map for one connection.
///
/// A tag is live from [`TagRouter::subscribe`] until [`TagRouter::unsubscribe`]
/// removes it (on a terminal reply, on cancellation, or when the connection
/// tears down and every tag is drained at once).
#[derive(Default)]
pub struct TagRouter {
    subscribers: HashMap<u16, Sender<DeviceResult<CommandResponse>>>,
}

impl TagRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sender` as the subscriber for `tag`.
    ///
    /// Returns the previous subscriber, if `tag` was already registered —
    /// this should not happen with [`TagAllocator`]'s monotonic, skip-if-live
    /// allocation, but the caller decides how to treat it rather than the
    /// router silently overwriting a live subscription.
    pub fn subscribe(
        &mut self,
        tag: u16,
        sender: Sender<DeviceResult<CommandResponse>>,
    ) -> Option<Sender<DeviceResult<CommandResponse>>> {
        self.subscribers.insert(tag, sender)
    }

    /// Removes and returns the subscriber for `tag`, if any.
    pub fn unsubscribe(&mut self, tag: u16) -> Option<Sender<DeviceResult<CommandResponse>>> {
        self.subscribers.remove(&tag)
    }

    /// Returns the subscriber for `tag`, if registered.
    pub fn get(&self, tag: u16) -> Option<&Sender<DeviceResult<CommandResponse>>> {
        self.subscribers.get(&tag)
    }

    /// True if `tag` has a live subscriber.
    pub fn is_live(&self, tag: u16) -> bool {
        self.subscribers.contains_key(&tag)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True if there are no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Removes and returns every subscriber, in unspecified order. Used when
    /// the connection tears down and every open command must be notified.
    pub fn drain(&mut self) -> Vec<(u16, Sender<DeviceResult<CommandResponse>>)> {
        self.subscribers.drain().collect()
    }
}

/// Allocates tags from a monotonically increasing `u16` counter, skipping
/// any value still live in the given [`TagRouter`] so a tag is never reused
/// while a subscriber might still be waiting on it.
#[derive(Default)]
pub struct TagAllocator {
    next: u16,
}

impl TagAllocator {
    /// Creates an allocator starting at tag 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next tag not currently registered in `router`.
    ///
    /// The counter wraps after 65536 allocations; a tag is only reused once
    /// it wraps back around *and* is no longer live, so reuse is only
    /// possible on a connection with that many concurrently-open commands.
    pub fn allocate(&mut self, router: &TagRouter) -> u16 {
        loop {
            let candidate = self.next;
            self.next = self.next.wrapping_add(1);
            if !router.is_live(candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (Sender<DeviceResult<CommandResponse>>, tokio::sync::mpsc::Receiver<DeviceResult<CommandResponse>>) {
        tokio::sync::mpsc::channel(4)
    }

    #[test]
    fn subscribe_then_get_returns_the_sender() {
        let mut router = TagRouter::new();
        let (tx, _rx) = sender();
        assert!(router.subscribe(1, tx).is_none());
        assert!(router.get(1).is_some());
        assert!(router.is_live(1));
    }

    #[test]
    fn unsubscribe_removes_and_returns() {
        let mut router = TagRouter::new();
        let (tx, _rx) = sender();
        router.subscribe(1, tx);
        assert!(router.unsubscribe(1).is_some());
        assert!(router.get(1).is_none());
        assert!(router.unsubscribe(1).is_none());
    }

    #[test]
    fn unknown_tag_is_not_live() {
        let router = TagRouter::new();
        assert!(!router.is_live(99));
        assert!(router.get(99).is_none());
    }

    #[test]
    fn drain_empties_the_router() {
        let mut router = TagRouter::new();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        router.subscribe(1, tx1);
        router.subscribe(2, tx2);
        let drained = router.drain();
        assert_eq!(drained.len(), 2);
        assert!(router.is_empty());
    }

    #[test]
    fn allocator_starts_at_zero_and_increments() {
        let router = TagRouter::new();
        let mut alloc = TagAllocator::new();
        assert_eq!(alloc.allocate(&router), 0);
        assert_eq!(alloc.allocate(&router), 1);
    }

    #[test]
    fn allocator_never_reuses_a_live_tag() {
        let mut router = TagRouter::new();
        let mut alloc = TagAllocator::new();
        let first = alloc.allocate(&router);
        let (tx, _rx) = sender();
        router.subscribe(first, tx);
        // next allocation must not collide with `first`, which is still live
        let second = alloc.allocate(&router);
        assert_ne!(first, second);
    }
}
