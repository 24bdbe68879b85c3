//! OwnerRemovalHub - референсный OwnerWatch
//!
//! Host вызывает `notify_removed(owner)` когда owner окончательно удалён.
//! Все подписчики получают callback ровно один раз, вне lock.
//! Подписка на уже удалённого owner срабатывает сразу. Удалённые owner'ы
//! помнятся ограниченно: самые старые tombstones вытесняются.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::logger;
use crate::ports::{OwnerRemovedFn, OwnerWatch, WatchHandle};
use crate::state::lock;

pub const DEFAULT_TOMBSTONE_LIMIT: usize = 1024;

#[derive(Default)]
struct Subscriptions {
    next_id: u64,
    by_owner: HashMap<Entity, Vec<(WatchHandle, OwnerRemovedFn)>>,
    owner_of: HashMap<WatchHandle, Entity>,
    removed: HashSet<Entity>,
    removal_order: VecDeque<Entity>,
}

impl Subscriptions {
    fn remember_removed(&mut self, owner: Entity, limit: usize) {
        if limit == 0 || !self.removed.insert(owner) {
            return;
        }
        self.removal_order.push_back(owner);
        while self.removal_order.len() > limit {
            if let Some(oldest) = self.removal_order.pop_front() {
                self.removed.remove(&oldest);
            }
        }
    }
}

pub struct OwnerRemovalHub {
    inner: Mutex<Subscriptions>,
    tombstone_limit: usize,
}

impl Default for OwnerRemovalHub {
    fn default() -> Self {
        Self::with_tombstone_limit(DEFAULT_TOMBSTONE_LIMIT)
    }
}

impl OwnerRemovalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tombstone_limit(tombstone_limit: usize) -> Self {
        Self {
            inner: Mutex::new(Subscriptions::default()),
            tombstone_limit,
        }
    }

    /// Возвращает число вызванных callback'ов
    pub fn notify_removed(&self, owner: Entity) -> usize {
        let callbacks = {
            let mut inner = lock(&self.inner);
            inner.remember_removed(owner, self.tombstone_limit);
            let callbacks = inner.by_owner.remove(&owner).unwrap_or_default();
            for (handle, _) in &callbacks {
                inner.owner_of.remove(handle);
            }
            callbacks
        };

        let count = callbacks.len();
        if count > 0 {
            logger::log(&format!("👤 Owner {:?} removed, notifying {} watchers", owner, count));
        }
        for (_, callback) in callbacks {
            callback();
        }
        count
    }

    /// Owner снова валиден (например переиспользован host'ом)
    pub fn forget_removed(&self, owner: Entity) {
        let mut inner = lock(&self.inner);
        if inner.removed.remove(&owner) {
            inner.removal_order.retain(|candidate| *candidate != owner);
        }
    }

    pub fn tombstone_count(&self) -> usize {
        lock(&self.inner).removed.len()
    }

    pub fn subscriber_count(&self, owner: Entity) -> usize {
        lock(&self.inner).by_owner.get(&owner).map_or(0, Vec::len)
    }

    pub fn total_subscribers(&self) -> usize {
        lock(&self.inner).owner_of.len()
    }
}

impl OwnerWatch for OwnerRemovalHub {
    fn on_removed(&self, owner: Entity, callback: OwnerRemovedFn) -> WatchHandle {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let handle = WatchHandle(inner.next_id);

        if inner.removed.contains(&owner) {
            drop(inner);
            callback();
            return handle;
        }

        inner.by_owner.entry(owner).or_default().push((handle, callback));
        inner.owner_of.insert(handle, owner);
        handle
    }

    fn unsubscribe(&self, handle: WatchHandle) {
        let mut inner = lock(&self.inner);
        let Some(owner) = inner.owner_of.remove(&handle) else {
            return;
        };
        if let Some(watchers) = inner.by_owner.get_mut(&owner) {
            watchers.retain(|(candidate, _)| *candidate != handle);
            if watchers.is_empty() {
                inner.by_owner.remove(&owner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter_callback(counter: &Arc<AtomicUsize>) -> OwnerRemovedFn {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_notify_fires_once() {
        let hub = OwnerRemovalHub::new();
        let owner = Entity::from_raw(1);
        let counter = Arc::new(AtomicUsize::new(0));

        hub.on_removed(owner, counter_callback(&counter));
        hub.on_removed(owner, counter_callback(&counter));

        assert_eq!(hub.notify_removed(owner), 2);
        assert_eq!(hub.notify_removed(owner), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(hub.total_subscribers(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let hub = OwnerRemovalHub::new();
        let owner = Entity::from_raw(1);
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = hub.on_removed(owner, counter_callback(&counter));
        hub.unsubscribe(handle);
        hub.unsubscribe(handle);

        assert_eq!(hub.subscriber_count(owner), 0);
        hub.notify_removed(owner);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_after_removal_fires_immediately() {
        let hub = OwnerRemovalHub::new();
        let owner = Entity::from_raw(7);
        let counter = Arc::new(AtomicUsize::new(0));

        hub.notify_removed(owner);
        hub.on_removed(owner, counter_callback(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(owner), 0);

        hub.forget_removed(owner);
        hub.on_removed(owner, counter_callback(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(owner), 1);
    }

    #[test]
    fn test_tombstones_are_bounded() {
        let hub = OwnerRemovalHub::with_tombstone_limit(2);
        let counter = Arc::new(AtomicUsize::new(0));

        for index in 1..=3 {
            hub.notify_removed(Entity::from_raw(index));
        }
        assert_eq!(hub.tombstone_count(), 2);

        // Самый старый вытеснен: подписка на него больше не срабатывает сразу
        hub.on_removed(Entity::from_raw(1), counter_callback(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        hub.on_removed(Entity::from_raw(3), counter_callback(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_unsubscribe_reentrantly() {
        let hub = Arc::new(OwnerRemovalHub::new());
        let owner = Entity::from_raw(1);

        let other = hub.on_removed(owner, Box::new(|| {}));
        let inner_hub = Arc::downgrade(&hub);
        hub.on_removed(
            owner,
            Box::new(move || {
                if let Some(hub) = inner_hub.upgrade() {
                    hub.unsubscribe(other);
                }
            }),
        );

        // Не deadlock: callbacks вызываются вне lock
        assert_eq!(hub.notify_removed(owner), 2);
    }
}
