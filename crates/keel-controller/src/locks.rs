//! Per-subtree locking
//!
//! A dispatch holds a lock on its target address for its whole duration.
//! Two locks conflict when their addresses are related (equal, ancestor or
//! descendant) and at least one of them is exclusive. Unrelated subtrees
//! never block each other.

use keel_types::PathAddress;
use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct Held {
    id: u64,
    address: PathAddress,
    exclusive: bool,
}

#[derive(Debug, Default)]
struct LockTable {
    next_id: u64,
    held: Vec<Held>,
}

impl LockTable {
    fn conflicts(&self, address: &PathAddress, exclusive: bool) -> bool {
        self.held
            .iter()
            .any(|h| (exclusive || h.exclusive) && h.address.is_related_to(address))
    }
}

/// Lock table keyed by address
#[derive(Debug, Default)]
pub struct SubtreeLockManager {
    table: Mutex<LockTable>,
    released: Condvar,
}

impl SubtreeLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the subtree at `address` can be held exclusively
    pub fn exclusive(&self, address: &PathAddress) -> SubtreeGuard<'_> {
        self.acquire(address, true)
    }

    /// Block until the subtree at `address` can be read
    pub fn shared(&self, address: &PathAddress) -> SubtreeGuard<'_> {
        self.acquire(address, false)
    }

    /// Non-blocking variant of [`exclusive`](Self::exclusive)
    pub fn try_exclusive(&self, address: &PathAddress) -> Option<SubtreeGuard<'_>> {
        let mut table = self.table.lock();
        if table.conflicts(address, true) {
            return None;
        }
        Some(self.insert(&mut table, address, true))
    }

    fn acquire(&self, address: &PathAddress, exclusive: bool) -> SubtreeGuard<'_> {
        let mut table = self.table.lock();
        while table.conflicts(address, exclusive) {
            self.released.wait(&mut table);
        }
        self.insert(&mut table, address, exclusive)
    }

    fn insert(
        &self,
        table: &mut LockTable,
        address: &PathAddress,
        exclusive: bool,
    ) -> SubtreeGuard<'_> {
        let id = table.next_id;
        table.next_id += 1;
        table.held.push(Held {
            id,
            address: address.clone(),
            exclusive,
        });
        SubtreeGuard { manager: self, id }
    }

    /// Number of locks currently held
    pub fn held(&self) -> usize {
        self.table.lock().held.len()
    }

    fn release(&self, id: u64) {
        let mut table = self.table.lock();
        table.held.retain(|h| h.id != id);
        drop(table);
        self.released.notify_all();
    }
}

/// Releases its subtree lock on drop
#[derive(Debug)]
pub struct SubtreeGuard<'a> {
    manager: &'a SubtreeLockManager,
    id: u64,
}

impl Drop for SubtreeGuard<'_> {
    fn drop(&mut self) {
        self.manager.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn addr(s: &str) -> PathAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_unrelated_subtrees_do_not_conflict() {
        let locks = SubtreeLockManager::new();
        let _a = locks.exclusive(&addr("/host=a"));
        assert!(locks.try_exclusive(&addr("/host=b")).is_some());
        assert!(locks.try_exclusive(&addr("/interface=public")).is_some());
    }

    #[test]
    fn test_ancestor_and_descendant_conflict() {
        let locks = SubtreeLockManager::new();
        let _host = locks.exclusive(&addr("/host=a"));
        assert!(locks.try_exclusive(&addr("/host=a/interface=management")).is_none());
        assert!(locks.try_exclusive(&PathAddress::root()).is_none());
    }

    #[test]
    fn test_shared_locks_coexist() {
        let locks = SubtreeLockManager::new();
        let _r1 = locks.shared(&addr("/host=a"));
        let _r2 = locks.shared(&addr("/host=a"));
        assert_eq!(locks.held(), 2);
        assert!(locks.try_exclusive(&addr("/host=a")).is_none());
    }

    #[test]
    fn test_guard_release_wakes_waiter() {
        let locks = Arc::new(SubtreeLockManager::new());
        let acquired = Arc::new(AtomicBool::new(false));

        let guard = locks.exclusive(&addr("/host=a"));
        let waiter = {
            let locks = Arc::clone(&locks);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let _g = locks.exclusive(&addr("/host=a/interface=x"));
                acquired.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(guard);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
        assert_eq!(locks.held(), 0);
    }
}
