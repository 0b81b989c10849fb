//! Append-only action log.
//!
//! Dispatchers append from any thread; only a successful reduction removes
//! entries, and only the exact prefix it settled.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    action::{ActionId, PendingAction, TransferAction},
    error::LedgerError,
};

#[derive(Debug)]
pub struct ActionLog {
    capacity: usize,
    inner: Mutex<LogEntries>,
}

#[derive(Debug)]
pub(crate) struct LogEntries {
    next_id: u64,
    entries: VecDeque<PendingAction>,
}

impl ActionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(LogEntries {
                next_id: 1,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Append `action` and return its id.
    pub fn append(&self, action: TransferAction) -> Result<ActionId, LedgerError> {
        let mut log = self.lock();
        if log.entries.len() >= self.capacity {
            return Err(LedgerError::ActionLogFull {
                capacity: self.capacity,
            });
        }
        let id = ActionId(log.next_id);
        log.next_id += 1;
        log.entries.push_back(PendingAction { id, action });
        Ok(id)
    }

    /// Snapshot of the oldest `limit` pending actions, in dispatch order.
    pub fn pending(&self, limit: usize) -> Vec<PendingAction> {
        self.lock().entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries are only mutated under this guard, so a poisoned lock still
    /// holds a consistent log.
    pub(crate) fn lock(&self) -> MutexGuard<'_, LogEntries> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogEntries {
    /// `true` if the log still starts with exactly `settled`.
    pub(crate) fn starts_with(&self, settled: &[ActionId]) -> bool {
        settled.len() <= self.entries.len()
            && self
                .entries
                .iter()
                .zip(settled)
                .all(|(entry, id)| entry.id == *id)
    }

    /// Remove the first `count` entries.
    pub(crate) fn drain_front(&mut self, count: usize) {
        self.entries.drain(..count);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ztoken_common::PublicIdentity;

    fn action(amount: u64) -> TransferAction {
        TransferAction::mint(PublicIdentity::from_bytes([1u8; 32]), amount)
    }

    #[test]
    fn ids_increase_in_dispatch_order() {
        let log = ActionLog::new(8);
        let a = log.append(action(1)).unwrap();
        let b = log.append(action(2)).unwrap();

        assert!(a < b);
        let pending = log.pending(10);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, a);
        assert_eq!(pending[1].action.amount, 2);
    }

    #[test]
    fn pending_is_capped() {
        let log = ActionLog::new(8);
        for amount in 0..5 {
            log.append(action(amount)).unwrap();
        }
        assert_eq!(log.pending(3).len(), 3);
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn full_log_rejects_dispatch() {
        let log = ActionLog::new(1);
        log.append(action(1)).unwrap();
        assert!(matches!(
            log.append(action(2)),
            Err(LedgerError::ActionLogFull { capacity: 1 })
        ));
    }

    #[test]
    fn drained_ids_are_not_reused() {
        let log = ActionLog::new(4);
        let first = log.append(action(1)).unwrap();
        {
            let mut entries = log.lock();
            assert!(entries.starts_with(&[first]));
            entries.drain_front(1);
            assert_eq!(entries.len(), 0);
        }
        let second = log.append(action(2)).unwrap();
        assert!(second > first);
        assert!(!log.lock().starts_with(&[first]));
    }

    #[test]
    fn concurrent_dispatch_assigns_unique_ids() {
        let log = std::sync::Arc::new(ActionLog::new(1000));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let log = log.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .map(|i| log.append(action(i)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<ActionId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }
}
