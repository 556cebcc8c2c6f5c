//! Bounded prepared-statement cache, partitioned by process identity.
//!
//! A forked child inherits the cache's in-memory structure but must never
//! touch statement handles that belong to the parent's OS-level
//! connection; closing a handle once per process corrupts driver state.
//! Every operation therefore takes the caller's [`ProcessId`] and resolves
//! its own partition, so a new identity starts from an empty partition.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::driver::PreparedStatement;
use crate::error::DriverError;

/// Identity of the process operating on the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Identity of the calling process.
    #[must_use]
    pub fn current() -> Self {
        Self(std::process::id())
    }

    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

/// A cached statement plus its lazily fetched column metadata.
#[derive(Debug)]
pub struct CacheEntry<S> {
    pub statement: S,
    /// Column names of the statement's result, fetched once after the
    /// first successful execution and reused afterwards.
    pub columns: Option<Arc<Vec<String>>>,
}

impl<S> CacheEntry<S> {
    #[must_use]
    pub fn new(statement: S) -> Self {
        Self {
            statement,
            columns: None,
        }
    }
}

/// Entries visible to one process identity, in insertion order.
#[derive(Debug)]
struct CachePartition<S> {
    entries: HashMap<String, CacheEntry<S>>,
    order: VecDeque<String>,
}

impl<S> CachePartition<S> {
    fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }
}

/// Bounded mapping from SQL text to cached prepared statements.
///
/// The capacity bound applies per partition; inserting at capacity evicts
/// the oldest entry (insertion order) and closes its statement before the
/// new entry goes in.
#[derive(Debug)]
pub struct StatementCache<S: PreparedStatement> {
    partitions: HashMap<ProcessId, CachePartition<S>>,
    max: usize,
}

impl<S: PreparedStatement> StatementCache<S> {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            partitions: HashMap::new(),
            max,
        }
    }

    /// Number of entries in `pid`'s partition.
    #[must_use]
    pub fn len(&self, pid: ProcessId) -> usize {
        self.partitions.get(&pid).map_or(0, |p| p.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self, pid: ProcessId) -> bool {
        self.len(pid) == 0
    }

    #[must_use]
    pub fn contains(&self, pid: ProcessId, sql: &str) -> bool {
        self.partitions
            .get(&pid)
            .is_some_and(|p| p.entries.contains_key(sql))
    }

    /// Look up `sql` within `pid`'s partition only.
    pub fn get_mut(&mut self, pid: ProcessId, sql: &str) -> Option<&mut CacheEntry<S>> {
        self.partitions
            .get_mut(&pid)
            .and_then(|p| p.entries.get_mut(sql))
    }

    /// Look up `sql`, preparing and inserting a fresh entry on a miss.
    /// Insertion enforces the eviction policy.
    ///
    /// # Errors
    ///
    /// Propagates the error from `prepare` on a cache miss.
    pub fn get_or_prepare<F>(
        &mut self,
        pid: ProcessId,
        sql: &str,
        prepare: F,
    ) -> Result<&mut CacheEntry<S>, DriverError>
    where
        F: FnOnce() -> Result<S, DriverError>,
    {
        if !self.contains(pid, sql) {
            let statement = prepare()?;
            self.put(pid, sql.to_string(), CacheEntry::new(statement));
        }
        match self.get_mut(pid, sql) {
            Some(entry) => Ok(entry),
            // Unreachable given the insert above; surfaced rather than
            // panicking in library code.
            None => Err(DriverError::message(
                "statement cache lost a freshly inserted entry",
            )),
        }
    }

    /// Insert an entry, evicting and closing the partition's oldest
    /// entries while the capacity bound would be exceeded.
    pub fn put(&mut self, pid: ProcessId, sql: String, entry: CacheEntry<S>) {
        let max = self.max;
        let partition = self.partition_mut(pid);
        if let Some(mut previous) = partition.entries.remove(&sql) {
            partition.order.retain(|key| key != &sql);
            let _ = previous.statement.close();
        }
        while partition.entries.len() >= max {
            let Some(oldest) = partition.order.pop_front() else {
                break;
            };
            if let Some(mut evicted) = partition.entries.remove(&oldest) {
                // Closing an already-invalid handle is tolerated.
                let _ = evicted.statement.close();
                debug!(sql = %oldest, "evicted prepared statement at capacity");
            }
        }
        partition.order.push_back(sql.clone());
        partition.entries.insert(sql, entry);
    }

    /// Remove an entry without closing its statement. Callers that evict
    /// on error close the statement themselves first, since the handle may
    /// already be invalid.
    pub fn delete(&mut self, pid: ProcessId, sql: &str) -> Option<CacheEntry<S>> {
        let partition = self.partitions.get_mut(&pid)?;
        let entry = partition.entries.remove(sql)?;
        partition.order.retain(|key| key != sql);
        Some(entry)
    }

    /// Close every statement in `pid`'s partition and empty it.
    pub fn clear(&mut self, pid: ProcessId) {
        if let Some(partition) = self.partitions.get_mut(&pid) {
            for (_, mut entry) in partition.entries.drain() {
                let _ = entry.statement.close();
            }
            partition.order.clear();
        }
    }

    /// Partition for `pid`, materialized empty on first touch. Partitions
    /// are never explicitly destroyed; one becomes garbage when its
    /// process exits.
    fn partition_mut(&mut self, pid: ProcessId) -> &mut CachePartition<S> {
        self.partitions
            .entry(pid)
            .or_insert_with(CachePartition::empty)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{CacheEntry, ProcessId, StatementCache};
    use crate::error::DriverError;
    use crate::driver::PreparedStatement;
    use crate::types::Value;

    struct StubStatement {
        closes: Arc<AtomicUsize>,
    }

    impl StubStatement {
        fn new(closes: &Arc<AtomicUsize>) -> Self {
            Self {
                closes: Arc::clone(closes),
            }
        }
    }

    impl PreparedStatement for StubStatement {
        fn execute(&mut self, _params: &[Value]) -> Result<(), DriverError> {
            Ok(())
        }

        fn result_metadata(&mut self) -> Result<Option<Vec<String>>, DriverError> {
            Ok(None)
        }

        fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, DriverError> {
            Ok(Vec::new())
        }

        fn affected_rows(&self) -> u64 {
            0
        }

        fn free_result(&mut self) {}

        fn close(&mut self) -> Result<(), DriverError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn eviction_is_oldest_first_and_closes_once() {
        let closes_a = Arc::new(AtomicUsize::new(0));
        let closes_b = Arc::new(AtomicUsize::new(0));
        let closes_c = Arc::new(AtomicUsize::new(0));
        let pid = ProcessId::from_raw(100);
        let mut cache = StatementCache::new(2);

        cache.put(pid, "A".into(), CacheEntry::new(StubStatement::new(&closes_a)));
        cache.put(pid, "B".into(), CacheEntry::new(StubStatement::new(&closes_b)));
        cache.put(pid, "C".into(), CacheEntry::new(StubStatement::new(&closes_c)));

        assert_eq!(cache.len(pid), 2);
        assert!(!cache.contains(pid, "A"));
        assert!(cache.contains(pid, "B"));
        assert!(cache.contains(pid, "C"));
        assert_eq!(closes_a.load(Ordering::SeqCst), 1);
        assert_eq!(closes_b.load(Ordering::SeqCst), 0);
        assert_eq!(closes_c.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn delete_does_not_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pid = ProcessId::from_raw(100);
        let mut cache = StatementCache::new(4);

        cache.put(pid, "A".into(), CacheEntry::new(StubStatement::new(&closes)));
        let entry = cache.delete(pid, "A");
        assert!(entry.is_some());
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(cache.is_empty(pid));
    }

    #[test]
    fn clear_closes_every_entry() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pid = ProcessId::from_raw(100);
        let mut cache = StatementCache::new(4);

        for sql in ["A", "B", "C"] {
            cache.put(pid, sql.into(), CacheEntry::new(StubStatement::new(&closes)));
        }
        cache.clear(pid);

        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty(pid));
    }

    #[test]
    fn partitions_are_isolated_by_identity() {
        let parent_closes = Arc::new(AtomicUsize::new(0));
        let child_closes = Arc::new(AtomicUsize::new(0));
        let parent = ProcessId::from_raw(1);
        let child = ProcessId::from_raw(2);
        let mut cache = StatementCache::new(4);

        cache.put(
            parent,
            "A".into(),
            CacheEntry::new(StubStatement::new(&parent_closes)),
        );

        // The forked child sees an empty partition.
        assert!(cache.is_empty(child));
        assert!(cache.get_mut(child, "A").is_none());

        cache.put(
            child,
            "A".into(),
            CacheEntry::new(StubStatement::new(&child_closes)),
        );
        cache.clear(child);

        // Clearing the child never touches the parent's handles.
        assert_eq!(child_closes.load(Ordering::SeqCst), 1);
        assert_eq!(parent_closes.load(Ordering::SeqCst), 0);
        assert!(cache.contains(parent, "A"));
    }
}
