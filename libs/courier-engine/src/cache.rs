use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;

use courier_api::RecordEnvelope;

pub const DEFAULT_CAPACITY: usize = 100;

/// Aggregates over one cache snapshot. Never stored, always recomputed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_messages: usize,
    pub topics_count: usize,
    pub partitions_count: usize,
}

impl DashboardStats {
    pub fn from_records(records: &[Arc<RecordEnvelope>]) -> Self {
        let topics: HashSet<&str> = records.iter().map(|r| r.topic()).collect();
        let partitions: HashSet<(&str, i32)> = records.iter().map(|r| (r.topic(), r.partition())).collect();
        Self {
            total_messages: records.len(),
            topics_count: topics.len(),
            partitions_count: partitions.len(),
        }
    }
}

/// Bounded, newest-first buffer of recently processed records.
///
/// Eviction is strict FIFO by insertion: a busy topic can push every other
/// topic out. Every operation takes the lock once, so readers see either
/// the state before or after a mutation.
#[derive(Debug)]
pub struct RecentRecordCache {
    records: RwLock<VecDeque<Arc<RecordEnvelope>>>,
    capacity: usize,
}

impl Default for RecentRecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecentRecordCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.saturating_add(1).min(65536))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn insert(&self, envelope: Arc<RecordEnvelope>) {
        let id = envelope.id().to_string();
        let mut buf = self.write();
        buf.push_front(envelope);
        buf.truncate(self.capacity);
        drop(buf);
        tracing::debug!(%id, "added message to dashboard");
    }

    /// Independent copy of the current contents, newest first.
    pub fn snapshot(&self) -> Vec<Arc<RecordEnvelope>> {
        self.read().iter().cloned().collect()
    }

    pub fn filter_by_topic(&self, topic: &str) -> Vec<Arc<RecordEnvelope>> {
        self.snapshot().into_iter().filter(|r| r.topic() == topic).collect()
    }

    pub fn clear(&self) {
        self.write().clear();
        tracing::info!("cleared all messages from dashboard");
    }

    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_records(&self.snapshot())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<Arc<RecordEnvelope>>> {
        match self.records.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("record cache read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Arc<RecordEnvelope>>> {
        match self.records.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("record cache write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(topic: &str, partition: i32, offset: i64) -> Arc<RecordEnvelope> {
        Arc::new(RecordEnvelope::new(topic, partition, offset, 0, None, "payload", 0))
    }

    fn offsets(records: &[Arc<RecordEnvelope>]) -> Vec<i64> {
        records.iter().map(|r| r.offset()).collect()
    }

    #[test]
    fn default_capacity_is_one_hundred() {
        let cache = RecentRecordCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        assert_eq!(cache.capacity(), 100);
    }

    #[test]
    fn newest_first() {
        let cache = RecentRecordCache::new(10);
        for offset in 0..3 {
            cache.insert(envelope("t", 0, offset));
        }
        assert_eq!(offsets(&cache.snapshot()), vec![2, 1, 0]);
    }

    #[test]
    fn overflow_keeps_most_recent_capacity_records() {
        let cache = RecentRecordCache::new(DEFAULT_CAPACITY);
        for offset in 0..105 {
            cache.insert(envelope("t", 0, offset));
        }

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.len(), 100);
        assert_eq!(offsets(&snapshot), (5..105).rev().collect::<Vec<_>>());
        assert_eq!(cache.stats().total_messages, 100);
    }

    #[test]
    fn busy_topic_starves_others() {
        let cache = RecentRecordCache::new(3);
        cache.insert(envelope("slow", 0, 0));
        for offset in 0..3 {
            cache.insert(envelope("fast", 0, offset));
        }
        assert!(cache.filter_by_topic("slow").is_empty());
        assert_eq!(cache.filter_by_topic("fast").len(), 3);
    }

    #[test]
    fn filter_preserves_relative_order() {
        let cache = RecentRecordCache::new(10);
        cache.insert(envelope("a", 0, 1));
        cache.insert(envelope("b", 0, 1));
        cache.insert(envelope("a", 0, 2));
        cache.insert(envelope("b", 0, 2));
        cache.insert(envelope("a", 1, 3));

        let expected: Vec<_> = cache.snapshot().into_iter().filter(|r| r.topic() == "a").collect();
        let filtered = cache.filter_by_topic("a");
        assert_eq!(filtered, expected);
        assert_eq!(offsets(&filtered), vec![3, 2, 1]);
        assert!(cache.filter_by_topic("missing").is_empty());
    }

    #[test]
    fn stats_count_distinct_topics_and_partitions() {
        let cache = RecentRecordCache::new(10);
        cache.insert(envelope("a", 0, 1));
        cache.insert(envelope("a", 0, 2));
        cache.insert(envelope("a", 1, 1));
        cache.insert(envelope("b", 0, 1));

        let stats = cache.stats();
        assert_eq!(stats.total_messages, cache.snapshot().len());
        assert_eq!(
            stats,
            DashboardStats { total_messages: 4, topics_count: 2, partitions_count: 3 }
        );
    }

    #[test]
    fn snapshot_is_detached_from_later_mutations() {
        let cache = RecentRecordCache::new(10);
        cache.insert(envelope("t", 0, 1));
        let snapshot = cache.snapshot();
        cache.insert(envelope("t", 0, 2));
        cache.clear();
        assert_eq!(offsets(&snapshot), vec![1]);
    }

    #[test]
    fn records_are_shared_not_copied() {
        let cache = RecentRecordCache::new(10);
        let env = envelope("t", 0, 1);
        cache.insert(env.clone());
        assert!(Arc::ptr_eq(&env, &cache.snapshot()[0]));
    }

    #[test]
    fn clear_empties_cache() {
        let cache = RecentRecordCache::new(10);
        cache.insert(envelope("t", 0, 1));
        cache.clear();
        assert!(cache.snapshot().is_empty());
        assert_eq!(cache.stats(), DashboardStats::default());
    }

    #[test]
    fn concurrent_inserts_and_clears_stay_bounded() {
        let cache = Arc::new(RecentRecordCache::new(50));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for offset in 0..500 {
                        cache.insert(envelope(&format!("t{w}"), 0, offset));
                    }
                })
            })
            .collect();
        let clearer = {
            let cache = cache.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    cache.clear();
                    let snapshot = cache.snapshot();
                    assert!(snapshot.len() <= 50);
                    assert_eq!(DashboardStats::from_records(&snapshot).total_messages, snapshot.len());
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        clearer.join().unwrap();

        assert!(cache.len() <= 50);
        cache.clear();
        assert!(cache.snapshot().is_empty());
    }
}
