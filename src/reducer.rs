//! Global frequency table and the striped merge of per-worker tables into it.
//!
//! The table is split into a fixed number of stripes. Each stripe is a mutex
//! owning the shard of the key space whose tokens hash to it, so a resize of one
//! shard never races with an update of another and no key ever crosses stripes.
//! `add` is the only mutating operation.

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::sync::Mutex;

use bytes::Bytes;
use log::debug;

use crate::error::{Result, WordCountError};
use crate::pool::WorkerPool;
use crate::util::{Entry, FreqTable};

/// Decides which stripe owns a token: `stripe_hash(token) % stripes`.
pub trait StripePolicy: Sync {
    fn stripe_hash(&self, token: &[u8]) -> u64;
}

/// Default policy, a randomly keyed SipHash.
pub struct HashStripes {
    hash_state: RandomState,
}

impl HashStripes {
    pub fn new() -> Self {
        HashStripes { hash_state: RandomState::new() }
    }
}

impl Default for HashStripes {
    fn default() -> Self {
        Self::new()
    }
}

impl StripePolicy for HashStripes {
    #[inline]
    fn stripe_hash(&self, token: &[u8]) -> u64 {
        self.hash_state.hash_one(token)
    }
}

pub struct StripedTable<P = HashStripes> {
    stripes: Vec<Mutex<FreqTable>>,
    policy: P,
}

impl StripedTable<HashStripes> {
    pub fn new(stripes: usize) -> Self {
        StripedTable::with_policy(stripes, HashStripes::new())
    }
}

impl<P: StripePolicy> StripedTable<P> {
    pub fn with_policy(stripes: usize, policy: P) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(FreqTable::new())).collect();
        StripedTable { stripes, policy }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn stripe_of(&self, token: &[u8]) -> usize {
        (self.policy.stripe_hash(token) % self.stripes.len() as u64) as usize
    }

    /// Adds `count` to `token`, creating the entry at 0 first if needed.
    pub fn add(&self, token: &Bytes, count: u64) -> Result<()> {
        let stripe = self.stripe_of(token);
        let mut shard = self.stripes[stripe]
            .lock()
            .map_err(|_| WordCountError::StripePoisoned(stripe))?;
        match shard.get_mut(&token[..]) {
            Some(total) => *total += count,
            None => {
                // own copy, so the shard does not pin the batch's line buffers
                shard.insert(Bytes::copy_from_slice(token), count);
            }
        }
        Ok(())
    }

    pub fn get(&self, token: &[u8]) -> Result<Option<u64>> {
        let stripe = self.stripe_of(token);
        let shard = self.stripes[stripe]
            .lock()
            .map_err(|_| WordCountError::StripePoisoned(stripe))?;
        Ok(shard.get(token).copied())
    }

    pub fn len(&self) -> Result<usize> {
        let mut len = 0;
        for (stripe, shard) in self.stripes.iter().enumerate() {
            len += shard.lock().map_err(|_| WordCountError::StripePoisoned(stripe))?.len();
        }
        Ok(len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Per-stripe key counts, for spotting skewed stripes.
    pub fn stripe_sizes(&self) -> Result<Vec<usize>> {
        self.stripes
            .iter()
            .enumerate()
            .map(|(stripe, shard)| {
                shard
                    .lock()
                    .map(|shard| shard.len())
                    .map_err(|_| WordCountError::StripePoisoned(stripe))
            })
            .collect()
    }

    /// Empties the table into its (token, count) entries, in no particular
    /// order. Must not race with `add`.
    pub fn drain_entries(&self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for (stripe, shard) in self.stripes.iter().enumerate() {
            let mut shard = shard.lock().map_err(|_| WordCountError::StripePoisoned(stripe))?;
            entries.extend(shard.drain());
        }
        Ok(entries)
    }
}

fn merge_owned_tables<P: StripePolicy>(
    global: &StripedTable<P>,
    locals: &[FreqTable],
    worker: usize,
    reducers: usize,
) -> Result<()> {
    for local in locals.iter().skip(worker).step_by(reducers) {
        for (word, count) in local {
            global.add(word, *count)?;
        }
    }
    Ok(())
}

/// Reduce phase for one batch: with `N = min(pool workers, locals)` reducers,
/// reducer `w` drains every local table `i` with `i % N == w` into `global`.
/// Reducers that own only empty tables are not scheduled. Returns once every
/// reducer has finished.
pub fn reduce_batch<P: StripePolicy>(
    pool: &WorkerPool,
    global: &StripedTable<P>,
    locals: &[FreqTable],
) -> Result<()> {
    let reducers = pool.workers().min(locals.len());
    if reducers == 0 {
        return Ok(());
    }

    let mut outcomes: Vec<Result<()>> = (0..reducers).map(|_| Ok(())).collect();
    let jobs: Vec<(usize, &mut Result<()>)> = outcomes
        .iter_mut()
        .enumerate()
        .filter(|(worker, _)| {
            let owned: Vec<usize> = (*worker..locals.len()).step_by(reducers).collect();
            debug!("reduce worker {} <- local tables {:?}", worker, owned);
            owned.iter().any(|&i| !locals[i].is_empty())
        })
        .collect();

    pool.scope("reduce", move |scope| {
        for (worker, outcome) in jobs {
            scope.spawn(move |_| *outcome = merge_owned_tables(global, locals, worker, reducers));
        }
    })?;

    outcomes.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread::{self, ThreadId};

    struct OneStripe;

    impl StripePolicy for OneStripe {
        fn stripe_hash(&self, _token: &[u8]) -> u64 {
            0
        }
    }

    struct FirstByte;

    impl StripePolicy for FirstByte {
        fn stripe_hash(&self, token: &[u8]) -> u64 {
            token.first().copied().unwrap_or(0) as u64
        }
    }

    fn table(words: &[(&'static str, u64)]) -> FreqTable {
        words
            .iter()
            .map(|&(w, c)| (Bytes::from_static(w.as_bytes()), c))
            .collect()
    }

    fn sorted(entries: Vec<Entry>) -> Vec<(String, u64)> {
        let mut entries: Vec<_> = entries
            .into_iter()
            .map(|(w, c)| (String::from_utf8(w.to_vec()).unwrap(), c))
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn add_creates_then_accumulates() {
        let global = StripedTable::new(4);
        global.add(&Bytes::from_static(b"word"), 2).unwrap();
        global.add(&Bytes::from_static(b"word"), 3).unwrap();
        assert_eq!(global.get(b"word").unwrap(), Some(5));
        assert_eq!(global.get(b"other").unwrap(), None);
        assert_eq!(global.len().unwrap(), 1);
    }

    #[test]
    fn inserted_keys_do_not_share_the_source_buffer() {
        let global = StripedTable::new(1);
        let line = Bytes::from(b"shared line".to_vec());
        global.add(&line.slice(0..6), 1).unwrap();
        let entries = global.drain_entries().unwrap();
        assert_ne!(entries[0].0.as_ptr(), line.as_ptr());
    }

    #[test]
    fn stripe_assignment_follows_the_policy() {
        let global = StripedTable::with_policy(3, FirstByte);
        assert_eq!(global.stripe_of(b"a"), (b'a' as usize) % 3);
        for word in ["apple", "banana", "cherry", "date"] {
            global.add(&Bytes::from_static(word.as_bytes()), 1).unwrap();
        }
        // 'c' % 3 == 0, 'a' % 3 == 'd' % 3 == 1, 'b' % 3 == 2
        assert_eq!(global.stripe_sizes().unwrap(), vec![1, 2, 1]);
    }

    #[test]
    fn forced_collisions_still_count_exactly() {
        let locals: Vec<FreqTable> = (0..8).map(|_| table(&[("hot", 1000), ("cold", 1)])).collect();
        let global = StripedTable::with_policy(4, OneStripe);
        reduce_batch(&WorkerPool::new(4).unwrap(), &global, &locals).unwrap();
        assert_eq!(global.stripe_sizes().unwrap(), vec![2, 0, 0, 0]);
        assert_eq!(global.get(b"hot").unwrap(), Some(8000));
        assert_eq!(global.get(b"cold").unwrap(), Some(8));
    }

    #[test]
    fn merge_is_invariant_under_repartitioning() {
        // the multiset: a x6, b x4, c x1, d x3
        let partitions: Vec<Vec<FreqTable>> = vec![
            vec![table(&[("a", 6), ("b", 4), ("c", 1), ("d", 3)])],
            vec![table(&[("a", 3), ("b", 4)]), table(&[("a", 3), ("c", 1), ("d", 3)])],
            vec![
                table(&[("a", 1)]),
                table(&[("a", 2), ("d", 1)]),
                table(&[]),
                table(&[("a", 3), ("b", 4), ("c", 1), ("d", 2)]),
                table(&[]),
            ],
        ];
        let expected = vec![
            ("a".to_owned(), 6),
            ("b".to_owned(), 4),
            ("c".to_owned(), 1),
            ("d".to_owned(), 3),
        ];

        for locals in &partitions {
            for workers in [1, 2, 3, 8] {
                let pool = WorkerPool::new(workers).unwrap();
                for stripes in [1, 2, 5] {
                    let global = StripedTable::new(stripes);
                    reduce_batch(&pool, &global, locals).unwrap();
                    assert_eq!(sorted(global.drain_entries().unwrap()), expected);
                }
            }
        }
    }

    #[test]
    fn global_table_persists_across_batches() {
        let pool = WorkerPool::new(2).unwrap();
        let global = StripedTable::new(2);
        let mut locals = vec![table(&[("x", 1)]), table(&[("y", 2)])];
        reduce_batch(&pool, &global, &locals).unwrap();
        for local in locals.iter_mut() {
            local.clear();
        }
        locals[1].insert(Bytes::from_static(b"x"), 5);
        reduce_batch(&pool, &global, &locals).unwrap();
        assert_eq!(sorted(global.drain_entries().unwrap()), vec![("x".to_owned(), 6), ("y".to_owned(), 2)]);
    }

    #[derive(Default)]
    struct ThreadSpy {
        threads: Mutex<HashSet<ThreadId>>,
    }

    impl StripePolicy for ThreadSpy {
        fn stripe_hash(&self, _token: &[u8]) -> u64 {
            self.threads.lock().unwrap().insert(thread::current().id());
            0
        }
    }

    #[test]
    fn reducers_run_on_the_pool_threads_only() {
        let pool = WorkerPool::new(2).unwrap();
        let global = StripedTable::with_policy(2, ThreadSpy::default());
        for _ in 0..25 {
            let locals = vec![table(&[("a", 1)]), table(&[("b", 1)])];
            reduce_batch(&pool, &global, &locals).unwrap();
        }
        let threads = global.policy.threads.lock().unwrap().clone();
        assert!(threads.len() <= 2, "saw {} reducer threads", threads.len());
        assert!(!threads.contains(&thread::current().id()));
        assert_eq!(global.get(b"a").unwrap(), Some(25));
    }

    #[test]
    fn reducers_owning_only_empty_tables_do_nothing() {
        let pool = WorkerPool::new(4).unwrap();
        let global = StripedTable::with_policy(1, ThreadSpy::default());
        let locals = vec![FreqTable::new(); 4];
        reduce_batch(&pool, &global, &locals).unwrap();
        assert!(global.policy.threads.lock().unwrap().is_empty());
        assert!(global.is_empty().unwrap());
    }

    #[test]
    fn drained_table_is_empty_and_reusable() {
        let global = StripedTable::new(3);
        global.add(&Bytes::from_static(b"once"), 2).unwrap();
        assert_eq!(global.drain_entries().unwrap().len(), 1);
        assert!(global.is_empty().unwrap());
        global.add(&Bytes::from_static(b"once"), 1).unwrap();
        assert_eq!(global.get(b"once").unwrap(), Some(1));
    }
}
