use std::cmp::Ordering;
use std::iter::Peekable;

use log::debug;

use crate::error::Result;
use crate::pool::WorkerPool;
use crate::util::Entry;

/// Below this many elements a range is sorted on the current thread.
pub const SEQUENTIAL_THRESHOLD: usize = 8192;

/// Fork-join merge sort. Each split forks both halves onto the worker pool
/// until `max_depth` splits deep, so at most `2^max_depth` ranges are sorted
/// concurrently; deeper ranges and small ranges use `sort_unstable_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelSorter {
    max_depth: usize,
    sequential_threshold: usize,
}

impl ParallelSorter {
    /// Sized for `workers` threads: `max_depth = ceil(log2(workers))`.
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let max_depth = (usize::BITS - (workers - 1).leading_zeros()) as usize;
        ParallelSorter {
            max_depth,
            sequential_threshold: SEQUENTIAL_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, sequential_threshold: usize) -> Self {
        self.sequential_threshold = sequential_threshold.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Sorts `items` with the forks running on `pool`.
    pub fn sort_by<T, F>(&self, pool: &WorkerPool, items: Vec<T>, compare: &F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&T, &T) -> Ordering + Sync,
    {
        debug!(
            "sorting {} entries, depth cap {}, sequential below {}",
            items.len(),
            self.max_depth,
            self.sequential_threshold
        );
        pool.install("sort", || self.sort_level(items, compare, 0))
    }

    fn sort_level<T, F>(&self, mut items: Vec<T>, compare: &F, depth: usize) -> Vec<T>
    where
        T: Send,
        F: Fn(&T, &T) -> Ordering + Sync,
    {
        if depth >= self.max_depth || items.len() <= self.sequential_threshold {
            items.sort_unstable_by(compare);
            return items;
        }

        let right = items.split_off(items.len() / 2);
        let left = items;
        let (left, right) = rayon::join(
            || self.sort_level(left, compare, depth + 1),
            || self.sort_level(right, compare, depth + 1),
        );
        merge(left, right, compare)
    }
}

fn take_next<T, I, F>(left: &mut Peekable<I>, right: &mut Peekable<I>, compare: &F) -> Option<T>
where
    I: Iterator<Item = T>,
    F: Fn(&T, &T) -> Ordering,
{
    let from_left = match (left.peek(), right.peek()) {
        (Some(l), Some(r)) => compare(l, r) != Ordering::Greater,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if from_left {
        left.next()
    } else {
        right.next()
    }
}

/// Merges two sorted runs into a fresh buffer.
fn merge<T, F>(left: Vec<T>, right: Vec<T>, compare: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let Some(item) = take_next(&mut left, &mut right, compare) {
        merged.push(item);
    }
    merged
}

/// Ascending by token bytes.
pub fn alphabetical(a: &Entry, b: &Entry) -> Ordering {
    a.0.cmp(&b.0)
}

/// Descending by count; equal counts ascending by token.
pub fn by_frequency(a: &Entry, b: &Entry) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::thread;

    use bytes::Bytes;

    fn entry(word: &'static str, count: u64) -> Entry {
        (Bytes::from_static(word.as_bytes()), count)
    }

    // small deterministic LCG so the test data does not depend on a rng crate
    fn pseudo_random(n: usize, seed: u64) -> Vec<u64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                state >> 33
            })
            .collect()
    }

    #[test]
    fn depth_cap_is_ceil_log2_of_workers() {
        assert_eq!(ParallelSorter::new(0).max_depth(), 0);
        assert_eq!(ParallelSorter::new(1).max_depth(), 0);
        assert_eq!(ParallelSorter::new(2).max_depth(), 1);
        assert_eq!(ParallelSorter::new(3).max_depth(), 2);
        assert_eq!(ParallelSorter::new(4).max_depth(), 2);
        assert_eq!(ParallelSorter::new(5).max_depth(), 3);
        assert_eq!(ParallelSorter::new(16).max_depth(), 4);
    }

    #[test]
    fn sorts_like_std_for_every_worker_count() {
        let data = pseudo_random(10_000, 42);
        let mut expected = data.clone();
        expected.sort();

        for workers in [1, 2, 3, 8, 64] {
            let pool = WorkerPool::new(workers).unwrap();
            for threshold in [1, 7, 1000, SEQUENTIAL_THRESHOLD] {
                let sorter = ParallelSorter::new(workers).with_threshold(threshold);
                let sorted = sorter.sort_by(&pool, data.clone(), &|a: &u64, b: &u64| a.cmp(b)).unwrap();
                assert_eq!(sorted, expected, "workers={} threshold={}", workers, threshold);
            }
        }
    }

    #[test]
    fn handles_empty_and_tiny_inputs() {
        let pool = WorkerPool::new(8).unwrap();
        let sorter = ParallelSorter::new(8).with_threshold(1);
        let cmp = |a: &u64, b: &u64| a.cmp(b);
        assert!(sorter.sort_by(&pool, Vec::new(), &cmp).unwrap().is_empty());
        assert_eq!(sorter.sort_by(&pool, vec![3], &cmp).unwrap(), vec![3]);
        assert_eq!(sorter.sort_by(&pool, vec![2, 1], &cmp).unwrap(), vec![1, 2]);
    }

    #[test]
    fn comparator_drives_the_order() {
        let pool = WorkerPool::new(4).unwrap();
        let sorter = ParallelSorter::new(4).with_threshold(2);
        let data = pseudo_random(1000, 7);
        let sorted = sorter.sort_by(&pool, data, &|a: &u64, b: &u64| b.cmp(a)).unwrap();
        assert!(sorted.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn frequency_ties_break_on_ascending_token() {
        let entries = vec![entry("pear", 2), entry("apple", 5), entry("fig", 2), entry("kiwi", 9), entry("date", 2)];
        let pool = WorkerPool::new(4).unwrap();
        let sorter = ParallelSorter::new(4).with_threshold(1);

        let by_count = sorter.sort_by(&pool, entries.clone(), &by_frequency).unwrap();
        assert_eq!(
            by_count,
            vec![entry("kiwi", 9), entry("apple", 5), entry("date", 2), entry("fig", 2), entry("pear", 2)]
        );

        let by_word = sorter.sort_by(&pool, entries, &alphabetical).unwrap();
        assert_eq!(
            by_word,
            vec![entry("apple", 5), entry("date", 2), entry("fig", 2), entry("kiwi", 9), entry("pear", 2)]
        );
    }

    #[test]
    fn alphabetical_compares_raw_bytes() {
        // high-bit bytes sort after every ASCII letter
        assert_eq!(alphabetical(&entry("zebra", 1), &entry("äpfel", 1)), Ordering::Less);
        assert_eq!(alphabetical(&entry("ab", 1), &entry("abc", 1)), Ordering::Less);
    }

    #[test]
    fn forks_stay_on_the_pool() {
        let pool = WorkerPool::new(3).unwrap();
        let sorter = ParallelSorter::new(3).with_threshold(16);
        let seen = Mutex::new(HashSet::new());
        let cmp = |a: &u64, b: &u64| {
            seen.lock().unwrap().insert(thread::current().id());
            a.cmp(b)
        };
        let sorted = sorter.sort_by(&pool, pseudo_random(2000, 3), &cmp).unwrap();
        assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
        let seen = seen.into_inner().unwrap();
        assert!(seen.len() <= 3, "saw {} threads", seen.len());
        assert!(!seen.contains(&thread::current().id()));
    }
}
