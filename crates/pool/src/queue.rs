//! Bucketed priority queue.
//!
//! Items are kept in a fixed number of FIFO buckets. Bucket `0` is the most
//! urgent; [`PriorityQueue::dequeue`] always serves the first non-empty
//! bucket, oldest item first.
//!
//! There is no aging: a steady stream of priority-0 items starves every
//! lower tier. Callers that need fairness across tiers must pick priorities
//! accordingly.

use std::collections::VecDeque;

/// FIFO-within-priority queue with a fixed bucket count.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T> {
    buckets: Vec<VecDeque<T>>,
    len: usize,
}

impl<T> PriorityQueue<T> {
    /// Create a queue with `bucket_count` priority levels (at least one).
    #[must_use]
    pub fn new(bucket_count: usize) -> Self {
        let bucket_count = bucket_count.max(1);
        Self {
            buckets: (0..bucket_count).map(|_| VecDeque::new()).collect(),
            len: 0,
        }
    }

    /// Number of priority levels.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of queued items across all buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no item is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `item` to the bucket for `priority`.
    ///
    /// Priorities beyond the last bucket are clamped into it.
    pub fn enqueue(&mut self, item: T, priority: usize) {
        let last = self.buckets.len() - 1;
        self.buckets[priority.min(last)].push_back(item);
        self.len += 1;
    }

    /// Remove and return the oldest item of the most urgent non-empty bucket.
    pub fn dequeue(&mut self) -> Option<T> {
        let item = self
            .buckets
            .iter_mut()
            .find(|bucket| !bucket.is_empty())
            .and_then(VecDeque::pop_front)?;
        self.len -= 1;
        Some(item)
    }

    /// Keep only the items for which `keep` returns `true`.
    ///
    /// Survivors keep their relative order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&T) -> bool,
    {
        for bucket in &mut self.buckets {
            bucket.retain(|item| keep(item));
        }
        self.len = self.buckets.iter().map(VecDeque::len).sum();
    }

    /// Remove every item, yielding them in dequeue order.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + use<T> {
        let empty = (0..self.buckets.len()).map(|_| VecDeque::new()).collect();
        self.len = 0;
        std::mem::replace(&mut self.buckets, empty)
            .into_iter()
            .flatten()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_queue_dequeues_none() {
        let mut queue: PriorityQueue<u32> = PriorityQueue::new(3);
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn zero_buckets_is_clamped_to_one() {
        let mut queue = PriorityQueue::new(0);
        assert_eq!(queue.bucket_count(), 1);
        queue.enqueue("a", 7);
        assert_eq!(queue.dequeue(), Some("a"));
    }

    #[test]
    fn lower_priority_number_is_served_first() {
        let mut queue = PriorityQueue::new(3);
        queue.enqueue("low", 2);
        queue.enqueue("mid", 1);
        queue.enqueue("high", 0);

        assert_eq!(queue.dequeue(), Some("high"));
        assert_eq!(queue.dequeue(), Some("mid"));
        assert_eq!(queue.dequeue(), Some("low"));
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = PriorityQueue::new(2);
        for i in 0..5 {
            queue.enqueue(i, 1);
        }
        let out: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(3, 3)]
    #[case(4, 4)]
    #[case(5, 4)]
    #[case(usize::MAX, 4)]
    fn priority_is_clamped_into_range(#[case] priority: usize, #[case] bucket: usize) {
        let mut queue = PriorityQueue::new(5);
        queue.enqueue("item", priority);
        assert_eq!(queue.buckets[bucket].len(), 1);
    }

    #[test]
    fn len_tracks_enqueue_and_dequeue() {
        let mut queue = PriorityQueue::new(4);
        queue.enqueue('a', 3);
        queue.enqueue('b', 0);
        queue.enqueue('c', 2);
        assert_eq!(queue.len(), 3);

        queue.dequeue();
        assert_eq!(queue.len(), 2);
        queue.dequeue();
        queue.dequeue();
        queue.dequeue();
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn retain_preserves_order_and_len() {
        let mut queue = PriorityQueue::new(2);
        for i in 0..6 {
            queue.enqueue(i, i % 2);
        }
        queue.retain(|i| *i != 2 && *i != 3);
        assert_eq!(queue.len(), 4);

        let out: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(out, vec![0, 4, 1, 5]);
    }

    #[test]
    fn drain_yields_dequeue_order() {
        let mut queue = PriorityQueue::new(3);
        queue.enqueue("c", 2);
        queue.enqueue("a1", 0);
        queue.enqueue("b", 1);
        queue.enqueue("a2", 0);

        let out: Vec<_> = queue.drain().collect();
        assert_eq!(out, vec!["a1", "a2", "b", "c"]);
        assert!(queue.is_empty());
        assert_eq!(queue.dequeue(), None);
    }
}
