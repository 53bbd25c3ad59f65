use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::Block;

/// Min-priority queue of blocks ordered by rank, ties broken by insertion order.
#[derive(Default)]
pub struct BlockQueue {
    heap: BinaryHeap<QueuedBlock>,
    pushed: u64,
}

struct QueuedBlock {
    seq: u64,
    block: Block,
}

impl QueuedBlock {
    fn key_cmp(&self, other: &QueuedBlock) -> Ordering {
        self.block.rank.total_cmp(&other.block.rank).then(self.seq.cmp(&other.seq))
    }
}

// BinaryHeap is a max-heap, so the comparison is reversed.
impl Ord for QueuedBlock {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key_cmp(self)
    }
}

impl PartialOrd for QueuedBlock {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedBlock {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedBlock {}

impl BlockQueue {
    pub fn new() -> BlockQueue {
        BlockQueue::default()
    }

    pub fn push(&mut self, block: Block) {
        let seq = self.pushed;
        self.pushed += 1;
        self.heap.push(QueuedBlock { seq, block });
    }

    pub fn pop(&mut self) -> Option<Block> {
        self.heap.pop().map(|qb| qb.block)
    }

    pub fn peek(&self) -> Option<&Block> {
        self.heap.peek().map(|qb| &qb.block)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop every block, lowest rank first.
    pub fn drain(&mut self) -> impl Iterator<Item = Block> + '_ {
        std::iter::from_fn(move || self.pop())
    }
}
