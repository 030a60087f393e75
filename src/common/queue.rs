use std::collections::VecDeque;

/// Reference to the tree node holding a queued value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueHandle(usize);

#[derive(Debug, Default)]
struct QueueNode {
    key: u32,
    parent: Option<usize>,
    left: Option<usize>,
    // Doubles as the free-list link while the node is pooled.
    right: Option<usize>,
    values: VecDeque<u32>,
}

/// Min-priority queue over `u32` keys.
///
/// An unbalanced binary search tree with one node per distinct key; values
/// sharing a key are kept in insertion order inside that node. The leftmost
/// node is cached, so popping from a non-empty bucket is O(1) and inserts near
/// the current minimum avoid a walk from the root. Tree nodes live in an arena
/// and are recycled through a free list, so a warmed-up queue does not
/// allocate.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    nodes: Vec<QueueNode>,
    root: Option<usize>,
    leftmost: Option<usize>,
    free: Option<usize>,
    live: usize,
    len: usize,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued values.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Tree nodes currently holding values.
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    /// Tree nodes ever allocated, live or pooled.
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn peek_min_key(&self) -> Option<u32> {
        self.leftmost.map(|node| self.nodes[node].key)
    }

    pub fn push(&mut self, key: u32, value: u32) -> QueueHandle {
        let Some(node) = self.leftmost else {
            let node = self.acquire(key, value, None);
            self.root = Some(node);
            self.leftmost = Some(node);
            return QueueHandle(node);
        };

        let min_key = self.nodes[node].key;
        if key == min_key {
            self.nodes[node].values.push_back(value);
            self.len += 1;
            return QueueHandle(node);
        }
        if key < min_key {
            let new_node = self.acquire(key, value, Some(node));
            self.nodes[node].left = Some(new_node);
            self.leftmost = Some(new_node);
            return QueueHandle(new_node);
        }

        // Keys between the minimum and its parent can only live in the
        // minimum's right subtree.
        let start = match self.nodes[node].parent {
            Some(parent) if key >= self.nodes[parent].key => self.root.unwrap_or(node),
            _ => node,
        };
        self.push_from(start, key, value)
    }

    fn push_from(&mut self, mut node: usize, key: u32, value: u32) -> QueueHandle {
        loop {
            let current = &self.nodes[node];
            if current.key == key {
                self.nodes[node].values.push_back(value);
                self.len += 1;
                return QueueHandle(node);
            }

            let go_right = current.key < key;
            let next = if go_right { current.right } else { current.left };
            match next {
                Some(next) => node = next,
                None => {
                    let new_node = self.acquire(key, value, Some(node));
                    if go_right {
                        self.nodes[node].right = Some(new_node);
                    } else {
                        self.nodes[node].left = Some(new_node);
                    }
                    return QueueHandle(new_node);
                }
            }
        }
    }

    /// Removes the oldest value with the smallest key.
    pub fn pop(&mut self) -> Option<(u32, u32)> {
        let node = self.leftmost?;
        let value = self.nodes[node].values.pop_front()?;
        let key = self.nodes[node].key;
        self.len -= 1;

        if self.nodes[node].values.is_empty() {
            let parent = self.nodes[node].parent;
            let right = self.nodes[node].right;
            match parent {
                None => self.root = right,
                Some(parent) => self.nodes[parent].left = right,
            }
            match right {
                None => self.leftmost = parent,
                Some(right) => {
                    self.nodes[right].parent = parent;
                    self.leftmost = Some(self.min_from(right));
                }
            }
            self.release(node);
        }

        Some((key, value))
    }

    /// Moves `value` from the bucket behind `handle` to `key`.
    pub fn decrease_key(&mut self, handle: QueueHandle, key: u32, value: u32) -> QueueHandle {
        self.remove(handle, value);
        self.push(key, value)
    }

    /// Removes `value` from the bucket behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not queued under `handle`.
    pub fn remove(&mut self, handle: QueueHandle, value: u32) {
        let node = handle.0;
        let position = self.nodes[node].values.iter().position(|&v| v == value);
        let Some(position) = position else {
            panic!(
                "value {value} is not queued under key {}",
                self.nodes[node].key
            );
        };

        self.nodes[node].values.remove(position);
        self.len -= 1;
        if self.nodes[node].values.is_empty() {
            self.unlink(node);
        }
    }

    /// Returns every tree node to the pool.
    pub fn clear(&mut self) {
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(node) = stack.pop() {
            stack.extend(self.nodes[node].left);
            stack.extend(self.nodes[node].right);
            self.release(node);
        }
        self.root = None;
        self.leftmost = None;
        self.len = 0;
    }

    // Standard BST deletion; a node with two children is replaced by its
    // in-order predecessor.
    fn unlink(&mut self, node: usize) {
        let QueueNode {
            parent,
            left,
            right,
            ..
        } = self.nodes[node];

        let replacement = match (left, right) {
            (None, None) => None,
            (Some(left), None) => Some(left),
            (None, Some(right)) => Some(right),
            (Some(left), Some(right)) => {
                let mut max = left;
                while let Some(next) = self.nodes[max].right {
                    max = next;
                }

                self.nodes[max].right = Some(right);
                self.nodes[right].parent = Some(max);

                if max != left {
                    let max_left = self.nodes[max].left;
                    if let Some(max_parent) = self.nodes[max].parent {
                        self.nodes[max_parent].right = max_left;
                        if let Some(max_left) = max_left {
                            self.nodes[max_left].parent = Some(max_parent);
                        }
                    }
                    self.nodes[max].left = Some(left);
                    self.nodes[left].parent = Some(max);
                }
                Some(max)
            }
        };

        match parent {
            None => self.root = replacement,
            Some(parent) => {
                if self.nodes[parent].left == Some(node) {
                    self.nodes[parent].left = replacement;
                } else {
                    self.nodes[parent].right = replacement;
                }
            }
        }
        if let Some(replacement) = replacement {
            self.nodes[replacement].parent = parent;
        }

        if self.leftmost == Some(node) {
            self.leftmost = match replacement {
                None => parent,
                Some(replacement) => Some(self.min_from(replacement)),
            };
        }

        self.release(node);
    }

    fn min_from(&self, mut node: usize) -> usize {
        while let Some(left) = self.nodes[node].left {
            node = left;
        }
        node
    }

    fn acquire(&mut self, key: u32, value: u32, parent: Option<usize>) -> usize {
        let node = match self.free {
            Some(node) => {
                self.free = self.nodes[node].right;
                node
            }
            None => {
                self.nodes.push(QueueNode::default());
                self.nodes.len() - 1
            }
        };

        let slot = &mut self.nodes[node];
        slot.key = key;
        slot.parent = parent;
        slot.left = None;
        slot.right = None;
        slot.values.push_back(value);
        self.live += 1;
        self.len += 1;
        node
    }

    fn release(&mut self, node: usize) {
        let slot = &mut self.nodes[node];
        slot.values.clear();
        slot.parent = None;
        slot.left = None;
        slot.right = self.free;
        self.free = Some(node);
        self.live -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::BTreeMap;

    fn drain(queue: &mut PriorityQueue) -> Vec<(u32, u32)> {
        std::iter::from_fn(|| queue.pop()).collect()
    }

    #[test]
    fn test_pop_orders_by_key_then_insertion() {
        let mut queue = PriorityQueue::new();
        queue.push(30, 1);
        queue.push(10, 2);
        queue.push(20, 3);
        queue.push(10, 4);
        queue.push(25, 5);
        queue.push(10, 6);

        assert_eq!(queue.len(), 6);
        assert_eq!(queue.live_nodes(), 4);
        assert_eq!(queue.peek_min_key(), Some(10));
        assert_eq!(
            drain(&mut queue),
            vec![(10, 2), (10, 4), (10, 6), (20, 3), (25, 5), (30, 1)]
        );
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), None);
        assert_eq!(queue.live_nodes(), 0);
    }

    #[test]
    fn test_decrease_key_is_seen_by_next_pop() {
        let mut queue = PriorityQueue::new();
        queue.push(10, 1);
        let handle = queue.push(50, 2);
        queue.push(40, 3);

        queue.decrease_key(handle, 5, 2);
        assert_eq!(queue.pop(), Some((5, 2)));
        assert_eq!(queue.pop(), Some((10, 1)));
        assert_eq!(queue.pop(), Some((40, 3)));
    }

    #[test]
    fn test_remove_node_with_two_children() {
        let mut queue = PriorityQueue::new();
        // Tree: 50 -> (30 -> (20, 40 -> 35), 70)
        let root = queue.push(50, 0);
        queue.push(30, 1);
        queue.push(70, 2);
        queue.push(20, 3);
        queue.push(40, 4);
        queue.push(35, 5);

        queue.remove(root, 0);
        assert_eq!(queue.live_nodes(), 5);
        assert_eq!(
            drain(&mut queue),
            vec![(20, 3), (30, 1), (35, 5), (40, 4), (70, 2)]
        );
    }

    #[test]
    fn test_remove_leftmost_moves_minimum() {
        let mut queue = PriorityQueue::new();
        queue.push(50, 0);
        let min = queue.push(10, 1);
        queue.push(20, 2);
        queue.push(15, 3);

        queue.remove(min, 1);
        assert_eq!(queue.peek_min_key(), Some(15));
        assert_eq!(drain(&mut queue), vec![(15, 3), (20, 2), (50, 0)]);
    }

    #[test]
    fn test_remove_keeps_bucket_with_remaining_values() {
        let mut queue = PriorityQueue::new();
        let handle = queue.push(7, 1);
        queue.push(7, 2);
        queue.remove(handle, 1);
        assert_eq!(queue.live_nodes(), 1);
        assert_eq!(queue.pop(), Some((7, 2)));
    }

    #[test]
    #[should_panic(expected = "is not queued")]
    fn test_remove_missing_value_panics() {
        let mut queue = PriorityQueue::new();
        let handle = queue.push(7, 1);
        queue.remove(handle, 2);
    }

    #[test]
    fn test_clear_recycles_nodes() {
        let mut queue = PriorityQueue::new();
        for round in 0..3 {
            for value in 0..100 {
                queue.push(value * 7 % 31, value + round);
            }
            assert_eq!(queue.live_nodes(), 31);
            queue.clear();
            assert!(queue.is_empty());
            assert_eq!(queue.live_nodes(), 0);
            assert_eq!(queue.allocated_nodes(), 31);
        }
    }

    #[test]
    fn test_matches_ordered_map_under_random_operations() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut queue = PriorityQueue::new();
        let mut handles: Vec<Option<(QueueHandle, u32)>> = vec![None; 200];
        let mut reference: BTreeMap<(u32, u32), ()> = BTreeMap::new();

        for _ in 0..5000 {
            let value = rng.gen_range(0..200u32);
            match rng.gen_range(0..4) {
                0 | 1 => {
                    if handles[value as usize].is_none() {
                        let key = rng.gen_range(0..60);
                        let handle = queue.push(key, value);
                        handles[value as usize] = Some((handle, key));
                        reference.insert((key, value), ());
                    }
                }
                2 => {
                    if let Some((handle, key)) = handles[value as usize] {
                        let new_key = rng.gen_range(0..=key);
                        let handle = queue.decrease_key(handle, new_key, value);
                        handles[value as usize] = Some((handle, new_key));
                        reference.remove(&(key, value));
                        reference.insert((new_key, value), ());
                    }
                }
                _ => {
                    let popped = queue.pop();
                    let expected_key = reference.keys().next().map(|&(key, _)| key);
                    assert_eq!(popped.map(|(key, _)| key), expected_key);
                    if let Some((key, value)) = popped {
                        assert!(reference.remove(&(key, value)).is_some());
                        handles[value as usize] = None;
                    }
                }
            }
            assert_eq!(queue.len(), reference.len());
        }
    }
}
