//! Fixed-capacity FIFO used for smoothing.

use std::collections::VecDeque;

/// Bounded FIFO: pushing onto a full window evicts the oldest element.
///
/// The length never exceeds the capacity. The same container smooths angle,
/// time and piston length.
#[derive(Debug, Clone, PartialEq)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `value`, returning the evicted element when the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        evicted
    }

    /// Oldest retained element.
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Newest retained element.
    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Number of retained elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the window holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the window holds `capacity` elements.
    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Maximum number of retained elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every element.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Copy> SlidingWindow<T> {
    /// `(oldest, newest)` pair, if the window holds at least two elements.
    pub fn span(&self) -> Option<(T, T)> {
        if self.items.len() < 2 {
            return None;
        }
        Some((*self.items.front()?, *self.items.back()?))
    }
}
