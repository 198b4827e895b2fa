//! Fixed-capacity rolling history of status samples

use std::collections::VecDeque;

/// Keeps the most recent `capacity` samples, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// A zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent() {
        let mut history = History::new(20);
        for i in 0..25u64 {
            history.push(i);
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.iter().next(), Some(&5));
        assert_eq!(history.latest(), Some(&24));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut history = History::new(0);
        history.push(1.5);
        history.push(2.5);
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2.5]);
    }
}
