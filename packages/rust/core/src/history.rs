//! Bounded in-memory log of recent processing results.

use std::collections::VecDeque;

use firmscope_shared::ProcessingResult;

/// Most recent results, oldest first. Pushing past capacity evicts the oldest.
#[derive(Debug, Clone)]
pub struct ResultHistory {
    entries: VecDeque<ProcessingResult>,
    capacity: usize,
}

impl ResultHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, result: ProcessingResult) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(result);
    }

    /// Snapshot of every retained result, oldest first.
    pub fn list(&self) -> Vec<ProcessingResult> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&ProcessingResult> {
        self.entries.back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn failed(url: &str) -> ProcessingResult {
        ProcessingResult::failed(url, "boom", None, Duration::ZERO)
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut history = ResultHistory::new(2);
        history.push(failed("https://a.example"));
        history.push(failed("https://b.example"));
        history.push(failed("https://c.example"));

        let urls: Vec<String> = history.list().iter().map(|r| r.url().to_string()).collect();
        assert_eq!(urls, vec!["https://b.example", "https://c.example"]);
        assert_eq!(history.latest().map(|r| r.url()), Some("https://c.example"));
    }

    #[test]
    fn clear_empties() {
        let mut history = ResultHistory::new(5);
        history.push(failed("https://a.example"));
        history.clear();
        assert!(history.is_empty());
        assert!(history.latest().is_none());
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut history = ResultHistory::new(0);
        history.push(failed("https://a.example"));
        assert_eq!(history.len(), 0);
    }
}
