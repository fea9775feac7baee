//! Applied history of a document
//!
//! History is append-only. Entries are numbered in the order this site
//! applied them, starting at 1; the numbering is local and differs between
//! sites.

mod frontier;
mod graph;

pub use frontier::Frontier;
pub use graph::HistoryGraph;

use std::collections::HashMap;

/// An entry of a causal history
pub trait Causal {
    fn id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

/// Local sequence number of an applied entry
pub type Seq = u64;

#[derive(Clone, Debug)]
pub struct History<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Causal> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an applied entry and return its sequence number
    pub fn push(&mut self, entry: T) -> Seq {
        self.index.insert(entry.id().to_string(), self.entries.len());
        self.entries.push(entry);
        self.entries.len() as Seq
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn seq_of(&self, id: &str) -> Option<Seq> {
        self.index.get(id).map(|&i| i as Seq + 1)
    }

    /// Oldest first
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// All entries, oldest first
    pub fn as_slice(&self) -> &[T] {
        &self.entries
    }

    /// Newest first
    pub fn iter_rev(&self) -> std::iter::Rev<std::slice::Iter<'_, T>> {
        self.entries.iter().rev()
    }

    /// Entries applied at sequence `seq` or later, oldest first
    pub fn since(&self, seq: Seq) -> &[T] {
        let start = (seq.saturating_sub(1) as usize).min(self.entries.len());
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Entry(&'static str, Vec<String>);

    impl Causal for Entry {
        fn id(&self) -> &str {
            self.0
        }

        fn dependencies(&self) -> &[String] {
            &self.1
        }
    }

    #[test]
    fn test_sequence_numbers() {
        let mut history = History::new();
        assert_eq!(history.push(Entry("a", vec![])), 1);
        assert_eq!(history.push(Entry("b", vec!["a".into()])), 2);
        assert_eq!(history.push(Entry("c", vec!["b".into()])), 3);

        assert!(history.contains("b"));
        assert_eq!(history.seq_of("c"), Some(3));
        assert_eq!(history.get("b").unwrap().dependencies(), &["a".to_string()]);

        let ids: Vec<&str> = history.since(2).iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(history.since(0).len(), 3);
        assert_eq!(history.as_slice().len(), 3);
        assert!(history.since(9).is_empty());

        let newest: Vec<&str> = history.iter_rev().map(|e| e.id()).collect();
        assert_eq!(newest, vec!["c", "b", "a"]);
    }
}
