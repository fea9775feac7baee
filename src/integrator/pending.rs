use std::collections::HashMap;

use super::change::Change;

struct Blocked {
    change: Change,
    missing: usize,
}

/// Changes waiting for dependencies that have not been applied yet
#[derive(Default)]
pub struct PendingQueue {
    /// Missing dependency -> ids of the changes waiting on it
    waiting: HashMap<String, Vec<String>>,
    blocked: HashMap<String, Blocked>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `change` until every id in `missing` has been released
    pub fn enqueue(&mut self, change: Change, missing: &[String]) {
        let id = change.id().to_string();
        let mut count = 0;
        for dep in missing {
            let waiters = self.waiting.entry(dep.clone()).or_default();
            if !waiters.contains(&id) {
                waiters.push(id.clone());
                count += 1;
            }
        }
        self.blocked.insert(id, Blocked { change, missing: count });
    }

    /// Record that `applied` is now in history; returns the changes it unblocked
    pub fn release(&mut self, applied: &str) -> Vec<Change> {
        let mut ready = Vec::new();
        for id in self.waiting.remove(applied).unwrap_or_default() {
            let Some(blocked) = self.blocked.get_mut(&id) else {
                continue;
            };
            blocked.missing -= 1;
            if blocked.missing == 0 {
                if let Some(blocked) = self.blocked.remove(&id) {
                    ready.push(blocked.change);
                }
            }
        }
        ready
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocked.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Ids nothing has delivered yet that some parked change depends on
    pub fn missing(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.waiting.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::{Mutation, Operation};

    fn change(id: &str, deps: &[&str]) -> Change {
        Mutation::new(
            id,
            "s",
            deps.iter().map(|d| d.to_string()).collect(),
            Operation::NoOp,
        )
        .into()
    }

    #[test]
    fn test_released_after_all_dependencies() {
        let mut queue = PendingQueue::new();
        let c = change("c", &["a", "b"]);
        queue.enqueue(c.clone(), &["a".to_string(), "b".to_string(), "a".to_string()]);
        assert!(queue.contains("c"));
        assert_eq!(queue.missing(), vec!["a".to_string(), "b".to_string()]);

        assert!(queue.release("a").is_empty());
        assert_eq!(queue.release("b"), vec![c]);
        assert!(queue.is_empty());
        assert!(queue.release("b").is_empty());
    }
}
