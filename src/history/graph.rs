use std::collections::HashSet;

use super::frontier::Frontier;

/// Walks applied history newest-first to find where an incoming blob's
/// causal past and the local history diverge.
///
/// `known` is the incoming blob's causal closure as discovered so far.
/// `open` holds entries reachable from the local heads that have not been
/// visited and are not known. Once `open` is empty, everything older than the
/// walk is shared history.
#[derive(Debug, Default)]
pub struct HistoryGraph {
    known: HashSet<String>,
    open: HashSet<String>,
}

impl HistoryGraph {
    pub fn new(frontier: &Frontier, dependencies: &[String]) -> Self {
        let known: HashSet<String> = dependencies.iter().cloned().collect();
        let open = frontier
            .iter()
            .filter(|head| !known.contains(*head))
            .cloned()
            .collect();
        Self { known, open }
    }

    /// True once the walk has reached shared history
    pub fn test(&self) -> bool {
        self.open.is_empty()
    }

    /// Visit the next entry, newest first. Returns true if the entry is part
    /// of the incoming blob's causal past, false if it is foreign to it.
    pub fn substitute(&mut self, id: &str, dependencies: &[String]) -> bool {
        if self.known.contains(id) {
            for dep in dependencies {
                self.open.remove(dep);
                self.known.insert(dep.clone());
            }
            return true;
        }

        self.open.remove(id);
        for dep in dependencies {
            if !self.known.contains(dep) {
                self.open.insert(dep.clone());
            }
        }
        false
    }
}
