use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The heads of the applied history: entries nothing else depends on yet
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frontier {
    heads: BTreeSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an applied entry: its dependencies stop being heads, it becomes one
    pub fn add(&mut self, id: &str, dependencies: &[String]) {
        for dep in dependencies {
            self.heads.remove(dep);
        }
        self.heads.insert(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.heads.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.heads.iter()
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Heads in sorted order, ready to become the dependencies of a new blob
    pub fn to_vec(&self) -> Vec<String> {
        self.heads.iter().cloned().collect()
    }
}

impl FromIterator<String> for Frontier {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            heads: iter.into_iter().collect(),
        }
    }
}
