use std::collections::HashSet;

use super::change::Change;
use crate::history::Causal;
use crate::ot::Mutation;

/// A change as recorded in the applied history
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// The change in the form it was applied here
    pub change: Change,
    lost: Option<Lost>,
}

/// Kept for entries that lost part of themselves to a concurrent
/// replacement, so they can be rebuilt when that replacement is rolled back
#[derive(Clone, Debug, PartialEq)]
pub(super) struct Lost {
    /// The change as received
    pub(super) original: Change,
    /// Entries it was rebased over
    pub(super) foreign: HashSet<String>,
}

impl Entry {
    pub fn new(change: Change) -> Self {
        Self { change, lost: None }
    }

    pub(super) fn partial(change: Change, original: Change, foreign: HashSet<String>) -> Self {
        Self {
            change,
            lost: Some(Lost { original, foreign }),
        }
    }

    pub fn id(&self) -> &str {
        self.change.id()
    }

    pub fn dependencies(&self) -> &[String] {
        self.change.dependencies()
    }

    /// Whether rebasing dropped part of the change as received
    pub fn is_partial(&self) -> bool {
        self.lost.is_some()
    }

    pub fn mutation(&self) -> Option<&Mutation> {
        match &self.change {
            Change::Mutation(m) => Some(m),
            Change::Permission(_) => None,
        }
    }

    pub(super) fn lost(&self) -> Option<&Lost> {
        self.lost.as_ref()
    }
}

impl Causal for Entry {
    fn id(&self) -> &str {
        Entry::id(self)
    }

    fn dependencies(&self) -> &[String] {
        Entry::dependencies(self)
    }
}
