//! Rebasing a change over the part of history it has not seen
//!
//! Entries the change has seen are pruned free of the foreign ones, and the
//! change is transformed past what was pruned out. Pruning cannot bring back
//! what a concurrent replacement dropped, so an entry that lost part of
//! itself is instead rebuilt from the change as received.

use std::collections::HashSet;

use super::change::Change;
use super::entry::{Entry, Lost};
use crate::history::History;
use crate::ot::{prune_seq, OtError, Prunable};

/// Applied history as some change saw it: the first `base` entries of
/// `history` followed by `tail`
pub(super) struct Frame<'a> {
    history: &'a History<Entry>,
    base: usize,
    tail: Vec<Entry>,
}

impl<'a> Frame<'a> {
    pub(super) fn new(history: &'a History<Entry>) -> Self {
        Self {
            history,
            base: history.len(),
            tail: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.base + self.tail.len()
    }

    fn get(&self, index: usize) -> Option<&Entry> {
        if index < self.base {
            self.history.as_slice().get(index)
        } else {
            self.tail.get(index - self.base)
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        match self.history.seq_of(id) {
            Some(seq) if seq as usize <= self.base => Some(seq as usize - 1),
            _ => self
                .tail
                .iter()
                .position(|entry| entry.id() == id)
                .map(|i| self.base + i),
        }
    }

    /// The first `len` entries followed by `extra`
    fn prefix_with(&self, len: usize, extra: &[Entry]) -> Frame<'a> {
        let mut tail = self.tail[..len.saturating_sub(self.base)].to_vec();
        tail.extend_from_slice(extra);
        Frame {
            history: self.history,
            base: len.min(self.base),
            tail,
        }
    }
}

/// A change rebased onto a frame
#[derive(Debug)]
pub(super) struct Rebased {
    pub(super) change: Change,
    /// Part of the change was dropped on the way
    pub(super) partial: bool,
}

/// Rebase `change` past the entries of `frame` listed in `foreign`.
pub(super) fn rebase(frame: &Frame<'_>, change: &Change, foreign: &HashSet<String>) -> Result<Rebased, OtError> {
    let Some(start) = foreign.iter().filter_map(|id| frame.position(id)).min() else {
        return Ok(Rebased {
            change: change.clone(),
            partial: false,
        });
    };

    let mut rebased = change.clone();
    let mut partial = false;
    for gone in prune_window(frame, start, foreign)? {
        partial |= rebased.discards(&gone);
        rebased = rebased.transform(&gone)?;
    }
    Ok(Rebased {
        change: rebased,
        partial,
    })
}

/// Take the `foreign` entries out of `frame[start..]`. Returns them oldest
/// first, each applying after the retained entries and the removed ones
/// before it.
fn prune_window(frame: &Frame<'_>, start: usize, foreign: &HashSet<String>) -> Result<Vec<Change>, OtError> {
    let window: Vec<&Entry> = (start..frame.len()).filter_map(|i| frame.get(i)).collect();

    if window
        .iter()
        .all(|entry| !entry.is_partial() || foreign.contains(entry.id()))
    {
        let changes: Vec<Change> = window.iter().map(|entry| entry.change.clone()).collect();
        return Ok(prune_seq(&changes, foreign)?.removed);
    }

    let mut retained: Vec<Entry> = Vec::with_capacity(window.len());
    let mut removed: Vec<Change> = Vec::new();
    for entry in window {
        if foreign.contains(entry.id()) {
            removed.push(entry.change.clone());
            continue;
        }

        let kept = match entry.lost() {
            None => {
                let mut current = entry.change.clone();
                for gone in removed.iter_mut().rev() {
                    let (stripped, advanced) = current.prune(gone)?;
                    current = stripped;
                    *gone = advanced;
                }
                Entry::new(current)
            }
            Some(lost) => {
                let kept = rebuild(&frame.prefix_with(start, &retained), lost)?;
                let mut current = kept.change.clone();
                for gone in removed.iter_mut() {
                    let (advanced, past) = gone.transform_pair(&current)?;
                    *gone = advanced;
                    current = past;
                }
                kept
            }
        };
        retained.push(kept);
    }
    Ok(removed)
}

/// Rebase a partial entry's original change onto `frame` from scratch
fn rebuild(frame: &Frame<'_>, lost: &Lost) -> Result<Entry, OtError> {
    let foreign: HashSet<String> = lost
        .foreign
        .iter()
        .filter(|id| frame.position(id).is_some())
        .cloned()
        .collect();
    let rebased = rebase(frame, &lost.original, &foreign)?;
    log::debug!("Rebuilt {} over {} foreign entries", lost.original.id(), foreign.len());

    Ok(if rebased.partial {
        Entry::partial(rebased.change, lost.original.clone(), foreign)
    } else {
        Entry::new(rebased.change)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::{Mutation, Operation};

    fn entry(id: &str, deps: &[&str]) -> Entry {
        Entry::new(
            Mutation::new(
                id,
                "s1",
                deps.iter().map(|d| d.to_string()).collect(),
                Operation::NoOp,
            )
            .into(),
        )
    }

    #[test]
    fn test_frame_prefix() {
        let mut history = History::new();
        history.push(entry("a", &[]));
        history.push(entry("b", &["a"]));
        history.push(entry("c", &["b"]));

        let frame = Frame::new(&history);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.position("c"), Some(2));

        // "b" and "c" rolled back, "x" rebuilt in their place
        let shorter = frame.prefix_with(1, &[entry("x", &["a"])]);
        assert_eq!(shorter.len(), 2);
        assert_eq!(shorter.position("a"), Some(0));
        assert_eq!(shorter.position("b"), None);
        assert_eq!(shorter.position("x"), Some(1));
        assert_eq!(shorter.get(1).map(Entry::id), Some("x"));

        let nested = shorter.prefix_with(2, &[entry("y", &["x"])]);
        assert_eq!(nested.len(), 3);
        assert_eq!(nested.position("x"), Some(1));
        assert_eq!(nested.position("y"), Some(2));
        assert!(nested.get(3).is_none());
    }

    #[test]
    fn test_nothing_foreign_is_unchanged() {
        let mut history = History::new();
        history.push(entry("a", &[]));
        let change: Change = Mutation::new("z", "s2", vec!["a".into()], Operation::NoOp).into();

        let rebased = rebase(&Frame::new(&history), &change, &HashSet::new()).unwrap();
        assert_eq!(rebased.change, change);
        assert!(!rebased.partial);
    }
}
