//! Prune: take an applied operation back out of the history
//!
//! `prune(target, removed)` assumes `removed` was applied before `target`.
//! It returns `target'`, the edit as if `removed` had never happened, and
//! `removed'`, which reapplies `removed` on top of `target'`.

use std::collections::HashSet;

use super::compose::compose_seq;
use super::document::{execute, Document};
use super::error::OtError;
use super::mutation::Mutation;
use super::operation::{append, Operation};
use super::stream::{LeftInserts, Pair, Pairing};
use super::transform::{attributes, sort_attributes};

/// Entries of a history that can be pruned out of each other
pub trait Prunable: Clone {
    fn id(&self) -> &str;

    /// Strip `removed` out of `self`, returning `(self', removed')`.
    fn prune(&self, removed: &Self) -> Result<(Self, Self), OtError>;
}

impl Prunable for Mutation {
    fn id(&self) -> &str {
        &self.id
    }

    fn prune(&self, removed: &Self) -> Result<(Self, Self), OtError> {
        prune(self, removed)
    }
}

pub fn prune(target: &Mutation, removed: &Mutation) -> Result<(Mutation, Mutation), OtError> {
    let (t, r) = prune_op(&target.op, &removed.op)?;
    Ok((target.with_op(t), removed.with_op(r)))
}

pub fn prune_op(target: &Operation, removed: &Operation) -> Result<(Operation, Operation), OtError> {
    match (target, removed) {
        (_, Operation::NoOp) => Ok((target.clone(), Operation::NoOp)),
        (Operation::NoOp, _) => Ok((Operation::NoOp, removed.clone())),
        // The later replacement does not depend on what it replaced
        (Operation::Insert { .. }, _) => Ok((target.clone(), Operation::NoOp)),
        (Operation::String(t), Operation::String(r)) => prune_string(t, r),
        (Operation::Object(t), Operation::Object(r)) => prune_object(t, r),
        // The edit only ever touched the value `removed` brought in
        (Operation::String(_) | Operation::Object(_), Operation::Insert { value, .. }) => {
            let edited = execute(&Document::from_json(value), target)?;
            Ok((Operation::NoOp, Operation::insert_value(edited.to_json())))
        }
        _ => Err(OtError::mismatch(removed.kind(), target.kind())),
    }
}

fn prune_string(target: &[Operation], removed: &[Operation]) -> Result<(Operation, Operation), OtError> {
    let mut t = Vec::new();
    let mut r = Vec::new();

    for pair in Pairing::new(removed, target, LeftInserts::Positional, false) {
        match pair? {
            Pair::Right(insert) => {
                append(&mut r, Operation::Skip(insert.len()));
                append(&mut t, insert);
            }
            Pair::Both(insert @ Operation::Insert { .. }, Operation::Delete(n)) => {
                if insert.is_tomb() {
                    append(&mut r, insert);
                } else {
                    append(&mut r, Operation::tomb(n));
                }
            }
            Pair::Both(insert @ Operation::Insert { .. }, _) => append(&mut r, insert),
            Pair::Both(x, y) => {
                append(&mut r, x);
                append(&mut t, y);
            }
            Pair::Left(op) => {
                return Err(OtError::StreamLengthMismatch(format!(
                    "{:?} of the pruned operation is not covered by its successor",
                    op.kind()
                )))
            }
        }
    }

    Ok((Operation::String(t), Operation::String(r)))
}

fn prune_object(target: &[Operation], removed: &[Operation]) -> Result<(Operation, Operation), OtError> {
    let t_attrs = attributes(target)?;
    let r_attrs = attributes(removed)?;
    let mut t = Vec::new();
    let mut r = Vec::new();

    for (key, op) in &t_attrs {
        match r_attrs.get(key) {
            None => t.push(Operation::attribute(*key, (*op).clone())),
            Some(gone) => {
                let (x, y) = prune_op(op, gone)?;
                if !x.is_noop() {
                    t.push(Operation::attribute(*key, x));
                }
                if !y.is_noop() {
                    r.push(Operation::attribute(*key, y));
                }
            }
        }
    }
    for (key, op) in &r_attrs {
        if !t_attrs.contains_key(key) {
            r.push(Operation::attribute(*key, (*op).clone()));
        }
    }
    sort_attributes(&mut t);
    sort_attributes(&mut r);

    Ok((Operation::Object(t), Operation::Object(r)))
}

/// A history window with some entries taken out
#[derive(Clone, Debug, PartialEq)]
pub struct PrunedHistory<T> {
    /// Entries that stay, re-expressed without the removed ones
    pub retained: Vec<T>,

    /// Removed entries, oldest first. Each applies after all of `retained`
    /// and the removed entries before it.
    pub removed: Vec<T>,
}

impl PrunedHistory<Mutation> {
    /// The removed entries as one mutation applying after `retained`
    pub fn undo(&self) -> Result<Option<Mutation>, OtError> {
        compose_seq(&self.removed)
    }
}

/// Take every entry whose id is in `prune_set` out of `history` (oldest first).
pub fn prune_seq<T: Prunable>(
    history: &[T],
    prune_set: &HashSet<String>,
) -> Result<PrunedHistory<T>, OtError> {
    let mut retained = Vec::with_capacity(history.len());
    let mut removed: Vec<T> = Vec::new();

    for entry in history {
        if prune_set.contains(entry.id()) {
            removed.push(entry.clone());
            continue;
        }

        let mut current = entry.clone();
        for gone in removed.iter_mut().rev() {
            let (stripped, advanced) = current.prune(gone)?;
            current = stripped;
            *gone = advanced;
        }
        retained.push(current);
    }

    Ok(PrunedHistory { retained, removed })
}
