//! Compose: collapse sequential operations into one

use super::document::{execute, Document};
use super::error::OtError;
use super::mutation::Mutation;
use super::operation::{append, Operation};
use super::stream::{LeftInserts, Pair, Pairing};
use super::transform::{attributes, sort_attributes};

/// Compose two sequential mutations; `second` was authored on top of `first`.
///
/// The result keeps the identity of `second` and the dependencies of
/// `first`, since it applies where `first` applied.
pub fn compose(first: &Mutation, second: &Mutation) -> Result<Mutation, OtError> {
    let op = compose_op(&first.op, &second.op)?;
    let mut result = second.with_op(op);
    result.dependencies = first.dependencies.clone();
    result.applied_at = None;
    Ok(result)
}

/// Compose a causal chain of mutations left to right.
///
/// Returns `None` for an empty chain.
pub fn compose_seq(seq: &[Mutation]) -> Result<Option<Mutation>, OtError> {
    let mut iter = seq.iter();
    let Some(head) = iter.next() else {
        return Ok(None);
    };
    let mut acc = head.clone();
    for next in iter {
        acc = compose(&acc, next)?;
    }
    Ok(Some(acc))
}

/// Compose a chain of operations; the empty chain is the identity NoOp.
pub fn compose_ops<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Result<Operation, OtError> {
    let mut acc = Operation::NoOp;
    for op in ops {
        acc = compose_op(&acc, op)?;
    }
    Ok(acc)
}

pub fn compose_op(first: &Operation, second: &Operation) -> Result<Operation, OtError> {
    match (first, second) {
        (_, Operation::NoOp) => Ok(first.clone()),
        (Operation::NoOp, _) => Ok(second.clone()),
        // A later replacement discards whatever came before
        (_, Operation::Insert { .. }) => Ok(second.clone()),
        (Operation::String(x), Operation::String(y)) => compose_string(x, y),
        (Operation::Object(x), Operation::Object(y)) => compose_object(x, y),
        (Operation::Insert { value, .. }, Operation::String(_) | Operation::Object(_)) => {
            let edited = execute(&Document::from_json(value), second)?;
            Ok(Operation::insert_value(edited.to_json()))
        }
        _ => Err(OtError::mismatch(first.kind(), second.kind())),
    }
}

fn compose_string(first: &[Operation], second: &[Operation]) -> Result<Operation, OtError> {
    let mut out = Vec::new();

    for pair in Pairing::new(first, second, LeftInserts::Positional, false) {
        match pair? {
            Pair::Right(insert) => append(&mut out, insert),
            Pair::Both(x, y) => append(&mut out, combine(x, y)),
            Pair::Left(op) => {
                return Err(OtError::StreamLengthMismatch(format!(
                    "{:?} of the first operation is not covered by the second",
                    op.kind()
                )))
            }
        }
    }

    Ok(Operation::String(out))
}

/// Combine aligned elements: `x` from the first operation's output, `y` from
/// the second operation's input.
fn combine(x: Operation, y: Operation) -> Operation {
    match (x, y) {
        // Inserted then deleted: the positions survive as a tomb
        (Operation::Insert { len, .. }, Operation::Delete(_)) => Operation::tomb(len),
        (insert @ Operation::Insert { .. }, _) => insert,
        (Operation::Delete(n), _) => Operation::Delete(n),
        (_, y) => y,
    }
}

fn compose_object(first: &[Operation], second: &[Operation]) -> Result<Operation, OtError> {
    let left = attributes(first)?;
    let right = attributes(second)?;
    let mut out = Vec::new();

    for (key, op) in &left {
        let composed = match right.get(key) {
            Some(later) => compose_op(op, later)?,
            None => (*op).clone(),
        };
        if !composed.is_noop() {
            out.push(Operation::attribute(*key, composed));
        }
    }
    for (key, op) in &right {
        if !left.contains_key(key) {
            out.push(Operation::attribute(*key, (*op).clone()));
        }
    }
    sort_attributes(&mut out);

    Ok(Operation::Object(out))
}
