//! Transform: make two concurrent operations applicable on top of each other
//!
//! `transform(a, b)` returns `(a', b')` such that applying `a` then `b'`
//! reaches the same document as applying `b` then `a'`.

use std::collections::BTreeMap;

use super::error::OtError;
use super::mutation::Mutation;
use super::operation::{append, Operation, OperationKind};
use super::stream::{LeftInserts, Pair, Pairing};

/// Transform two concurrent mutations against each other.
///
/// The mutation with the smaller `(site, id)` goes first when both insert at
/// the same position. A mutation transformed against itself collapses to a
/// NoOp on both sides.
pub fn transform(m1: &Mutation, m2: &Mutation) -> Result<(Mutation, Mutation), OtError> {
    if m1.order_key() == m2.order_key() {
        return Ok((m1.with_op(Operation::NoOp), m2.with_op(Operation::NoOp)));
    }
    let (a, b) = transform_op(&m1.op, &m2.op, m1.precedes(m2))?;
    Ok((m1.with_op(a), m2.with_op(b)))
}

/// Transform `m` against each mutation of `seq` in order, yielding the
/// version of `m` that applies after all of them.
pub fn transform_seq(m: &Mutation, seq: &[Mutation]) -> Result<Mutation, OtError> {
    let mut current = m.clone();
    for other in seq {
        current = transform(&current, other)?.0;
    }
    Ok(current)
}

/// Whether transforming `m` past `against` drops part of `m`.
///
/// That happens when a concurrent replacement wins over an edit or over a
/// losing replacement. The dropped part cannot be recovered by pruning.
pub fn discards(m: &Mutation, against: &Mutation) -> bool {
    m.order_key() != against.order_key() && discards_op(&m.op, &against.op, m.precedes(against))
}

fn discards_op(a: &Operation, b: &Operation, a_first: bool) -> bool {
    match (a, b) {
        (Operation::Object(x), Operation::Object(y)) => {
            let (Ok(left), Ok(right)) = (attributes(x), attributes(y)) else {
                return false;
            };
            left.iter().any(|(key, op)| {
                right
                    .get(key)
                    .map_or(false, |other| discards_op(op, other, a_first))
            })
        }
        (Operation::Insert { .. }, Operation::Insert { .. }) => a_first,
        (Operation::String(_) | Operation::Object(_), Operation::Insert { .. }) => true,
        _ => false,
    }
}

/// Transform two operations authored on the same state.
pub fn transform_op(
    a: &Operation,
    b: &Operation,
    a_first: bool,
) -> Result<(Operation, Operation), OtError> {
    match (a, b) {
        (Operation::NoOp, _) | (_, Operation::NoOp) => Ok((a.clone(), b.clone())),
        (Operation::String(x), Operation::String(y)) => transform_string(x, y, a_first),
        (Operation::Object(x), Operation::Object(y)) => transform_object(x, y, a_first),
        // Both replace the whole value: the second in canonical order wins
        (Operation::Insert { .. }, Operation::Insert { .. }) => {
            if a_first {
                Ok((Operation::NoOp, b.clone()))
            } else {
                Ok((a.clone(), Operation::NoOp))
            }
        }
        // A replacement discards a concurrent edit of the old value
        (Operation::Insert { .. }, Operation::String(_) | Operation::Object(_)) => {
            Ok((a.clone(), Operation::NoOp))
        }
        (Operation::String(_) | Operation::Object(_), Operation::Insert { .. }) => {
            Ok((Operation::NoOp, b.clone()))
        }
        _ => Err(OtError::mismatch(a.kind(), b.kind())),
    }
}

fn transform_string(
    a: &[Operation],
    b: &[Operation],
    a_first: bool,
) -> Result<(Operation, Operation), OtError> {
    let mut ta = Vec::new();
    let mut tb = Vec::new();

    for pair in Pairing::new(a, b, LeftInserts::Unilateral, a_first) {
        match pair? {
            Pair::Left(insert) => {
                append(&mut tb, Operation::Skip(insert.len()));
                append(&mut ta, insert);
            }
            Pair::Right(insert) => {
                append(&mut ta, Operation::Skip(insert.len()));
                append(&mut tb, insert);
            }
            // Skips and deletes cover the same positions on both sides
            Pair::Both(x, y) => {
                append(&mut ta, x);
                append(&mut tb, y);
            }
        }
    }

    Ok((Operation::String(ta), Operation::String(tb)))
}

/// Index the attribute children of an object operation by key
pub(crate) fn attributes(children: &[Operation]) -> Result<BTreeMap<&str, &Operation>, OtError> {
    let mut map = BTreeMap::new();
    for child in children {
        match child {
            Operation::NoOp => {}
            Operation::Attribute { key, op } => {
                if map.insert(key.as_str(), op.as_ref()).is_some() {
                    return Err(OtError::MalformedOperation(format!(
                        "attribute {:?} appears twice",
                        key
                    )));
                }
            }
            other => return Err(OtError::mismatch(OperationKind::Attribute, other.kind())),
        }
    }
    Ok(map)
}

pub(crate) fn attribute_key(op: &Operation) -> &str {
    match op {
        Operation::Attribute { key, .. } => key,
        _ => "",
    }
}

/// Order attribute children by key
pub(crate) fn sort_attributes(children: &mut [Operation]) {
    children.sort_by(|a, b| attribute_key(a).cmp(attribute_key(b)));
}

fn transform_object(
    a: &[Operation],
    b: &[Operation],
    a_first: bool,
) -> Result<(Operation, Operation), OtError> {
    let left = attributes(a)?;
    let right = attributes(b)?;
    let mut ta = Vec::new();
    let mut tb = Vec::new();

    for (key, op) in &left {
        match right.get(key) {
            None => ta.push(Operation::attribute(*key, (*op).clone())),
            Some(other) => {
                let (x, y) = transform_op(op, other, a_first)?;
                if !x.is_noop() {
                    ta.push(Operation::attribute(*key, x));
                }
                if !y.is_noop() {
                    tb.push(Operation::attribute(*key, y));
                }
            }
        }
    }
    for (key, op) in &right {
        if !left.contains_key(key) {
            tb.push(Operation::attribute(*key, (*op).clone()));
        }
    }
    sort_attributes(&mut ta);
    sort_attributes(&mut tb);

    Ok((Operation::Object(ta), Operation::Object(tb)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::document::{execute, Document};
    use serde_json::json;

    fn string_mutation(id: &str, site: &str, children: Vec<Operation>) -> Mutation {
        Mutation::new(id, site, vec![], Operation::string(children))
    }

    fn converge(doc: &Document, m1: &Mutation, m2: &Mutation) -> (Document, Document) {
        let (t1, t2) = transform(m1, m2).unwrap();
        let one = execute(&execute(doc, &m1.op).unwrap(), &t2.op).unwrap();
        let two = execute(&execute(doc, &m2.op).unwrap(), &t1.op).unwrap();
        (one, two)
    }

    #[test]
    fn test_concurrent_inserts_on_empty_string() {
        let a = string_mutation("a", "s1", vec![Operation::insert_text("Hello World")]);
        let b = string_mutation("b", "s2", vec![Operation::insert_text("Olla!!")]);

        let (one, two) = converge(&Document::Null, &a, &b);
        assert_eq!(one.render().unwrap(), "Hello WorldOlla!!");
        assert_eq!(one, two);

        // Call order does not change the outcome
        let (one, two) = converge(&Document::Null, &b, &a);
        assert_eq!(one.render().unwrap(), "Hello WorldOlla!!");
        assert_eq!(one, two);
    }

    #[test]
    fn test_insert_against_delete() {
        let doc = Document::text("abcdef");
        let a = string_mutation(
            "a",
            "s1",
            vec![Operation::Skip(1), Operation::Delete(4), Operation::Skip(1)],
        );
        let b = string_mutation(
            "b",
            "s2",
            vec![Operation::Skip(3), Operation::insert_text("XY"), Operation::Skip(3)],
        );
        let (one, two) = converge(&doc, &a, &b);
        assert_eq!(one, two);
        assert_eq!(one.render().unwrap(), "aXYf");
    }

    #[test]
    fn test_concurrent_deletes_overlap() {
        let doc = Document::text("abcdef");
        let a = string_mutation("a", "s1", vec![Operation::Delete(4), Operation::Skip(2)]);
        let b = string_mutation("b", "s2", vec![Operation::Skip(2), Operation::Delete(4)]);
        let (one, two) = converge(&doc, &a, &b);
        assert_eq!(one, two);
        assert_eq!(one.render().unwrap(), "");
    }

    #[test]
    fn test_duplicate_collapses_to_noop() {
        let a = string_mutation("a", "s1", vec![Operation::insert_text("x")]);
        let (t1, t2) = transform(&a, &a.clone()).unwrap();
        assert!(t1.op.is_noop());
        assert!(t2.op.is_noop());
    }

    #[test]
    fn test_object_keys() {
        let doc = Document::from_json(&json!({"title": "ab", "n": 1}));
        let a = Mutation::new(
            "a",
            "s1",
            vec![],
            Operation::object(vec![
                Operation::attribute(
                    "title",
                    Operation::string(vec![Operation::insert_text("<"), Operation::Skip(2)]),
                ),
                Operation::attribute("n", Operation::insert_value(json!(2))),
            ]),
        );
        let b = Mutation::new(
            "b",
            "s2",
            vec![],
            Operation::object(vec![
                Operation::attribute(
                    "title",
                    Operation::string(vec![Operation::Skip(2), Operation::insert_text(">")]),
                ),
                Operation::attribute("n", Operation::insert_value(json!(3))),
                Operation::attribute("extra", Operation::insert_value(json!(true))),
            ]),
        );
        let (one, two) = converge(&doc, &a, &b);
        assert_eq!(one, two);
        assert_eq!(one.to_json(), json!({"title": "<ab>", "n": 3, "extra": true}));
    }

    #[test]
    fn test_replacement_beats_edit() {
        let doc = Document::from_json(&json!({"title": "ab"}));
        let edit = Mutation::new(
            "a",
            "s1",
            vec![],
            Operation::object(vec![Operation::attribute(
                "title",
                Operation::string(vec![Operation::Delete(2)]),
            )]),
        );
        let replace = Mutation::new(
            "b",
            "s2",
            vec![],
            Operation::object(vec![Operation::attribute(
                "title",
                Operation::insert_value(json!("fresh")),
            )]),
        );
        let (one, two) = converge(&doc, &edit, &replace);
        assert_eq!(one, two);
        assert_eq!(one.to_json(), json!({"title": "fresh"}));
    }

    #[test]
    fn test_kind_mismatch() {
        let a = Operation::string(vec![Operation::insert_text("x")]);
        let b = Operation::object(vec![]);
        let err = transform_op(&a, &b, true).unwrap_err();
        assert_eq!(err, OtError::mismatch(OperationKind::String, OperationKind::Object));
    }

    #[test]
    fn test_transform_seq() {
        let base = string_mutation("m0", "s0", vec![Operation::insert_text("ab")]);
        let doc = execute(&Document::Null, &base.op).unwrap();

        let first = string_mutation("m1", "s1", vec![Operation::insert_text("1"), Operation::Skip(2)]);
        let second = string_mutation("m2", "s1", vec![Operation::Skip(3), Operation::insert_text("2")]);
        let late = string_mutation("m3", "s2", vec![Operation::Skip(1), Operation::Delete(1)]);

        let rebased = transform_seq(&late, &[first.clone(), second.clone()]).unwrap();
        let mut state = execute(&doc, &first.op).unwrap();
        state = execute(&state, &second.op).unwrap();
        state = execute(&state, &rebased.op).unwrap();
        assert_eq!(state.render().unwrap(), "1a2");
    }

    fn keys(op: &Operation) -> Vec<&str> {
        match op {
            Operation::Object(children) => children.iter().map(attribute_key).collect(),
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_object_output_is_sorted_by_key() {
        let a = Operation::object(vec![Operation::attribute("m", Operation::insert_value(json!(1)))]);
        let b = Operation::object(vec![
            Operation::attribute("z", Operation::insert_value(json!(2))),
            Operation::attribute("m", Operation::insert_value(json!(3))),
            Operation::attribute("a", Operation::insert_value(json!(4))),
        ]);

        // `a` loses "m", so `b` keeps all three keys
        let (ta, tb) = transform_op(&a, &b, true).unwrap();
        assert_eq!(keys(&ta), Vec::<&str>::new());
        assert_eq!(keys(&tb), vec!["a", "m", "z"]);

        let (ta, tb) = transform_op(&a, &b, false).unwrap();
        assert_eq!(keys(&ta), vec!["m"]);
        assert_eq!(keys(&tb), vec!["a", "z"]);
    }

    #[test]
    fn test_discards() {
        let replace = |id: &str, site: &str, value| {
            Mutation::new(
                id,
                site,
                vec![],
                Operation::object(vec![Operation::attribute("b", Operation::insert_value(value))]),
            )
        };
        let edit = Mutation::new(
            "e",
            "s1",
            vec![],
            Operation::object(vec![Operation::attribute(
                "b",
                Operation::string(vec![Operation::insert_text("4"), Operation::Skip(2)]),
            )]),
        );
        let early = replace("x3", "s0", json!("v3"));
        let late = replace("x9", "s3", json!("v9"));

        // The first in tie-break order loses the value
        assert!(discards(&early, &late));
        assert!(!discards(&late, &early));
        assert_eq!(transform(&early, &late).unwrap().0.op, Operation::object(vec![]));

        // An edit of a replaced value is lost, the replacement is not
        assert!(discards(&edit, &late));
        assert!(!discards(&late, &edit));

        // Disjoint keys and text edits lose nothing
        let other = Mutation::new(
            "o",
            "s2",
            vec![],
            Operation::object(vec![Operation::attribute("c", Operation::insert_value(json!(1)))]),
        );
        assert!(!discards(&early, &other));
        let text = string_mutation("t", "s2", vec![Operation::insert_text("x")]);
        assert!(!discards(&text, &string_mutation("u", "s1", vec![Operation::insert_text("y")])));
        assert!(!discards(&early, &early.clone()));
    }
}
