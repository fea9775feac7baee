//! The operation tree
//!
//! An edit is a small typed tree. String content is edited by a sequence of
//! Insert/Skip/Delete children; objects are edited by a sequence of
//! attribute operations, each wrapping the operation for one key.
//!
//! Positions are stable: a Delete turns positions into tombs, it never
//! removes them. A StringOp therefore covers the current document length with
//! its Skip and Delete children and adds new positions with its Inserts.

use serde_json::Value;

/// The kind of an operation node, used for dispatch and error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
    NoOp,
    Insert,
    Delete,
    Skip,
    String,
    /// Reserved on the wire, never constructed.
    Array,
    Object,
    Attribute,
}

/// A node of the operation tree
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    NoOp,

    /// Insert `len` positions. Inside a StringOp the value is text and `len`
    /// is its char count; a whole-value insert has `len == 1`. An empty
    /// string value with `len > 0` is a tomb.
    Insert { len: usize, value: Value },

    /// Turn `n` positions into tombs
    Delete(usize),

    /// Keep `n` positions
    Skip(usize),

    /// Edit a string; children are Insert, Skip and Delete
    String(Vec<Operation>),

    /// Edit an object; children are Attribute operations
    Object(Vec<Operation>),

    /// Edit the value stored under `key`
    Attribute { key: String, op: Box<Operation> },
}

impl Operation {
    /// Insert text at the current position
    pub fn insert_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Operation::Insert {
            len: text.chars().count(),
            value: Value::String(text),
        }
    }

    /// Insert `len` positions that never render
    pub fn tomb(len: usize) -> Self {
        Operation::Insert {
            len,
            value: Value::String(String::new()),
        }
    }

    /// Replace a whole value (root document or attribute value)
    pub fn insert_value(value: Value) -> Self {
        match value {
            Value::String(text) => Operation::insert_text(text),
            value => Operation::Insert { len: 1, value },
        }
    }

    pub fn string(children: Vec<Operation>) -> Self {
        Operation::String(children)
    }

    pub fn object(children: Vec<Operation>) -> Self {
        Operation::Object(children)
    }

    pub fn attribute(key: impl Into<String>, op: Operation) -> Self {
        Operation::Attribute {
            key: key.into(),
            op: Box::new(op),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::NoOp => OperationKind::NoOp,
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Delete(_) => OperationKind::Delete,
            Operation::Skip(_) => OperationKind::Skip,
            Operation::String(_) => OperationKind::String,
            Operation::Object(_) => OperationKind::Object,
            Operation::Attribute { .. } => OperationKind::Attribute,
        }
    }

    /// Number of positions this node covers
    pub fn len(&self) -> usize {
        match self {
            Operation::NoOp => 0,
            Operation::Insert { len, .. } => *len,
            Operation::Delete(n) | Operation::Skip(n) => *n,
            Operation::String(_) | Operation::Object(_) | Operation::Attribute { .. } => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Operation::NoOp)
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Operation::Insert { .. })
    }

    /// True for inserts that occupy positions without rendering anything
    pub fn is_tomb(&self) -> bool {
        match self {
            Operation::Insert { len, value } => *len > 0 && value.as_str() == Some(""),
            _ => false,
        }
    }

    /// The inserted text, if this is a text insert
    pub fn text(&self) -> Option<&str> {
        match self {
            Operation::Insert { value, .. } => value.as_str(),
            _ => None,
        }
    }

    /// Cut `n` positions starting at `offset` out of a leaf node.
    ///
    /// Composite nodes are returned whole; the stream cursor never slices them.
    pub(crate) fn slice(&self, offset: usize, n: usize) -> Operation {
        match self {
            Operation::Skip(_) => Operation::Skip(n),
            Operation::Delete(_) => Operation::Delete(n),
            Operation::Insert { .. } if self.is_tomb() => Operation::tomb(n),
            Operation::Insert { len, value } => match value.as_str() {
                Some(text) => Operation::insert_text(text.chars().skip(offset).take(n).collect::<String>()),
                None if offset == 0 && n == *len => self.clone(),
                None => Operation::tomb(n),
            },
            other => other.clone(),
        }
    }

    /// Drop the operation if it has no effect, so callers can skip it
    pub(crate) fn into_effective(self) -> Option<Operation> {
        match &self {
            Operation::NoOp => None,
            Operation::Skip(0) | Operation::Delete(0) => None,
            Operation::Insert { len: 0, value } if value.as_str() == Some("") => None,
            _ => Some(self),
        }
    }
}

/// Append a leaf to a child sequence, merging it with the last element when
/// both are of the same kind.
pub(crate) fn append(ops: &mut Vec<Operation>, op: Operation) {
    let Some(op) = op.into_effective() else {
        return;
    };
    let merged = match (ops.last_mut(), &op) {
        (Some(Operation::Skip(n)), Operation::Skip(m)) => {
            *n += m;
            true
        }
        (Some(Operation::Delete(n)), Operation::Delete(m)) => {
            *n += m;
            true
        }
        (Some(last), _) if last.is_tomb() && op.is_tomb() => {
            if let Operation::Insert { len, .. } = last {
                *len += op.len();
            }
            true
        }
        (Some(Operation::Insert { len, value: Value::String(text) }), Operation::Insert { value: Value::String(more), .. })
            if !text.is_empty() && !more.is_empty() =>
        {
            text.push_str(more);
            *len += op.len();
            true
        }
        _ => false,
    };
    if !merged {
        ops.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_text_counts_chars() {
        let op = Operation::insert_text("héllo");
        assert_eq!(op.len(), 5);
        assert_eq!(op.text(), Some("héllo"));
        assert!(!op.is_tomb());
    }

    #[test]
    fn test_tomb() {
        let op = Operation::tomb(3);
        assert!(op.is_tomb());
        assert_eq!(op.len(), 3);
        assert!(!Operation::tomb(0).is_tomb());
    }

    #[test]
    fn test_slice_text_and_tomb() {
        let op = Operation::insert_text("abcdef");
        assert_eq!(op.slice(2, 3), Operation::insert_text("cde"));
        assert_eq!(Operation::tomb(5).slice(1, 2), Operation::tomb(2));
        assert_eq!(Operation::Delete(9).slice(4, 2), Operation::Delete(2));
    }

    #[test]
    fn test_append_merges_same_kinds() {
        let mut ops = Vec::new();
        append(&mut ops, Operation::Skip(2));
        append(&mut ops, Operation::Skip(3));
        append(&mut ops, Operation::NoOp);
        append(&mut ops, Operation::insert_text("ab"));
        append(&mut ops, Operation::insert_text("c"));
        append(&mut ops, Operation::tomb(1));
        append(&mut ops, Operation::tomb(2));
        append(&mut ops, Operation::Delete(0));
        assert_eq!(
            ops,
            vec![Operation::Skip(5), Operation::insert_text("abc"), Operation::tomb(3)]
        );
    }

    #[test]
    fn test_whole_value_insert() {
        let op = Operation::insert_value(json!({"title": "x"}));
        assert_eq!(op.len(), 1);
        assert_eq!(op.kind(), OperationKind::Insert);

        let op = Operation::insert_value(json!("abc"));
        assert_eq!(op.len(), 3);
    }
}
