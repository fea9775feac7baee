//! Position-aligned pairing of two child sequences
//!
//! Transform, compose and prune all walk two StringOp child lists side by
//! side. The pairing hands out one step at a time: either an insert drained
//! from one side alone, or an equal number of positions taken from both
//! sides, splitting elements where their lengths disagree.

use super::error::OtError;
use super::operation::{Operation, OperationKind};

/// One aligned step of a pairing
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Pair {
    /// Drained from the left stream; the right side contributes nothing
    Left(Operation),
    /// Drained from the right stream; the left side contributes nothing
    Right(Operation),
    /// The same number of positions taken from both streams
    Both(Operation, Operation),
}

/// How inserts of the left stream take part in the pairing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LeftInserts {
    /// Left and right were authored on the same state (transform). Inserts on
    /// either side are content the other has not seen.
    Unilateral,
    /// The right stream was authored on the output of the left one (compose,
    /// prune). Left inserts are positions the right stream covers.
    Positional,
}

/// Read position inside a child sequence
struct Cursor<'a> {
    ops: &'a [Operation],
    index: usize,
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(ops: &'a [Operation]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    /// Kind of the element under the cursor, skipping empty elements
    fn peek(&mut self) -> Result<Option<OperationKind>, OtError> {
        while let Some(op) = self.ops.get(self.index) {
            match op {
                Operation::NoOp => self.advance(),
                Operation::Insert { .. } | Operation::Skip(_) | Operation::Delete(_) => {
                    if self.offset < op.len() {
                        return Ok(Some(op.kind()));
                    }
                    self.advance();
                }
                other => {
                    return Err(OtError::MalformedOperation(format!(
                        "{:?} cannot appear inside a string operation",
                        other.kind()
                    )))
                }
            }
        }
        Ok(None)
    }

    fn advance(&mut self) {
        self.index += 1;
        self.offset = 0;
    }

    /// Positions left in the current element; only valid after `peek` found one
    fn remaining(&self) -> usize {
        self.ops[self.index].len() - self.offset
    }

    fn take(&mut self, n: usize) -> Operation {
        let op = &self.ops[self.index];
        let piece = op.slice(self.offset, n);
        self.offset += n;
        if self.offset >= op.len() {
            self.advance();
        }
        piece
    }

    fn take_rest(&mut self) -> Operation {
        let n = self.remaining();
        self.take(n)
    }
}

/// Iterator over the aligned steps of two child sequences
pub(crate) struct Pairing<'a> {
    left: Cursor<'a>,
    right: Cursor<'a>,
    left_inserts: LeftInserts,
    left_first: bool,
    failed: bool,
}

impl<'a> Pairing<'a> {
    /// `left_first` decides which insert drains first when both streams hold
    /// one at the same position. It only matters for unilateral left inserts.
    pub(crate) fn new(
        left: &'a [Operation],
        right: &'a [Operation],
        left_inserts: LeftInserts,
        left_first: bool,
    ) -> Self {
        Self {
            left: Cursor::new(left),
            right: Cursor::new(right),
            left_inserts,
            left_first,
            failed: false,
        }
    }

    fn step(&mut self) -> Result<Option<Pair>, OtError> {
        let left = self.left.peek()?;
        let right = self.right.peek()?;

        let left_alone = left == Some(OperationKind::Insert) && self.left_inserts == LeftInserts::Unilateral;
        let right_alone = right == Some(OperationKind::Insert);

        match (left, right) {
            (None, None) => Ok(None),
            (Some(kind), None) => {
                if left_alone {
                    Ok(Some(Pair::Left(self.left.take_rest())))
                } else {
                    Err(OtError::StreamLengthMismatch(format!(
                        "left stream has {} trailing {:?} positions",
                        self.left.remaining(),
                        kind
                    )))
                }
            }
            (None, Some(kind)) => {
                if right_alone {
                    Ok(Some(Pair::Right(self.right.take_rest())))
                } else {
                    Err(OtError::StreamLengthMismatch(format!(
                        "right stream has {} trailing {:?} positions",
                        self.right.remaining(),
                        kind
                    )))
                }
            }
            (Some(_), Some(_)) => {
                if left_alone && (self.left_first || !right_alone) {
                    return Ok(Some(Pair::Left(self.left.take_rest())));
                }
                if right_alone {
                    return Ok(Some(Pair::Right(self.right.take_rest())));
                }
                let n = self.left.remaining().min(self.right.remaining());
                Ok(Some(Pair::Both(self.left.take(n), self.right.take(n))))
            }
        }
    }
}

impl<'a> Iterator for Pairing<'a> {
    type Item = Result<Pair, OtError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(pair) => pair.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(left: &[Operation], right: &[Operation], mode: LeftInserts, left_first: bool) -> Result<Vec<Pair>, OtError> {
        Pairing::new(left, right, mode, left_first).collect()
    }

    #[test]
    fn test_splits_to_shortest() {
        let left = vec![Operation::Skip(3), Operation::Delete(2)];
        let right = vec![Operation::Skip(1), Operation::Skip(4)];
        let result = pairs(&left, &right, LeftInserts::Unilateral, true).unwrap();
        assert_eq!(
            result,
            vec![
                Pair::Both(Operation::Skip(1), Operation::Skip(1)),
                Pair::Both(Operation::Skip(2), Operation::Skip(2)),
                Pair::Both(Operation::Delete(2), Operation::Skip(2)),
            ]
        );
    }

    #[test]
    fn test_inserts_drain_alone() {
        let left = vec![Operation::insert_text("ab"), Operation::Skip(1)];
        let right = vec![Operation::Skip(1), Operation::insert_text("x")];
        let result = pairs(&left, &right, LeftInserts::Unilateral, false).unwrap();
        assert_eq!(
            result,
            vec![
                Pair::Left(Operation::insert_text("ab")),
                Pair::Both(Operation::Skip(1), Operation::Skip(1)),
                Pair::Right(Operation::insert_text("x")),
            ]
        );
    }

    #[test]
    fn test_tie_break_on_simultaneous_inserts() {
        let left = vec![Operation::insert_text("L")];
        let right = vec![Operation::insert_text("R")];

        let first = pairs(&left, &right, LeftInserts::Unilateral, true).unwrap();
        assert_eq!(first[0], Pair::Left(Operation::insert_text("L")));

        let second = pairs(&left, &right, LeftInserts::Unilateral, false).unwrap();
        assert_eq!(second[0], Pair::Right(Operation::insert_text("R")));
    }

    #[test]
    fn test_positional_left_insert_pairs_with_right() {
        let left = vec![Operation::insert_text("abc")];
        let right = vec![Operation::Skip(1), Operation::Delete(2)];
        let result = pairs(&left, &right, LeftInserts::Positional, false).unwrap();
        assert_eq!(
            result,
            vec![
                Pair::Both(Operation::insert_text("a"), Operation::Skip(1)),
                Pair::Both(Operation::insert_text("bc"), Operation::Delete(2)),
            ]
        );
    }

    #[test]
    fn test_length_mismatch() {
        let left = vec![Operation::Skip(3)];
        let right = vec![Operation::Skip(2)];
        let err = pairs(&left, &right, LeftInserts::Unilateral, true).unwrap_err();
        assert!(matches!(err, OtError::StreamLengthMismatch(_)));

        let left = vec![Operation::insert_text("abc")];
        let right: Vec<Operation> = Vec::new();
        let err = pairs(&left, &right, LeftInserts::Positional, true).unwrap_err();
        assert!(matches!(err, OtError::StreamLengthMismatch(_)));
    }

    #[test]
    fn test_rejects_composite_children() {
        let left = vec![Operation::object(vec![])];
        let right = vec![Operation::Skip(1)];
        let err = pairs(&left, &right, LeftInserts::Unilateral, true).unwrap_err();
        assert!(matches!(err, OtError::MalformedOperation(_)));
    }
}
