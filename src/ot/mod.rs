//! Operational transformation over JSON-like documents
//!
//! Operations are trees of Insert/Skip/Delete leaves under String and Object
//! nodes. Transform, compose and prune are the three algebra functions the
//! integrator is built from; `execute` applies an operation to a document.

mod codec;
mod compose;
mod document;
mod error;
mod mutation;
mod operation;
mod prune;
mod stream;
mod transform;

pub use codec::{decode_operation, encode_operation};
pub use compose::{compose, compose_op, compose_ops, compose_seq};
pub use document::{execute, Document, Text};
pub use error::OtError;
pub use mutation::Mutation;
pub use operation::{Operation, OperationKind};
pub use prune::{prune, prune_op, prune_seq, Prunable, PrunedHistory};
pub use transform::{discards, transform, transform_op, transform_seq};
