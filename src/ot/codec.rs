//! JSON wire form of operations
//!
//! Leaves and composites are objects keyed by a `$` tag; anything else is a
//! literal value being inserted.

use serde_json::{json, Map, Value};

use super::error::OtError;
use super::operation::{Operation, OperationKind};

const SKIP: &str = "$s";
const DELETE: &str = "$d";
const TOMB: &str = "$tomb";
const STRING: &str = "$t";
const OBJECT: &str = "$o";
const ARRAY: &str = "$r";
const ATTRIBUTE: &str = "$a";
const ATTRIBUTE_VALUE: &str = "$v";

pub fn decode_operation(value: &Value) -> Result<Operation, OtError> {
    match decode(value)? {
        Operation::Attribute { key, .. } => Err(OtError::MalformedOperation(format!(
            "attribute {:?} outside an object operation",
            key
        ))),
        op => Ok(op),
    }
}

fn decode(value: &Value) -> Result<Operation, OtError> {
    match value {
        Value::Null => Ok(Operation::NoOp),
        Value::Object(map) if is_tagged(map) => decode_tagged(map),
        other => Ok(Operation::insert_value(other.clone())),
    }
}

pub fn encode_operation(op: &Operation) -> Result<Value, OtError> {
    let value = match op {
        Operation::NoOp => Value::Null,
        Operation::Insert { len, .. } if op.is_tomb() => json!({ TOMB: len }),
        Operation::Insert { value: Value::Null, .. } => {
            return Err(OtError::MalformedOperation(
                "null cannot be inserted, it encodes a NoOp".to_string(),
            ))
        }
        Operation::Insert { value, .. } => {
            if let Value::Object(map) = value {
                if is_tagged(map) {
                    return Err(OtError::MalformedOperation(
                        "inserted object uses a reserved $ key".to_string(),
                    ));
                }
            }
            value.clone()
        }
        Operation::Skip(n) => json!({ SKIP: n }),
        Operation::Delete(n) => json!({ DELETE: n }),
        Operation::String(children) => json!({ STRING: encode_children(children)? }),
        Operation::Object(children) => json!({ OBJECT: encode_children(children)? }),
        Operation::Attribute { key, op } => json!({ ATTRIBUTE: key, ATTRIBUTE_VALUE: encode_operation(op)? }),
    };
    Ok(value)
}

fn encode_children(children: &[Operation]) -> Result<Vec<Value>, OtError> {
    children.iter().map(encode_operation).collect()
}

fn is_tagged(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| key.starts_with('$'))
}

fn decode_tagged(map: &Map<String, Value>) -> Result<Operation, OtError> {
    if map.contains_key(ARRAY) {
        return Err(OtError::UnsupportedOperationKind(OperationKind::Array));
    }
    if let Some(key) = map.get(ATTRIBUTE) {
        let key = key
            .as_str()
            .ok_or_else(|| malformed("attribute key must be a string", map))?;
        let inner = map
            .get(ATTRIBUTE_VALUE)
            .ok_or_else(|| malformed("attribute without a value", map))?;
        if map.len() != 2 {
            return Err(malformed("unexpected keys beside the attribute", map));
        }
        return Ok(Operation::attribute(key, decode_operation(inner)?));
    }
    if map.len() != 1 {
        return Err(malformed("expected a single tag", map));
    }

    let (tag, body) = match map.iter().next() {
        Some(entry) => entry,
        None => return Err(malformed("empty tag", map)),
    };
    match tag.as_str() {
        SKIP => Ok(Operation::Skip(decode_len(body)?)),
        DELETE => Ok(Operation::Delete(decode_len(body)?)),
        TOMB => Ok(Operation::tomb(decode_len(body)?)),
        STRING => Ok(Operation::String(decode_children(body, OperationKind::String)?)),
        OBJECT => Ok(Operation::Object(decode_children(body, OperationKind::Object)?)),
        _ => Err(malformed("unknown tag", map)),
    }
}

fn decode_len(value: &Value) -> Result<usize, OtError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| OtError::MalformedOperation(format!("invalid length {}", value)))
}

/// Decode the children of a string or object operation. Objects hold
/// attributes; strings hold text inserts, tombs, skips and deletes.
fn decode_children(value: &Value, parent: OperationKind) -> Result<Vec<Operation>, OtError> {
    let items = value
        .as_array()
        .ok_or_else(|| OtError::MalformedOperation(format!("expected a list of operations, got {}", value)))?;

    items
        .iter()
        .map(|item| {
            let child = decode(item)?;
            let fits = match (parent, &child) {
                (OperationKind::Object, Operation::Attribute { .. }) => true,
                (OperationKind::String, Operation::Skip(_) | Operation::Delete(_)) => true,
                (OperationKind::String, Operation::Insert { value, .. }) => value.is_string(),
                _ => false,
            };
            if !fits {
                return Err(OtError::MalformedOperation(format!(
                    "{} cannot appear inside a {:?} operation",
                    item, parent
                )));
            }
            Ok(child)
        })
        .collect()
}

fn malformed(reason: &str, map: &Map<String, Value>) -> OtError {
    OtError::MalformedOperation(format!("{}: {}", reason, Value::Object(map.clone())))
}
