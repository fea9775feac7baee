//! Document values and operation execution
//!
//! A document is a JSON-like tree whose strings remember every position that
//! was ever inserted. Deleted positions stay behind as tombs so that
//! operations authored against older states still line up.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::error::OtError;
use super::operation::{Operation, OperationKind};

/// A string with tombs
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Text {
    cells: Vec<Option<char>>,
}

impl Text {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of positions, tombs included
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of deleted positions
    pub fn tombs(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// The visible text
    pub fn render(&self) -> String {
        self.cells.iter().flatten().collect()
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self {
            cells: text.chars().map(Some).collect(),
        }
    }
}

/// A document value
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Document {
    #[default]
    Null,
    Text(Text),
    Object(BTreeMap<String, Document>),
    /// Any other JSON value, replaced as a whole
    Value(Value),
}

impl Document {
    pub fn text(text: &str) -> Self {
        Document::Text(Text::from(text))
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Document::Null,
            Value::String(text) => Document::text(text),
            Value::Object(map) => Document::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Document::from_json(value)))
                    .collect(),
            ),
            other => Document::Value(other.clone()),
        }
    }

    /// The visible JSON value; tombs are dropped
    pub fn to_json(&self) -> Value {
        match self {
            Document::Null => Value::Null,
            Document::Text(text) => Value::String(text.render()),
            Document::Object(map) => {
                let mut out = Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.to_json());
                }
                Value::Object(out)
            }
            Document::Value(value) => value.clone(),
        }
    }

    /// The visible text of a string document
    pub fn render(&self) -> Option<String> {
        match self {
            Document::Text(text) => Some(text.render()),
            Document::Null => Some(String::new()),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        match self {
            Document::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// The operation kind that edits this shape of document
    fn edit_kind(&self) -> OperationKind {
        match self {
            Document::Null => OperationKind::NoOp,
            Document::Text(_) => OperationKind::String,
            Document::Object(_) => OperationKind::Object,
            Document::Value(_) => OperationKind::Insert,
        }
    }
}

/// Apply an operation, producing a new document
pub fn execute(doc: &Document, op: &Operation) -> Result<Document, OtError> {
    match op {
        Operation::NoOp => Ok(doc.clone()),
        Operation::Insert { value, .. } => Ok(Document::from_json(value)),
        Operation::String(children) => {
            let text = match doc {
                Document::Null => Text::new(),
                Document::Text(text) => text.clone(),
                other => return Err(OtError::mismatch(other.edit_kind(), OperationKind::String)),
            };
            Ok(Document::Text(execute_text(&text, children)?))
        }
        Operation::Object(children) => {
            let mut map = match doc {
                Document::Null => BTreeMap::new(),
                Document::Object(map) => map.clone(),
                other => return Err(OtError::mismatch(other.edit_kind(), OperationKind::Object)),
            };
            for child in children {
                let Operation::Attribute { key, op } = child else {
                    return Err(OtError::MalformedOperation(format!(
                        "{:?} cannot appear inside an object operation",
                        child.kind()
                    )));
                };
                let current = map.get(key).cloned().unwrap_or_default();
                match execute(&current, op)? {
                    Document::Null => map.remove(key),
                    value => map.insert(key.clone(), value),
                };
            }
            Ok(Document::Object(map))
        }
        other => Err(OtError::MalformedOperation(format!(
            "{:?} cannot be applied to a whole value",
            other.kind()
        ))),
    }
}

fn execute_text(text: &Text, children: &[Operation]) -> Result<Text, OtError> {
    let mut cells = Vec::with_capacity(text.len());
    let mut pos = 0;

    for child in children {
        match child {
            Operation::NoOp => {}
            Operation::Skip(n) | Operation::Delete(n) => {
                let end = pos + n;
                if end > text.len() {
                    return Err(OtError::StreamLengthMismatch(format!(
                        "operation covers {} positions, text has {}",
                        end,
                        text.len()
                    )));
                }
                if matches!(child, Operation::Skip(_)) {
                    cells.extend_from_slice(&text.cells[pos..end]);
                } else {
                    cells.extend(std::iter::repeat(None).take(*n));
                }
                pos = end;
            }
            Operation::Insert { len, value } => {
                if child.is_tomb() {
                    cells.extend(std::iter::repeat(None).take(*len));
                } else if let Some(inserted) = value.as_str() {
                    cells.extend(inserted.chars().map(Some));
                } else {
                    return Err(OtError::MalformedOperation(format!(
                        "string insert carries a non-string value: {}",
                        value
                    )));
                }
            }
            other => {
                return Err(OtError::MalformedOperation(format!(
                    "{:?} cannot appear inside a string operation",
                    other.kind()
                )))
            }
        }
    }

    if pos != text.len() {
        return Err(OtError::StreamLengthMismatch(format!(
            "operation covers {} positions, text has {}",
            pos,
            text.len()
        )));
    }
    Ok(Text { cells })
}
