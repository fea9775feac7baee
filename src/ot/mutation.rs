//! Mutations: an operation with causal metadata

use super::operation::Operation;

/// A content edit authored by one site on top of its dependencies
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    /// Globally unique, normally the blob ref of the encoded mutation
    pub id: String,

    /// Authoring session; breaks ties between concurrent mutations
    pub site: String,

    /// Explicit causal predecessors
    pub dependencies: Vec<String>,

    pub op: Operation,

    /// Local sequence number, set by the site that applied it
    pub applied_at: Option<u64>,
}

impl Mutation {
    pub fn new(
        id: impl Into<String>,
        site: impl Into<String>,
        dependencies: Vec<String>,
        op: Operation,
    ) -> Self {
        Self {
            id: id.into(),
            site: site.into(),
            dependencies,
            op,
            applied_at: None,
        }
    }

    /// The same mutation carrying a different operation
    pub fn with_op(&self, op: Operation) -> Self {
        Self {
            op,
            ..self.clone()
        }
    }

    /// Total order used to break ties between concurrent mutations
    pub fn order_key(&self) -> (&str, &str) {
        (&self.site, &self.id)
    }

    /// Whether this mutation sorts before `other` in the tie-break order
    pub fn precedes(&self, other: &Mutation) -> bool {
        self.order_key() < other.order_key()
    }
}
