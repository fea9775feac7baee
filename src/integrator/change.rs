use std::collections::HashSet;

use crate::history::Causal;
use crate::ot::{discards, prune, transform, Mutation, OtError, Prunable};
use crate::permission::{prune_permission, transform_permission, transform_permission_pair, Permission};

/// A blob the integrator applies: a content edit or a permission change
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    Mutation(Mutation),
    Permission(Permission),
}

impl Change {
    pub fn id(&self) -> &str {
        match self {
            Change::Mutation(m) => &m.id,
            Change::Permission(p) => &p.id,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        match self {
            Change::Mutation(m) => &m.dependencies,
            Change::Permission(p) => &p.dependencies,
        }
    }

    /// Re-express this change so it applies after `against`.
    ///
    /// Mutations and permissions edit disjoint state, so a change of one
    /// kind passes through the other untouched.
    pub fn transform(&self, against: &Change) -> Result<Change, OtError> {
        match (self, against) {
            (Change::Mutation(m), Change::Mutation(other)) => Ok(Change::Mutation(transform(m, other)?.0)),
            (Change::Permission(p), Change::Permission(other)) => {
                Ok(Change::Permission(transform_permission(p, other)?))
            }
            _ => Ok(self.clone()),
        }
    }

    /// Transform two concurrent changes against each other
    pub fn transform_pair(&self, other: &Change) -> Result<(Change, Change), OtError> {
        match (self, other) {
            (Change::Mutation(a), Change::Mutation(b)) => {
                let (a, b) = transform(a, b)?;
                Ok((Change::Mutation(a), Change::Mutation(b)))
            }
            (Change::Permission(a), Change::Permission(b)) => {
                let (a, b) = transform_permission_pair(a, b)?;
                Ok((Change::Permission(a), Change::Permission(b)))
            }
            _ => Ok((self.clone(), other.clone())),
        }
    }

    /// Whether transforming past `against` drops part of this change.
    /// Permissions never lose bits silently; they conflict instead.
    pub fn discards(&self, against: &Change) -> bool {
        match (self, against) {
            (Change::Mutation(m), Change::Mutation(other)) => discards(m, other),
            _ => false,
        }
    }
}

impl From<Mutation> for Change {
    fn from(m: Mutation) -> Self {
        Change::Mutation(m)
    }
}

impl From<Permission> for Change {
    fn from(p: Permission) -> Self {
        Change::Permission(p)
    }
}

impl Causal for Change {
    fn id(&self) -> &str {
        Change::id(self)
    }

    fn dependencies(&self) -> &[String] {
        Change::dependencies(self)
    }
}

impl Prunable for Change {
    fn id(&self) -> &str {
        Change::id(self)
    }

    fn prune(&self, removed: &Self) -> Result<(Self, Self), OtError> {
        match (self, removed) {
            (Change::Mutation(m), Change::Mutation(gone)) => {
                let (m, gone) = prune(m, gone)?;
                Ok((Change::Mutation(m), Change::Mutation(gone)))
            }
            // Permission state is a flat bitmask: only the later entry remembers
            // what it was transformed against
            (Change::Permission(p), Change::Permission(gone)) => {
                let set: HashSet<String> = [gone.id.clone()].into_iter().collect();
                Ok((Change::Permission(prune_permission(p, &set)?), removed.clone()))
            }
            _ => Ok((self.clone(), removed.clone())),
        }
    }
}
