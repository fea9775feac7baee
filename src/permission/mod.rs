//! Permission algebra
//!
//! A permission blob changes the access bits of one user. `allow` holds the
//! bits being granted. `deny` is a keep mask: a cleared bit is being revoked.
//! Concurrent permissions for the same user are transformed so that each bit
//! is granted or revoked at most once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ot::OtError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    pub dependencies: Vec<String>,
    pub user: String,
    pub allow: u64,
    pub deny: u64,

    /// Permissions this value has been transformed against, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Permission>,

    pub original_allow: u64,
    pub original_deny: u64,
}

/// What an applied permission did to the user's bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionAction {
    Grant,
    Revoke,
    Change,
    Unchanged,
}

impl Permission {
    pub fn new(
        id: impl Into<String>,
        user: impl Into<String>,
        allow: u64,
        deny: u64,
        dependencies: Vec<String>,
    ) -> Result<Self, OtError> {
        let user = user.into();
        let overlap = allow & !deny;
        if overlap != 0 {
            return Err(OtError::ConflictingPermission { user, bits: overlap });
        }
        Ok(Self {
            id: id.into(),
            dependencies,
            user,
            allow,
            deny,
            history: Vec::new(),
            original_allow: allow,
            original_deny: deny,
        })
    }

    /// Bits this permission revokes
    pub fn revoked(&self) -> u64 {
        !self.deny
    }

    pub fn action(&self) -> PermissionAction {
        match (self.allow != 0, self.revoked() != 0) {
            (true, false) => PermissionAction::Grant,
            (false, true) => PermissionAction::Revoke,
            (true, true) => PermissionAction::Change,
            (false, false) => PermissionAction::Unchanged,
        }
    }

    /// The permission with its transform history and originals dropped
    fn stripped(&self) -> Permission {
        Permission {
            history: Vec::new(),
            original_allow: self.allow,
            original_deny: self.deny,
            ..self.clone()
        }
    }
}

/// Re-express `p` so that it applies after `against`.
pub fn transform_permission(p: &Permission, against: &Permission) -> Result<Permission, OtError> {
    if p.user != against.user {
        return Ok(p.clone());
    }

    let conflict = (p.allow & against.revoked()) | (p.revoked() & against.allow);
    if conflict != 0 {
        return Err(OtError::ConflictingPermission {
            user: p.user.clone(),
            bits: conflict,
        });
    }

    let mut result = p.clone();
    result.allow &= !(against.allow | against.revoked());
    result.deny |= against.revoked();
    result.history.push(against.stripped());
    Ok(result)
}

/// Transform two concurrent permissions against each other
pub fn transform_permission_pair(
    a: &Permission,
    b: &Permission,
) -> Result<(Permission, Permission), OtError> {
    Ok((transform_permission(a, b)?, transform_permission(b, a)?))
}

/// Recompute `p` as if it had never been transformed against the entries of
/// `prune_set`.
pub fn prune_permission(p: &Permission, prune_set: &HashSet<String>) -> Result<Permission, OtError> {
    let mut result = Permission {
        allow: p.original_allow,
        deny: p.original_deny,
        history: Vec::new(),
        ..p.clone()
    };
    for past in p.history.iter().filter(|past| !prune_set.contains(&past.id)) {
        result = transform_permission(&result, past)?;
    }
    Ok(result)
}

/// Apply a permission to a user's current bits
pub fn execute_permission(bits: u64, p: &Permission) -> Result<u64, OtError> {
    let granted = bits & p.allow;
    if granted != 0 {
        return Err(OtError::AlreadyGranted(granted));
    }
    let missing = p.revoked() & !bits;
    if missing != 0 {
        return Err(OtError::AlreadyRevoked(missing));
    }
    Ok((bits | p.allow) & p.deny)
}
