use crate::history::Seq;
use crate::ot::{Operation, OtError};
use crate::permission::{Permission, PermissionAction};

/// Receives every change a document applies, in local application order.
///
/// Each callback fires exactly once per applied blob.
pub trait Consumer: Send + Sync {
    /// `op` is the edit as applied locally, after rebasing
    fn on_mutation_applied(&self, _document_id: &str, _op: &Operation, _seq: Seq) {}

    fn on_permission_applied(&self, _document_id: &str, _action: PermissionAction, _permission: &Permission) {}

    fn on_integration_failed(&self, _document_id: &str, _change_id: &str, _error: &OtError) {}
}
