//! Causal integration of mutation and permission blobs
//!
//! An `Integrator` owns one document. Blobs may arrive in any order: a blob
//! whose dependencies are not all applied waits in the pending queue and is
//! released when the last one lands. Applying a blob rolls back the part of
//! the local history it has not seen, rebases the blob over it and records
//! the rebased form.

mod change;
mod consumer;
mod entry;
mod pending;
mod rebase;

pub use change::Change;
pub use consumer::Consumer;
pub use entry::Entry;
pub use pending::PendingQueue;

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::history::{Frontier, History, HistoryGraph, Seq};
use crate::ot::{execute, transform, Document, Mutation, Operation, OtError};
use crate::permission::execute_permission;
use rebase::{Frame, Rebased};

/// Rollbacks deeper than this are logged
pub const DEFAULT_ROLLBACK_WARN_THRESHOLD: usize = 256;

/// Outcome of handing a change to the integrator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Applied,
    /// Waiting for a dependency; retried automatically
    Pending,
    /// Already applied or already waiting
    Duplicate,
}

pub struct Integrator {
    document_id: String,
    site: String,
    content: Document,
    permissions: BTreeMap<String, u64>,
    history: History<Entry>,
    frontier: Frontier,
    pending: PendingQueue,
    consumers: Vec<Arc<dyn Consumer>>,
    rollback_warn_threshold: usize,
}

impl Integrator {
    pub fn new(document_id: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            site: site.into(),
            content: Document::Null,
            permissions: BTreeMap::new(),
            history: History::new(),
            frontier: Frontier::new(),
            pending: PendingQueue::new(),
            consumers: Vec::new(),
            rollback_warn_threshold: DEFAULT_ROLLBACK_WARN_THRESHOLD,
        }
    }

    pub fn with_rollback_warn_threshold(mut self, threshold: usize) -> Self {
        self.rollback_warn_threshold = threshold;
        self
    }

    pub fn add_consumer(&mut self, consumer: Arc<dyn Consumer>) {
        self.consumers.push(consumer);
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn content(&self) -> &Document {
        &self.content
    }

    /// The visible text, if the document is a string
    pub fn render(&self) -> Option<String> {
        self.content.render()
    }

    pub fn permissions(&self) -> &BTreeMap<String, u64> {
        &self.permissions
    }

    pub fn permission_bits(&self, user: &str) -> u64 {
        self.permissions.get(user).copied().unwrap_or(0)
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn history(&self) -> &History<Entry> {
        &self.history
    }

    pub fn is_applied(&self, id: &str) -> bool {
        self.history.contains(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Dependencies some pending change is still waiting for
    pub fn missing_dependencies(&self) -> Vec<String> {
        self.pending.missing()
    }

    /// Integrate a change and everything it unblocks.
    ///
    /// Fails only if this change cannot be applied; the document is left as
    /// it was. Failures of released dependents are logged and reported to
    /// consumers.
    pub fn integrate(&mut self, change: impl Into<Change>) -> Result<Status, OtError> {
        let change = change.into();
        let id = change.id().to_string();

        if self.history.contains(&id) || self.pending.contains(&id) {
            log::debug!("Ignoring duplicate {} for {}", id, self.document_id);
            return Ok(Status::Duplicate);
        }

        let missing: Vec<String> = change
            .dependencies()
            .iter()
            .filter(|dep| !self.history.contains(dep))
            .cloned()
            .collect();
        if !missing.is_empty() {
            let err = OtError::DependencyUnsatisfied(missing.join(", "));
            log::debug!("Queueing {} for {}: {}", id, self.document_id, err);
            self.pending.enqueue(change, &missing);
            return Ok(Status::Pending);
        }

        if let Err(err) = self.apply(change) {
            self.report_failure(&id, &err);
            return Err(err);
        }
        self.release(&id);
        Ok(Status::Applied)
    }

    /// Author a mutation on top of the local state.
    ///
    /// `op` was written against the state after sequence `apply_after`; it is
    /// rebased over everything applied since. The returned mutation depends
    /// on the current frontier and has no id until its blob is stored.
    pub fn create_mutation(&self, op: Operation, apply_after: Seq) -> Result<Mutation, OtError> {
        let mut mutation = Mutation::new("", self.site.clone(), self.frontier.to_vec(), op);
        let newer = self.history.since(apply_after.saturating_add(1));
        for applied in newer.iter().filter_map(Entry::mutation) {
            mutation = transform(&mutation, applied)?.0;
        }
        execute(&self.content, &mutation.op)?;
        mutation.dependencies = self.frontier.to_vec();
        Ok(mutation)
    }

    /// Sequence number of the newest applied change
    pub fn last_seq(&self) -> Seq {
        self.history.len() as Seq
    }

    fn report_failure(&self, id: &str, err: &OtError) {
        log::warn!("Failed to integrate {} into {}: {}", id, self.document_id, err);
        for consumer in &self.consumers {
            consumer.on_integration_failed(&self.document_id, id, err);
        }
    }

    fn release(&mut self, applied: &str) {
        let mut ready: VecDeque<Change> = self.pending.release(applied).into();
        while let Some(change) = ready.pop_front() {
            let id = change.id().to_string();
            log::debug!("Releasing {} for {}", id, self.document_id);
            match self.apply(change) {
                Ok(()) => ready.extend(self.pending.release(&id)),
                Err(err) => self.report_failure(&id, &err),
            }
        }
    }

    /// Rebase a change whose dependencies are all applied and commit it
    fn apply(&mut self, change: Change) -> Result<(), OtError> {
        let (rebased, foreign) = self.rebase(&change)?;
        let seq = self.history.len() as Seq + 1;

        let applied = match rebased.change {
            Change::Mutation(mut mutation) => {
                let content = execute(&self.content, &mutation.op)?;
                self.content = content;
                mutation.applied_at = Some(seq);
                self.frontier.add(&mutation.id, &mutation.dependencies);
                log::info!("Applied mutation {} to {} at {}", mutation.id, self.document_id, seq);
                for consumer in &self.consumers {
                    consumer.on_mutation_applied(&self.document_id, &mutation.op, seq);
                }
                Change::Mutation(mutation)
            }
            Change::Permission(permission) => {
                let bits = execute_permission(self.permission_bits(&permission.user), &permission)?;
                self.permissions.insert(permission.user.clone(), bits);
                self.frontier.add(&permission.id, &permission.dependencies);
                log::info!(
                    "Applied permission {} for {} on {} at {}",
                    permission.id,
                    permission.user,
                    self.document_id,
                    seq
                );
                let action = permission.action();
                for consumer in &self.consumers {
                    consumer.on_permission_applied(&self.document_id, action, &permission);
                }
                Change::Permission(permission)
            }
        };

        if rebased.partial {
            log::debug!("{} lost part of its edit to a concurrent replacement", change.id());
            self.history.push(Entry::partial(applied, change, foreign));
        } else {
            self.history.push(Entry::new(applied));
        }
        Ok(())
    }

    /// Express `change` against the full local history. Also returns the
    /// entries it was rebased over.
    fn rebase(&self, change: &Change) -> Result<(Rebased, HashSet<String>), OtError> {
        let mut graph = HistoryGraph::new(&self.frontier, change.dependencies());
        let mut depth = 0;
        let mut foreign = HashSet::new();

        for entry in self.history.iter_rev() {
            if graph.test() {
                break;
            }
            if !graph.substitute(entry.id(), entry.dependencies()) {
                foreign.insert(entry.id().to_string());
            }
            depth += 1;
        }

        if depth > self.rollback_warn_threshold {
            log::warn!(
                "Rolling back {} entries of {} to integrate {}",
                depth,
                self.document_id,
                change.id()
            );
        }

        let rebased = rebase::rebase(&Frame::new(&self.history), change, &foreign)?;
        Ok((rebased, foreign))
    }
}
