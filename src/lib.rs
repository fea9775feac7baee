// Braid - causal operational transformation for collaborative documents

pub mod history;
pub mod integrator;
pub mod ot;
pub mod permission;
pub mod replica;
pub mod storage;

pub use history::{Frontier, History, HistoryGraph};
pub use integrator::{Change, Consumer, Integrator, Status};
pub use ot::{Document, Mutation, Operation, OtError};
pub use permission::{Permission, PermissionAction};
pub use replica::{Delivery, Replica, ReplicaConfig, ReplicaError};
