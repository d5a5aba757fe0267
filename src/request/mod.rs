pub mod store;
pub mod types;

pub use store::RequestStore;
pub use types::{ApprovalRequest, ApprovalStatus, MutationKind, RequestId};
