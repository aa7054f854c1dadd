//! Correlation domain: id spaces, allocation and the pending-request registry.

mod id;
mod registry;

pub use id::{CorrelationId, CorrelationIdAllocator, IdSpace};
pub use registry::{
    CorrelationRegistry, Occupied, PendingRequest, RegistryStats, Respond, Responder,
};
