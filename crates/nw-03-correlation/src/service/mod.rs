//! Connection service and the `Requester` seam.

mod connection;
mod requester;

pub use connection::{Connection, ConnectionBuilder};
pub use requester::{ArmHook, PendingResponse, RequestHandle, Requester};
