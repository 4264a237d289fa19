//! Content Router Module
//!
//! Decides, per record, whether this node keeps it or passes it on.
//!
//! ## Decision Procedure
//! 1. **Partition**: SHA-256 of the payload, first four bytes as `u32`, modulo the
//!    topology's partition count.
//! 2. **Owned here**: append the row to the local table, bump the durable counter and
//!    record the row index under this node's own routed list.
//! 3. **Owned elsewhere**: record the id under the owner's routed list, then forward
//!    the record unchanged. The caller only sees success if the owner acknowledges.
//! 4. **No owner**: reported as [`crate::error::RouteError::Unroutable`], never dropped silently.
//!
//! ## Submodules
//! - **`partition`**: payload → partition hashing.
//! - **`router`**: the decision engine ([`ContentRouter`]).
//! - **`transport`**: outbound RPC seam ([`RecordTransport`]) and its HTTP implementation.
//! - **`protocol`**: endpoints and DTOs.
//! - **`handlers`**: axum handlers exposing the router.

pub mod handlers;
pub mod partition;
pub mod protocol;
pub mod router;
pub mod transport;

pub use partition::Partitioner;
pub use protocol::{SubmitRecordRequest, SubmitRecordResponse, SubmitStatus};
pub use router::{ContentRouter, Disposition, RouteOutcome};
pub use transport::{HttpTransport, RecordTransport};
