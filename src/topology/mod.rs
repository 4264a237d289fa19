//! Topology Module
//!
//! Static description of the mesh, loaded once when a node starts.
//!
//! ## Core Concepts
//! - **Edges**: map each logical node name to the `host:port` its endpoint listens on.
//! - **Partition assignment**: one declarative `owners` map shared by every node, so the
//!   whole mesh agrees on which node owns which hash partition.
//! - **Collector**: the terminal node. With `residual_to_collector` it absorbs every
//!   partition nobody else claims; otherwise unclaimed partitions are gaps.
//!
//! A node refuses to start if the document is missing, malformed, or does not cover
//! the nodes it may need to forward to.

pub mod table;
pub mod types;

pub use table::TopologyTable;
pub use types::{EdgeEntry, NodeName, TopologyDocument};
