//! Record Mesh Library
//!
//! Core modules of a content-routing node. Each node of the mesh receives records,
//! hashes them to a partition and either stores them locally or forwards them to the
//! partition's owner. It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`config`**: Startup parameters from flags and `MESH_*` environment variables.
//! - **`error`**: Typed failures shared by every layer.
//! - **`router`**: The routing decision engine, its RPC protocol and axum handlers.
//! - **`state`**: The durable per-node state file (counter, history, routed lists),
//!   memory-mapped and synced after every mutation.
//! - **`table`**: The append-only local record table.
//! - **`topology`**: The static partition map and node address book.

pub mod config;
pub mod error;
pub mod router;
pub mod state;
pub mod table;
pub mod topology;
