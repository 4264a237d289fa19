//! Durable State Module
//!
//! Per-node routing state kept in a memory-mapped file that survives restarts.
//!
//! ## Contents
//! - **Counter**: records committed by this node. Monotonic, never reset.
//! - **History**: the ids of the last N records this node received (FIFO eviction).
//! - **Routed lists**: per destination node, the ids this node committed or forwarded there.
//!
//! The file is a fixed header followed by declared-capacity arrays (see [`layout`]),
//! so it can be decoded by a separate reader while the node is down. Every mutation
//! is synced to disk before returning; there is no write-behind.
//!
//! A node owns exactly one [`StateHandle`], which serializes all mutations behind
//! a single mutex.

pub mod layout;
pub mod mapped;
pub mod store;

pub use layout::StateLayout;
pub use store::{StateHandle, StateSnapshot, StateStore, state_file_name};
