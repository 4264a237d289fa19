//! Record Submission Protocol
//!
//! Endpoints and Data Transfer Objects for the one inbound operation a node exposes,
//! plus the read-only inspection endpoints.
//!
//! Records are submitted as JSON over HTTP. A forward hop re-sends the exact same
//! request body to the owner, with only `hops` incremented.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Submit a record to this node (clients and forwarding nodes alike).
pub const ENDPOINT_SUBMIT: &str = "/submit";
/// Point-in-time snapshot of the durable state.
pub const ENDPOINT_STATE: &str = "/internal/state";
/// This node's view of the partition assignment.
pub const ENDPOINT_TOPOLOGY: &str = "/internal/topology";

// --- Data Transfer Objects ---

/// `SubmitRecord(id, payload, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRecordRequest {
    /// Record identifier assigned by the originating client.
    pub id: u64,
    /// Opaque delimited row; hashed as raw bytes.
    pub payload: String,
    /// Submission time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Number of forward hops this record has already taken.
    #[serde(default)]
    pub hops: u32,
}

impl SubmitRecordRequest {
    pub fn new(id: u64, payload: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id,
            payload: payload.into(),
            timestamp,
            hops: 0,
        }
    }

    /// The same record, one hop further along.
    pub fn next_hop(&self) -> Self {
        Self {
            hops: self.hops + 1,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRecordResponse {
    pub status: SubmitStatus,
    /// Coarse failure reason; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SubmitRecordResponse {
    pub fn success() -> Self {
        Self {
            status: SubmitStatus::Success,
            detail: None,
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SubmitStatus::Success
    }
}

/// Response of [`ENDPOINT_TOPOLOGY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyResponse {
    pub node_id: String,
    pub partitions: u32,
    pub owned: Vec<u32>,
    pub fan_out: Vec<String>,
    pub gaps: Vec<u32>,
}
