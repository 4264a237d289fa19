//! Error Taxonomy
//!
//! Every failure a node can report is one of these types. Startup problems surface as
//! [`ConfigurationError`], the durable state file as [`StorageError`], outbound hops as
//! [`ForwardingError`]. [`RouteError`] is what a single routing decision can end in.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to read topology '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed topology document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Topology must declare at least one partition")]
    NoPartitions,

    #[error("Partition {partition} is out of range (partition count is {count})")]
    PartitionOutOfRange { partition: u32, count: u32 },

    #[error("Partition {partition} is assigned to both '{first}' and '{second}'")]
    DuplicateAssignment {
        partition: u32,
        first: String,
        second: String,
    },

    #[error("Edge '{0}' is declared more than once")]
    DuplicateEdge(String),

    #[error("Edge '{id}' has an invalid address '{address}'")]
    InvalidAddress { id: String, address: String },

    #[error("Edge '{0}' needs either 'address' or both 'ip' and 'port'")]
    IncompleteEdge(String),

    #[error("Node '{0}' has no edge entry")]
    MissingEdge(String),

    #[error("Invalid node configuration: {0}")]
    InvalidNode(String),

    #[error("Node id '{id}' is longer than {max} bytes")]
    NodeNameTooLong { id: String, max: usize },

    #[error("Node '{node}' routes to {needed} destinations but its state file has {max} slots")]
    TooManyDestinations { node: String, needed: u64, max: u64 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file '{path}' is not a record mesh state file")]
    BadMagic { path: String },

    #[error("State file '{path}' has unsupported layout version {version}")]
    UnsupportedVersion { path: String, version: u64 },

    #[error("State file '{path}' is {actual} bytes, header declares {expected}")]
    Truncated {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("List '{list}' reached its declared capacity of {capacity}")]
    CapacityExhausted { list: String, capacity: u64 },

    #[error("All {max} destination slots are in use, cannot track '{destination}'")]
    DestinationSlotsExhausted { destination: String, max: u64 },

    #[error("Destination name '{0}' does not fit in a slot descriptor")]
    DestinationNameTooLong(String),

    #[error("Invalid state layout: {0}")]
    InvalidLayout(String),

    #[error("State store lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ForwardingError {
    #[error("Transport failure calling {address}: {message}")]
    Transport { address: String, message: String },

    #[error("Remote node at {address} rejected the record: {detail}")]
    Rejected { address: String, detail: String },

    #[error("Record {id} exceeded the hop limit of {limit}")]
    HopLimit { id: u64, limit: u32 },
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Record {id} hashed to partition {partition}, which no node owns")]
    Unroutable { id: u64, partition: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Forwarding(#[from] ForwardingError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Local table write failed: {0}")]
    Table(#[source] std::io::Error),
}

impl RouteError {
    /// Coarse reason reported back to the caller in the response `detail`.
    pub fn reason(&self) -> &'static str {
        match self {
            RouteError::Unroutable { .. } => "unroutable record",
            RouteError::Forwarding(_) => "forwarding failure",
            RouteError::Configuration(_) => "invalid configuration",
            RouteError::Storage(_) | RouteError::Table(_) => "internal error",
        }
    }
}
