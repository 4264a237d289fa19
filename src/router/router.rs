use super::partition::Partitioner;
use super::protocol::{SubmitRecordRequest, TopologyResponse};
use super::transport::RecordTransport;
use crate::error::{ConfigurationError, ForwardingError, RouteError};
use crate::state::{StateHandle, StateSnapshot};
use crate::table::{LocalTable, split_fields};
use crate::topology::{NodeName, TopologyTable};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a record ended up after this node handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Owned here: appended to the local table and recorded in the state store.
    Committed { partition: u32, row_index: u64 },
    /// Owned elsewhere: the owner acknowledged the forwarded record.
    Forwarded {
        partition: u32,
        destination: NodeName,
    },
}

/// Terminal state of one record on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Committed,
    Acked,
    Failed,
    Dropped,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Disposition::Committed => "COMMITTED",
            Disposition::Acked => "ACKED",
            Disposition::Failed => "FAILED",
            Disposition::Dropped => "DROPPED",
        };
        f.write_str(name)
    }
}

impl RouteOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            RouteOutcome::Committed { .. } => Disposition::Committed,
            RouteOutcome::Forwarded { .. } => Disposition::Acked,
        }
    }
}

impl RouteError {
    pub fn disposition(&self) -> Disposition {
        match self {
            RouteError::Unroutable { .. } => Disposition::Dropped,
            _ => Disposition::Failed,
        }
    }
}

/// The routing decision engine of one node.
///
/// Hashes each record to a partition and either commits it locally or forwards it,
/// unchanged, to the partition's owner.
pub struct ContentRouter {
    node_id: NodeName,
    topology: Arc<TopologyTable>,
    partitioner: Partitioner,
    state: StateHandle,
    table: Arc<LocalTable>,
    transport: Arc<dyn RecordTransport>,
    /// Row indices for records whose leading field is not a valid id.
    fallback_rows: AtomicU64,
}

impl ContentRouter {
    pub fn new(
        node_id: NodeName,
        topology: Arc<TopologyTable>,
        state: StateHandle,
        table: Arc<LocalTable>,
        transport: Arc<dyn RecordTransport>,
    ) -> Result<Self, ConfigurationError> {
        topology.validate_for(&node_id)?;

        // One slot for this node's own commits plus one per forward target.
        let needed = topology.fan_out(&node_id).len() as u64 + 1;
        let max = state.layout().max_destinations;
        if needed > max {
            return Err(ConfigurationError::TooManyDestinations {
                node: node_id.to_string(),
                needed,
                max,
            });
        }

        let owned = topology.owned_partitions(&node_id);
        let fan_out = topology.fan_out(&node_id);
        tracing::info!(
            "Node {} owns partitions {:?} of {}, forwards to {:?}",
            node_id,
            owned,
            topology.partition_count(),
            fan_out
        );
        if let Some(collector) = topology.collector() {
            tracing::info!("Collector node is {}", collector);
        }
        let gaps = topology.gaps();
        if !gaps.is_empty() {
            tracing::warn!(
                "Partitions {:?} have no owner; records hashing there will be reported as unroutable",
                gaps
            );
        }

        Ok(Self {
            node_id,
            partitioner: Partitioner::new(topology.partition_count()),
            topology,
            state,
            table,
            transport,
            fallback_rows: AtomicU64::new(0),
        })
    }

    pub fn node_id(&self) -> &NodeName {
        &self.node_id
    }

    pub fn snapshot(&self) -> Result<StateSnapshot, RouteError> {
        Ok(self.state.snapshot()?)
    }

    pub fn topology_view(&self) -> TopologyResponse {
        TopologyResponse {
            node_id: self.node_id.to_string(),
            partitions: self.topology.partition_count(),
            owned: self.topology.owned_partitions(&self.node_id),
            fan_out: self
                .topology
                .fan_out(&self.node_id)
                .into_iter()
                .map(|node| node.0)
                .collect(),
            gaps: self.topology.gaps(),
        }
    }

    /// Handles one inbound record end to end.
    pub async fn submit(&self, request: SubmitRecordRequest) -> Result<RouteOutcome, RouteError> {
        self.state.record_history(request.id)?;

        let partition = self.partitioner.get_partition(request.payload.as_bytes());
        tracing::debug!(
            "Node {}: record {} -> partition {} (hops={})",
            self.node_id,
            request.id,
            partition,
            request.hops
        );

        match self.topology.owner_of(partition) {
            Some(owner) if owner == &self.node_id => self.commit(&request, partition),
            Some(owner) => self.forward(&request, partition, owner.clone()).await,
            None => {
                tracing::warn!(
                    "Node {}: record {} hashed to unowned partition {}",
                    self.node_id,
                    request.id,
                    partition
                );
                Err(RouteError::Unroutable {
                    id: request.id,
                    partition,
                })
            }
        }
    }

    fn commit(
        &self,
        request: &SubmitRecordRequest,
        partition: u32,
    ) -> Result<RouteOutcome, RouteError> {
        let fields = split_fields(&request.payload);
        let row_index = match fields.first().and_then(|field| parse_row_index(field)) {
            Some(index) => index,
            None => {
                let index = self.fallback_rows.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    "Node {}: record {} has no numeric leading field, using local row {}",
                    self.node_id,
                    request.id,
                    index
                );
                index
            }
        };

        // A full routed list must leave neither a table row nor a counter bump.
        let counter = self.state.with(|store| -> Result<u64, RouteError> {
            store.ensure_routed_room(&self.node_id)?;
            self.table.append(fields).map_err(RouteError::Table)?;
            store.record_routed(row_index, &self.node_id)?;
            Ok(store.increment_counter()?)
        })?;

        tracing::info!(
            "Node {}: committed record {} as row {} (partition {}, total {})",
            self.node_id,
            request.id,
            row_index,
            partition,
            counter
        );
        Ok(RouteOutcome::Committed {
            partition,
            row_index,
        })
    }

    async fn forward(
        &self,
        request: &SubmitRecordRequest,
        partition: u32,
        destination: NodeName,
    ) -> Result<RouteOutcome, RouteError> {
        let limit = self.partitioner.num_partitions();
        if request.hops >= limit {
            return Err(ForwardingError::HopLimit {
                id: request.id,
                limit,
            }
            .into());
        }

        let address = self.topology.resolve(&destination)?.to_string();

        // Kept even if the hop below fails: this is an audit trail, not a commit.
        self.state.record_routed(request.id, &destination)?;

        tracing::info!(
            "Node {}: forwarding record {} to {} at {} (partition {})",
            self.node_id,
            request.id,
            destination,
            address,
            partition
        );
        match self.transport.submit(&address, &request.next_hop()).await {
            Ok(_) => Ok(RouteOutcome::Forwarded {
                partition,
                destination,
            }),
            Err(e) => {
                tracing::error!(
                    "Node {}: failed to forward record {} to {}: {}",
                    self.node_id,
                    request.id,
                    destination,
                    e
                );
                Err(e.into())
            }
        }
    }
}

/// Reads the declared primary key from a row's leading field.
pub fn parse_row_index(field: &str) -> Option<u64> {
    field.trim().trim_matches('"').trim().parse().ok()
}
