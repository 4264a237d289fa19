use super::types::{NodeName, TopologyDocument};
use crate::error::ConfigurationError;
use crate::state::layout::SLOT_NAME_BYTES;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Resolved, validated view of the topology document.
///
/// Built once at startup and never mutated afterwards; a topology change means
/// restarting the nodes.
#[derive(Debug, Clone)]
pub struct TopologyTable {
    partition_count: u32,
    addresses: HashMap<NodeName, String>,
    assignment: Vec<Option<NodeName>>,
    collector: Option<NodeName>,
}

impl TopologyTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|source| ConfigurationError::Unreadable {
                path: path.display().to_string(),
                source,
            })?;
        let table = Self::from_json(&text)?;

        tracing::info!(
            "Loaded topology from {}: {} partitions, {} edges",
            path.display(),
            table.partition_count,
            table.addresses.len()
        );
        Ok(table)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigurationError> {
        let document: TopologyDocument = serde_json::from_str(text)?;
        Self::from_document(document)
    }

    pub fn from_document(document: TopologyDocument) -> Result<Self, ConfigurationError> {
        if document.partitions == 0 {
            return Err(ConfigurationError::NoPartitions);
        }

        let mut addresses = HashMap::new();
        for edge in &document.edges {
            check_node_id(&edge.id)?;
            let address = edge.resolved_address()?;
            if addresses.insert(NodeName::new(&edge.id), address).is_some() {
                return Err(ConfigurationError::DuplicateEdge(edge.id.clone()));
            }
        }

        let mut assignment: Vec<Option<NodeName>> = vec![None; document.partitions as usize];
        for (owner, partitions) in &document.owners {
            let owner = NodeName::new(owner);
            if !addresses.contains_key(&owner) {
                return Err(ConfigurationError::MissingEdge(owner.0));
            }
            for &partition in partitions {
                let slot = assignment.get_mut(partition as usize).ok_or(
                    ConfigurationError::PartitionOutOfRange {
                        partition,
                        count: document.partitions,
                    },
                )?;
                if let Some(first) = slot {
                    return Err(ConfigurationError::DuplicateAssignment {
                        partition,
                        first: first.0.clone(),
                        second: owner.0,
                    });
                }
                *slot = Some(owner.clone());
            }
        }

        let collector = document.collector.map(NodeName);
        if let Some(collector) = &collector {
            if !addresses.contains_key(collector) {
                return Err(ConfigurationError::MissingEdge(collector.0.clone()));
            }
            if document.residual_to_collector {
                for slot in assignment.iter_mut().filter(|slot| slot.is_none()) {
                    *slot = Some(collector.clone());
                }
            }
        }

        Ok(Self {
            partition_count: document.partitions,
            addresses,
            assignment,
            collector,
        })
    }

    /// Checks that `node` can serve with this topology: it must have an edge of its
    /// own and every node it may forward to must resolve.
    pub fn validate_for(&self, node: &NodeName) -> Result<(), ConfigurationError> {
        self.resolve(node)?;
        for target in self.fan_out(node) {
            self.resolve(&target)?;
        }
        Ok(())
    }

    pub fn resolve(&self, node: &NodeName) -> Result<&str, ConfigurationError> {
        self.addresses
            .get(node)
            .map(String::as_str)
            .ok_or_else(|| ConfigurationError::MissingEdge(node.0.clone()))
    }

    pub fn owner_of(&self, partition: u32) -> Option<&NodeName> {
        self.assignment
            .get(partition as usize)
            .and_then(|owner| owner.as_ref())
    }

    pub fn owned_partitions(&self, node: &NodeName) -> Vec<u32> {
        (0..self.partition_count)
            .filter(|&partition| self.owner_of(partition) == Some(node))
            .collect()
    }

    /// Distinct nodes, other than `node` itself, that `node` may forward records to.
    pub fn fan_out(&self, node: &NodeName) -> Vec<NodeName> {
        let targets: BTreeSet<&NodeName> = self
            .assignment
            .iter()
            .flatten()
            .filter(|owner| *owner != node)
            .collect();
        targets.into_iter().cloned().collect()
    }

    /// Partitions that no node owns.
    pub fn gaps(&self) -> Vec<u32> {
        (0..self.partition_count)
            .filter(|&partition| self.owner_of(partition).is_none())
            .collect()
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn collector(&self) -> Option<&NodeName> {
        self.collector.as_ref()
    }

    pub fn nodes(&self) -> Vec<NodeName> {
        let mut nodes: Vec<NodeName> = self.addresses.keys().cloned().collect();
        nodes.sort();
        nodes
    }
}

/// Node ids double as destination slot names in the state file.
fn check_node_id(id: &str) -> Result<(), ConfigurationError> {
    if id.is_empty() || id.contains('\0') {
        return Err(ConfigurationError::InvalidNode(format!("invalid node id {:?}", id)));
    }
    if id.len() > SLOT_NAME_BYTES {
        return Err(ConfigurationError::NodeNameTooLong {
            id: id.to_string(),
            max: SLOT_NAME_BYTES,
        });
    }
    Ok(())
}
