use sha2::{Digest, Sha256};

/// Maps payloads onto the topology-wide partition space.
///
/// The key is the first four bytes of the payload's SHA-256 digest read as a
/// little-endian `u32`, reduced modulo the partition count. No per-node input goes
/// into the hash, so every node computes the same partition for the same payload.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    num_partitions: u32,
}

impl Partitioner {
    pub fn new(num_partitions: u32) -> Self {
        Self {
            num_partitions: num_partitions.max(1),
        }
    }

    pub fn num_partitions(&self) -> u32 {
        self.num_partitions
    }

    pub fn hash(payload: &[u8]) -> u32 {
        let digest = Sha256::digest(payload);
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    pub fn get_partition(&self, payload: &[u8]) -> u32 {
        Self::hash(payload) % self.num_partitions
    }
}
