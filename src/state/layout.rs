//! On-disk layout of the state file.
//!
//! All integers are little-endian `u64` words. The file is a fixed header, then
//! `max_destinations` slot descriptors, then the history array, then one routed
//! array per slot. Capacities live in the header, so a reader can decode the file
//! with nothing but its bytes.

use super::store::StateSnapshot;
use crate::error::StorageError;
use std::collections::BTreeMap;
use std::path::Path;

pub const MAGIC: u64 = u64::from_le_bytes(*b"RMSTATE1");
pub const LAYOUT_VERSION: u64 = 1;

pub const WORD: usize = 8;
pub const HEADER_WORDS: usize = 9;
pub const HEADER_BYTES: usize = HEADER_WORDS * WORD;

pub const SLOT_NAME_BYTES: usize = 16;
/// Name, list length, reserved word.
pub const SLOT_BYTES: usize = SLOT_NAME_BYTES + 2 * WORD;

pub const DEFAULT_HISTORY_CAPACITY: u64 = 1024;
pub const DEFAULT_ROUTED_CAPACITY: u64 = 100_000;
pub const DEFAULT_MAX_DESTINATIONS: u64 = 8;

/// Word index of each header field.
pub mod field {
    pub const MAGIC: usize = 0;
    pub const VERSION: usize = 1;
    pub const COUNTER: usize = 2;
    pub const HISTORY_LEN: usize = 3;
    pub const HISTORY_HEAD: usize = 4;
    pub const HISTORY_CAPACITY: usize = 5;
    pub const ROUTED_CAPACITY: usize = 6;
    pub const MAX_DESTINATIONS: usize = 7;
    pub const DESTINATIONS_IN_USE: usize = 8;
}

/// Declared capacities of a state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    pub history_capacity: u64,
    /// Capacity of each per-destination routed list.
    pub routed_capacity: u64,
    pub max_destinations: u64,
}

impl Default for StateLayout {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            routed_capacity: DEFAULT_ROUTED_CAPACITY,
            max_destinations: DEFAULT_MAX_DESTINATIONS,
        }
    }
}

impl StateLayout {
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.history_capacity == 0 || self.routed_capacity == 0 || self.max_destinations == 0
        {
            return Err(StorageError::InvalidLayout(format!(
                "capacities must be non-zero: {:?}",
                self
            )));
        }
        let total = self
            .checked_total_bytes()
            .ok_or_else(|| StorageError::InvalidLayout(format!("{:?} overflows", self)))?;
        if usize::try_from(total).is_err() {
            return Err(StorageError::InvalidLayout(format!(
                "{} bytes cannot be mapped on this platform",
                total
            )));
        }
        Ok(())
    }

    fn checked_total_bytes(&self) -> Option<u64> {
        let slots = self.max_destinations.checked_mul(SLOT_BYTES as u64)?;
        let routed_words = self.routed_capacity.checked_mul(self.max_destinations)?;
        let words = self.history_capacity.checked_add(routed_words)?;
        (HEADER_BYTES as u64)
            .checked_add(slots)?
            .checked_add(words.checked_mul(WORD as u64)?)
    }

    /// Size of the whole file. Only meaningful for a validated layout.
    pub fn total_bytes(&self) -> u64 {
        self.checked_total_bytes().unwrap_or(u64::MAX)
    }

    pub fn slot_offset(&self, slot: usize) -> usize {
        HEADER_BYTES + slot * SLOT_BYTES
    }

    pub fn history_offset(&self) -> usize {
        HEADER_BYTES + self.max_destinations as usize * SLOT_BYTES
    }

    pub fn history_entry_offset(&self, index: u64) -> usize {
        self.history_offset() + index as usize * WORD
    }

    pub fn routed_entry_offset(&self, slot: usize, index: u64) -> usize {
        let lists = self.history_offset() + self.history_capacity as usize * WORD;
        lists + (slot * self.routed_capacity as usize + index as usize) * WORD
    }
}

pub fn read_word(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; WORD];
    buf.copy_from_slice(&bytes[offset..offset + WORD]);
    u64::from_le_bytes(buf)
}

pub fn write_word(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + WORD].copy_from_slice(&value.to_le_bytes());
}

pub fn header_word(bytes: &[u8], index: usize) -> u64 {
    read_word(bytes, index * WORD)
}

pub fn set_header_word(bytes: &mut [u8], index: usize, value: u64) {
    write_word(bytes, index * WORD, value);
}

/// Writes a fresh header and empty slot table for `layout`.
pub fn initialize(bytes: &mut [u8], layout: &StateLayout) {
    bytes[..layout.history_offset()].fill(0);
    set_header_word(bytes, field::MAGIC, MAGIC);
    set_header_word(bytes, field::VERSION, LAYOUT_VERSION);
    set_header_word(bytes, field::HISTORY_CAPACITY, layout.history_capacity);
    set_header_word(bytes, field::ROUTED_CAPACITY, layout.routed_capacity);
    set_header_word(bytes, field::MAX_DESTINATIONS, layout.max_destinations);
}

/// Reads and checks the header of an existing file, returning the layout it declares.
pub fn read_layout(bytes: &[u8], path: &Path) -> Result<StateLayout, StorageError> {
    let display = || path.display().to_string();

    if bytes.len() < HEADER_BYTES || header_word(bytes, field::MAGIC) != MAGIC {
        return Err(StorageError::BadMagic { path: display() });
    }
    let version = header_word(bytes, field::VERSION);
    if version != LAYOUT_VERSION {
        return Err(StorageError::UnsupportedVersion {
            path: display(),
            version,
        });
    }

    let layout = StateLayout {
        history_capacity: header_word(bytes, field::HISTORY_CAPACITY),
        routed_capacity: header_word(bytes, field::ROUTED_CAPACITY),
        max_destinations: header_word(bytes, field::MAX_DESTINATIONS),
    };
    layout.validate()?;

    let expected = layout.total_bytes();
    if (bytes.len() as u64) < expected {
        return Err(StorageError::Truncated {
            path: display(),
            expected,
            actual: bytes.len() as u64,
        });
    }

    let in_use = header_word(bytes, field::DESTINATIONS_IN_USE);
    let history_len = header_word(bytes, field::HISTORY_LEN);
    let history_head = header_word(bytes, field::HISTORY_HEAD);
    if in_use > layout.max_destinations
        || history_len > layout.history_capacity
        || history_head >= layout.history_capacity
    {
        return Err(StorageError::InvalidLayout(format!(
            "header of '{}' is inconsistent with its declared capacities",
            display()
        )));
    }
    Ok(layout)
}

pub fn encode_slot_name(name: &str) -> Result<[u8; SLOT_NAME_BYTES], StorageError> {
    let raw = name.as_bytes();
    if raw.is_empty() || raw.len() > SLOT_NAME_BYTES || raw.contains(&0) {
        return Err(StorageError::DestinationNameTooLong(name.to_string()));
    }
    let mut encoded = [0u8; SLOT_NAME_BYTES];
    encoded[..raw.len()].copy_from_slice(raw);
    Ok(encoded)
}

pub fn slot_name(bytes: &[u8], layout: &StateLayout, slot: usize) -> String {
    let offset = layout.slot_offset(slot);
    let raw = &bytes[offset..offset + SLOT_NAME_BYTES];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(SLOT_NAME_BYTES);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

pub fn slot_len(bytes: &[u8], layout: &StateLayout, slot: usize) -> u64 {
    read_word(bytes, layout.slot_offset(slot) + SLOT_NAME_BYTES)
}

pub fn set_slot_len(bytes: &mut [u8], layout: &StateLayout, slot: usize, len: u64) {
    write_word(bytes, layout.slot_offset(slot) + SLOT_NAME_BYTES, len);
}

/// Decodes every counter and list from a validated region.
pub fn decode_snapshot(bytes: &[u8], layout: &StateLayout, user_id: &str) -> StateSnapshot {
    let history_len = header_word(bytes, field::HISTORY_LEN);
    let history_head = header_word(bytes, field::HISTORY_HEAD);
    let history = (0..history_len)
        .map(|i| {
            let index = (history_head + i) % layout.history_capacity;
            read_word(bytes, layout.history_entry_offset(index))
        })
        .collect();

    let in_use = header_word(bytes, field::DESTINATIONS_IN_USE) as usize;
    let mut routed = BTreeMap::new();
    for slot in 0..in_use {
        let len = slot_len(bytes, layout, slot).min(layout.routed_capacity);
        let ids = (0..len)
            .map(|i| read_word(bytes, layout.routed_entry_offset(slot, i)))
            .collect();
        routed.insert(slot_name(bytes, layout, slot), ids);
    }

    StateSnapshot {
        user_id: user_id.to_string(),
        counter: header_word(bytes, field::COUNTER),
        history,
        history_capacity: layout.history_capacity,
        routed_capacity: layout.routed_capacity,
        routed,
    }
}
