use super::layout::{self, StateLayout, field};
use super::mapped::MappedFile;
use crate::error::StorageError;
use crate::topology::NodeName;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const STATE_FILE_SUFFIX: &str = "_shared_data.bin";

/// File name of the state file backing `user_id`.
pub fn state_file_name(user_id: &str) -> String {
    format!("{}{}", user_id, STATE_FILE_SUFFIX)
}

/// Point-in-time copy of a node's durable state. Inspection only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub user_id: String,
    pub counter: u64,
    /// Oldest first.
    pub history: Vec<u64>,
    pub history_capacity: u64,
    pub routed_capacity: u64,
    pub routed: BTreeMap<String, Vec<u64>>,
}

impl StateSnapshot {
    pub fn routed_total(&self) -> usize {
        self.routed.values().map(Vec::len).sum()
    }

    pub fn routed_to(&self, destination: &str) -> &[u64] {
        self.routed
            .get(destination)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Memory-mapped durable state of one node identity.
///
/// Every mutating call is flushed with `msync(MS_SYNC)` before it returns, so a
/// successful return means the update is on disk.
pub struct StateStore {
    user_id: String,
    path: PathBuf,
    layout: StateLayout,
    map: MappedFile,
}

impl StateStore {
    /// Opens the state file for `user_id` inside `data_dir`, creating it with
    /// `layout` if it does not exist yet.
    pub fn open(
        data_dir: impl AsRef<Path>,
        user_id: &str,
        layout: StateLayout,
    ) -> Result<Self, StorageError> {
        let path = data_dir.as_ref().join(state_file_name(user_id));
        Self::open_path(path, user_id, layout)
    }

    /// Like [`StateStore::open`] but with an explicit file path.
    ///
    /// An existing file keeps the capacities declared in its own header;
    /// `requested` only applies when the file is created.
    pub fn open_path(
        path: impl Into<PathBuf>,
        user_id: &str,
        requested: StateLayout,
    ) -> Result<Self, StorageError> {
        let path = path.into();
        requested.validate()?;

        let (mut map, created) = MappedFile::open(&path, requested.total_bytes())?;
        let layout = if created {
            layout::initialize(map.bytes_mut(), &requested);
            map.flush()?;
            requested
        } else {
            layout::read_layout(map.bytes(), &path)?
        };

        let store = Self {
            user_id: user_id.to_string(),
            path,
            layout,
            map,
        };
        tracing::info!(
            "{} state file {} (counter={}, history {}/{}, routed capacity {} x {})",
            if created { "Created" } else { "Opened" },
            store.path.display(),
            store.counter(),
            store.header(field::HISTORY_LEN),
            layout.history_capacity,
            layout.max_destinations,
            layout.routed_capacity,
        );
        Ok(store)
    }

    /// Decodes a state file without mapping it writable, for external inspection.
    pub fn inspect(path: impl AsRef<Path>, user_id: &str) -> Result<StateSnapshot, StorageError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let layout = layout::read_layout(&bytes, path)?;
        Ok(layout::decode_snapshot(&bytes, &layout, user_id))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    pub fn counter(&self) -> u64 {
        self.header(field::COUNTER)
    }

    pub fn increment_counter(&mut self) -> Result<u64, StorageError> {
        let counter = self.counter() + 1;
        self.set_header(field::COUNTER, counter);
        self.map.flush()?;
        Ok(counter)
    }

    /// Appends to the bounded history, evicting the oldest entry when full.
    pub fn record_history(&mut self, record_id: u64) -> Result<(), StorageError> {
        let capacity = self.layout.history_capacity;
        let len = self.header(field::HISTORY_LEN);
        let head = self.header(field::HISTORY_HEAD);

        if len < capacity {
            let offset = self.layout.history_entry_offset((head + len) % capacity);
            layout::write_word(self.map.bytes_mut(), offset, record_id);
            self.set_header(field::HISTORY_LEN, len + 1);
        } else {
            let offset = self.layout.history_entry_offset(head);
            layout::write_word(self.map.bytes_mut(), offset, record_id);
            self.set_header(field::HISTORY_HEAD, (head + 1) % capacity);
        }

        self.map.flush()?;
        Ok(())
    }

    /// Appends `record_id` to the list kept for `destination` and returns the new
    /// list length. Fails instead of dropping the id when the list is full.
    pub fn record_routed(
        &mut self,
        record_id: u64,
        destination: &NodeName,
    ) -> Result<u64, StorageError> {
        let slot = match self.find_slot(destination.as_str()) {
            Some(slot) => slot,
            None => self.claim_slot(destination.as_str())?,
        };

        let len = layout::slot_len(self.map.bytes(), &self.layout, slot);
        if len >= self.layout.routed_capacity {
            return Err(StorageError::CapacityExhausted {
                list: format!("routed to {}", destination),
                capacity: self.layout.routed_capacity,
            });
        }

        let offset = self.layout.routed_entry_offset(slot, len);
        let declared = self.layout;
        let bytes = self.map.bytes_mut();
        layout::write_word(bytes, offset, record_id);
        layout::set_slot_len(bytes, &declared, slot, len + 1);

        self.map.flush()?;
        Ok(len + 1)
    }

    /// Fails exactly when `record_routed(_, destination)` would, without writing.
    pub fn ensure_routed_room(&self, destination: &NodeName) -> Result<(), StorageError> {
        let name = destination.as_str();
        match self.find_slot(name) {
            Some(slot) => {
                if layout::slot_len(self.map.bytes(), &self.layout, slot)
                    >= self.layout.routed_capacity
                {
                    return Err(StorageError::CapacityExhausted {
                        list: format!("routed to {}", destination),
                        capacity: self.layout.routed_capacity,
                    });
                }
            }
            None => {
                layout::encode_slot_name(name)?;
                if self.header(field::DESTINATIONS_IN_USE) >= self.layout.max_destinations {
                    return Err(StorageError::DestinationSlotsExhausted {
                        destination: name.to_string(),
                        max: self.layout.max_destinations,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        layout::decode_snapshot(self.map.bytes(), &self.layout, &self.user_id)
    }

    fn find_slot(&self, name: &str) -> Option<usize> {
        let in_use = self.header(field::DESTINATIONS_IN_USE) as usize;
        (0..in_use).find(|&slot| layout::slot_name(self.map.bytes(), &self.layout, slot) == name)
    }

    fn claim_slot(&mut self, name: &str) -> Result<usize, StorageError> {
        let encoded = layout::encode_slot_name(name)?;
        let in_use = self.header(field::DESTINATIONS_IN_USE);
        if in_use >= self.layout.max_destinations {
            return Err(StorageError::DestinationSlotsExhausted {
                destination: name.to_string(),
                max: self.layout.max_destinations,
            });
        }

        let slot = in_use as usize;
        let offset = self.layout.slot_offset(slot);
        let declared = self.layout;
        let bytes = self.map.bytes_mut();
        bytes[offset..offset + layout::SLOT_NAME_BYTES].copy_from_slice(&encoded);
        layout::set_slot_len(bytes, &declared, slot, 0);
        self.set_header(field::DESTINATIONS_IN_USE, in_use + 1);

        tracing::debug!("Claimed state slot {} for destination {}", slot, name);
        Ok(slot)
    }

    fn header(&self, index: usize) -> u64 {
        layout::header_word(self.map.bytes(), index)
    }

    fn set_header(&mut self, index: usize, value: u64) {
        layout::set_header_word(self.map.bytes_mut(), index, value);
    }
}

/// Shared, serialized access to a node's [`StateStore`].
///
/// All mutations of one node identity go through a single mutex, so concurrent
/// requests never interleave inside the mapped region.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<Mutex<StateStore>>,
    layout: StateLayout,
}

impl StateHandle {
    pub fn new(store: StateStore) -> Self {
        Self {
            layout: store.layout(),
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Capacities of the underlying file. Fixed once the store is open.
    pub fn layout(&self) -> StateLayout {
        self.layout
    }

    /// Runs `f` with exclusive access to the store. Use this when several
    /// mutations must not be interleaved with other requests.
    pub fn with<R, E>(
        &self,
        f: impl FnOnce(&mut StateStore) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let mut store = self.inner.lock().map_err(StorageError::from)?;
        f(&mut *store)
    }

    pub fn increment_counter(&self) -> Result<u64, StorageError> {
        self.with(|store| store.increment_counter())
    }

    pub fn record_history(&self, record_id: u64) -> Result<(), StorageError> {
        self.with(|store| store.record_history(record_id))
    }

    pub fn record_routed(&self, record_id: u64, destination: &NodeName) -> Result<u64, StorageError> {
        self.with(|store| store.record_routed(record_id, destination))
    }

    pub fn snapshot(&self) -> Result<StateSnapshot, StorageError> {
        self.with(|store| Ok(store.snapshot()))
    }
}
