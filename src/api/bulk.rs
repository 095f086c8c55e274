//! Purpose: Process-local registry of exposed bulk buffers.
//! Exports: `BulkRegistry`, `BulkHandle`, `BulkAccess`.
//! Role: Backing store for proxy reads/writes; served remotely under `/v0/bulk/{id}`.
//! Invariants: Handles are unique per registry and never reused after release.
//! Invariants: Pull/push ranges must lie inside the exposed buffer.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BulkHandle {
    pub id: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BulkAccess {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl BulkAccess {
    fn allows_read(self) -> bool {
        matches!(self, BulkAccess::ReadOnly | BulkAccess::ReadWrite)
    }

    fn allows_write(self) -> bool {
        matches!(self, BulkAccess::WriteOnly | BulkAccess::ReadWrite)
    }
}

struct Exposed {
    access: BulkAccess,
    data: RwLock<Vec<u8>>,
}

#[derive(Default)]
pub struct BulkRegistry {
    next_id: AtomicU64,
    buffers: Mutex<HashMap<u64, Arc<Exposed>>>,
}

impl BulkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose(&self, data: Vec<u8>, access: BulkAccess) -> BulkHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let size = data.len() as u64;
        let exposed = Arc::new(Exposed {
            access,
            data: RwLock::new(data),
        });
        self.lock().insert(id, exposed);
        BulkHandle { id, size }
    }

    /// Copies `size` bytes starting at `offset` out of an exposed buffer.
    pub fn pull(&self, id: u64, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let exposed = self.get(id)?;
        if !exposed.access.allows_read() {
            return Err(access_error(id, "read"));
        }
        let data = exposed.data.read().unwrap_or_else(|poison| poison.into_inner());
        let range = checked_range(id, data.len(), offset, size)?;
        Ok(data[range].to_vec())
    }

    pub fn push(&self, id: u64, offset: u64, bytes: &[u8]) -> Result<(), Error> {
        let exposed = self.get(id)?;
        if !exposed.access.allows_write() {
            return Err(access_error(id, "write"));
        }
        let mut data = exposed.data.write().unwrap_or_else(|poison| poison.into_inner());
        let range = checked_range(id, data.len(), offset, bytes.len() as u64)?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Releases the handle and returns the buffer contents.
    pub fn take(&self, id: u64) -> Option<Vec<u8>> {
        let exposed = self.lock().remove(&id)?;
        let data = match Arc::try_unwrap(exposed) {
            Ok(exposed) => exposed
                .data
                .into_inner()
                .unwrap_or_else(|poison| poison.into_inner()),
            Err(shared) => shared
                .data
                .read()
                .unwrap_or_else(|poison| poison.into_inner())
                .clone(),
        };
        Some(data)
    }

    pub fn release(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: u64) -> Result<Arc<Exposed>, Error> {
        self.lock().get(&id).cloned().ok_or_else(|| {
            Error::new(ErrorKind::NotFound).with_message(format!("bulk handle {id} is not exposed"))
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Exposed>>> {
        self.buffers.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

fn checked_range(id: u64, len: usize, offset: u64, size: u64) -> Result<std::ops::Range<usize>, Error> {
    match offset.checked_add(size) {
        Some(end) if end <= len as u64 => Ok(offset as usize..end as usize),
        _ => Err(Error::new(ErrorKind::OutOfBounds)
            .with_message(format!(
                "bulk handle {id}: range of {size} bytes exceeds buffer size {len}"
            ))
            .with_offset(offset)),
    }
}

fn access_error(id: u64, action: &str) -> Error {
    Error::new(ErrorKind::Permission).with_message(format!("bulk handle {id} does not allow {action}"))
}
