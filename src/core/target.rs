// Pool file creation/opening, the persistent region table, and region I/O over a shared mapping.
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use libc::{EACCES, ENOSPC, EPERM};
use memmap2::MmapRaw;

use crate::core::alloc::Allocator;
use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::core::ids::{RegionId, TargetId};

const MAGIC: [u8; 4] = *b"BKPL";
const VERSION: u32 = 1;
const ENDIANNESS_LE: u8 = 1;
const HEADER_SIZE: usize = 4096;
const HEADER_CRC_OFFSET: usize = 72;
const SLOT_RECORD_LEN: usize = 32;
const SLOT_CRC_OFFSET: usize = 24;
const PAGE_SIZE: u64 = 4096;
const BYTES_PER_DEFAULT_SLOT: u64 = 1024;
const MIN_DEFAULT_SLOTS: u64 = 16;
const MAX_SLOTS: u64 = 1 << 20;

pub const DEFAULT_POOL_MODE: u32 = 0o644;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PoolHeader {
    pub target_id: TargetId,
    pub file_size: u64,
    pub table_offset: u64,
    pub slot_count: u32,
    pub data_offset: u64,
    pub data_size: u64,
}

impl PoolHeader {
    fn new(target_id: TargetId, file_size: u64, max_regions: Option<u32>) -> Result<Self, Error> {
        let slot_count = match max_regions {
            Some(0) => {
                return Err(Error::new(ErrorKind::InvalidArgument)
                    .with_message("max_regions must be greater than zero"));
            }
            Some(count) if u64::from(count) > MAX_SLOTS => {
                return Err(Error::new(ErrorKind::InvalidArgument)
                    .with_message(format!("max_regions must not exceed {MAX_SLOTS}")));
            }
            Some(count) => count,
            None => (file_size / BYTES_PER_DEFAULT_SLOT).clamp(MIN_DEFAULT_SLOTS, MAX_SLOTS) as u32,
        };
        let table_offset = HEADER_SIZE as u64;
        let table_end = table_offset + u64::from(slot_count) * SLOT_RECORD_LEN as u64;
        let data_offset = table_end.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        if file_size <= data_offset {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!(
                    "pool size must exceed header and region table ({data_offset} bytes)"
                ))
                .with_hint("Use a larger --size or fewer --max-regions."));
        }
        Ok(Self {
            target_id,
            file_size,
            table_offset,
            slot_count,
            data_offset,
            data_size: file_size - data_offset,
        })
    }

    fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&MAGIC);
        buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
        buf[8] = ENDIANNESS_LE;
        buf[16..32].copy_from_slice(self.target_id.as_bytes());

        write_u64(&mut buf, 32, self.file_size);
        write_u64(&mut buf, 40, self.table_offset);
        write_u64(&mut buf, 48, u64::from(self.slot_count));
        write_u64(&mut buf, 56, self.data_offset);
        write_u64(&mut buf, 64, self.data_size);

        let crc = crc32fast::hash(&buf[..HEADER_CRC_OFFSET]);
        buf[HEADER_CRC_OFFSET..HEADER_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::new(ErrorKind::Corrupt).with_message("header too small"));
        }
        if buf[0..4] != MAGIC {
            return Err(Error::new(ErrorKind::Corrupt).with_message("bad magic"));
        }
        let version = u32::from_le_bytes(read_4(buf, 4));
        if version != VERSION {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("unsupported pool format version {version}")));
        }
        if buf[8] != ENDIANNESS_LE {
            return Err(Error::new(ErrorKind::Corrupt).with_message("unsupported endianness"));
        }
        let crc = u32::from_le_bytes(read_4(buf, HEADER_CRC_OFFSET));
        if crc != crc32fast::hash(&buf[..HEADER_CRC_OFFSET]) {
            return Err(Error::new(ErrorKind::Corrupt).with_message("header checksum mismatch"));
        }

        let mut id = [0u8; 16];
        id.copy_from_slice(&buf[16..32]);
        let slot_count = read_u64(buf, 48);
        if slot_count == 0 || slot_count > MAX_SLOTS {
            return Err(Error::new(ErrorKind::Corrupt).with_message("invalid slot count"));
        }

        Ok(Self {
            target_id: TargetId::from_bytes(id),
            file_size: read_u64(buf, 32),
            table_offset: read_u64(buf, 40),
            slot_count: slot_count as u32,
            data_offset: read_u64(buf, 56),
            data_size: read_u64(buf, 64),
        })
    }

    fn validate(&self, actual_file_size: u64) -> Result<(), Error> {
        if self.file_size == 0 || self.file_size > actual_file_size {
            return Err(Error::new(ErrorKind::Corrupt).with_message("invalid file size"));
        }
        if self.table_offset != HEADER_SIZE as u64 {
            return Err(Error::new(ErrorKind::Corrupt).with_message("invalid table offset"));
        }
        let table_end = self.table_offset + u64::from(self.slot_count) * SLOT_RECORD_LEN as u64;
        if self.data_offset < table_end {
            return Err(Error::new(ErrorKind::Corrupt).with_message("data area overlaps table"));
        }
        if self.data_offset.checked_add(self.data_size) != Some(self.file_size) {
            return Err(Error::new(ErrorKind::Corrupt).with_message("data bounds mismatch"));
        }
        if self.data_size == 0 {
            return Err(Error::new(ErrorKind::Corrupt).with_message("data area is empty"));
        }
        Ok(())
    }

    fn slot_offset(&self, slot: u32) -> u64 {
        self.table_offset + u64::from(slot) * SLOT_RECORD_LEN as u64
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SlotState {
    Free = 0,
    Live = 1,
    Retired = 2,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct SlotRecord {
    state: SlotState,
    generation: u32,
    offset: u64,
    size: u64,
}

impl SlotRecord {
    const EMPTY: SlotRecord = SlotRecord {
        state: SlotState::Free,
        generation: 0,
        offset: 0,
        size: 0,
    };

    fn encode(&self) -> [u8; SLOT_RECORD_LEN] {
        let mut buf = [0u8; SLOT_RECORD_LEN];
        buf[0..4].copy_from_slice(&(self.state as u32).to_le_bytes());
        buf[4..8].copy_from_slice(&self.generation.to_le_bytes());
        write_u64(&mut buf, 8, self.offset);
        write_u64(&mut buf, 16, self.size);
        let crc = crc32fast::hash(&buf[..SLOT_CRC_OFFSET]);
        buf[SLOT_CRC_OFFSET..SLOT_CRC_OFFSET + 4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    fn decode(buf: &[u8], slot: u32) -> Result<Self, Error> {
        // make_pool leaves the table zero-filled
        if buf.iter().all(|byte| *byte == 0) {
            return Ok(Self::EMPTY);
        }
        let crc = u32::from_le_bytes(read_4(buf, SLOT_CRC_OFFSET));
        if crc != crc32fast::hash(&buf[..SLOT_CRC_OFFSET]) {
            return Err(Error::new(ErrorKind::Corrupt)
                .with_message(format!("region table slot {slot}: checksum mismatch")));
        }
        let state = match u32::from_le_bytes(read_4(buf, 0)) {
            0 => SlotState::Free,
            1 => SlotState::Live,
            2 => SlotState::Retired,
            other => {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message(format!("region table slot {slot}: invalid state {other}")));
            }
        };
        Ok(Self {
            state,
            generation: u32::from_le_bytes(read_4(buf, 4)),
            offset: read_u64(buf, 8),
            size: read_u64(buf, 16),
        })
    }
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(out)
}

fn write_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

#[derive(Clone, Copy, Debug)]
pub struct PoolOptions {
    pub file_size: u64,
    pub mode: u32,
    pub max_regions: Option<u32>,
}

impl PoolOptions {
    pub fn new(file_size: u64) -> Self {
        Self {
            file_size,
            mode: DEFAULT_POOL_MODE,
            max_regions: None,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_regions(mut self, max_regions: u32) -> Self {
        self.max_regions = Some(max_regions);
        self
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetInfo {
    pub id: TargetId,
    pub path: PathBuf,
    pub file_size: u64,
    pub data_size: u64,
    pub slot_count: u32,
    pub region_count: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

/// An attached pool. Operations on one region are serialized by that region's
/// slot lock; distinct regions only meet in the allocator during create/remove.
pub struct Target {
    path: PathBuf,
    // held for the exclusive advisory lock and the mapping's lifetime
    file: File,
    map: MmapRaw,
    header: PoolHeader,
    slots: Box<[Mutex<SlotRecord>]>,
    alloc: Mutex<Allocator>,
}

/// Creates a new pool file; never overwrites an existing path.
pub fn make_pool(path: impl AsRef<Path>, options: PoolOptions) -> Result<Target, Error> {
    Target::create(path, options)
}

impl Target {
    pub fn create(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let header = PoolHeader::new(TargetId::generate(), options.file_size, options.max_regions)?;

        let mut open = OpenOptions::new();
        open.read(true).write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            open.mode(options.mode);
        }
        let mut file = open.open(&path).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to create pool file")
                .with_path(&path)
                .with_source(err)
        })?;

        if let Err(err) = initialize(&mut file, &header, &path) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(err);
        }
        Self::from_file(file, path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to open pool file")
                    .with_path(&path)
                    .with_source(err)
            })?;
        Self::from_file(file, path)
    }

    fn from_file(mut file: File, path: PathBuf) -> Result<Self, Error> {
        file.try_lock_exclusive().map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_message("pool is attached elsewhere")
                .with_path(&path)
                .with_source(err)
        })?;

        let actual_size = file
            .metadata()
            .map(|meta| meta.len())
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;

        let header = read_header(&mut file, &path)?;
        header
            .validate(actual_size)
            .map_err(|err| err.with_path(&path))?;

        let map = MmapRaw::map_raw(&file)
            .map_err(|err| Error::new(ErrorKind::Io).with_path(&path).with_source(err))?;

        let mut records = Vec::with_capacity(header.slot_count as usize);
        let mut free_slots = Vec::new();
        let mut live = Vec::new();
        for slot in 0..header.slot_count {
            let mut buf = [0u8; SLOT_RECORD_LEN];
            copy_out(&map, header.slot_offset(slot), &mut buf);
            let record = SlotRecord::decode(&buf, slot).map_err(|err| err.with_path(&path))?;
            match record.state {
                SlotState::Free => free_slots.push(slot),
                SlotState::Live => live.push((slot, record.offset, record.size)),
                SlotState::Retired => {}
            }
            records.push(Mutex::new(record));
        }
        let alloc = Allocator::from_live(header.data_size, free_slots, live)
            .map_err(|err| err.with_path(&path))?;

        Ok(Self {
            path,
            file,
            map,
            header,
            slots: records.into_boxed_slice(),
            alloc: Mutex::new(alloc),
        })
    }

    pub fn id(&self) -> TargetId {
        self.header.target_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> PoolHeader {
        self.header
    }

    pub fn info(&self) -> TargetInfo {
        let region_count = self
            .slots
            .iter()
            .filter(|slot| lock(slot).state == SlotState::Live)
            .count() as u64;
        let alloc = lock(&self.alloc);
        TargetInfo {
            id: self.id(),
            path: self.path.clone(),
            file_size: self.header.file_size,
            data_size: self.header.data_size,
            slot_count: self.header.slot_count,
            region_count,
            used_bytes: alloc.used_bytes(),
            free_bytes: alloc.free_bytes(),
        }
    }

    pub fn create_region(&self, size: u64) -> Result<RegionId, Error> {
        if size > self.header.data_size {
            return Err(Error::new(ErrorKind::OutOfSpace)
                .with_message(format!(
                    "region of {size} bytes exceeds target capacity {}",
                    self.header.data_size
                ))
                .with_target(self.id()));
        }
        let allocation = lock(&self.alloc)
            .allocate(size)
            .map_err(|err| err.with_target(self.id()))?;

        let mut slot = lock(&self.slots[allocation.slot as usize]);
        let record = SlotRecord {
            state: SlotState::Live,
            generation: slot.generation,
            offset: allocation.offset,
            size,
        };
        let start = self.header.data_offset + allocation.offset;
        self.fill_zero(start, size);
        if let Err(err) = self
            .flush_extent(start, size)
            .and_then(|()| self.store_slot(allocation.slot, &record))
        {
            lock(&self.alloc).release(allocation.slot, allocation.offset, size, false);
            return Err(err);
        }
        *slot = record;

        Ok(RegionId::new(
            self.id(),
            allocation.slot,
            record.generation,
            record.offset,
            size,
        ))
    }

    pub fn write(&self, region: &RegionId, offset: u64, data: &[u8]) -> Result<(), Error> {
        let slot = self.lock_region(region)?;
        check_range(slot.size, offset, data.len() as u64, "write").map_err(|err| {
            err.with_target(self.id()).with_region(region)
        })?;
        self.copy_in(self.header.data_offset + slot.offset + offset, data);
        Ok(())
    }

    /// Flushes `[offset, offset + size)` of the region to stable storage.
    pub fn persist(&self, region: &RegionId, offset: u64, size: u64) -> Result<(), Error> {
        let slot = self.lock_region(region)?;
        check_range(slot.size, offset, size, "persist").map_err(|err| {
            err.with_target(self.id()).with_region(region)
        })?;
        if size == 0 {
            return Ok(());
        }
        let start = self.header.data_offset + slot.offset + offset;
        self.map
            .flush_range(start as usize, size as usize)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to persist region")
                    .with_path(&self.path)
                    .with_target(self.id())
                    .with_region(region)
                    .with_source(err)
            })
    }

    /// Returns up to `size` bytes; fewer only when the read reaches the end of the region.
    pub fn read(&self, region: &RegionId, offset: u64, size: u64) -> Result<Vec<u8>, Error> {
        let slot = self.lock_region(region)?;
        if offset > slot.size {
            return Err(Error::new(ErrorKind::OutOfBounds)
                .with_message(format!("read offset exceeds region size {}", slot.size))
                .with_target(self.id())
                .with_region(region)
                .with_offset(offset));
        }
        let len = size.min(slot.size - offset);
        let mut out = vec![0u8; len as usize];
        copy_out(&self.map, self.header.data_offset + slot.offset + offset, &mut out);
        Ok(out)
    }

    pub fn get_size(&self, region: &RegionId) -> Result<u64, Error> {
        Ok(self.lock_region(region)?.size)
    }

    pub fn remove(&self, region: &RegionId) -> Result<(), Error> {
        let slot = self.lock_region(region)?;
        self.free_locked(region, slot)
    }

    /// Removes the region only while its bytes still equal `expected`.
    /// Returns `false`, leaving the region live, when they differ.
    pub fn remove_if_unchanged(&self, region: &RegionId, expected: &[u8]) -> Result<bool, Error> {
        let slot = self.lock_region(region)?;
        if slot.size != expected.len() as u64 {
            return Ok(false);
        }
        let mut current = vec![0u8; expected.len()];
        copy_out(&self.map, self.header.data_offset + slot.offset, &mut current);
        if current != expected {
            return Ok(false);
        }
        self.free_locked(region, slot)?;
        Ok(true)
    }

    fn free_locked(
        &self,
        region: &RegionId,
        mut slot: MutexGuard<'_, SlotRecord>,
    ) -> Result<(), Error> {
        let old = *slot;
        let record = match old.generation.checked_add(1) {
            Some(generation) => SlotRecord {
                generation,
                ..SlotRecord::EMPTY
            },
            None => SlotRecord {
                state: SlotState::Retired,
                generation: old.generation,
                offset: 0,
                size: 0,
            },
        };
        self.store_slot(region.slot, &record)?;
        *slot = record;
        lock(&self.alloc).release(
            region.slot,
            old.offset,
            old.size,
            record.state == SlotState::Retired,
        );
        Ok(())
    }

    /// Create + write + persist as one failure unit: on error the region is removed again.
    pub fn create_write_persist(&self, data: &[u8]) -> Result<RegionId, Error> {
        let size = data.len() as u64;
        let region = self.create_region(size)?;
        let result = self
            .write(&region, 0, data)
            .and_then(|()| self.persist(&region, 0, size));
        if let Err(err) = result {
            if let Err(rollback) = self.remove(&region) {
                tracing::warn!(
                    target_id = %self.id(),
                    region = %region,
                    error = %rollback,
                    "failed to roll back region after create_write_persist failure"
                );
            }
            return Err(err);
        }
        Ok(region)
    }

    /// Live regions in slot order.
    pub fn list_regions(&self) -> Vec<RegionId> {
        let id = self.id();
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                let record = *lock(slot);
                (record.state == SlotState::Live).then(|| {
                    RegionId::new(id, index as u32, record.generation, record.offset, record.size)
                })
            })
            .collect()
    }

    fn lock_region(&self, region: &RegionId) -> Result<MutexGuard<'_, SlotRecord>, Error> {
        let invalid = |message: &str| {
            Error::new(ErrorKind::InvalidRegion)
                .with_message(message.to_string())
                .with_target(self.id())
                .with_region(region)
        };
        if !region.belongs_to(self.id()) {
            return Err(invalid("region belongs to a different target"));
        }
        let Some(slot) = self.slots.get(region.slot as usize) else {
            return Err(invalid("region slot out of range"));
        };
        let guard = lock(slot);
        if guard.state != SlotState::Live
            || guard.generation != region.generation
            || guard.offset != region.offset
            || guard.size != region.size
        {
            return Err(invalid("region is not live (removed or never created)"));
        }
        Ok(guard)
    }

    fn store_slot(&self, slot: u32, record: &SlotRecord) -> Result<(), Error> {
        let offset = self.header.slot_offset(slot);
        self.copy_in(offset, &record.encode());
        self.map
            .flush_range(offset as usize, SLOT_RECORD_LEN)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to persist region table")
                    .with_path(&self.path)
                    .with_target(self.id())
                    .with_source(err)
            })
    }

    /// The zeroed extent reaches disk before a Live record can point at it.
    fn flush_extent(&self, offset: u64, len: u64) -> Result<(), Error> {
        if len == 0 {
            return Ok(());
        }
        self.map
            .flush_range(offset as usize, len as usize)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to clear region extent")
                    .with_path(&self.path)
                    .with_target(self.id())
                    .with_source(err)
            })
    }

    fn copy_in(&self, offset: u64, data: &[u8]) {
        debug_assert!(offset as usize + data.len() <= self.map.len());
        // SAFETY: callers hold the slot lock that owns this range, and every range
        // was bounds-checked against the validated header.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.map.as_mut_ptr().add(offset as usize),
                data.len(),
            );
        }
    }

    fn fill_zero(&self, offset: u64, len: u64) {
        debug_assert!((offset + len) as usize <= self.map.len());
        // SAFETY: same ownership rule as `copy_in`.
        unsafe {
            std::ptr::write_bytes(self.map.as_mut_ptr().add(offset as usize), 0, len as usize);
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("path", &self.path)
            .field("file", &self.file)
            .finish()
    }
}

fn copy_out(map: &MmapRaw, offset: u64, out: &mut [u8]) {
    debug_assert!(offset as usize + out.len() <= map.len());
    // SAFETY: see `Target::copy_in`; readers hold the owning slot lock too.
    unsafe {
        std::ptr::copy_nonoverlapping(
            map.as_ptr().add(offset as usize),
            out.as_mut_ptr(),
            out.len(),
        );
    }
}

fn check_range(region_size: u64, offset: u64, len: u64, op: &str) -> Result<(), Error> {
    match offset.checked_add(len) {
        Some(end) if end <= region_size => Ok(()),
        _ => Err(Error::new(ErrorKind::OutOfBounds)
            .with_message(format!(
                "{op} of {len} bytes exceeds region size {region_size}"
            ))
            .with_offset(offset)),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn initialize(file: &mut File, header: &PoolHeader, path: &Path) -> Result<(), Error> {
    file.set_len(header.file_size)
        .map_err(|err| reserve_error(err, path))?;
    file.allocate(header.file_size)
        .map_err(|err| reserve_error(err, path))?;
    write_header(file, header, path)?;
    file.sync_all()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))
}

fn reserve_error(err: io::Error, path: &Path) -> Error {
    let message = if err.raw_os_error() == Some(ENOSPC) {
        "not enough space to reserve pool"
    } else {
        "failed to reserve pool space"
    };
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn read_header(file: &mut File, path: &Path) -> Result<PoolHeader, Error> {
    let mut buf = [0u8; HEADER_SIZE];
    file.seek(SeekFrom::Start(0))
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    file.read_exact(&mut buf).map_err(|err| {
        let kind = if err.kind() == io::ErrorKind::UnexpectedEof {
            ErrorKind::Corrupt
        } else {
            ErrorKind::Io
        };
        Error::new(kind)
            .with_message("failed to read pool header")
            .with_path(path)
            .with_source(err)
    })?;
    PoolHeader::decode(&buf).map_err(|err| err.with_path(path))
}

fn write_header(file: &mut File, header: &PoolHeader, path: &Path) -> Result<(), Error> {
    let buf = header.encode();
    file.seek(SeekFrom::Start(0))
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    file.write_all(&buf)
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    file.flush()
        .map_err(|err| Error::new(ErrorKind::Io).with_path(path).with_source(err))?;
    Ok(())
}
