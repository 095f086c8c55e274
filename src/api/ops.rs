//! Purpose: Region operations on (target, region) pairs, bulk proxies, and migration.
//! Exports: `MigrationDestination`, `MigratedRegion`, `MigratedTarget`; region ops on `Provider`.
//! Role: The operation set served over RPC and mirrored by `ProviderHandle`.
//! Invariants: A region is removed from its source only after the destination persisted it.
//! Invariants: Destination failures surface as `PartialMigration` and leave the source intact.
//! Invariants: A drained source pool is deleted only when no region appeared meanwhile.
//! Invariants: Proxy transfers never report success on a short bulk count.
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::bulk::BulkHandle;
use crate::api::client::{Client, ProviderHandle};
use crate::api::provider::Provider;
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{RegionId, TargetId};

/// Receiving side of a migration.
pub trait MigrationDestination {
    fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error>;

    /// Attaches the pool at `path`, creating it with `size` bytes if it does not exist.
    fn ensure_target(&self, path: &str, size: u64) -> Result<TargetId, Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MigratedRegion {
    pub source: RegionId,
    pub dest: RegionId,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MigratedTarget {
    pub target: TargetId,
    pub regions: Vec<MigratedRegion>,
}

impl Provider {
    pub fn create(&self, target: TargetId, size: u64) -> Result<RegionId, Error> {
        let region = self
            .target(target)?
            .create_region(size)
            .map_err(|err| err.or_target(target))?;
        tracing::debug!(provider_id = self.id(), target_id = %target, region = %region, size, "region created");
        Ok(region)
    }

    pub fn write(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        self.target(target)?.write(region, offset, data)?;
        tracing::debug!(provider_id = self.id(), region = %region, offset, len = data.len(), "region write");
        Ok(())
    }

    pub fn persist(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        size: u64,
    ) -> Result<(), Error> {
        self.target(target)?.persist(region, offset, size)
    }

    pub fn read(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, Error> {
        self.target(target)?.read(region, offset, size)
    }

    pub fn get_size(&self, target: TargetId, region: &RegionId) -> Result<u64, Error> {
        self.target(target)?.get_size(region)
    }

    pub fn remove(&self, target: TargetId, region: &RegionId) -> Result<(), Error> {
        self.target(target)?.remove(region)?;
        tracing::debug!(provider_id = self.id(), target_id = %target, region = %region, "region removed");
        Ok(())
    }

    pub fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
        let region = self
            .target(target)?
            .create_write_persist(data)
            .map_err(|err| err.or_target(target))?;
        tracing::debug!(provider_id = self.id(), target_id = %target, region = %region, len = data.len(), "region create_write_persist");
        Ok(region)
    }

    pub fn list_regions(&self, target: TargetId) -> Result<Vec<RegionId>, Error> {
        Ok(self.target(target)?.list_regions())
    }

    /// Pulls `size` bytes of `bulk` (owned by `remote_address`, or this process when
    /// empty) starting at `remote_offset`, and writes them into the region at `offset`.
    #[allow(clippy::too_many_arguments)]
    pub fn proxy_write(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        bulk: BulkHandle,
        remote_offset: u64,
        remote_address: &str,
        size: u64,
    ) -> Result<(), Error> {
        let handle = self.target(target)?;
        let region_size = handle.get_size(region)?;
        if offset.checked_add(size).is_none_or(|end| end > region_size) {
            return Err(Error::new(ErrorKind::OutOfBounds)
                .with_message(format!(
                    "proxy write of {size} bytes exceeds region size {region_size}"
                ))
                .with_target(target)
                .with_region(region)
                .with_offset(offset));
        }
        let data = self
            .transport()
            .pull(remote_address, bulk, remote_offset, size)
            .map_err(|err| err.or_target(target).or_region(region))?;
        handle.write(region, offset, &data)?;
        tracing::debug!(provider_id = self.id(), region = %region, offset, size, remote_address, "region proxy_write");
        Ok(())
    }

    /// Reads up to `size` bytes of the region and pushes them into `bulk`.
    /// Returns the number of bytes transferred (short only at the region tail).
    #[allow(clippy::too_many_arguments)]
    pub fn proxy_read(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        bulk: BulkHandle,
        remote_offset: u64,
        remote_address: &str,
        size: u64,
    ) -> Result<u64, Error> {
        let data = self.read(target, region, offset, size)?;
        self.transport()
            .push(remote_address, bulk, remote_offset, &data)
            .map_err(|err| err.or_target(target).or_region(region))?;
        tracing::debug!(provider_id = self.id(), region = %region, offset, bytes = data.len(), remote_address, "region proxy_read");
        Ok(data.len() as u64)
    }

    pub fn proxy_create_write_persist(
        &self,
        target: TargetId,
        bulk: BulkHandle,
        remote_offset: u64,
        remote_address: &str,
        size: u64,
    ) -> Result<RegionId, Error> {
        self.target(target)?;
        let data = self
            .transport()
            .pull(remote_address, bulk, remote_offset, size)
            .map_err(|err| err.or_target(target))?;
        self.create_write_persist(target, &data)
    }

    /// Copies a region to the provider at (`dest_address`, `dest_provider_id`).
    /// `size` is the region size, or `0` to use the size recorded in the id.
    #[allow(clippy::too_many_arguments)]
    pub fn migrate_region(
        &self,
        target: TargetId,
        region: &RegionId,
        size: u64,
        remove_source: bool,
        dest_address: &str,
        dest_provider_id: u16,
        dest_target: TargetId,
    ) -> Result<RegionId, Error> {
        let dest = self
            .remote_destination(dest_address, dest_provider_id)
            .map_err(|err| destination_failed(err, target, Some(region)))?;
        self.migrate_region_to(target, region, size, remove_source, &dest, dest_target)
    }

    /// Copies the region into `dest_target` through `dest`. With `remove_source`,
    /// the source is removed only if its bytes still equal the copy; a write that
    /// lands meanwhile keeps the source and reports `PartialMigration`.
    pub fn migrate_region_to(
        &self,
        target: TargetId,
        region: &RegionId,
        size: u64,
        remove_source: bool,
        dest: &dyn MigrationDestination,
        dest_target: TargetId,
    ) -> Result<RegionId, Error> {
        let source = self.target(target)?;
        let region_size = source.get_size(region)?;
        if size != 0 && size != region_size {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!(
                    "migration size {size} does not match region size {region_size}"
                ))
                .with_target(target)
                .with_region(region));
        }
        let data = source.read(region, 0, region_size)?;
        let moved = dest
            .create_write_persist(dest_target, &data)
            .map_err(|err| destination_failed(err, target, Some(region)))?;

        if remove_source {
            match source.remove_if_unchanged(region, &data) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(region = %region, dest_region = %moved, "source changed during migration");
                    return Err(Error::new(ErrorKind::PartialMigration)
                        .with_message(format!(
                            "source region changed while copying; destination copy {moved} is stale and the source was kept"
                        ))
                        .with_target(target)
                        .with_region(region));
                }
                Err(err) => {
                    tracing::warn!(region = %region, dest_region = %moved, error = %err, "source removal failed after migration");
                    return Err(Error::new(ErrorKind::PartialMigration)
                        .with_message(format!(
                            "region copied to destination as {moved} but source removal failed"
                        ))
                        .with_target(target)
                        .with_region(region)
                        .with_source(err));
                }
            }
        }
        tracing::info!(
            provider_id = self.id(),
            target_id = %target,
            region = %region,
            dest_target = %dest_target,
            dest_region = %moved,
            remove_source,
            "region migrated"
        );
        Ok(moved)
    }

    /// Migrates every region of `target` into `dest_root/<pool file name>` at the
    /// destination provider.
    pub fn migrate_target(
        &self,
        target: TargetId,
        remove_source: bool,
        dest_address: &str,
        dest_provider_id: u16,
        dest_root: &str,
    ) -> Result<MigratedTarget, Error> {
        let dest = self
            .remote_destination(dest_address, dest_provider_id)
            .map_err(|err| destination_failed(err, target, None))?;
        self.migrate_target_to(target, remove_source, &dest, dest_root)
    }

    /// Regions move one at a time, each all-or-nothing. On failure the error
    /// reports how many moved; `list_regions` on the source shows what is left.
    /// With `remove_source`, a fully drained source is detached and its file deleted.
    pub fn migrate_target_to(
        &self,
        target: TargetId,
        remove_source: bool,
        dest: &dyn MigrationDestination,
        dest_root: &str,
    ) -> Result<MigratedTarget, Error> {
        let source = self.target(target)?;
        let source_path = source.path().to_path_buf();
        let file_name = source_path.file_name().ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message("source pool path has no file name")
                .with_path(&source_path)
        })?;
        let dest_path = Path::new(dest_root).join(file_name);
        let dest_target = dest
            .ensure_target(&dest_path.to_string_lossy(), source.header().file_size)
            .map_err(|err| destination_failed(err, target, None))?;
        if dest_target == target {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message("destination resolves to the source target")
                .with_target(target)
                .with_path(&dest_path));
        }

        let regions = source.list_regions();
        drop(source);
        let total = regions.len();
        let mut moved = Vec::with_capacity(total);
        for region in regions {
            match self.migrate_region_to(target, &region, 0, remove_source, dest, dest_target) {
                Ok(dest_region) => moved.push(MigratedRegion {
                    source: region,
                    dest: dest_region,
                }),
                Err(err) => {
                    tracing::warn!(
                        target_id = %target,
                        migrated = moved.len(),
                        total,
                        error = %err,
                        "target migration stopped"
                    );
                    return Err(Error::new(ErrorKind::PartialMigration)
                        .with_message(format!(
                            "migrated {} of {total} regions; {} failed ({})",
                            moved.len(),
                            region,
                            err.kind().as_str()
                        ))
                        .with_target(target)
                        .with_region(region)
                        .with_source(err));
                }
            }
        }

        if remove_source {
            let (attached_path, source) = self.take_target(target)?;
            let remaining = source.list_regions().len();
            if remaining > 0 || Arc::strong_count(&source) > 1 {
                self.restore_target(attached_path, source);
                tracing::warn!(target_id = %target, remaining, "source changed during target migration");
                return Err(Error::new(ErrorKind::PartialMigration)
                    .with_message(format!(
                        "migrated {} regions but the source is still in use ({remaining} regions left); it stays attached",
                        moved.len()
                    ))
                    .with_target(target));
            }
            std::fs::remove_file(&source_path).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("target migrated but the source pool file could not be deleted")
                    .with_path(&source_path)
                    .with_target(target)
                    .with_source(err)
            })?;
            drop(source);
        }
        tracing::info!(
            provider_id = self.id(),
            target_id = %target,
            dest_target = %dest_target,
            regions = moved.len(),
            remove_source,
            "target migrated"
        );
        Ok(MigratedTarget {
            target: dest_target,
            regions: moved,
        })
    }

    fn remote_destination(&self, address: &str, provider_id: u16) -> Result<ProviderHandle, Error> {
        let client = Client::from_transport(Arc::clone(self.transport()));
        ProviderHandle::new(&client, address, provider_id)
    }
}

impl MigrationDestination for Provider {
    fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
        Provider::create_write_persist(self, target, data)
    }

    fn ensure_target(&self, path: &str, size: u64) -> Result<TargetId, Error> {
        Provider::ensure_target(self, path, size)
    }
}

fn destination_failed(err: Error, target: TargetId, region: Option<&RegionId>) -> Error {
    let mut wrapped = Error::new(ErrorKind::PartialMigration)
        .with_message(format!(
            "destination failed ({}); source left intact",
            err.kind().as_str()
        ))
        .with_target(target);
    if let Some(region) = region {
        wrapped = wrapped.with_region(region);
    }
    wrapped.with_source(err)
}

#[cfg(test)]
mod tests {
    use super::MigrationDestination;
    use crate::api::bulk::BulkAccess;
    use crate::api::provider::Provider;
    use crate::api::runtime::{Executor, Runtime};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::ids::{RegionId, TargetId};
    use crate::core::target::{PoolOptions, make_pool};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MIB: u64 = 1024 * 1024;

    struct Fixture {
        dir: tempfile::TempDir,
        runtime: Runtime,
        source: Provider,
        dest: Provider,
        target: TargetId,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Runtime::new();
        let source = Provider::register(&runtime, 1, Executor::Inline).expect("source");
        let dest = Provider::register(&runtime, 2, Executor::Inline).expect("dest");
        std::fs::create_dir(dir.path().join("src")).expect("src dir");
        std::fs::create_dir(dir.path().join("dst")).expect("dst dir");
        let target = source
            .create_target(dir.path().join("src").join("pool.bake"), MIB)
            .expect("target");
        Fixture {
            dir,
            runtime,
            source,
            dest,
            target,
        }
    }

    #[test]
    fn region_ops_check_target_and_ownership() {
        let fx = fixture();
        let region = fx.source.create(fx.target, 100).expect("create");
        let data: Vec<u8> = (0u8..100).collect();
        fx.source.write(fx.target, &region, 0, &data).expect("write");
        fx.source.persist(fx.target, &region, 0, 100).expect("persist");
        assert_eq!(fx.source.read(fx.target, &region, 0, 100).expect("read"), data);
        assert_eq!(fx.source.get_size(fx.target, &region).expect("size"), 100);

        let unknown = TargetId::generate();
        let err = fx.source.read(unknown, &region, 0, 1).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::UnknownTarget);

        let other = fx
            .source
            .create_target(fx.dir.path().join("src").join("other.bake"), MIB)
            .expect("other");
        let err = fx.source.read(other, &region, 0, 1).expect_err("foreign");
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);

        fx.source.remove(fx.target, &region).expect("remove");
        let err = fx.source.read(fx.target, &region, 0, 100).expect_err("removed");
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);
    }

    #[test]
    fn proxy_ops_use_local_bulk_buffers() {
        let fx = fixture();
        let bulk = fx.runtime.transport().bulk();
        let payload: Vec<u8> = (0..64u8).collect();
        let source_handle = bulk.expose(payload.clone(), BulkAccess::ReadOnly);
        let region = fx.source.create(fx.target, 64).expect("create");

        fx.source
            .proxy_write(fx.target, &region, 0, source_handle, 0, "", 64)
            .expect("proxy write");
        assert_eq!(fx.source.read(fx.target, &region, 0, 64).expect("read"), payload);

        let err = fx
            .source
            .proxy_write(fx.target, &region, 32, source_handle, 0, "", 64)
            .expect_err("out of bounds");
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);

        let sink = bulk.expose(vec![0; 64], BulkAccess::WriteOnly);
        let n = fx
            .source
            .proxy_read(fx.target, &region, 48, sink, 0, "", 64)
            .expect("proxy read");
        assert_eq!(n, 16);
        let received = bulk.take(sink.id).expect("take");
        assert_eq!(&received[..16], &payload[48..]);

        let created = fx
            .source
            .proxy_create_write_persist(fx.target, source_handle, 8, "", 8)
            .expect("proxy cwp");
        assert_eq!(
            fx.source.read(fx.target, &created, 0, 8).expect("read"),
            &payload[8..16]
        );
    }

    #[test]
    fn migrate_region_moves_data_and_removes_source() {
        let fx = fixture();
        let dest_target = fx
            .dest
            .create_target(fx.dir.path().join("dst").join("d.bake"), MIB)
            .expect("dest target");
        let region = fx.source.create_write_persist(fx.target, b"migrating").expect("cwp");

        let moved = fx
            .source
            .migrate_region_to(fx.target, &region, 9, true, &fx.dest, dest_target)
            .expect("migrate");
        assert_eq!(fx.dest.read(dest_target, &moved, 0, 9).expect("read"), b"migrating");
        let err = fx.source.read(fx.target, &region, 0, 9).expect_err("source removed");
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);

        let err = fx
            .source
            .migrate_region_to(fx.target, &moved, 0, false, &fx.dest, dest_target)
            .expect_err("foreign region");
        assert_eq!(err.kind(), ErrorKind::InvalidRegion);
    }

    #[test]
    fn failed_destination_leaves_source_intact() {
        let fx = fixture();
        let dest_path = fx.dir.path().join("dst").join("tiny.bake");
        drop(make_pool(&dest_path, PoolOptions::new(16 * 1024)).expect("tiny pool"));
        let dest_target = fx.dest.attach_target(&dest_path).expect("attach");

        let payload = vec![0x5A; 64 * 1024];
        let region = fx.source.create_write_persist(fx.target, &payload).expect("cwp");
        let err = fx
            .source
            .migrate_region_to(fx.target, &region, 0, true, &fx.dest, dest_target)
            .expect_err("destination full");
        assert_eq!(err.kind(), ErrorKind::PartialMigration);
        let data = fx
            .source
            .read(fx.target, &region, 0, payload.len() as u64)
            .expect("source intact");
        assert_eq!(data, payload);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let fx = fixture();
        let dest_target = fx
            .dest
            .create_target(fx.dir.path().join("dst").join("d.bake"), MIB)
            .expect("dest");
        let region = fx.source.create_write_persist(fx.target, b"abc").expect("cwp");
        let err = fx
            .source
            .migrate_region_to(fx.target, &region, 4, true, &fx.dest, dest_target)
            .expect_err("size mismatch");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(fx.source.get_size(fx.target, &region).expect("intact"), 3);
    }

    #[test]
    fn migrate_target_drains_and_deletes_source() {
        let fx = fixture();
        let contents: Vec<Vec<u8>> = (0..5u8).map(|i| vec![i; 100 + i as usize]).collect();
        for data in &contents {
            fx.source.create_write_persist(fx.target, data).expect("cwp");
        }
        let dest_root = fx.dir.path().join("dst");
        let migrated = fx
            .source
            .migrate_target_to(fx.target, true, &fx.dest, &dest_root.to_string_lossy())
            .expect("migrate target");

        assert_eq!(migrated.regions.len(), 5);
        for (moved, data) in migrated.regions.iter().zip(&contents) {
            let read = fx
                .dest
                .read(migrated.target, &moved.dest, 0, data.len() as u64)
                .expect("read");
            assert_eq!(&read, data);
        }
        assert_eq!(fx.source.count_targets(), 0);
        assert!(!fx.dir.path().join("src").join("pool.bake").exists());
        assert!(dest_root.join("pool.bake").exists());
    }

    struct FailAfter {
        inner: Provider,
        remaining: AtomicUsize,
    }

    impl MigrationDestination for FailAfter {
        fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
            if self.remaining.fetch_sub(1, Ordering::SeqCst) == 0 {
                return Err(Error::new(ErrorKind::Io).with_message("injected"));
            }
            self.inner.create_write_persist(target, data)
        }

        fn ensure_target(&self, path: &str, size: u64) -> Result<TargetId, Error> {
            self.inner.ensure_target(path, size)
        }
    }

    #[test]
    fn partial_target_migration_can_be_retried() {
        let fx = fixture();
        for i in 0..4u8 {
            fx.source.create_write_persist(fx.target, &[i; 32]).expect("cwp");
        }
        let dest_root = fx.dir.path().join("dst");
        let flaky = FailAfter {
            inner: fx.dest.clone(),
            remaining: AtomicUsize::new(2),
        };
        let err = fx
            .source
            .migrate_target_to(fx.target, true, &flaky, &dest_root.to_string_lossy())
            .expect_err("partial");
        assert_eq!(err.kind(), ErrorKind::PartialMigration);
        assert!(err.message().unwrap_or_default().starts_with("migrated 2 of 4"));
        assert_eq!(fx.source.list_regions(fx.target).expect("left").len(), 2);

        let migrated = fx
            .source
            .migrate_target_to(fx.target, true, &fx.dest, &dest_root.to_string_lossy())
            .expect("retry");
        assert_eq!(migrated.regions.len(), 2);
        assert_eq!(fx.dest.list_regions(migrated.target).expect("dest").len(), 4);
    }

    struct Interleaved<F: Fn()> {
        inner: Provider,
        during_copy: F,
    }

    impl<F: Fn()> MigrationDestination for Interleaved<F> {
        fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
            (self.during_copy)();
            self.inner.create_write_persist(target, data)
        }

        fn ensure_target(&self, path: &str, size: u64) -> Result<TargetId, Error> {
            self.inner.ensure_target(path, size)
        }
    }

    #[test]
    fn region_rewritten_during_migration_keeps_source() {
        let fx = fixture();
        let dest_target = fx
            .dest
            .create_target(fx.dir.path().join("dst").join("d.bake"), MIB)
            .expect("dest");
        let region = fx.source.create_write_persist(fx.target, b"before").expect("cwp");
        let source = fx.source.clone();
        let target = fx.target;
        let dest = Interleaved {
            inner: fx.dest.clone(),
            during_copy: move || source.write(target, &region, 0, b"after!").expect("write"),
        };

        let err = fx
            .source
            .migrate_region_to(fx.target, &region, 0, true, &dest, dest_target)
            .expect_err("changed");
        assert_eq!(err.kind(), ErrorKind::PartialMigration);
        assert_eq!(fx.source.read(fx.target, &region, 0, 6).expect("kept"), b"after!");
    }

    #[test]
    fn target_migration_keeps_regions_created_meanwhile() {
        let fx = fixture();
        fx.source.create_write_persist(fx.target, b"early").expect("cwp");
        let late = Mutex::new(Vec::new());
        let dest = Interleaved {
            inner: fx.dest.clone(),
            during_copy: || {
                let region = fx.source.create_write_persist(fx.target, b"late").expect("late");
                late.lock().expect("lock").push(region);
            },
        };
        let dest_root = fx.dir.path().join("dst");
        let err = fx
            .source
            .migrate_target_to(fx.target, true, &dest, &dest_root.to_string_lossy())
            .expect_err("source gained a region");
        assert_eq!(err.kind(), ErrorKind::PartialMigration);
        drop(dest);

        let late = late.into_inner().expect("late regions");
        assert_eq!(fx.source.count_targets(), 1);
        assert!(fx.dir.path().join("src").join("pool.bake").exists());
        assert_eq!(fx.source.list_regions(fx.target).expect("left"), late);
        assert_eq!(fx.source.read(fx.target, &late[0], 0, 4).expect("read"), b"late");

        let migrated = fx
            .source
            .migrate_target_to(fx.target, true, &fx.dest, &dest_root.to_string_lossy())
            .expect("retry");
        assert_eq!(migrated.regions.len(), 1);
        assert!(!fx.dir.path().join("src").join("pool.bake").exists());
    }

    #[test]
    fn migrate_target_into_itself_is_rejected() {
        let fx = fixture();
        let src_root = fx.dir.path().join("src");
        let err = fx
            .source
            .migrate_target_to(fx.target, true, &fx.source, &src_root.to_string_lossy())
            .expect_err("self");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(fx.source.count_targets(), 1);
    }

    #[test]
    fn unresolvable_destination_is_partial_migration() {
        let fx = fixture();
        let region = fx.source.create_write_persist(fx.target, b"x").expect("cwp");
        let err = fx
            .source
            .migrate_region(fx.target, &region, 0, true, "", 1, TargetId::generate())
            .expect_err("no address");
        assert_eq!(err.kind(), ErrorKind::PartialMigration);
        assert_eq!(fx.source.get_size(fx.target, &region).expect("intact"), 1);
    }
}
