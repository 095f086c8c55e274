//! Purpose: Provider registry of attached storage targets.
//! Exports: `Provider`.
//! Role: Resolves TargetIds for the region operations in `ops` and the HTTP server.
//! Invariants: A pool path is attached at most once per provider; re-attach returns its id.
//! Invariants: Targets are listed in TargetId order.
//! Invariants: Detaching closes the pool; the pool file is never deleted here.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::api::runtime::{Executor, Runtime};
use crate::api::transport::Transport;
use crate::core::error::{Error, ErrorKind, map_io_error_kind};
use crate::core::ids::TargetId;
use crate::core::target::{PoolOptions, Target, TargetInfo, make_pool};

#[derive(Clone)]
pub struct Provider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    id: u16,
    executor: Executor,
    transport: Arc<Transport>,
    attached: RwLock<Attached>,
}

#[derive(Default)]
struct Attached {
    targets: BTreeMap<TargetId, Arc<Target>>,
    paths: HashMap<PathBuf, TargetId>,
}

impl Provider {
    /// Registers a provider under `id` in `runtime`.
    pub fn register(runtime: &Runtime, id: u16, executor: Executor) -> Result<Self, Error> {
        let provider = Self {
            inner: Arc::new(ProviderInner {
                id,
                executor,
                transport: Arc::clone(runtime.transport()),
                attached: RwLock::new(Attached::default()),
            }),
        };
        runtime.insert_provider(provider.clone())?;
        tracing::info!(provider_id = id, "provider registered");
        Ok(provider)
    }

    pub fn id(&self) -> u16 {
        self.inner.id
    }

    pub fn executor(&self) -> &Executor {
        &self.inner.executor
    }

    pub(crate) fn transport(&self) -> &Arc<Transport> {
        &self.inner.transport
    }

    /// Runs `op` against this provider on its executor.
    pub async fn dispatch<F, T>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce(&Provider) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let provider = self.clone();
        self.inner.executor.run(move || op(&provider)).await
    }

    pub fn attach_target(&self, path: impl AsRef<Path>) -> Result<TargetId, Error> {
        let path = canonical(path.as_ref())?;
        if let Some(id) = self.attached().paths.get(&path) {
            return Ok(*id);
        }
        let target = Target::open(&path)?;
        self.insert(path, target)
    }

    pub fn create_target(&self, path: impl AsRef<Path>, size: u64) -> Result<TargetId, Error> {
        self.create_target_with(path, PoolOptions::new(size))
    }

    pub fn create_target_with(
        &self,
        path: impl AsRef<Path>,
        options: PoolOptions,
    ) -> Result<TargetId, Error> {
        let target = make_pool(path.as_ref(), options)?;
        let path = canonical(path.as_ref())?;
        self.insert(path, target)
    }

    /// Attaches `path` when it exists, otherwise creates it with `size` bytes.
    pub fn ensure_target(&self, path: impl AsRef<Path>, size: u64) -> Result<TargetId, Error> {
        let path = path.as_ref();
        if path.exists() {
            self.attach_target(path)
        } else {
            self.create_target(path, size)
        }
    }

    pub fn detach_target(&self, id: TargetId) -> Result<(), Error> {
        let (_, target) = self.take_target(id)?;
        tracing::info!(
            provider_id = self.id(),
            target_id = %id,
            path = %target.path().display(),
            "target detached"
        );
        Ok(())
    }

    pub fn detach_all_targets(&self) {
        let mut attached = self.attached_mut();
        let count = attached.targets.len();
        attached.targets.clear();
        attached.paths.clear();
        if count > 0 {
            tracing::info!(provider_id = self.id(), count, "all targets detached");
        }
    }

    pub fn count_targets(&self) -> u64 {
        self.attached().targets.len() as u64
    }

    pub fn list_targets(&self) -> Vec<TargetId> {
        self.attached().targets.keys().copied().collect()
    }

    /// Up to `max` attached target ids; `0` means all of them.
    pub fn probe(&self, max: u64) -> Vec<TargetId> {
        let attached = self.attached();
        let take = if max == 0 { usize::MAX } else { max as usize };
        attached.targets.keys().take(take).copied().collect()
    }

    pub fn target(&self, id: TargetId) -> Result<Arc<Target>, Error> {
        self.attached()
            .targets
            .get(&id)
            .cloned()
            .ok_or_else(|| unknown_target(id))
    }

    pub fn target_info(&self, id: TargetId) -> Result<TargetInfo, Error> {
        Ok(self.target(id)?.info())
    }

    /// Removes `id` from the registry and hands back its pool still open and locked.
    pub(crate) fn take_target(&self, id: TargetId) -> Result<(PathBuf, Arc<Target>), Error> {
        let mut attached = self.attached_mut();
        let Some(target) = attached.targets.remove(&id) else {
            return Err(unknown_target(id));
        };
        let path = attached
            .paths
            .iter()
            .find(|(_, attached_id)| **attached_id == id)
            .map(|(path, _)| path.clone())
            .unwrap_or_else(|| target.path().to_path_buf());
        attached.paths.retain(|_, attached_id| *attached_id != id);
        Ok((path, target))
    }

    pub(crate) fn restore_target(&self, path: PathBuf, target: Arc<Target>) {
        let id = target.id();
        let mut attached = self.attached_mut();
        attached.targets.insert(id, target);
        attached.paths.insert(path, id);
    }

    fn insert(&self, path: PathBuf, target: Target) -> Result<TargetId, Error> {
        let id = target.id();
        let mut attached = self.attached_mut();
        if let Some(existing) = attached.paths.get(&path) {
            return Ok(*existing);
        }
        if attached.targets.contains_key(&id) {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("a pool with the same target id is already attached")
                .with_path(&path)
                .with_target(id)
                .with_hint("Pool files copied byte-for-byte share an id; attach only one."));
        }
        tracing::info!(
            provider_id = self.id(),
            target_id = %id,
            path = %path.display(),
            "target attached"
        );
        attached.targets.insert(id, Arc::new(target));
        attached.paths.insert(path, id);
        Ok(id)
    }

    fn attached(&self) -> RwLockReadGuard<'_, Attached> {
        self.inner
            .attached
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn attached_mut(&self) -> RwLockWriteGuard<'_, Attached> {
        self.inner
            .attached
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("id", &self.inner.id)
            .field("targets", &self.count_targets())
            .finish()
    }
}

pub(crate) fn unknown_target(id: TargetId) -> Error {
    Error::new(ErrorKind::UnknownTarget)
        .with_message("target is not attached to this provider")
        .with_target(id)
}

fn canonical(path: &Path) -> Result<PathBuf, Error> {
    std::fs::canonicalize(path).map_err(|err| {
        Error::new(map_io_error_kind(&err))
            .with_message("failed to resolve pool path")
            .with_path(path)
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::Provider;
    use crate::api::runtime::{Executor, Runtime};
    use crate::core::error::ErrorKind;
    use crate::core::ids::TargetId;

    const MIB: u64 = 1024 * 1024;

    fn provider() -> Provider {
        Provider::register(&Runtime::new(), 1, Executor::Inline).expect("register")
    }

    #[test]
    fn attach_is_idempotent_per_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.bake");
        let provider = provider();
        let created = provider.create_target(&path, MIB).expect("create");
        let attached = provider.attach_target(&path).expect("attach");
        assert_eq!(created, attached);
        assert_eq!(provider.count_targets(), 1);
    }

    #[test]
    fn detach_then_reattach_keeps_contents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.bake");
        let provider = provider();
        let id = provider.create_target(&path, MIB).expect("create");
        let region = provider
            .target(id)
            .expect("target")
            .create_write_persist(b"kept")
            .expect("cwp");

        provider.detach_target(id).expect("detach");
        assert_eq!(provider.count_targets(), 0);
        let err = provider.target(id).expect_err("detached");
        assert_eq!(err.kind(), ErrorKind::UnknownTarget);
        let err = provider.detach_target(id).expect_err("twice");
        assert_eq!(err.kind(), ErrorKind::UnknownTarget);

        assert_eq!(provider.attach_target(&path).expect("reattach"), id);
        let data = provider.target(id).expect("target").read(&region, 0, 4).expect("read");
        assert_eq!(data, b"kept");
    }

    #[test]
    fn list_and_probe_are_ordered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = provider();
        let mut ids: Vec<TargetId> = (0..4)
            .map(|i| {
                provider
                    .create_target(dir.path().join(format!("{i}.bake")), MIB)
                    .expect("create")
            })
            .collect();
        ids.sort();
        assert_eq!(provider.list_targets(), ids);
        assert_eq!(provider.probe(0), ids);
        assert_eq!(provider.probe(2), ids[..2].to_vec());
        assert_eq!(provider.probe(99), ids);

        provider.detach_all_targets();
        assert_eq!(provider.count_targets(), 0);
        assert!(provider.probe(0).is_empty());
    }

    #[test]
    fn attach_missing_path_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = provider()
            .attach_target(dir.path().join("missing.bake"))
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn pool_attached_by_another_provider_is_busy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.bake");
        let runtime = Runtime::new();
        let first = Provider::register(&runtime, 1, Executor::Inline).expect("first");
        let second = Provider::register(&runtime, 2, Executor::Inline).expect("second");
        first.create_target(&path, MIB).expect("create");
        let err = second.attach_target(&path).expect_err("locked");
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[test]
    fn ensure_target_creates_then_attaches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dest.bake");
        let provider = provider();
        let id = provider.ensure_target(&path, MIB).expect("create");
        assert_eq!(provider.ensure_target(&path, MIB).expect("attach"), id);
    }

    #[tokio::test]
    async fn dispatch_runs_on_executor() {
        let runtime = Runtime::new();
        let provider = Provider::register(
            &runtime,
            3,
            Executor::Blocking(tokio::runtime::Handle::current()),
        )
        .expect("register");
        let count = provider
            .dispatch(|provider| Ok(provider.count_targets()))
            .await
            .expect("dispatch");
        assert_eq!(count, 0);
    }
}
