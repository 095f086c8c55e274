//! Purpose: The process's transport instance: provider registry, bulk registry, shutdown switch.
//! Exports: `Runtime`, `Executor`.
//! Role: Shared by providers, in-process clients, and the HTTP server.
//! Invariants: Provider ids are unique per runtime; a duplicate registration fails.
//! Invariants: Remote shutdown is refused unless explicitly enabled.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::api::provider::Provider;
use crate::api::transport::Transport;
use crate::core::error::{Error, ErrorKind};

/// Where a provider runs its operations.
#[derive(Clone, Debug, Default)]
pub enum Executor {
    /// On the calling thread.
    #[default]
    Inline,
    /// On the blocking pool of the tokio runtime polling the call.
    BlockingPool,
    /// On the blocking pool of the given tokio runtime.
    Blocking(tokio::runtime::Handle),
}

impl Executor {
    pub async fn run<F, T>(&self, op: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        match self {
            Executor::Inline => op(),
            Executor::BlockingPool => tokio::task::spawn_blocking(op).await.map_err(join_error)?,
            Executor::Blocking(handle) => handle.spawn_blocking(op).await.map_err(join_error)?,
        }
    }
}

fn join_error(err: tokio::task::JoinError) -> Error {
    Error::new(ErrorKind::Internal)
        .with_message("provider operation task failed")
        .with_source(err)
}

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    transport: Arc<Transport>,
    providers: Mutex<BTreeMap<u16, Provider>>,
    address: Mutex<Option<String>>,
    remote_shutdown: AtomicBool,
    shutdown_requested: AtomicBool,
    shutdown: Notify,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_transport(Arc::new(Transport::new()))
    }

    pub fn with_transport(transport: Arc<Transport>) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                transport,
                providers: Mutex::new(BTreeMap::new()),
                address: Mutex::new(None),
                remote_shutdown: AtomicBool::new(false),
                shutdown_requested: AtomicBool::new(false),
                shutdown: Notify::new(),
            }),
        }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.inner.transport
    }

    pub fn provider(&self, id: u16) -> Result<Provider, Error> {
        self.providers().get(&id).cloned().ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("no provider registered with id {id}"))
        })
    }

    pub fn provider_ids(&self) -> Vec<u16> {
        self.providers().keys().copied().collect()
    }

    /// Removes a provider and detaches all of its targets.
    pub fn deregister(&self, id: u16) -> Result<(), Error> {
        let provider = self.providers().remove(&id).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("no provider registered with id {id}"))
        })?;
        provider.detach_all_targets();
        tracing::info!(provider_id = id, "provider deregistered");
        Ok(())
    }

    pub(crate) fn insert_provider(&self, provider: Provider) -> Result<(), Error> {
        let mut providers = self.providers();
        let id = provider.id();
        if providers.contains_key(&id) {
            return Err(Error::new(ErrorKind::AddressInUse)
                .with_message(format!("provider id {id} is already registered"))
                .with_hint("Pick a different --provider-id."));
        }
        providers.insert(id, provider);
        Ok(())
    }

    /// Address peers use to reach this runtime, once a server is bound.
    pub fn address(&self) -> Option<String> {
        lock(&self.inner.address).clone()
    }

    pub fn set_address(&self, address: impl Into<String>) {
        *lock(&self.inner.address) = Some(address.into());
    }

    pub fn enable_remote_shutdown(&self, enabled: bool) {
        self.inner.remote_shutdown.store(enabled, Ordering::SeqCst);
    }

    pub fn remote_shutdown_enabled(&self) -> bool {
        self.inner.remote_shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.inner.shutdown_requested.store(true, Ordering::SeqCst);
        self.inner.shutdown.notify_one();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.inner.shutdown_requested.load(Ordering::SeqCst)
    }

    pub async fn wait_for_shutdown(&self) {
        while !self.shutdown_requested() {
            self.inner.shutdown.notified().await;
        }
    }

    fn providers(&self) -> MutexGuard<'_, BTreeMap<u16, Provider>> {
        lock(&self.inner.providers)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

#[cfg(test)]
mod tests {
    use super::{Executor, Runtime};
    use crate::api::provider::Provider;
    use crate::core::error::{Error, ErrorKind};

    #[test]
    fn duplicate_provider_id_is_address_in_use() {
        let runtime = Runtime::new();
        let _first = Provider::register(&runtime, 1, Executor::Inline).expect("first");
        let err = Provider::register(&runtime, 1, Executor::Inline).expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::AddressInUse);
        Provider::register(&runtime, 2, Executor::Inline).expect("other id");
        assert_eq!(runtime.provider_ids(), vec![1, 2]);

        let other = Runtime::new();
        Provider::register(&other, 1, Executor::Inline).expect("separate runtime");
    }

    #[test]
    fn deregister_frees_the_id() {
        let runtime = Runtime::new();
        Provider::register(&runtime, 7, Executor::Inline).expect("register");
        runtime.deregister(7).expect("deregister");
        assert_eq!(runtime.provider(7).expect_err("gone").kind(), ErrorKind::NotFound);
        Provider::register(&runtime, 7, Executor::Inline).expect("re-register");
    }

    #[tokio::test]
    async fn blocking_executor_runs_on_the_pool() {
        let executor = Executor::Blocking(tokio::runtime::Handle::current());
        let value = executor.run(|| Ok::<_, Error>(21 * 2)).await.expect("run");
        assert_eq!(value, 42);
        let err = executor
            .run(|| Err::<(), _>(Error::new(ErrorKind::Busy)))
            .await
            .expect_err("propagates");
        assert_eq!(err.kind(), ErrorKind::Busy);

        let value = Executor::BlockingPool
            .run(|| Ok::<_, Error>("pooled"))
            .await
            .expect("pool");
        assert_eq!(value, "pooled");
    }

    #[tokio::test]
    async fn shutdown_request_wakes_waiter() {
        let runtime = Runtime::new();
        assert!(!runtime.remote_shutdown_enabled());
        runtime.request_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(1), runtime.wait_for_shutdown())
            .await
            .expect("woken");
    }
}
