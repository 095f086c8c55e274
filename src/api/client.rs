//! Purpose: Caller-side client and remote provider handles.
//! Exports: `Client`, `ProviderHandle`, `DEFAULT_EAGER_LIMIT`.
//! Role: Mirrors the provider's region operations over the HTTP transport.
//! Invariants: Every call on a finalized client (or its handles) fails with `Closed`.
//! Invariants: Payloads up to the eager limit travel inline as JSON; larger ones as raw bodies.
//! Invariants: Addresses are resolved at handle creation; reachability is checked on first call.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::bulk::{BulkHandle, BulkRegistry};
use crate::api::ops::{MigratedTarget, MigrationDestination};
use crate::api::runtime::Runtime;
use crate::api::transport::{Transport, build_url, resolve_address};
use crate::api::wire::{
    AttachTargetRequest, BytesResponse, CountResponse, CreateRequest, CreateTargetRequest,
    CreateWritePersistRequest, DataResponse, EnsureTargetRequest, MigrateRegionRequest,
    MigrateTargetRequest, OkResponse, ProbeRequest, ProxyRequest, RangeRequest, RegionRequest,
    RegionResponse, RegionsResponse, SizeResponse, TargetRequest, TargetResponse,
    TargetsResponse, WriteRequest,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{RegionId, TargetId};

pub const DEFAULT_EAGER_LIMIT: u64 = 2048;

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<Transport>,
    finalized: AtomicBool,
}

impl Client {
    /// A standalone client with its own transport and bulk registry.
    pub fn init() -> Self {
        Self::from_transport(Arc::new(Transport::new()))
    }

    /// A client sharing `runtime`'s transport, so its bulk buffers are served by that runtime.
    pub fn with_runtime(runtime: &Runtime) -> Self {
        Self::from_transport(Arc::clone(runtime.transport()))
    }

    pub fn from_transport(transport: Arc<Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                finalized: AtomicBool::new(false),
            }),
        }
    }

    /// A new client whose requests time out after `timeout` (surfaced as `Timeout`).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::from_transport(Arc::new(self.inner.transport.with_timeout(timeout)))
    }

    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    pub fn bulk(&self) -> &BulkRegistry {
        self.inner.transport.bulk()
    }

    pub fn finalize(&self) {
        self.inner.finalized.store(true, Ordering::SeqCst);
    }

    pub fn is_finalized(&self) -> bool {
        self.inner.finalized.load(Ordering::SeqCst)
    }

    pub fn provider_handle(&self, address: &str, provider_id: u16) -> Result<ProviderHandle, Error> {
        ProviderHandle::new(self, address, provider_id)
    }

    /// Asks the runtime at `address` to shut down.
    pub fn shutdown_service(&self, address: &str) -> Result<(), Error> {
        self.ensure_open()?;
        let base = resolve_address(address)?;
        let url = build_url(&base, &["v0", "shutdown"])?;
        let _: OkResponse = self.inner.transport.call_json(&url, &serde_json::json!({}))?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_finalized() {
            return Err(Error::new(ErrorKind::Closed).with_message("client has been finalized"));
        }
        Ok(())
    }
}

/// Shared handle to a provider at (address, provider id). Clones share one
/// endpoint; it is released when the last clone drops.
#[derive(Clone)]
pub struct ProviderHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    client: Client,
    address: String,
    base_url: Url,
    provider_id: u16,
    eager_limit: AtomicU64,
}

impl ProviderHandle {
    pub fn new(client: &Client, address: &str, provider_id: u16) -> Result<Self, Error> {
        client.ensure_open()?;
        let base_url = resolve_address(address)?;
        Ok(Self {
            inner: Arc::new(HandleInner {
                client: client.clone(),
                address: address.trim().to_string(),
                base_url,
                provider_id,
                eager_limit: AtomicU64::new(DEFAULT_EAGER_LIMIT),
            }),
        })
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn provider_id(&self) -> u16 {
        self.inner.provider_id
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn release(self) {}

    pub fn eager_limit(&self) -> u64 {
        self.inner.eager_limit.load(Ordering::Relaxed)
    }

    pub fn set_eager_limit(&self, limit: u64) {
        self.inner.eager_limit.store(limit, Ordering::Relaxed);
    }

    pub fn probe(&self, max_targets: u64) -> Result<Vec<TargetId>, Error> {
        let response: TargetsResponse = self.call("probe", &ProbeRequest { max: max_targets })?;
        Ok(response.targets)
    }

    pub fn create(&self, target: TargetId, size: u64) -> Result<RegionId, Error> {
        let response: RegionResponse = self.call("create", &CreateRequest { target, size })?;
        Ok(response.region)
    }

    pub fn write(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        if data.len() as u64 > self.eager_limit() {
            let url = self.raw_url("write_bytes", target, Some(region), offset, data.len() as u64)?;
            let _: OkResponse = self.inner.client.transport().call_raw("POST", &url, data)?;
            return Ok(());
        }
        let request = WriteRequest {
            target,
            region: *region,
            offset,
            data: data.to_vec(),
        };
        let _: OkResponse = self.call("write", &request)?;
        Ok(())
    }

    pub fn persist(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        size: u64,
    ) -> Result<(), Error> {
        let request = RangeRequest {
            target,
            region: *region,
            offset,
            size,
        };
        let _: OkResponse = self.call("persist", &request)?;
        Ok(())
    }

    pub fn read(
        &self,
        target: TargetId,
        region: &RegionId,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, Error> {
        if size > self.eager_limit() {
            let url = self.raw_url("read_bytes", target, Some(region), offset, size)?;
            return self.inner.client.transport().call_for_bytes(&url, size);
        }
        let request = RangeRequest {
            target,
            region: *region,
            offset,
            size,
        };
        let response: DataResponse = self.call("read", &request)?;
        Ok(response.data)
    }

    pub fn get_size(&self, target: TargetId, region: &RegionId) -> Result<u64, Error> {
        let response: SizeResponse = self.call("get_size", &RegionRequest {
            target,
            region: *region,
        })?;
        Ok(response.size)
    }

    pub fn remove(&self, target: TargetId, region: &RegionId) -> Result<(), Error> {
        let _: OkResponse = self.call("remove", &RegionRequest {
            target,
            region: *region,
        })?;
        Ok(())
    }

    pub fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
        if data.len() as u64 > self.eager_limit() {
            let url = self.raw_url(
                "create_write_persist_bytes",
                target,
                None,
                0,
                data.len() as u64,
            )?;
            let response: RegionResponse =
                self.inner.client.transport().call_raw("POST", &url, data)?;
            return Ok(response.region);
        }
        let response: RegionResponse = self.call("create_write_persist", &CreateWritePersistRequest {
            target,
            data: data.to_vec(),
        })?;
        Ok(response.region)
    }

    pub fn list_regions(&self, target: TargetId) -> Result<Vec<RegionId>, Error> {
        let response: RegionsResponse = self.call("list_regions", &TargetRequest { target })?;
        Ok(response.regions)
    }

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
        let request = ProxyRequest {
            target,
            region: Some(*region),
            offset,
            bulk,
            remote_offset,
            remote_address: remote_address.to_string(),
            size,
        };
        let _: OkResponse = self.call("proxy_write", &request)?;
        Ok(())
    }

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
        let request = ProxyRequest {
            target,
            region: Some(*region),
            offset,
            bulk,
            remote_offset,
            remote_address: remote_address.to_string(),
            size,
        };
        let response: BytesResponse = self.call("proxy_read", &request)?;
        Ok(response.bytes)
    }

    pub fn proxy_create_write_persist(
        &self,
        target: TargetId,
        bulk: BulkHandle,
        remote_offset: u64,
        remote_address: &str,
        size: u64,
    ) -> Result<RegionId, Error> {
        let request = ProxyRequest {
            target,
            region: None,
            offset: 0,
            bulk,
            remote_offset,
            remote_address: remote_address.to_string(),
            size,
        };
        let response: RegionResponse = self.call("proxy_create_write_persist", &request)?;
        Ok(response.region)
    }

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
        if size != 0 && size != region.size() {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!(
                    "migration size {size} does not match region size {}",
                    region.size()
                ))
                .with_region(region));
        }
        let request = MigrateRegionRequest {
            target,
            region: *region,
            remove_source,
            dest_address: dest_address.to_string(),
            dest_provider_id,
            dest_target,
        };
        let response: RegionResponse = self.call("migrate_region", &request)?;
        Ok(response.region)
    }

    pub fn migrate_target(
        &self,
        target: TargetId,
        remove_source: bool,
        dest_address: &str,
        dest_provider_id: u16,
        dest_root: &str,
    ) -> Result<MigratedTarget, Error> {
        let request = MigrateTargetRequest {
            target,
            remove_source,
            dest_address: dest_address.to_string(),
            dest_provider_id,
            dest_root: dest_root.to_string(),
        };
        self.call("migrate_target", &request)
    }

    pub fn attach_target(&self, path: &str) -> Result<TargetId, Error> {
        let response: TargetResponse = self.call("attach_target", &AttachTargetRequest {
            path: path.to_string(),
        })?;
        Ok(response.target)
    }

    pub fn create_target(&self, path: &str, size: u64) -> Result<TargetId, Error> {
        let response: TargetResponse = self.call("create_target", &CreateTargetRequest {
            path: path.to_string(),
            size,
        })?;
        Ok(response.target)
    }

    pub fn detach_target(&self, target: TargetId) -> Result<(), Error> {
        let _: OkResponse = self.call("detach_target", &TargetRequest { target })?;
        Ok(())
    }

    pub fn detach_all_targets(&self) -> Result<(), Error> {
        let _: OkResponse = self.call("detach_all_targets", &serde_json::json!({}))?;
        Ok(())
    }

    pub fn count_targets(&self) -> Result<u64, Error> {
        let response: CountResponse = self.call("count_targets", &serde_json::json!({}))?;
        Ok(response.count)
    }

    fn call<T, R>(&self, op: &str, body: &T) -> Result<R, Error>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.op_url(op)?;
        self.inner.client.transport().call_json(&url, body)
    }

    fn op_url(&self, op: &str) -> Result<Url, Error> {
        self.inner.client.ensure_open()?;
        build_url(&self.inner.base_url, &[
            "v0",
            "providers",
            &self.inner.provider_id.to_string(),
            op,
        ])
    }

    fn raw_url(
        &self,
        op: &str,
        target: TargetId,
        region: Option<&RegionId>,
        offset: u64,
        size: u64,
    ) -> Result<Url, Error> {
        let mut url = self.op_url(op)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("target", &target.to_string());
            if let Some(region) = region {
                query.append_pair("region", &region.to_string());
            }
            query
                .append_pair("offset", &offset.to_string())
                .append_pair("size", &size.to_string());
        }
        Ok(url)
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("address", &self.inner.address)
            .field("provider_id", &self.inner.provider_id)
            .field("eager_limit", &self.eager_limit())
            .finish()
    }
}

impl MigrationDestination for ProviderHandle {
    fn create_write_persist(&self, target: TargetId, data: &[u8]) -> Result<RegionId, Error> {
        ProviderHandle::create_write_persist(self, target, data)
    }

    fn ensure_target(&self, path: &str, size: u64) -> Result<TargetId, Error> {
        let response: TargetResponse = self.call("ensure_target", &EnsureTargetRequest {
            path: path.to_string(),
            size,
        })?;
        Ok(response.target)
    }
}

#[cfg(test)]
mod tests {
    use super::{Client, DEFAULT_EAGER_LIMIT};
    use crate::core::error::ErrorKind;
    use crate::core::ids::TargetId;

    #[test]
    fn handles_share_one_endpoint() {
        let client = Client::init();
        let handle = client.provider_handle("127.0.0.1:1", 4).expect("handle");
        assert_eq!(handle.ref_count(), 1);
        let clone = handle.clone();
        assert_eq!(handle.ref_count(), 2);
        clone.release();
        assert_eq!(handle.ref_count(), 1);
        assert_eq!(handle.provider_id(), 4);
        assert_eq!(handle.address(), "127.0.0.1:1");
    }

    #[test]
    fn eager_limit_is_per_handle() {
        let client = Client::init();
        let handle = client.provider_handle("127.0.0.1:1", 0).expect("handle");
        assert_eq!(handle.eager_limit(), DEFAULT_EAGER_LIMIT);
        let clone = handle.clone();
        clone.set_eager_limit(16);
        assert_eq!(handle.eager_limit(), 16);
        let other = client.provider_handle("127.0.0.1:1", 0).expect("other");
        assert_eq!(other.eager_limit(), DEFAULT_EAGER_LIMIT);
    }

    #[test]
    fn bad_address_fails_at_creation() {
        let client = Client::init();
        let err = client.provider_handle("", 0).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::AddressResolution);
        let err = client
            .provider_handle("gopher://127.0.0.1:70", 0)
            .expect_err("scheme");
        assert_eq!(err.kind(), ErrorKind::AddressResolution);
    }

    #[test]
    fn unreachable_provider_fails_on_first_call() {
        let client = Client::init();
        let handle = client.provider_handle("127.0.0.1:1", 0).expect("lazy");
        let err = handle.probe(0).expect_err("refused");
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn finalized_client_rejects_calls() {
        let client = Client::init();
        let handle = client.provider_handle("127.0.0.1:1", 0).expect("handle");
        client.finalize();
        assert!(client.is_finalized());
        let err = handle.count_targets().expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Closed);
        let err = handle.create(TargetId::generate(), 8).expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Closed);
        let err = client.provider_handle("127.0.0.1:1", 0).expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Closed);
        let err = client.shutdown_service("127.0.0.1:1").expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Closed);
    }
}
