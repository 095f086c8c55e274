//! Purpose: HTTP/JSON server exposing a runtime's providers and bulk buffers.
//! Exports: `ServeConfig`, `serve`, `spawn`, `ServerHandle`, `router`, `init_tracing`.
//! Role: Axum server implementing the v0 provider protocol for `ProviderHandle`.
//! Invariants: Error envelopes carry stable kind names; status codes follow `error_status`.
//! Invariants: Loopback-only unless explicitly allowed.
//! Invariants: Region operations run on the owning provider's executor.
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::thread::JoinHandle;

use bytes::Bytes;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::api::wire::{
    AttachTargetRequest, BytesResponse, CountResponse, CreateRequest, CreateTargetRequest,
    CreateWritePersistRequest, DataResponse, EnsureTargetRequest, ErrorBody, ErrorEnvelope,
    MigrateRegionRequest, MigrateTargetRequest, OkResponse, ProbeRequest, ProxyRequest,
    RangeRequest, RawQuery, RegionRequest, RegionResponse, RegionsResponse, SizeResponse,
    TargetRequest, TargetResponse, TargetsResponse, WriteRequest,
};
use crate::api::{Error, ErrorKind, Provider, RegionId, Runtime};

pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub allow_non_loopback: bool,
    pub enable_remote_shutdown: bool,
    pub max_body_bytes: u64,
}

impl ServeConfig {
    pub fn loopback(port: u16) -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], port)),
            allow_non_loopback: false,
            enable_remote_shutdown: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Serves until SIGINT/SIGTERM or an accepted remote shutdown request.
pub async fn serve(config: ServeConfig, runtime: Runtime) -> Result<(), Error> {
    validate_config(&config)?;
    init_tracing();
    let listener = bind(&config, &runtime).await?;
    run(listener, &config, runtime, true).await
}

/// Runs a server on a background thread with its own tokio runtime.
pub fn spawn(config: ServeConfig, runtime: Runtime) -> Result<ServerHandle, Error> {
    validate_config(&config)?;
    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bakehouse-serve")
        .build()
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to start server runtime")
                .with_source(err)
        })?;
    let listener = tokio_runtime.block_on(bind(&config, &runtime))?;
    let address = listener.local_addr().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read bound address")
            .with_source(err)
    })?;
    let server_runtime = runtime.clone();
    let thread = std::thread::Builder::new()
        .name("bakehouse-serve".to_string())
        .spawn(move || tokio_runtime.block_on(run(listener, &config, server_runtime, false)))
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to spawn server thread")
                .with_source(err)
        })?;
    Ok(ServerHandle {
        address,
        runtime,
        thread: Some(thread),
    })
}

pub struct ServerHandle {
    address: SocketAddr,
    runtime: Runtime,
    thread: Option<JoinHandle<Result<(), Error>>>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// `http://host:port` form accepted by `ProviderHandle`.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn shutdown(mut self) -> Result<(), Error> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.runtime.request_shutdown();
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                Error::new(ErrorKind::Internal).with_message("server thread panicked")
            })?,
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

async fn bind(config: &ServeConfig, runtime: &Runtime) -> Result<tokio::net::TcpListener, Error> {
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            let kind = if err.kind() == std::io::ErrorKind::AddrInUse {
                ErrorKind::AddressInUse
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message(format!("failed to bind server on {}", config.bind))
                .with_source(err)
        })?;
    if let Ok(local) = listener.local_addr() {
        runtime.set_address(format!("http://{local}"));
    }
    runtime.enable_remote_shutdown(config.enable_remote_shutdown);
    Ok(listener)
}

async fn run(
    listener: tokio::net::TcpListener,
    config: &ServeConfig,
    runtime: Runtime,
    with_signals: bool,
) -> Result<(), Error> {
    let app = router(runtime.clone(), config.max_body_bytes)?;
    tracing::info!(
        address = %runtime.address().unwrap_or_default(),
        providers = ?runtime.provider_ids(),
        "serving"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    let stop = async {
        if with_signals {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = runtime.wait_for_shutdown() => {}
            }
        } else {
            runtime.wait_for_shutdown().await;
        }
    };

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = stop => {
            tracing::info!("shutting down");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Timeout).with_message("server shutdown timed out"));
                }
            }
        }
    };
    for id in runtime.provider_ids() {
        if let Ok(provider) = runtime.provider(id) {
            provider.detach_all_targets();
        }
    }
    Ok(())
}

pub fn router(runtime: Runtime, max_body_bytes: u64) -> Result<Router, Error> {
    let max_body_bytes: usize = max_body_bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::InvalidArgument).with_message("--max-body-bytes is too large")
    })?;
    let provider_routes = Router::new()
        .route("/probe", post(probe))
        .route("/create", post(create))
        .route("/write", post(write))
        .route("/write_bytes", post(write_bytes))
        .route("/persist", post(persist))
        .route("/read", post(read))
        .route("/read_bytes", post(read_bytes))
        .route("/get_size", post(get_size))
        .route("/remove", post(remove))
        .route("/create_write_persist", post(create_write_persist))
        .route("/create_write_persist_bytes", post(create_write_persist_bytes))
        .route("/list_regions", post(list_regions))
        .route("/proxy_write", post(proxy_write))
        .route("/proxy_read", post(proxy_read))
        .route("/proxy_create_write_persist", post(proxy_create_write_persist))
        .route("/migrate_region", post(migrate_region))
        .route("/migrate_target", post(migrate_target))
        .route("/attach_target", post(attach_target))
        .route("/create_target", post(create_target))
        .route("/ensure_target", post(ensure_target))
        .route("/detach_target", post(detach_target))
        .route("/detach_all_targets", post(detach_all_targets))
        .route("/count_targets", post(count_targets));

    Ok(Router::new()
        .route("/healthz", get(healthz))
        .route("/v0/bulk/:id", get(bulk_pull).put(bulk_push))
        .route("/v0/shutdown", post(shutdown))
        .nest("/v0/providers/:pid", provider_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(runtime))
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }
    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 67108864."));
    }
    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }
    Ok(())
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    json_response(&OkResponse::OK)
}

#[derive(Debug, Deserialize)]
struct BulkQuery {
    #[serde(default)]
    offset: u64,
    #[serde(default)]
    size: u64,
}

async fn bulk_pull(
    State(runtime): State<Runtime>,
    AxumPath(id): AxumPath<u64>,
    Query(query): Query<BulkQuery>,
) -> Response {
    match runtime.transport().bulk().pull(id, query.offset, query.size) {
        Ok(data) => bytes_response(data),
        Err(err) => error_response(err),
    }
}

async fn bulk_push(
    State(runtime): State<Runtime>,
    AxumPath(id): AxumPath<u64>,
    Query(query): Query<BulkQuery>,
    body: Bytes,
) -> Response {
    if body.len() as u64 != query.size {
        return error_response(Error::new(ErrorKind::InvalidArgument).with_message(format!(
            "bulk push body is {} bytes, expected {}",
            body.len(),
            query.size
        )));
    }
    match runtime.transport().bulk().push(id, query.offset, &body) {
        Ok(()) => json_response(&OkResponse::OK),
        Err(err) => error_response(err),
    }
}

async fn shutdown(State(runtime): State<Runtime>, _body: Bytes) -> Response {
    if !runtime.remote_shutdown_enabled() {
        return error_response(
            Error::new(ErrorKind::Permission)
                .with_message("remote shutdown is disabled")
                .with_hint("Start the server with --enable-remote-shutdown."),
        );
    }
    tracing::info!("remote shutdown requested");
    runtime.request_shutdown();
    json_response(&OkResponse::OK)
}

async fn with_provider<T, F>(runtime: &Runtime, pid: u16, op: F) -> Result<T, Error>
where
    F: FnOnce(&Provider) -> Result<T, Error> + Send + 'static,
    T: Send + 'static,
{
    let provider = runtime.provider(pid)?;
    provider.dispatch(op).await
}

async fn respond<T, F>(runtime: &Runtime, pid: u16, op: F) -> Response
where
    F: FnOnce(&Provider) -> Result<T, Error> + Send + 'static,
    T: Serialize + Send + 'static,
{
    match with_provider(runtime, pid, op).await {
        Ok(value) => json_response(&value),
        Err(err) => error_response(err),
    }
}

async fn probe(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<ProbeRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        Ok(TargetsResponse {
            targets: provider.probe(request.max),
        })
    })
    .await
}

async fn create(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<CreateRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = provider.create(request.target, request.size)?;
        Ok(RegionResponse { region })
    })
    .await
}

async fn write(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<WriteRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        provider.write(request.target, &request.region, request.offset, &request.data)?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn write_bytes(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Query(query): Query<RawQuery>,
    body: Bytes,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = require_region(query.region)?;
        provider.write(query.target, &region, query.offset, &body)?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn persist(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<RangeRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        provider.persist(request.target, &request.region, request.offset, request.size)?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn read(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<RangeRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let data = provider.read(request.target, &request.region, request.offset, request.size)?;
        Ok(DataResponse { data })
    })
    .await
}

async fn read_bytes(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Query(query): Query<RawQuery>,
) -> Response {
    let result = with_provider(&runtime, pid, move |provider| {
        let region = require_region(query.region)?;
        provider.read(query.target, &region, query.offset, query.size)
    })
    .await;
    match result {
        Ok(data) => bytes_response(data),
        Err(err) => error_response(err),
    }
}

async fn get_size(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<RegionRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let size = provider.get_size(request.target, &request.region)?;
        Ok(SizeResponse { size })
    })
    .await
}

async fn remove(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<RegionRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        provider.remove(request.target, &request.region)?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn create_write_persist(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<CreateWritePersistRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = provider.create_write_persist(request.target, &request.data)?;
        Ok(RegionResponse { region })
    })
    .await
}

async fn create_write_persist_bytes(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Query(query): Query<RawQuery>,
    body: Bytes,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = provider.create_write_persist(query.target, &body)?;
        Ok(RegionResponse { region })
    })
    .await
}

async fn list_regions(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<TargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let regions = provider.list_regions(request.target)?;
        Ok(RegionsResponse { regions })
    })
    .await
}

async fn proxy_write(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<ProxyRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = require_region(request.region)?;
        provider.proxy_write(
            request.target,
            &region,
            request.offset,
            request.bulk,
            request.remote_offset,
            &request.remote_address,
            request.size,
        )?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn proxy_read(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<ProxyRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = require_region(request.region)?;
        let bytes = provider.proxy_read(
            request.target,
            &region,
            request.offset,
            request.bulk,
            request.remote_offset,
            &request.remote_address,
            request.size,
        )?;
        Ok(BytesResponse { bytes })
    })
    .await
}

async fn proxy_create_write_persist(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<ProxyRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = provider.proxy_create_write_persist(
            request.target,
            request.bulk,
            request.remote_offset,
            &request.remote_address,
            request.size,
        )?;
        Ok(RegionResponse { region })
    })
    .await
}

async fn migrate_region(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<MigrateRegionRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let region = provider.migrate_region(
            request.target,
            &request.region,
            0,
            request.remove_source,
            &request.dest_address,
            request.dest_provider_id,
            request.dest_target,
        )?;
        Ok(RegionResponse { region })
    })
    .await
}

async fn migrate_target(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<MigrateTargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        provider.migrate_target(
            request.target,
            request.remove_source,
            &request.dest_address,
            request.dest_provider_id,
            &request.dest_root,
        )
    })
    .await
}

async fn attach_target(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<AttachTargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let target = provider.attach_target(&request.path)?;
        Ok(TargetResponse { target })
    })
    .await
}

async fn create_target(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<CreateTargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let target = provider.create_target(&request.path, request.size)?;
        Ok(TargetResponse { target })
    })
    .await
}

async fn ensure_target(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<EnsureTargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        let target = provider.ensure_target(&request.path, request.size)?;
        Ok(TargetResponse { target })
    })
    .await
}

async fn detach_target(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    Json(request): Json<TargetRequest>,
) -> Response {
    respond(&runtime, pid, move |provider| {
        provider.detach_target(request.target)?;
        Ok(OkResponse::OK)
    })
    .await
}

async fn detach_all_targets(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    _body: Bytes,
) -> Response {
    respond(&runtime, pid, |provider| {
        provider.detach_all_targets();
        Ok(OkResponse::OK)
    })
    .await
}

async fn count_targets(
    State(runtime): State<Runtime>,
    AxumPath(pid): AxumPath<u16>,
    _body: Bytes,
) -> Response {
    respond(&runtime, pid, |provider| {
        Ok(CountResponse {
            count: provider.count_targets(),
        })
    })
    .await
}

fn require_region(region: Option<RegionId>) -> Result<RegionId, Error> {
    region.ok_or_else(|| Error::new(ErrorKind::InvalidArgument).with_message("region is required"))
}

fn json_response<T: Serialize>(payload: &T) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("bakehouse-version", HeaderValue::from_static("0"));
    response
}

fn bytes_response(data: Vec<u8>) -> Response {
    let mut response = (
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"))],
        data,
    )
        .into_response();
    response
        .headers_mut()
        .insert("bakehouse-version", HeaderValue::from_static("0"));
    response
}

fn error_status(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument | ErrorKind::InvalidRegion | ErrorKind::OutOfBounds => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::NotFound | ErrorKind::UnknownTarget => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists | ErrorKind::AddressInUse => StatusCode::CONFLICT,
        ErrorKind::Busy => StatusCode::LOCKED,
        ErrorKind::Permission => StatusCode::FORBIDDEN,
        ErrorKind::OutOfSpace => StatusCode::INSUFFICIENT_STORAGE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::AddressResolution | ErrorKind::PartialMigration => StatusCode::BAD_GATEWAY,
        ErrorKind::Closed => StatusCode::GONE,
        ErrorKind::Corrupt | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: Error) -> Response {
    let status = error_status(err.kind());
    if status.is_server_error() {
        tracing::warn!(error = %err, "request failed");
    }
    let body = ErrorEnvelope {
        error: ErrorBody::from_error(&err),
    };
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert("bakehouse-version", HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use super::{ServeConfig, error_status, serve, spawn, validate_config};
    use crate::api::{Client, ErrorKind, Executor, Provider, Runtime, TargetId};
    use axum::http::StatusCode;

    fn config(bind: &str) -> ServeConfig {
        ServeConfig {
            bind: bind.parse().expect("bind"),
            allow_non_loopback: false,
            enable_remote_shutdown: false,
            max_body_bytes: 1024 * 1024,
        }
    }

    #[tokio::test]
    async fn serve_rejects_non_loopback_bind() {
        let err = serve(config("0.0.0.0:0"), Runtime::new())
            .await
            .expect_err("expected invalid argument");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn non_loopback_requires_allow_flag() {
        let mut config = config("0.0.0.0:0");
        assert_eq!(
            validate_config(&config).expect_err("opt-in").kind(),
            ErrorKind::InvalidArgument
        );
        config.allow_non_loopback = true;
        validate_config(&config).expect("config ok");
    }

    #[test]
    fn safety_limits_require_positive_values() {
        let mut config = config("127.0.0.1:0");
        config.max_body_bytes = 0;
        let err = validate_config(&config).expect_err("zero body limit");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn status_mapping_covers_storage_errors() {
        assert_eq!(error_status(ErrorKind::UnknownTarget), StatusCode::NOT_FOUND);
        assert_eq!(error_status(ErrorKind::InvalidRegion), StatusCode::BAD_REQUEST);
        assert_eq!(error_status(ErrorKind::OutOfSpace), StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(error_status(ErrorKind::Busy), StatusCode::LOCKED);
        assert_eq!(error_status(ErrorKind::PartialMigration), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn spawned_server_round_trips_region_ops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Runtime::new();
        let provider = Provider::register(&runtime, 5, Executor::BlockingPool).expect("register");
        let target = provider
            .create_target(dir.path().join("pool.bake"), 1024 * 1024)
            .expect("target");
        let server = spawn(config("127.0.0.1:0"), runtime).expect("spawn");

        let client = Client::init();
        let handle = client.provider_handle(&server.url(), 5).expect("handle");
        assert_eq!(handle.probe(0).expect("probe"), vec![target]);

        let region = handle.create_write_persist(target, b"over http").expect("cwp");
        assert_eq!(handle.read(target, &region, 0, 9).expect("read"), b"over http");

        let err = handle.read(TargetId::generate(), &region, 0, 9).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::UnknownTarget);

        let missing = client.provider_handle(&server.url(), 6).expect("handle");
        assert_eq!(missing.count_targets().expect_err("no provider").kind(), ErrorKind::NotFound);

        let err = client.shutdown_service(&server.url()).expect_err("disabled");
        assert_eq!(err.kind(), ErrorKind::Permission);
        server.shutdown().expect("shutdown");
    }

    #[test]
    fn bodyless_ops_keep_pooled_connections_usable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Runtime::new();
        let provider = Provider::register(&runtime, 1, Executor::BlockingPool).expect("register");
        let target = provider
            .create_target(dir.path().join("pool.bake"), 4 * 1024 * 1024)
            .expect("target");
        let server = spawn(config("127.0.0.1:0"), runtime).expect("spawn");

        let client = Client::init();
        let handle = client.provider_handle(&server.url(), 1).expect("handle");
        for round in 0..200 {
            assert_eq!(handle.count_targets().expect("count"), 1, "round {round}");
            handle.create(target, 8).expect("create after count");
        }
        assert_eq!(handle.list_regions(target).expect("list").len(), 200);
        server.shutdown().expect("shutdown");
    }

    #[test]
    fn inline_reads_above_ten_megabytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = Runtime::new();
        let provider = Provider::register(&runtime, 1, Executor::BlockingPool).expect("register");
        let target = provider
            .create_target(dir.path().join("pool.bake"), 32 * 1024 * 1024)
            .expect("target");
        let mut config = config("127.0.0.1:0");
        config.max_body_bytes = 64 * 1024 * 1024;
        let server = spawn(config, runtime).expect("spawn");

        let client = Client::init();
        let handle = client.provider_handle(&server.url(), 1).expect("handle");
        let payload: Vec<u8> = (0..12 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
        let region = handle.create_write_persist(target, &payload).expect("cwp");

        handle.set_eager_limit(32 * 1024 * 1024);
        let data = handle
            .read(target, &region, 0, payload.len() as u64)
            .expect("inline read");
        assert_eq!(data.len(), payload.len());
        assert!(data == payload);
        server.shutdown().expect("shutdown");
    }
}
