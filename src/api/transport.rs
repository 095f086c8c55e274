//! Purpose: Blocking HTTP transport shared by clients and providers.
//! Exports: `Transport`, `resolve_address`.
//! Role: Address resolution, bulk pull/push, and JSON/raw RPC calls over `ureq`.
//! Invariants: An empty remote address means the local bulk registry; no network I/O.
//! Invariants: Remote errors are decoded from the v0 error envelope when present.
//! Invariants: A short bulk transfer is an error, never a partial success.
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::bulk::{BulkHandle, BulkRegistry};
use crate::api::wire::{ErrorEnvelope, OkResponse};
use crate::core::error::{Error, ErrorKind};

pub struct Transport {
    agent: ureq::Agent,
    bulk: Arc<BulkRegistry>,
    timeout: Option<Duration>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            agent: build_agent(None),
            bulk: Arc::new(BulkRegistry::new()),
            timeout: None,
        }
    }

    /// Same bulk registry, new agent with an overall per-request timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            agent: build_agent(Some(timeout)),
            bulk: Arc::clone(&self.bulk),
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn bulk(&self) -> &BulkRegistry {
        &self.bulk
    }

    /// Reads `size` bytes at `offset` of a bulk buffer owned by `remote_address`.
    pub fn pull(
        &self,
        remote_address: &str,
        handle: BulkHandle,
        offset: u64,
        size: u64,
    ) -> Result<Vec<u8>, Error> {
        if remote_address.is_empty() {
            return self.bulk.pull(handle.id, offset, size);
        }
        let url = bulk_url(&resolve_address(remote_address)?, handle, offset, size)?;
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(|err| transport_error(err, &url))?;
        let data = read_bytes_response(response, size)?;
        if data.len() as u64 != size {
            return Err(Error::new(ErrorKind::Io).with_message(format!(
                "short bulk transfer: expected {size} bytes, got {}",
                data.len()
            )));
        }
        Ok(data)
    }

    /// Writes `data` at `offset` of a bulk buffer owned by `remote_address`.
    pub fn push(
        &self,
        remote_address: &str,
        handle: BulkHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), Error> {
        if remote_address.is_empty() {
            return self.bulk.push(handle.id, offset, data);
        }
        let url = bulk_url(
            &resolve_address(remote_address)?,
            handle,
            offset,
            data.len() as u64,
        )?;
        let _: OkResponse = self.call_raw("PUT", &url, data)?;
        Ok(())
    }

    pub(crate) fn call_json<T, R>(&self, url: &Url, body: &T) -> Result<R, Error>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_string(body).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode request json")
                .with_source(err)
        })?;
        let response = self
            .agent
            .post(url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/json")
            .send_string(&payload)
            .map_err(|err| transport_error(err, url))?;
        read_json_response(response)
    }

    pub(crate) fn call_raw<R>(&self, method: &str, url: &Url, body: &[u8]) -> Result<R, Error>
    where
        R: DeserializeOwned,
    {
        let response = self
            .agent
            .request(method, url.as_str())
            .set("Accept", "application/json")
            .set("Content-Type", "application/octet-stream")
            .send_bytes(body)
            .map_err(|err| transport_error(err, url))?;
        read_json_response(response)
    }

    /// POSTs an empty body and returns the raw response body (at most `limit` bytes).
    pub(crate) fn call_for_bytes(&self, url: &Url, limit: u64) -> Result<Vec<u8>, Error> {
        let response = self
            .agent
            .post(url.as_str())
            .set("Accept", "application/octet-stream")
            .send_bytes(&[])
            .map_err(|err| transport_error(err, url))?;
        read_bytes_response(response, limit)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    let mut builder = ureq::AgentBuilder::new().timeout_connect(DEFAULT_CONNECT_TIMEOUT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Parses `http(s)://host:port` or bare `host:port` and resolves it to at least one
/// socket address. Reachability is not checked here.
pub fn resolve_address(address: &str) -> Result<Url, Error> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(Error::new(ErrorKind::AddressResolution).with_message("address is empty"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let mut url = Url::parse(&candidate).map_err(|err| {
        Error::new(ErrorKind::AddressResolution)
            .with_message(format!("invalid address {trimmed:?}"))
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::AddressResolution)
            .with_message(format!("unsupported address scheme {scheme:?}"))
            .with_hint("Use host:port or an http:// URL."));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(Error::new(ErrorKind::AddressResolution)
            .with_message("address must not include a path"));
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);

    let addrs = url.socket_addrs(|| None).map_err(|err| {
        Error::new(ErrorKind::AddressResolution)
            .with_message(format!("failed to resolve {trimmed:?}"))
            .with_source(err)
    })?;
    if addrs.is_empty() {
        return Err(Error::new(ErrorKind::AddressResolution)
            .with_message(format!("{trimmed:?} resolved to no addresses")));
    }
    Ok(url)
}

pub(crate) fn build_url(base_url: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::InvalidArgument).with_message("address cannot be a base url")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn bulk_url(base_url: &Url, handle: BulkHandle, offset: u64, size: u64) -> Result<Url, Error> {
    let mut url = build_url(base_url, &["v0", "bulk", &handle.id.to_string()])?;
    url.query_pairs_mut()
        .append_pair("offset", &offset.to_string())
        .append_pair("size", &size.to_string());
    Ok(url)
}

/// Upper bound on a JSON response body; inline data and full region listings fit well below it.
const MAX_JSON_RESPONSE_BYTES: u64 = 1 << 30;

fn read_json_response<R>(response: ureq::Response) -> Result<R, Error>
where
    R: DeserializeOwned,
{
    let reader = io::BufReader::new(response.into_reader().take(MAX_JSON_RESPONSE_BYTES));
    serde_json::from_reader(reader).map_err(|err| match err.io_error_kind() {
        Some(kind) => Error::new(map_read_error_kind(&io::Error::from(kind)))
            .with_message("failed to read response body")
            .with_source(err),
        None if err.is_eof() => Error::new(ErrorKind::Io)
            .with_message("response body ended early")
            .with_source(err),
        None => Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err),
    })
}

fn read_bytes_response(response: ureq::Response, limit: u64) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    response
        .into_reader()
        .take(limit)
        .read_to_end(&mut data)
        .map_err(|err| {
            Error::new(map_read_error_kind(&err))
                .with_message("failed to read response body")
                .with_source(err)
        })?;
    Ok(data)
}

fn map_read_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        _ => ErrorKind::Io,
    }
}

fn transport_error(err: ureq::Error, url: &Url) -> Error {
    match err {
        ureq::Error::Status(code, response) => parse_error_response(code, response),
        ureq::Error::Transport(transport) => {
            let kind = match transport.kind() {
                ureq::ErrorKind::Dns => ErrorKind::AddressResolution,
                ureq::ErrorKind::Io | ureq::ErrorKind::ConnectionFailed => {
                    io_source_kind(&transport)
                }
                _ => ErrorKind::Io,
            };
            Error::new(kind)
                .with_message(format!("request to {url} failed"))
                .with_source(transport)
        }
    }
}

fn io_source_kind(transport: &ureq::Transport) -> ErrorKind {
    let io = std::error::Error::source(transport).and_then(|source| source.downcast_ref::<io::Error>());
    match io {
        Some(err) => map_read_error_kind(err),
        None => ErrorKind::Io,
    }
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
        return envelope.error.into_error();
    }
    let kind = error_kind_from_status(status);
    Error::new(kind).with_message(format!("remote error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 | 422 => ErrorKind::InvalidArgument,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        408 | 504 => ErrorKind::Timeout,
        409 => ErrorKind::AlreadyExists,
        423 => ErrorKind::Busy,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
