//! Purpose: JSON request/response envelopes shared by the client and the server.
//! Exports: Request/response structs, `ErrorEnvelope`, `ErrorBody`, `base64_bytes`.
//! Role: Single definition of the v0 wire shapes; both sides (de)serialize these.
//! Invariants: Ids travel in text form (hyphenated UUID, base64 RegionId).
//! Invariants: Error kinds travel by stable name; unknown names decode as `Internal`.
use serde::{Deserialize, Serialize};

use crate::api::bulk::BulkHandle;
use crate::core::error::{Error, ErrorKind};
use crate::core::ids::{RegionId, TargetId};

/// Inline byte payloads as standard base64 strings.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::{self, Deserializer};
    use serde::{Deserialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProbeRequest {
    #[serde(default)]
    pub max: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetsResponse {
    pub targets: Vec<TargetId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRequest {
    pub target: TargetId,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionResponse {
    pub region: RegionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub target: TargetId,
    pub region: RegionId,
    #[serde(default)]
    pub offset: u64,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RangeRequest {
    pub target: TargetId,
    pub region: RegionId,
    #[serde(default)]
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionRequest {
    pub target: TargetId,
    pub region: RegionId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SizeResponse {
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateWritePersistRequest {
    pub target: TargetId,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Query string of the raw-body operations (`write_bytes`, `read_bytes`,
/// `create_write_persist_bytes`).
#[derive(Debug, Serialize, Deserialize)]
pub struct RawQuery {
    pub target: TargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionId>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub target: TargetId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<RegionId>,
    #[serde(default)]
    pub offset: u64,
    pub bulk: BulkHandle,
    #[serde(default)]
    pub remote_offset: u64,
    #[serde(default)]
    pub remote_address: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BytesResponse {
    pub bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MigrateRegionRequest {
    pub target: TargetId,
    pub region: RegionId,
    #[serde(default)]
    pub remove_source: bool,
    pub dest_address: String,
    pub dest_provider_id: u16,
    pub dest_target: TargetId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MigrateTargetRequest {
    pub target: TargetId,
    #[serde(default)]
    pub remove_source: bool,
    pub dest_address: String,
    pub dest_provider_id: u16,
    pub dest_root: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetRequest {
    pub target: TargetId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TargetResponse {
    pub target: TargetId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachTargetRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTargetRequest {
    pub path: String,
    pub size: u64,
}

/// Destination side of `migrate_target`: attach `path` if it exists, else create it.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnsureTargetRequest {
    pub path: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionsResponse {
    pub regions: Vec<RegionId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: OkResponse = OkResponse { ok: true };
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl ErrorBody {
    pub fn from_error(err: &Error) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.message().map(str::to_string),
            hint: err.hint().map(str::to_string),
            path: err.path().map(|path| path.to_string_lossy().to_string()),
            target: err.target().map(str::to_string),
            region: err.region().map(str::to_string),
            offset: err.offset(),
        }
    }

    pub fn into_error(self) -> Error {
        let kind = ErrorKind::parse(&self.kind).unwrap_or(ErrorKind::Internal);
        let mut err = Error::new(kind);
        if let Some(message) = self.message {
            err = err.with_message(message);
        }
        if let Some(hint) = self.hint {
            err = err.with_hint(hint);
        }
        if let Some(path) = self.path {
            err = err.with_path(path);
        }
        if let Some(target) = self.target {
            err = err.with_target(target);
        }
        if let Some(region) = self.region {
            err = err.with_region(region);
        }
        if let Some(offset) = self.offset {
            err = err.with_offset(offset);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorBody, ErrorEnvelope, RawQuery, WriteRequest};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::ids::{RegionId, TargetId};

    #[test]
    fn error_envelope_preserves_kind_and_context() {
        let err = Error::new(ErrorKind::OutOfBounds)
            .with_message("write exceeds region size")
            .with_target("t-1")
            .with_offset(96);
        let json = serde_json::to_string(&ErrorEnvelope {
            error: ErrorBody::from_error(&err),
        })
        .expect("json");
        assert!(json.contains("\"kind\":\"OutOfBounds\""));

        let back: ErrorEnvelope = serde_json::from_str(&json).expect("parse");
        let err = back.error.into_error();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert_eq!(err.target(), Some("t-1"));
        assert_eq!(err.offset(), Some(96));
    }

    #[test]
    fn unknown_error_kind_decodes_as_internal() {
        let body: ErrorBody = serde_json::from_str(r#"{"kind":"Mystery"}"#).expect("parse");
        assert_eq!(body.into_error().kind(), ErrorKind::Internal);
    }

    #[test]
    fn inline_data_is_base64() {
        let target = TargetId::generate();
        let region = RegionId::new(target, 0, 0, 0, 8).to_string();
        let json = serde_json::json!({
            "target": target.to_string(),
            "region": region,
            "data": "aGVsbG8="
        });
        let request: WriteRequest = serde_json::from_value(json).expect("parse");
        assert_eq!(request.data, b"hello");
        assert_eq!(request.offset, 0);

        let bad = serde_json::json!({
            "target": target.to_string(),
            "region": region,
            "data": "***"
        });
        assert!(serde_json::from_value::<WriteRequest>(bad).is_err());
    }

    #[test]
    fn raw_query_defaults_offsets() {
        let target = TargetId::generate();
        let query: RawQuery =
            serde_json::from_value(serde_json::json!({ "target": target.to_string() }))
                .expect("parse");
        assert_eq!(query.target, target);
        assert!(query.region.is_none());
        assert_eq!((query.offset, query.size), (0, 0));
    }
}
