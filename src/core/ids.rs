//! Purpose: Fixed-size identifiers for storage targets and regions.
//! Exports: `TargetId`, `RegionId`, `REGION_ID_LEN`.
//! Role: Shared by storage, provider dispatch, the wire envelopes, and the CLI.
//! Invariants: TargetId text form is the 36-char hyphenated UUID and round-trips exactly.
//! Invariants: RegionId raw form is exactly `REGION_ID_LEN` little-endian bytes; text is base64.
//! Invariants: A RegionId carries its target tag, so foreign-target use is detectable.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::core::error::{Error, ErrorKind};

pub const TARGET_ID_TEXT_LEN: usize = 36;
pub const REGION_ID_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TargetId(Uuid);

impl TargetId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Low 64 bits of the UUID, embedded into every RegionId of the target.
    pub fn tag(&self) -> u64 {
        let bytes = self.0.as_bytes();
        let mut low = [0u8; 8];
        low.copy_from_slice(&bytes[8..16]);
        u64::from_le_bytes(low)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TargetId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.len() != TARGET_ID_TEXT_LEN {
            return Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!(
                    "target id must be {TARGET_ID_TEXT_LEN} characters, got {}",
                    input.len()
                ))
                .with_hint("Use the hyphenated UUID form printed by `probe` or `target list`."));
        }
        Uuid::try_parse(input).map(Self).map_err(|err| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message("invalid target id")
                .with_source(err)
        })
    }
}

impl Serialize for TargetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TargetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RegionId {
    pub(crate) target_tag: u64,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl RegionId {
    pub(crate) fn new(target: TargetId, slot: u32, generation: u32, offset: u64, size: u64) -> Self {
        Self {
            target_tag: target.tag(),
            slot,
            generation,
            offset,
            size,
        }
    }

    /// Size fixed at creation.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn belongs_to(&self, target: TargetId) -> bool {
        self.target_tag == target.tag()
    }

    pub fn to_bytes(&self) -> [u8; REGION_ID_LEN] {
        let mut buf = [0u8; REGION_ID_LEN];
        buf[0..8].copy_from_slice(&self.target_tag.to_le_bytes());
        buf[8..12].copy_from_slice(&self.slot.to_le_bytes());
        buf[12..16].copy_from_slice(&self.generation.to_le_bytes());
        buf[16..24].copy_from_slice(&self.offset.to_le_bytes());
        buf[24..32].copy_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != REGION_ID_LEN {
            return Err(Error::new(ErrorKind::InvalidArgument).with_message(format!(
                "region id must be {REGION_ID_LEN} bytes, got {}",
                buf.len()
            )));
        }
        Ok(Self {
            target_tag: u64::from_le_bytes(read_8(buf, 0)),
            slot: u32::from_le_bytes(read_4(buf, 8)),
            generation: u32::from_le_bytes(read_4(buf, 12)),
            offset: u64::from_le_bytes(read_8(buf, 16)),
            size: u64::from_le_bytes(read_8(buf, 24)),
        })
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.to_bytes()))
    }
}

impl FromStr for RegionId {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = STANDARD.decode(input.trim()).map_err(|err| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message("region id is not valid base64")
                .with_source(err)
        })?;
        Self::from_bytes(&raw)
    }
}

impl Serialize for RegionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RegionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

fn read_4(buf: &[u8], offset: usize) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&buf[offset..offset + 4]);
    out
}

fn read_8(buf: &[u8], offset: usize) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&buf[offset..offset + 8]);
    out
}

#[cfg(test)]
mod tests {
    use super::{REGION_ID_LEN, RegionId, TargetId};
    use crate::core::error::ErrorKind;

    #[test]
    fn target_id_text_round_trips() {
        for _ in 0..16 {
            let id = TargetId::generate();
            let text = id.to_string();
            assert_eq!(text.len(), 36);
            assert_eq!(text.parse::<TargetId>().expect("parse"), id);
        }
    }

    #[test]
    fn target_id_rejects_non_canonical_text() {
        let simple = "67e5504410b1426f9247bb680e5fe0c8";
        let err = simple.parse::<TargetId>().expect_err("simple form");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = "67e55044-10b1-426f-9247-bb680e5fe0cz"
            .parse::<TargetId>()
            .expect_err("bad hex");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn region_id_raw_and_text_round_trip() {
        let target = TargetId::generate();
        let region = RegionId::new(target, 7, 3, 4096, 100);
        let raw = region.to_bytes();
        assert_eq!(raw.len(), REGION_ID_LEN);
        assert_eq!(RegionId::from_bytes(&raw).expect("raw"), region);

        let text = region.to_string();
        assert_eq!(text.parse::<RegionId>().expect("text"), region);
        assert!(region.belongs_to(target));
        assert!(!region.belongs_to(TargetId::generate()));
    }

    #[test]
    fn region_id_rejects_wrong_length() {
        let err = RegionId::from_bytes(&[0u8; 31]).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = "AAAA".parse::<RegionId>().expect_err("short text");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        let err = "not base64!".parse::<RegionId>().expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn ids_serialize_as_text() {
        let target = TargetId::generate();
        let region = RegionId::new(target, 1, 0, 0, 32);
        let json = serde_json::to_string(&(target, region)).expect("json");
        let back: (TargetId, RegionId) = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, (target, region));
        assert!(json.contains(&target.to_string()));
    }
}
