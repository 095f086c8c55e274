use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Internal,
    InvalidArgument,
    NotFound,
    AlreadyExists,
    UnknownTarget,
    InvalidRegion,
    OutOfBounds,
    OutOfSpace,
    AddressInUse,
    AddressResolution,
    Busy,
    Permission,
    Corrupt,
    Io,
    Timeout,
    PartialMigration,
    Closed,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 17] = [
        ErrorKind::Internal,
        ErrorKind::InvalidArgument,
        ErrorKind::NotFound,
        ErrorKind::AlreadyExists,
        ErrorKind::UnknownTarget,
        ErrorKind::InvalidRegion,
        ErrorKind::OutOfBounds,
        ErrorKind::OutOfSpace,
        ErrorKind::AddressInUse,
        ErrorKind::AddressResolution,
        ErrorKind::Busy,
        ErrorKind::Permission,
        ErrorKind::Corrupt,
        ErrorKind::Io,
        ErrorKind::Timeout,
        ErrorKind::PartialMigration,
        ErrorKind::Closed,
    ];

    /// Stable name used in wire envelopes and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::UnknownTarget => "UnknownTarget",
            ErrorKind::InvalidRegion => "InvalidRegion",
            ErrorKind::OutOfBounds => "OutOfBounds",
            ErrorKind::OutOfSpace => "OutOfSpace",
            ErrorKind::AddressInUse => "AddressInUse",
            ErrorKind::AddressResolution => "AddressResolution",
            ErrorKind::Busy => "Busy",
            ErrorKind::Permission => "Permission",
            ErrorKind::Corrupt => "Corrupt",
            ErrorKind::Io => "Io",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::PartialMigration => "PartialMigration",
            ErrorKind::Closed => "Closed",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    target: Option<String>,
    region: Option<String>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            target: None,
            region: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_target(mut self, target: impl fmt::Display) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_region(mut self, region: impl fmt::Display) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Keeps the first target/region context attached; inner layers know best.
    pub(crate) fn or_target(self, target: impl fmt::Display) -> Self {
        if self.target.is_some() {
            return self;
        }
        self.with_target(target)
    }

    pub(crate) fn or_region(self, region: impl fmt::Display) -> Self {
        if self.region.is_some() {
            return self;
        }
        self.with_region(region)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.as_str())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(target) = &self.target {
            write!(f, " (target: {target})")?;
        }
        if let Some(region) = &self.region {
            write!(f, " (region: {region})")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::InvalidArgument => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::AlreadyExists => 4,
        ErrorKind::Busy => 5,
        ErrorKind::Permission => 6,
        ErrorKind::Corrupt => 7,
        ErrorKind::Io => 8,
        ErrorKind::UnknownTarget => 9,
        ErrorKind::InvalidRegion => 10,
        ErrorKind::OutOfBounds => 11,
        ErrorKind::OutOfSpace => 12,
        ErrorKind::AddressInUse => 13,
        ErrorKind::AddressResolution => 14,
        ErrorKind::Timeout => 15,
        ErrorKind::PartialMigration => 16,
        ErrorKind::Closed => 17,
    }
}

pub(crate) fn map_io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::NotFound,
        std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
        std::io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::Io,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, map_io_error_kind, to_exit_code};
    use std::collections::HashSet;

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::InvalidArgument, 2),
            (ErrorKind::NotFound, 3),
            (ErrorKind::AlreadyExists, 4),
            (ErrorKind::Busy, 5),
            (ErrorKind::Permission, 6),
            (ErrorKind::Corrupt, 7),
            (ErrorKind::Io, 8),
            (ErrorKind::InvalidRegion, 10),
            (ErrorKind::PartialMigration, 16),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }

        let codes: HashSet<i32> = ErrorKind::ALL.into_iter().map(to_exit_code).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::parse("Nope"), None);
    }

    #[test]
    fn display_names_operation_context() {
        let err = Error::new(ErrorKind::OutOfBounds)
            .with_message("write exceeds region size")
            .with_target("t")
            .with_offset(96);
        assert_eq!(
            err.to_string(),
            "OutOfBounds: write exceeds region size (target: t) (offset: 96)"
        );
    }

    #[test]
    fn or_target_keeps_inner_context() {
        let err = Error::new(ErrorKind::Io).with_target("inner").or_target("outer");
        assert_eq!(err.target(), Some("inner"));
        let err = Error::new(ErrorKind::Io).or_target("outer");
        assert_eq!(err.target(), Some("outer"));
    }

    #[test]
    fn io_errors_map_to_storage_kinds() {
        let cases = [
            (std::io::ErrorKind::NotFound, ErrorKind::NotFound),
            (std::io::ErrorKind::AlreadyExists, ErrorKind::AlreadyExists),
            (std::io::ErrorKind::PermissionDenied, ErrorKind::Permission),
            (std::io::ErrorKind::TimedOut, ErrorKind::Timeout),
            (std::io::ErrorKind::BrokenPipe, ErrorKind::Io),
        ];
        for (io_kind, kind) in cases {
            assert_eq!(map_io_error_kind(&std::io::Error::from(io_kind)), kind);
        }
    }
}
