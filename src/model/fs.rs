use std::{fmt, str::FromStr};

use thiserror::Error;
use time::OffsetDateTime;

pub const ACL_PUBLIC_READ: &str = "public-read";
pub const ACL_PRIVATE: &str = "private";

#[derive(Debug, Error)]
pub enum FSError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("failed to {op} at: {key}, {message}")]
    Backend {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("failed to parse bucket uri: {0}")]
    InvalidUri(String),
}

impl FSError {
    pub fn backend(op: &'static str, key: &str, err: impl fmt::Display) -> Self {
        FSError::Backend {
            op,
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FSError::NotFound(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryType {
    File,
    Dir,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::File => "file",
            EntryType::Dir => "dir",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-valued access model exposed to callers.
///
/// The backend ACL vocabulary is richer (`default`, `public-read-write`,
/// bucket-inherited grants, ...). Only `public-read` maps inward to
/// `Public`; every other token folds to `Private`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn to_acl(self) -> &'static str {
        match self {
            Visibility::Public => ACL_PUBLIC_READ,
            Visibility::Private => ACL_PRIVATE,
        }
    }

    pub fn from_acl(acl: &str) -> Self {
        if acl == ACL_PUBLIC_READ {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility: {}", other)),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized attributes of a single file or directory entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub path: String,
    pub dirname: String,
    pub kind: EntryType,
    pub size: Option<u64>,
    pub mimetype: Option<String>,
    pub timestamp: Option<i64>,
    pub storage_class: Option<String>,
}

impl Metadata {
    pub fn dir(path: &str, dirname: &str) -> Self {
        Self {
            path: path.to_string(),
            dirname: dirname.to_string(),
            kind: EntryType::Dir,
            size: None,
            mimetype: None,
            timestamp: None,
            storage_class: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryType::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryType::File
    }
}

/// Result of a materialized read.
#[derive(Debug)]
pub struct FileContents {
    pub metadata: Metadata,
    pub contents: Vec<u8>,
}

/// Result of a streaming read. The stream is owned by the caller and
/// positioned at offset 0.
pub struct FileStream {
    pub metadata: Metadata,
    pub stream: Box<dyn std::io::Read + Send>,
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Uniform raw backend shape consumed by the response normalizer.
///
/// Listing entries carry `key`; common prefixes from a delimited listing
/// carry `prefix` instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawObject {
    pub key: Option<String>,
    pub prefix: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub storage_class: Option<String>,
}

impl RawObject {
    pub fn key(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Default::default()
        }
    }

    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_from_acl() {
        let cases = vec![
            ("public-read", Visibility::Public),
            ("private", Visibility::Private),
            ("default", Visibility::Private),
            ("public-read-write", Visibility::Private),
            ("", Visibility::Private),
        ];

        for (acl, expected) in cases {
            assert_eq!(Visibility::from_acl(acl), expected, "failed for case: {}", acl);
        }
    }

    #[test]
    fn test_visibility_acl_round_trip() {
        for visibility in [Visibility::Public, Visibility::Private] {
            assert_eq!(Visibility::from_acl(visibility.to_acl()), visibility);
            assert_eq!(visibility.as_str().parse::<Visibility>(), Ok(visibility));
        }

        assert!("world".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_error_message() {
        let err = FSError::backend("put_object", "a/b.txt", "timeout");
        assert_eq!(err.to_string(), "failed to put_object at: a/b.txt, timeout");
        assert!(!err.is_not_found());
        assert!(FSError::NotFound("a".to_string()).is_not_found());
    }
}
