use std::io::Read;

use time::OffsetDateTime;

use crate::model::{
    fs::{FSError, RawObject},
    options::Headers,
};

pub mod mock;
pub mod s3;

/// One entry of an object listing.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<OffsetDateTime>,
    pub storage_class: Option<String>,
}

impl From<&ObjectSummary> for RawObject {
    fn from(summary: &ObjectSummary) -> Self {
        RawObject {
            key: Some(summary.key.clone()),
            prefix: None,
            last_modified: summary.last_modified,
            size: Some(summary.size),
            content_type: None,
            storage_class: summary.storage_class.clone(),
        }
    }
}

/// One page of a listing. `next_marker` continues the listing while
/// `is_truncated` is set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListPage {
    pub objects: Vec<ObjectSummary>,
    pub prefixes: Vec<String>,
    pub next_marker: Option<String>,
    pub is_truncated: bool,
}

/// Object metadata as reported by a head/get request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectMeta {
    pub content_length: u64,
    pub content_type: Option<String>,
    pub last_modified: Option<OffsetDateTime>,
    pub storage_class: Option<String>,
}

impl ObjectMeta {
    pub fn to_raw(&self, key: &str) -> RawObject {
        RawObject {
            key: Some(key.to_string()),
            prefix: None,
            last_modified: self.last_modified,
            size: Some(self.content_length),
            content_type: self.content_type.clone(),
            storage_class: self.storage_class.clone(),
        }
    }
}

/// A fetched object. `body` is owned and independent of the client.
pub struct ObjectBody {
    pub meta: ObjectMeta,
    pub body: Box<dyn Read + Send>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// The storage client capability set the filesystem adapter is built on.
///
/// Every call is blocking. A missing object is reported as
/// [`FSError::NotFound`] so callers can tell it apart from transport or
/// service failures.
pub trait ObjectClient: Send + Sync {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<(), FSError>;

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FSError>;

    fn fs_head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError>;

    fn fs_object_exists(&self, bucket: &str, key: &str) -> Result<bool, FSError>;

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError>;

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError>;

    fn fs_copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), FSError>;

    fn fs_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
    ) -> Result<ListPage, FSError>;

    fn fs_get_object_acl(&self, bucket: &str, key: &str) -> Result<String, FSError>;

    fn fs_put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<(), FSError>;

    /// Creates the zero-byte marker object for an emulated directory.
    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        headers: &Headers,
    ) -> Result<(), FSError>;
}
