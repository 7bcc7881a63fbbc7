use std::io::Read;

use crate::model::{
    fs::{FSError, FileContents, FileStream, Metadata, Visibility},
    options::Config,
};

/// Filesystem-shaped verbs over a flat key/value store.
///
/// Backend failures are reported as `None`, `false` or an empty listing;
/// only [`Filesystem::get_url`] returns an error, for a missing object.
///
/// Multi-step verbs (`rename`, `update`, `delete_dir`) are a sequence of
/// independent backend calls with no rollback. A `false` from `rename` can
/// mean the copy failed with the source untouched, or the copy succeeded
/// and the source delete failed, leaving both paths populated.
pub trait Filesystem: Send + Sync {
    fn write(&self, path: &str, contents: &[u8], config: &Config) -> Option<Metadata>;

    /// Buffers the whole stream before writing.
    fn write_stream(&self, path: &str, resource: &mut dyn Read, config: &Config)
        -> Option<Metadata>;

    /// Like `write`, but keeps the current ACL unless `config` sets one.
    fn update(&self, path: &str, contents: &[u8], config: &Config) -> Option<Metadata>;

    fn update_stream(
        &self,
        path: &str,
        resource: &mut dyn Read,
        config: &Config,
    ) -> Option<Metadata>;

    fn rename(&self, path: &str, newpath: &str) -> bool;

    fn copy(&self, path: &str, newpath: &str) -> bool;

    fn delete(&self, path: &str) -> bool;

    fn delete_dir(&self, dirname: &str) -> bool;

    fn create_dir(&self, dirname: &str, config: &Config) -> Option<Metadata>;

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Option<Visibility>;

    fn has(&self, path: &str) -> bool;

    fn read(&self, path: &str) -> Option<FileContents>;

    /// The body is pulled from the backend as the caller reads it; the
    /// stream stays valid after the adapter is dropped.
    fn read_stream(&self, path: &str) -> Option<FileStream>;

    fn list_contents(&self, directory: &str, recursive: bool) -> Vec<Metadata>;

    fn get_metadata(&self, path: &str) -> Option<Metadata>;

    fn get_size(&self, path: &str) -> Option<u64>;

    fn get_mimetype(&self, path: &str) -> Option<String>;

    fn get_timestamp(&self, path: &str) -> Option<i64>;

    fn get_visibility(&self, path: &str) -> Option<Visibility>;

    fn get_url(&self, path: &str) -> Result<String, FSError>;
}
