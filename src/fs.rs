use std::{
    collections::{BTreeSet, HashSet},
    io::Read,
    sync::Arc,
};

use tracing::{error, info, span, warn, Level};

use crate::{
    adapters::{ObjectClient, ObjectSummary},
    config::AdapterConfig,
    filesystem::Filesystem,
    model::{
        fs::{EntryType, FSError, FileContents, FileStream, Metadata, RawObject, Visibility},
        options::{
            options_from_config, Config, Headers, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE,
            OPTION_ACL, OPTION_VISIBILITY,
        },
    },
    util::object::{ancestors, dirname, guess_mime_type, DIR_SEPARATOR},
};

/// Objects and common prefixes collected from every page of a listing.
#[derive(Debug, Default)]
pub struct DirObjects {
    pub objects: Vec<ObjectSummary>,
    pub prefixes: Vec<String>,
}

/// Path-mapped storage adapter.
///
/// Maps logical paths onto `prefix + path` object keys in one bucket and
/// emulates directories with zero-byte `/`-terminated marker objects.
/// Holds no mutable state; every call is a function of its arguments and
/// the construction-time configuration.
pub struct ObjectFS {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    endpoint: String,
    ssl: bool,
    is_cname: bool,
    cdn_domain: String,
    prefix: String,
    options: Headers,
}

impl ObjectFS {
    pub fn new(client: Arc<dyn ObjectClient>, config: AdapterConfig) -> Self {
        let prefix = match config.prefix.as_deref().map(|p| p.trim_matches(DIR_SEPARATOR)) {
            Some(p) if !p.is_empty() => format!("{}{}", p, DIR_SEPARATOR),
            _ => String::new(),
        };

        Self {
            client,
            bucket: config.bucket,
            endpoint: config.endpoint,
            ssl: config.ssl,
            is_cname: config.is_cname,
            cdn_domain: config.cdn_domain,
            prefix,
            options: config.options,
        }
    }

    pub fn get_bucket(&self) -> &str {
        &self.bucket
    }

    pub fn get_client(&self) -> &dyn ObjectClient {
        self.client.as_ref()
    }

    pub fn get_path_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn apply_path_prefix(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path.trim_start_matches(DIR_SEPARATOR))
    }

    /// Strips the configured prefix; keys outside the prefix yield `None`.
    pub fn remove_path_prefix(&self, key: &str) -> Option<String> {
        key.strip_prefix(self.prefix.as_str()).map(str::to_string)
    }

    /// Shapes any raw backend response into a [`Metadata`] record.
    ///
    /// Without an explicit `path` the logical path comes from `key`, or from
    /// `prefix` for common-prefix listing entries. A path ending in `/` is a
    /// directory. Returns `None` when no logical path can be resolved.
    pub fn normalize_response(&self, raw: &RawObject, path: Option<&str>) -> Option<Metadata> {
        let path = match path {
            Some(path) => path.to_string(),
            None => {
                let key = raw.key.as_deref().or(raw.prefix.as_deref())?;
                let path = self.remove_path_prefix(key)?;
                if path.trim_end_matches(DIR_SEPARATOR).is_empty() {
                    return None;
                }
                path
            }
        };

        let dirname = dirname(&path);
        let timestamp = raw.last_modified.map(|t| t.unix_timestamp());

        if path.ends_with(DIR_SEPARATOR) {
            let mut meta = Metadata::dir(path.trim_end_matches(DIR_SEPARATOR), &dirname);
            meta.timestamp = timestamp;
            return Some(meta);
        }

        Some(Metadata {
            path,
            dirname,
            kind: EntryType::File,
            size: raw.size,
            mimetype: raw.content_type.clone(),
            timestamp,
            storage_class: raw.storage_class.clone(),
        })
    }

    /// Follows listing pagination to completion under `dir_key`.
    pub fn list_dir_objects(&self, dir_key: &str, recursive: bool) -> Result<DirObjects, FSError> {
        let delimiter = if recursive { None } else { Some("/") };
        let mut listing = DirObjects::default();
        let mut marker: Option<String> = None;

        loop {
            let page = self.client.fs_list_objects(
                &self.bucket,
                dir_key,
                delimiter,
                marker.as_deref(),
            )?;

            listing.objects.extend(page.objects);
            listing.prefixes.extend(page.prefixes);

            if !page.is_truncated {
                break;
            }

            marker = match page.next_marker {
                Some(next) => Some(next),
                None => {
                    return Err(FSError::backend(
                        "list_objects",
                        dir_key,
                        "truncated page without continuation marker",
                    ))
                }
            };
        }

        Ok(listing)
    }

    fn dir_key(&self, directory: &str) -> String {
        let directory = directory.trim_matches(DIR_SEPARATOR);
        if directory.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}{}{}", self.prefix, directory, DIR_SEPARATOR)
        }
    }

    fn get_options(&self, config: &Config) -> Headers {
        let mut options = self.options.clone();
        options.extend(options_from_config(config));
        options
    }

    fn read_object(&self, path: &str) -> Option<(Metadata, Box<dyn Read + Send>)> {
        let object = self.apply_path_prefix(path);

        let body = match self.client.fs_get_object(&self.bucket, &object) {
            Err(err) => {
                error!(error_message=%err, error_group="get_object");
                return None;
            }
            Ok(body) => body,
        };

        let path = logical_path(path);
        let meta = self.normalize_response(&body.meta.to_raw(&object), Some(path))?;
        Some((meta, body.body))
    }

    fn put_object(&self, path: &str, contents: Vec<u8>, config: &Config) -> Option<Metadata> {
        let object = self.apply_path_prefix(path);
        let mut options = self.get_options(config);

        options
            .entry(HEADER_CONTENT_LENGTH.to_string())
            .or_insert_with(|| contents.len().to_string());
        options
            .entry(HEADER_CONTENT_TYPE.to_string())
            .or_insert_with(|| guess_mime_type(path, &contents));

        if let Err(err) = self
            .client
            .fs_put_object(&self.bucket, &object, contents, &options)
        {
            error!(error_message=%err, error_group="put_object");
            return None;
        }

        let raw = RawObject {
            size: options
                .get(HEADER_CONTENT_LENGTH)
                .and_then(|len| len.parse().ok()),
            content_type: options.get(HEADER_CONTENT_TYPE).cloned(),
            ..RawObject::key(&object)
        };

        self.normalize_response(&raw, Some(logical_path(path)))
    }

    /// Carries the current ACL into `config` unless the caller chose one.
    fn preserve_acl(&self, path: &str, config: &Config) -> Config {
        let mut config = config.clone();

        // an overwrite resets the ACL to the bucket default unless one is sent
        if !config.has(OPTION_VISIBILITY) && !config.has(OPTION_ACL) {
            let object = self.apply_path_prefix(path);
            match self.client.fs_get_object_acl(&self.bucket, &object) {
                Ok(acl) => config.set(OPTION_ACL, acl),
                Err(err) => warn!(error_message=%err, error_group="get_object_acl"),
            }
        }

        config
    }
}

/// Logical paths never carry a leading separator.
fn logical_path(path: &str) -> &str {
    path.trim_start_matches(DIR_SEPARATOR)
}

fn read_all(resource: &mut dyn Read) -> Option<Vec<u8>> {
    let mut contents = Vec::new();
    match resource.read_to_end(&mut contents) {
        Err(err) => {
            error!(error_message=%err, error_group="read_stream");
            None
        }
        Ok(_) => Some(contents),
    }
}

/// Adds a directory entry for every ancestor of a listed entry that has no
/// explicit directory entry of its own.
pub fn emulate_directories(listing: Vec<Metadata>) -> Vec<Metadata> {
    let listed: HashSet<String> = listing
        .iter()
        .filter(|m| m.is_dir())
        .map(|m| m.path.clone())
        .collect();

    let missing: BTreeSet<String> = listing
        .iter()
        .flat_map(|m| ancestors(&m.path))
        .filter(|d| !listed.contains(d))
        .collect();

    let mut seen = HashSet::new();
    listing
        .into_iter()
        .chain(missing.into_iter().map(|d| Metadata::dir(&d, &dirname(&d))))
        .filter(|m| seen.insert((m.path.clone(), m.kind)))
        .collect()
}

fn is_inside(directory: &str, path: &str) -> bool {
    if directory.is_empty() {
        return !path.is_empty();
    }

    path.strip_prefix(directory)
        .is_some_and(|rest| rest.starts_with(DIR_SEPARATOR) && rest.len() > 1)
}

impl Filesystem for ObjectFS {
    fn write(&self, path: &str, contents: &[u8], config: &Config) -> Option<Metadata> {
        let span = span!(Level::INFO, "write", context = "write");
        let _e = span.enter();
        info!(path = path, size = contents.len(), "called");

        self.put_object(path, contents.to_vec(), config)
    }

    fn write_stream(
        &self,
        path: &str,
        resource: &mut dyn Read,
        config: &Config,
    ) -> Option<Metadata> {
        let span = span!(Level::INFO, "write_stream", context = "write_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let contents = read_all(resource)?;
        self.put_object(path, contents, config)
    }

    fn update(&self, path: &str, contents: &[u8], config: &Config) -> Option<Metadata> {
        let span = span!(Level::INFO, "update", context = "update");
        let _e = span.enter();
        info!(path = path, size = contents.len(), "called");

        let config = self.preserve_acl(path, config);
        self.put_object(path, contents.to_vec(), &config)
    }

    fn update_stream(
        &self,
        path: &str,
        resource: &mut dyn Read,
        config: &Config,
    ) -> Option<Metadata> {
        let span = span!(Level::INFO, "update_stream", context = "update_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let contents = read_all(resource)?;
        let config = self.preserve_acl(path, config);
        self.put_object(path, contents, &config)
    }

    fn rename(&self, path: &str, newpath: &str) -> bool {
        let span = span!(Level::INFO, "rename", context = "rename");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        if !self.copy(path, newpath) {
            return false;
        }

        self.delete(path)
    }

    fn copy(&self, path: &str, newpath: &str) -> bool {
        let span = span!(Level::INFO, "copy", context = "copy");
        let _e = span.enter();
        info!(path = path, newpath = newpath, "called");

        let object = self.apply_path_prefix(path);
        let new_object = self.apply_path_prefix(newpath);

        match self
            .client
            .fs_copy_object(&self.bucket, &object, &self.bucket, &new_object)
        {
            Err(err) => {
                error!(error_message=%err, error_group="copy_object");
                false
            }
            Ok(_) => true,
        }
    }

    fn delete(&self, path: &str) -> bool {
        let span = span!(Level::INFO, "delete", context = "delete");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_path_prefix(path);

        if let Err(err) = self.client.fs_delete_object(&self.bucket, &object) {
            error!(error_message=%err, error_group="delete_object");
            return false;
        }

        // a successful delete is only trusted once the key reads back as absent
        match self.client.fs_object_exists(&self.bucket, &object) {
            Err(err) => {
                error!(error_message=%err, error_group="object_exists");
                false
            }
            Ok(true) => {
                warn!(key = %object, "object still present after delete");
                false
            }
            Ok(false) => true,
        }
    }

    fn delete_dir(&self, dirname: &str) -> bool {
        let span = span!(Level::INFO, "delete_dir", context = "delete_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let object = self.apply_path_prefix(dirname);
        let object = object.trim_end_matches(DIR_SEPARATOR);

        // with no prefix an empty dirname would address the bucket root
        if object.is_empty() {
            error!(error_message="refusing to delete the bucket root", error_group="delete_dir");
            return false;
        }

        let dir_key = format!("{}{}", object, DIR_SEPARATOR);

        let listing = match self.list_dir_objects(&dir_key, true) {
            Err(err) => {
                error!(error_message=%err, error_group="list_objects");
                return false;
            }
            Ok(listing) => listing,
        };

        let keys: Vec<String> = listing
            .objects
            .into_iter()
            .map(|o| o.key)
            .filter(|key| *key != dir_key)
            .collect();

        if !keys.is_empty() {
            info!(count = keys.len(), "deleting directory contents");

            if let Err(err) = self.client.fs_delete_objects(&self.bucket, &keys) {
                error!(error_message=%err, error_group="delete_objects");
                return false;
            }
        }

        if let Err(err) = self.client.fs_delete_object(&self.bucket, &dir_key) {
            error!(error_message=%err, error_group="delete_object");
            return false;
        }

        true
    }

    fn create_dir(&self, dirname: &str, config: &Config) -> Option<Metadata> {
        let span = span!(Level::INFO, "create_dir", context = "create_dir");
        let _e = span.enter();
        info!(dirname = dirname, "called");

        let object = self.apply_path_prefix(dirname);
        let options = options_from_config(config);

        if let Err(err) = self
            .client
            .fs_create_object_dir(&self.bucket, &object, &options)
        {
            error!(error_message=%err, error_group="create_object_dir");
            return None;
        }

        let path = dirname.trim_matches(DIR_SEPARATOR);
        Some(Metadata::dir(path, &crate::util::object::dirname(path)))
    }

    fn set_visibility(&self, path: &str, visibility: Visibility) -> Option<Visibility> {
        let span = span!(Level::INFO, "set_visibility", context = "set_visibility");
        let _e = span.enter();
        info!(path = path, visibility = %visibility, "called");

        let object = self.apply_path_prefix(path);

        match self
            .client
            .fs_put_object_acl(&self.bucket, &object, visibility.to_acl())
        {
            Err(err) => {
                error!(error_message=%err, error_group="put_object_acl");
                None
            }
            Ok(_) => Some(visibility),
        }
    }

    fn has(&self, path: &str) -> bool {
        let object = self.apply_path_prefix(path);

        match self.client.fs_object_exists(&self.bucket, &object) {
            Err(err) => {
                error!(error_message=%err, error_group="object_exists");
                false
            }
            Ok(exists) => exists,
        }
    }

    fn read(&self, path: &str) -> Option<FileContents> {
        let span = span!(Level::INFO, "read", context = "read");
        let _e = span.enter();
        info!(path = path, "called");

        let (metadata, mut body) = self.read_object(path)?;

        let mut contents = Vec::new();
        if let Err(err) = body.read_to_end(&mut contents) {
            error!(error_message=%err, error_group="read_body");
            return None;
        }

        Some(FileContents { metadata, contents })
    }

    fn read_stream(&self, path: &str) -> Option<FileStream> {
        let span = span!(Level::INFO, "read_stream", context = "read_stream");
        let _e = span.enter();
        info!(path = path, "called");

        let (metadata, stream) = self.read_object(path)?;

        Some(FileStream { metadata, stream })
    }

    fn list_contents(&self, directory: &str, recursive: bool) -> Vec<Metadata> {
        let span = span!(Level::INFO, "list_contents", context = "list_contents");
        let _e = span.enter();
        info!(directory = directory, recursive = recursive, "called");

        let directory = directory.trim_matches(DIR_SEPARATOR);
        let dir_key = self.dir_key(directory);

        let listing = match self.list_dir_objects(&dir_key, recursive) {
            Err(err) => {
                error!(error_message=%err, error_group="list_objects");
                return Vec::new();
            }
            Ok(listing) => listing,
        };

        let raws = listing
            .objects
            .iter()
            .map(RawObject::from)
            .chain(listing.prefixes.iter().map(|p| RawObject::prefix(p)));

        let normalized: Vec<Metadata> = raws
            .filter_map(|raw| self.normalize_response(&raw, None))
            .collect();

        let mut contents = emulate_directories(normalized);
        contents.retain(|m| is_inside(directory, &m.path));

        contents
    }

    fn get_metadata(&self, path: &str) -> Option<Metadata> {
        let span = span!(Level::INFO, "get_metadata", context = "get_metadata");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_path_prefix(path);

        let meta = match self.client.fs_head_object(&self.bucket, &object) {
            Err(err) => {
                error!(error_message=%err, error_group="head_object");
                return None;
            }
            Ok(meta) => meta,
        };

        let path = logical_path(path);
        self.normalize_response(&meta.to_raw(&object), Some(path))
    }

    fn get_size(&self, path: &str) -> Option<u64> {
        self.get_metadata(path)?.size
    }

    fn get_mimetype(&self, path: &str) -> Option<String> {
        self.get_metadata(path)?.mimetype
    }

    fn get_timestamp(&self, path: &str) -> Option<i64> {
        self.get_metadata(path)?.timestamp
    }

    fn get_visibility(&self, path: &str) -> Option<Visibility> {
        let span = span!(Level::INFO, "get_visibility", context = "get_visibility");
        let _e = span.enter();
        info!(path = path, "called");

        let object = self.apply_path_prefix(path);

        match self.client.fs_get_object_acl(&self.bucket, &object) {
            Err(err) => {
                error!(error_message=%err, error_group="get_object_acl");
                None
            }
            Ok(acl) => Some(Visibility::from_acl(&acl)),
        }
    }

    fn get_url(&self, path: &str) -> Result<String, FSError> {
        if !self.has(path) {
            return Err(FSError::NotFound(path.to_string()));
        }

        let scheme = if self.ssl { "https" } else { "http" };
        let host = if self.is_cname {
            if self.cdn_domain.is_empty() {
                self.endpoint.clone()
            } else {
                self.cdn_domain.clone()
            }
        } else {
            format!("{}.{}", self.bucket, self.endpoint)
        };

        Ok(format!("{}://{}/{}", scheme, host, self.apply_path_prefix(path)))
    }
}
