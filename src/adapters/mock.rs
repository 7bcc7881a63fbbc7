use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    io::Cursor,
    sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;

use crate::{
    adapters::{ListPage, ObjectBody, ObjectClient, ObjectMeta, ObjectSummary},
    model::{
        fs::FSError,
        options::{Headers, HEADER_ACL, HEADER_CONTENT_TYPE},
    },
};

pub const ACL_DEFAULT: &str = "default";
pub const STORAGE_CLASS_STANDARD: &str = "Standard";

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Clone, Debug)]
struct MockObject {
    data: Vec<u8>,
    content_type: Option<String>,
    acl: String,
    headers: Headers,
    last_modified: OffsetDateTime,
}

/// In-memory object store.
///
/// Buckets spring into existence on first write. Operations can be made to
/// fail (`fail`) or to report success without effect (`ignore`), and every
/// call is counted by operation name (`put_object`, `delete_objects`, ...).
pub struct MockClient {
    objects: Mutex<BTreeMap<(String, String), MockObject>>,
    failing: Mutex<HashSet<&'static str>>,
    ignoring: Mutex<HashSet<&'static str>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    page_size: usize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            ignoring: Mutex::new(HashSet::new()),
            calls: Mutex::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn fail(&self, op: &'static str) {
        lock(&self.failing).insert(op);
    }

    pub fn ignore(&self, op: &'static str) {
        lock(&self.ignoring).insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        lock(&self.failing).remove(op);
        lock(&self.ignoring).remove(op);
    }

    pub fn calls(&self, op: &str) -> usize {
        lock(&self.calls).get(op).copied().unwrap_or(0)
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Headers sent with the last put of `key`.
    pub fn headers(&self, bucket: &str, key: &str) -> Option<Headers> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .map(|object| object.headers.clone())
    }

    /// Records the call and reports whether the operation should fail or
    /// be skipped.
    fn enter(&self, op: &'static str, key: &str) -> Result<bool, FSError> {
        *lock(&self.calls).entry(op).or_insert(0) += 1;

        if lock(&self.failing).contains(op) {
            return Err(FSError::backend(op, key, "injected failure"));
        }

        Ok(lock(&self.ignoring).contains(op))
    }

    fn get(&self, bucket: &str, key: &str) -> Result<MockObject, FSError> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| FSError::NotFound(key.to_string()))
    }

    fn insert(&self, bucket: &str, key: &str, data: Vec<u8>, headers: &Headers) {
        let object = MockObject {
            data,
            content_type: headers.get(HEADER_CONTENT_TYPE).cloned(),
            acl: headers
                .get(HEADER_ACL)
                .cloned()
                .unwrap_or_else(|| ACL_DEFAULT.to_string()),
            headers: headers.clone(),
            last_modified: OffsetDateTime::now_utc(),
        };

        lock(&self.objects).insert((bucket.to_string(), key.to_string()), object);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn meta(object: &MockObject) -> ObjectMeta {
    ObjectMeta {
        content_length: object.data.len() as u64,
        content_type: object.content_type.clone(),
        last_modified: Some(object.last_modified),
        storage_class: Some(STORAGE_CLASS_STANDARD.to_string()),
    }
}

impl ObjectClient for MockClient {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<(), FSError> {
        if self.enter("put_object", key)? {
            return Ok(());
        }

        self.insert(bucket, key, body, headers);
        Ok(())
    }

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FSError> {
        self.enter("get_object", key)?;

        let object = self.get(bucket, key)?;
        Ok(ObjectBody {
            meta: meta(&object),
            body: Box::new(Cursor::new(object.data)),
        })
    }

    fn fs_head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError> {
        self.enter("head_object", key)?;

        self.get(bucket, key).map(|object| meta(&object))
    }

    fn fs_object_exists(&self, bucket: &str, key: &str) -> Result<bool, FSError> {
        self.enter("object_exists", key)?;

        Ok(lock(&self.objects).contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError> {
        if self.enter("delete_object", key)? {
            return Ok(());
        }

        lock(&self.objects).remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError> {
        let first = keys.first().map(String::as_str).unwrap_or("");
        if self.enter("delete_objects", first)? {
            return Ok(());
        }

        let mut objects = lock(&self.objects);
        for key in keys {
            objects.remove(&(bucket.to_string(), key.clone()));
        }

        Ok(())
    }

    fn fs_copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), FSError> {
        if self.enter("copy_object", src_key)? {
            return Ok(());
        }

        let mut object = self.get(src_bucket, src_key)?;
        object.last_modified = OffsetDateTime::now_utc();
        lock(&self.objects).insert((dst_bucket.to_string(), dst_key.to_string()), object);

        Ok(())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
    ) -> Result<ListPage, FSError> {
        self.enter("list_objects", prefix)?;

        let objects = lock(&self.objects);
        let mut page = ListPage::default();
        let mut seen_prefixes = BTreeSet::new();
        let mut count = 0;

        let matching = objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .filter(|((_, k), _)| marker.map_or(true, |m| k.as_str() > m));

        for ((_, key), object) in matching {
            let rest = &key[prefix.len()..];
            let common = delimiter
                .and_then(|d| rest.find(d).map(|p| p + d.len()))
                .map(|pos| format!("{}{}", prefix, &rest[..pos]));

            // keys rolled up into an already emitted prefix never start a new page
            if common.as_ref().is_some_and(|c| seen_prefixes.contains(c)) {
                page.next_marker = Some(key.clone());
                continue;
            }

            if count == self.page_size {
                page.is_truncated = true;
                break;
            }

            if let Some(common) = common {
                seen_prefixes.insert(common.clone());
                page.prefixes.push(common);
                page.next_marker = Some(key.clone());
                count += 1;
                continue;
            }

            page.objects.push(ObjectSummary {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: Some(object.last_modified),
                storage_class: Some(STORAGE_CLASS_STANDARD.to_string()),
            });
            page.next_marker = Some(key.clone());
            count += 1;
        }

        if !page.is_truncated {
            page.next_marker = None;
        }

        Ok(page)
    }

    fn fs_get_object_acl(&self, bucket: &str, key: &str) -> Result<String, FSError> {
        self.enter("get_object_acl", key)?;

        self.get(bucket, key).map(|object| object.acl)
    }

    fn fs_put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<(), FSError> {
        if self.enter("put_object_acl", key)? {
            return Ok(());
        }

        let mut objects = lock(&self.objects);
        let object = objects
            .get_mut(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| FSError::NotFound(key.to_string()))?;
        object.acl = acl.to_string();

        Ok(())
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        headers: &Headers,
    ) -> Result<(), FSError> {
        if self.enter("create_object_dir", key)? {
            return Ok(());
        }

        let key = format!("{}/", key.trim_end_matches('/'));
        self.insert(bucket, &key, Vec::new(), headers);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    const BUCKET: &str = "dummy-bucket";

    fn seeded(page_size: usize, keys: &[&str]) -> MockClient {
        let client = MockClient::with_page_size(page_size);
        for key in keys {
            client
                .fs_put_object(BUCKET, key, key.as_bytes().to_vec(), &Headers::new())
                .unwrap();
        }
        client
    }

    fn list_all(
        client: &MockClient,
        prefix: &str,
        delimiter: Option<&str>,
    ) -> (Vec<String>, Vec<String>, usize) {
        let mut keys = Vec::new();
        let mut prefixes = Vec::new();
        let mut pages = 0;
        let mut marker: Option<String> = None;

        loop {
            let page = client
                .fs_list_objects(BUCKET, prefix, delimiter, marker.as_deref())
                .unwrap();
            pages += 1;
            keys.extend(page.objects.into_iter().map(|o| o.key));
            prefixes.extend(page.prefixes);

            marker = page.next_marker;
            if !page.is_truncated || marker.is_none() {
                break;
            }
        }

        (keys, prefixes, pages)
    }

    #[test]
    fn test_put_get() {
        let client = seeded(10, &["a/b.txt"]);

        let mut body = client.fs_get_object(BUCKET, "a/b.txt").unwrap();
        let mut contents = String::new();
        body.body.read_to_string(&mut contents).unwrap();

        assert_eq!(contents, "a/b.txt");
        assert_eq!(body.meta.content_length, 7);
        assert!(client.fs_get_object(BUCKET, "missing").unwrap_err().is_not_found());
        assert!(client.fs_get_object("other-bucket", "a/b.txt").is_err());
    }

    #[test]
    fn test_list_pagination() {
        let client = seeded(2, &["d/1", "d/2", "d/3", "d/4", "d/5", "e/1"]);

        let (keys, prefixes, pages) = list_all(&client, "d/", None);

        assert_eq!(keys, vec!["d/1", "d/2", "d/3", "d/4", "d/5"]);
        assert!(prefixes.is_empty());
        assert_eq!(pages, 3);
    }

    #[test]
    fn test_list_delimiter() {
        let client = seeded(2, &["a/x", "a/y/1", "a/y/2", "a/z/1", "b"]);

        let (keys, prefixes, _) = list_all(&client, "a/", Some("/"));

        assert_eq!(keys, vec!["a/x"]);
        assert_eq!(prefixes, vec!["a/y/", "a/z/"]);
    }

    #[test]
    fn test_fail_and_ignore() {
        let client = seeded(10, &["k"]);

        client.fail("delete_object");
        assert!(client.fs_delete_object(BUCKET, "k").is_err());

        client.recover("delete_object");
        client.ignore("delete_object");
        assert!(client.fs_delete_object(BUCKET, "k").is_ok());
        assert!(client.fs_object_exists(BUCKET, "k").unwrap());

        assert_eq!(client.calls("delete_object"), 2);
        assert_eq!(client.calls("delete_objects"), 0);
    }

    #[test]
    fn test_put_records_headers() {
        let client = MockClient::new();
        let mut headers = Headers::new();
        headers.insert(HEADER_CONTENT_TYPE.to_string(), "text/plain".to_string());
        headers.insert("Cache-Control".to_string(), "no-cache".to_string());

        client.fs_put_object(BUCKET, "k", b"v1".to_vec(), &headers).unwrap();
        assert_eq!(client.headers(BUCKET, "k"), Some(headers));

        client.fs_put_object(BUCKET, "k", b"v2".to_vec(), &Headers::new()).unwrap();
        assert_eq!(client.headers(BUCKET, "k"), Some(Headers::new()));
        assert_eq!(client.headers(BUCKET, "missing"), None);
    }

    #[test]
    fn test_acl() {
        let client = seeded(10, &["k"]);

        assert_eq!(client.fs_get_object_acl(BUCKET, "k").unwrap(), ACL_DEFAULT);
        client.fs_put_object_acl(BUCKET, "k", "public-read").unwrap();
        assert_eq!(client.fs_get_object_acl(BUCKET, "k").unwrap(), "public-read");
        assert!(client.fs_put_object_acl(BUCKET, "missing", "private").is_err());
    }
}
