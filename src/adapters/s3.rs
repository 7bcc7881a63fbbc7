use std::io::{self, Read};

use aws_sdk_s3::{
    operation::put_object::builders::PutObjectFluentBuilder,
    primitives::{ByteStream, DateTime, DateTimeFormat},
    types::{Delete, ObjectCannedAcl, ObjectIdentifier, Permission, ServerSideEncryption},
};
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    adapters::{ListPage, ObjectBody, ObjectClient, ObjectMeta, ObjectSummary},
    model::{
        fs::{FSError, ACL_PRIVATE, ACL_PUBLIC_READ},
        options::{Headers, HEADER_ACL, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE},
    },
    util,
};

const ALL_USERS_GROUP: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const DELETE_BATCH_LIMIT: usize = 1000;

// unreserved characters plus the key separator stay literal in x-amz-copy-source
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

fn to_offset_date_time(dt: &DateTime) -> Option<OffsetDateTime> {
    let nanos = dt.secs() as i128 * 1_000_000_000 + dt.subsec_nanos() as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
}

/// Blocking reader over a response body. Chunks are pulled off the
/// connection only as the caller reads.
struct BodyReader {
    stream: ByteStream,
    chunk: Bytes,
}

impl BodyReader {
    fn new(stream: ByteStream) -> Self {
        Self {
            stream,
            chunk: Bytes::new(),
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.chunk.is_empty() {
            match util::poll::poll_until_ready(self.stream.try_next()) {
                Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err)),
                Ok(None) => return Ok(0),
                Ok(Some(chunk)) => self.chunk = chunk,
            }
        }

        let n = buf.len().min(self.chunk.len());
        buf[..n].copy_from_slice(&self.chunk.split_to(n));
        Ok(n)
    }
}

fn apply_headers(mut req: PutObjectFluentBuilder, headers: &Headers) -> PutObjectFluentBuilder {
    for (name, value) in headers {
        req = match name.as_str() {
            HEADER_CONTENT_LENGTH => match value.parse::<i64>() {
                Ok(len) => req.content_length(len),
                Err(err) => {
                    warn!(header = %name, value = %value, error_message = %err, "skipping header");
                    req
                }
            },
            HEADER_CONTENT_TYPE => req.content_type(value),
            HEADER_ACL => req.acl(ObjectCannedAcl::from(value.as_str())),
            "Cache-Control" => req.cache_control(value),
            "Content-Disposition" => req.content_disposition(value),
            "Content-Encoding" => req.content_encoding(value),
            "response-content-language" => req.content_language(value),
            "x-oss-server-side-encryption" => {
                req.server_side_encryption(ServerSideEncryption::from(value.as_str()))
            }
            "Expires" => match DateTime::from_str(value, DateTimeFormat::HttpDate) {
                Ok(expires) => req.expires(expires),
                Err(err) => {
                    warn!(header = %name, value = %value, error_message = %err, "skipping header");
                    req
                }
            },
            _ => {
                debug!(header = %name, value = %value, "header not applicable to put_object");
                req
            }
        };
    }

    req
}

impl ObjectClient for aws_sdk_s3::Client {
    fn fs_put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        headers: &Headers,
    ) -> Result<(), FSError> {
        let req = self
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));
        let req = apply_headers(req, headers);

        util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("put_object", key, err))?;

        Ok(())
    }

    fn fs_get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FSError> {
        let req = self.get_object().bucket(bucket).key(key);

        let o = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_no_such_key() {
                        return Err(FSError::NotFound(key.to_string()));
                    }
                }

                return Err(FSError::backend("get_object", key, err));
            }
            Ok(o) => o,
        };

        let meta = ObjectMeta {
            content_length: o.content_length().unwrap_or(0).max(0) as u64,
            content_type: o.content_type().map(str::to_string),
            last_modified: o.last_modified().and_then(to_offset_date_time),
            storage_class: o.storage_class().map(|s| s.as_str().to_string()),
        };

        // the body stream is owned and outlives the rest of the response
        Ok(ObjectBody {
            meta,
            body: Box::new(BodyReader::new(o.body)),
        })
    }

    fn fs_head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta, FSError> {
        let req = self.head_object().bucket(bucket).key(key);

        let ho = match util::poll::poll_until_ready(req.send()) {
            Err(err) => {
                if let Some(svc_err) = err.as_service_error() {
                    if svc_err.is_not_found() {
                        return Err(FSError::NotFound(key.to_string()));
                    }
                }

                return Err(FSError::backend("head_object", key, err));
            }
            Ok(ho) => ho,
        };

        Ok(ObjectMeta {
            content_length: ho.content_length().unwrap_or(0).max(0) as u64,
            content_type: ho.content_type().map(str::to_string),
            last_modified: ho.last_modified().and_then(to_offset_date_time),
            storage_class: ho.storage_class().map(|s| s.as_str().to_string()),
        })
    }

    fn fs_object_exists(&self, bucket: &str, key: &str) -> Result<bool, FSError> {
        match self.fs_head_object(bucket, key) {
            Ok(_) => Ok(true),
            Err(FSError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn fs_delete_object(&self, bucket: &str, key: &str) -> Result<(), FSError> {
        let req = self.delete_object().bucket(bucket).key(key);

        util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("delete_object", key, err))?;

        Ok(())
    }

    fn fs_delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), FSError> {
        for chunk in keys.chunks(DELETE_BATCH_LIMIT) {
            let first = chunk.first().map(String::as_str).unwrap_or("");

            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| FSError::backend("delete_objects", first, err))?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|err| FSError::backend("delete_objects", first, err))?;

            let req = self.delete_objects().bucket(bucket).delete(delete);

            let out = util::poll::poll_until_ready(req.send())
                .map_err(|err| FSError::backend("delete_objects", first, err))?;

            if let Some(failed) = out.errors().first() {
                return Err(FSError::backend(
                    "delete_objects",
                    failed.key().unwrap_or(first),
                    failed.message().unwrap_or("partial failure"),
                ));
            }
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
        let source = format!(
            "{}/{}",
            src_bucket,
            utf8_percent_encode(src_key, COPY_SOURCE)
        );
        let req = self
            .copy_object()
            .copy_source(source)
            .bucket(dst_bucket)
            .key(dst_key);

        util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("copy_object", src_key, err))?;

        Ok(())
    }

    fn fs_list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: Option<&str>,
        marker: Option<&str>,
    ) -> Result<ListPage, FSError> {
        let mut req = self.list_objects_v2().bucket(bucket).prefix(prefix);

        if let Some(delimiter) = delimiter {
            req = req.delimiter(delimiter);
        }

        if let Some(tok) = marker {
            req = req.continuation_token(tok);
        }

        let lo = util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("list_objects", prefix, err))?;

        let objects = lo
            .contents()
            .iter()
            .map(|o| ObjectSummary {
                key: o.key().unwrap_or("").to_string(),
                size: o.size().unwrap_or(0).max(0) as u64,
                last_modified: o.last_modified().and_then(to_offset_date_time),
                storage_class: o.storage_class().map(|s| s.as_str().to_string()),
            })
            .collect();

        let prefixes = lo
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        Ok(ListPage {
            objects,
            prefixes,
            next_marker: lo.next_continuation_token().map(str::to_string),
            is_truncated: lo.is_truncated().unwrap_or(false),
        })
    }

    fn fs_get_object_acl(&self, bucket: &str, key: &str) -> Result<String, FSError> {
        let req = self.get_object_acl().bucket(bucket).key(key);

        let acl = util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("get_object_acl", key, err))?;

        let public = acl.grants().iter().any(|grant| {
            let all_users = grant
                .grantee()
                .and_then(|grantee| grantee.uri())
                .is_some_and(|uri| uri == ALL_USERS_GROUP);
            let readable = matches!(
                grant.permission(),
                Some(Permission::Read) | Some(Permission::FullControl)
            );
            all_users && readable
        });

        Ok(if public { ACL_PUBLIC_READ } else { ACL_PRIVATE }.to_string())
    }

    fn fs_put_object_acl(&self, bucket: &str, key: &str, acl: &str) -> Result<(), FSError> {
        let req = self
            .put_object_acl()
            .bucket(bucket)
            .key(key)
            .acl(ObjectCannedAcl::from(acl));

        util::poll::poll_until_ready(req.send())
            .map_err(|err| FSError::backend("put_object_acl", key, err))?;

        Ok(())
    }

    fn fs_create_object_dir(
        &self,
        bucket: &str,
        key: &str,
        headers: &Headers,
    ) -> Result<(), FSError> {
        let key = format!("{}/", key.trim_end_matches('/'));

        self.fs_put_object(bucket, &key, Vec::new(), headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::options::HEADER_MULTIPART;

    fn client() -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    fn headers(items: &[(&str, &str)]) -> Headers {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_body_reader() {
        let mut reader = BodyReader::new(ByteStream::from(b"hello world".to_vec()));

        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"hell");

        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "o world");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_body_reader_across_chunks() {
        let mut reader = BodyReader {
            stream: ByteStream::from(b" world".to_vec()),
            chunk: Bytes::from_static(b"hello"),
        };

        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"hello world");
    }

    #[test]
    fn test_apply_headers() {
        let req = apply_headers(
            client().put_object(),
            &headers(&[
                (HEADER_CONTENT_LENGTH, "5"),
                (HEADER_CONTENT_TYPE, "text/plain"),
                (HEADER_ACL, "public-read"),
                (HEADER_MULTIPART, "128"),
                ("Cache-Control", "no-cache"),
                ("Content-Disposition", "inline"),
                ("Content-Encoding", "gzip"),
                ("response-content-language", "en"),
                ("x-oss-server-side-encryption", "AES256"),
                ("Expires", "Wed, 21 Oct 2015 07:28:00 GMT"),
            ]),
        );
        let input = req.as_input();

        assert_eq!(input.get_content_length(), &Some(5));
        assert_eq!(input.get_content_type().as_deref(), Some("text/plain"));
        assert_eq!(input.get_acl(), &Some(ObjectCannedAcl::PublicRead));
        assert_eq!(input.get_cache_control().as_deref(), Some("no-cache"));
        assert_eq!(input.get_content_disposition().as_deref(), Some("inline"));
        assert_eq!(input.get_content_encoding().as_deref(), Some("gzip"));
        assert_eq!(input.get_content_language().as_deref(), Some("en"));
        assert_eq!(input.get_server_side_encryption(), &Some(ServerSideEncryption::Aes256));
        assert_eq!(input.get_expires().as_ref().map(|e| e.secs()), Some(1_445_412_480));
    }

    #[test]
    fn test_apply_headers_skips_invalid_values() {
        let req = apply_headers(
            client().put_object(),
            &headers(&[(HEADER_CONTENT_LENGTH, "five"), ("Expires", "tomorrow")]),
        );
        let input = req.as_input();

        assert_eq!(input.get_content_length(), &None);
        assert_eq!(input.get_expires(), &None);
    }

    #[test]
    fn test_to_offset_date_time() {
        let dt = DateTime::from_secs_and_nanos(1_700_000_000, 500);
        let converted = to_offset_date_time(&dt).unwrap();

        assert_eq!(converted.unix_timestamp(), 1_700_000_000);
        assert_eq!(converted.nanosecond(), 500);
    }

    #[test]
    fn test_copy_source_encoding() {
        let cases = vec![
            ("a/b.txt", "a/b.txt"),
            ("dir with space/f", "dir%20with%20space/f"),
            ("a+b/c?d", "a%2Bb/c%3Fd"),
        ];

        for (input, expected) in cases {
            let result = utf8_percent_encode(input, COPY_SOURCE).to_string();
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }
}
