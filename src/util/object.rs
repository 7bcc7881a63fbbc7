use crate::model::fs::FSError;

pub const DIR_SEPARATOR: char = '/';

/// Splits `s3://bucket/some/prefix` into `("bucket", Some("some/prefix"))`.
/// `oss://` is accepted as an alias for S3-compatible OSS endpoints.
pub fn parse_bucket_uri(bucket_uri: &str) -> Result<(String, Option<String>), FSError> {
    let rest = bucket_uri
        .strip_prefix("s3://")
        .or_else(|| bucket_uri.strip_prefix("oss://"))
        .ok_or_else(|| FSError::InvalidUri(bucket_uri.to_string()))?;

    let (bucket, prefix) = match rest.split_once(DIR_SEPARATOR) {
        Some((bucket, prefix)) => (bucket, prefix.trim_matches(DIR_SEPARATOR)),
        None => (rest, ""),
    };

    if bucket.is_empty() {
        return Err(FSError::InvalidUri(bucket_uri.to_string()));
    }

    let prefix = if prefix.is_empty() {
        None
    } else {
        Some(prefix.to_string())
    };

    Ok((bucket.to_string(), prefix))
}

/// Parent of a logical path; the root is the empty string.
pub fn dirname(path: &str) -> String {
    let path = path.trim_end_matches(DIR_SEPARATOR);

    match path.rfind(DIR_SEPARATOR) {
        Some(pos) => path[..pos].trim_end_matches(DIR_SEPARATOR).to_string(),
        None => String::new(),
    }
}

/// Every ancestor directory of `path`, nearest first, root excluded.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut parents = Vec::new();
    let mut current = dirname(path);

    while !current.is_empty() {
        let next = dirname(&current);
        parents.push(current);
        current = next;
    }

    parents
}

const EXTENSION_MIMETYPES: [(&str, &str); 28] = [
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

const MAGIC_MIMETYPES: [(&[u8], &str); 6] = [
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF8", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
];

pub const MIMETYPE_FALLBACK: &str = "application/octet-stream";

/// Infers a content type from the path extension, then from leading
/// magic bytes, then from whether the content is valid UTF-8 text.
pub fn guess_mime_type(path: &str, contents: &[u8]) -> String {
    let name = path.rsplit(DIR_SEPARATOR).next().unwrap_or(path);
    if let Some((_, ext)) = name.rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        if let Some((_, mimetype)) = EXTENSION_MIMETYPES.iter().find(|(e, _)| *e == ext) {
            return mimetype.to_string();
        }
    }

    if let Some((_, mimetype)) = MAGIC_MIMETYPES
        .iter()
        .find(|(magic, _)| contents.starts_with(magic))
    {
        return mimetype.to_string();
    }

    if !contents.is_empty() && std::str::from_utf8(contents).is_ok() {
        return "text/plain".to_string();
    }

    MIMETYPE_FALLBACK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bucket_uri() {
        let cases = vec![
            ("s3://bucket", Some(("bucket", None))),
            ("oss://bucket/", Some(("bucket", None))),
            ("s3://bucket/root/sub/", Some(("bucket", Some("root/sub")))),
            ("gs://bucket", None),
            ("s3://", None),
            ("bucket", None),
        ];

        for (input, expected) in cases {
            let result = parse_bucket_uri(input).ok();
            let expected =
                expected.map(|(b, p): (&str, Option<&str>)| (b.to_string(), p.map(String::from)));
            assert_eq!(result, expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_dirname() {
        let cases = vec![
            ("folder/file", "folder"),
            ("folder/subfolder/file", "folder/subfolder"),
            ("folder/subfolder/", "folder"),
            ("file", ""),
            ("folder/", ""),
            ("", ""),
        ];

        for (input, expected) in cases {
            assert_eq!(dirname(input), expected, "failed for case: {}", input);
        }
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b/c.txt"), vec!["a/b".to_string(), "a".to_string()]);
        assert_eq!(ancestors("a.txt"), Vec::<String>::new());
    }

    #[test]
    fn test_guess_mime_type() {
        let cases: Vec<(&str, &[u8], &str)> = vec![
            ("a/b.TXT", b"", "text/plain"),
            ("image.png", b"", "image/png"),
            ("noext", b"\x89PNG\r\n\x1a\nrest", "image/png"),
            ("noext", b"%PDF-1.4", "application/pdf"),
            ("notes", b"hello", "text/plain"),
            ("blob.unknownext", b"\x00\xff\xfe", MIMETYPE_FALLBACK),
            ("empty", b"", MIMETYPE_FALLBACK),
        ];

        for (path, contents, expected) in cases {
            assert_eq!(guess_mime_type(path, contents), expected, "failed for case: {}", path);
        }
    }
}
