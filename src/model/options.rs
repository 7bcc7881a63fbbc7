use std::collections::BTreeMap;

use crate::model::fs::Visibility;

pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_ACL: &str = "x-oss-object-acl";
pub const HEADER_MULTIPART: &str = "Multipart";

pub const DEFAULT_MULTIPART_MB: &str = "128";

pub const OPTION_VISIBILITY: &str = "visibility";
pub const OPTION_MIMETYPE: &str = "mimetype";
pub const OPTION_ACL: &str = "ACL";

/// Recognized per-call options and the backend header each one becomes.
pub const META_OPTIONS: [(&str, &str); 9] = [
    ("CacheControl", "Cache-Control"),
    ("Expires", "Expires"),
    ("ServerSideEncryption", "x-oss-server-side-encryption"),
    ("Metadata", "x-oss-metadata-directive"),
    (OPTION_ACL, HEADER_ACL),
    ("ContentType", HEADER_CONTENT_TYPE),
    ("ContentDisposition", "Content-Disposition"),
    ("ContentLanguage", "response-content-language"),
    ("ContentEncoding", "Content-Encoding"),
];

/// Backend transport headers, ordered for stable logging.
pub type Headers = BTreeMap<String, String>;

pub fn default_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert(HEADER_MULTIPART.to_string(), DEFAULT_MULTIPART_MB.to_string());
    headers
}

/// Per-call option set handed in by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    settings: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn with_visibility(self, visibility: Visibility) -> Self {
        self.with(OPTION_VISIBILITY, visibility.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.settings.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.settings.insert(key.to_string(), value.into());
    }
}

/// Maps a caller option set onto backend headers.
///
/// `visibility` overrides an explicit `ACL`, and `mimetype` overrides an
/// explicit `ContentType`. An unparseable visibility is ignored.
pub fn options_from_config(config: &Config) -> Headers {
    let mut headers = Headers::new();

    for (option, header) in META_OPTIONS {
        if let Some(value) = config.get(option) {
            headers.insert(header.to_string(), value.to_string());
        }
    }

    if let Some(visibility) = config
        .get(OPTION_VISIBILITY)
        .and_then(|v| v.parse::<Visibility>().ok())
    {
        headers.insert(HEADER_ACL.to_string(), visibility.to_acl().to_string());
    }

    if let Some(mimetype) = config.get(OPTION_MIMETYPE).filter(|m| !m.is_empty()) {
        headers.insert(HEADER_CONTENT_TYPE.to_string(), mimetype.to_string());
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = Config::new()
            .with("CacheControl", "max-age=60")
            .with("ContentLanguage", "en")
            .with("Unknown", "ignored");

        let headers = options_from_config(&config);

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Cache-Control").map(String::as_str), Some("max-age=60"));
        assert_eq!(
            headers.get("response-content-language").map(String::as_str),
            Some("en")
        );
    }

    #[test]
    fn test_options_visibility_and_mimetype() {
        let cases = vec![
            (Config::new().with_visibility(Visibility::Public), Some("public-read")),
            (Config::new().with_visibility(Visibility::Private), Some("private")),
            (
                Config::new().with("ACL", "public-read").with("visibility", "private"),
                Some("private"),
            ),
            (Config::new().with("ACL", "default"), Some("default")),
            (Config::new().with("visibility", "bogus"), None),
        ];

        for (config, expected) in cases {
            let headers = options_from_config(&config);
            assert_eq!(
                headers.get(HEADER_ACL).map(String::as_str),
                expected,
                "failed for case: {:?}",
                config
            );
        }

        let headers = options_from_config(
            &Config::new()
                .with("ContentType", "text/html")
                .with("mimetype", "image/png"),
        );
        assert_eq!(headers.get(HEADER_CONTENT_TYPE).map(String::as_str), Some("image/png"));
    }

    #[test]
    fn test_default_headers() {
        let headers = default_headers();
        assert_eq!(headers.get(HEADER_MULTIPART).map(String::as_str), Some("128"));
    }
}
