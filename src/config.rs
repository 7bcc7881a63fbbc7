use crate::model::options::{default_headers, Headers};

/// Construction-time settings for [`crate::fs::ObjectFS`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdapterConfig {
    pub bucket: String,
    /// Public endpoint host used for generated URLs, e.g. `oss-cn-hangzhou.aliyuncs.com`.
    pub endpoint: String,
    pub ssl: bool,
    pub is_cname: bool,
    pub cdn_domain: String,
    pub prefix: Option<String>,
    /// Adapter-wide default headers; always carries the multipart hint.
    pub options: Headers,
}

impl AdapterConfig {
    pub fn new(bucket: &str, endpoint: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            endpoint: endpoint.to_string(),
            ssl: false,
            is_cname: false,
            cdn_domain: String::new(),
            prefix: None,
            options: default_headers(),
        }
    }

    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn cname(mut self, cdn_domain: &str) -> Self {
        self.is_cname = true;
        self.cdn_domain = cdn_domain.to_string();
        self
    }

    pub fn prefix(mut self, prefix: Option<&str>) -> Self {
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// Merges `options` over the defaults; later values win.
    pub fn options(mut self, options: Headers) -> Self {
        self.options.extend(options);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::options::HEADER_MULTIPART;

    #[test]
    fn test_adapter_config() {
        let mut overrides = Headers::new();
        overrides.insert("Cache-Control".to_string(), "no-cache".to_string());

        let config = AdapterConfig::new("b", "oss.example.com")
            .ssl(true)
            .cname("cdn.example.com")
            .prefix(Some("root"))
            .options(overrides);

        assert!(config.ssl);
        assert!(config.is_cname);
        assert_eq!(config.cdn_domain, "cdn.example.com");
        assert_eq!(config.prefix.as_deref(), Some("root"));
        assert_eq!(config.options.get(HEADER_MULTIPART).map(String::as_str), Some("128"));
        assert_eq!(config.options.get("Cache-Control").map(String::as_str), Some("no-cache"));
    }
}
