//! Host correction for recorded stream URLs.
//!
//! Songs keep the URL they were uploaded with, so a catalog exported from one
//! deployment can point at a host that no longer serves audio.  Rewriting the
//! host on the way out is a plain string substitution: no I/O, no retries.

use crate::config::BackendConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamUrlRewriter {
    stale_hosts: Vec<String>,
    backend_host: String,
}

impl StreamUrlRewriter {
    pub fn new(stale_hosts: Vec<String>, backend_host: impl Into<String>) -> Self {
        Self {
            stale_hosts: stale_hosts.into_iter().filter(|h| !h.is_empty()).collect(),
            backend_host: backend_host.into(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.stale_hosts.clone(), host_of(&config.base_url))
    }

    pub fn backend_host(&self) -> &str {
        &self.backend_host
    }

    /// Replace the first stale host found in `url` with the backend host.
    /// Empty input and URLs without a stale host come back unchanged.
    pub fn rewrite(&self, url: &str) -> String {
        if url.is_empty() || self.backend_host.is_empty() {
            return url.to_string();
        }
        for stale in &self.stale_hosts {
            if stale == &self.backend_host {
                continue;
            }
            if url.contains(stale.as_str()) {
                return url.replacen(stale.as_str(), &self.backend_host, 1);
            }
        }
        url.to_string()
    }

    pub fn rewrite_opt(&self, url: Option<&str>) -> Option<String> {
        url.map(|u| self.rewrite(u))
    }
}

/// `host[:port]` of a base URL; falls back to stripping the scheme when the
/// string does not parse.
pub fn host_of(base_url: &str) -> String {
    match reqwest::Url::parse(base_url) {
        Ok(url) => match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        },
        Err(_) => base_url
            .split("://")
            .last()
            .unwrap_or(base_url)
            .trim_end_matches('/')
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> StreamUrlRewriter {
        StreamUrlRewriter::new(
            vec!["backend-jfn4.onrender.com".into()],
            host_of("http://192.168.101.136:8081"),
        )
    }

    #[test]
    fn test_stale_host_replaced() {
        let out = rewriter().rewrite("https://backend-jfn4.onrender.com/api/stream/42.mp3");
        assert_eq!(out, "https://192.168.101.136:8081/api/stream/42.mp3");
    }

    #[test]
    fn test_passthrough_without_stale_host() {
        let url = "https://cdn.example.org/a.mp3";
        assert_eq!(rewriter().rewrite(url), url);
    }

    #[test]
    fn test_empty_and_none_passthrough() {
        assert_eq!(rewriter().rewrite(""), "");
        assert_eq!(rewriter().rewrite_opt(None), None);
    }

    #[test]
    fn test_same_host_is_noop() {
        let r = StreamUrlRewriter::new(vec!["a.example".into()], "a.example");
        assert_eq!(r.rewrite("https://a.example/x"), "https://a.example/x");
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://backend-jfn4.onrender.com"), "backend-jfn4.onrender.com");
        assert_eq!(host_of("http://127.0.0.1:8081/"), "127.0.0.1:8081");
    }
}
