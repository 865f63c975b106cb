//! Minimal GitHub REST client
//!
//! Only what the backup needs: single GETs and lazy pagination over
//! `Link: <...>; rel="next"` headers.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const ACCEPT_HEADER: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PER_PAGE: &str = "100";

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API returned {status} for {url}")]
    Http { status: u16, url: String, body: String },

    #[error("GitHub API request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid GitHub client configuration: {0}")]
    Setup(String),
}

impl GitHubError {
    /// HTTP status code, when the server answered with an error status
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Items<'a> = Box<dyn Iterator<Item = Result<Value, GitHubError>> + 'a>;

/// GitHub REST access used by the backup service
pub trait GitHubClient: Send + Sync {
    /// GET a single resource
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, GitHubError>;

    /// Lazily iterate every item of a paginated list
    fn iterate<'a>(&'a self, path: &str, params: &[(&str, &str)]) -> Items<'a>;

    /// Drain `iterate` into a vector, stopping at the first error
    fn list_all(&self, path: &str, params: &[(&str, &str)]) -> Result<Vec<Value>, GitHubError> {
        self.iterate(path, params).collect()
    }
}

/// Extract the `rel="next"` target from a `Link` header
pub fn parse_next_link(header: &str) -> Option<String> {
    header
        .split(',')
        .map(str::trim)
        .find(|part| part.contains("rel=\"next\""))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            (start < end).then(|| part[start..end].to_string())
        })
}

/// Items of one list page
///
/// Most list endpoints return a bare array; some (actions artifacts) wrap it
/// in an object next to a `total_count`.
pub fn page_items(page: Value) -> Vec<Value> {
    match page {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// HTTP implementation backed by `reqwest::blocking`
pub struct HttpGitHubClient {
    http: Client,
    base_url: String,
}

impl HttpGitHubClient {
    pub fn new(token: &str, base_url: &str) -> Result<Self, GitHubError> {
        if token.is_empty() {
            return Err(GitHubError::Setup("token must not be empty".to_string()));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GitHubError::Setup("token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HEADER));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("core-backup/", env!("CARGO_PKG_VERSION"))),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GitHubError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Fetch one page, returning its body and the next page URL
    fn fetch(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> Result<(Value, Option<String>), GitHubError> {
        debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .map_err(|source| GitHubError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        if status.is_client_error() || status.is_server_error() {
            let body = response.text().unwrap_or_default();
            debug!("GitHub API error {} for {}: {}", status, url, body);
            return Err(GitHubError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let value = response.json::<Value>().map_err(|source| GitHubError::Decode {
            url: url.to_string(),
            source,
        })?;

        Ok((value, next))
    }
}

fn owned_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl GitHubClient for HttpGitHubClient {
    fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, GitHubError> {
        self.fetch(&self.url(path), &owned_params(params))
            .map(|(value, _)| value)
    }

    fn iterate<'a>(&'a self, path: &str, params: &[(&str, &str)]) -> Items<'a> {
        let mut first_page = owned_params(params);
        if !first_page.iter().any(|(k, _)| k == "per_page") {
            first_page.push(("per_page".to_string(), PER_PAGE.to_string()));
        }

        Box::new(Pages {
            client: self,
            next_url: Some(self.url(path)),
            params: first_page,
            buffer: Vec::new().into_iter(),
        })
    }
}

/// Lazy page walker; the first request carries the query parameters, later
/// ones follow the `next` URL verbatim
struct Pages<'a> {
    client: &'a HttpGitHubClient,
    next_url: Option<String>,
    params: Vec<(String, String)>,
    buffer: std::vec::IntoIter<Value>,
}

impl Iterator for Pages<'_> {
    type Item = Result<Value, GitHubError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }

            let url = self.next_url.take()?;
            let params = std::mem::take(&mut self.params);
            match self.client.fetch(&url, &params) {
                Ok((page, next)) => {
                    self.next_url = next;
                    self.buffer = page_items(page).into_iter();
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// In-memory client for tests
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug)]
    enum Route {
        Json(Value),
        Status(u16),
    }

    /// Serves canned JSON per path and records every requested path
    #[derive(Clone, Default)]
    pub struct MockGitHubClient {
        routes: Arc<Mutex<HashMap<String, Route>>>,
        requests: Arc<Mutex<Vec<String>>>,
    }

    fn key(path: &str) -> String {
        path.trim_start_matches('/').to_string()
    }

    impl MockGitHubClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `body` for `path` (a list page for `iterate`, a resource for `get`)
        pub fn route(self, path: &str, body: Value) -> Self {
            self.routes.lock().unwrap().insert(key(path), Route::Json(body));
            self
        }

        /// Answer `path` with an HTTP error status
        pub fn fail(self, path: &str, status: u16) -> Self {
            self.routes.lock().unwrap().insert(key(path), Route::Status(status));
            self
        }

        /// Paths requested so far, in order
        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn lookup(&self, path: &str) -> Option<Route> {
            let path = key(path);
            self.requests.lock().unwrap().push(path.clone());
            self.routes.lock().unwrap().get(&path).cloned()
        }

        fn http_error(path: &str, status: u16) -> GitHubError {
            GitHubError::Http {
                status,
                url: format!("mock://{}", key(path)),
                body: String::new(),
            }
        }
    }

    impl GitHubClient for MockGitHubClient {
        fn get(&self, path: &str, _params: &[(&str, &str)]) -> Result<Value, GitHubError> {
            match self.lookup(path) {
                Some(Route::Json(body)) => Ok(body),
                Some(Route::Status(status)) => Err(Self::http_error(path, status)),
                None => Err(Self::http_error(path, 404)),
            }
        }

        fn iterate<'a>(&'a self, path: &str, _params: &[(&str, &str)]) -> Items<'a> {
            match self.lookup(path) {
                Some(Route::Json(body)) => Box::new(page_items(body).into_iter().map(Ok)),
                Some(Route::Status(status)) => {
                    Box::new(std::iter::once(Err(Self::http_error(path, status))))
                }
                None => Box::new(std::iter::empty()),
            }
        }
    }
}
