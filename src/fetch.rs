//! Fetchers load the content named by `.include(...)`.
//!
//! The [`Fetcher`] trait keeps the expander independent of where bytes come
//! from: [`FsFetcher`] reads the real filesystem (and HTTP with the `http`
//! feature), [`MemoryFetcher`] serves in-memory content for tests and hosts
//! that bundle their configuration.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

pub type FetchResult<T> = Result<T, FetchError>;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    /// No file or resource at this location
    NotFound(String),

    /// Reading failed for another reason
    Io(String),

    /// HTTP response with an error status
    Status(u16),

    /// The location's scheme cannot be fetched
    Unsupported(String),

    /// Connection-level failure
    Network(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::NotFound(location) => write!(f, "not found: {}", location),
            FetchError::Io(msg) => write!(f, "read error: {}", msg),
            FetchError::Status(code) => write!(f, "HTTP status {}", code),
            FetchError::Unsupported(what) => write!(f, "unsupported: {}", what),
            FetchError::Network(msg) => write!(f, "network error: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

/// The result of an HTTP GET.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

pub trait Fetcher {
    /// Read a whole file.
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>>;

    /// Perform an HTTP GET. Error statuses are returned as responses.
    fn get(&self, url: &str) -> FetchResult<Response>;
}

/// Where an include points, by scheme.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    File(PathBuf),
    Http(String),
    Other(String),
}

impl Location {
    pub fn parse(location: &str) -> Location {
        if let Some(path) = location.strip_prefix("file://") {
            return Location::File(PathBuf::from(path));
        }
        match location.split_once("://") {
            Some(("http" | "https", _)) => Location::Http(location.to_string()),
            Some((scheme, _)) => Location::Other(scheme.to_string()),
            None => Location::File(PathBuf::from(location)),
        }
    }
}

/// Drops `.` components so `./a.fig` and `a.fig` name the same entry.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Filesystem fetcher. HTTP requires the `http` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>> {
        std::fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
            _ => FetchError::Io(format!("{}: {}", path.display(), e)),
        })
    }

    #[cfg(feature = "http")]
    fn get(&self, url: &str) -> FetchResult<Response> {
        use std::io::Read;

        let response = match ureq::get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(e) => return Err(FetchError::Network(e.to_string())),
        };
        let status = response.status();
        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Response { status, body })
    }

    #[cfg(not(feature = "http"))]
    fn get(&self, url: &str) -> FetchResult<Response> {
        Err(FetchError::Unsupported(format!(
            "{} (built without the `http` feature)",
            url
        )))
    }
}

/// In-memory files and URLs.
#[derive(Debug, Clone, Default)]
pub struct MemoryFetcher {
    files: HashMap<PathBuf, Vec<u8>>,
    urls: HashMap<String, Response>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files.insert(normalize(path.as_ref()), content.into());
    }

    pub fn add_url(&mut self, url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) {
        self.urls.insert(
            url.into(),
            Response {
                status,
                body: body.into(),
            },
        );
    }

    /// Builder form of [`MemoryFetcher::add_file`].
    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }
}

impl Fetcher for MemoryFetcher {
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>> {
        self.files
            .get(&normalize(path))
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.display().to_string()))
    }

    fn get(&self, url: &str) -> FetchResult<Response> {
        self.urls
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("no route to {}", url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_schemes() {
        assert_eq!(Location::parse("a/b.fig"), Location::File("a/b.fig".into()));
        assert_eq!(Location::parse("file:///etc/x.fig"), Location::File("/etc/x.fig".into()));
        assert_eq!(
            Location::parse("https://example.com/x.fig"),
            Location::Http("https://example.com/x.fig".into())
        );
        assert_eq!(Location::parse("ftp://host/x"), Location::Other("ftp".into()));
    }

    #[test]
    fn test_memory_fetcher_ignores_current_dir() {
        let fetcher = MemoryFetcher::new().with_file("conf/base.fig", "x = 1");
        assert_eq!(fetcher.read_file(Path::new("./conf/base.fig")).unwrap(), b"x = 1");
        assert!(matches!(
            fetcher.read_file(Path::new("other.fig")),
            Err(FetchError::NotFound(_))
        ));
    }
}
