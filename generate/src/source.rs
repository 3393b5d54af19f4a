//! Document fetchers behind source stages.
//!
//! A fetch returns `Ok(None)` when the document does not exist and
//! `Err(EvaluationError::Source { .. })` when it exists but cannot be read.
//! Both only drop the binding that asked for the document.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::trace;

use crate::error::EvaluationError;

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content: String,
    /// Media type such as `application/json`, if known.
    pub media_type: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(content: impl Into<String>, media_type: Option<&str>) -> Self {
        Self {
            content: content.into(),
            media_type: media_type.map(str::to_owned),
        }
    }
}

/// Fetches documents by locator.
pub trait SourceFetcher: Send + Sync {
    /// Fetch the document at `locator`. `accept` is the media type hint of
    /// the source stage, if any.
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<Document>, EvaluationError>>;
}

/// Reads documents from files below a root directory.
///
/// Accepts `file:` IRIs and relative paths. Paths escaping the root are
/// rejected.
#[derive(Debug, Clone)]
pub struct FileSourceFetcher {
    root: PathBuf,
}

impl FileSourceFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, locator: &str) -> Result<PathBuf, EvaluationError> {
        let raw = locator
            .strip_prefix("file://")
            .or_else(|| locator.strip_prefix("file:"))
            .unwrap_or(locator);
        let relative = Path::new(raw.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(EvaluationError::Source {
                locator: locator.to_owned(),
                message: "path leaves the source directory".to_owned(),
            });
        }
        Ok(self.root.join(relative))
    }
}

impl SourceFetcher for FileSourceFetcher {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<Document>, EvaluationError>> {
        async move {
            let path = self.resolve(locator)?;
            trace!(path = %path.display(), "reading source file");
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    let media_type = media_type_for(&path).or(accept);
                    Ok(Some(Document::new(content, media_type)))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(EvaluationError::Source {
                    locator: locator.to_owned(),
                    message: e.to_string(),
                }),
            }
        }
        .boxed()
    }
}

/// Guess a media type from a file extension.
fn media_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "json" => Some("application/json"),
        "xml" => Some("application/xml"),
        "csv" => Some("text/csv"),
        "txt" => Some("text/plain"),
        "html" | "htm" => Some("text/html"),
        "ttl" => Some("text/turtle"),
        "nt" => Some("application/n-triples"),
        _ => None,
    }
}

/// Serves documents from memory, optionally after a delay.
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceFetcher {
    documents: HashMap<String, Document>,
    delay: Option<Duration>,
}

impl InMemorySourceFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under a locator.
    #[must_use]
    pub fn with_document(mut self, locator: impl Into<String>, document: Document) -> Self {
        self.documents.insert(locator.into(), document);
        self
    }

    /// Wait this long before answering every fetch.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl SourceFetcher for InMemorySourceFetcher {
    fn fetch<'a>(
        &'a self,
        locator: &'a str,
        _accept: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Option<Document>, EvaluationError>> {
        async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.documents.get(locator).cloned())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_fetch_with_media_type() {
        let dir = tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("data.json"), "[1,2]").expect("write");
        let fetcher = FileSourceFetcher::new(dir.path());

        let document = fetcher
            .fetch("file:data.json", None)
            .await
            .expect("readable")
            .expect("present");
        assert_eq!(document.content, "[1,2]");
        assert_eq!(document.media_type.as_deref(), Some("application/json"));

        let plain = fetcher.fetch("data.json", None).await.expect("readable");
        assert_eq!(plain, Some(document));
    }

    #[tokio::test]
    async fn test_missing_file_is_absent() {
        let dir = tempdir().expect("create temp dir");
        let fetcher = FileSourceFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("nothing.txt", None).await, Ok(None));
    }

    #[tokio::test]
    async fn test_escaping_path_rejected() {
        let dir = tempdir().expect("create temp dir");
        let fetcher = FileSourceFetcher::new(dir.path());
        assert!(matches!(
            fetcher.fetch("../secret", None).await,
            Err(EvaluationError::Source { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_extension_uses_hint() {
        let dir = tempdir().expect("create temp dir");
        std::fs::write(dir.path().join("blob"), "x").expect("write");
        let fetcher = FileSourceFetcher::new(dir.path());
        let document = fetcher
            .fetch("blob", Some("text/plain"))
            .await
            .expect("readable")
            .expect("present");
        assert_eq!(document.media_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_memory_fetch() {
        let fetcher = InMemorySourceFetcher::new()
            .with_document("http://ex.org/doc", Document::new("hello", None))
            .with_delay(Duration::from_millis(20));
        let document = fetcher
            .fetch("http://ex.org/doc", None)
            .await
            .expect("ok");
        assert_eq!(document, Some(Document::new("hello", None)));
        assert_eq!(fetcher.fetch("http://ex.org/other", None).await, Ok(None));
    }
}
