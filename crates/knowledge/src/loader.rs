//! Document loading and text extraction.
//!
//! A [`Loader`] turns a source kind and origin into raw text. The knowledge
//! base only sees this trait; [`DefaultLoader`] handles literal text, web
//! pages and files on disk.

use crate::office::{extract_office_text, OfficeKind};
use crate::types::SourceKind;
use async_trait::async_trait;
use docbase_core::{AppError, AppResult};
use std::path::Path;
use std::time::Duration;

/// HTTP timeout for URL sources.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a source into text.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Whether `load` can extract text for this source.
    fn is_parseable(&self, kind: SourceKind, origin: &str) -> bool;

    /// Extract the text of a source.
    ///
    /// Fails with `UnsupportedSource` or `LoadFailed`; never returns a
    /// partial document.
    async fn load(&self, kind: SourceKind, origin: &str) -> AppResult<String>;
}

/// File format classification by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Text,
    Json,
    Pdf,
    Office(OfficeKind),
    Unsupported,
}

impl FileFormat {
    /// Detect file format from extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("json") => Self::Json,
            Some("pdf") => Self::Pdf,
            Some("txt") | Some("md") | Some("markdown") | Some("csv") | Some("tsv")
            | Some("html") | Some("htm") | Some("xml") | Some("rst") | Some("log")
            | Some("js") | Some("mjs") | Some("ts") | Some("tsx") | Some("jsx")
            | Some("rs") | Some("py") | Some("go") | Some("c") | Some("h") | Some("cpp")
            | Some("java") | Some("sh") | Some("yaml") | Some("yml") | Some("toml")
            | Some("css") | Some("sql") => Self::Text,
            Some(other) => OfficeKind::from_extension(other)
                .map(Self::Office)
                .unwrap_or(Self::Unsupported),
            None => Self::Unsupported,
        }
    }
}

/// Default loader for text, URL and file sources.
pub struct DefaultLoader {
    client: reqwest::Client,
}

impl DefaultLoader {
    /// Create a loader with the default fetch timeout.
    pub fn new() -> AppResult<Self> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Create a loader with a custom fetch timeout.
    pub fn with_timeout(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn fetch_url(&self, url: &str) -> AppResult<String> {
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::LoadFailed(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LoadFailed(format!(
                "{}: HTTP status {}",
                url, status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::LoadFailed(format!("{}: {}", url, e)))
    }

    async fn read_file(&self, origin: &str) -> AppResult<String> {
        let path = Path::new(origin);

        match FileFormat::from_path(path) {
            FileFormat::Text | FileFormat::Json => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AppError::LoadFailed(format!("{}: {}", origin, e))),
            FileFormat::Pdf => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| AppError::LoadFailed(format!("{}: {}", origin, e)))?;

                let text = tokio::task::spawn_blocking(move || extract_pdf_text(&bytes))
                    .await
                    .map_err(|e| AppError::LoadFailed(format!("PDF extraction task: {}", e)))?
                    .map_err(|e| AppError::LoadFailed(format!("{}: {}", origin, e)))?;

                if text.trim().is_empty() {
                    tracing::warn!("No text extracted from PDF {}", origin);
                }
                Ok(text)
            }
            FileFormat::Office(kind) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| AppError::LoadFailed(format!("{}: {}", origin, e)))?;

                tokio::task::spawn_blocking(move || extract_office_text(kind, &bytes))
                    .await
                    .map_err(|e| AppError::LoadFailed(format!("Office extraction task: {}", e)))?
                    .map_err(|e| AppError::LoadFailed(format!("{}: {}", origin, e)))
            }
            FileFormat::Unsupported => Err(AppError::UnsupportedSource(origin.to_string())),
        }
    }
}

#[async_trait]
impl Loader for DefaultLoader {
    fn is_parseable(&self, kind: SourceKind, origin: &str) -> bool {
        match kind {
            SourceKind::Text | SourceKind::Url => true,
            SourceKind::File => FileFormat::from_path(Path::new(origin)) != FileFormat::Unsupported,
            SourceKind::Folder => false,
        }
    }

    async fn load(&self, kind: SourceKind, origin: &str) -> AppResult<String> {
        match kind {
            SourceKind::Text => Ok(origin.to_string()),
            SourceKind::Url => self.fetch_url(origin).await,
            SourceKind::File => self.read_file(origin).await,
            SourceKind::Folder => Err(AppError::UnsupportedSource(format!(
                "folder {} is not a document",
                origin
            ))),
        }
    }
}

/// Extract text from PDF bytes using pdf-extract.
fn extract_pdf_text(bytes: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())
}

/// Extract the trimmed `<title>` of an HTML page, if any.
pub fn extract_title(html: &str) -> Option<String> {
    let re = regex::Regex::new(r"(?i)<title>(.*?)</title>").ok()?;
    let title = re.captures(html)?.get(1)?.as_str().trim();

    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path(Path::new("a.md")), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("a.JS")), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("a.json")), FileFormat::Json);
        assert_eq!(FileFormat::from_path(Path::new("a.pdf")), FileFormat::Pdf);
        assert_eq!(
            FileFormat::from_path(Path::new("a.DOCX")),
            FileFormat::Office(OfficeKind::Word)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("a.xlsx")),
            FileFormat::Office(OfficeKind::Sheet)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("a.epub")),
            FileFormat::Unsupported
        );
        assert_eq!(
            FileFormat::from_path(Path::new("noext")),
            FileFormat::Unsupported
        );
    }

    #[test]
    fn test_is_parseable() {
        let loader = DefaultLoader::new().unwrap();
        assert!(loader.is_parseable(SourceKind::Text, "anything"));
        assert!(loader.is_parseable(SourceKind::Url, "https://example.com"));
        assert!(loader.is_parseable(SourceKind::File, "/docs/readme.md"));
        assert!(loader.is_parseable(SourceKind::File, "/docs/slides.pptx"));
        assert!(!loader.is_parseable(SourceKind::File, "/docs/book.epub"));
        assert!(!loader.is_parseable(SourceKind::Folder, "/docs"));
    }

    #[tokio::test]
    async fn test_load_text_passthrough() {
        let loader = DefaultLoader::new().unwrap();
        let text = loader.load(SourceKind::Text, "hello world").await.unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_load_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, "some notes").unwrap();

        let loader = DefaultLoader::new().unwrap();
        let text = loader
            .load(SourceKind::File, path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(text, "some notes");
    }

    #[tokio::test]
    async fn test_load_docx_file() {
        use std::io::Write;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("report.docx");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer
            .write_all(b"<w:document><w:body><w:p><w:r><w:t>Quarterly report</w:t></w:r></w:p></w:body></w:document>")
            .unwrap();
        writer.finish().unwrap();

        let loader = DefaultLoader::new().unwrap();
        let text = loader
            .load(SourceKind::File, path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(text, "Quarterly report");
    }

    #[tokio::test]
    async fn test_load_corrupt_office_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.xlsx");
        std::fs::write(&path, "plain text, not a zip").unwrap();

        let loader = DefaultLoader::new().unwrap();
        let err = loader
            .load(SourceKind::File, path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoadFailed(_)));
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let loader = DefaultLoader::new().unwrap();
        let err = loader
            .load(SourceKind::File, "/definitely/not/here.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LoadFailed(_)));
    }

    #[tokio::test]
    async fn test_load_unsupported_file() {
        let loader = DefaultLoader::new().unwrap();
        let err = loader
            .load(SourceKind::File, "/docs/book.epub")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedSource(_)));
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(
            extract_title("<html><head><TITLE>  Hello Page </TITLE></head></html>"),
            Some("Hello Page".to_string())
        );
        assert_eq!(extract_title("<title>   </title>"), None);
        assert_eq!(extract_title("no title here"), None);
    }
}
