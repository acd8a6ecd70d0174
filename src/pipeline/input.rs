//! Input resolution: turn a user-supplied path or URL into a [`FileHandle`].
//!
//! The OCR capability takes the whole document inline as a base64 data URL,
//! so unlike a renderer we never need a path on disk afterwards. The bytes
//! are read (or downloaded) once and carried in memory for the rest of the
//! submission.
//!
//! The declared media type drives the file processor's dispatch. We sniff
//! magic bytes first and fall back to the extension, so a `scan.pdf` that is
//! really a PNG still goes down the image path.

use crate::error::AnkiForgeError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_PNG: &str = "image/png";
pub const MIME_JPEG: &str = "image/jpeg";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// An uploaded file: name, declared media type and content.
#[derive(Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Build a handle whose media type is detected from content and name.
    pub fn detect(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let media_type = sniff_media_type(&name, &bytes).to_string();
        Self {
            name,
            media_type,
            bytes,
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Detect the media type from magic bytes, then from the file extension.
pub fn sniff_media_type(name: &str, bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return MIME_PDF;
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return MIME_PNG;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return MIME_JPEG;
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => MIME_PDF,
        Some("png") => MIME_PNG,
        Some("jpg") | Some("jpeg") => MIME_JPEG,
        Some("txt") | Some("md") => "text/plain",
        _ => MIME_OCTET_STREAM,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL to an in-memory [`FileHandle`].
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<FileHandle, AnkiForgeError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<FileHandle, AnkiForgeError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AnkiForgeError::PermissionDenied { path });
        }
        Err(_) => return Err(AnkiForgeError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());
    let file = FileHandle::detect(name, bytes);
    debug!("Resolved local file: {} ({})", path.display(), file.media_type);
    Ok(file)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<FileHandle, AnkiForgeError> {
    info!("Downloading file from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnkiForgeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnkiForgeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnkiForgeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnkiForgeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnkiForgeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    let name = extract_filename(url);
    let mut file = FileHandle::detect(name, bytes);
    // Trust the server only when sniffing found nothing better.
    if file.media_type == MIME_OCTET_STREAM {
        if let Some(declared) = declared {
            file.media_type = declared;
        }
    }

    info!("Downloaded {} bytes ({})", file.size(), file.media_type);
    Ok(file)
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "download".to_string()
}
