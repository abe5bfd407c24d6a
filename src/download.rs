//! Downloader and materializer
//!
//! The winning candidate is streamed to a hidden temporary file next to its
//! final location, validated once the stream completes, and only then
//! renamed to its deterministic name. A failed download never leaves a file
//! at the final path.

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result};
use crate::http::HttpClient;
use crate::probe::{is_vague_content_type, sniff};
use crate::types::Candidate;
use crate::utils::{
    extension_from_content_type, extension_from_url, is_raster_content_type,
    normalize_content_type,
};
use reqwest::header;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

/// Bytes kept from the start of the body for format sniffing
const SNIFF_LEN: usize = 64;

/// A validated file at its final path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedFile {
    /// Final path
    pub path: PathBuf,
    /// File name inside the output directory
    pub file_name: String,
    /// Size on disk
    pub bytes: u64,
    /// Confirmed image content type
    pub content_type: String,
}

/// Streams candidates to disk and publishes them atomically
#[derive(Clone, Debug)]
pub struct Downloader {
    http: Arc<HttpClient>,
    config: DownloadConfig,
}

impl Downloader {
    /// Create a downloader sharing the engine's HTTP client
    pub fn new(http: Arc<HttpClient>, config: DownloadConfig) -> Self {
        Self { http, config }
    }

    /// Download `candidate` into `output_dir` as `{stem}.{ext}`
    ///
    /// # Errors
    /// - [`DownloadError::InvalidContentType`] when the body is not a raster image
    /// - [`DownloadError::Truncated`] when fewer bytes than the declared length arrived
    /// - [`DownloadError::TooSmall`] when the body is below the size floor
    /// - [`DownloadError::PublishFailed`] when the final rename fails
    /// - transport errors from the HTTP client
    pub async fn download(
        &self,
        candidate: &Candidate,
        output_dir: &Path,
        stem: &str,
    ) -> Result<MaterializedFile> {
        tokio::fs::create_dir_all(output_dir).await?;

        let guessed = extension_from_url(&candidate.url).unwrap_or("img");
        let temp_path = output_dir.join(format!(
            ".{}.{:08x}.{}.part",
            stem,
            rand::random::<u32>(),
            guessed
        ));

        let result = self
            .stream_and_publish(candidate, output_dir, stem, &temp_path)
            .await;
        if result.is_err() {
            match tokio::fs::remove_file(&temp_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %temp_path.display(),
                    error = %e,
                    "Failed to remove temporary download"
                ),
            }
        }
        result
    }

    async fn stream_and_publish(
        &self,
        candidate: &Candidate,
        output_dir: &Path,
        stem: &str,
        temp_path: &Path,
    ) -> Result<MaterializedFile> {
        let url = candidate.url.as_str();
        let mut response = self.http.get(url, candidate.referer.as_deref()).await?;
        let declared_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let declared_len = response.content_length();

        let mut file = tokio::fs::File::create(temp_path).await?;
        let mut head: Vec<u8> = Vec::with_capacity(SNIFF_LEN);
        let mut received: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::network(url, format!("download interrupted: {}", e)))?
        {
            if head.len() < SNIFF_LEN {
                let take = chunk.len().min(SNIFF_LEN - head.len());
                head.extend_from_slice(&chunk[..take]);
            }
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let content_type = confirmed_content_type(url, declared_type, &head)?;

        if let Some(expected) = declared_len
            && received < expected
        {
            return Err(DownloadError::Truncated {
                url: url.to_string(),
                received,
                expected,
            }
            .into());
        }
        if received < self.config.min_bytes {
            return Err(DownloadError::TooSmall {
                url: url.to_string(),
                bytes: received,
                min_bytes: self.config.min_bytes,
            }
            .into());
        }

        let extension = extension_from_url(url)
            .or_else(|| extension_from_content_type(&content_type))
            .unwrap_or("img");
        let file_name = format!("{}.{}", stem, extension);
        let final_path = output_dir.join(&file_name);

        tokio::fs::rename(temp_path, &final_path)
            .await
            .map_err(|e| DownloadError::PublishFailed {
                temp_path: temp_path.to_path_buf(),
                final_path: final_path.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            url = url,
            path = %final_path.display(),
            bytes = received,
            content_type = %content_type,
            "Cover materialized"
        );

        Ok(MaterializedFile {
            path: final_path,
            file_name,
            bytes: received,
            content_type,
        })
    }
}

/// Image content type of a finished download
///
/// A raster `image/*` header is trusted; a missing or octet-stream header is
/// accepted only if the leading bytes sniff as a known format.
fn confirmed_content_type(url: &str, declared: Option<String>, head: &[u8]) -> Result<String> {
    if let Some(ct) = &declared
        && is_raster_content_type(ct)
    {
        return Ok(normalize_content_type(ct));
    }
    let vague = declared.as_deref().is_none_or(is_vague_content_type);
    match sniff::detect_format(head) {
        Some(format) if vague => Ok(format.mime_type().to_string()),
        _ => Err(DownloadError::InvalidContentType {
            url: url.to_string(),
            content_type: declared,
        }
        .into()),
    }
}
