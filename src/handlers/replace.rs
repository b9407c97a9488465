// src/handlers/replace.rs

//! Puts an image back where one was deleted: a picture fetched from one of
//! the configured APIs or, failing that, a locally drawn placeholder.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dispatch::{Handler, HandlerError, HandlerFuture};
use crate::engine::ChangeRecord;
use crate::fs::FileSystem;
use crate::handlers::image::{encode, ImageQuality};
use crate::handlers::remote::{RemoteClient, RemoteError};
use crate::types::ChangeKind;
use crate::watch::hash::hash_bytes;
use crate::watch::path_utils::extension_lower;
use crate::watch::LedgerHandle;

pub const REPLACEABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg"];

pub const PLACEHOLDER_WIDTH: u32 = 600;
pub const PLACEHOLDER_HEIGHT: u32 = 400;
const BACKGROUND: Rgb<u8> = Rgb([240, 240, 240]);
const BAND: Rgb<u8> = Rgb([50, 50, 50]);

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Attempts per API URL.
    pub attempts: u32,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct ReplaceHandler {
    fs: Arc<dyn FileSystem>,
    ledger: LedgerHandle,
    remote: Arc<dyn RemoteClient>,
    api_urls: Vec<String>,
    fetch: FetchPolicy,
}

impl ReplaceHandler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        ledger: LedgerHandle,
        remote: Arc<dyn RemoteClient>,
        api_urls: Vec<String>,
        fetch: FetchPolicy,
    ) -> Self {
        Self {
            fs,
            ledger,
            remote,
            api_urls,
            fetch,
        }
    }

    async fn replace(&self, path: &Path, ext: &str) -> Result<(), HandlerError> {
        let (bytes, source) = match self.fetch_remote(path).await {
            Some(bytes) => (bytes, "remote"),
            None => {
                let ext = ext.to_string();
                let bytes = tokio::task::spawn_blocking(move || placeholder(&ext))
                    .await
                    .map_err(|e| HandlerError::transient(format!("placeholder worker failed: {e}")))??;
                (bytes, "placeholder")
            }
        };

        if self.fs.exists(path) {
            debug!(path = ?path, "file reappeared while fetching; not replacing it");
            return Ok(());
        }

        self.ledger.mark_self_modified(path);
        self.fs.write(path, &bytes)?;

        info!(path = ?path, source, size = bytes.len(), "deleted image replaced");
        Ok(())
    }

    /// Try every API URL with its own retry loop; `None` once all fail.
    async fn fetch_remote(&self, path: &Path) -> Option<Vec<u8>> {
        let attempts = self.fetch.attempts.max(1);

        for url in &self.api_urls {
            for attempt in 1..=attempts {
                match self.fetch_from(url, path).await {
                    Ok(bytes) => return Some(bytes),
                    Err(err) => {
                        warn!(url = %url, attempt, error = %err, "image API attempt failed");
                        if attempt < attempts {
                            tokio::time::sleep(self.fetch.delay).await;
                        }
                    }
                }
            }
        }

        warn!(path = ?path, "no image API succeeded; falling back to a placeholder");
        None
    }

    async fn fetch_from(&self, api_url: &str, path: &Path) -> Result<Vec<u8>, RemoteError> {
        let body = self.remote.get_json(api_url).await?;
        let image_url = resolve_image_url(&body, path).ok_or_else(|| RemoteError::Decode {
            url: api_url.to_string(),
            message: "no image url in response".to_string(),
        })?;

        let bytes = self.remote.get_bytes(&image_url).await?;
        if bytes.is_empty() {
            return Err(RemoteError::Decode {
                url: image_url,
                message: "empty image body".to_string(),
            });
        }
        Ok(bytes)
    }
}

impl Handler for ReplaceHandler {
    fn name(&self) -> &str {
        "replace"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if record.kind != ChangeKind::Deleted {
                return Ok(());
            }
            match extension_lower(&record.path) {
                Some(ext) if REPLACEABLE_EXTENSIONS.contains(&ext.as_str()) => {
                    self.replace(&record.path, &ext).await
                }
                _ => Ok(()),
            }
        })
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://")
}

/// Image URL from either `{"url": ...}` or imgflip's
/// `{"data": {"memes": [{"url": ...}]}}`.
///
/// From a list, the entry is picked by hashing `path`, so different files
/// tend to get different images without a random source.
pub fn resolve_image_url(body: &Value, path: &Path) -> Option<String> {
    if let Some(url) = body.get("url").and_then(Value::as_str) {
        return is_http_url(url).then(|| url.to_string());
    }

    let memes = body.pointer("/data/memes")?.as_array()?;
    if memes.is_empty() {
        return None;
    }
    let digest = hash_bytes(path.as_os_str().as_encoded_bytes());
    let seed = usize::from_str_radix(&digest[..8], 16).unwrap_or(0);
    let url = memes[seed % memes.len()].get("url")?.as_str()?;
    is_http_url(url).then(|| url.to_string())
}

/// Light grey canvas with a dark band across the middle, encoded for `ext`.
///
/// Extensions without a raster encoder (svg) get a PNG.
pub fn placeholder(ext: &str) -> anyhow::Result<Vec<u8>> {
    let band_top = PLACEHOLDER_HEIGHT / 2 - 20;
    let band_bottom = PLACEHOLDER_HEIGHT / 2 + 20;
    let band_left = PLACEHOLDER_WIDTH / 5;
    let band_right = PLACEHOLDER_WIDTH - PLACEHOLDER_WIDTH / 5;

    let canvas = RgbImage::from_fn(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, |x, y| {
        if (band_top..band_bottom).contains(&y) && (band_left..band_right).contains(&x) {
            BAND
        } else {
            BACKGROUND
        }
    });

    let format = match ImageFormat::from_extension(ext) {
        Some(
            f @ (ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::Gif
            | ImageFormat::WebP
            | ImageFormat::Bmp),
        ) => f,
        _ => ImageFormat::Png,
    };

    encode(
        &DynamicImage::ImageRgb8(canvas),
        format,
        ImageQuality {
            jpeg: 85,
            png_compression: 9,
        },
    )
}
