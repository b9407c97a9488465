// src/handlers/image.rs

//! Re-encodes images dropped into a watched root, keeping the result only
//! when it is smaller than the original.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, Frame, ImageFormat};
use tracing::{debug, info, warn};

use crate::dispatch::{Handler, HandlerError, HandlerFuture};
use crate::engine::ChangeRecord;
use crate::fs::FileSystem;
use crate::types::ChangeKind;
use crate::watch::hash::state_key;
use crate::watch::path_utils::extension_lower;
use crate::watch::{LedgerHandle, ProcessedStates};

pub const OPTIMIZABLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageQuality {
    /// 1..=100
    pub jpeg: u8,
    /// 0..=9
    pub png_compression: u8,
}

impl Default for ImageQuality {
    fn default() -> Self {
        Self {
            jpeg: 80,
            png_compression: 9,
        }
    }
}

#[derive(Debug)]
pub struct ImageHandler {
    fs: Arc<dyn FileSystem>,
    ledger: LedgerHandle,
    quality: ImageQuality,
    processed: ProcessedStates,
}

impl ImageHandler {
    pub fn new(fs: Arc<dyn FileSystem>, ledger: LedgerHandle, quality: ImageQuality) -> Self {
        Self {
            fs,
            ledger,
            quality,
            processed: ProcessedStates::default(),
        }
    }

    async fn optimize(&self, path: &Path, ext: String) -> Result<(), HandlerError> {
        if !self.fs.is_file(path) {
            warn!(path = ?path, "image vanished before it could be optimized");
            return Ok(());
        }

        let key = state_key(path, self.fs.modified(path)?);
        if self.processed.is_processed(&key) {
            debug!(path = ?path, "image state already processed; skipping");
            return Ok(());
        }

        let original = self.fs.read(path)?;
        let original_len = original.len();
        let quality = self.quality;

        let encoded = tokio::task::spawn_blocking(move || reencode(&original, &ext, quality))
            .await
            .map_err(|e| HandlerError::transient(format!("image worker failed: {e}")))??;

        if encoded.len() >= original_len {
            debug!(
                path = ?path,
                size = original_len,
                "re-encoding would not shrink the image; leaving it"
            );
            self.processed.remember(key);
            return Ok(());
        }

        self.ledger.mark_self_modified(path);
        self.fs.write(path, &encoded)?;

        self.processed.remember(key);
        self.processed.remember(state_key(path, self.fs.modified(path)?));

        info!(
            path = ?path,
            before = original_len,
            after = encoded.len(),
            "image optimized"
        );
        Ok(())
    }
}

impl Handler for ImageHandler {
    fn name(&self) -> &str {
        "image"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if !record.is_external() || record.kind == ChangeKind::Deleted {
                return Ok(());
            }
            match extension_lower(&record.path) {
                Some(ext) if OPTIMIZABLE_EXTENSIONS.contains(&ext.as_str()) => {
                    self.optimize(&record.path, ext).await
                }
                _ => Ok(()),
            }
        })
    }
}

fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Decode `bytes` as the format implied by `ext` and encode it again.
pub fn reencode(bytes: &[u8], ext: &str, quality: ImageQuality) -> anyhow::Result<Vec<u8>> {
    let format = ImageFormat::from_extension(ext)
        .ok_or_else(|| anyhow!("unsupported image extension '{ext}'"))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .with_context(|| format!("decoding {ext} image"))?;

    encode(&img, format, quality)
}

/// Encode `img` as `format`. Formats without a tuned encoder fall back to
/// the crate's defaults.
pub fn encode(img: &DynamicImage, format: ImageFormat, quality: ImageQuality) -> anyhow::Result<Vec<u8>> {
    let mut out = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut out, quality.jpeg);
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Png => {
            let encoder = PngEncoder::new_with_quality(
                &mut out,
                png_compression(quality.png_compression),
                FilterType::Adaptive,
            );
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut out);
            DynamicImage::ImageRgba8(img.to_rgba8()).write_with_encoder(encoder)?;
        }
        ImageFormat::Gif => {
            let mut encoder = GifEncoder::new(&mut out);
            encoder.encode_frame(Frame::new(img.to_rgba8()))?;
        }
        other => {
            img.write_to(&mut Cursor::new(&mut out), other)?;
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::types::Origin;
    use crate::watch::SelfModificationLedger;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use std::time::UNIX_EPOCH;

    fn gradient_jpeg(quality: u8) -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 128]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&img)
            .unwrap();
        out
    }

    fn record(path: &str, kind: ChangeKind, origin: Origin) -> ChangeRecord {
        ChangeRecord {
            path: PathBuf::from(path),
            kind,
            origin,
            mtime: UNIX_EPOCH,
        }
    }

    fn setup() -> (MockFileSystem, Arc<SelfModificationLedger>, ImageHandler) {
        let fs = MockFileSystem::new();
        let ledger = Arc::new(SelfModificationLedger::default());
        let handler = ImageHandler::new(
            Arc::new(fs.clone()),
            ledger.handle(),
            ImageQuality {
                jpeg: 10,
                png_compression: 9,
            },
        );
        (fs, ledger, handler)
    }

    #[tokio::test]
    async fn shrinks_external_jpeg_and_marks_the_ledger() {
        let (fs, ledger, handler) = setup();
        let original = gradient_jpeg(100);
        fs.add_file("/w/photo.jpg", original.clone());

        handler
            .handle(&record("/w/photo.jpg", ChangeKind::Created, Origin::External))
            .await
            .unwrap();

        let written = fs.contents("/w/photo.jpg").unwrap();
        assert!(written.len() < original.len());
        assert!(ledger.was_self_modified(Path::new("/w/photo.jpg")));

        // The post-write state is remembered, so a repeat is a no-op.
        handler
            .handle(&record("/w/photo.jpg", ChangeKind::Modified, Origin::External))
            .await
            .unwrap();
        assert_eq!(fs.contents("/w/photo.jpg").unwrap(), written);
    }

    #[tokio::test]
    async fn ignores_internal_deleted_and_foreign_files() {
        let (fs, ledger, handler) = setup();
        let original = gradient_jpeg(100);
        fs.add_file("/w/photo.jpg", original.clone());
        fs.add_file("/w/notes.txt", b"hi".to_vec());

        for rec in [
            record("/w/photo.jpg", ChangeKind::Modified, Origin::Internal),
            record("/w/photo.jpg", ChangeKind::Deleted, Origin::External),
            record("/w/notes.txt", ChangeKind::Created, Origin::External),
        ] {
            handler.handle(&rec).await.unwrap();
        }

        assert_eq!(fs.contents("/w/photo.jpg").unwrap(), original);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn undecodable_image_is_a_transient_failure() {
        let (fs, _, handler) = setup();
        fs.add_file("/w/broken.png", b"not a png".to_vec());

        let err = handler
            .handle(&record("/w/broken.png", ChangeKind::Created, Origin::External))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn missing_file_is_skipped() {
        let (_, _, handler) = setup();
        handler
            .handle(&record("/w/gone.png", ChangeKind::Created, Origin::External))
            .await
            .unwrap();
    }
}
