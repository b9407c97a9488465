// src/handlers/mod.rs

//! Built-in handlers and the wiring that registers them.
//!
//! Registration order is fixed: log, image, json, text, archive, replace.

pub mod archive;
pub mod image;
pub mod json;
pub mod log;
pub mod remote;
pub mod replace;
pub mod text;

use std::sync::Arc;

use tracing::debug;

use crate::config::{HandlerSettings, HandlerToggle};
use crate::dispatch::{Handler, HandlerRegistry};
use crate::fs::FileSystem;
use crate::watch::LedgerHandle;

pub use self::archive::ArchiveHandler;
pub use self::image::{ImageHandler, ImageQuality};
pub use self::json::JsonHandler;
pub use self::log::LogHandler;
pub use self::remote::{HttpRemote, RemoteClient, RemoteError};
pub use self::replace::{FetchPolicy, ReplaceHandler};
pub use self::text::TextHandler;

fn register(registry: &mut HandlerRegistry, toggle: &HandlerToggle, handler: Arc<dyn Handler>) {
    if !toggle.enabled {
        debug!(handler = handler.name(), "handler disabled in config");
        return;
    }
    match &toggle.retry {
        Some(policy) => registry.register_with_retry(handler, policy.clone()),
        None => registry.register(handler),
    };
}

/// Build the registry of every enabled built-in handler.
pub fn build_registry(
    settings: &HandlerSettings,
    fs: Arc<dyn FileSystem>,
    ledger: LedgerHandle,
    remote: Arc<dyn RemoteClient>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    register(&mut registry, &settings.log, Arc::new(LogHandler));

    register(
        &mut registry,
        &settings.image.toggle,
        Arc::new(ImageHandler::new(
            Arc::clone(&fs),
            ledger.clone(),
            ImageQuality {
                jpeg: settings.image.jpeg_quality,
                png_compression: settings.image.png_compression,
            },
        )),
    );

    register(
        &mut registry,
        &settings.json.toggle,
        Arc::new(JsonHandler::new(
            Arc::clone(&fs),
            Arc::clone(&remote),
            settings.json.endpoint.clone(),
        )),
    );

    register(
        &mut registry,
        &settings.text.toggle,
        Arc::new(TextHandler::new(
            Arc::clone(&fs),
            ledger.clone(),
            Arc::clone(&remote),
            settings.text.source_url.clone(),
        )),
    );

    register(
        &mut registry,
        &settings.archive.toggle,
        Arc::new(ArchiveHandler::new(
            Arc::clone(&fs),
            ledger.clone(),
            settings.archive.extract_to.clone(),
            settings.archive.max_extracted_bytes,
        )),
    );

    register(
        &mut registry,
        &settings.replace.toggle,
        Arc::new(ReplaceHandler::new(
            fs,
            ledger,
            remote,
            settings.replace.api_urls.clone(),
            FetchPolicy {
                attempts: settings.replace.fetch_attempts,
                delay: settings.replace.fetch_delay,
            },
        )),
    );

    registry
}
