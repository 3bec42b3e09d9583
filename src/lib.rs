pub mod api;
pub mod caption;
pub mod chunk_builder;
pub mod compose;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod ffmpeg;
pub mod generator;
pub mod init;
pub mod speech;
pub mod thumbnail;
pub mod timeline;

pub use error::{ShortsError, ShortsResult};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("[{}] {}", tag, message),
        _ => tracing::info!("[{}] {}", tag, message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
