//! Per-run memo of the expensive per-file work: content hashes and decodes.
//!
//! Each path gets one `OnceLock` slot. The first caller computes the value;
//! concurrent callers for the same path block on that single computation and
//! share its outcome, so no file is hashed or decoded twice in one run no
//! matter which checks ask, or in what order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::image_stats::{compute_pixel_stats, compute_text_stats, PixelStats, TextStats};
use crate::config::DecodeConfig;
use crate::core::dataset::FileEntry;

/// Bytes read to prove a non-media file can be opened.
const HEAD_BYTES: usize = 512;

/// How a file is decoded, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Image,
    Text,
    Other,
}

/// Successful decode result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decoded {
    Image(PixelStats),
    Text(TextStats),
    /// A file of unknown type that could be opened and read.
    Opaque { bytes_read: usize },
}

/// Why a file failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DecodeFailure {
    #[error("empty file")]
    EmptyFile,
    #[error("unreadable: {0}")]
    Unreadable(String),
    #[error("image corrupted: {0}")]
    Malformed(String),
    #[error("decoded image has no pixels")]
    EmptyPayload,
    #[error("decode timed out after {0} ms")]
    TimedOut(u64),
}

pub type DecodeOutcome = Result<Decoded, DecodeFailure>;

/// Content digest result; the error is the read failure message.
pub type HashOutcome = Result<String, String>;

type Slots<T> = Mutex<HashMap<PathBuf, Arc<OnceLock<T>>>>;

pub struct FileCache {
    config: DecodeConfig,
    hashes: Slots<HashOutcome>,
    decodes: Slots<DecodeOutcome>,
    hash_calls: AtomicUsize,
    decode_calls: AtomicUsize,
}

impl FileCache {
    pub fn new(config: DecodeConfig) -> Self {
        Self {
            config,
            hashes: Mutex::new(HashMap::new()),
            decodes: Mutex::new(HashMap::new()),
            hash_calls: AtomicUsize::new(0),
            decode_calls: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    pub fn content_kind(&self, entry: &FileEntry) -> ContentKind {
        let Some(ext) = entry.extension() else {
            return ContentKind::Other;
        };
        if self.config.is_image_extension(&ext) {
            ContentKind::Image
        } else if self.config.is_text_extension(&ext) {
            ContentKind::Text
        } else {
            ContentKind::Other
        }
    }

    /// SHA-256 of the file contents, computed at most once per path.
    pub fn content_hash(&self, entry: &FileEntry) -> HashOutcome {
        let slot = slot_for(&self.hashes, &entry.path);
        slot.get_or_init(|| {
            self.hash_calls.fetch_add(1, Ordering::Relaxed);
            hash_file(&entry.path, self.config.hash_chunk_size).map_err(|e| e.to_string())
        })
        .clone()
    }

    /// Decode outcome for the file, computed at most once per path.
    pub fn decode(&self, entry: &FileEntry) -> DecodeOutcome {
        let slot = slot_for(&self.decodes, &entry.path);
        slot.get_or_init(|| {
            self.decode_calls.fetch_add(1, Ordering::Relaxed);
            let kind = self.content_kind(entry);
            let resize = self.config.stats_resize;
            let outcome = decode_with_timeout(&entry.path, self.config.timeout(), move |path| {
                decode_file(path, kind, resize)
            });
            if let Err(failure) = &outcome {
                debug!("Decode failed for {:?}: {}", entry.path, failure);
            }
            outcome
        })
        .clone()
    }

    /// Number of underlying hash computations performed.
    pub fn hash_count(&self) -> usize {
        self.hash_calls.load(Ordering::Relaxed)
    }

    /// Number of underlying decode attempts performed.
    pub fn decode_count(&self) -> usize {
        self.decode_calls.load(Ordering::Relaxed)
    }
}

fn slot_for<T>(slots: &Slots<T>, path: &Path) -> Arc<OnceLock<T>> {
    let mut map = slots.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(map.entry(path.to_path_buf()).or_default())
}

fn hash_file(path: &Path, chunk_size: usize) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Run `decode` on a helper thread so a stuck decoder cannot hang the run.
/// A timed-out helper is abandoned; its late result is dropped.
fn decode_with_timeout<F>(path: &Path, timeout: Option<Duration>, decode: F) -> DecodeOutcome
where
    F: FnOnce(&Path) -> DecodeOutcome + Clone + Send + 'static,
{
    let Some(timeout) = timeout else {
        return decode(path);
    };

    let (tx, rx) = mpsc::channel();
    let owned_path = path.to_path_buf();
    let worker = decode.clone();
    let spawned = thread::Builder::new()
        .name("decode".to_string())
        .spawn(move || {
            let _ = tx.send(worker(&owned_path));
        });
    if let Err(e) = spawned {
        warn!("Could not spawn decode thread, decoding inline: {}", e);
        return decode(path);
    }

    match rx.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            warn!("Decode of {:?} timed out after {:?}", path, timeout);
            Err(DecodeFailure::TimedOut(duration_ms(timeout)))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(DecodeFailure::Malformed("decoder aborted".to_string()))
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn decode_file(path: &Path, kind: ContentKind, resize: Option<u32>) -> DecodeOutcome {
    match kind {
        ContentKind::Image => {
            let bytes = read_all(path)?;
            let img = image::load_from_memory(&bytes)
                .map_err(|e| DecodeFailure::Malformed(e.to_string()))?;
            if img.width() == 0 || img.height() == 0 {
                return Err(DecodeFailure::EmptyPayload);
            }
            Ok(Decoded::Image(compute_pixel_stats(&img, resize)))
        }
        ContentKind::Text => {
            let bytes = read_all(path)?;
            Ok(Decoded::Text(compute_text_stats(&bytes)))
        }
        ContentKind::Other => {
            let mut file =
                File::open(path).map_err(|e| DecodeFailure::Unreadable(e.to_string()))?;
            let mut head = [0u8; HEAD_BYTES];
            let bytes_read = file
                .read(&mut head)
                .map_err(|e| DecodeFailure::Unreadable(e.to_string()))?;
            if bytes_read == 0 {
                return Err(DecodeFailure::EmptyFile);
            }
            Ok(Decoded::Opaque { bytes_read })
        }
    }
}

fn read_all(path: &Path) -> Result<Vec<u8>, DecodeFailure> {
    let bytes = std::fs::read(path).map_err(|e| DecodeFailure::Unreadable(e.to_string()))?;
    if bytes.is_empty() {
        return Err(DecodeFailure::EmptyFile);
    }
    Ok(bytes)
}
