mod file_cache;
mod image_stats;

pub use file_cache::{
    ContentKind, DecodeFailure, DecodeOutcome, Decoded, FileCache, HashOutcome,
};
pub use image_stats::{compute_pixel_stats, compute_text_stats, PixelStats, TextStats};
