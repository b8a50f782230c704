use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Grayscale intensity statistics of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelStats {
    pub mean: f64,
    pub std: f64,
    /// Original dimensions, before any downscaling for the stats.
    pub width: u32,
    pub height: u32,
}

/// Character statistics of a text file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStats {
    /// Characters after trimming surrounding whitespace.
    pub chars: usize,
    pub printable_ratio: f64,
}

impl TextStats {
    pub fn is_blank(&self) -> bool {
        self.chars == 0
    }
}

/// Computes mean and population standard deviation of pixel intensity.
///
/// Multi-channel images are reduced to luma first. When `max_side` is set and
/// the image is larger, stats come from a thumbnail of at most that size.
pub fn compute_pixel_stats(img: &DynamicImage, max_side: Option<u32>) -> PixelStats {
    let (width, height) = (img.width(), img.height());

    let luma = match max_side {
        Some(side) if side > 0 && (width > side || height > side) => {
            img.thumbnail(side, side).to_luma8()
        }
        _ => img.to_luma8(),
    };

    let (mean, std) = mean_and_std(luma.as_raw());
    PixelStats {
        mean,
        std,
        width,
        height,
    }
}

fn mean_and_std(values: &[u8]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// A character counts as printable if it is visible text or whitespace.
/// U+FFFD (left behind by invalid UTF-8) and control characters do not.
fn is_printable(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    if c.is_ascii() {
        return c.is_ascii_graphic();
    }
    !c.is_control() && c != char::REPLACEMENT_CHARACTER
}

pub fn compute_text_stats(bytes: &[u8]) -> TextStats {
    let text = String::from_utf8_lossy(bytes);
    let content = text.trim();

    let chars = content.chars().count();
    let printable = content.chars().filter(|&c| is_printable(c)).count();
    let printable_ratio = printable as f64 / chars.max(1) as f64;

    TextStats {
        chars,
        printable_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn test_black_image_stats() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 100, Luma([0])));
        let stats = compute_pixel_stats(&img, Some(64));
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std, 0.0);
        assert_eq!((stats.width, stats.height), (100, 100));
    }

    #[test]
    fn test_half_black_half_white() {
        let img = GrayImage::from_fn(10, 10, |x, _| if x < 5 { Luma([0]) } else { Luma([255]) });
        let stats = compute_pixel_stats(&DynamicImage::ImageLuma8(img), None);
        assert!((stats.mean - 127.5).abs() < 1e-9);
        assert!((stats.std - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_color_image_reduced_to_luma() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let stats = compute_pixel_stats(&DynamicImage::ImageRgb8(img), None);
        assert!(stats.mean > 254.0);
        assert!(stats.std < 1e-9);
    }

    #[test]
    fn test_text_stats_plain() {
        let stats = compute_text_stats(b"  hello, world\n");
        assert_eq!(stats.chars, 12);
        assert_eq!(stats.printable_ratio, 1.0);
        assert!(!stats.is_blank());
    }

    #[test]
    fn test_text_stats_blank() {
        let stats = compute_text_stats(b" \n\t ");
        assert!(stats.is_blank());
    }

    #[test]
    fn test_text_stats_binary_noise() {
        let noise: Vec<u8> = (0u8..=255).cycle().take(1024).collect();
        let stats = compute_text_stats(&noise);
        assert!(stats.printable_ratio < 0.8);
    }

    #[test]
    fn test_unicode_text_is_printable() {
        let stats = compute_text_stats("café naïve".as_bytes());
        assert_eq!(stats.printable_ratio, 1.0);
    }
}
