//! Image normalization - matches the MobileNetV2 preprocessing exactly.
//!
//! Any uploaded image → fixed tensor of shape (1, 224, 224, 3):
//! - Decode the bytes (format sniffed from content, not from the declared type)
//! - Force RGB: alpha is dropped, grayscale and palettes are expanded
//! - Resize to 224x224 with a bicubic filter (aspect ratio is NOT preserved)
//! - Scale each channel from [0, 255] to [-1, 1] via `x / 127.5 - 1.0`

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use tracing::debug;

use crate::error::{VerifyError, VerifyResult};

pub const INPUT_SIZE: usize = 224;
pub const CHANNELS: usize = 3;
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Uploaded bytes together with the content type the client declared.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }
}

/// A single-image NHWC batch, always (1, 224, 224, 3) `f32`.
#[derive(Debug, Clone)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }
}

/// Reject anything whose declared type is not `image/*`.
pub fn check_content_type(content_type: &str) -> VerifyResult<()> {
    let normalized = content_type.trim().to_ascii_lowercase();
    if normalized.starts_with("image/") {
        Ok(())
    } else {
        Err(VerifyError::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Decode, convert, resize and scale an uploaded image.
pub fn normalize(bytes: &[u8], content_type: &str) -> VerifyResult<ImageTensor> {
    check_content_type(content_type)?;

    if bytes.is_empty() {
        return Err(VerifyError::InvalidImage("empty upload".into()));
    }

    let decoded =
        image::load_from_memory(bytes).map_err(|e| VerifyError::InvalidImage(e.to_string()))?;
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        color = ?decoded.color(),
        "decoded image"
    );

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE as u32, INPUT_SIZE as u32, RESIZE_FILTER);

    to_tensor(&resized).map(ImageTensor)
}

fn to_tensor(img: &RgbImage) -> VerifyResult<Array4<f32>> {
    let (width, height) = img.dimensions();
    if width as usize != INPUT_SIZE || height as usize != INPUT_SIZE {
        return Err(VerifyError::Preprocessing(format!(
            "resized image is {width}x{height}, expected {INPUT_SIZE}x{INPUT_SIZE}"
        )));
    }

    let mut tensor = Array4::<f32>::zeros((1, INPUT_SIZE, INPUT_SIZE, CHANNELS));
    for (x, y, pixel) in img.enumerate_pixels() {
        for c in 0..CHANNELS {
            tensor[[0, y as usize, x as usize, c]] = scale_channel(pixel[c]);
        }
    }
    Ok(tensor)
}

/// MobileNetV2 "tf" mode: [0, 255] → [-1, 1].
fn scale_channel(value: u8) -> f32 {
    value as f32 / 127.5 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn rgb_image_of_any_size_yields_fixed_shape() {
        for (w, h) in [(1, 1), (640, 480), (100, 900), (224, 224)] {
            let img = RgbImage::from_pixel(w, h, Rgb([10, 20, 30]));
            let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
            let tensor = normalize(&bytes, "image/png").unwrap();
            assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        }
    }

    #[test]
    fn grayscale_is_expanded_to_three_channels() {
        let img = GrayImage::from_pixel(50, 30, Luma([255]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);
        let tensor = normalize(&bytes, "image/png").unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let arr = tensor.as_array();
        for c in 0..3 {
            assert!((arr[[0, 112, 112, c]] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn rgba_alpha_is_dropped() {
        let img = RgbaImage::from_pixel(300, 200, Rgba([0, 255, 0, 10]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let tensor = normalize(&bytes, "image/png").unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let arr = tensor.as_array();
        assert!((arr[[0, 0, 0, 0]] + 1.0).abs() < 1e-6);
        assert!((arr[[0, 0, 0, 1]] - 1.0).abs() < 1e-6);
        assert!((arr[[0, 0, 0, 2]] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn jpeg_is_decoded_regardless_of_declared_subtype() {
        let img = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let tensor = normalize(&bytes, "image/png").unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn values_are_scaled_to_unit_range() {
        assert_eq!(scale_channel(0), -1.0);
        assert_eq!(scale_channel(255), 1.0);
        assert!(scale_channel(128).abs() < 0.01);
    }

    #[test]
    fn non_image_content_type_is_rejected_before_decoding() {
        let err = normalize(b"not even looked at", "application/pdf").unwrap_err();
        assert!(matches!(err, VerifyError::UnsupportedMediaType(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn content_type_check_is_case_insensitive() {
        assert!(check_content_type(" Image/JPEG ").is_ok());
        assert!(check_content_type("text/plain").is_err());
        assert!(check_content_type("").is_err());
    }

    #[test]
    fn garbage_bytes_are_a_client_error() {
        let err = normalize(b"\x00\x01definitely not a picture", "image/jpeg").unwrap_err();
        assert!(matches!(err, VerifyError::InvalidImage(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn empty_upload_is_invalid() {
        let err = normalize(&[], "image/png").unwrap_err();
        assert!(matches!(err, VerifyError::InvalidImage(_)));
    }

    #[test]
    fn normalization_is_deterministic() {
        let img = RgbImage::from_fn(37, 91, |x, y| Rgb([x as u8, y as u8, (x + y) as u8]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);
        let a = normalize(&bytes, "image/png").unwrap();
        let b = normalize(&bytes, "image/png").unwrap();
        assert_eq!(a.as_array(), b.as_array());
    }
}
