//! Image decoding and tensor preparation

use crate::error::InferenceError;
use crate::models::PreprocessingConfig;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;

pub fn decode(image: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(image).map_err(|e| InferenceError::Decode(e.to_string()))
}

/// Read `(width, height)` from the image header without decoding pixels
pub fn probe_dimensions(image: &[u8]) -> Option<(u32, u32)> {
    image::io::Reader::new(Cursor::new(image))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Fit the image to the target size and flatten it as NHWC RGB floats
///
/// The image is centre-cropped to the target aspect ratio and resized
/// with Lanczos3. With `normalize` pixels land in `[-1, 1]`, otherwise
/// in `[0, 1]`.
pub fn to_tensor_data(image: &DynamicImage, config: &PreprocessingConfig) -> Vec<f32> {
    let [width, height] = config.resize;
    let fitted = image
        .resize_to_fill(width, height, FilterType::Lanczos3)
        .to_rgb8();

    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in fitted.pixels() {
        for channel in pixel.0 {
            let value = channel as f32;
            data.push(if config.normalize {
                value / 127.5 - 1.0
            } else {
                value / 255.0
            });
        }
    }
    data
}
