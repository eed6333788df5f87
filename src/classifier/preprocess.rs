//! Image preprocessing

use image::imageops::{self, FilterType};
use ndarray::Array4;

use super::InputShape;

/// Decode image bytes into a `[1, height, width, 3]` batch scaled to `[0, 1]`.
///
/// The image is converted to RGB and resized directly to the target size;
/// aspect ratio is not preserved.
pub fn preprocess_image(bytes: &[u8], shape: InputShape) -> Result<Array4<f32>, image::ImageError> {
    let rgb = image::load_from_memory(bytes)?.to_rgb8();
    let resized = imageops::resize(&rgb, shape.width as u32, shape.height as u32, FilterType::CatmullRom);

    Ok(Array4::from_shape_fn((1, shape.height, shape.width, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}
