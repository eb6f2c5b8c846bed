use image::imageops::{self, FilterType};
use ndarray::Array4;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Could not decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Unexpected tensor shape: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Single-item NHWC batch with channel values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.0.as_slice()
    }
}

pub fn preprocess(image_data: &[u8]) -> Result<ImageTensor, DecodeError> {
    let img = image::load_from_memory(image_data)?;
    let rgb = imageops::resize(&img.to_rgb8(), INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);

    let side = INPUT_SIZE as usize;
    let scaled: Vec<f32> = rgb.into_raw().into_iter().map(|v| v as f32 / 255.0).collect();
    let tensor = Array4::from_shape_vec((1, side, side, CHANNELS), scaled)?;
    Ok(ImageTensor(tensor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn produces_a_single_item_rgb_batch() {
        let img = ImageBuffer::from_pixel(40, 17, Rgb([255u8, 0, 51]));
        let tensor = preprocess(&encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);

        let view = tensor.view();
        let tolerance = 1.0 / 255.0 + 1e-6;
        assert!((view[[0, 100, 100, 0]] - 1.0).abs() <= tolerance);
        assert!(view[[0, 100, 100, 1]].abs() <= tolerance);
        assert!((view[[0, 100, 100, 2]] - 0.2).abs() <= tolerance);
    }

    #[test]
    fn alpha_is_dropped_and_values_stay_in_unit_range() {
        let img = ImageBuffer::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 10]));
        let tensor = preprocess(&encode(DynamicImage::ImageRgba8(img), ImageFormat::Png)).unwrap();
        assert_eq!(tensor.shape()[3], 3);
        assert!(tensor.view().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn same_bytes_give_same_tensor() {
        let img = ImageBuffer::from_fn(30, 30, |x, y| Rgb([x as u8, y as u8, (x + y) as u8]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);
        let a = preprocess(&bytes).unwrap();
        let b = preprocess(&bytes).unwrap();
        assert_eq!(a.view(), b.view());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, DecodeError::Image(_)));
    }
}
