use std::path::Path;

use crate::muxing::domain::image_source::ImageSource;
use crate::shared::bitmap::Bitmap;

/// Loads one still image and serves it as the bitmap for every video frame.
///
/// The image is scaled to the writer's exact resolution on load, since the
/// writer requires every frame at the configured size.
pub struct ImageFileSource {
    bitmap: Bitmap,
}

impl ImageFileSource {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self, Box<dyn std::error::Error>> {
        let image = image::open(path)?;
        let image = if image.width() != width || image.height() != height {
            image.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
        } else {
            image
        };
        let rgb = image.to_rgb8();

        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            data.extend_from_slice(&[b, g, r]);
        }

        Ok(Self {
            bitmap: Bitmap::new(data, width, height),
        })
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }
}

impl ImageSource for ImageFileSource {
    fn next_bitmap(&mut self) -> Result<&Bitmap, Box<dyn std::error::Error>> {
        Ok(&self.bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_converts_rgb_to_bgr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let source = ImageFileSource::open(&path, 4, 4).unwrap();
        let bitmap = source.bitmap();
        assert_eq!(bitmap.width(), 4);
        assert_eq!(bitmap.height(), 4);
        assert_eq!(&bitmap.row(0)[..3], &[30, 20, 10]);
    }

    #[test]
    fn test_load_scales_to_requested_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]))
            .save(&path)
            .unwrap();

        let mut source = ImageFileSource::open(&path, 16, 8).unwrap();
        let bitmap = source.next_bitmap().unwrap();
        assert_eq!(bitmap.width(), 16);
        assert_eq!(bitmap.height(), 8);
        assert_eq!(bitmap.data().len(), 16 * 8 * 3);
    }

    #[test]
    fn test_open_nonexistent_file_fails() {
        let result = ImageFileSource::open(Path::new("/nonexistent/image.png"), 4, 4);
        assert!(result.is_err());
    }
}
