use image::codecs::jpeg::JpegEncoder;
use image::ImageError;

#[derive(Debug)]
pub enum EncodeError {
    Image(ImageError),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Image(err) => write!(f, "image error: {}", err),
        }
    }
}

impl std::error::Error for EncodeError {}

impl From<ImageError> for EncodeError {
    fn from(err: ImageError) -> Self {
        EncodeError::Image(err)
    }
}

/// Turns raw embedded artwork (any supported format) into JPEG bytes.
pub trait ImageEncoder: Send + Sync {
    fn encode_jpeg(&self, raw: &[u8]) -> Result<Vec<u8>, EncodeError>;
}

#[derive(Debug, Clone, Copy)]
pub struct JpegThumbnailer {
    max_size: u32,
    quality: u8,
}

impl JpegThumbnailer {
    pub fn new(max_size: u32, quality: u8) -> Self {
        Self {
            max_size: max_size.max(1),
            quality: quality.clamp(1, 100),
        }
    }
}

impl ImageEncoder for JpegThumbnailer {
    fn encode_jpeg(&self, raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
        let img = image::load_from_memory(raw)?;
        let img = if img.width() > self.max_size || img.height() > self.max_size {
            img.thumbnail(self.max_size, self.max_size)
        } else {
            img
        };
        // JPEG carries no alpha channel.
        let rgb = img.to_rgb8();

        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.quality);
            encoder.encode_image(&rgb)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

    use super::{ImageEncoder, JpegThumbnailer};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 128]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn downscales_large_art_to_jpeg() {
        let jpeg = JpegThumbnailer::new(300, 85).encode_jpeg(&png(600, 400)).unwrap();
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (300, 200));
    }

    #[test]
    fn keeps_small_art_size() {
        let jpeg = JpegThumbnailer::new(300, 85).encode_jpeg(&png(64, 32)).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (64, 32));
    }

    #[test]
    fn rejects_non_image_bytes() {
        assert!(JpegThumbnailer::new(300, 85)
            .encode_jpeg(b"not an image at all")
            .is_err());
    }
}
