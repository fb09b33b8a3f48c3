use std::io::Cursor;

use crate::error::ImagingError;

/// Decoded dimensions plus the detected format, read from just enough of
/// the byte stream to parse its header — a full decode is only done by
/// processors that actually need pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: image::ImageFormat,
}

/// Decode width/height/format from a complete byte buffer using only the
/// header. Callers that stream uploads still pass the fully-drained
/// buffer here: the "header-only" guarantee is about avoiding a second
/// full decode pass, not about short-circuiting the read.
pub fn decode_metadata(bytes: &[u8]) -> Result<ImageMetadata, ImagingError> {
    let format = image::guess_format(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;
    let reader = image::io::Reader::with_format(Cursor::new(bytes), format);
    let (width, height) = reader.into_dimensions().map_err(|e| ImagingError::Decode(e.to_string()))?;
    Ok(ImageMetadata { width, height, format })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decodes_dimensions_from_a_png_header() {
        let bytes = encode_png(64, 32);
        let meta = decode_metadata(&bytes).unwrap();
        assert_eq!(meta.width, 64);
        assert_eq!(meta.height, 32);
        assert_eq!(meta.format, image::ImageFormat::Png);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode_metadata(b"not an image").unwrap_err();
        assert!(matches!(err, ImagingError::Decode(_)));
    }
}
