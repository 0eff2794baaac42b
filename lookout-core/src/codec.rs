//! Still-frame JPEG and data-URI encoding

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use crate::error::CodecError;

pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(CodecError::Encode)?;
    Ok(buf)
}

/// Encode a frame as `data:image/jpeg;base64,...` for direct use in an
/// `<img src>`.
pub fn encode_data_uri(image: &RgbImage, quality: u8) -> Result<String, CodecError> {
    let jpeg = encode_jpeg(image, quality)?;
    let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(DATA_URI_PREFIX);
    STANDARD.encode_string(&jpeg, &mut uri);
    Ok(uri)
}

/// Decode any `data:image/...;base64,` URI back into an RGB frame.
pub fn decode_data_uri(uri: &str) -> Result<RgbImage, CodecError> {
    let (header, payload) = uri.split_once(',').ok_or(CodecError::InvalidDataUri)?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(CodecError::InvalidDataUri);
    }
    let bytes = STANDARD.decode(payload.trim())?;
    let image = image::load_from_memory(&bytes).map_err(CodecError::Decode)?;
    Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn data_uri_has_jpeg_prefix() {
        let image = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
        let uri = encode_data_uri(&image, 80).unwrap();
        assert!(uri.starts_with(DATA_URI_PREFIX));
        assert!(uri.len() > DATA_URI_PREFIX.len());
    }

    #[test]
    fn encoded_frame_decodes_to_same_dimensions() {
        let image = RgbImage::from_pixel(48, 32, Rgb([0, 128, 255]));
        let decoded = decode_data_uri(&encode_data_uri(&image, 90).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (48, 32));
    }

    #[test]
    fn jpeg_output_starts_with_soi_marker() {
        let image = RgbImage::from_pixel(8, 8, Rgb([1, 2, 3]));
        let jpeg = encode_jpeg(&image, 0).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn missing_comma_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64"),
            Err(CodecError::InvalidDataUri)
        ));
    }

    #[test]
    fn non_image_uri_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:text/plain;base64,aGk="),
            Err(CodecError::InvalidDataUri)
        ));
    }

    #[test]
    fn corrupt_base64_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:image/jpeg;base64,@@@"),
            Err(CodecError::Base64(_))
        ));
    }
}
