//! JPEG transport codec

use crate::{FrameError, VideoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat};
use tracing::trace;

/// Decode a JPEG frame to RGB
pub fn decode_jpeg(bytes: &[u8], sequence: u64, timestamp_ns: u64) -> Result<VideoFrame, FrameError> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
        .map_err(|e| FrameError::Decode(e.to_string()))?;
    let rgb = img.to_rgb8();
    trace!("Decoded frame {} ({}x{})", sequence, rgb.width(), rgb.height());

    Ok(VideoFrame::from_image(rgb, timestamp_ns, sequence))
}

/// Encode an RGB frame as JPEG
pub fn encode_jpeg(frame: &VideoFrame, quality: u8) -> Result<Vec<u8>, FrameError> {
    let mut out = Vec::with_capacity(frame.data.len() / 8);
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder
        .encode(&frame.data, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| FrameError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_keeps_dimensions() {
        let frame = VideoFrame::filled(32, 24, [200, 40, 40]);
        let bytes = encode_jpeg(&frame, 90).unwrap();
        let decoded = decode_jpeg(&bytes, 7, 1_000).unwrap();
        assert_eq!(decoded.width, 32);
        assert_eq!(decoded.height, 24);
        assert_eq!(decoded.sequence, 7);
        assert_eq!(decoded.timestamp_ns, 1_000);
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_jpeg(b"not a jpeg", 0, 0).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }
}
