//! Synthetic frame payloads
//!
//! Byte buffers shaped like what a USB camera hands back for each encoding,
//! so capture paths can be exercised offline without hardware.

use crate::types::{FormatSpec, FrameEncoding};
use bytes::{BufMut, Bytes, BytesMut};

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Create a synthetic payload for `format`, varying with `frame_number`.
pub fn synthetic_payload(frame_number: u64, format: &FormatSpec) -> Bytes {
    match format.encoding {
        FrameEncoding::Mjpeg => synthetic_mjpeg(frame_number, format.width(), format.height()),
        FrameEncoding::Yuy2 => synthetic_yuy2(frame_number, format.width(), format.height()),
        FrameEncoding::Nv12 => synthetic_nv12(frame_number, format.width(), format.height()),
    }
}

/// A marker-delimited JPEG-looking buffer.
///
/// Compressed size varies per frame like a real encoder's output; only the
/// SOI/APP0/EOI framing is meaningful.
pub fn synthetic_mjpeg(frame_number: u64, width: u32, height: u32) -> Bytes {
    let body_len = ((width as usize * height as usize) / 64).max(64) + (frame_number % 97) as usize;
    let mut buf = BytesMut::with_capacity(body_len + 24);

    buf.put_slice(&JPEG_SOI);
    // APP0 "JFIF"
    buf.put_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    buf.put_slice(b"JFIF\0");
    buf.put_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);

    let base = (frame_number % 256) as u8;
    for i in 0..body_len {
        // 0xFF would read as a marker
        buf.put_u8(base.wrapping_add(i as u8) & 0x7F);
    }

    buf.put_slice(&JPEG_EOI);
    buf.freeze()
}

/// Packed 4:2:2 (Y0 U Y1 V), two bytes per pixel, with a moving luma ramp.
pub fn synthetic_yuy2(frame_number: u64, width: u32, height: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(width as usize * height as usize * 2);
    let base = (frame_number % 256) as u8;

    // One (Y, chroma) byte pair per pixel keeps odd widths at w*h*2.
    for y in 0..height {
        for x in 0..width {
            buf.put_slice(&[base.wrapping_add((x + y) as u8), 0x80]);
        }
    }
    buf.freeze()
}

/// Planar Y followed by interleaved UV at quarter resolution.
pub fn synthetic_nv12(frame_number: u64, width: u32, height: u32) -> Bytes {
    let luma_len = width as usize * height as usize;
    let mut buf = BytesMut::with_capacity(luma_len + luma_len / 2);
    let base = (frame_number % 256) as u8;

    for y in 0..height {
        for x in 0..width {
            buf.put_u8(base.wrapping_add((x ^ y) as u8));
        }
    }
    buf.put_bytes(0x80, luma_len / 2);
    buf.freeze()
}

pub fn looks_like_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data.starts_with(&JPEG_SOI) && data.ends_with(&JPEG_EOI)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mjpeg_is_marker_delimited() {
        let frame = synthetic_mjpeg(3, 640, 480);
        assert!(looks_like_jpeg(&frame));
        assert!(!frame[2..frame.len() - 2].windows(2).any(|w| w == JPEG_EOI));
    }

    #[test]
    fn test_mjpeg_size_varies_per_frame() {
        assert_ne!(
            synthetic_mjpeg(1, 640, 480).len(),
            synthetic_mjpeg(2, 640, 480).len()
        );
    }

    #[test]
    fn test_raw_sizes() {
        assert_eq!(synthetic_yuy2(0, 320, 240).len(), 320 * 240 * 2);
        assert_eq!(synthetic_nv12(0, 320, 240).len(), 320 * 240 * 3 / 2);
    }

    #[test]
    fn test_odd_width_sizes() {
        assert_eq!(synthetic_yuy2(0, 161, 121).len(), 161 * 121 * 2);
        assert_eq!(synthetic_nv12(0, 161, 121).len(), 161 * 121 * 3 / 2);

        let spec = FormatSpec::new(161, 121, FrameEncoding::Yuy2, 30);
        assert_eq!(synthetic_payload(0, &spec).len(), 161 * 121 * 2);
    }

    #[test]
    fn test_payload_follows_encoding() {
        let spec = FormatSpec::new(160, 120, FrameEncoding::Yuy2, 30);
        assert_eq!(synthetic_payload(0, &spec).len(), 160 * 120 * 2);

        let spec = spec.with_encoding(FrameEncoding::Mjpeg);
        assert!(looks_like_jpeg(&synthetic_payload(0, &spec)));
    }
}
