//! Header sniffing: image format and dimensions from a byte prefix
//!
//! Nothing here decodes pixel data. Every function is total over arbitrary
//! input: truncated or malformed buffers yield `None`, never a panic.

use crate::types::ImageFormat;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Identify a raster format from its magic bytes
#[must_use]
pub fn detect_format(buf: &[u8]) -> Option<ImageFormat> {
    if buf.starts_with(&[0xFF, 0xD8]) {
        Some(ImageFormat::Jpeg)
    } else if buf.starts_with(&PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WEBP" {
        Some(ImageFormat::WebP)
    } else if buf.starts_with(b"GIF87a") || buf.starts_with(b"GIF89a") {
        Some(ImageFormat::Gif)
    } else {
        None
    }
}

/// Width and height for formats whose header is understood
///
/// Returns `None` for formats reported as "dimensions unknown" (GIF, other
/// declared types, WebP without a `VP8X` chunk) and for malformed headers.
#[must_use]
pub fn dimensions(format: ImageFormat, buf: &[u8]) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Jpeg => jpeg_dimensions(buf),
        ImageFormat::Png => png_dimensions(buf),
        ImageFormat::WebP => webp_dimensions(buf),
        ImageFormat::Gif | ImageFormat::Other => None,
    }
}

/// JPEG dimensions from the first Start-Of-Frame segment
///
/// Walks marker segments from offset 2, skipping each by its 2-byte length.
/// Stops with `None` at Start-Of-Scan or End-Of-Image when no SOF came first.
#[must_use]
pub fn jpeg_dimensions(buf: &[u8]) -> Option<(u32, u32)> {
    if !buf.starts_with(&[0xFF, 0xD8]) {
        return None;
    }

    let mut i = 2;
    loop {
        if *buf.get(i)? != 0xFF {
            return None;
        }
        // Markers may be preceded by any number of 0xFF fill bytes
        while *buf.get(i + 1)? == 0xFF {
            i += 1;
        }
        let marker = *buf.get(i + 1)?;

        match marker {
            0xD9 | 0xDA => return None,
            // Standalone markers carry no length field
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let len = read_u16_be(buf, i + 2)? as usize;
        if len < 2 {
            return None;
        }

        if is_sof_marker(marker) {
            // length(2) precision(1) height(2) width(2)
            let height = read_u16_be(buf, i + 5)?;
            let width = read_u16_be(buf, i + 7)?;
            return Some((u32::from(width), u32::from(height)));
        }

        i += 2 + len;
    }
}

fn is_sof_marker(marker: u8) -> bool {
    matches!(
        marker,
        0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF
    )
}

/// PNG dimensions from the `IHDR` chunk, which must start at offset 12
#[must_use]
pub fn png_dimensions(buf: &[u8]) -> Option<(u32, u32)> {
    if buf.len() < 24 || !buf.starts_with(&PNG_SIGNATURE) || &buf[12..16] != b"IHDR" {
        return None;
    }
    let width = read_u32_be(buf, 16)?;
    let height = read_u32_be(buf, 20)?;
    Some((width, height))
}

/// WebP dimensions from an extended-format `VP8X` chunk
///
/// Canvas width and height are stored as 24-bit little-endian values minus one.
#[must_use]
pub fn webp_dimensions(buf: &[u8]) -> Option<(u32, u32)> {
    if buf.len() < 30 || &buf[0..4] != b"RIFF" || &buf[8..12] != b"WEBP" {
        return None;
    }
    if &buf[12..16] != b"VP8X" {
        return None;
    }
    let width = read_u24_le(buf, 24)? + 1;
    let height = read_u24_le(buf, 27)? + 1;
    Some((width, height))
}

fn read_u16_be(buf: &[u8], at: usize) -> Option<u16> {
    let bytes = buf.get(at..at + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32_be(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u24_le(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 3)?;
    Some(u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16)
}
