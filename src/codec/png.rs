// Phase 1: RGBA samples -> PNG container (IHDR / IDAT / IEND)

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::error::A11yError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// IHDR color type for 8-bit truecolor with alpha.
const COLOR_TYPE_RGBA: u8 = 6;

const CRC_TABLE: [u32; 256] = build_crc_table();

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

/// CRC-32 (IEEE 802.3) as used by PNG chunk trailers.
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32_update(0xFFFF_FFFF, bytes) ^ 0xFFFF_FFFF
}

fn crc32_update(mut crc: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        crc = CRC_TABLE[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// Append one length-prefixed, type-tagged, CRC-terminated chunk.
fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) -> crate::error::Result<()> {
    let len = u32::try_from(data.len()).map_err(|_| {
        A11yError::image_xobject(format!("PNG chunk too large: {} bytes", data.len()))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);

    let crc = crc32_update(crc32_update(0xFFFF_FFFF, chunk_type), data) ^ 0xFFFF_FFFF;
    out.extend_from_slice(&crc.to_be_bytes());
    Ok(())
}

/// Encode interleaved 8-bit RGBA samples as a single-frame PNG.
///
/// Every scanline gets filter type 0 (None); the filtered stream is
/// zlib-deflated into one IDAT chunk.
///
/// # Arguments
/// * `width`  - Image width in pixels (must be > 0)
/// * `height` - Image height in pixels (must be > 0)
/// * `rgba`   - Exactly `width * height * 4` bytes
pub fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> crate::error::Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(A11yError::image_xobject(format!(
            "PNG dimensions must be positive, got {}x{}",
            width, height
        )));
    }

    let row_len = (width as usize).checked_mul(4).ok_or_else(|| {
        A11yError::image_xobject(format!("Overflow computing PNG row size for width {}", width))
    })?;
    let expected_len = row_len.checked_mul(height as usize).ok_or_else(|| {
        A11yError::image_xobject(format!(
            "Overflow computing buffer size for {}x{} RGBA image",
            width, height
        ))
    })?;

    if rgba.len() != expected_len {
        return Err(A11yError::image_xobject(format!(
            "RGBA data size mismatch: expected {} bytes, got {}",
            expected_len,
            rgba.len()
        )));
    }

    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = COLOR_TYPE_RGBA;
    // compression, filter, interlace: all 0

    let mut filtered = Vec::with_capacity(expected_len + height as usize);
    for row in rgba.chunks_exact(row_len) {
        filtered.push(0);
        filtered.extend_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&filtered)
        .map_err(|e| A11yError::image_xobject(format!("PNG deflate error: {}", e)))?;
    let idat = encoder
        .finish()
        .map_err(|e| A11yError::image_xobject(format!("PNG deflate error: {}", e)))?;

    let mut out = Vec::with_capacity(PNG_SIGNATURE.len() + idat.len() + 64);
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr)?;
    write_chunk(&mut out, b"IDAT", &idat)?;
    write_chunk(&mut out, b"IEND", &[])?;
    Ok(out)
}
