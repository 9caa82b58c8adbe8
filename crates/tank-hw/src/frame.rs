//! Raw capture buffer decoding — YUYV and RGB24 into RGB24 frames.

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Convert packed YUYV (4:2:2) to interleaved RGB24 using BT.601 limited range.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U/V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    let pixels = width as usize * height as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(DecodeError::InvalidLength {
            format: "YUYV",
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

/// Copy an RGB24 buffer, trimming driver padding past the image.
pub fn rgb24_copy(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, DecodeError> {
    let expected = width as usize * height as usize * 3;
    if buf.len() < expected {
        return Err(DecodeError::InvalidLength {
            format: "RGB3",
            expected,
            actual: buf.len(),
        });
    }
    Ok(buf[..expected].to_vec())
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}
