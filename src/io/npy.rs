// SPDX-License-Identifier: GPL-3.0-only

//! Minimal NumPy `.npy` codec for 2-D float arrays
//!
//! Writes version 1.0 files (`<f4`, C order). Reads versions 1.x, 2.x and
//! 3.x with `<f4` or `<f8` data.

use crate::errors::{AppError, AppResult};

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

/// Encode an `height x width` row-major float32 array
pub fn encode_f32(data: &[f32], width: u32, height: u32) -> AppResult<Vec<u8>> {
    if data.len() != width as usize * height as usize {
        return Err(AppError::input(format!(
            "NPY data has {} samples, expected {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        height, width
    );
    // magic + version + u16 length + header + '\n' lands on the alignment
    let preamble = MAGIC.len() + 2 + 2;
    let unpadded = preamble + header.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    let header_len = u16::try_from(header.len())
        .map_err(|_| AppError::input("NPY header too long"))?;

    let mut out = Vec::with_capacity(preamble + header.len() + data.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

/// Decoded 2-D array: `(width, height, row-major samples)`
pub fn decode_f32(bytes: &[u8]) -> AppResult<(u32, u32, Vec<f32>)> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(AppError::input("invalid NPY magic number"));
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(AppError::input("truncated NPY header"));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(AppError::input(format!("unsupported NPY version {}", v))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .and_then(|h| std::str::from_utf8(h).ok())
        .ok_or_else(|| AppError::input("truncated NPY header"))?;

    let descr = dict_value(header, "descr")
        .ok_or_else(|| AppError::input("NPY header has no descr"))?;
    let sample_size = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => 4,
        "<f8" => 8,
        other => {
            return Err(AppError::input(format!("unsupported NPY dtype {}", other)));
        }
    };

    if dict_value(header, "fortran_order").is_some_and(|v| v.starts_with("True")) {
        return Err(AppError::input("Fortran-ordered NPY arrays are not supported"));
    }

    let (height, width) = parse_shape(header)?;
    let short = || AppError::input("NPY payload is shorter than its shape");
    let data_end = (width as usize)
        .checked_mul(height as usize)
        .and_then(|count| count.checked_mul(sample_size))
        .and_then(|len| data_start.checked_add(len))
        .ok_or_else(short)?;
    let payload = bytes.get(data_start..data_end).ok_or_else(short)?;

    let data = if sample_size == 4 {
        payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        payload
            .chunks_exact(8)
            .map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                f64::from_le_bytes(b) as f32
            })
            .collect()
    };

    Ok((width, height, data))
}

/// Text of the value stored under `'key':` in the header dict
///
/// The value ends at the first `,` or `}` outside quotes and parentheses.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{}':", key);
    let start = header.find(&pattern)? + pattern.len();
    let rest = &header[start..];

    let mut quote = None;
    let mut depth = 0usize;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',' | '}') if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    Some(rest[..end].trim())
}

fn parse_shape(header: &str) -> AppResult<(u32, u32)> {
    let invalid = || AppError::input("invalid shape in NPY header");
    let value = dict_value(header, "shape").ok_or_else(invalid)?;
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.split(')').next())
        .ok_or_else(invalid)?;

    let dims: Vec<u32> = inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|_| invalid()))
        .collect::<AppResult<_>>()?;

    match dims.as_slice() {
        [h, w] if *h > 0 && *w > 0 => Ok((*h, *w)),
        [h, w, 1] if *h > 0 && *w > 0 => Ok((*h, *w)),
        _ => Err(invalid()),
    }
}
