//! Stream filters needed to read cross-reference and object streams.
//!
//! Only `FlateDecode` (with PNG/TIFF predictors) and `ASCIIHexDecode` are
//! supported. Anything else surfaces as [`Error::UnsupportedFilter`]; the
//! signer and verifier never need to look inside content streams.

use crate::error::{Error, Result};
use crate::object::Dictionary;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// Upper bound on a single decoded stream.
const MAX_DECODED_SIZE: u64 = 64 * 1024 * 1024;

/// `/DecodeParms` entries relevant to predictors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Read predictor parameters from a `/DecodeParms` dictionary.
    pub fn from_dict(dict: &Dictionary) -> Self {
        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|o| o.as_integer())
                .unwrap_or(default)
        };
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).max(1) as usize,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
        }
    }

    /// Bytes in one row of samples, rejecting rows longer than `data`.
    fn row_len(&self, data: &[u8]) -> Result<usize> {
        let row_len = self
            .columns
            .checked_mul(self.colors)
            .and_then(|samples| samples.checked_mul(self.bits_per_component))
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| Error::Decode(format!("predictor row of {} columns overflows", self.columns)))?;
        if row_len > data.len() {
            return Err(Error::Decode(format!(
                "predictor row of {} bytes exceeds the {} byte stream",
                row_len,
                data.len()
            )));
        }
        Ok(row_len)
    }

    fn bytes_per_pixel(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .map(|bits| bits.div_ceil(8).max(1))
            .ok_or_else(|| Error::Decode(format!("{} colors per pixel overflows", self.colors)))
    }
}

/// Decode `data` through `filters` in order, applying `params` after the
/// first Flate stage.
pub fn decode_stream(data: &[u8], filters: &[String], params: Option<&DecodeParams>) -> Result<Vec<u8>> {
    let mut current = data.to_vec();
    for filter in filters {
        current = match filter.as_str() {
            "FlateDecode" | "Fl" => {
                let inflated = inflate(&current)?;
                match params {
                    Some(p) if p.predictor > 1 => decode_predictor(&inflated, p)?,
                    _ => inflated,
                }
            },
            "ASCIIHexDecode" | "AHx" => decode_ascii_hex(&current)?,
            other => return Err(Error::UnsupportedFilter(other.to_string())),
        };
    }
    Ok(current)
}

/// Inflate zlib data, falling back to a raw deflate stream when the zlib
/// header is damaged.
fn inflate(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    match ZlibDecoder::new(input)
        .take(MAX_DECODED_SIZE)
        .read_to_end(&mut output)
    {
        Ok(_) => return Ok(output),
        Err(e) if !output.is_empty() => {
            log::warn!("FlateDecode recovered {} bytes before error: {}", output.len(), e);
            return Ok(output);
        },
        Err(e) => log::debug!("zlib inflate failed ({}), retrying as raw deflate", e),
    }

    output.clear();
    DeflateDecoder::new(input)
        .take(MAX_DECODED_SIZE)
        .read_to_end(&mut output)
        .map_err(|e| Error::Decode(format!("FlateDecode failed: {}", e)))?;
    Ok(output)
}

fn decode_ascii_hex(input: &[u8]) -> Result<Vec<u8>> {
    let mut digits: Vec<u8> = Vec::with_capacity(input.len());
    for &b in input {
        match b {
            b'>' => break,
            b if b.is_ascii_whitespace() || b == 0 => continue,
            b if b.is_ascii_hexdigit() => digits.push(b),
            other => {
                return Err(Error::Decode(format!("invalid ASCIIHex digit 0x{:02X}", other)));
            },
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(b'0');
    }
    Ok(digits
        .chunks(2)
        .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
        .collect())
}

fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => 0,
    }
}

/// Reverse a TIFF or PNG predictor.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff_predictor(data, params),
        10..=15 => decode_png_predictor(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_len(data)?;
    let mut output = data.to_vec();
    for row in output.chunks_mut(row_len) {
        for i in params.colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - params.colors]);
        }
    }
    Ok(output)
}

fn decode_png_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_len(data)?;
    let bpp = params.bytes_per_pixel()?;
    let mut output = Vec::with_capacity(data.len());
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks(row_len + 1) {
        if chunk.len() < 2 {
            break;
        }
        let tag = chunk[0];
        let mut row = chunk[1..].to_vec();
        row.resize(row_len, 0);

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => return Err(Error::Decode(format!("Invalid PNG filter type {}", other))),
            };
            row[i] = row[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        previous = row;
    }
    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
