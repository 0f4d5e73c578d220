//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset where the signature value begins
//! - `offset2` = byte offset where the signature value ends
//! - `length2` = remaining bytes to end of file
//!
//! The signature value is a hex-encoded string within `<` and `>` delimiters.
//! Both the array and the hex string are written as fixed-width
//! placeholders first and patched in place, so no offset moves.

use crate::error::{Error, Result};
use crate::parser::find;

/// Fixed-width `/ByteRange` value written before offsets are known.
pub const BYTE_RANGE_PLACEHOLDER: &str = "[0 0000000000 0000000000 0000000000]";

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a new ByteRange calculator with the specified signature size.
    ///
    /// The placeholder size is `(signature_size * 2) + 2` because the
    /// signature is hex-encoded and enclosed in angle brackets.
    pub fn new(estimated_signature_size: usize) -> Self {
        Self {
            placeholder_size: estimated_signature_size * 2 + 2,
        }
    }

    /// Create a ByteRange calculator with a specific placeholder size.
    pub fn with_placeholder_size(placeholder_size: usize) -> Self {
        Self { placeholder_size }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// `<000...0>` filling the whole placeholder.
    pub fn generate_placeholder(&self) -> String {
        format!("<{}>", "0".repeat(self.placeholder_size - 2))
    }

    /// ByteRange for a file of `file_size` bytes whose `/Contents` value
    /// starts (at its `<`) at `contents_offset`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Overwrite the [`BYTE_RANGE_PLACEHOLDER`] following the `/ByteRange`
    /// key at or after `search_from`, padding with spaces after the `]`.
    pub fn patch_byte_range(pdf_data: &mut [u8], search_from: usize, byte_range: &[i64; 4]) -> Result<()> {
        let start = pdf_data
            .get(search_from..)
            .and_then(|tail| find(tail, b"/ByteRange "))
            .map(|pos| search_from + pos + b"/ByteRange ".len())
            .ok_or_else(|| Error::Signing("ByteRange placeholder not found".to_string()))?;
        let end = start + BYTE_RANGE_PLACEHOLDER.len();
        if pdf_data.get(start..end) != Some(BYTE_RANGE_PLACEHOLDER.as_bytes()) {
            return Err(Error::Signing("ByteRange placeholder is damaged".to_string()));
        }

        let formatted = Self::format_byte_range(byte_range);
        if formatted.len() > BYTE_RANGE_PLACEHOLDER.len() {
            return Err(Error::Signing(format!("ByteRange {} does not fit its placeholder", formatted)));
        }
        let padded = format!("{:<width$}", formatted, width = BYTE_RANGE_PLACEHOLDER.len());
        pdf_data[start..end].copy_from_slice(padded.as_bytes());
        Ok(())
    }

    /// Extract the bytes to be signed from a PDF file.
    ///
    /// This returns the concatenation of the two ranges specified by ByteRange.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        if byte_range.iter().any(|v| *v < 0) {
            return Err(Error::InvalidPdf(format!("negative ByteRange value in {:?}", byte_range)));
        }
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        let first = offset1
            .checked_add(length1)
            .and_then(|end| pdf_data.get(offset1..end))
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange first range exceeds file size: {} + {} > {}",
                    offset1,
                    length1,
                    pdf_data.len()
                ))
            })?;
        let second = offset2
            .checked_add(length2)
            .and_then(|end| pdf_data.get(offset2..end))
            .ok_or_else(|| {
                Error::InvalidPdf(format!(
                    "ByteRange second range exceeds file size: {} + {} > {}",
                    offset2,
                    length2,
                    pdf_data.len()
                ))
            })?;

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(first);
        signed_bytes.extend_from_slice(second);
        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers the entire document except one hex
    /// string, and return that string's contents.
    ///
    /// A valid ByteRange:
    /// - starts at offset 0
    /// - ends at the file size
    /// - leaves exactly one gap, which is a `<...>` hex string
    pub fn validate_byte_range<'a>(byte_range: &[i64; 4], pdf_data: &'a [u8]) -> Result<&'a [u8]> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        if length1 < 0 || offset2 < 0 || length2 < 0 {
            return Err(Error::InvalidPdf(format!("negative ByteRange value in {:?}", byte_range)));
        }

        let expected_end = pdf_data.len() as i64;
        let actual_end = offset2
            .checked_add(length2)
            .ok_or_else(|| Error::InvalidPdf(format!("ByteRange {:?} overflows", byte_range)))?;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }

        if length1.checked_add(2).map_or(true, |min_start| min_start > offset2) {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }

        let gap = &pdf_data[length1 as usize..offset2 as usize];
        let hex = &gap[1..gap.len() - 1];
        let well_formed = gap.first() == Some(&b'<')
            && gap.last() == Some(&b'>')
            && hex.iter().all(u8::is_ascii_hexdigit);
        if !well_formed {
            return Err(Error::InvalidPdf(
                "ByteRange gap is not exactly the signature contents".to_string(),
            ));
        }
        Ok(hex)
    }

    /// Find the /Contents value position in a signature dictionary.
    ///
    /// This searches the object starting at `sig_dict_offset` for
    /// `/Contents` followed by optional whitespace and `<`, and returns the
    /// offset of the opening angle bracket.
    pub fn find_contents_offset(pdf_data: &[u8], sig_dict_offset: usize) -> Option<usize> {
        let window = pdf_data.get(sig_dict_offset..)?;
        let window = &window[..find(window, b"endobj").unwrap_or(window.len())];

        let mut from = 0;
        while let Some(pos) = find(&window[from..], b"/Contents") {
            let after = from + pos + b"/Contents".len();
            let value = window[after..]
                .iter()
                .position(|b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
                .map(|skip| after + skip);
            if let Some(value) = value {
                if window[value] == b'<' && window.get(value + 1) != Some(&b'<') {
                    return Some(sig_dict_offset + value);
                }
            }
            from = after;
        }
        None
    }

    /// Replace the placeholder in the PDF with the actual signature.
    ///
    /// The hex is padded with zeros to fill the placeholder.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, signature_hex: &str) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::Signing(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }

        let mut sig_value = String::with_capacity(self.placeholder_size);
        sig_value.push('<');
        sig_value.push_str(signature_hex);
        let padding_needed = (self.placeholder_size - 2) - signature_hex.len();
        sig_value.extend(std::iter::repeat('0').take(padding_needed));
        sig_value.push('>');

        let region = pdf_data
            .get_mut(contents_offset..contents_offset + self.placeholder_size)
            .ok_or_else(|| Error::Signing("Signature insertion would exceed file bounds".to_string()))?;
        if region.first() != Some(&b'<') || region.last() != Some(&b'>') {
            return Err(Error::Signing("Contents placeholder is damaged".to_string()));
        }
        region.copy_from_slice(sig_value.as_bytes());
        Ok(())
    }
}

impl Default for ByteRangeCalculator {
    fn default() -> Self {
        Self::new(8192)
    }
}
