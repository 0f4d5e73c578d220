//! Cross-reference parsing.
//!
//! Reads classic `xref` tables and PDF 1.5 cross-reference streams, follows
//! `/Prev` chains (and `/XRefStm` in hybrid files), and falls back to a
//! linear scan for `N G obj` headers when the chain is broken.
//!
//! Sections are visited newest first; the first entry seen for an object
//! number wins, so later revisions shadow earlier ones.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object, rfind};
use std::collections::{HashMap, HashSet};

/// Maximum number of sections followed through `/Prev`.
const MAX_SECTIONS: usize = 256;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Deleted or never used
    Free,
    /// Stored directly in the file at `offset`
    InUse {
        /// Byte offset of the `N G obj` header
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Stored inside an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream: u32,
        /// Index within the stream
        index: u32,
    },
}

/// Syntax of the newest cross-reference section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefKind {
    /// `xref` keyword table followed by `trailer`
    Table,
    /// `/Type /XRef` stream
    Stream,
}

/// Merged view of every cross-reference section in a file.
#[derive(Debug, Clone)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
    kind: XRefKind,
    startxref: u64,
    reconstructed: bool,
}

impl CrossRefTable {
    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<XRefEntry> {
        self.entries.get(&id).copied()
    }

    /// Merged trailer dictionary (newest keys win).
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Syntax of the newest section.
    pub fn kind(&self) -> XRefKind {
        self.kind
    }

    /// Offset named by the final `startxref`.
    pub fn startxref(&self) -> u64 {
        self.startxref
    }

    /// Whether the table was rebuilt by scanning the file.
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// All entries, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(id, e)| (*id, *e))
    }

    /// One past the highest object number in use, never less than `/Size`.
    pub fn size(&self) -> u32 {
        let declared = self
            .trailer
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .max(0) as u32;
        let highest = self.entries.keys().max().map(|id| id.saturating_add(1)).unwrap_or(1);
        declared.max(highest)
    }
}

/// Read the offset after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<u64> {
    let tail_start = data.len().saturating_sub(4096);
    let pos = rfind(&data[tail_start..], b"startxref")
        .map(|p| tail_start + p)
        .or_else(|| rfind(data, b"startxref"))
        .ok_or(Error::InvalidXref)?;
    match token(&data[pos + b"startxref".len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 && (offset as usize) < data.len() => {
            Ok(offset as u64)
        },
        _ => Err(Error::InvalidXref),
    }
}

/// Parse all cross-reference information in `data`.
pub fn parse_xref(data: &[u8]) -> Result<CrossRefTable> {
    match parse_chain(data) {
        Ok(table) => Ok(table),
        Err(e) => {
            log::warn!("cross-reference chain unusable ({}), scanning file for objects", e);
            reconstruct(data)
        },
    }
}

fn parse_chain(data: &[u8]) -> Result<CrossRefTable> {
    let startxref = find_xref_offset(data)?;
    let mut entries = HashMap::new();
    let mut trailer = Dictionary::new();
    let mut kind = None;
    let mut visited = HashSet::new();
    let mut next = Some(startxref);

    while let Some(offset) = next {
        if !visited.insert(offset) || visited.len() > MAX_SECTIONS {
            return Err(Error::InvalidPdf(format!("cyclic /Prev chain at offset {}", offset)));
        }
        let (section, section_trailer, section_kind) = parse_section(data, offset)?;
        log::debug!(
            "xref section at {}: {:?}, {} entries",
            offset,
            section_kind,
            section.len()
        );
        kind.get_or_insert(section_kind);
        for (id, entry) in section {
            entries.entry(id).or_insert(entry);
        }
        next = section_trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .map(|p| p.max(0) as u64);
        for (key, value) in section_trailer {
            trailer.entry(key).or_insert(value);
        }
    }
    trailer.remove("Prev");
    trailer.remove("XRefStm");

    Ok(CrossRefTable {
        entries,
        trailer,
        kind: kind.unwrap_or(XRefKind::Table),
        startxref,
        reconstructed: false,
    })
}

type Section = (Vec<(u32, XRefEntry)>, Dictionary, XRefKind);

fn parse_section(data: &[u8], offset: u64) -> Result<Section> {
    let input = data.get(offset as usize..).ok_or(Error::InvalidXref)?;
    match token(input) {
        Ok((rest, Token::Keyword(b"xref"))) => {
            let (mut entries, trailer) = parse_table(rest)?;
            // Hybrid file: the stream's entries complete this section.
            if let Some(stm) = trailer.get("XRefStm").and_then(Object::as_integer) {
                let (stream_entries, _) = parse_stream_section(data, stm.max(0) as u64)?;
                let listed: HashSet<u32> = stream_entries.iter().map(|(id, _)| *id).collect();
                entries.retain(|(id, e)| !(listed.contains(id) && *e == XRefEntry::Free));
                let present: HashSet<u32> = entries.iter().map(|(id, _)| *id).collect();
                entries.extend(stream_entries.into_iter().filter(|(id, _)| !present.contains(id)));
            }
            Ok((entries, trailer, XRefKind::Table))
        },
        Ok((_, Token::Integer(_))) => {
            let (entries, dict) = parse_stream_section(data, offset)?;
            Ok((entries, dict, XRefKind::Stream))
        },
        _ => Err(Error::InvalidXref),
    }
}

fn next_int(input: &[u8]) -> Result<(&[u8], i64)> {
    match token(input) {
        Ok((rest, Token::Integer(i))) => Ok((rest, i)),
        _ => Err(Error::InvalidXref),
    }
}

fn parse_table(mut input: &[u8]) -> Result<(Vec<(u32, XRefEntry)>, Dictionary)> {
    let mut entries = Vec::new();
    loop {
        if let Ok((rest, Token::Keyword(b"trailer"))) = token(input) {
            let (_, trailer) = crate::parser::parse_object(rest)
                .map_err(|_| Error::InvalidPdf("unparseable trailer dictionary".to_string()))?;
            let Object::Dictionary(trailer) = trailer else {
                return Err(Error::InvalidPdf("trailer is not a dictionary".to_string()));
            };
            return Ok((entries, trailer));
        }

        let (rest, first) = next_int(input)?;
        let (rest, count) = next_int(rest)?;
        if first < 0 || !(0..=10_000_000).contains(&count) {
            return Err(Error::InvalidXref);
        }
        input = rest;
        for i in 0..count {
            let (rest, offset) = next_int(input)?;
            let (rest, gen) = next_int(rest)?;
            let (rest, flag) = token(rest).map_err(|_| Error::InvalidXref)?;
            let entry = match flag {
                Token::Keyword(b"n") => XRefEntry::InUse {
                    offset: offset.max(0) as u64,
                    gen: gen.clamp(0, u16::MAX as i64) as u16,
                },
                Token::Keyword(b"f") => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            entries.push((object_id(first, i)?, entry));
            input = rest;
        }
    }
}

fn parse_stream_section(data: &[u8], offset: u64) -> Result<(Vec<(u32, XRefEntry)>, Dictionary)> {
    let input = data.get(offset as usize..).ok_or(Error::InvalidXref)?;
    let (_, (_, object)) = parse_indirect_object(input).map_err(|_| Error::ParseError {
        offset: offset as usize,
        reason: "expected cross-reference stream object".to_string(),
    })?;
    if !object.has_name("Type", "XRef") {
        return Err(Error::InvalidPdf(format!("object at {} is not /Type /XRef", offset)));
    }
    let decoded = object.decode_stream_data()?;
    let dict = object.as_dict().cloned().unwrap_or_default();

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| {
            w.iter()
                .map(|o| o.as_integer().unwrap_or(0).clamp(0, 8) as usize)
                .collect()
        })
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidPdf("empty /W array in xref stream".to_string()));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
        Some(arr) => arr.iter().filter_map(Object::as_integer).collect(),
        None => vec![0, size],
    };

    let mut rows = decoded.chunks_exact(row_len);
    let mut entries = Vec::new();
    for pair in index.chunks(2) {
        let [first, count] = pair else {
            break;
        };
        for i in 0..(*count).max(0) {
            let Some(row) = rows.next() else {
                break;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { read_be(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: read_be(f2),
                    gen: read_be(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream: read_be(f2) as u32,
                    index: read_be(f3) as u32,
                },
                _ => continue,
            };
            entries.push((object_id(*first, i)?, entry));
        }
    }
    Ok((entries, dict))
}

/// Object number `first + i` of a subsection, if it is a valid id.
fn object_id(first: i64, i: i64) -> Result<u32> {
    first
        .checked_add(i)
        .and_then(|id| u32::try_from(id).ok())
        .ok_or(Error::InvalidXref)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Rebuild the table by scanning for object headers at line starts.
fn reconstruct(data: &[u8]) -> Result<CrossRefTable> {
    let mut entries = HashMap::new();
    let mut catalog = None;
    let mut pos = 0;
    while pos < data.len() {
        let at_line_start = pos == 0 || matches!(data[pos - 1], b'\n' | b'\r');
        if at_line_start && data[pos].is_ascii_digit() {
            if let Ok((rest, (r, object))) = parse_indirect_object(&data[pos..]) {
                entries.insert(
                    r.id,
                    XRefEntry::InUse {
                        offset: pos as u64,
                        gen: r.gen,
                    },
                );
                if object.has_name("Type", "Catalog") {
                    catalog = Some(r);
                }
                pos = data.len() - rest.len();
                continue;
            }
        }
        pos += 1;
    }
    if entries.is_empty() {
        return Err(Error::InvalidXref);
    }

    let mut trailer = rfind(data, b"trailer")
        .and_then(|p| crate::parser::parse_object(&data[p + b"trailer".len()..]).ok())
        .and_then(|(_, o)| match o {
            Object::Dictionary(d) => Some(d),
            _ => None,
        })
        .unwrap_or_default();
    if !trailer.contains_key("Root") {
        let root = catalog.ok_or_else(|| Error::InvalidPdf("no document catalog found".to_string()))?;
        trailer.insert("Root".to_string(), Object::Reference(root));
    }
    trailer.remove("Prev");
    trailer.remove("XRefStm");
    log::info!("reconstructed cross-reference table with {} objects", entries.len());

    Ok(CrossRefTable {
        entries,
        trailer,
        kind: XRefKind::Table,
        startxref: 0,
        reconstructed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic() -> Vec<u8> {
        let mut pdf = b"%PDF-1.4\n".to_vec();
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let o2 = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n{:010} 00000 n \n", o1, o2).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());
        pdf
    }

    #[test]
    fn test_find_xref_offset() {
        let pdf = classic();
        let offset = find_xref_offset(&pdf).unwrap() as usize;
        assert!(pdf[offset..].starts_with(b"xref"));
    }

    #[test]
    fn test_find_xref_offset_missing() {
        assert!(matches!(find_xref_offset(b"%PDF-1.4\n"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_parse_classic_table() {
        let pdf = classic();
        let table = parse_xref(&pdf).unwrap();
        assert_eq!(table.kind(), XRefKind::Table);
        assert!(!table.is_reconstructed());
        assert_eq!(table.get(0), Some(XRefEntry::Free));
        assert!(matches!(table.get(1), Some(XRefEntry::InUse { gen: 0, .. })));
        assert_eq!(table.size(), 3);
        assert!(table.trailer().contains_key("Root"));
    }

    #[test]
    fn test_newer_section_wins() {
        let mut pdf = classic();
        let prev = find_xref_offset(&pdf).unwrap();
        let o1 = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Lang (en) >>\nendobj\n");
        let xref = pdf.len();
        pdf.extend_from_slice(format!("xref\n1 1\n{:010} 00000 n \n", o1).as_bytes());
        pdf.extend_from_slice(format!("trailer\n<< /Size 3 /Root 1 0 R /Prev {} >>\n", prev).as_bytes());
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref).as_bytes());

        let table = parse_xref(&pdf).unwrap();
        assert_eq!(
            table.get(1),
            Some(XRefEntry::InUse {
                offset: o1 as u64,
                gen: 0
            })
        );
        assert!(table.get(2).is_some());
        assert!(!table.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_broken_offset_triggers_reconstruction() {
        let mut pdf = classic();
        let pos = rfind(&pdf, b"startxref").unwrap();
        pdf.truncate(pos);
        pdf.extend_from_slice(b"startxref\n3\n%%EOF\n");
        let table = parse_xref(&pdf).unwrap();
        assert!(table.is_reconstructed());
        assert!(matches!(table.get(2), Some(XRefEntry::InUse { .. })));
    }

    #[test]
    fn test_out_of_range_subsection_triggers_reconstruction() {
        let pdf = classic();
        let at = crate::parser::find(&pdf, b"xref\n0 3\n").unwrap();
        let mut forged = pdf[..at].to_vec();
        forged.extend_from_slice(b"xref\n9223372036854775807 3\n");
        forged.extend_from_slice(&pdf[at + b"xref\n0 3\n".len()..]);

        let table = parse_xref(&forged).unwrap();
        assert!(table.is_reconstructed());
        assert!(matches!(table.get(1), Some(XRefEntry::InUse { .. })));
    }

    #[test]
    fn test_object_id_bounds() {
        assert_eq!(object_id(5, 2).unwrap(), 7);
        assert!(matches!(object_id(i64::MAX, 1), Err(Error::InvalidXref)));
        assert!(matches!(object_id(u32::MAX as i64, 1), Err(Error::InvalidXref)));
        assert!(matches!(object_id(-1, 0), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_read_be() {
        assert_eq!(read_be(&[0x01, 0x02]), 0x0102);
        assert_eq!(read_be(&[]), 0);
    }
}
