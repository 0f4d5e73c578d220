//! Append-only revisions.
//!
//! An [`IncrementalUpdate`] copies the original file byte for byte, appends
//! new or replaced objects, and finishes with a cross-reference section in
//! the same syntax the source used (table or stream) plus a trailer whose
//! `/Prev` points at the previous section. Files whose cross-reference
//! chain had to be reconstructed get a complete table and no `/Prev`.

use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::object_serializer::ObjectSerializer;
use crate::xref::{XRefEntry, XRefKind};
use rand::RngCore;
use std::collections::{BTreeMap, HashMap};

/// Highest object number a PDF may use.
const MAX_OBJECT_ID: u32 = 8_388_607;

/// Bytes of a finished revision and where each appended object starts.
#[derive(Debug)]
pub struct WrittenUpdate {
    /// The complete new file
    pub bytes: Vec<u8>,
    /// Offset of each appended object's `N G obj` header
    pub offsets: HashMap<ObjectRef, usize>,
}

/// Builder for one incremental revision of a document.
pub struct IncrementalUpdate<'a> {
    document: &'a PdfDocument,
    serializer: ObjectSerializer,
    next_id: u32,
    objects: BTreeMap<ObjectRef, Vec<u8>>,
}

impl<'a> IncrementalUpdate<'a> {
    /// Start a revision on top of `document`.
    ///
    /// Fails when the document already uses object numbers past the PDF
    /// limit of 8,388,607.
    pub fn new(document: &'a PdfDocument) -> Result<Self> {
        let size = document.xref().size().max(1);
        if size > MAX_OBJECT_ID {
            return Err(Error::InvalidPdf(format!(
                "cross-reference /Size {} is past the object number limit",
                size
            )));
        }
        Ok(Self {
            document,
            serializer: ObjectSerializer::new(),
            next_id: size,
            objects: BTreeMap::new(),
        })
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        r
    }

    /// Add or replace an object.
    pub fn put(&mut self, r: ObjectRef, object: &Object) {
        let bytes = self.serializer.serialize(object);
        self.objects.insert(r, bytes);
    }

    /// Add or replace an object given as raw PDF syntax.
    pub fn put_raw(&mut self, r: ObjectRef, body: Vec<u8>) {
        self.objects.insert(r, body);
    }

    /// Number of objects queued so far.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Assemble the new file.
    pub fn write(mut self) -> Result<WrittenUpdate> {
        if self.objects.is_empty() {
            return Err(Error::InvalidPdf("incremental update has no objects".to_string()));
        }
        let document = self.document;
        let xref = document.xref();
        let use_stream = xref.kind() == XRefKind::Stream && !xref.is_reconstructed();
        let xref_stream_ref = use_stream.then(|| self.allocate());

        let mut out = document.data().to_vec();
        if !out.ends_with(b"\n") && !out.ends_with(b"\r") {
            out.push(b'\n');
        }

        let mut offsets = HashMap::new();
        for (r, body) in &self.objects {
            offsets.insert(*r, out.len());
            out.extend_from_slice(&ObjectSerializer::wrap_indirect(*r, body));
        }

        let mut entries: BTreeMap<u32, (u64, u16)> = offsets
            .iter()
            .map(|(r, off)| (r.id, (*off as u64, r.gen)))
            .collect();
        if xref.is_reconstructed() {
            for (id, entry) in xref.entries() {
                if let XRefEntry::InUse { offset, gen } = entry {
                    entries.entry(id).or_insert((offset, gen));
                }
            }
        }

        let trailer = self.trailer(self.next_id)?;
        let section_start = out.len();
        match xref_stream_ref {
            Some(stream_ref) => {
                entries.insert(stream_ref.id, (section_start as u64, 0));
                let stream = xref_stream(&entries, trailer);
                out.extend_from_slice(&self.serializer.serialize_indirect(stream_ref, &stream));
            },
            None => {
                out.extend_from_slice(&xref_table(&entries, xref.is_reconstructed()));
                out.extend_from_slice(b"trailer\n");
                out.extend_from_slice(&self.serializer.serialize(&Object::Dictionary(trailer)));
                out.push(b'\n');
            },
        }
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", section_start).as_bytes());

        log::debug!(
            "incremental update: {} object(s), {:?} xref at {}",
            offsets.len(),
            if use_stream { XRefKind::Stream } else { XRefKind::Table },
            section_start
        );
        Ok(WrittenUpdate { bytes: out, offsets })
    }

    fn trailer(&self, size: u32) -> Result<Dictionary> {
        let old = self.document.trailer();
        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(size as i64));
        trailer.insert(
            "Root".to_string(),
            Object::Reference(self.document.catalog_ref()?),
        );
        if let Some(info) = old.get("Info") {
            trailer.insert("Info".to_string(), info.clone());
        }
        if !self.document.xref().is_reconstructed() {
            trailer.insert(
                "Prev".to_string(),
                Object::Integer(self.document.xref().startxref() as i64),
            );
        }

        let mut fresh = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut fresh);
        let permanent = old
            .get("ID")
            .and_then(Object::as_array)
            .and_then(|ids| ids.first())
            .and_then(Object::as_string)
            .map(<[u8]>::to_vec)
            .unwrap_or_else(|| fresh.to_vec());
        trailer.insert(
            "ID".to_string(),
            Object::Array(vec![Object::String(permanent), Object::String(fresh.to_vec())]),
        );
        Ok(trailer)
    }
}

/// Consecutive object numbers grouped into `(first, count)` runs.
fn subsections(ids: impl Iterator<Item = u32>) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for id in ids {
        match runs.last_mut() {
            Some((first, count)) if *first + *count == id => *count += 1,
            _ => runs.push((id, 1)),
        }
    }
    runs
}

fn xref_table(entries: &BTreeMap<u32, (u64, u16)>, with_free_head: bool) -> Vec<u8> {
    let mut out = b"xref\n".to_vec();
    if with_free_head {
        out.extend_from_slice(b"0 1\n0000000000 65535 f \n");
    }
    for (first, count) in subsections(entries.keys().copied().filter(|id| *id != 0)) {
        out.extend_from_slice(format!("{} {}\n", first, count).as_bytes());
        for id in first..first + count {
            if let Some((offset, gen)) = entries.get(&id) {
                out.extend_from_slice(format!("{:010} {:05} n \n", offset, gen).as_bytes());
            }
        }
    }
    out
}

fn xref_stream(entries: &BTreeMap<u32, (u64, u16)>, mut dict: Dictionary) -> Object {
    let max_offset = entries.values().map(|(o, _)| *o).max().unwrap_or(0);
    let offset_width: usize = if max_offset <= u32::MAX as u64 { 4 } else { 8 };

    let mut index = Vec::new();
    let mut data = Vec::new();
    for (first, count) in subsections(entries.keys().copied()) {
        index.push(Object::Integer(first as i64));
        index.push(Object::Integer(count as i64));
        for id in first..first + count {
            if let Some((offset, gen)) = entries.get(&id) {
                data.push(1u8);
                data.extend_from_slice(&offset.to_be_bytes()[8 - offset_width..]);
                data.extend_from_slice(&gen.to_be_bytes());
            }
        }
    }

    dict.insert("Type".to_string(), Object::name("XRef"));
    dict.insert(
        "W".to_string(),
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(offset_width as i64),
            Object::Integer(2),
        ]),
    );
    dict.insert("Index".to_string(), Object::Array(index));
    Object::Stream {
        dict,
        data: bytes::Bytes::from(data),
    }
}
