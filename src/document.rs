//! Read-only view of a PDF file.
//!
//! [`PdfDocument`] keeps the whole file in memory, resolves indirect objects
//! through the merged cross-reference table, and exposes the few structures
//! signing and verification care about: the catalog, the page list, and the
//! AcroForm signature fields.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::{find, parse_indirect_object};
use crate::xref::{parse_xref, CrossRefTable, XRefEntry};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// How many references deep `resolve` follows before giving up.
const MAX_REFERENCE_DEPTH: usize = 32;

/// A signature form field whose `/V` is filled in.
#[derive(Debug, Clone)]
pub struct SignatureField {
    /// Fully qualified field name (`parent.child`)
    pub name: String,
    /// The field dictionary's own reference, when it is indirect
    pub field_ref: Option<ObjectRef>,
    /// Reference to the signature dictionary, when it is indirect
    pub value_ref: Option<ObjectRef>,
    /// The resolved signature dictionary (`/Type /Sig`)
    pub value: Dictionary,
}

/// An opened PDF document.
pub struct PdfDocument {
    data: Vec<u8>,
    version: String,
    xref: CrossRefTable,
    object_streams: RefCell<HashMap<u32, Vec<(u32, Option<Object>)>>>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("len", &self.data.len())
            .field("xref_kind", &self.xref.kind())
            .finish()
    }
}

impl PdfDocument {
    /// Read and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Parse a PDF held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let window = &data[..data.len().min(1024)];
        let header = find(window, b"%PDF-").ok_or_else(|| {
            let shown = String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned();
            Error::InvalidHeader(shown)
        })?;
        let version = data[header + 5..]
            .iter()
            .take_while(|c| c.is_ascii_digit() || **c == b'.')
            .map(|&c| c as char)
            .collect::<String>();

        let xref = parse_xref(&data)?;
        log::debug!(
            "opened PDF {} ({} bytes, {:?} xref, size {})",
            version,
            data.len(),
            xref.kind(),
            xref.size()
        );
        Ok(Self {
            data,
            version,
            xref,
            object_streams: RefCell::new(HashMap::new()),
        })
    }

    /// Raw file bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Header version, e.g. `"1.7"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Merged cross-reference table.
    pub fn xref(&self) -> &CrossRefTable {
        &self.xref
    }

    /// Merged trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Whether the trailer names an `/Encrypt` dictionary.
    pub fn is_encrypted(&self) -> bool {
        self.trailer().contains_key("Encrypt")
    }

    /// Load an indirect object.
    pub fn get_object(&self, r: ObjectRef) -> Result<Object> {
        match self.xref.get(r.id) {
            Some(XRefEntry::InUse { offset, .. }) => {
                let input = self
                    .data
                    .get(offset as usize..)
                    .ok_or(Error::ObjectNotFound(r.id, r.gen))?;
                let (_, (found, object)) =
                    parse_indirect_object(input).map_err(|_| Error::ParseError {
                        offset: offset as usize,
                        reason: format!("expected object {}", r),
                    })?;
                if found.id != r.id {
                    return Err(Error::ParseError {
                        offset: offset as usize,
                        reason: format!("expected object {}, found {}", r, found),
                    });
                }
                Ok(object)
            },
            Some(XRefEntry::Compressed { stream, index }) => self.get_compressed(r, stream, index),
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(r.id, r.gen)),
        }
    }

    fn get_compressed(&self, r: ObjectRef, stream: u32, index: u32) -> Result<Object> {
        if !self.object_streams.borrow().contains_key(&stream) {
            // Object streams may not themselves be compressed.
            let container = match self.xref.get(stream) {
                Some(XRefEntry::InUse { gen, .. }) => self.get_object(ObjectRef::new(stream, gen))?,
                _ => return Err(Error::ObjectNotFound(stream, 0)),
            };
            let objects = parse_object_stream(&container)?;
            self.object_streams.borrow_mut().insert(stream, objects);
        }

        let cache = self.object_streams.borrow();
        let objects = cache.get(&stream).ok_or(Error::ObjectNotFound(stream, 0))?;
        let by_index = objects
            .get(index as usize)
            .filter(|(id, _)| *id == r.id)
            .and_then(|(_, o)| o.clone());
        by_index
            .or_else(|| {
                objects
                    .iter()
                    .find(|(id, _)| *id == r.id)
                    .and_then(|(_, o)| o.clone())
            })
            .ok_or(Error::ObjectNotFound(r.id, r.gen))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        for _ in 0..MAX_REFERENCE_DEPTH {
            match current {
                Object::Reference(r) => current = self.get_object(r)?,
                direct => return Ok(direct),
            }
        }
        Err(Error::InvalidPdf("reference chain too deep".to_string()))
    }

    /// Resolve `object` and require a dictionary.
    pub fn resolve_dict(&self, object: &Object) -> Result<Dictionary> {
        match self.resolve(object)? {
            Object::Dictionary(d) | Object::Stream { dict: d, .. } => Ok(d),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<Dictionary> {
        self.resolve_dict(&Object::Reference(self.catalog_ref()?))
    }

    /// References to every page, in document order.
    pub fn pages(&self) -> Result<Vec<ObjectRef>> {
        let root = self
            .catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages reference".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(node_ref) = stack.pop() {
            if !visited.insert(node_ref) {
                log::warn!("page tree cycle at {}", node_ref);
                continue;
            }
            let node = self.resolve_dict(&Object::Reference(node_ref))?;
            let kids = match node.get("Kids") {
                Some(kids) => self.resolve(kids)?,
                None => Object::Null,
            };
            match kids.as_array() {
                Some(kids) if !node_is_page(&node) => {
                    stack.extend(kids.iter().rev().filter_map(Object::as_reference));
                },
                _ if node.get("Type").and_then(Object::as_name) == Some("Pages") => {},
                _ => pages.push(node_ref),
            }
        }
        Ok(pages)
    }

    /// The AcroForm dictionary, and its reference when it is indirect.
    pub fn acroform(&self) -> Result<Option<(Option<ObjectRef>, Dictionary)>> {
        let catalog = self.catalog()?;
        match catalog.get("AcroForm") {
            None => Ok(None),
            Some(Object::Reference(r)) => Ok(Some((Some(*r), self.resolve_dict(&Object::Reference(*r))?))),
            Some(Object::Dictionary(d)) => Ok(Some((None, d.clone()))),
            Some(other) => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Signature fields carrying a value, in field-tree order.
    pub fn signature_fields(&self) -> Result<Vec<SignatureField>> {
        let Some((_, acroform)) = self.acroform()? else {
            return Ok(Vec::new());
        };
        let fields = match acroform.get("Fields") {
            Some(fields) => self.resolve(fields)?,
            None => return Ok(Vec::new()),
        };

        let mut found = Vec::new();
        let mut visited = HashSet::new();
        for field in fields.as_array().map(Vec::as_slice).unwrap_or_default() {
            self.collect_signature_fields(field, "", None, &mut visited, &mut found)?;
        }
        log::debug!("found {} signed signature field(s)", found.len());
        Ok(found)
    }

    fn collect_signature_fields(
        &self,
        field: &Object,
        parent_name: &str,
        inherited_type: Option<&str>,
        visited: &mut HashSet<ObjectRef>,
        found: &mut Vec<SignatureField>,
    ) -> Result<()> {
        let field_ref = field.as_reference();
        if let Some(r) = field_ref {
            if !visited.insert(r) {
                return Ok(());
            }
        }
        let dict = match self.resolve_dict(field) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("skipping unreadable form field: {}", e);
                return Ok(());
            },
        };

        let name = match dict.get("T").and_then(Object::as_string) {
            Some(t) if parent_name.is_empty() => String::from_utf8_lossy(t).into_owned(),
            Some(t) => format!("{}.{}", parent_name, String::from_utf8_lossy(t)),
            None => parent_name.to_string(),
        };
        let field_type = dict.get("FT").and_then(Object::as_name).or(inherited_type);

        if field_type == Some("Sig") {
            if let Some(v) = dict.get("V") {
                let value = self.resolve_dict(v)?;
                found.push(SignatureField {
                    name: name.clone(),
                    field_ref,
                    value_ref: v.as_reference(),
                    value,
                });
            }
        }

        if let Some(kids) = dict.get("Kids") {
            let kids = self.resolve(kids)?;
            let owned_type = field_type.map(str::to_string);
            for kid in kids.as_array().map(Vec::as_slice).unwrap_or_default() {
                self.collect_signature_fields(kid, &name, owned_type.as_deref(), visited, found)?;
            }
        }
        Ok(())
    }
}

fn node_is_page(node: &Dictionary) -> bool {
    node.get("Type").and_then(Object::as_name) == Some("Page")
}
