//! PDF object serialization.
//!
//! Produces compact PDF syntax for objects appended by an incremental
//! update. Dictionary keys are emitted in sorted order so output is
//! deterministic.

use crate::object::{Dictionary, Object, ObjectRef};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an indirect object definition: `{id} {gen} obj\n...\nendobj\n`.
    pub fn serialize_indirect(&self, r: ObjectRef, obj: &Object) -> Vec<u8> {
        let body = self.serialize(obj);
        Self::wrap_indirect(r, &body)
    }

    /// Wrap already-serialized object syntax in an indirect definition.
    pub fn wrap_indirect(r: ObjectRef, body: &[u8]) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", r.id, r.gen).into_bytes();
        buf.extend_from_slice(body);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(items) => {
                buf.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_object(buf, item);
                }
                buf.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(buf, &dict);
                buf.extend_from_slice(b"\nstream\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();
        buf.extend_from_slice(b"<<");
        for key in keys {
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, &dict[key]);
            buf.push(b' ');
        }
        buf.extend_from_slice(b">>");
    }
}

/// Format a real with at most five decimals and no trailing zeros.
pub fn format_real(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return (value as i64).to_string();
    }
    let formatted = format!("{:.5}", value);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Literal syntax for printable text, hex syntax otherwise.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E));
    if printable {
        buf.extend_from_slice(escape_literal(data).as_bytes());
    } else {
        buf.push(b'<');
        buf.extend_from_slice(hex_upper(data).as_bytes());
        buf.push(b'>');
    }
}

/// `(...)` literal string with `\`, `(`, `)` and control characters escaped.
pub fn escape_literal(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + 2);
    out.push('(');
    for &b in data {
        match b {
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7E => out.push(b as char),
            other => out.push_str(&format!("\\{:03o}", other)),
        }
    }
    out.push(')');
    out
}

/// Uppercase hex digits of `data`.
pub fn hex_upper(data: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(data.len() * 2);
    for &b in data {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0F) as usize] as char);
    }
    out
}

fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for b in name.bytes() {
        let regular = (0x21..=0x7E).contains(&b) && !crate::lexer::is_delimiter(b) && b != b'#';
        if regular {
            buf.push(b);
        } else {
            buf.extend_from_slice(format!("#{:02X}", b).as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ser(obj: &Object) -> String {
        String::from_utf8(ObjectSerializer::new().serialize(obj)).unwrap()
    }

    #[test]
    fn test_primitives() {
        assert_eq!(ser(&Object::Null), "null");
        assert_eq!(ser(&Object::Boolean(true)), "true");
        assert_eq!(ser(&Object::Integer(-3)), "-3");
        assert_eq!(ser(&Object::Real(2.0)), "2");
        assert_eq!(ser(&Object::Real(0.125)), "0.125");
        assert_eq!(ser(&Object::Reference(ObjectRef::new(4, 0))), "4 0 R");
    }

    #[test]
    fn test_strings() {
        assert_eq!(ser(&Object::String(b"a(b)".to_vec())), "(a\\(b\\))");
        assert_eq!(ser(&Object::String(vec![0x00, 0xFF])), "<00FF>");
    }

    #[test]
    fn test_name_escaping() {
        assert_eq!(ser(&Object::name("A B")), "/A#20B");
        assert_eq!(ser(&Object::name("Sig")), "/Sig");
    }

    #[test]
    fn test_dictionary_sorted() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Annot"));
        dict.insert("F".to_string(), Object::Integer(132));
        assert_eq!(ser(&Object::Dictionary(dict)), "<</F 132 /Type /Annot >>");
    }

    #[test]
    fn test_stream_length_is_set() {
        let obj = Object::Stream {
            dict: Dictionary::new(),
            data: bytes::Bytes::from_static(b"q Q"),
        };
        assert_eq!(ser(&obj), "<</Length 3 >>\nstream\nq Q\nendstream");
    }

    #[test]
    fn test_roundtrip_through_parser() {
        let mut dict = Dictionary::new();
        dict.insert("Kids".to_string(), Object::Array(vec![Object::Reference(ObjectRef::new(3, 0))]));
        dict.insert("T".to_string(), Object::String(b"Signature1".to_vec()));
        let obj = Object::Dictionary(dict);
        let bytes = ObjectSerializer::new().serialize(&obj);
        let (_, parsed) = crate::parser::parse_object(&bytes).unwrap();
        assert_eq!(parsed, obj);
    }

    #[test]
    fn test_wrap_indirect() {
        let out = ObjectSerializer::wrap_indirect(ObjectRef::new(9, 0), b"<<>>");
        assert_eq!(out, b"9 0 obj\n<<>>\nendobj\n");
    }
}
