//! Object streams (`/Type /ObjStm`).
//!
//! The decoded stream starts with `/N` pairs of integers (object number,
//! offset relative to `/First`), followed by the objects themselves.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;

/// Objects of one object stream, in stream order.
///
/// Entry `i` corresponds to the xref stream's "index within stream" `i`.
/// Objects that fail to parse are kept as `None` so indices stay aligned.
pub fn parse_object_stream(stream: &Object) -> Result<Vec<(u32, Option<Object>)>> {
    if !matches!(stream, Object::Stream { .. }) {
        return Err(Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: stream.type_name().to_string(),
        });
    }
    if !stream.has_name("Type", "ObjStm") {
        return Err(Error::InvalidPdf("object stream lacks /Type /ObjStm".to_string()));
    }

    let int = |key: &str| {
        stream
            .get(key)
            .and_then(Object::as_integer)
            .ok_or_else(|| Error::InvalidPdf(format!("object stream missing /{}", key)))
    };
    let n = int("N")?;
    let first = int("First")?;
    if !(0..=1_000_000).contains(&n) || first < 0 {
        return Err(Error::InvalidPdf(format!("invalid object stream header /N {} /First {}", n, first)));
    }

    let decoded = stream.decode_stream_data()?;
    let first = first as usize;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data is {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let (header, body) = decoded.split_at(first);
    let mut input = header;
    let mut objects = Vec::with_capacity(n as usize);
    for _ in 0..n {
        let (rest, id) = match token(input) {
            Ok((rest, Token::Integer(id))) => match u32::try_from(id) {
                Ok(id) => (rest, id),
                Err(_) => break,
            },
            _ => break,
        };
        let (rest, offset) = match token(rest) {
            Ok((rest, Token::Integer(offset))) if offset >= 0 => (rest, offset as usize),
            _ => break,
        };
        input = rest;

        let object = body
            .get(offset..)
            .and_then(|data| parse_object(data).ok())
            .map(|(_, obj)| obj);
        if object.is_none() {
            log::warn!("object {} in object stream could not be parsed", id);
        }
        objects.push((id, object));
    }
    Ok(objects)
}
