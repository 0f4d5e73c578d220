//! PDF object parser.
//!
//! Recursive descent over [`crate::lexer`] tokens, producing [`Object`]s.
//! Stream bodies are sliced out by `/Length` when it is a direct integer
//! that lands on `endstream`, and by scanning for `endstream` otherwise.

use crate::lexer::{skip_ws, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

fn fail<T>(input: &[u8], kind: nom::error::ErrorKind) -> IResult<&[u8], T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Decode escape sequences in the raw bytes of a literal string.
///
/// Handles the single-character escapes, `\ddd` octal codes and
/// backslash-newline continuations. Unknown escapes keep the character.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(esc) = iter.next() else {
            break;
        };
        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if iter.peek() == Some(&b'\n') {
                    iter.next();
                }
            },
            b'0'..=b'7' => {
                let mut code = (esc - b'0') as u32;
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            iter.next();
                        },
                        _ => break,
                    }
                }
                out.push((code & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }
    out
}

/// Decode the raw contents of a hex string. Whitespace is ignored and an odd
/// trailing digit is padded with `0`.
pub fn decode_hex(raw: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = raw
        .iter()
        .filter_map(|&c| (c as char).to_digit(16).map(|d| d as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// Parse one PDF object.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (rest, tok) = token(input)?;
    match tok {
        Token::Integer(i) => {
            if let Ok((after_gen, Token::Integer(gen))) = token(rest) {
                if let Ok((after_r, Token::Keyword(b"R"))) = token(after_gen) {
                    if i >= 0 && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((rest, Object::Integer(i)))
        },
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => Ok((rest, Object::String(decode_hex(raw)))),
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::Keyword(b"true") => Ok((rest, Object::Boolean(true))),
        Token::Keyword(b"false") => Ok((rest, Object::Boolean(false))),
        Token::Keyword(b"null") => Ok((rest, Object::Null)),
        Token::ArrayStart => parse_array_body(rest),
        Token::DictStart => {
            let (rest, dict) = parse_dict_body(rest)?;
            match token(rest) {
                Ok((body, Token::Keyword(b"stream"))) => {
                    let (rest, data) = parse_stream_body(body, &dict)?;
                    Ok((
                        rest,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::copy_from_slice(data),
                        },
                    ))
                },
                _ => Ok((rest, Object::Dictionary(dict))),
            }
        },
        _ => fail(input, nom::error::ErrorKind::Tag),
    }
}

fn parse_array_body(mut input: &[u8]) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_object(input)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dict_body(mut input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                // A null value is equivalent to an absent key.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return fail(input, nom::error::ErrorKind::Tag),
        }
    }
}

fn parse_stream_body<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], &'a [u8]> {
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(len) = dict.get("Length").and_then(Object::as_integer) {
        let len = len.max(0) as usize;
        if len <= body.len() && skip_ws(&body[len..]).starts_with(b"endstream") {
            let after = &skip_ws(&body[len..])[b"endstream".len()..];
            return Ok((after, &body[..len]));
        }
    }

    let Some(end) = find(body, b"endstream") else {
        return fail(input, nom::error::ErrorKind::TakeUntil);
    };
    let mut data = &body[..end];
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
        data = &data[..data.len() - 1];
    }
    Ok((&body[end + b"endstream".len()..], data))
}

/// Parse `N G obj <object> endobj`. A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (rest, id) = token(input)?;
    let (rest, gen) = token(rest)?;
    let (rest, kw) = token(rest)?;
    let (id, gen) = match (id, gen, kw) {
        (Token::Integer(id), Token::Integer(gen), Token::Keyword(b"obj")) if id >= 0 && gen >= 0 => {
            (id as u32, gen as u16)
        },
        _ => return fail(input, nom::error::ErrorKind::Tag),
    };
    let (rest, object) = parse_object(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::Keyword(b"endobj"))) => after,
        _ => rest,
    };
    Ok((rest, (ObjectRef::new(id, gen), object)))
}

/// Byte offset of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Byte offset of the last occurrence of `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\n"), b"a(b)\n");
        assert_eq!(decode_literal_string_escapes(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string_escapes(b"line\\\ncont"), b"linecont");
    }

    #[test]
    fn test_decode_hex_odd_digits() {
        assert_eq!(decode_hex(b"48 65 6"), vec![0x48, 0x65, 0x60]);
    }

    #[test]
    fn test_reference_vs_integers() {
        let (_, obj) = parse_object(b"[1 0 R 2 3]").unwrap();
        let arr = obj.as_array().unwrap();
        assert_eq!(arr[0], Object::Reference(ObjectRef::new(1, 0)));
        assert_eq!(arr[1], Object::Integer(2));
        assert_eq!(arr[2], Object::Integer(3));
    }

    #[test]
    fn test_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Sig /ByteRange [0 10 20 30] /Gone null >>").unwrap();
        assert!(obj.has_name("Type", "Sig"));
        assert_eq!(obj.get("ByteRange").unwrap().as_array().unwrap().len(), 4);
        assert!(obj.get("Gone").is_none());
    }

    #[test]
    fn test_stream_with_length() {
        let (_, obj) = parse_object(b"<< /Length 5 >>\nstream\nHello\nendstream").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let (_, obj) = parse_object(b"<< /Length 9 0 R >>\r\nstream\r\nabc\r\nendstream").unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"abc"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_indirect_object() {
        let (_, (r, obj)) = parse_indirect_object(b"7 0 obj\n<< /Type /Catalog >>\nendobj").unwrap();
        assert_eq!(r, ObjectRef::new(7, 0));
        assert!(obj.has_name("Type", "Catalog"));
    }

    #[test]
    fn test_find_helpers() {
        assert_eq!(find(b"abcabc", b"bc"), Some(1));
        assert_eq!(rfind(b"abcabc", b"bc"), Some(4));
        assert_eq!(find(b"abc", b"zz"), None);
    }
}
