/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

//! `;`-separated parameter lists (RFC 2045) with RFC 2231 extended values:
//! charset-tagged percent encoding and numbered continuations. Values that
//! carry RFC 2047 encoded words instead (a common client deviation) are
//! decoded as such.

use crate::decoders::charsets;
use crate::parsers::cursor::Cursor;
use crate::parsers::encoded_word::decode_rfc2047_text;

/// Parses raw `attribute=value` pairs. A malformed parameter does not poison
/// the list: the parser resynchronizes at the next `;` and keeps going.
/// Attribute names are lowercased; values are unquoted but not yet
/// RFC 2231/2047 decoded.
pub fn parse_parameter_list(cursor: &mut Cursor) -> Vec<(String, String)> {
    let mut params = Vec::new();
    loop {
        cursor.skip_cfws();
        while cursor.skip_byte(b';') {
            cursor.skip_cfws();
        }
        match cursor.peek() {
            None | Some(b'\n') => break,
            _ => (),
        }

        let attr = cursor.parse_token();
        let value = attr.is_some().then(|| {
            cursor.skip_cfws();
            if !cursor.skip_byte(b'=') {
                return None;
            }
            cursor.skip_cfws();
            parse_value(cursor)
        });

        match (attr, value.flatten()) {
            (Some(attr), Some(value)) => {
                params.push((attr.to_ascii_lowercase(), value));
                cursor.skip_cfws();
                // Anything but a separator here is stray garbage.
                if !matches!(cursor.peek(), None | Some(b';') | Some(b'\n')) {
                    resync(cursor);
                }
            }
            _ => {
                tracing::warn!("malformed parameter, resynchronizing at next ';'");
                resync(cursor);
            }
        }
    }
    params
}

fn parse_value(cursor: &mut Cursor) -> Option<String> {
    if cursor.peek() == Some(b'"') {
        return cursor.parse_quoted_string();
    }
    // A lenient raw run: everything up to the separator. Covers tokens as
    // well as unquoted values containing encoded words or 8-bit bytes.
    let start = cursor.pos();
    while let Some(ch) = cursor.peek() {
        if matches!(ch, b';' | b' ' | b'\t' | b'\n') {
            break;
        }
        cursor.advance(1);
    }
    if cursor.pos() == start {
        None
    } else {
        Some(String::from_utf8_lossy(cursor.slice(start, cursor.pos())).into_owned())
    }
}

fn resync(cursor: &mut Cursor) {
    while let Some(ch) = cursor.peek() {
        if ch == b';' {
            break;
        }
        if ch == b'\n' && !cursor.peek_at(1).map_or(false, super::cursor::is_wsp) {
            break;
        }
        cursor.advance(1);
    }
}

enum Piece {
    Single { encoded: bool, value: String },
    Segment { number: u32, encoded: bool, value: String },
}

/// Decodes raw parameter pairs into logical parameters: RFC 2231 continuation
/// segments are reassembled in numeric order, charset-tagged values are
/// percent-decoded and transcoded, and values holding RFC 2047 encoded words
/// are decoded as a fallback. Logical names keep first-appearance order.
pub fn decode_parameter_list(raw: Vec<(String, String)>) -> Vec<(String, String)> {
    let mut logical: Vec<(String, Vec<Piece>)> = Vec::new();

    for (attr, value) in raw {
        let (name, piece) = split_attribute(&attr, value);
        match logical.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, pieces)) => pieces.push(piece),
            None => logical.push((name, vec![piece])),
        }
    }

    logical
        .into_iter()
        .map(|(name, mut pieces)| {
            // Continuations are ordered by their numeric segment, not by the
            // lexicographic attribute name, so ten or more segments
            // concatenate correctly.
            pieces.sort_by_key(|piece| match piece {
                Piece::Single { .. } => 0,
                Piece::Segment { number, .. } => *number,
            });

            let mut bytes = Vec::new();
            let mut charset = String::new();
            let mut charset_seen = false;
            for piece in pieces {
                let (encoded, value) = match piece {
                    Piece::Single { encoded, value } => (encoded, value),
                    Piece::Segment { encoded, value, .. } => (encoded, value),
                };
                if encoded {
                    let data = if !charset_seen {
                        charset_seen = true;
                        // The first encoded piece may carry the
                        // charset'lang' prefix.
                        let tagged = {
                            let mut parts = value.splitn(3, '\'');
                            match (parts.next(), parts.next(), parts.next()) {
                                (Some(cs), Some(_lang), Some(data)) => {
                                    Some((cs.to_string(), data.to_string()))
                                }
                                _ => None,
                            }
                        };
                        match tagged {
                            Some((cs, data)) => {
                                charset = cs;
                                data
                            }
                            None => value,
                        }
                    } else {
                        value
                    };
                    bytes.extend_from_slice(&percent_decode(&data));
                } else if value.contains("=?") && value.contains("?=") {
                    bytes.extend_from_slice(decode_rfc2047_text(&value).as_bytes());
                } else {
                    bytes.extend_from_slice(value.as_bytes());
                }
            }
            (name, charsets::decode_charset(&bytes, &charset))
        })
        .collect()
}

fn split_attribute(attr: &str, value: String) -> (String, Piece) {
    let (base, encoded) = match attr.strip_suffix('*') {
        Some(base) => (base, true),
        None => (attr, false),
    };
    if let Some((name, segment)) = base.split_once('*') {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = segment.parse::<u32>() {
                return (
                    name.to_string(),
                    Piece::Segment {
                        number,
                        encoded,
                        value,
                    },
                );
            }
        }
        // A malformed section suffix: keep the attribute as-is.
        return (attr.to_string(), Piece::Single { encoded: false, value });
    }
    (base.to_string(), Piece::Single { encoded, value })
}

fn percent_decode(data: &str) -> Vec<u8> {
    let bytes = data.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b'%' {
            let hex = bytes.get(pos + 1).zip(bytes.get(pos + 2)).and_then(|(&hi, &lo)| {
                let hi = (hi as char).to_digit(16)?;
                let lo = (lo as char).to_digit(16)?;
                Some(((hi << 4) | lo) as u8)
            });
            if let Some(byte) = hex {
                out.push(byte);
                pos += 3;
                continue;
            }
        }
        out.push(bytes[pos]);
        pos += 1;
    }
    out
}
