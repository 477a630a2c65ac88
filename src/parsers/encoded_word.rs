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

//! RFC 2047 encoded-word parsing: `=?charset[*lang]?encoding?text?=`.

use crate::decoders::{base64, charsets, quoted_printable};
use crate::parsers::cursor::Cursor;

/// Outcome of an encoded-word parse attempt. `Malformed` (the `=?` marker was
/// present but the word did not decode) is distinct from `NotEncodedWord` so
/// callers can fall back to literal parsing only in the latter case.
#[derive(Debug, PartialEq, Eq)]
pub enum EncodedWord {
    NotEncodedWord,
    Malformed,
    Decoded(String),
}

enum State {
    Charset,
    Language,
    Encoding,
}

/// Parses an encoded word at the cursor. The cursor advances past the
/// terminating `?=` on success and is restored otherwise. A stray `?` inside
/// the encoded text is tolerated; only `?=` terminates.
pub fn parse_encoded_word(cursor: &mut Cursor) -> EncodedWord {
    let start = cursor.pos();
    if !(cursor.skip_byte(b'=') && cursor.skip_byte(b'?')) {
        cursor.set_pos(start);
        return EncodedWord::NotEncodedWord;
    }

    let mut charset = String::new();
    let mut encoding: Option<u8> = None;
    let mut state = State::Charset;

    loop {
        let Some(ch) = cursor.next_byte() else {
            cursor.set_pos(start);
            return EncodedWord::Malformed;
        };
        match state {
            State::Charset => match ch {
                b'?' => state = State::Encoding,
                b'*' => state = State::Language,
                b' '..=b'~' => charset.push(ch.to_ascii_lowercase() as char),
                _ => {
                    cursor.set_pos(start);
                    return EncodedWord::Malformed;
                }
            },
            State::Language => match ch {
                // The language tag is ignored.
                b'?' => state = State::Encoding,
                b'\n' | b'=' => {
                    cursor.set_pos(start);
                    return EncodedWord::Malformed;
                }
                _ => (),
            },
            State::Encoding => {
                if encoding.is_none() {
                    match ch {
                        b'q' | b'Q' | b'b' | b'B' => encoding = Some(ch.to_ascii_lowercase()),
                        _ => {
                            cursor.set_pos(start);
                            return EncodedWord::Malformed;
                        }
                    }
                } else if ch == b'?' {
                    break;
                } else {
                    cursor.set_pos(start);
                    return EncodedWord::Malformed;
                }
            }
        }
    }

    let text_start = cursor.pos();
    let text_end;
    loop {
        let Some(ch) = cursor.next_byte() else {
            cursor.set_pos(start);
            return EncodedWord::Malformed;
        };
        match ch {
            b'?' if cursor.peek() == Some(b'=') => {
                text_end = cursor.pos() - 1;
                cursor.advance(1);
                break;
            }
            b'\n' => {
                cursor.set_pos(start);
                return EncodedWord::Malformed;
            }
            _ => (),
        }
    }

    let encoded = cursor.slice(text_start, text_end);
    let decoded = match encoding {
        Some(b'q') => quoted_printable::decode_word(encoded),
        Some(b'b') => base64::decode(encoded),
        _ => None,
    };
    match decoded {
        Some(bytes) => EncodedWord::Decoded(charsets::decode_charset(&bytes, &charset)),
        None => {
            cursor.set_pos(start);
            EncodedWord::Malformed
        }
    }
}

/// Decodes every RFC 2047 encoded word in an unstructured text, leaving the
/// rest untouched. Whitespace between two adjacent encoded words is dropped
/// per RFC 2047 section 6.2.
pub fn decode_rfc2047_text(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    let mut ws_start: Option<usize> = None;
    let mut last_encoded = false;

    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch == b'=' {
            let mut cursor = Cursor::new(&bytes[pos..]);
            if let EncodedWord::Decoded(word) = parse_encoded_word(&mut cursor) {
                if let Some(start) = ws_start.take() {
                    if !last_encoded {
                        out.push_str(&text[start..pos]);
                    }
                }
                out.push_str(&word);
                pos += cursor.pos();
                last_encoded = true;
                continue;
            }
        }
        if matches!(ch, b' ' | b'\t' | b'\n' | b'\r') {
            if ws_start.is_none() {
                ws_start = Some(pos);
            }
            pos += 1;
            continue;
        }
        if let Some(start) = ws_start.take() {
            out.push_str(&text[start..pos]);
        }
        let c = text[pos..].chars().next().unwrap_or('\u{fffd}');
        out.push(c);
        pos += c.len_utf8().max(1);
        last_encoded = false;
    }
    if let Some(start) = ws_start {
        out.push_str(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{decode_rfc2047_text, parse_encoded_word, EncodedWord};
    use crate::parsers::cursor::Cursor;

    #[test]
    fn decode_encoded_words() {
        let inputs = [
            (
                "=?iso-8859-1?q?this=20is=20some=20text?=",
                "this is some text",
            ),
            ("=?US-ASCII?Q?Keith_Moore?=", "Keith Moore"),
            ("=?utf-8?b?w6l0w6k=?=", "été"),
            ("=?ISO-8859-1?Q?Andr=E9?=", "André"),
            // Language tag per RFC 2231 section 5.
            ("=?US-ASCII*EN?Q?Keith_Moore?=", "Keith Moore"),
            // A stray '?' inside the text does not terminate the word.
            ("=?us-ascii?q?what??=", "what?"),
        ];
        for (input, expected) in inputs {
            let mut cursor = Cursor::new(input.as_bytes());
            assert_eq!(
                parse_encoded_word(&mut cursor),
                EncodedWord::Decoded(expected.to_string()),
                "{}",
                input
            );
            assert!(cursor.at_end(), "{}", input);
        }
    }

    #[test]
    fn malformed_is_distinct_from_absent() {
        let inputs = [
            ("plain text", EncodedWord::NotEncodedWord),
            ("=only an equals", EncodedWord::NotEncodedWord),
            ("=?utf-8?x?bad-encoding?=", EncodedWord::Malformed),
            ("=?utf-8?q?unterminated", EncodedWord::Malformed),
            ("=?utf-8?b?!!!not-base64!!!?=", EncodedWord::Malformed),
        ];
        for (input, expected) in inputs {
            let mut cursor = Cursor::new(input.as_bytes());
            assert_eq!(parse_encoded_word(&mut cursor), expected, "{}", input);
            assert_eq!(cursor.pos(), 0, "cursor not restored for {}", input);
        }
    }

    #[test]
    fn decode_text_mixes_literals_and_words() {
        assert_eq!(
            decode_rfc2047_text("Why not both? =?utf-8?q?caf=C3=A9?= then"),
            "Why not both? café then"
        );
        // Adjacent encoded words: separating whitespace vanishes.
        assert_eq!(
            decode_rfc2047_text("=?us-ascii?q?a?=\n =?us-ascii?q?b?="),
            "ab"
        );
        assert_eq!(decode_rfc2047_text("no words at all"), "no words at all");
    }
}
