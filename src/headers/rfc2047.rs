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

//! RFC 2047 encoding for header serialization: display names and
//! unstructured values that carry non-ASCII text become encoded words.

use crate::decoders::base64;
use crate::parsers::cursor::is_atext;

/// Maximum length of a single encoded word per RFC 2047 section 2.
const MAX_ENCODED_WORD: usize = 75;

/// Wraps `value` in a quoted-string, escaping `"` and `\`.
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn is_ascii_printable(ch: char) -> bool {
    matches!(ch, ' '..='~')
}

/// Serializes a display-name or other phrase: plain atoms pass through,
/// ASCII with specials is re-quoted, and non-ASCII text becomes encoded
/// words.
pub fn encode_phrase(value: &str) -> String {
    if value
        .bytes()
        .all(|ch| is_atext(ch) || ch == b' ' || ch == b'.')
    {
        value.to_string()
    } else if value.chars().all(is_ascii_printable) {
        quote_string(value)
    } else {
        encode_words(value)
    }
}

/// Serializes an unstructured value: pure ASCII passes through verbatim,
/// anything else becomes encoded words.
pub fn encode_text(value: &str) -> String {
    if value
        .chars()
        .all(|ch| is_ascii_printable(ch) || ch == '\t' || ch == '\n')
    {
        value.to_string()
    } else {
        encode_words(value)
    }
}

fn q_escaped(ch: char, out: &mut String) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut buf = [0u8; 4];
    for &byte in ch.encode_utf8(&mut buf).as_bytes() {
        out.push('=');
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
}

fn q_needs_escape(ch: char) -> bool {
    !is_ascii_printable(ch) || matches!(ch, '=' | '?' | '_')
}

/// Encodes the whole text as one or more UTF-8 encoded words of at most 75
/// characters, joined with spaces (which decoders drop between adjacent
/// words). Q is chosen while the escape density stays low, B otherwise.
pub fn encode_words(value: &str) -> String {
    let escapes = value.chars().filter(|&ch| q_needs_escape(ch)).count();
    if escapes * 3 <= value.chars().count() {
        encode_words_q(value)
    } else {
        encode_words_b(value)
    }
}

fn encode_words_q(value: &str) -> String {
    const PREFIX: &str = "=?UTF-8?Q?";
    let room = MAX_ENCODED_WORD - PREFIX.len() - 2;
    let mut words = Vec::new();
    let mut payload = String::new();
    for ch in value.chars() {
        let mut encoded = String::new();
        if ch == ' ' {
            encoded.push('_');
        } else if q_needs_escape(ch) {
            q_escaped(ch, &mut encoded);
        } else {
            encoded.push(ch);
        }
        if payload.len() + encoded.len() > room {
            words.push(format!("{}{}?=", PREFIX, payload));
            payload = String::new();
        }
        payload.push_str(&encoded);
    }
    if !payload.is_empty() || words.is_empty() {
        words.push(format!("{}{}?=", PREFIX, payload));
    }
    words.join(" ")
}

fn encode_words_b(value: &str) -> String {
    const PREFIX: &str = "=?UTF-8?B?";
    // 63 base64 chars of payload room leaves 45 raw bytes per word.
    let room = (MAX_ENCODED_WORD - PREFIX.len() - 2) / 4 * 3;
    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in value.chars() {
        if chunk.len() + ch.len_utf8() > room {
            words.push(format!("{}{}?=", PREFIX, base64::encode(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() || words.is_empty() {
        words.push(format!("{}{}?=", PREFIX, base64::encode(chunk.as_bytes())));
    }
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::{encode_phrase, encode_text, encode_words, quote_string};
    use crate::parsers::encoded_word::decode_rfc2047_text;

    #[test]
    fn phrase_escalation() {
        assert_eq!(encode_phrase("Art Vandelay"), "Art Vandelay");
        assert_eq!(encode_phrase("Vandelay, Art"), "\"Vandelay, Art\"");
        assert_eq!(encode_phrase("Jürgen"), "=?UTF-8?Q?J=C3=BCrgen?=");
    }

    #[test]
    fn text_passes_ascii_through() {
        assert_eq!(encode_text("plain subject"), "plain subject");
        assert_eq!(
            encode_text("caf\u{e9} subject"),
            "=?UTF-8?Q?caf=C3=A9_subject?="
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(quote_string("a \"b\" \\c"), "\"a \\\"b\\\" \\\\c\"");
    }

    #[test]
    fn long_text_splits_into_words_that_round_trip() {
        let input = "día ".repeat(30);
        let encoded = encode_words(input.trim_end());
        for word in encoded.split(' ') {
            assert!(word.len() <= 75, "{} chars: {}", word.len(), word);
            assert!(word.starts_with("=?UTF-8?"));
            assert!(word.ends_with("?="));
        }
        assert_eq!(decode_rfc2047_text(&encoded), input.trim_end());
    }

    #[test]
    fn mostly_binary_uses_base64() {
        let input = "日本語のテキスト";
        let encoded = encode_words(input);
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert_eq!(decode_rfc2047_text(&encoded), input);
    }
}
