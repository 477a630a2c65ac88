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

//! Cursor over a header value with the RFC 2822 lexical productions.
//!
//! Every production upholds the backtracking contract: on success the cursor
//! has advanced past the consumed input, on failure (`None`) the cursor is
//! restored to its entry position. Alternatives compose by simply trying the
//! next production.

use crate::parsers::encoded_word::{parse_encoded_word, EncodedWord};

/// `atext` per RFC 2822 section 3.2.4.
pub fn is_atext(ch: u8) -> bool {
    matches!(ch,
        b'a'..=b'z'
        | b'A'..=b'Z'
        | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'/'
        | b'=' | b'?' | b'^' | b'_' | b'`' | b'{' | b'|' | b'}' | b'~')
}

/// `token` characters per RFC 2045 section 5.1: any CHAR except SPACE, CTLs
/// and tspecials.
pub fn is_ttext(ch: u8) -> bool {
    match ch {
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'['
        | b']' | b'?' | b'=' => false,
        0x21..=0x7e => true,
        _ => false,
    }
}

pub fn is_wsp(ch: u8) -> bool {
    ch == b' ' || ch == b'\t'
}

pub struct Cursor<'x> {
    data: &'x [u8],
    pos: usize,
}

impl<'x> Cursor<'x> {
    pub fn new(data: &'x [u8]) -> Cursor<'x> {
        Cursor { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    pub fn next_byte(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    pub fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.data.len());
    }

    pub fn skip_byte(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn remaining(&self) -> &'x [u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    pub fn slice(&self, from: usize, to: usize) -> &'x [u8] {
        &self.data[from.min(self.data.len())..to.min(self.data.len())]
    }

    /// Consumes WSP and folding (newline followed by WSP).
    pub fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t') => self.pos += 1,
                Some(b'\n') if self.peek_at(1).is_some_and(is_wsp) => self.pos += 2,
                Some(b'\r')
                    if self.peek_at(1) == Some(b'\n') && self.peek_at(2).is_some_and(is_wsp) =>
                {
                    self.pos += 3
                }
                _ => break,
            }
        }
    }

    /// Consumes CFWS: whitespace, folding and (nested) comments.
    ///
    /// An unterminated comment leaves the cursor at the opening `(` of the
    /// outermost unterminated comment.
    pub fn skip_cfws(&mut self) {
        loop {
            self.skip_ws();
            if self.peek() == Some(b'(') {
                if self.parse_comment().is_none() {
                    break;
                }
            } else {
                break;
            }
        }
    }

    /// Parses a (possibly nested) comment, returning its decoded contents.
    pub fn parse_comment(&mut self) -> Option<String> {
        self.parse_delimited(b'(', b')')
    }

    /// Parses a quoted-string (without surrounding CFWS).
    pub fn parse_quoted_string(&mut self) -> Option<String> {
        self.parse_delimited(b'"', b'"')
    }

    /// Generic delimited reader shared by quoted-string (`"`..`"`), comment
    /// (`(`..`)`) and domain-literal (`[`..`]`) bodies. Performs quoted-pair
    /// unescaping and folding-to-space conversion, recovers RFC 2047 encoded
    /// words placed inside the delimiters, and supports nesting when the
    /// delimiters differ.
    pub fn parse_delimited(&mut self, open: u8, close: u8) -> Option<String> {
        let start = self.pos;
        if !self.skip_byte(open) {
            return None;
        }
        let mut depth = 1usize;
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek() else {
                // Unterminated: restore to the opening delimiter.
                self.pos = start;
                return None;
            };
            match ch {
                b'\\' => {
                    let Some(escaped) = self.peek_at(1) else {
                        self.pos = start;
                        return None;
                    };
                    value.push(escaped as char);
                    self.pos += 2;
                }
                b'\n' => {
                    if self.peek_at(1).is_some_and(is_wsp) {
                        // Folded line: the fold collapses to a single space.
                        self.skip_ws();
                        value.push(' ');
                    } else {
                        // Header ends inside the delimiters.
                        self.pos = start;
                        return None;
                    }
                }
                b'\r' => {
                    if self.peek_at(1) == Some(b'\n') {
                        self.pos += 1;
                    } else {
                        tracing::warn!("lone CR inside delimited text");
                        value.push('\r');
                        self.pos += 1;
                    }
                }
                b'=' => {
                    // Some clients put encoded words inside quoted strings.
                    match parse_encoded_word(self) {
                        EncodedWord::Decoded(text) => value.push_str(&text),
                        _ => {
                            value.push('=');
                            self.pos += 1;
                        }
                    }
                }
                _ if ch == close => {
                    self.pos += 1;
                    depth -= 1;
                    if depth == 0 {
                        return Some(value);
                    }
                    value.push(close as char);
                }
                _ if ch == open => {
                    self.pos += 1;
                    depth += 1;
                    value.push(open as char);
                }
                _ if ch < 0x80 => {
                    value.push(ch as char);
                    self.pos += 1;
                }
                _ => {
                    // Raw 8-bit text inside the delimiters: read it as a
                    // UTF-8 sequence, lossily. Delimiters are ASCII, so a
                    // multi-byte run can never contain one.
                    let len = match ch {
                        0xc0..=0xdf => 2,
                        0xe0..=0xef => 3,
                        0xf0..=0xf7 => 4,
                        _ => 1,
                    };
                    let end = (self.pos + len).min(self.data.len());
                    value.push_str(&String::from_utf8_lossy(&self.data[self.pos..end]));
                    self.pos = end;
                }
            }
        }
    }

    /// Parses a maximal run of atext. 8-bit bytes are tolerated (with a
    /// warning) when `allow_8bit` is set.
    pub fn parse_atom(&mut self, allow_8bit: bool) -> Option<String> {
        let start = self.pos;
        let mut warned = false;
        while let Some(ch) = self.peek() {
            if is_atext(ch) {
                self.pos += 1;
            } else if allow_8bit && ch >= 0x80 {
                if !warned {
                    tracing::warn!("8-bit byte in atom");
                    warned = true;
                }
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            None
        } else {
            Some(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
        }
    }

    /// Parses a maximal run of RFC 2045 token characters.
    pub fn parse_token(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if is_ttext(ch) || ch >= 0x80 {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            None
        } else {
            Some(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
        }
    }

    /// Parses `atom ("." atom)*`.
    pub fn parse_dot_atom(&mut self) -> Option<String> {
        let start = self.pos;
        let mut value = self.parse_atom(true)?;
        while self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|ch| is_atext(ch) || ch >= 0x80)
        {
            self.pos += 1;
            match self.parse_atom(true) {
                Some(atom) => {
                    value.push('.');
                    value.push_str(&atom);
                }
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        Some(value)
    }

    /// Parses a domain: dot-atom (a trailing bare `.` is preserved, valid per
    /// RFC 3696) or a `[...]` domain-literal kept with its brackets.
    pub fn parse_domain(&mut self) -> Option<String> {
        let start = self.pos;
        self.skip_cfws();
        if self.peek() == Some(b'[') {
            match self.parse_delimited(b'[', b']') {
                Some(literal) => return Some(format!("[{}]", literal)),
                None => {
                    self.pos = start;
                    return None;
                }
            }
        }
        match self.parse_dot_atom() {
            Some(mut domain) => {
                if self.skip_byte(b'.') {
                    domain.push('.');
                }
                Some(domain)
            }
            None => {
                self.pos = start;
                None
            }
        }
    }

    /// Parses a phrase: words (atoms, quoted strings, encoded words, comments)
    /// joined with single spaces. The space between two adjacent encoded words
    /// is suppressed per RFC 2047 section 6.2; a `.` outside quotes is
    /// tolerated for interoperability.
    pub fn parse_phrase(&mut self) -> Option<String> {
        let start = self.pos;
        let mut value = String::new();
        let mut last_encoded = false;

        loop {
            self.skip_ws();
            match self.peek() {
                Some(b'"') => match self.parse_quoted_string() {
                    Some(text) => {
                        push_word(&mut value, &text);
                        last_encoded = false;
                    }
                    None => break,
                },
                Some(b'(') => match self.parse_comment() {
                    Some(text) => {
                        push_word(&mut value, &text);
                        last_encoded = false;
                    }
                    None => break,
                },
                Some(b'.') => {
                    value.push('.');
                    self.pos += 1;
                    // "first.last" stays glued; "Q. Public" does not.
                    if self.peek().is_some_and(|ch| is_atext(ch) || ch >= 0x80) {
                        if let Some(atom) = self.parse_atom(true) {
                            value.push_str(&atom);
                        }
                    }
                    last_encoded = false;
                }
                Some(b'=') => match parse_encoded_word(self) {
                    EncodedWord::Decoded(text) => {
                        if last_encoded {
                            value.push_str(&text);
                        } else {
                            push_word(&mut value, &text);
                        }
                        last_encoded = true;
                    }
                    _ => match self.parse_atom(true) {
                        Some(atom) => {
                            push_word(&mut value, &atom);
                            last_encoded = false;
                        }
                        None => break,
                    },
                },
                Some(ch) if is_atext(ch) || ch >= 0x80 => {
                    let atom = self.parse_atom(true).unwrap_or_default();
                    push_word(&mut value, &atom);
                    last_encoded = false;
                }
                _ => break,
            }
        }

        if value.is_empty() {
            self.pos = start;
            None
        } else {
            Some(value)
        }
    }
}

fn push_word(value: &mut String, word: &str) {
    if !value.is_empty() {
        value.push(' ');
    }
    value.push_str(word);
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn atom_backtracking() {
        let mut cursor = Cursor::new(b"; not an atom");
        assert_eq!(cursor.parse_atom(false), None);
        assert_eq!(cursor.pos(), 0);

        let mut cursor = Cursor::new(b"simple-atom rest");
        assert_eq!(cursor.parse_atom(false).as_deref(), Some("simple-atom"));
        assert_eq!(cursor.pos(), 11);
    }

    #[test]
    fn quoted_string_unescaping() {
        let inputs = [
            ("\"plain\"", Some("plain")),
            ("\"with \\\"escapes\\\"\"", Some("with \"escapes\"")),
            ("\"folded\n line\"", Some("folded line")),
            ("\"unterminated", None),
        ];
        for (input, expected) in inputs {
            let mut cursor = Cursor::new(input.as_bytes());
            assert_eq!(
                cursor.parse_quoted_string().as_deref(),
                expected,
                "{}",
                input
            );
            if expected.is_none() {
                assert_eq!(cursor.pos(), 0, "cursor not restored for {}", input);
            }
        }
    }

    #[test]
    fn quoted_string_recovers_encoded_words() {
        let mut cursor = Cursor::new("\"=?utf-8?q?caf=C3=A9?=\"".as_bytes());
        assert_eq!(cursor.parse_quoted_string().as_deref(), Some("café"));
        // A bare '=' stays literal.
        let mut cursor = Cursor::new(b"\"a=b\"");
        assert_eq!(cursor.parse_quoted_string().as_deref(), Some("a=b"));
    }

    #[test]
    fn nested_comments() {
        let mut cursor = Cursor::new(b"(outer (inner) comment) tail");
        assert_eq!(
            cursor.parse_comment().as_deref(),
            Some("outer (inner) comment")
        );
        assert_eq!(cursor.remaining(), b" tail");
    }

    #[test]
    fn unterminated_comment_stops_at_open_paren() {
        let mut cursor = Cursor::new(b"  (never closed");
        cursor.skip_cfws();
        assert_eq!(cursor.peek(), Some(b'('));
        assert_eq!(cursor.pos(), 2);
    }

    #[test]
    fn dot_atom_and_domain() {
        let mut cursor = Cursor::new(b"mail.example.com rest");
        assert_eq!(
            cursor.parse_dot_atom().as_deref(),
            Some("mail.example.com")
        );

        // Trailing bare dot is preserved, not stripped.
        let mut cursor = Cursor::new(b"example.com.");
        assert_eq!(cursor.parse_domain().as_deref(), Some("example.com."));

        let mut cursor = Cursor::new(b"[127.0.0.1]");
        assert_eq!(cursor.parse_domain().as_deref(), Some("[127.0.0.1]"));
    }

    #[test]
    fn phrase_joins_words() {
        let mut cursor = Cursor::new(b"Art  Vandelay <art@vandelay.com>");
        assert_eq!(cursor.parse_phrase().as_deref(), Some("Art Vandelay"));
        assert_eq!(cursor.peek(), Some(b'<'));

        let mut cursor = Cursor::new(b"\"James\" Smythe");
        assert_eq!(cursor.parse_phrase().as_deref(), Some("James Smythe"));
    }

    #[test]
    fn phrase_adjacent_encoded_words() {
        // RFC 2047 6.2: whitespace between adjacent encoded words is not
        // rendered.
        let mut cursor = Cursor::new(b"=?us-ascii?q?Jo?= =?us-ascii?q?hn?=");
        assert_eq!(cursor.parse_phrase().as_deref(), Some("John"));
    }

    #[test]
    fn phrase_tolerates_dots() {
        let mut cursor = Cursor::new(b"John Q. Public");
        assert_eq!(cursor.parse_phrase().as_deref(), Some("John Q. Public"));
    }

    #[test]
    fn token_stops_at_tspecials() {
        let mut cursor = Cursor::new(b"text/plain; charset=us-ascii");
        assert_eq!(cursor.parse_token().as_deref(), Some("text"));
        assert_eq!(cursor.peek(), Some(b'/'));
    }
}
