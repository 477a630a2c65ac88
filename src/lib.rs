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

//! # mail-mime
//!
//! _mail-mime_ is a **MIME message model** written in Rust: it parses raw message
//! bytes (_RFC 822/2822_ plus MIME, _RFC 2045 - 2049_, _RFC 2183_ and _RFC 2231_)
//! into a mutable tree of typed headers and nested body parts, and serializes that
//! tree back into wire form. Unlike read-only parsers, the content tree supports
//! in-place mutation: headers can be replaced, parts attached or detached, and the
//! whole tree reassembled with `assemble()`/`encoded_content()`.
//!
//! The library abides by the Robustness Principle: malformed input never aborts a
//! parse. Grammar failures fall back to permissive representations, a multipart
//! body without a recognizable boundary is downgraded to `text/plain`, and legacy
//! uuencoded or yEnc payloads embedded in plain-text messages are transparently
//! promoted into synthetic multipart trees.
//!
//! Input is expected with LF-only line endings; [`lf_only`] and [`crlf`] convert
//! at the boundary.
//!
//! ## Usage example
//!
//! ```rust,ignore
//! use mail_mime::Message;
//!
//! let mut message = Message::parse_bytes(
//!     concat!(
//!         "From: Art Vandelay <art@vandelay.com>\n",
//!         "To: jane@example.com\n",
//!         "Subject: Latex or vinyl?\n",
//!         "Content-Type: multipart/mixed; boundary=\"festivus\"\n",
//!         "\n",
//!         "--festivus\n",
//!         "\n",
//!         "An importer-exporter writes.\n",
//!         "--festivus--\n"
//!     )
//!     .as_bytes(),
//! );
//!
//! assert_eq!(message.subject(), Some("Latex or vinyl?"));
//! assert_eq!(message.content().contents().len(), 1);
//!
//! message.set_subject("Re: Latex or vinyl?");
//! message.assemble();
//! let raw = message.content().encoded_content();
//! ```

pub mod charfreq;
pub mod content;
pub mod decoders;
pub mod headers;
pub mod parsers;

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use charfreq::{encodings_for_data, CharFreq, ContentClass};
pub use content::index::{ContentIndex, ContentIndexError};
pub use content::message::Message;
pub use content::{Content, TextTrim};
pub use headers::value::{
    ContentDisposition, ContentType, Control, DispositionType, MailCopiesTo, TransferEncoding,
};
pub use headers::{Header, HeaderName, HeaderValue};
pub use parsers::date::DateTime;

/// An RFC 2822 addr-spec: `local-part@domain`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AddrSpec {
    pub local_part: String,
    pub domain: String,
}

impl AddrSpec {
    pub fn new(local_part: impl Into<String>, domain: impl Into<String>) -> Self {
        AddrSpec {
            local_part: local_part.into(),
            domain: domain.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.local_part.is_empty() && self.domain.is_empty()
    }

    /// Wire form, re-quoting the local part when it contains specials.
    pub fn to_wire(&self) -> String {
        let local = if self.local_part.is_empty()
            || self
                .local_part
                .bytes()
                .all(|ch| parsers::cursor::is_atext(ch) || ch == b'.')
        {
            self.local_part.clone()
        } else {
            headers::rfc2047::quote_string(&self.local_part)
        };
        if self.domain.is_empty() {
            local
        } else {
            format!("{}@{}", local, self.domain)
        }
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.to_wire())
    }
}

/// An RFC 2822 mailbox: an addr-spec with an optional display name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mailbox {
    pub name: Option<String>,
    pub addr_spec: AddrSpec,
}

impl Mailbox {
    pub fn new(name: Option<String>, addr_spec: AddrSpec) -> Self {
        Mailbox { name, addr_spec }
    }

    /// Parses a single mailbox; trailing garbage is a failure.
    pub fn parse(raw: &[u8]) -> Option<Mailbox> {
        let mut cursor = parsers::Cursor::new(raw);
        let mailbox = cursor.parse_mailbox()?;
        cursor.skip_cfws();
        cursor.at_end().then_some(mailbox)
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.addr_spec.is_empty()
    }

    pub fn to_wire(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => {
                format!(
                    "{} <{}>",
                    headers::rfc2047::encode_phrase(name),
                    self.addr_spec.to_wire()
                )
            }
            _ => self.addr_spec.to_wire(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.to_wire())
    }
}

/// An RFC 2822 address: a single mailbox or a named group of mailboxes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Address {
    Mailbox(Mailbox),
    Group { name: String, members: Vec<Mailbox> },
}

impl Address {
    /// Parses a comma- or semicolon-separated address list.
    pub fn parse_list(raw: &[u8]) -> Option<Vec<Address>> {
        parsers::Cursor::new(raw).parse_address_list()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Address::Mailbox(mbox) => mbox.is_empty(),
            Address::Group { name, members } => name.is_empty() && members.is_empty(),
        }
    }

    pub fn to_wire(&self) -> String {
        match self {
            Address::Mailbox(mbox) => mbox.to_wire(),
            Address::Group { name, members } => {
                let members = members
                    .iter()
                    .map(|m| m.to_wire())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {};", headers::rfc2047::encode_phrase(name), members)
            }
        }
    }

    /// All mailboxes of this address, flattening groups.
    pub fn mailboxes(&self) -> &[Mailbox] {
        match self {
            Address::Mailbox(mbox) => std::slice::from_ref(mbox),
            Address::Group { members, .. } => members,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.to_wire())
    }
}

/// Converts CRLF (and stray CR) line endings to LF, borrowing when unchanged.
pub fn lf_only(bytes: &[u8]) -> std::borrow::Cow<[u8]> {
    if !bytes.contains(&b'\r') {
        return bytes.into();
    }
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().peekable();
    while let Some(&ch) = iter.next() {
        if ch == b'\r' {
            if iter.peek() != Some(&&b'\n') {
                out.push(b'\n');
            }
        } else {
            out.push(ch);
        }
    }
    out.into()
}

/// Converts LF line endings to CRLF, borrowing when unchanged.
pub fn crlf(bytes: &[u8]) -> std::borrow::Cow<[u8]> {
    if !bytes.contains(&b'\n') {
        return bytes.into();
    }
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 16);
    let mut prev = 0u8;
    for &ch in bytes {
        if ch == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(ch);
        prev = ch;
    }
    out.into()
}
