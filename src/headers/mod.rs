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

//! The typed header model. Every header is one of a closed set of grammar
//! families ([`HeaderValue`]); the header name selects the grammar via
//! pattern matching. A structured parse failure never aborts anything: the
//! header keeps its raw bytes and an `Empty` value, and serializes back
//! verbatim.

pub mod fold;
pub mod rfc2047;
pub mod value;

use std::fmt;

use crate::parsers::cursor::Cursor;
use crate::parsers::date::{parse_date_time, DateTime};
use crate::parsers::encoded_word::decode_rfc2047_text;
use crate::{AddrSpec, Address, Mailbox};

use self::value::{ContentDisposition, ContentType, Control, MailCopiesTo, TransferEncoding};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A header field name: the known set plus `Other` for everything else.
/// Comparisons are case-insensitive.
#[derive(Debug, Clone, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderName {
    From,
    Sender,
    ReplyTo,
    To,
    Cc,
    Bcc,
    Subject,
    Date,
    MessageId,
    InReplyTo,
    References,
    Supersedes,
    Comments,
    Keywords,
    Organization,
    UserAgent,
    MimeVersion,
    ContentType,
    ContentTransferEncoding,
    ContentDisposition,
    ContentDescription,
    ContentId,
    ContentLocation,
    Received,
    ReturnPath,
    Newsgroups,
    FollowupTo,
    Control,
    Lines,
    MailCopiesTo,
    MailFollowupTo,
    Other(String),
}

impl HeaderName {
    /// Resolves a raw field name. Embedded NUL bytes are stripped before the
    /// lookup (seen in malformed spam), and matching is case-insensitive.
    pub fn parse(name: &str) -> HeaderName {
        let clean: String = name.chars().filter(|&ch| ch != '\0').collect();
        let clean = clean.trim();
        match clean.to_ascii_lowercase().as_str() {
            "from" => HeaderName::From,
            "sender" => HeaderName::Sender,
            "reply-to" => HeaderName::ReplyTo,
            "to" => HeaderName::To,
            "cc" => HeaderName::Cc,
            "bcc" => HeaderName::Bcc,
            "subject" => HeaderName::Subject,
            "date" => HeaderName::Date,
            "message-id" => HeaderName::MessageId,
            "in-reply-to" => HeaderName::InReplyTo,
            "references" => HeaderName::References,
            "supersedes" => HeaderName::Supersedes,
            "comments" => HeaderName::Comments,
            "keywords" => HeaderName::Keywords,
            "organization" => HeaderName::Organization,
            "user-agent" => HeaderName::UserAgent,
            "mime-version" => HeaderName::MimeVersion,
            "content-type" => HeaderName::ContentType,
            "content-transfer-encoding" => HeaderName::ContentTransferEncoding,
            "content-disposition" => HeaderName::ContentDisposition,
            "content-description" => HeaderName::ContentDescription,
            "content-id" => HeaderName::ContentId,
            "content-location" => HeaderName::ContentLocation,
            "received" => HeaderName::Received,
            "return-path" => HeaderName::ReturnPath,
            "newsgroups" => HeaderName::Newsgroups,
            "followup-to" => HeaderName::FollowupTo,
            "control" => HeaderName::Control,
            "lines" => HeaderName::Lines,
            "mail-copies-to" => HeaderName::MailCopiesTo,
            "mail-followup-to" => HeaderName::MailFollowupTo,
            _ => HeaderName::Other(clean.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            HeaderName::From => "From",
            HeaderName::Sender => "Sender",
            HeaderName::ReplyTo => "Reply-To",
            HeaderName::To => "To",
            HeaderName::Cc => "Cc",
            HeaderName::Bcc => "Bcc",
            HeaderName::Subject => "Subject",
            HeaderName::Date => "Date",
            HeaderName::MessageId => "Message-ID",
            HeaderName::InReplyTo => "In-Reply-To",
            HeaderName::References => "References",
            HeaderName::Supersedes => "Supersedes",
            HeaderName::Comments => "Comments",
            HeaderName::Keywords => "Keywords",
            HeaderName::Organization => "Organization",
            HeaderName::UserAgent => "User-Agent",
            HeaderName::MimeVersion => "MIME-Version",
            HeaderName::ContentType => "Content-Type",
            HeaderName::ContentTransferEncoding => "Content-Transfer-Encoding",
            HeaderName::ContentDisposition => "Content-Disposition",
            HeaderName::ContentDescription => "Content-Description",
            HeaderName::ContentId => "Content-ID",
            HeaderName::ContentLocation => "Content-Location",
            HeaderName::Received => "Received",
            HeaderName::ReturnPath => "Return-Path",
            HeaderName::Newsgroups => "Newsgroups",
            HeaderName::FollowupTo => "Followup-To",
            HeaderName::Control => "Control",
            HeaderName::Lines => "Lines",
            HeaderName::MailCopiesTo => "Mail-Copies-To",
            HeaderName::MailFollowupTo => "Mail-Followup-To",
            HeaderName::Other(name) => name,
        }
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HeaderName::Other(a), HeaderName::Other(b)) => a.eq_ignore_ascii_case(b),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for HeaderName {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

impl From<&str> for HeaderName {
    fn from(name: &str) -> Self {
        HeaderName::parse(name)
    }
}

/// The closed set of header grammar families.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HeaderValue {
    #[default]
    Empty,
    Unstructured(String),
    /// mailbox-list (From).
    Mailboxes(Vec<Mailbox>),
    /// A single mailbox (Sender).
    Mailbox(Mailbox),
    /// address-list (To, Cc, ...).
    Addresses(Vec<Address>),
    /// msg-id list (References, In-Reply-To), without angle brackets.
    Idents(Vec<String>),
    /// A single msg-id (Message-ID, Content-ID), without angle brackets.
    Ident(String),
    Token(String),
    /// Comma-separated phrases (Keywords).
    Phrases(Vec<String>),
    /// MIME-Version and friends.
    DotAtom(String),
    DateTime(DateTime),
    ContentType(ContentType),
    ContentDisposition(ContentDisposition),
    TransferEncoding(TransferEncoding),
    MailCopies(MailCopiesTo),
    /// Comma-or-whitespace separated newsgroup names.
    Newsgroups(Vec<String>),
    Lines(u32),
    Control(Control),
    /// Return-Path; `<>` is an empty addr-spec.
    ReturnPath(AddrSpec),
}

impl HeaderValue {
    /// "Empty" is type-specific: an address list with no addresses is empty,
    /// a Lines header is empty only when the count is unset, and so on.
    pub fn is_empty(&self) -> bool {
        match self {
            HeaderValue::Empty => true,
            HeaderValue::Unstructured(text) => text.is_empty(),
            HeaderValue::Mailboxes(list) => list.is_empty(),
            HeaderValue::Mailbox(mailbox) => mailbox.is_empty(),
            HeaderValue::Addresses(list) => list.is_empty(),
            HeaderValue::Idents(list) => list.is_empty(),
            HeaderValue::Ident(id) => id.is_empty(),
            HeaderValue::Token(token) => token.is_empty(),
            HeaderValue::Phrases(list) => list.is_empty(),
            HeaderValue::DotAtom(text) => text.is_empty(),
            HeaderValue::DateTime(_) => false,
            HeaderValue::ContentType(ct) => ct.is_empty(),
            HeaderValue::ContentDisposition(_) => false,
            HeaderValue::TransferEncoding(_) => false,
            HeaderValue::MailCopies(mct) => mct.is_empty(),
            HeaderValue::Newsgroups(list) => list.is_empty(),
            HeaderValue::Lines(_) => false,
            HeaderValue::Control(control) => control.is_empty(),
            HeaderValue::ReturnPath(_) => false,
        }
    }
}

/// One parsed header field: name, raw value bytes and the typed value.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    name: HeaderName,
    raw: String,
    value: HeaderValue,
}

impl Default for HeaderName {
    fn default() -> Self {
        HeaderName::Other(String::new())
    }
}

impl Header {
    pub fn new(name: HeaderName, value: HeaderValue) -> Header {
        Header {
            name,
            raw: String::new(),
            value,
        }
    }

    /// Parses a raw header value into the grammar family selected by the
    /// name. On a structured parse failure the raw bytes are retained and
    /// the value is `Empty`; the header still round-trips.
    pub fn parse(name: HeaderName, raw: &[u8]) -> Header {
        let value = parse_value(&name, raw);
        if value == HeaderValue::Empty && !raw.is_empty() {
            tracing::debug!(name = %name, "structured header kept unparsed");
        }
        Header {
            name,
            raw: String::from_utf8_lossy(raw).trim().to_string(),
            value,
        }
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn value(&self) -> &HeaderValue {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut HeaderValue {
        &mut self.value
    }

    pub fn set_value(&mut self, value: HeaderValue) {
        self.value = value;
    }

    /// The raw value bytes as captured at parse time (folding intact);
    /// empty for constructed headers.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.raw.is_empty()
    }

    /// Serializes the typed value back to its wire string, without the name
    /// or folding. `None` means the header should be omitted.
    pub fn serialize_value(&self) -> Option<String> {
        if self.value.is_empty() {
            return None;
        }
        Some(match &self.value {
            HeaderValue::Empty => unreachable!(),
            HeaderValue::Unstructured(text) => rfc2047::encode_text(text),
            HeaderValue::Mailboxes(list) => list
                .iter()
                .map(|mailbox| mailbox.to_wire())
                .collect::<Vec<_>>()
                .join(", "),
            HeaderValue::Mailbox(mailbox) => mailbox.to_wire(),
            HeaderValue::Addresses(list) => list
                .iter()
                .map(|address| address.to_wire())
                .collect::<Vec<_>>()
                .join(", "),
            HeaderValue::Idents(list) => list
                .iter()
                .map(|id| format!("<{}>", id))
                .collect::<Vec<_>>()
                .join(" "),
            HeaderValue::Ident(id) => format!("<{}>", id),
            HeaderValue::Token(token) => token.clone(),
            HeaderValue::Phrases(list) => list
                .iter()
                .map(|phrase| rfc2047::encode_phrase(phrase))
                .collect::<Vec<_>>()
                .join(", "),
            HeaderValue::DotAtom(text) => text.clone(),
            HeaderValue::DateTime(date) => date.to_rfc2822(),
            HeaderValue::ContentType(ct) => ct.to_wire(),
            HeaderValue::ContentDisposition(cd) => cd.to_wire(),
            HeaderValue::TransferEncoding(enc) => enc.as_str().to_string(),
            HeaderValue::MailCopies(mct) => mct.to_wire(),
            HeaderValue::Newsgroups(list) => list.join(","),
            HeaderValue::Lines(count) => count.to_string(),
            HeaderValue::Control(control) => control.to_wire(),
            HeaderValue::ReturnPath(spec) => format!("<{}>", spec.to_wire()),
        })
    }

    /// The full folded wire form, `Name: value\n`. `None` when the header is
    /// empty (the assembler omits it). A header whose structured parse
    /// failed serializes its retained raw bytes verbatim.
    pub fn to_wire(&self) -> Option<String> {
        match &self.value {
            HeaderValue::Empty => {
                if self.raw.is_empty() {
                    None
                } else {
                    Some(format!("{}: {}\n", self.name.as_str(), self.raw))
                }
            }
            _ => {
                let value = self.serialize_value()?;
                Some(format!("{}\n", fold::fold(self.name.as_str(), &value)))
            }
        }
    }
}

/// Unfolds and RFC 2047-decodes an unstructured value.
fn parse_unstructured(raw: &[u8]) -> String {
    let mut unfolded = String::with_capacity(raw.len());
    let mut pos = 0;
    while pos < raw.len() {
        let ch = raw[pos];
        if ch == b'\n' {
            unfolded.push(' ');
            pos += 1;
            while matches!(raw.get(pos), Some(b' ' | b'\t')) {
                pos += 1;
            }
        } else if ch < 0x80 {
            unfolded.push(ch as char);
            pos += 1;
        } else {
            let len = match ch {
                0xc0..=0xdf => 2,
                0xe0..=0xef => 3,
                0xf0..=0xf7 => 4,
                _ => 1,
            };
            let end = (pos + len).min(raw.len());
            unfolded.push_str(&String::from_utf8_lossy(&raw[pos..end]));
            pos = end;
        }
    }
    decode_rfc2047_text(unfolded.trim())
}

/// A msg-id: `<id-left@id-right>`, stored without the angle brackets.
fn parse_ident(cursor: &mut Cursor) -> Option<String> {
    cursor.skip_cfws();
    if !cursor.skip_byte(b'<') {
        return None;
    }
    let start = cursor.pos();
    while let Some(ch) = cursor.peek() {
        if ch == b'>' {
            let id = String::from_utf8_lossy(cursor.slice(start, cursor.pos())).into_owned();
            cursor.advance(1);
            return Some(id);
        }
        if ch == b'\n' && !cursor.peek_at(1).map_or(false, |c| c == b' ' || c == b'\t') {
            break;
        }
        cursor.advance(1);
    }
    None
}

fn parse_ident_list(raw: &[u8]) -> Vec<String> {
    let mut cursor = Cursor::new(raw);
    let mut idents = Vec::new();
    loop {
        cursor.skip_cfws();
        match cursor.peek() {
            Some(b',') => {
                cursor.advance(1);
            }
            Some(b'<') => match parse_ident(&mut cursor) {
                Some(id) => idents.push(id),
                None => break,
            },
            Some(_) => {
                // In-Reply-To tolerates stray phrases between ids.
                if cursor.parse_phrase().is_none() {
                    break;
                }
            }
            None => break,
        }
    }
    idents
}

fn parse_phrase_list(raw: &[u8]) -> Vec<String> {
    let mut cursor = Cursor::new(raw);
    let mut phrases = Vec::new();
    loop {
        cursor.skip_cfws();
        match cursor.peek() {
            Some(b',') => {
                cursor.advance(1);
            }
            Some(_) => match cursor.parse_phrase() {
                Some(phrase) => phrases.push(phrase),
                None => break,
            },
            None => break,
        }
    }
    phrases
}

/// Newsgroups / Followup-To: names separated by commas or whitespace, not
/// the address grammar.
fn parse_newsgroups(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .filter(|group| !group.is_empty())
        .map(|group| group.to_string())
        .collect()
}

fn parse_value(name: &HeaderName, raw: &[u8]) -> HeaderValue {
    match name {
        HeaderName::From => Cursor::new(raw)
            .parse_mailbox_list()
            .map(HeaderValue::Mailboxes)
            .unwrap_or_default(),
        HeaderName::Sender => Cursor::new(raw)
            .parse_mailbox()
            .map(HeaderValue::Mailbox)
            .unwrap_or_default(),
        HeaderName::ReplyTo
        | HeaderName::To
        | HeaderName::Cc
        | HeaderName::Bcc
        | HeaderName::MailFollowupTo => Cursor::new(raw)
            .parse_address_list()
            .map(HeaderValue::Addresses)
            .unwrap_or_default(),
        HeaderName::MessageId | HeaderName::ContentId | HeaderName::Supersedes => {
            parse_ident(&mut Cursor::new(raw))
                .map(HeaderValue::Ident)
                .unwrap_or_default()
        }
        HeaderName::InReplyTo | HeaderName::References => {
            let idents = parse_ident_list(raw);
            if idents.is_empty() {
                HeaderValue::Empty
            } else {
                HeaderValue::Idents(idents)
            }
        }
        HeaderName::Keywords => {
            let phrases = parse_phrase_list(raw);
            if phrases.is_empty() {
                HeaderValue::Empty
            } else {
                HeaderValue::Phrases(phrases)
            }
        }
        HeaderName::MimeVersion => {
            let mut cursor = Cursor::new(raw);
            cursor.skip_cfws();
            cursor
                .parse_dot_atom()
                .map(HeaderValue::DotAtom)
                .unwrap_or_default()
        }
        HeaderName::Date => parse_date_time(raw)
            .map(HeaderValue::DateTime)
            .unwrap_or_default(),
        HeaderName::ContentType => ContentType::parse(raw)
            .map(HeaderValue::ContentType)
            .unwrap_or_default(),
        HeaderName::ContentDisposition => ContentDisposition::parse(raw)
            .map(HeaderValue::ContentDisposition)
            .unwrap_or_default(),
        HeaderName::ContentTransferEncoding => {
            let text = String::from_utf8_lossy(raw);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                HeaderValue::Empty
            } else {
                HeaderValue::TransferEncoding(TransferEncoding::parse(trimmed))
            }
        }
        HeaderName::Newsgroups | HeaderName::FollowupTo => {
            let groups = parse_newsgroups(raw);
            if groups.is_empty() {
                HeaderValue::Empty
            } else {
                HeaderValue::Newsgroups(groups)
            }
        }
        HeaderName::Control => Control::parse(raw)
            .map(HeaderValue::Control)
            .unwrap_or_default(),
        HeaderName::Lines => {
            let text = String::from_utf8_lossy(raw);
            text.trim()
                .parse::<u32>()
                .map(HeaderValue::Lines)
                .unwrap_or_default()
        }
        HeaderName::MailCopiesTo => MailCopiesTo::parse(raw)
            .map(HeaderValue::MailCopies)
            .unwrap_or_default(),
        HeaderName::ReturnPath => {
            let mut cursor = Cursor::new(raw);
            cursor
                .parse_angle_addr()
                .or_else(|| cursor.parse_addr_spec())
                .map(HeaderValue::ReturnPath)
                .unwrap_or_default()
        }
        HeaderName::Subject
        | HeaderName::Comments
        | HeaderName::Organization
        | HeaderName::UserAgent
        | HeaderName::ContentDescription
        | HeaderName::ContentLocation
        | HeaderName::Received
        | HeaderName::Other(_) => {
            let text = parse_unstructured(raw);
            if text.is_empty() {
                HeaderValue::Empty
            } else {
                HeaderValue::Unstructured(text)
            }
        }
    }
}
