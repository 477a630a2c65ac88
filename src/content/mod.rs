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

//! The content tree: a [`Content`] node owns its raw head and body bytes, a
//! parsed header list and its child parts. `parse()` builds headers and
//! children from the raw bytes; `assemble()` regenerates the head from the
//! current headers; `encoded_content()` serializes the whole subtree back to
//! wire form.
//!
//! Ownership is strictly hierarchical: children are moved in with
//! [`Content::attach`] and moved out with [`Content::detach`], so a node can
//! never sit in two trees at once. Navigation is root-relative through
//! [`ContentIndex`] paths instead of parent pointers.

pub mod index;
pub mod message;
pub mod predicates;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::charfreq::encodings_for_data;
use crate::decoders::{self, charsets};
use crate::headers::value::{ContentDisposition, ContentType, DispositionType, TransferEncoding};
use crate::headers::{Header, HeaderName, HeaderValue};
use crate::parsers::multipart::split_multipart;
use crate::parsers::uuencode::{split_uuencoded, UuSplit};
use crate::parsers::yenc::{split_yenc, YencSplit};

pub use index::ContentIndex;

/// Trailing-whitespace policy for [`Content::decoded_text_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTrim {
    None,
    /// Trim trailing newlines.
    Newlines,
    /// Trim all trailing whitespace.
    Whitespace,
}

/// One node of the MIME content tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Content {
    head: Vec<u8>,
    body: Vec<u8>,
    headers: Vec<Header>,
    children: Vec<Content>,
    preamble: Vec<u8>,
    epilogue: Vec<u8>,
    frozen: bool,
    frozen_body: Vec<u8>,
    /// Whether `body` currently holds content-transfer-decoded bytes.
    decoded: bool,
}

impl Default for Content {
    fn default() -> Self {
        Content::new()
    }
}

impl Content {
    pub fn new() -> Content {
        Content {
            head: Vec::new(),
            body: Vec::new(),
            headers: Vec::new(),
            children: Vec::new(),
            preamble: Vec::new(),
            epilogue: Vec::new(),
            frozen: false,
            frozen_body: Vec::new(),
            decoded: true,
        }
    }

    /// Splits raw message bytes at the first blank line into head and body.
    /// Expects LF-only line endings (see [`crate::lf_only`]).
    pub fn set_content(&mut self, raw: &[u8]) {
        if let Some(body) = raw.strip_prefix(b"\n") {
            self.head.clear();
            self.body = body.to_vec();
        } else if let Some(pos) = raw.windows(2).position(|w| w == b"\n\n") {
            self.set_head(&raw[..pos + 1]);
            self.body = raw[pos + 2..].to_vec();
        } else {
            self.set_head(raw);
            self.body.clear();
        }
        self.decoded = false;
    }

    /// Sets the raw header block, normalized to end with exactly one newline.
    pub fn set_head(&mut self, head: &[u8]) {
        let mut head = head.to_vec();
        while head.last() == Some(&b'\n') {
            head.pop();
        }
        if !head.is_empty() {
            head.push(b'\n');
        }
        self.head = head;
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// Sets decoded body bytes.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.decoded = true;
    }

    /// Sets body bytes that already carry the content-transfer-encoding.
    pub fn set_encoded_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.decoded = false;
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Sets a text body, deriving the charset parameter and the
    /// Content-Transfer-Encoding from the bytes themselves (quoted-printable
    /// only when the content is mostly printable).
    pub fn set_text(&mut self, text: &str) {
        let bytes = text.as_bytes().to_vec();
        let encoding = encodings_for_data(&bytes)
            .into_iter()
            .next()
            .unwrap_or_default();
        let charset = if text.is_ascii() { "us-ascii" } else { "utf-8" };
        {
            let ct = self.content_type_mut();
            ct.set_mimetype("text", "plain");
            ct.set_parameter("charset", charset);
        }
        self.set_transfer_encoding(encoding);
        self.set_body(bytes);
    }

    pub fn preamble(&self) -> &[u8] {
        &self.preamble
    }

    pub fn set_preamble(&mut self, preamble: impl Into<Vec<u8>>) {
        self.preamble = preamble.into();
    }

    pub fn epilogue(&self) -> &[u8] {
        &self.epilogue
    }

    pub fn set_epilogue(&mut self, epilogue: impl Into<Vec<u8>>) {
        self.epilogue = epilogue.into();
    }

    // ---- headers -------------------------------------------------------

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Vec<Header> {
        &mut self.headers
    }

    /// First header with the given name; duplicates (e.g. Received) are
    /// reachable through [`headers`](Self::headers).
    pub fn header(&self, name: &HeaderName) -> Option<&Header> {
        self.headers.iter().find(|header| header.name() == name)
    }

    pub fn header_mut(&mut self, name: &HeaderName) -> Option<&mut Header> {
        self.headers.iter_mut().find(|header| header.name() == name)
    }

    /// Replaces the first header with the same name, or appends.
    pub fn set_header(&mut self, header: Header) {
        match self
            .headers
            .iter_mut()
            .find(|existing| existing.name() == header.name())
        {
            Some(existing) => *existing = header,
            None => self.headers.push(header),
        }
    }

    pub fn set_header_value(&mut self, name: HeaderName, value: HeaderValue) {
        self.set_header(Header::new(name, value));
    }

    /// Appends without replacing; for headers that may repeat.
    pub fn append_header(&mut self, header: Header) {
        self.headers.push(header);
    }

    /// Inserts a header at the front of the header block (trace headers
    /// like Received conventionally go first).
    pub fn prepend_header(&mut self, header: Header) {
        self.headers.insert(0, header);
    }

    /// All headers with the given name, in stored order.
    pub fn headers_named<'x>(
        &'x self,
        name: &'x HeaderName,
    ) -> impl Iterator<Item = &'x Header> + 'x {
        self.headers.iter().filter(move |header| header.name() == name)
    }

    /// Removes and returns the first header with the given name.
    pub fn remove_header(&mut self, name: &HeaderName) -> Option<Header> {
        let pos = self.headers.iter().position(|header| header.name() == name)?;
        Some(self.headers.remove(pos))
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        match self.header(&HeaderName::ContentType)?.value() {
            HeaderValue::ContentType(ct) => Some(ct),
            _ => None,
        }
    }

    /// The effective Content-Type: the parsed header, or the RFC 2045
    /// section 5.2 default (`text/plain; charset=us-ascii`) when absent.
    pub fn content_type_or_default(&self) -> ContentType {
        self.content_type().cloned().unwrap_or_default()
    }

    /// Mutable access to the Content-Type, materializing the default header
    /// first when absent or unparsed.
    pub fn content_type_mut(&mut self) -> &mut ContentType {
        let pos = self.headers.iter().position(|header| {
            header.name() == &HeaderName::ContentType
                && matches!(header.value(), HeaderValue::ContentType(_))
        });
        let pos = match pos {
            Some(pos) => pos,
            None => {
                self.remove_header(&HeaderName::ContentType);
                self.headers.push(Header::new(
                    HeaderName::ContentType,
                    HeaderValue::ContentType(ContentType::default()),
                ));
                self.headers.len() - 1
            }
        };
        match self.headers[pos].value_mut() {
            HeaderValue::ContentType(ct) => ct,
            _ => unreachable!(),
        }
    }

    pub fn content_transfer_encoding(&self) -> TransferEncoding {
        match self
            .header(&HeaderName::ContentTransferEncoding)
            .map(Header::value)
        {
            Some(HeaderValue::TransferEncoding(enc)) => enc.clone(),
            _ => TransferEncoding::SevenBit,
        }
    }

    pub fn set_transfer_encoding(&mut self, encoding: TransferEncoding) {
        self.set_header_value(
            HeaderName::ContentTransferEncoding,
            HeaderValue::TransferEncoding(encoding),
        );
    }

    pub fn content_disposition(&self) -> Option<&ContentDisposition> {
        match self.header(&HeaderName::ContentDisposition)?.value() {
            HeaderValue::ContentDisposition(cd) => Some(cd),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self.header(&HeaderName::ContentDescription)?.value() {
            HeaderValue::Unstructured(text) => Some(text),
            _ => None,
        }
    }

    /// Content-ID without its angle brackets.
    pub fn content_id(&self) -> Option<&str> {
        match self.header(&HeaderName::ContentId)?.value() {
            HeaderValue::Ident(id) => Some(id),
            _ => None,
        }
    }

    pub fn content_location(&self) -> Option<&str> {
        match self.header(&HeaderName::ContentLocation)?.value() {
            HeaderValue::Unstructured(text) => Some(text),
            _ => None,
        }
    }

    /// The part's file name: Content-Disposition `filename`, falling back to
    /// the Content-Type `name` parameter.
    pub fn filename(&self) -> Option<String> {
        if let Some(filename) = self.content_disposition().and_then(|cd| cd.filename()) {
            if !filename.is_empty() {
                return Some(filename.to_string());
            }
        }
        self.content_type()
            .and_then(|ct| ct.name())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
    }

    // ---- children ------------------------------------------------------

    pub fn contents(&self) -> &[Content] {
        &self.children
    }

    pub fn contents_mut(&mut self) -> &mut [Content] {
        &mut self.children
    }

    /// The encapsulated message of a `message/rfc822` node.
    pub fn encapsulated(&self) -> Option<&Content> {
        if self.content_type_or_default().is_mimetype("message/rfc822") {
            self.children.first()
        } else {
            None
        }
    }

    /// Attaches a child part, taking ownership (a node lives in at most one
    /// tree). A leaf with a body is promoted to `multipart/mixed` first: the
    /// existing body moves into a new first child along with its MIME
    /// headers.
    pub fn attach(&mut self, child: Content) {
        let is_multipart = self
            .content_type()
            .map_or(false, ContentType::is_multipart);
        if !is_multipart {
            if !self.body.is_empty() || !self.children.is_empty() {
                let mut main = Content::new();
                for name in [
                    HeaderName::ContentType,
                    HeaderName::ContentTransferEncoding,
                    HeaderName::ContentDisposition,
                ] {
                    if let Some(header) = self.remove_header(&name) {
                        main.append_header(header);
                    }
                }
                main.body = std::mem::take(&mut self.body);
                main.decoded = self.decoded;
                main.children = std::mem::take(&mut self.children);
                self.children.push(main);
            } else {
                self.remove_header(&HeaderName::ContentType);
            }
            self.decoded = true;
            let boundary = make_boundary();
            let ct = self.content_type_mut();
            ct.set_mimetype("multipart", "mixed");
            ct.remove_parameter("charset");
            ct.set_boundary(&boundary);
        } else {
            let missing_boundary = self
                .content_type()
                .and_then(ContentType::boundary)
                .map_or(true, str::is_empty);
            if missing_boundary {
                let boundary = make_boundary();
                self.content_type_mut().set_boundary(&boundary);
            }
        }
        self.children.push(child);
    }

    /// Detaches and returns the child at `position`, or `None` when out of
    /// range. The caller may re-attach it elsewhere; the single-parent
    /// invariant holds because the node is moved, never shared.
    pub fn detach(&mut self, position: usize) -> Option<Content> {
        if position < self.children.len() {
            Some(self.children.remove(position))
        } else {
            None
        }
    }

    // ---- freezing ------------------------------------------------------

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freezes the node: `assemble()` becomes a no-op and
    /// `encoded_content()` keeps returning the pre-freeze bytes even across
    /// `parse()`. Used to keep signed content bit-identical.
    pub fn set_frozen(&mut self, frozen: bool) {
        if frozen && !self.frozen && !self.body.is_empty() && self.frozen_body.is_empty() {
            self.frozen_body = self.encoded_body();
        }
        if !frozen {
            self.frozen_body.clear();
        }
        self.frozen = frozen;
    }

    // ---- parse / assemble ----------------------------------------------

    /// Parses headers and children from the raw head/body bytes, replacing
    /// any previously parsed state.
    ///
    /// Single-parse contract: the first `parse()` consumes the raw body of
    /// containers (multipart and `message/rfc822`); calling `parse()` again
    /// after that, or after structural mutation, is lossy for those nodes.
    pub fn parse(&mut self) {
        self.parse_at_depth(0);
    }

    fn parse_at_depth(&mut self, depth: usize) {
        self.headers.clear();
        self.children.clear();
        self.preamble.clear();
        self.epilogue.clear();

        let head = std::mem::take(&mut self.head);
        for (name, value) in split_header_lines(&head) {
            self.headers
                .push(Header::parse(HeaderName::parse(&name), &value));
        }
        self.head = head;

        // Snapshot before any structural mutation so frozen bytes survive.
        if self.frozen && self.frozen_body.is_empty() {
            self.frozen_body = self.body.clone();
        }

        let ct = self.content_type_or_default();
        let encoding = self.content_transfer_encoding();

        // Nesting bound for attacker-controlled input: beyond it, containers
        // stay opaque leaves instead of recursing.
        if depth >= MAX_NESTING && (ct.is_multipart() || ct.is_mimetype("message/rfc822")) {
            tracing::warn!(depth, "nesting limit reached, keeping part opaque");
            self.decoded = !encoding.needs_encoding();
            return;
        }

        if ct.is_multipart() {
            let split = ct
                .boundary()
                .filter(|boundary| !boundary.is_empty())
                .and_then(|boundary| split_multipart(&self.body, boundary.as_bytes()));
            match split {
                Some(split) => {
                    self.preamble = split.preamble;
                    self.epilogue = split.epilogue;
                    for part in split.parts {
                        let mut child = Content::new();
                        child.set_content(&part);
                        child.parse_at_depth(depth + 1);
                        self.children.push(child);
                    }
                    self.body.clear();
                    self.decoded = true;
                }
                None => {
                    // Never leave a multipart node with neither children nor
                    // body: downgrade to an opaque text leaf.
                    tracing::warn!("multipart body without usable boundary, downgrading");
                    self.set_header_value(
                        HeaderName::ContentType,
                        HeaderValue::ContentType(ContentType::default()),
                    );
                    self.decoded = !encoding.needs_encoding();
                }
            }
        } else if ct.is_mimetype("message/rfc822") {
            let raw = if self.decoded || !encoding.needs_encoding() {
                std::mem::take(&mut self.body)
            } else {
                let body = std::mem::take(&mut self.body);
                decoders::decode_transfer(&body, &encoding)
            };
            let mut child = Content::new();
            child.set_content(&raw);
            child.parse_at_depth(depth + 1);
            self.children.push(child);
            self.decoded = true;
        } else if ct.is_plain_text() && !encoding.needs_encoding() {
            if let Some(split) = split_uuencoded(&self.body) {
                self.promote_uuencoded(split);
            } else if let Some(split) = split_yenc(&self.body) {
                self.promote_yenc(split);
            } else {
                self.decoded = true;
            }
        } else {
            self.decoded = !encoding.needs_encoding();
        }
    }

    /// Regenerates `head` (recursively) from the current header objects.
    /// No-op for frozen nodes. Empty headers are omitted; a multipart node
    /// with children is given a boundary if it lacks one.
    pub fn assemble(&mut self) {
        if self.frozen {
            return;
        }
        if !self.children.is_empty() && self.content_type_or_default().is_multipart() {
            let missing_boundary = self
                .content_type()
                .and_then(ContentType::boundary)
                .map_or(true, str::is_empty);
            if missing_boundary {
                let boundary = make_boundary();
                self.content_type_mut().set_boundary(&boundary);
            }
        }
        for child in &mut self.children {
            child.assemble();
        }
        let mut head = Vec::with_capacity(self.head.len());
        for header in &self.headers {
            if let Some(wire) = header.to_wire() {
                head.extend_from_slice(wire.as_bytes());
            }
        }
        self.head = head;
    }

    // ---- serialization -------------------------------------------------

    /// The full wire form: head, separator and encoded body. The separator
    /// guarantees at least two newlines between head and body without
    /// altering an existing separator (byte layout matters for signatures).
    pub fn encoded_content(&self) -> Vec<u8> {
        let mut out = self.head.clone();
        if out.is_empty() {
            out.push(b'\n');
        } else {
            let mut trailing = out.iter().rev().take_while(|&&b| b == b'\n').count();
            while trailing < 2 {
                out.push(b'\n');
                trailing += 1;
            }
        }
        out.extend_from_slice(&self.encoded_body());
        out
    }

    /// The encoded body: leaf bytes with the content-transfer-encoding
    /// applied, or children joined with boundary lines. Frozen nodes return
    /// their snapshot verbatim.
    pub fn encoded_body(&self) -> Vec<u8> {
        if self.frozen {
            return if self.frozen_body.is_empty() {
                self.body.clone()
            } else {
                self.frozen_body.clone()
            };
        }
        if !self.children.is_empty() {
            let ct = self.content_type_or_default();
            if !ct.is_multipart() {
                // Encapsulated message.
                return self.children[0].encoded_content();
            }
            let boundary = ct.boundary().unwrap_or("").as_bytes().to_vec();
            let mut out = Vec::new();
            out.extend_from_slice(&self.preamble);
            for child in &self.children {
                if !out.is_empty() {
                    out.push(b'\n');
                }
                out.extend_from_slice(b"--");
                out.extend_from_slice(&boundary);
                out.push(b'\n');
                out.extend_from_slice(&child.encoded_content());
            }
            out.push(b'\n');
            out.extend_from_slice(b"--");
            out.extend_from_slice(&boundary);
            out.extend_from_slice(b"--\n");
            out.extend_from_slice(&self.epilogue);
            return out;
        }
        let encoding = self.content_transfer_encoding();
        if self.decoded && encoding.needs_encoding() {
            decoders::encode_transfer(&self.body, &encoding)
        } else {
            self.body.clone()
        }
    }

    /// Content-transfer-decoded body bytes. Idempotent: the `decoded` flag
    /// tracks the body's current state, so repeated calls never decode
    /// twice.
    pub fn decoded_content(&self) -> Vec<u8> {
        let body = if self.frozen && !self.frozen_body.is_empty() {
            &self.frozen_body
        } else {
            &self.body
        };
        if self.decoded {
            body.clone()
        } else {
            decoders::decode_transfer(body, &self.content_transfer_encoding())
        }
    }

    /// Decoded body transcoded to a string using the charset parameter.
    pub fn decoded_text(&self) -> String {
        self.decoded_text_with(TextTrim::None)
    }

    pub fn decoded_text_with(&self, trim: TextTrim) -> String {
        let ct = self.content_type_or_default();
        let charset = ct.charset().unwrap_or("us-ascii");
        let text = charsets::decode_charset(&self.decoded_content(), charset);
        match trim {
            TextTrim::None => text,
            TextTrim::Newlines => text.trim_end_matches('\n').to_string(),
            TextTrim::Whitespace => text.trim_end().to_string(),
        }
    }

    // ---- navigation ----------------------------------------------------

    /// Resolves a 1-based index path from this node; the empty index is the
    /// node itself.
    pub fn content_at(&self, index: &ContentIndex) -> Option<&Content> {
        let mut node = self;
        for level in index.levels() {
            node = node.children.get((*level as usize).checked_sub(1)?)?;
        }
        Some(node)
    }

    pub fn content_at_mut(&mut self, index: &ContentIndex) -> Option<&mut Content> {
        let mut node = self;
        for level in index.levels() {
            node = node.children.get_mut((*level as usize).checked_sub(1)?)?;
        }
        Some(node)
    }

    /// The index path of `target` below this node, found by node identity.
    /// The empty index means `target` is this node itself.
    pub fn index_for(&self, target: &Content) -> Option<ContentIndex> {
        fn walk(node: &Content, target: *const Content, path: &mut ContentIndex) -> bool {
            for (pos, child) in node.children.iter().enumerate() {
                path.push(pos as u32 + 1);
                if std::ptr::eq(child, target) || walk(child, target, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        if std::ptr::eq(self, target) {
            return Some(ContentIndex::new());
        }
        let mut path = ContentIndex::new();
        if walk(self, target, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    /// The designated main text part: the first `text/plain` leaf in
    /// depth-first order, this node included.
    pub fn text_content(&self) -> Option<&Content> {
        if self.children.is_empty() && self.content_type_or_default().is_plain_text() {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.text_content())
    }

    // ---- non-MIME recovery ---------------------------------------------

    fn promote_uuencoded(&mut self, split: UuSplit) {
        tracing::debug!("promoting uuencoded body to multipart/mixed");
        self.begin_synthetic_multipart(&split.text);
        for part in split.parts {
            let mut child = Content::new();
            let mut ct = ContentType::new("application", "octet-stream");
            ct.set_parameter("name", &part.filename);
            child.set_header_value(HeaderName::ContentType, HeaderValue::ContentType(ct));
            let mut cd = ContentDisposition::new(DispositionType::Attachment);
            cd.set_filename(&part.filename);
            child.set_header_value(
                HeaderName::ContentDisposition,
                HeaderValue::ContentDisposition(cd),
            );
            child.set_transfer_encoding(TransferEncoding::Base64);
            child.set_body(part.data);
            self.children.push(child);
        }
        self.body.clear();
        self.decoded = true;
    }

    fn promote_yenc(&mut self, split: YencSplit) {
        tracing::debug!("promoting yEnc body to multipart/mixed");
        self.begin_synthetic_multipart(&split.text);
        for part in split.parts {
            let mut child = Content::new();
            let mut ct = match part.part {
                Some((number, total)) => {
                    let mut ct = ContentType::new("message", "partial");
                    ct.set_parameter("number", &number.to_string());
                    ct.set_parameter("total", &total.to_string());
                    ct
                }
                None => ContentType::new("application", "octet-stream"),
            };
            ct.set_parameter("name", &part.filename);
            child.set_header_value(HeaderName::ContentType, HeaderValue::ContentType(ct));
            let mut cd = ContentDisposition::new(DispositionType::Attachment);
            cd.set_filename(&part.filename);
            child.set_header_value(
                HeaderName::ContentDisposition,
                HeaderValue::ContentDisposition(cd),
            );
            child.set_transfer_encoding(TransferEncoding::Base64);
            child.set_body(part.data);
            self.children.push(child);
        }
        self.body.clear();
        self.decoded = true;
    }

    /// Turns this node into a `multipart/mixed` container with a leading
    /// `text/plain` part holding the prose around the recovered blocks.
    fn begin_synthetic_multipart(&mut self, text: &[u8]) {
        let boundary = make_boundary();
        let mut ct = ContentType::new("multipart", "mixed");
        ct.set_boundary(&boundary);
        self.set_header_value(HeaderName::ContentType, HeaderValue::ContentType(ct));

        if !text.iter().all(|b| b.is_ascii_whitespace()) {
            let mut prose = Content::new();
            prose.set_header_value(
                HeaderName::ContentType,
                HeaderValue::ContentType(ContentType::default()),
            );
            prose.set_body(text.to_vec());
            self.children.push(prose);
        }
    }
}

/// Splits a raw header block into `(name, value)` pairs, keeping folded
/// continuation lines inside the value. Lines without a colon are skipped.
fn split_header_lines(head: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut fields: Vec<(String, Vec<u8>)> = Vec::new();
    let mut current: Option<(String, Vec<u8>)> = None;

    for line in head.split_inclusive(|&b| b == b'\n') {
        let stripped = line.strip_suffix(b"\n").unwrap_or(line);
        if stripped.is_empty() {
            continue;
        }
        if matches!(stripped.first(), Some(b' ' | b'\t')) {
            if let Some((_, value)) = &mut current {
                value.push(b'\n');
                value.extend_from_slice(stripped);
            }
            continue;
        }
        match stripped.iter().position(|&b| b == b':') {
            Some(colon) => {
                if let Some(field) = current.take() {
                    fields.push(field);
                }
                let name = String::from_utf8_lossy(&stripped[..colon]).into_owned();
                let mut value = &stripped[colon + 1..];
                while matches!(value.first(), Some(b' ' | b'\t')) {
                    value = &value[1..];
                }
                current = Some((name, value.to_vec()));
            }
            None => {
                tracing::debug!("skipping header line without a colon");
            }
        }
    }
    if let Some(field) = current {
        fields.push(field);
    }
    fields
}

/// Maximum multipart/encapsulation nesting depth parsed before a container
/// is kept as an opaque leaf.
const MAX_NESTING: usize = 100;

static BOUNDARY_SEQ: AtomicU64 = AtomicU64::new(0);

/// Generates an RFC 2046-legal boundary unlikely to occur in content.
pub fn make_boundary() -> String {
    let seq = BOUNDARY_SEQ.fetch_add(1, Ordering::Relaxed);
    let clock = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default() as u64;
    format!("nextPart{:012x}.{:06x}", clock & 0xffff_ffff_ffff, seq)
}

#[cfg(test)]
mod tests {
    use super::{make_boundary, Content, TextTrim};
    use crate::headers::value::TransferEncoding;
    use crate::headers::{HeaderName, HeaderValue};
    use crate::ContentIndex;

    fn parsed(raw: &str) -> Content {
        let mut content = Content::new();
        content.set_content(raw.as_bytes());
        content.parse();
        content
    }

    #[test]
    fn head_body_split() {
        let mut content = Content::new();
        content.set_content(b"Subject: hi\n\nbody text\n");
        assert_eq!(content.head(), b"Subject: hi\n");
        assert_eq!(content.body(), b"body text\n");

        // Empty head.
        content.set_content(b"\njust a body");
        assert!(content.head().is_empty());
        assert_eq!(content.body(), b"just a body");

        // No blank line: everything is head.
        content.set_content(b"Subject: only headers");
        assert_eq!(content.head(), b"Subject: only headers\n");
        assert!(content.body().is_empty());
    }

    #[test]
    fn set_head_normalizes_trailing_newlines() {
        let mut content = Content::new();
        content.set_head(b"Subject: hi\n\n\n");
        assert_eq!(content.head(), b"Subject: hi\n");
    }

    #[test]
    fn parse_headers_and_leaf_body() {
        let content = parsed("Subject: hi\nX-Custom: x\n\nbody\n");
        assert_eq!(content.headers().len(), 2);
        assert_eq!(
            content.header(&HeaderName::Subject).unwrap().value(),
            &HeaderValue::Unstructured("hi".to_string())
        );
        assert_eq!(content.content_type_or_default().mimetype(), "text/plain");
        assert_eq!(content.decoded_content(), b"body\n".to_vec());
        assert!(content.contents().is_empty());
    }

    #[test]
    fn parse_multipart_builds_children() {
        let content = parsed(concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\n",
            "\n",
            "--b\n",
            "\n",
            "first\n",
            "--b\n",
            "Content-Type: text/html\n",
            "\n",
            "<p>second</p>\n",
            "--b--\n"
        ));
        assert_eq!(content.contents().len(), 2);
        assert!(content.body().is_empty());
        assert_eq!(content.contents()[0].decoded_content(), b"first".to_vec());
        assert_eq!(
            content.contents()[1].content_type_or_default().mimetype(),
            "text/html"
        );
    }

    #[test]
    fn multipart_without_boundary_downgrades() {
        let content = parsed(concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\n",
            "\n",
            "there is no boundary in here\n"
        ));
        assert!(content.contents().is_empty());
        assert_eq!(content.content_type_or_default().mimetype(), "text/plain");
        assert_eq!(
            content.decoded_content(),
            b"there is no boundary in here\n".to_vec()
        );
    }

    #[test]
    fn message_rfc822_encapsulation() {
        let content = parsed(concat!(
            "Content-Type: message/rfc822\n",
            "\n",
            "Subject: inner\n",
            "\n",
            "inner body\n"
        ));
        assert_eq!(content.contents().len(), 1);
        assert!(content.body().is_empty());
        let inner = content.encapsulated().unwrap();
        assert_eq!(
            inner.header(&HeaderName::Subject).unwrap().value(),
            &HeaderValue::Unstructured("inner".to_string())
        );
        assert_eq!(inner.decoded_content(), b"inner body\n".to_vec());
    }

    #[test]
    fn base64_leaf_decodes_idempotently() {
        let content = parsed(concat!(
            "Content-Type: application/octet-stream\n",
            "Content-Transfer-Encoding: base64\n",
            "\n",
            "SGVsbG8gd29ybGQ=\n"
        ));
        let first = content.decoded_content();
        assert_eq!(first, b"Hello world".to_vec());
        // Repeated calls yield identical bytes.
        assert_eq!(content.decoded_content(), first);
        assert_eq!(content.decoded_content(), first);
    }

    #[test]
    fn decoded_text_applies_charset_and_trim() {
        let content = parsed(concat!(
            "Content-Type: text/plain; charset=iso-8859-1\n",
            "Content-Transfer-Encoding: quoted-printable\n",
            "\n",
            "caf=E9  \n\n"
        ));
        assert_eq!(content.decoded_text(), "café  \n\n");
        assert_eq!(
            content.decoded_text_with(TextTrim::Newlines),
            "café  "
        );
        assert_eq!(content.decoded_text_with(TextTrim::Whitespace), "café");
    }

    #[test]
    fn encoded_body_applies_pending_encoding() {
        let mut content = Content::new();
        content.set_transfer_encoding(TransferEncoding::Base64);
        content.set_body(b"Hello world".to_vec());
        assert_eq!(content.encoded_body(), b"SGVsbG8gd29ybGQ=\n".to_vec());
        // An already-encoded body passes through verbatim.
        let mut content = Content::new();
        content.set_transfer_encoding(TransferEncoding::Base64);
        content.set_encoded_body(b"SGVsbG8gd29ybGQ=\n".to_vec());
        assert_eq!(content.encoded_body(), b"SGVsbG8gd29ybGQ=\n".to_vec());
    }

    #[test]
    fn separator_rules() {
        let mut content = Content::new();
        content.set_head(b"Subject: hi\n");
        content.set_body(b"body".to_vec());
        assert_eq!(content.encoded_content(), b"Subject: hi\n\nbody".to_vec());

        // Empty head: a single newline separates nothing from the body.
        let mut content = Content::new();
        content.set_body(b"body".to_vec());
        assert_eq!(content.encoded_content(), b"\nbody".to_vec());
    }

    #[test]
    fn freezing_keeps_bytes_stable() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"sig\"\n",
            "\n",
            "--sig\n",
            "\n",
            "signed text\n",
            "--sig--\n",
            "trailing\n"
        );
        let mut content = Content::new();
        content.set_content(raw.as_bytes());
        content.set_frozen(true);
        let before = content.encoded_content();
        content.parse();
        let after_parse = content.encoded_content();
        content.assemble();
        let after_assemble = content.encoded_content();
        assert_eq!(before, after_parse);
        assert_eq!(before, after_assemble);
    }

    #[test]
    fn attach_promotes_leaf_to_multipart() {
        let mut content = Content::new();
        content.set_header_value(
            HeaderName::ContentType,
            HeaderValue::ContentType(crate::ContentType::new("text", "plain")),
        );
        content.set_body(b"hello".to_vec());

        let mut attachment = Content::new();
        attachment.set_body(b"data".to_vec());
        content.attach(attachment);

        let ct = content.content_type_or_default();
        assert_eq!(ct.mimetype(), "multipart/mixed");
        assert!(ct.boundary().is_some());
        assert_eq!(content.contents().len(), 2);
        assert_eq!(content.contents()[0].body(), b"hello");
        assert!(content.body().is_empty());
        assert_eq!(
            content.contents()[0].content_type_or_default().mimetype(),
            "text/plain"
        );

        // Further attaches do not promote again.
        let mut another = Content::new();
        another.set_body(b"more".to_vec());
        content.attach(another);
        assert_eq!(content.contents().len(), 3);
    }

    #[test]
    fn detach_moves_node_out() {
        let mut content = parsed(concat!(
            "Content-Type: multipart/mixed; boundary=\"b\"\n",
            "\n",
            "--b\n\none\n--b\n\ntwo\n--b--\n"
        ));
        assert_eq!(content.contents().len(), 2);
        let detached = content.detach(0).unwrap();
        assert_eq!(detached.decoded_content(), b"one".to_vec());
        assert_eq!(content.contents().len(), 1);
        assert_eq!(content.detach(5), None);
    }

    #[test]
    fn navigation_by_index() {
        let content = parsed(concat!(
            "Content-Type: multipart/mixed; boundary=\"outer\"\n",
            "\n",
            "--outer\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\n",
            "\n",
            "--inner\n",
            "\n",
            "plain\n",
            "--inner\n",
            "Content-Type: text/html\n",
            "\n",
            "<p>html</p>\n",
            "--inner--\n",
            "--outer\n",
            "\n",
            "attachment data\n",
            "--outer--\n"
        ));
        let index: ContentIndex = "1.2".parse().unwrap();
        let html = content.content_at(&index).unwrap();
        assert_eq!(html.content_type_or_default().mimetype(), "text/html");

        // index_for is the inverse of content_at.
        assert_eq!(content.index_for(html), Some(index));
        assert_eq!(
            content.index_for(&content).map(|i| i.is_empty()),
            Some(true)
        );

        let text = content.text_content().unwrap();
        assert_eq!(content.index_for(text).unwrap().to_string(), "1.1");

        assert!(content
            .content_at(&"7.9".parse::<ContentIndex>().unwrap())
            .is_none());
    }

    #[test]
    fn uuencode_recovery_promotes_to_multipart() {
        let content = parsed(concat!(
            "Subject: legacy binary\n",
            "\n",
            "Here you go.\n",
            "begin 644 cat.txt\n",
            "#0V%T\n",
            "`\n",
            "end\n"
        ));
        let ct = content.content_type_or_default();
        assert_eq!(ct.mimetype(), "multipart/mixed");
        assert_eq!(content.contents().len(), 2);
        assert_eq!(
            content.contents()[0].decoded_content(),
            b"Here you go.\n".to_vec()
        );
        let binary = &content.contents()[1];
        assert_eq!(
            binary.content_type_or_default().mimetype(),
            "application/octet-stream"
        );
        assert_eq!(binary.filename().as_deref(), Some("cat.txt"));
        assert_eq!(binary.decoded_content(), b"Cat".to_vec());
        // The in-memory representation re-encodes to base64.
        assert_eq!(binary.encoded_body(), b"Q2F0\n".to_vec());
    }

    #[test]
    fn yenc_recovery_builds_message_partial() {
        let mut raw = concat!(
            "Subject: series\n",
            "\n",
            "=ybegin part=1 total=2 line=128 size=3 name=blob.bin\n"
        )
        .as_bytes()
        .to_vec();
        // "abc" yEnc-encoded.
        raw.extend_from_slice(&[b'a' + 42, b'b' + 42, b'c' + 42]);
        raw.extend_from_slice(b"\n=yend size=3 part=1\n");
        let mut content = Content::new();
        content.set_content(&raw);
        content.parse();
        assert_eq!(
            content.content_type_or_default().mimetype(),
            "multipart/mixed"
        );
        let partial = &content.contents()[0];
        let ct = partial.content_type_or_default();
        assert_eq!(ct.mimetype(), "message/partial");
        assert_eq!(ct.parameter("number"), Some("1"));
        assert_eq!(ct.parameter("total"), Some("2"));
        assert_eq!(partial.decoded_content(), b"abc".to_vec());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        // 300 encapsulation levels; parsing must stop at the nesting limit
        // rather than recursing to the bottom.
        let mut raw = String::new();
        for _ in 0..300 {
            raw.push_str("Content-Type: message/rfc822\n\n");
        }
        raw.push_str("deep\n");
        let mut content = Content::new();
        content.set_content(raw.as_bytes());
        content.parse();

        let mut depth = 0;
        let mut node = &content;
        while let Some(child) = node.contents().first() {
            node = child;
            depth += 1;
        }
        assert_eq!(depth, 100);
        // The node at the limit keeps its raw body.
        assert!(!node.body().is_empty());
    }

    #[test]
    fn boundaries_are_unique() {
        let a = make_boundary();
        let b = make_boundary();
        assert_ne!(a, b);
        assert!(a.starts_with("nextPart"));
    }

    #[test]
    fn set_text_chooses_charset_and_encoding() {
        let mut content = Content::new();
        content.set_text("plain ascii\n");
        assert_eq!(content.content_type_or_default().charset(), Some("us-ascii"));
        assert_eq!(
            content.content_transfer_encoding(),
            TransferEncoding::SevenBit
        );

        let mut content = Content::new();
        content.set_text("caf\u{e9} au lait\n");
        assert_eq!(content.content_type_or_default().charset(), Some("utf-8"));
        assert_eq!(
            content.content_transfer_encoding(),
            TransferEncoding::EightBit
        );

        // Trailing whitespace forces a protective encoding.
        let mut content = Content::new();
        content.set_text("trailing \n");
        assert_eq!(
            content.content_transfer_encoding(),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(content.encoded_body(), b"trailing=20\n".to_vec());
    }

    #[test]
    fn duplicate_headers_are_iterable() {
        let content = parsed(concat!(
            "Received: from a.example.com\n",
            "Received: from b.example.com\n",
            "Subject: multi\n",
            "\n",
            "body\n"
        ));
        assert_eq!(
            content.headers_named(&HeaderName::Received).count(),
            2
        );
        assert_eq!(content.headers_named(&HeaderName::Subject).count(), 1);
    }

    #[test]
    fn nul_in_header_name_is_stripped() {
        let content = parsed("Sub\0ject: tolerated\n\nbody\n");
        assert_eq!(
            content.header(&HeaderName::Subject).unwrap().value(),
            &HeaderValue::Unstructured("tolerated".to_string())
        );
    }
}
