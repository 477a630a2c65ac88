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

//! Structured values for the MIME headers with bespoke grammars:
//! Content-Type, Content-Disposition, Content-Transfer-Encoding,
//! Mail-Copies-To and the Usenet Control header.

use std::fmt;

use crate::headers::rfc2047;
use crate::parsers::cursor::{is_ttext, Cursor};
use crate::parsers::parameters::{decode_parameter_list, parse_parameter_list};
use crate::Address;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An RFC 2045 Content-Transfer-Encoding token. Unrecognized tokens are
/// preserved verbatim rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    QuotedPrintable,
    Base64,
    Uuencode,
    Binary,
    Other(String),
}

impl TransferEncoding {
    pub fn parse(token: &str) -> TransferEncoding {
        let token = token.trim();
        match token.to_ascii_lowercase().as_str() {
            "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            "base64" => TransferEncoding::Base64,
            "x-uuencode" | "x-uue" | "uuencode" => TransferEncoding::Uuencode,
            "binary" => TransferEncoding::Binary,
            _ => TransferEncoding::Other(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::Uuencode => "x-uuencode",
            TransferEncoding::Binary => "binary",
            TransferEncoding::Other(token) => token,
        }
    }

    /// Whether body bytes differ between their decoded and encoded forms.
    pub fn needs_encoding(&self) -> bool {
        matches!(
            self,
            TransferEncoding::QuotedPrintable
                | TransferEncoding::Base64
                | TransferEncoding::Uuencode
        )
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// An RFC 2045 Content-Type value: media type, subtype and parameters in
/// their original order. When the header is absent the RFC 2045 section 5.2
/// default applies, which is also this type's `Default`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentType {
    mtype: String,
    subtype: String,
    params: Vec<(String, String)>,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType {
            mtype: "text".to_string(),
            subtype: "plain".to_string(),
            params: vec![("charset".to_string(), "us-ascii".to_string())],
        }
    }
}

impl ContentType {
    pub fn new(mtype: &str, subtype: &str) -> ContentType {
        ContentType {
            mtype: mtype.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    pub fn parse(raw: &[u8]) -> Option<ContentType> {
        let mut cursor = Cursor::new(raw);
        cursor.skip_cfws();
        let mtype = cursor.parse_token()?;
        if !cursor.skip_byte(b'/') {
            return None;
        }
        let subtype = cursor.parse_token()?;
        cursor.skip_cfws();
        let params = decode_parameter_list(parse_parameter_list(&mut cursor));
        Some(ContentType {
            mtype: mtype.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    pub fn media_type(&self) -> &str {
        &self.mtype
    }

    pub fn media_subtype(&self) -> &str {
        &self.subtype
    }

    pub fn mimetype(&self) -> String {
        format!("{}/{}", self.mtype, self.subtype)
    }

    pub fn set_mimetype(&mut self, mtype: &str, subtype: &str) {
        self.mtype = mtype.to_ascii_lowercase();
        self.subtype = subtype.to_ascii_lowercase();
    }

    /// Case-insensitive comparison against `type/subtype`; a subtype of `*`
    /// matches any subtype.
    pub fn is_mimetype(&self, pattern: &str) -> bool {
        match pattern.split_once('/') {
            Some((mtype, "*")) => self.mtype.eq_ignore_ascii_case(mtype),
            Some((mtype, subtype)) => {
                self.mtype.eq_ignore_ascii_case(mtype)
                    && self.subtype.eq_ignore_ascii_case(subtype)
            }
            None => self.mtype.eq_ignore_ascii_case(pattern),
        }
    }

    pub fn is_multipart(&self) -> bool {
        self.mtype.eq_ignore_ascii_case("multipart")
    }

    /// A multipart is never text, whatever its subtype claims.
    pub fn is_text(&self) -> bool {
        self.mtype.eq_ignore_ascii_case("text")
    }

    pub fn is_plain_text(&self) -> bool {
        self.is_mimetype("text/plain")
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_parameter(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.params.iter_mut().find(|(param, _)| *param == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.params.push((name, value.to_string())),
        }
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.params
            .retain(|(param, _)| !param.eq_ignore_ascii_case(name));
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    pub fn set_boundary(&mut self, boundary: &str) {
        self.set_parameter("boundary", boundary);
    }

    pub fn charset(&self) -> Option<&str> {
        self.parameter("charset")
    }

    pub fn name(&self) -> Option<&str> {
        self.parameter("name")
    }

    pub fn is_empty(&self) -> bool {
        self.mtype.is_empty()
    }

    pub fn to_wire(&self) -> String {
        let mut out = self.mimetype();
        for (name, value) in &self.params {
            out.push_str("; ");
            out.push_str(name);
            out.push('=');
            out.push_str(&quote_parameter_value(value));
        }
        out
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.to_wire())
    }
}

fn quote_parameter_value(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(is_ttext) {
        value.to_string()
    } else {
        rfc2047::quote_string(value)
    }
}

/// An RFC 2183 disposition token. Unlike Content-Type there is no default:
/// an unrecognized token is a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DispositionType {
    Inline,
    Attachment,
}

impl DispositionType {
    pub fn as_str(&self) -> &str {
        match self {
            DispositionType::Inline => "inline",
            DispositionType::Attachment => "attachment",
        }
    }
}

/// An RFC 2183 Content-Disposition value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContentDisposition {
    pub disposition: DispositionType,
    params: Vec<(String, String)>,
}

impl ContentDisposition {
    pub fn new(disposition: DispositionType) -> ContentDisposition {
        ContentDisposition {
            disposition,
            params: Vec::new(),
        }
    }

    pub fn parse(raw: &[u8]) -> Option<ContentDisposition> {
        let mut cursor = Cursor::new(raw);
        cursor.skip_cfws();
        let token = cursor.parse_token()?;
        let disposition = match token.to_ascii_lowercase().as_str() {
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            _ => return None,
        };
        cursor.skip_cfws();
        let params = decode_parameter_list(parse_parameter_list(&mut cursor));
        Some(ContentDisposition {
            disposition,
            params,
        })
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition == DispositionType::Attachment
    }

    pub fn is_inline(&self) -> bool {
        self.disposition == DispositionType::Inline
    }

    pub fn filename(&self) -> Option<&str> {
        self.parameter("filename")
    }

    pub fn set_filename(&mut self, filename: &str) {
        self.set_parameter("filename", filename);
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(param, _)| param.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn set_parameter(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.params.iter_mut().find(|(param, _)| *param == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.params.push((name, value.to_string())),
        }
    }

    pub fn to_wire(&self) -> String {
        let mut out = self.disposition.as_str().to_string();
        for (name, value) in &self.params {
            out.push_str("; ");
            out.push_str(name);
            out.push('=');
            out.push_str(&quote_parameter_value(value));
        }
        out
    }
}

/// The Usenet Mail-Copies-To tri-state: copy always, never, or to an
/// explicit address list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MailCopiesTo {
    Always,
    Never,
    Addresses(Vec<Address>),
}

impl MailCopiesTo {
    /// The `always`/`poster` and `never`/`nobody` literals are checked
    /// (case-insensitively) before attempting the full address-list grammar.
    pub fn parse(raw: &[u8]) -> Option<MailCopiesTo> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("always") || trimmed.eq_ignore_ascii_case("poster") {
            return Some(MailCopiesTo::Always);
        }
        if trimmed.eq_ignore_ascii_case("never") || trimmed.eq_ignore_ascii_case("nobody") {
            return Some(MailCopiesTo::Never);
        }
        Cursor::new(raw)
            .parse_address_list()
            .map(MailCopiesTo::Addresses)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, MailCopiesTo::Addresses(list) if list.is_empty())
    }

    pub fn to_wire(&self) -> String {
        match self {
            MailCopiesTo::Always => "poster".to_string(),
            MailCopiesTo::Never => "nobody".to_string(),
            MailCopiesTo::Addresses(list) => list
                .iter()
                .map(|address| address.to_wire())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// A Usenet Control header: a verb and its argument, e.g. `cancel <id@host>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Control {
    pub command: String,
    pub parameter: String,
}

impl Control {
    pub fn parse(raw: &[u8]) -> Option<Control> {
        let text = String::from_utf8_lossy(raw);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.split_once(char::is_whitespace) {
            Some((command, parameter)) => Some(Control {
                command: command.to_string(),
                parameter: parameter.trim().to_string(),
            }),
            None => Some(Control {
                command: trimmed.to_string(),
                parameter: String::new(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }

    pub fn to_wire(&self) -> String {
        if self.parameter.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.parameter)
        }
    }
}
