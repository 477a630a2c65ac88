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

//! A top-level message: a content tree root plus the mail-level header
//! accessors and the assemble-time mandatory headers.

use crate::content::Content;
use crate::headers::{Header, HeaderName, HeaderValue};
use crate::parsers::date::DateTime;
use crate::{Address, Mailbox};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    content: Content,
}

impl Message {
    pub fn new() -> Message {
        Message::default()
    }

    pub fn from_content(content: Content) -> Message {
        Message { content }
    }

    /// Parses raw message bytes (LF line endings) into a message tree.
    pub fn parse_bytes(raw: &[u8]) -> Message {
        let mut content = Content::new();
        content.set_content(raw);
        content.parse();
        Message { content }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut Content {
        &mut self.content
    }

    pub fn into_content(self) -> Content {
        self.content
    }

    pub fn parse(&mut self) {
        self.content.parse();
    }

    /// Assembles the tree, first materializing the headers every outgoing
    /// message must carry: `Date` (now, if unset), `MIME-Version: 1.0` and a
    /// `From` header object (which serializes to nothing while empty).
    pub fn assemble(&mut self) {
        if self
            .content
            .header(&HeaderName::Date)
            .map_or(true, |header| header.value().is_empty())
        {
            self.content
                .set_header_value(HeaderName::Date, HeaderValue::DateTime(DateTime::now()));
        }
        if self.content.header(&HeaderName::MimeVersion).is_none() {
            self.content.set_header_value(
                HeaderName::MimeVersion,
                HeaderValue::DotAtom("1.0".to_string()),
            );
        }
        if self.content.header(&HeaderName::From).is_none() {
            self.content
                .append_header(Header::new(HeaderName::From, HeaderValue::Mailboxes(vec![])));
        }
        self.content.assemble();
    }

    pub fn encoded_content(&self) -> Vec<u8> {
        self.content.encoded_content()
    }

    // ---- mail-level accessors ------------------------------------------

    pub fn subject(&self) -> Option<&str> {
        match self.content.header(&HeaderName::Subject)?.value() {
            HeaderValue::Unstructured(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_subject(&mut self, subject: &str) {
        self.content.set_header_value(
            HeaderName::Subject,
            HeaderValue::Unstructured(subject.to_string()),
        );
    }

    pub fn date(&self) -> Option<&DateTime> {
        match self.content.header(&HeaderName::Date)?.value() {
            HeaderValue::DateTime(date) => Some(date),
            _ => None,
        }
    }

    pub fn set_date(&mut self, date: DateTime) {
        self.content
            .set_header_value(HeaderName::Date, HeaderValue::DateTime(date));
    }

    pub fn from(&self) -> Option<&[Mailbox]> {
        match self.content.header(&HeaderName::From)?.value() {
            HeaderValue::Mailboxes(list) => Some(list),
            _ => None,
        }
    }

    pub fn set_from(&mut self, from: Vec<Mailbox>) {
        self.content
            .set_header_value(HeaderName::From, HeaderValue::Mailboxes(from));
    }

    pub fn to(&self) -> Option<&[Address]> {
        self.address_list(&HeaderName::To)
    }

    pub fn set_to(&mut self, to: Vec<Address>) {
        self.content
            .set_header_value(HeaderName::To, HeaderValue::Addresses(to));
    }

    pub fn cc(&self) -> Option<&[Address]> {
        self.address_list(&HeaderName::Cc)
    }

    pub fn set_cc(&mut self, cc: Vec<Address>) {
        self.content
            .set_header_value(HeaderName::Cc, HeaderValue::Addresses(cc));
    }

    pub fn bcc(&self) -> Option<&[Address]> {
        self.address_list(&HeaderName::Bcc)
    }

    pub fn set_bcc(&mut self, bcc: Vec<Address>) {
        self.content
            .set_header_value(HeaderName::Bcc, HeaderValue::Addresses(bcc));
    }

    fn address_list(&self, name: &HeaderName) -> Option<&[Address]> {
        match self.content.header(name)?.value() {
            HeaderValue::Addresses(list) => Some(list),
            _ => None,
        }
    }

    pub fn message_id(&self) -> Option<&str> {
        match self.content.header(&HeaderName::MessageId)?.value() {
            HeaderValue::Ident(id) => Some(id),
            _ => None,
        }
    }

    pub fn set_message_id(&mut self, id: &str) {
        self.content
            .set_header_value(HeaderName::MessageId, HeaderValue::Ident(id.to_string()));
    }

    pub fn in_reply_to(&self) -> Option<&[String]> {
        match self.content.header(&HeaderName::InReplyTo)?.value() {
            HeaderValue::Idents(list) => Some(list),
            _ => None,
        }
    }

    pub fn references(&self) -> Option<&[String]> {
        match self.content.header(&HeaderName::References)?.value() {
            HeaderValue::Idents(list) => Some(list),
            _ => None,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        match self.content.header(&HeaderName::UserAgent)?.value() {
            HeaderValue::Unstructured(text) => Some(text),
            _ => None,
        }
    }

    pub fn organization(&self) -> Option<&str> {
        match self.content.header(&HeaderName::Organization)?.value() {
            HeaderValue::Unstructured(text) => Some(text),
            _ => None,
        }
    }

    pub fn newsgroups(&self) -> Option<&[String]> {
        match self.content.header(&HeaderName::Newsgroups)?.value() {
            HeaderValue::Newsgroups(list) => Some(list),
            _ => None,
        }
    }

    pub fn set_newsgroups(&mut self, groups: Vec<String>) {
        self.content
            .set_header_value(HeaderName::Newsgroups, HeaderValue::Newsgroups(groups));
    }

    pub fn followup_to(&self) -> Option<&[String]> {
        match self.content.header(&HeaderName::FollowupTo)?.value() {
            HeaderValue::Newsgroups(list) => Some(list),
            _ => None,
        }
    }

    pub fn lines(&self) -> Option<u32> {
        match self.content.header(&HeaderName::Lines)?.value() {
            HeaderValue::Lines(count) => Some(*count),
            _ => None,
        }
    }

    pub fn set_lines(&mut self, count: u32) {
        self.content
            .set_header_value(HeaderName::Lines, HeaderValue::Lines(count));
    }

    pub fn control(&self) -> Option<&crate::Control> {
        match self.content.header(&HeaderName::Control)?.value() {
            HeaderValue::Control(control) => Some(control),
            _ => None,
        }
    }

    pub fn mail_copies_to(&self) -> Option<&crate::MailCopiesTo> {
        match self.content.header(&HeaderName::MailCopiesTo)?.value() {
            HeaderValue::MailCopies(mct) => Some(mct),
            _ => None,
        }
    }

    pub fn supersedes(&self) -> Option<&str> {
        match self.content.header(&HeaderName::Supersedes)?.value() {
            HeaderValue::Ident(id) => Some(id),
            _ => None,
        }
    }

    pub fn set_references(&mut self, ids: Vec<String>) {
        self.content
            .set_header_value(HeaderName::References, HeaderValue::Idents(ids));
    }

    pub fn set_in_reply_to(&mut self, ids: Vec<String>) {
        self.content
            .set_header_value(HeaderName::InReplyTo, HeaderValue::Idents(ids));
    }

    pub fn set_user_agent(&mut self, agent: &str) {
        self.content.set_header_value(
            HeaderName::UserAgent,
            HeaderValue::Unstructured(agent.to_string()),
        );
    }

    pub fn set_organization(&mut self, organization: &str) {
        self.content.set_header_value(
            HeaderName::Organization,
            HeaderValue::Unstructured(organization.to_string()),
        );
    }
}

impl Content {
    /// Clones this node out as an independent [`Message`]. The handle does
    /// not alias the tree: re-parsing the container does not invalidate it.
    pub fn to_message(&self) -> Message {
        Message::from_content(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::Message;
    use crate::headers::HeaderName;
    use crate::{AddrSpec, Mailbox};

    #[test]
    fn accessors_over_parsed_message() {
        let message = Message::parse_bytes(
            concat!(
                "From: Art Vandelay <art@vandelay.com>\n",
                "To: jane@example.com\n",
                "Subject: Import/export\n",
                "Date: Sat, 25 Apr 2015 12:10:48 +0000\n",
                "Message-ID: <m1@vandelay.com>\n",
                "\n",
                "Fine day for commerce.\n"
            )
            .as_bytes(),
        );
        assert_eq!(message.subject(), Some("Import/export"));
        assert_eq!(message.from().unwrap()[0].addr_spec.to_wire(), "art@vandelay.com");
        assert_eq!(message.to().unwrap().len(), 1);
        assert_eq!(message.message_id(), Some("m1@vandelay.com"));
        assert_eq!(
            message.date().unwrap().to_iso8601(),
            "2015-04-25T12:10:48+00:00"
        );
    }

    #[test]
    fn assemble_adds_mandatory_headers() {
        let mut message = Message::new();
        message.set_subject("bare");
        message.content_mut().set_body(b"body\n".to_vec());
        message.assemble();

        assert!(message.date().is_some());
        assert!(message.content().header(&HeaderName::MimeVersion).is_some());
        let wire = String::from_utf8(message.encoded_content()).unwrap();
        assert!(wire.contains("MIME-Version: 1.0\n"));
        assert!(wire.contains("Date: "));
        // The empty From object serializes to nothing.
        assert!(!wire.contains("From:"));
        assert!(wire.ends_with("\n\nbody\n"));
    }

    #[test]
    fn assemble_keeps_existing_date() {
        let mut message = Message::parse_bytes(
            b"Date: Sat, 25 Apr 2015 12:10:48 +0000\nSubject: x\n\nbody\n",
        );
        message.assemble();
        assert_eq!(
            message.date().unwrap().to_iso8601(),
            "2015-04-25T12:10:48+00:00"
        );
    }

    #[test]
    fn set_and_serialize_round_trip() {
        let mut message = Message::new();
        message.set_subject("Latex, or vinyl?");
        message.set_from(vec![Mailbox::new(
            Some("Art Vandelay".to_string()),
            AddrSpec::new("art", "vandelay.com"),
        )]);
        message.content_mut().set_body(b"hello\n".to_vec());
        message.assemble();

        let reparsed = Message::parse_bytes(&message.encoded_content());
        assert_eq!(reparsed.subject(), Some("Latex, or vinyl?"));
        assert_eq!(
            reparsed.from().unwrap()[0].name.as_deref(),
            Some("Art Vandelay")
        );
        assert_eq!(
            reparsed.content().decoded_content(),
            b"hello\n".to_vec()
        );
    }

    #[test]
    fn usenet_accessors() {
        let message = Message::parse_bytes(
            concat!(
                "Newsgroups: comp.lang.rust,comp.lang.c\n",
                "Followup-To: comp.lang.rust\n",
                "Lines: 42\n",
                "Control: cancel <bad@example.com>\n",
                "Mail-Copies-To: never\n",
                "Supersedes: <old@example.com>\n",
                "\n",
                "article body\n"
            )
            .as_bytes(),
        );
        assert_eq!(message.newsgroups().unwrap().len(), 2);
        assert_eq!(message.followup_to().unwrap(), ["comp.lang.rust"]);
        assert_eq!(message.lines(), Some(42));
        assert_eq!(message.control().unwrap().command, "cancel");
        assert_eq!(
            message.mail_copies_to(),
            Some(&crate::MailCopiesTo::Never)
        );
        assert_eq!(message.supersedes(), Some("old@example.com"));
    }

    #[test]
    fn encapsulated_message_clones_out() {
        let message = Message::parse_bytes(
            concat!(
                "Content-Type: message/rfc822\n",
                "\n",
                "Subject: inner\n",
                "\n",
                "inner body\n"
            )
            .as_bytes(),
        );
        let inner = message.content().encapsulated().unwrap().to_message();
        assert_eq!(inner.subject(), Some("inner"));
        // The clone is independent of the container tree.
        drop(message);
        assert_eq!(inner.subject(), Some("inner"));
    }
}
