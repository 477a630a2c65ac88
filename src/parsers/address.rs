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

//! RFC 2822 address productions: addr-spec, angle-addr, mailbox, group,
//! address and the two list forms.

use crate::parsers::cursor::Cursor;
use crate::{AddrSpec, Address, Mailbox};

impl<'x> Cursor<'x> {
    /// Parses `local-part "@" domain`.
    pub fn parse_addr_spec(&mut self) -> Option<AddrSpec> {
        let start = self.pos();
        self.skip_cfws();

        let local_part = if self.peek() == Some(b'"') {
            self.parse_quoted_string()
        } else {
            self.parse_dot_atom()
        };
        let Some(local_part) = local_part else {
            self.set_pos(start);
            return None;
        };

        self.skip_cfws();
        if !self.skip_byte(b'@') {
            self.set_pos(start);
            return None;
        }
        match self.parse_domain() {
            Some(domain) => Some(AddrSpec { local_part, domain }),
            None => {
                self.set_pos(start);
                None
            }
        }
    }

    /// Parses `"<" [addr-spec] ">"`. An empty `<>` yields an empty addr-spec
    /// (seen in Return-Path).
    pub fn parse_angle_addr(&mut self) -> Option<AddrSpec> {
        let start = self.pos();
        self.skip_cfws();
        if !self.skip_byte(b'<') {
            self.set_pos(start);
            return None;
        }
        self.skip_cfws();
        if self.skip_byte(b'>') {
            return Some(AddrSpec::default());
        }
        // Obsolete route: "@dom1,@dom2:" before the addr-spec.
        if self.peek() == Some(b'@') {
            let route_start = self.pos();
            let mut found_colon = false;
            while let Some(ch) = self.peek() {
                if ch == b':' {
                    self.advance(1);
                    found_colon = true;
                    break;
                }
                if ch == b'>' || ch == b'\n' {
                    break;
                }
                self.advance(1);
            }
            if !found_colon {
                self.set_pos(route_start);
            }
        }
        let Some(spec) = self.parse_addr_spec() else {
            self.set_pos(start);
            return None;
        };
        self.skip_cfws();
        if !self.skip_byte(b'>') {
            self.set_pos(start);
            return None;
        }
        Some(spec)
    }

    /// Parses a mailbox, trying in turn: display-name with angle-addr, a bare
    /// addr-spec (a trailing comment becomes the display name), and a bare
    /// angle-addr (same comment rule).
    pub fn parse_mailbox(&mut self) -> Option<Mailbox> {
        let start = self.pos();

        if let Some(name) = self.parse_phrase() {
            if let Some(addr_spec) = self.parse_angle_addr() {
                return Some(Mailbox {
                    name: Some(name),
                    addr_spec,
                });
            }
            self.set_pos(start);
        }

        if let Some(addr_spec) = self.parse_addr_spec() {
            return Some(Mailbox {
                name: self.parse_trailing_comment(),
                addr_spec,
            });
        }

        if let Some(addr_spec) = self.parse_angle_addr() {
            return Some(Mailbox {
                name: self.parse_trailing_comment(),
                addr_spec,
            });
        }

        self.set_pos(start);
        None
    }

    fn parse_trailing_comment(&mut self) -> Option<String> {
        let start = self.pos();
        self.skip_ws();
        if self.peek() == Some(b'(') {
            match self.parse_comment() {
                Some(comment) if !comment.is_empty() => return Some(comment),
                _ => (),
            }
        }
        self.set_pos(start);
        None
    }

    /// Parses `display-name ":" [mailbox-list] ";"`.
    pub fn parse_group(&mut self) -> Option<Address> {
        let start = self.pos();
        let Some(name) = self.parse_phrase() else {
            self.set_pos(start);
            return None;
        };
        self.skip_cfws();
        if !self.skip_byte(b':') {
            self.set_pos(start);
            return None;
        }

        let mut members = Vec::new();
        loop {
            self.skip_cfws();
            match self.peek() {
                None => break,
                Some(b';') => {
                    self.advance(1);
                    break;
                }
                Some(b',') => {
                    self.advance(1);
                }
                _ => match self.parse_mailbox() {
                    Some(mailbox) => members.push(mailbox),
                    None => {
                        self.set_pos(start);
                        return None;
                    }
                },
            }
        }
        Some(Address::Group { name, members })
    }

    pub fn parse_address(&mut self) -> Option<Address> {
        if let Some(group) = self.parse_group() {
            return Some(group);
        }
        self.parse_mailbox().map(Address::Mailbox)
    }

    /// Parses a comma- or semicolon-separated address list, tolerating empty
    /// entries. Fails (restoring the cursor) if any entry is unparseable.
    pub fn parse_address_list(&mut self) -> Option<Vec<Address>> {
        let start = self.pos();
        let mut list = Vec::new();
        loop {
            self.skip_cfws();
            match self.peek() {
                None => break,
                Some(b',' | b';') => {
                    self.advance(1);
                }
                Some(b'\n') => break,
                _ => match self.parse_address() {
                    Some(address) => list.push(address),
                    None => {
                        self.set_pos(start);
                        return None;
                    }
                },
            }
        }
        Some(list)
    }

    /// Parses a comma-separated mailbox list (the From grammar).
    pub fn parse_mailbox_list(&mut self) -> Option<Vec<Mailbox>> {
        let start = self.pos();
        let mut list = Vec::new();
        loop {
            self.skip_cfws();
            match self.peek() {
                None => break,
                Some(b',' | b';') => {
                    self.advance(1);
                }
                Some(b'\n') => break,
                _ => match self.parse_mailbox() {
                    Some(mailbox) => list.push(mailbox),
                    None => {
                        self.set_pos(start);
                        return None;
                    }
                },
            }
        }
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use crate::parsers::cursor::Cursor;
    use crate::{AddrSpec, Address, Mailbox};

    fn mailbox(input: &str) -> Option<Mailbox> {
        Cursor::new(input.as_bytes()).parse_mailbox()
    }

    #[test]
    fn parse_mailboxes() {
        let inputs = [
            (
                "art@vandelay.com",
                Mailbox::new(None, AddrSpec::new("art", "vandelay.com")),
            ),
            (
                "Art Vandelay <art@vandelay.com>",
                Mailbox::new(
                    Some("Art Vandelay".to_string()),
                    AddrSpec::new("art", "vandelay.com"),
                ),
            ),
            (
                "\"Vandelay, Art\" <art@vandelay.com>",
                Mailbox::new(
                    Some("Vandelay, Art".to_string()),
                    AddrSpec::new("art", "vandelay.com"),
                ),
            ),
            (
                "art@vandelay.com (Art Vandelay)",
                Mailbox::new(
                    Some("Art Vandelay".to_string()),
                    AddrSpec::new("art", "vandelay.com"),
                ),
            ),
            (
                "<art@vandelay.com> (Art Vandelay)",
                Mailbox::new(
                    Some("Art Vandelay".to_string()),
                    AddrSpec::new("art", "vandelay.com"),
                ),
            ),
            (
                "\"john doe\"@example.com",
                Mailbox::new(None, AddrSpec::new("john doe", "example.com")),
            ),
            (
                "=?utf-8?q?J=C3=BCrgen?= <j@example.de>",
                Mailbox::new(
                    Some("Jürgen".to_string()),
                    AddrSpec::new("j", "example.de"),
                ),
            ),
            (
                "bare@[127.0.0.1]",
                Mailbox::new(None, AddrSpec::new("bare", "[127.0.0.1]")),
            ),
            (
                "dot@example.com.",
                Mailbox::new(None, AddrSpec::new("dot", "example.com.")),
            ),
        ];
        for (input, expected) in inputs {
            assert_eq!(mailbox(input), Some(expected), "{}", input);
        }
    }

    #[test]
    fn mailbox_failures_restore_cursor() {
        for input in ["", "no-at-sign", "<unterminated@angle", "@"] {
            let mut cursor = Cursor::new(input.as_bytes());
            assert_eq!(cursor.parse_mailbox(), None, "{}", input);
            assert_eq!(cursor.pos(), 0, "{}", input);
        }
    }

    #[test]
    fn parse_groups() {
        let mut cursor =
            Cursor::new(b"Colleagues: james@vandelay.com, jane@example.com; rest");
        match cursor.parse_group() {
            Some(Address::Group { name, members }) => {
                assert_eq!(name, "Colleagues");
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].addr_spec.local_part, "jane");
            }
            other => panic!("unexpected: {:?}", other),
        }

        // Empty group.
        let mut cursor = Cursor::new(b"Undisclosed recipients:;");
        match cursor.parse_group() {
            Some(Address::Group { name, members }) => {
                assert_eq!(name, "Undisclosed recipients");
                assert!(members.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_address_lists() {
        let mut cursor = Cursor::new(
            concat!(
                "\"Colleagues\": \"James Smythe\" <james@vandelay.com>; Friends:\n",
                " jane@example.com, =?UTF-8?Q?John_Sm=C3=AEth?= <john@example.com>;"
            )
            .as_bytes(),
        );
        let list = cursor.parse_address_list().expect("address list");
        assert_eq!(list.len(), 2);
        match &list[0] {
            Address::Group { name, members } => {
                assert_eq!(name, "Colleagues");
                assert_eq!(members[0].name.as_deref(), Some("James Smythe"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        match &list[1] {
            Address::Group { name, members } => {
                assert_eq!(name, "Friends");
                assert_eq!(members.len(), 2);
                assert_eq!(members[1].name.as_deref(), Some("John Smîth"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn empty_list_entries_are_skipped() {
        let mut cursor = Cursor::new(b"a@b.com,, ,c@d.com");
        let list = cursor.parse_address_list().expect("address list");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn unparseable_entry_fails_the_list() {
        let mut cursor = Cursor::new(b"a@b.com, ???");
        assert_eq!(cursor.parse_address_list(), None);
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn mailbox_list() {
        let mut cursor = Cursor::new(b"a@b.com, Jane <jane@d.com>");
        let list = cursor.parse_mailbox_list().expect("mailbox list");
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].name.as_deref(), Some("Jane"));
    }
}
