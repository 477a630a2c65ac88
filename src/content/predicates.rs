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

//! Pure predicates over a parsed tree: attachment classification and the
//! crypto/calendar checks used by mail UIs and MDN generators.

use crate::content::Content;

/// Media types that mark a part as belonging to the crypto layer rather
/// than being user content.
const CRYPTO_TYPES: &[&str] = &[
    "application/pgp-encrypted",
    "application/pgp-signature",
    "application/pgp-keys",
    "application/pkcs7-mime",
    "application/pkcs7-signature",
    "application/x-pkcs7-mime",
    "application/x-pkcs7-signature",
];

/// Detached-signature payload names produced by PGP tooling on
/// `application/octet-stream` parts.
const CRYPTO_FILENAMES: &[&str] = &["msg.asc", "encrypted.asc"];

impl Content {
    /// Whether this node belongs to a message's crypto layer: a PGP/PKCS#7
    /// media type, or an octet-stream carrying a detached crypto payload.
    pub fn is_crypto_part(&self) -> bool {
        let ct = self.content_type_or_default();
        let mimetype = ct.mimetype();
        if CRYPTO_TYPES.iter().any(|t| mimetype == *t) {
            return true;
        }
        ct.is_mimetype("application/octet-stream")
            && self
                .filename()
                .map_or(false, |name| CRYPTO_FILENAMES.contains(&name.as_str()))
    }

    /// Node-local attachment classification: multipart containers never are,
    /// encapsulated messages always are, crypto parts never are, and
    /// otherwise a filename or an explicit `attachment` disposition
    /// qualifies. The tree-level [`attachments`](Self::attachments) scan
    /// additionally excludes the main text body part.
    pub fn is_attachment(&self) -> bool {
        let ct = self.content_type_or_default();
        if ct.is_multipart() {
            return false;
        }
        if ct.is_mimetype("message/rfc822") {
            return true;
        }
        if self.is_crypto_part() {
            return false;
        }
        self.filename().map_or(false, |name| !name.is_empty())
            || self
                .content_disposition()
                .map_or(false, |cd| cd.is_attachment())
    }

    /// All attachment parts below (and including) this node. Multipart
    /// containers are descended except `multipart/related` (whose children
    /// are inline resources); the designated main text part never counts.
    pub fn attachments(&self) -> Vec<&Content> {
        fn collect<'x>(
            node: &'x Content,
            main_text: Option<*const Content>,
            found: &mut Vec<&'x Content>,
        ) {
            let ct = node.content_type_or_default();
            if ct.is_multipart() {
                if !ct.is_mimetype("multipart/related") {
                    for child in node.contents() {
                        collect(child, main_text, found);
                    }
                }
                return;
            }
            if main_text == Some(node as *const Content) {
                return;
            }
            if node.is_attachment() {
                found.push(node);
            }
        }

        let main_text = self.text_content().map(|part| part as *const Content);
        let mut found = Vec::new();
        collect(self, main_text, &mut found);
        found
    }

    pub fn has_attachment(&self) -> bool {
        !self.attachments().is_empty()
    }

    fn any_part(&self, pred: &dyn Fn(&Content) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.contents().iter().any(|child| child.any_part(pred))
    }

    /// `multipart/signed` at any level, or a PGP/PKCS#7 signature part.
    pub fn is_signed(&self) -> bool {
        self.any_part(&|node| {
            let ct = node.content_type_or_default();
            ct.is_mimetype("multipart/signed")
                || ct.is_mimetype("application/pgp-signature")
                || ct.is_mimetype("application/pkcs7-signature")
                || ct.is_mimetype("application/x-pkcs7-signature")
        })
    }

    /// `multipart/encrypted` at any level, or a PGP/PKCS#7 encryption part.
    pub fn is_encrypted(&self) -> bool {
        self.any_part(&|node| {
            let ct = node.content_type_or_default();
            ct.is_mimetype("multipart/encrypted")
                || ct.is_mimetype("application/pgp-encrypted")
                || ct.is_mimetype("application/pkcs7-mime")
                || ct.is_mimetype("application/x-pkcs7-mime")
        })
    }

    /// A `text/calendar` part anywhere in the tree.
    pub fn is_invitation(&self) -> bool {
        self.any_part(&|node| node.content_type_or_default().is_mimetype("text/calendar"))
    }
}
