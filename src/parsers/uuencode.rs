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

//! Recovery of uuencoded payloads embedded in nominally plain-text bodies.
//!
//! Legacy mail and Usenet posts carry binaries as `begin MODE filename` ...
//! `end` blocks inside a text/plain message. The splitter lifts each block
//! out as a decoded attachment so the content tree can represent the message
//! as a regular multipart.

use crate::decoders::uuencode;

#[derive(Debug, PartialEq)]
pub struct UuPart {
    pub filename: String,
    pub mode: String,
    /// Content-transfer-decoded bytes.
    pub data: Vec<u8>,
}

#[derive(Debug, Default, PartialEq)]
pub struct UuSplit {
    /// The surrounding prose, with the encoded blocks removed.
    pub text: Vec<u8>,
    pub parts: Vec<UuPart>,
}

/// Parses a `begin MODE filename` line.
fn parse_begin(line: &[u8]) -> Option<(String, String)> {
    let rest = line.strip_prefix(b"begin ")?;
    let mut fields = rest.splitn(2, |&b| b == b' ');
    let mode = fields.next()?;
    let filename = fields.next()?;
    if mode.is_empty()
        || mode.len() > 4
        || !mode.iter().all(|&b| (b'0'..=b'7').contains(&b))
        || filename.is_empty()
    {
        return None;
    }
    Some((
        String::from_utf8_lossy(mode).into_owned(),
        String::from_utf8_lossy(filename).trim().to_string(),
    ))
}

/// Detects and splits uuencoded blocks. Returns `None` when the body holds no
/// block at all; a block missing its `end` line (a truncated series post) is
/// still recovered.
pub fn split_uuencoded(body: &[u8]) -> Option<UuSplit> {
    let mut split = UuSplit::default();
    let mut block: Option<(String, String, Vec<u8>)> = None;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
        let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);

        match &mut block {
            None => match parse_begin(trimmed) {
                Some((mode, filename)) => {
                    tracing::debug!(filename = %filename, "uuencoded block found");
                    block = Some((mode, filename, Vec::new()));
                }
                None => split.text.extend_from_slice(line),
            },
            Some((_, _, data)) => {
                if trimmed == b"end" {
                    if let Some((mode, filename, raw)) = block.take() {
                        split.parts.push(UuPart {
                            filename,
                            mode,
                            data: uuencode::decode(&raw),
                        });
                    }
                } else {
                    data.extend_from_slice(line);
                }
            }
        }
    }

    // Truncated block: decode what arrived.
    if let Some((mode, filename, data)) = block {
        split.parts.push(UuPart {
            filename,
            mode,
            data: uuencode::decode(&data),
        });
    }

    if split.parts.is_empty() {
        None
    } else {
        Some(split)
    }
}
