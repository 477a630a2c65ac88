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

//! Recovery of yEnc payloads (`=ybegin` ... `=yend`) embedded in plain-text
//! bodies. Multi-part posts (`=ypart`, `part=`/`total=` keywords) surface
//! with their part numbers so the tree can represent them as
//! `message/partial`.

use crate::decoders::yenc;

/// Upper bound for attacker-controlled `part=`/`total=` counts. Values above
/// it are clamped before any use.
const MAX_PART_COUNT: u32 = 9999;

#[derive(Debug, PartialEq)]
pub struct YencPart {
    pub filename: String,
    /// Decoded bytes of this segment.
    pub data: Vec<u8>,
    /// Declared total file size, when the header carried a parseable one.
    pub size: Option<u64>,
    /// `(part number, total parts)` for multi-part posts.
    pub part: Option<(u32, u32)>,
}

#[derive(Debug, Default, PartialEq)]
pub struct YencSplit {
    /// The surrounding prose, with the encoded blocks removed.
    pub text: Vec<u8>,
    pub parts: Vec<YencPart>,
}

/// Keyword lookup in a `=ybegin`/`=ypart` header line. `name=` takes the rest
/// of the line (filenames may contain spaces); other keywords end at the next
/// space.
fn keyword<'l>(line: &'l str, key: &str) -> Option<&'l str> {
    let start = line.find(key)? + key.len();
    let rest = &line[start..];
    if key == "name=" {
        Some(rest.trim())
    } else {
        Some(rest.split(' ').next().unwrap_or(rest).trim())
    }
}

fn parse_count(line: &str, key: &str) -> Option<u32> {
    let value = keyword(line, key)?.parse::<u32>().ok()?;
    if value > MAX_PART_COUNT {
        tracing::warn!(value, key, "clamping oversized yEnc part count");
        Some(MAX_PART_COUNT)
    } else {
        Some(value)
    }
}

/// Detects and splits yEnc blocks. Returns `None` when no `=ybegin` header is
/// present; a block missing its `=yend` trailer is still recovered.
pub fn split_yenc(body: &[u8]) -> Option<YencSplit> {
    let mut split = YencSplit::default();
    let mut block: Option<(YencPart, Vec<u8>)> = None;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let trimmed = line.strip_suffix(b"\n").unwrap_or(line);
        let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);

        match &mut block {
            None => {
                if trimmed.starts_with(b"=ybegin ") {
                    let header = String::from_utf8_lossy(trimmed);
                    let filename = keyword(&header, "name=").unwrap_or_default().to_string();
                    let size = keyword(&header, "size=").and_then(|v| v.parse::<u64>().ok());
                    let part = parse_count(&header, "part=").map(|number| {
                        (number, parse_count(&header, "total=").unwrap_or(number))
                    });
                    tracing::debug!(filename = %filename, "yEnc block found");
                    block = Some((
                        YencPart {
                            filename,
                            data: Vec::new(),
                            size,
                            part,
                        },
                        Vec::new(),
                    ));
                } else {
                    split.text.extend_from_slice(line);
                }
            }
            Some((_, data)) => {
                if trimmed.starts_with(b"=yend") {
                    if let Some((mut part, raw)) = block.take() {
                        part.data = yenc::decode(&raw);
                        split.parts.push(part);
                    }
                } else if !trimmed.starts_with(b"=ypart ") {
                    // "=ypart" segment coordinates are framing, not data.
                    data.extend_from_slice(line);
                }
            }
        }
    }

    if let Some((mut part, data)) = block {
        part.data = yenc::decode(&data);
        split.parts.push(part);
    }

    if split.parts.is_empty() {
        None
    } else {
        Some(split)
    }
}
