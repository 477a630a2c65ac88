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

//! Boundary-tolerant multipart splitting (RFC 2046 section 5.1).
//!
//! A candidate `--boundary` only counts when it sits at the start of the body
//! or immediately after a newline; the newline preceding a boundary belongs
//! to the boundary delimiter, not to the part. Content before the first
//! boundary is the preamble, content after the `--boundary--` terminator is
//! the epilogue, both preserved verbatim.

#[derive(Debug, Default, PartialEq)]
pub struct MultipartSplit {
    pub preamble: Vec<u8>,
    pub parts: Vec<Vec<u8>>,
    pub epilogue: Vec<u8>,
}

struct Boundary {
    /// Where the part before this boundary ends: the newline preceding the
    /// marker belongs to the boundary delimiter.
    cut: usize,
    /// First byte after the boundary line.
    after: usize,
    terminated: bool,
}

/// Finds the next valid boundary line at or after `from`. A valid boundary
/// line is `--boundary[--]` at buffer start or right after a newline,
/// followed only by transport padding and a newline (or end of input);
/// anything else (e.g. `--bold` for boundary `bo`) is a false match inside a
/// part body and scanning continues.
fn find_boundary(body: &[u8], marker: &[u8], from: usize) -> Option<Boundary> {
    let mut pos = from;
    while pos + marker.len() <= body.len() {
        if body[pos..].starts_with(marker) && (pos == 0 || body[pos - 1] == b'\n') {
            let mut line_end = pos + marker.len();
            let terminated = body[line_end..].starts_with(b"--");
            if terminated {
                line_end += 2;
            }
            while matches!(body.get(line_end), Some(b' ' | b'\t' | b'\r')) {
                line_end += 1;
            }
            match body.get(line_end) {
                Some(b'\n') => {
                    return Some(Boundary {
                        cut: pos.saturating_sub(1),
                        after: line_end + 1,
                        terminated,
                    })
                }
                None => {
                    return Some(Boundary {
                        cut: pos.saturating_sub(1),
                        after: line_end,
                        terminated,
                    })
                }
                _ => (),
            }
        }
        // Advance to the byte after the next newline.
        match body[pos..].iter().position(|&b| b == b'\n') {
            Some(nl) => pos += nl + 1,
            None => break,
        }
    }
    None
}

/// Splits `body` at `--boundary` lines. Zero-length parts are skipped. If no
/// valid boundary occurs at all the split fails and the caller is expected to
/// downgrade the content to an opaque leaf.
pub fn split_multipart(body: &[u8], boundary: &[u8]) -> Option<MultipartSplit> {
    if boundary.is_empty() {
        return None;
    }
    let mut marker = Vec::with_capacity(boundary.len() + 2);
    marker.extend_from_slice(b"--");
    marker.extend_from_slice(boundary);

    let first = find_boundary(body, &marker, 0)?;
    let mut split = MultipartSplit {
        preamble: body[..first.cut.min(body.len())].to_vec(),
        ..Default::default()
    };

    let mut pos = first.after;
    let mut terminated = first.terminated;
    while !terminated {
        match find_boundary(body, &marker, pos) {
            Some(next) => {
                if next.cut > pos {
                    split.parts.push(body[pos..next.cut].to_vec());
                }
                pos = next.after;
                terminated = next.terminated;
            }
            None => {
                // Missing terminator: the remainder is the last part.
                tracing::debug!("multipart body without terminating boundary");
                if pos < body.len() {
                    split.parts.push(body[pos..].to_vec());
                }
                return Some(split);
            }
        }
    }
    split.epilogue = body[pos..].to_vec();
    Some(split)
}

#[cfg(test)]
mod tests {
    use super::split_multipart;

    #[test]
    fn split_with_preamble_and_epilogue() {
        let body = concat!(
            "This is the preamble.\n",
            "\n",
            "--simple boundary\n",
            "\n",
            "Part one.\n",
            "--simple boundary\n",
            "Content-Type: text/plain\n",
            "\n",
            "Part two.\n",
            "\n",
            "--simple boundary--\n",
            "\n",
            "This is the epilogue.\n"
        );
        let split = split_multipart(body.as_bytes(), b"simple boundary").expect("split");
        assert_eq!(split.preamble, b"This is the preamble.\n");
        assert_eq!(split.parts.len(), 2);
        assert_eq!(split.parts[0], b"\nPart one.");
        assert_eq!(
            split.parts[1],
            b"Content-Type: text/plain\n\nPart two.\n"
        );
        assert_eq!(split.epilogue, b"\nThis is the epilogue.\n");
    }

    #[test]
    fn boundary_at_body_start() {
        let body = "--b\n\nonly part\n--b--\n";
        let split = split_multipart(body.as_bytes(), b"b").expect("split");
        assert!(split.preamble.is_empty());
        assert_eq!(split.parts, vec![b"\nonly part".to_vec()]);
        assert!(split.epilogue.is_empty());
    }

    #[test]
    fn false_boundary_inside_part_is_ignored() {
        // "--b" not at line start must not split the part.
        let body = "--b\n\ninline --b marker\n--b--\n";
        let split = split_multipart(body.as_bytes(), b"b").expect("split");
        assert_eq!(split.parts, vec![b"\ninline --b marker".to_vec()]);
    }

    #[test]
    fn empty_parts_are_skipped() {
        let body = "--b\n--b\n\ncontent\n--b\n--b--\n";
        let split = split_multipart(body.as_bytes(), b"b").expect("split");
        assert_eq!(split.parts, vec![b"\ncontent".to_vec()]);
    }

    #[test]
    fn missing_terminator_keeps_last_part() {
        let body = "--b\n\nunterminated part\n";
        let split = split_multipart(body.as_bytes(), b"b").expect("split");
        assert_eq!(split.parts, vec![b"\nunterminated part\n".to_vec()]);
        assert!(split.epilogue.is_empty());
    }

    #[test]
    fn no_boundary_is_a_failure() {
        assert_eq!(split_multipart(b"no boundaries here\n", b"b"), None);
        assert_eq!(split_multipart(b"anything", b""), None);
    }

    #[test]
    fn transport_padding_after_boundary() {
        let body = "--b \t\n\npadded\n--b-- \n";
        let split = split_multipart(body.as_bytes(), b"b").expect("split");
        assert_eq!(split.parts, vec![b"\npadded".to_vec()]);
    }
}
