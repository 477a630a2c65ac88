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

//! Single-pass byte frequency analysis used to pick a Content-Transfer-Encoding.

use crate::headers::value::TransferEncoding;

/// Classification of a byte buffer, from most to least restrictive transport
/// requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    SevenBitText,
    EightBitText,
    SevenBitData,
    EightBitData,
    Binary,
}

/// Byte frequency counters collected in one forward pass.
///
/// "Data" as opposed to "text" means the buffer cannot travel as-is through a
/// line-oriented transport: lines longer than 998 characters, inconsistent
/// CR/LF usage, or a high control-character ratio.
#[derive(Debug, Default)]
pub struct CharFreq {
    nul: usize,
    ctl: usize,
    cr: usize,
    lf: usize,
    crlf: usize,
    printable: usize,
    eight_bit: usize,
    total: usize,
    line_min: usize,
    line_max: usize,
    trailing_ws: bool,
    leading_from: bool,
}

impl CharFreq {
    pub fn new(data: &[u8]) -> Self {
        let mut freq = CharFreq {
            line_min: usize::MAX,
            ..Default::default()
        };
        let mut line_len = 0usize;
        let mut prev: u8 = 0;
        let mut at_line_start = true;

        for (pos, &ch) in data.iter().enumerate() {
            freq.total += 1;
            match ch {
                0 => freq.nul += 1,
                b'\r' => freq.cr += 1,
                b'\n' => {
                    freq.lf += 1;
                    if prev == b'\r' {
                        freq.crlf += 1;
                    }
                    if prev == b' ' || prev == b'\t' {
                        freq.trailing_ws = true;
                    }
                }
                b'\t' => freq.printable += 1,
                0x01..=0x1f | 0x7f => freq.ctl += 1,
                0x20..=0x7e => freq.printable += 1,
                _ => freq.eight_bit += 1,
            }

            if ch == b'\n' {
                let len = if prev == b'\r' {
                    line_len.saturating_sub(1)
                } else {
                    line_len
                };
                freq.line_min = freq.line_min.min(len);
                freq.line_max = freq.line_max.max(len);
                line_len = 0;
                at_line_start = true;
            } else {
                if at_line_start && data[pos..].starts_with(b"From ") {
                    freq.leading_from = true;
                }
                at_line_start = false;
                line_len += 1;
            }
            prev = ch;
        }

        if line_len > 0 {
            let len = if prev == b'\r' {
                line_len.saturating_sub(1)
            } else {
                line_len
            };
            freq.line_min = freq.line_min.min(len);
            freq.line_max = freq.line_max.max(len);
            if prev == b' ' || prev == b'\t' {
                freq.trailing_ws = true;
            }
        }
        if freq.line_min == usize::MAX {
            freq.line_min = 0;
        }

        freq
    }

    pub fn classification(&self) -> ContentClass {
        if self.nul > 0 {
            return ContentClass::Binary;
        }
        let anomalous = self.line_max > 988
            || (self.crlf > 0 && self.lf != self.crlf)
            || self.cr != self.crlf
            || self.control_ratio() > 0.2;
        match (self.eight_bit > 0, anomalous) {
            (true, true) => ContentClass::EightBitData,
            (true, false) => ContentClass::EightBitText,
            (false, true) => ContentClass::SevenBitData,
            (false, false) => ContentClass::SevenBitText,
        }
    }

    pub fn control_ratio(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.ctl as f32 / self.total as f32
        }
    }

    /// Ratio of bytes that survive a plain-text transport untouched.
    pub fn printable_ratio(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            (self.printable + self.cr + self.lf) as f32 / self.total as f32
        }
    }

    pub fn has_trailing_whitespace(&self) -> bool {
        self.trailing_ws
    }

    /// A line starting with literal `From `, which an mbox writer would mangle.
    pub fn has_leading_from(&self) -> bool {
        self.leading_from
    }

    pub fn line_min(&self) -> usize {
        self.line_min
    }

    pub fn line_max(&self) -> usize {
        self.line_max
    }

    /// Whether the buffer can be transported under `encoding` without loss.
    pub fn is_okay_for(&self, encoding: &TransferEncoding) -> bool {
        match encoding {
            TransferEncoding::SevenBit => {
                matches!(self.classification(), ContentClass::SevenBitText)
                    && !self.trailing_ws
                    && !self.leading_from
            }
            TransferEncoding::EightBit => {
                matches!(
                    self.classification(),
                    ContentClass::SevenBitText | ContentClass::EightBitText
                ) && !self.trailing_ws
                    && !self.leading_from
            }
            TransferEncoding::QuotedPrintable | TransferEncoding::Base64 => true,
            TransferEncoding::Binary => true,
            TransferEncoding::Uuencode | TransferEncoding::Other(_) => false,
        }
    }
}

/// Suitable Content-Transfer-Encodings for `data`, in order of preference.
///
/// Quoted-printable wins over base64 only while more than 5/6 of the bytes are
/// printable; past that point base64's fixed 4/3 expansion is cheaper than
/// per-byte escaping.
pub fn encodings_for_data(data: &[u8]) -> Vec<TransferEncoding> {
    let freq = CharFreq::new(data);
    let mut allowed = Vec::with_capacity(4);
    match freq.classification() {
        ContentClass::SevenBitText => {
            allowed.push(TransferEncoding::SevenBit);
            allowed.push(TransferEncoding::EightBit);
            allowed.push(TransferEncoding::QuotedPrintable);
            allowed.push(TransferEncoding::Base64);
        }
        ContentClass::EightBitText => {
            allowed.push(TransferEncoding::EightBit);
            allowed.push(TransferEncoding::QuotedPrintable);
            allowed.push(TransferEncoding::Base64);
        }
        ContentClass::SevenBitData | ContentClass::EightBitData => {
            if freq.printable_ratio() > 5.0 / 6.0 {
                allowed.push(TransferEncoding::QuotedPrintable);
                allowed.push(TransferEncoding::Base64);
            } else {
                allowed.push(TransferEncoding::Base64);
                allowed.push(TransferEncoding::QuotedPrintable);
            }
        }
        ContentClass::Binary => {
            allowed.push(TransferEncoding::Base64);
        }
    }
    if freq.has_trailing_whitespace() || freq.has_leading_from() {
        allowed.retain(|enc| {
            !matches!(
                enc,
                TransferEncoding::SevenBit | TransferEncoding::EightBit
            )
        });
    }
    allowed
}

#[cfg(test)]
mod tests {
    use super::{encodings_for_data, CharFreq, ContentClass};
    use crate::headers::value::TransferEncoding;

    #[test]
    fn classify_byte_buffers() {
        let inputs: &[(&[u8], ContentClass)] = &[
            (b"plain old text\nwith two lines\n", ContentClass::SevenBitText),
            (b"nul in\x00the middle", ContentClass::Binary),
            (b"tr\xc3\xa8s bien\n", ContentClass::EightBitText),
            // Lone CR: cr != crlf
            (b"broken\rnewlines\n", ContentClass::SevenBitData),
            (b"8bit \xff and broken\rnewlines\n", ContentClass::EightBitData),
            (b"", ContentClass::SevenBitText),
        ];
        for (data, expected) in inputs {
            assert_eq!(
                CharFreq::new(data).classification(),
                *expected,
                "{:?}",
                data
            );
        }
    }

    #[test]
    fn long_line_is_data() {
        // 999 high-bit bytes with no newline exceed the 988 column threshold.
        let data = vec![0xd1u8; 999];
        assert_eq!(
            CharFreq::new(&data).classification(),
            ContentClass::EightBitData
        );
        let data = vec![0xd1u8; 100];
        assert_eq!(
            CharFreq::new(&data).classification(),
            ContentClass::EightBitText
        );
    }

    #[test]
    fn crlf_consistency() {
        // All CRs paired with LFs: consistent, still text.
        assert_eq!(
            CharFreq::new(b"a\r\nb\r\n").classification(),
            ContentClass::SevenBitText,
        );
        // CRLF plus a bare LF: lf != crlf.
        let freq = CharFreq::new(b"a\r\nb\n");
        assert_eq!(freq.classification(), ContentClass::SevenBitData);
    }

    #[test]
    fn lf_normalized_crlf_is_text() {
        assert_eq!(
            CharFreq::new(b"a\nb\n").classification(),
            ContentClass::SevenBitText
        );
    }

    #[test]
    fn encoding_choice() {
        assert_eq!(
            encodings_for_data(b"hello world\n").first(),
            Some(&TransferEncoding::SevenBit)
        );
        assert_eq!(
            encodings_for_data(b"caf\xc3\xa9\n").first(),
            Some(&TransferEncoding::EightBit)
        );
        // Mostly printable data: quoted-printable preferred.
        let mut mostly_printable = vec![b'a'; 100];
        mostly_printable.extend_from_slice(&[0x01; 5]);
        mostly_printable.extend(std::iter::repeat(b'b').take(995));
        assert_eq!(
            encodings_for_data(&mostly_printable).first(),
            Some(&TransferEncoding::QuotedPrintable)
        );
        // Binary: base64 only.
        assert_eq!(
            encodings_for_data(b"\x00\x01\x02"),
            vec![TransferEncoding::Base64]
        );
    }

    #[test]
    fn trailing_whitespace_and_from_detection() {
        let freq = CharFreq::new(b"line with trailing space \nFrom here on\n");
        assert!(freq.has_trailing_whitespace());
        assert!(freq.has_leading_from());
        assert!(!freq.is_okay_for(&TransferEncoding::SevenBit));
        assert_eq!(
            encodings_for_data(b"ok \n").first(),
            Some(&TransferEncoding::QuotedPrintable)
        );
    }
}
