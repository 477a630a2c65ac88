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

//! Charset decoding. UTF-8, US-ASCII and ISO-8859-1 are handled internally;
//! every other label goes through `encoding_rs` when the `full_encoding`
//! feature (default) is enabled. Unknown labels fall back to lossy UTF-8,
//! never to an error.

/// Decodes `data` according to a MIME charset label.
pub fn decode_charset(data: &[u8], charset: &str) -> String {
    let label = charset.trim().to_ascii_lowercase();
    match label.as_str() {
        "" | "us-ascii" | "ascii" | "utf-8" | "utf8" => {
            String::from_utf8_lossy(data).into_owned()
        }
        "iso-8859-1" | "latin1" | "l1" | "cp819" => latin1(data),
        _ => {
            #[cfg(feature = "full_encoding")]
            {
                if let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) {
                    let (decoded, _, _) = encoding.decode(data);
                    return decoded.into_owned();
                }
            }
            String::from_utf8_lossy(data).into_owned()
        }
    }
}

fn latin1(data: &[u8]) -> String {
    data.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::decode_charset;

    #[test]
    fn builtin_charsets() {
        assert_eq!(decode_charset(b"plain", "us-ascii"), "plain");
        assert_eq!(decode_charset("caf\u{e9}".as_bytes(), "UTF-8"), "café");
        assert_eq!(decode_charset(b"caf\xe9", "ISO-8859-1"), "café");
        assert_eq!(decode_charset(b"caf\xe9", "latin1"), "café");
    }

    #[test]
    fn unknown_label_is_lossy_utf8() {
        assert_eq!(decode_charset(b"ok", "x-no-such-charset"), "ok");
        assert_eq!(decode_charset(b"b\xff", "x-no-such-charset"), "b\u{fffd}");
    }

    #[cfg(feature = "full_encoding")]
    #[test]
    fn encoding_rs_charsets() {
        assert_eq!(decode_charset(b"\x82\xa0", "shift_jis"), "あ");
        assert_eq!(decode_charset(b"\xc0\xc1", "windows-1251"), "АБ");
    }
}
