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

pub mod base64;
pub mod charsets;
pub mod quoted_printable;
pub mod uuencode;
pub mod yenc;

use crate::headers::value::TransferEncoding;

/// Removes a Content-Transfer-Encoding. Total: undecodable input comes back
/// verbatim rather than failing, so a best-effort parse is always possible.
pub fn decode_transfer(data: &[u8], encoding: &TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => base64::decode_forgiving(data),
        TransferEncoding::QuotedPrintable => quoted_printable::decode(data),
        TransferEncoding::Uuencode => uuencode::decode(data),
        TransferEncoding::SevenBit
        | TransferEncoding::EightBit
        | TransferEncoding::Binary
        | TransferEncoding::Other(_) => data.to_vec(),
    }
}

/// Applies a Content-Transfer-Encoding. Base64 output is wrapped at 76
/// columns and ends with a newline; quoted-printable output uses soft breaks.
pub fn encode_transfer(data: &[u8], encoding: &TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => base64::encode_wrapped(data),
        TransferEncoding::QuotedPrintable => quoted_printable::encode(data),
        TransferEncoding::SevenBit
        | TransferEncoding::EightBit
        | TransferEncoding::Binary
        | TransferEncoding::Uuencode
        | TransferEncoding::Other(_) => data.to_vec(),
    }
}
