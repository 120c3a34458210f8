/*
 * rfc2047.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Busta, a MIME message codec library.
 *
 * Busta is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Busta is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Busta.  If not, see <http://www.gnu.org/licenses/>.
 */

//! RFC 2047 encoded-words: decoding unstructured header values and
//! encoding non-ASCII text for transport.
//!
//! Decoding is deliberately forgiving.  A candidate that fails to decode
//! is kept verbatim, whitespace between two valid encoded-words is
//! dropped, and line folds disappear everywhere.

use ::base64::engine::general_purpose::STANDARD;
use ::base64::Engine as _;

use crate::charset;
use crate::quoted_printable::{hex_value, HEX_UPPER};

/// RFC 5322 atom characters.
fn is_atext(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-/=?^_`{|}~".contains(c)
}

/// Bytes that must be escaped in a Q encoded-word.  Space is emitted as
/// '_' instead and so is not part of this set.
fn force_encode(b: u8) -> bool {
    !(b.is_ascii_alphanumeric() || matches!(b, b'!' | b'*' | b'+' | b'-' | b'/' | b' '))
}

/// Remove line folds: every CR and LF vanishes, continuation whitespace
/// stays.
pub fn unfold(folded: &str) -> String {
    if !folded.contains(['\r', '\n']) {
        return folded.to_string();
    }
    folded.chars().filter(|&c| c != '\r' && c != '\n').collect()
}

/// Decode an unstructured UTF-8 header value.
pub fn decode_text(content: &str) -> String {
    decode_header(content.as_bytes(), Some("utf-8"))
}

/// Decode a raw header value: unfold it, then resolve every encoded-word,
/// reading the bytes between words under `charset`.
pub fn decode_header(content: &[u8], charset: Option<&str>) -> String {
    let end = content.len();
    let complicated = content.iter().enumerate().any(|(pos, &c)| {
        c == 0 || c >= 0x7F || (c == b'=' && pos + 1 < end && content[pos + 1] == b'?')
    });
    if !complicated {
        return unfold(&charset::decode(content, charset));
    }

    let mut value = String::new();
    let mut builder: Vec<u8> = Vec::with_capacity(end);
    let mut encoded = false;
    // None means an encoded-word just decoded; Some(true) means only
    // whitespace has been seen since
    let mut encwspenc: Option<bool> = Some(false);
    let mut questions = 0u32;
    let mut wsplength = 0usize;

    let mut pos = 0;
    while pos < end {
        let c = content[pos];
        if c == b'\r' || c == b'\n' {
            // folding is invisible
        } else if c == b'='
            && pos + 2 < end
            && content[pos + 1] == b'?'
            && (!encoded || content[pos + 2] != b'=')
        {
            // "=?" marks the start of an encoded-word
            if !builder.is_empty() {
                value.push_str(&charset::decode(&builder, charset));
            }
            builder.clear();
            builder.push(b'=');
            encoded = true;
            questions = 0;
        } else {
            let mut closing = false;
            if c == b'?' && encoded {
                questions += 1;
                closing = questions > 3 && pos + 1 < end && content[pos + 1] == b'=';
            }
            if closing {
                // "?=" may end the word, if the whole thing decodes
                builder.push(b'?');
                builder.push(b'=');
                match decode_word(&builder) {
                    Some(decoded) => {
                        pos += 1;
                        if encwspenc == Some(true) {
                            // drop the whitespace between encoded-words
                            value.truncate(value.len() - wsplength);
                        }
                        value.push_str(&decoded);
                        encwspenc = None;
                    }
                    None => {
                        builder.pop();
                        value.push_str(&charset::decode(&builder, charset));
                        encwspenc = Some(false);
                    }
                }
                wsplength = 0;
                encoded = false;
                builder.clear();
            } else {
                builder.push(c);
                let is_wsp = c == b' ' || c == b'\t';
                if !encoded && encwspenc != Some(false) {
                    encwspenc = Some(is_wsp);
                    wsplength = if is_wsp { wsplength + 1 } else { 0 };
                }
            }
        }
        pos += 1;
    }

    if !builder.is_empty() {
        value.push_str(&charset::decode(&builder, charset));
    }
    value
}

/// Decode a single "=?charset?enc?data?=" token, or `None` if any piece
/// of it is unusable.
pub(crate) fn decode_word(word: &[u8]) -> Option<String> {
    let s = std::str::from_utf8(word).ok()?;
    let inner = s.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let label = parts.next()?;
    let encoding = parts.next()?;
    let data = parts.next()?;
    if label.is_empty() {
        return None;
    }
    let bytes = match encoding {
        "B" | "b" => decode_b(data),
        "Q" | "q" => decode_q(data),
        _ => return None,
    };
    charset::decode_checked(&bytes, label)
}

fn decode_b(data: &str) -> Vec<u8> {
    let src = data.as_bytes();
    let mut out = vec![0u8; src.len() / 4 * 3 + 3];
    let mut src_pos = 0;
    let mut dst_pos = 0;
    let max = out.len();
    crate::base64::decode(src, &mut src_pos, &mut out, &mut dst_pos, max, true);
    out.truncate(dst_pos);
    out
}

fn decode_q(data: &str) -> Vec<u8> {
    let src = data.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        match src[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < src.len()
                && hex_value(src[i + 1]) >= 0
                && hex_value(src[i + 2]) >= 0 =>
            {
                out.push(((hex_value(src[i + 1]) as u8) << 4) | hex_value(src[i + 2]) as u8);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

/// Encode text as a single encoded-word in the preferred charset (UTF-8
/// when absent or insufficient), picking Q unless too much of it would
/// need escaping.
pub fn encode_word(value: &str, charset: Option<&str>) -> String {
    let (content, label) = charset::encode(value, charset);
    let invalid_q = content.iter().filter(|&&b| b >= 0x80 || force_encode(b)).count();
    if invalid_q > content.len() / 3 {
        return format!("=?{}?B?{}?=", label, STANDARD.encode(&content));
    }
    let mut out = String::with_capacity(content.len() * 3 + label.len() + 7);
    out.push_str("=?");
    out.push_str(&label);
    out.push_str("?Q?");
    for &b in &content {
        if b == b' ' {
            out.push('_');
        } else if b >= 0x80 || force_encode(b) {
            out.push('=');
            out.push(HEX_UPPER[(b >> 4) as usize] as char);
            out.push(HEX_UPPER[(b & 0x0F) as usize] as char);
        } else {
            out.push(b as char);
        }
    }
    out.push_str("?=");
    out
}

/// Make a header value transport-safe.  Clean leading and trailing runs
/// of words stay readable; the smallest interior span that needs it
/// becomes one encoded-word.  In phrase context (display names), values
/// that merely need quoting are quoted instead.
pub fn escape(value: &str, charset: Option<&str>, phrase: bool) -> String {
    let len = value.len();
    let mut needs_quote = false;
    let mut wsp = true;
    let mut needs_2047 = 0usize;
    let mut clean_to = 0usize;
    let mut clean_from = len;

    for (i, c) in value.char_indices() {
        if c > '\u{7f}' || c == '\0' || c == '\r' || c == '\n' {
            needs_2047 += 1;
            clean_from = len;
        } else if !phrase {
            // no such thing as quoting outside an RFC 5322 phrase
        } else if c == '"' || c == '\\' {
            needs_quote = true;
            clean_from = len;
        } else if (c != ' ' && !is_atext(c)) || (c == ' ' && wsp) {
            needs_quote = true;
            clean_from = len;
        }
        wsp = c == ' ';
        if wsp {
            if !needs_quote && needs_2047 == 0 && i != len - 1 {
                clean_to = i + 1;
            } else if clean_from == len && i > clean_to + 1 {
                clean_from = i;
            }
        }
    }
    if phrase {
        needs_quote |= wsp;
    }
    if wsp {
        clean_from = len;
    }

    if needs_2047 > 0 {
        let prefix = &value[..clean_to];
        let cleaned = &value[clean_to..clean_from];
        let suffix = &value[clean_from..];
        format!("{}{}{}", prefix, encode_word(cleaned, charset), suffix)
    } else if needs_quote {
        quote(value)
    } else {
        value.to_string()
    }
}

/// Wrap a value as an RFC 5322 quoted-string.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
