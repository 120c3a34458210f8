/*
 * charset.rs
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

//! Charset label resolution and text conversion, backed by the encoding_rs registry.

use encoding_rs::Encoding;
use tracing::debug;

/// Label assumed for header bytes when nothing names a charset.  The registry
/// resolves it to windows-1252, the superset that mail in the wild means when
/// it says latin-1.
pub const DEFAULT_CHARSET: &str = "iso-8859-1";

/// Resolve a charset label to a registry encoding.  RFC 2231 language
/// suffixes ("utf-8*en") are ignored.  Lookup follows the WHATWG label
/// table, so decoding gets superset behavior (iso-8859-1 -> windows-1252).
pub fn lookup(label: &str) -> Option<&'static Encoding> {
    let label = label.split('*').next().unwrap_or(label).trim();
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label.as_bytes())
}

fn is_latin1_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("iso-8859-1")
        || label.eq_ignore_ascii_case("iso8859-1")
        || label.eq_ignore_ascii_case("iso_8859-1")
        || label.eq_ignore_ascii_case("latin1")
        || label.eq_ignore_ascii_case("latin-1")
        || label.eq_ignore_ascii_case("l1")
}

fn is_ascii_label(label: &str) -> bool {
    label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii")
}

/// Decode bytes under the named charset.  Unknown labels fall back to the
/// default charset; unmappable sequences become U+FFFD.  Never fails.
pub fn decode(bytes: &[u8], charset: Option<&str>) -> String {
    let label = charset.unwrap_or(DEFAULT_CHARSET);
    let enc = match lookup(label) {
        Some(enc) => enc,
        None => {
            debug!(charset = label, "unknown charset label, decoding with default");
            lookup(DEFAULT_CHARSET).unwrap_or(encoding_rs::WINDOWS_1252)
        }
    };
    let (text, _, _) = enc.decode(bytes);
    text.into_owned()
}

/// Decode bytes under the named charset, or `None` when the label is not in
/// the registry.  Used where an unknown charset invalidates the surrounding
/// token instead of being guessed at.
pub fn decode_checked(bytes: &[u8], charset: &str) -> Option<String> {
    let enc = lookup(charset)?;
    let (text, _, _) = enc.decode(bytes);
    Some(text.into_owned())
}

/// Encode text under the preferred charset, falling back to UTF-8 when the
/// charset cannot represent it.  Returns the bytes and the lowercase label
/// actually used.
///
/// iso-8859-1 and us-ascii are handled strictly: the windows-1252 superset
/// the registry would substitute on lookup must not widen what those labels
/// claim to encode.
pub fn encode(text: &str, charset: Option<&str>) -> (Vec<u8>, String) {
    let utf8 = || (text.as_bytes().to_vec(), String::from("utf-8"));
    let label = match charset {
        Some(label) if !label.trim().is_empty() => label.trim(),
        _ => return utf8(),
    };

    if is_latin1_label(label) {
        if text.chars().all(|c| (c as u32) <= 0xFF) {
            return (text.chars().map(|c| c as u8).collect(), String::from("iso-8859-1"));
        }
        return utf8();
    }
    if is_ascii_label(label) {
        if text.is_ascii() {
            return (text.as_bytes().to_vec(), String::from("us-ascii"));
        }
        return utf8();
    }

    match lookup(label) {
        Some(enc) => {
            let (bytes, used, unmappable) = enc.encode(text);
            if unmappable {
                debug!(charset = label, "charset cannot represent value, encoding as utf-8");
                utf8()
            } else {
                (bytes.into_owned(), used.name().to_ascii_lowercase())
            }
        }
        None => {
            debug!(charset = label, "unknown charset label, encoding as utf-8");
            utf8()
        }
    }
}
