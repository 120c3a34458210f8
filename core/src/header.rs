/*
 * header.rs
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

//! A single header field: name plus raw line, with lazy reserialization
//! after mutation and RFC 2047 decoding on read.

use crate::charset;
use crate::content_disposition::ContentDisposition;
use crate::content_type::ContentType;
use crate::rfc2047;

/// Placement and uniqueness rules for a well-known field name.
///
/// `position` orders fields within a serialized block (trace headers
/// first, Status-style mailbox fields last, everything unknown at 35).
/// `prepend` fields stack newest-first within their run, `first` fields
/// (the Resent-* block) go in front of their run, and `unique` fields
/// are replaced rather than duplicated on add.
pub(crate) struct HeaderInfo {
    pub(crate) name: Option<&'static str>,
    pub(crate) position: u8,
    pub(crate) unique: bool,
    pub(crate) prepend: bool,
    pub(crate) first: bool,
}

const fn info(
    name: &'static str,
    position: u8,
    unique: bool,
    prepend: bool,
    first: bool,
) -> HeaderInfo {
    HeaderInfo { name: Some(name), position, unique, prepend, first }
}

const DEFAULT_INFO: HeaderInfo =
    HeaderInfo { name: None, position: 35, unique: false, prepend: false, first: false };

static HEADER_INFOS: &[HeaderInfo] = &[
    info("Return-Path", 1, false, true, false),
    info("Received", 2, false, true, false),
    info("Resent-Date", 3, false, false, true),
    info("Resent-From", 3, false, false, true),
    info("Resent-Sender", 3, false, false, true),
    info("Resent-To", 3, false, false, true),
    info("Resent-Cc", 3, false, false, true),
    info("Resent-Bcc", 3, false, false, true),
    info("Resent-Message-ID", 3, false, false, true),
    info("Date", 4, true, false, false),
    info("From", 5, false, false, false),
    info("Sender", 6, true, false, false),
    info("Reply-To", 7, true, false, false),
    info("To", 8, false, false, false),
    info("Cc", 9, false, false, false),
    info("Bcc", 10, false, false, false),
    info("Subject", 11, true, false, false),
    info("Message-ID", 12, true, false, false),
    info("In-Reply-To", 13, true, false, false),
    info("References", 14, true, false, false),
    info("Thread-Topic", 15, true, false, false),
    info("Thread-Index", 16, true, false, false),
    info("Content-Type", 17, true, false, false),
    info("Content-Disposition", 18, true, false, false),
    info("Content-Transfer-Encoding", 19, true, false, false),
    info("MIME-Version", 20, true, false, false),
    info("Content-Length", 49, true, false, false),
    info("Status", 50, true, false, false),
];

pub(crate) fn header_info(name: &str) -> &'static HeaderInfo {
    HEADER_INFOS
        .iter()
        .find(|h| h.name.is_some_and(|n| n.eq_ignore_ascii_case(name)))
        .unwrap_or(&DEFAULT_INFO)
}

/// What the header value was set from, kept so the raw line can be
/// regenerated after the cached serialization is dropped.
#[derive(Clone)]
enum HeaderBody {
    Raw,
    Text { text: String, charset: Option<String> },
    Type(ContentType),
    Disposition(ContentDisposition),
}

/// One header field.  `content` holds the full serialized line,
/// `"Name: value\r\n"`; it is absent exactly when the header is dirty
/// and is rebuilt from `body` on the next read.
#[derive(Clone)]
pub struct MimeHeader {
    info: &'static HeaderInfo,
    name: String,
    body: HeaderBody,
    content: Option<Vec<u8>>,
    value_start: usize,
}

impl MimeHeader {
    /// A header line captured off the wire: `raw` is the complete line
    /// including the name, colon, folding, and trailing CRLF, and
    /// `value_start` is where the value begins.  The wire spelling of
    /// the name is kept as-is.
    pub(crate) fn parsed(name: &str, raw: Vec<u8>, value_start: usize) -> MimeHeader {
        MimeHeader {
            info: header_info(name),
            name: name.to_string(),
            body: HeaderBody::Raw,
            content: Some(raw),
            value_start,
        }
    }

    /// A new header whose value will be 2047-encoded with utf-8 if it
    /// needs it.
    pub fn new(name: &str, value: &str) -> MimeHeader {
        MimeHeader::with_charset(name, value, None)
    }

    /// A new header whose value will be 2047-encoded with the given
    /// charset where possible, falling back to utf-8.  Serialization of
    /// the line is deferred until first read.
    pub fn with_charset(name: &str, value: &str, charset: Option<&str>) -> MimeHeader {
        let info = header_info(name);
        MimeHeader {
            info,
            name: info.name.unwrap_or(name).to_string(),
            body: HeaderBody::Text {
                text: value.to_string(),
                charset: charset.map(|c| c.to_string()),
            },
            content: None,
            value_start: 0,
        }
    }

    /// A new header with a verbatim value: no charset transforms,
    /// encoded-words, or folding are applied.
    pub fn from_value_bytes(name: &str, value: &[u8]) -> MimeHeader {
        let info = header_info(name);
        let name = info.name.unwrap_or(name);
        let (content, value_start) = serialize_line(name, value);
        MimeHeader {
            info,
            name: name.to_string(),
            body: HeaderBody::Raw,
            content: Some(content),
            value_start,
        }
    }

    pub(crate) fn for_content_type(ctype: ContentType) -> MimeHeader {
        MimeHeader {
            info: header_info("Content-Type"),
            name: "Content-Type".to_string(),
            body: HeaderBody::Type(ctype),
            content: None,
            value_start: 0,
        }
    }

    pub(crate) fn for_disposition(disposition: ContentDisposition) -> MimeHeader {
        MimeHeader {
            info: header_info("Content-Disposition"),
            name: "Content-Disposition".to_string(),
            body: HeaderBody::Disposition(disposition),
            content: None,
            value_start: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn info(&self) -> &'static HeaderInfo {
        self.info
    }

    fn reserialize(&mut self) {
        if self.content.is_some() {
            return;
        }
        let value = match &self.body {
            HeaderBody::Raw => Vec::new(),
            HeaderBody::Text { text, charset } => {
                rfc2047::escape(text, charset.as_deref(), false).into_bytes()
            }
            HeaderBody::Type(ctype) => ctype.to_header_value().into_bytes(),
            HeaderBody::Disposition(disposition) => disposition.to_header_value().into_bytes(),
        };
        let (content, value_start) = serialize_line(&self.name, &value);
        self.content = Some(content);
        self.value_start = value_start;
    }

    /// The entire serialized line, name and colon included.
    pub fn raw_header(&mut self) -> &[u8] {
        self.reserialize();
        match &self.content {
            Some(content) => content,
            None => &[],
        }
    }

    fn value_bytes(&mut self) -> &[u8] {
        self.reserialize();
        let content = match &self.content {
            Some(content) => content.as_slice(),
            None => &[],
        };
        let mut end = content.len();
        while end > self.value_start && (content[end - 1] == b'\n' || content[end - 1] == b'\r') {
            end -= 1;
        }
        &content[self.value_start..end]
    }

    /// The field value, unfolded and with encoded-words resolved; raw
    /// 8-bit bytes are read under `charset`.
    pub fn value(&mut self, charset: Option<&str>) -> String {
        rfc2047::decode_header(self.value_bytes(), charset)
    }

    /// The field value as a string with the trailing CRLF removed but no
    /// other decoding, not even unfolding.
    pub fn encoded_value(&mut self, charset: Option<&str>) -> String {
        charset::decode(self.value_bytes(), charset)
    }
}

fn serialize_line(name: &str, value: &[u8]) -> (Vec<u8>, usize) {
    let mut buf = Vec::with_capacity(name.len() + value.len() + 4);
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value);
    buf.extend_from_slice(b"\r\n");
    (buf, name.len() + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_metadata() {
        assert!(header_info("received").prepend);
        assert!(header_info("RESENT-DATE").first);
        assert!(header_info("Subject").unique);
        assert!(!header_info("X-Mailer").unique);
        assert_eq!(header_info("X-Mailer").position, 35);
        assert_eq!(header_info("status").position, 50);
    }

    #[test]
    fn canonical_name_for_known_fields() {
        let hdr = MimeHeader::new("subject", "Test");
        assert_eq!(hdr.name(), "Subject");
        let hdr = MimeHeader::from_value_bytes("MIME-VERSION", b"1.0");
        assert_eq!(hdr.name(), "MIME-Version");
    }

    #[test]
    fn parsed_name_kept_verbatim() {
        let hdr = MimeHeader::parsed("SUBJECT", b"SUBJECT: hi\r\n".to_vec(), 9);
        assert_eq!(hdr.name(), "SUBJECT");
    }

    #[test]
    fn lazy_serialization() {
        let mut hdr = MimeHeader::new("Subject", "Hambone");
        assert!(hdr.content.is_none());
        assert_eq!(hdr.raw_header(), b"Subject: Hambone\r\n");
        assert!(hdr.content.is_some());
    }

    #[test]
    fn charset_encoding_on_serialize() {
        let mut hdr = MimeHeader::with_charset("Subject", "Pru\u{ee}", Some("iso-8859-1"));
        assert_eq!(hdr.raw_header(), b"Subject: =?iso-8859-1?Q?Pru=EE?=\r\n");
        assert_eq!(hdr.value(None), "Pru\u{ee}");
    }

    #[test]
    fn value_decodes_encoded_words() {
        let mut hdr = MimeHeader::from_value_bytes("Subject", b"=?utf-8?Q?Hambone_x?=");
        assert_eq!(hdr.value(None), "Hambone x");
        assert_eq!(hdr.encoded_value(None), "=?utf-8?Q?Hambone_x?=");
    }

    #[test]
    fn value_unfolds() {
        let raw = b"Subject: dog\r\n cat\r\n".to_vec();
        let mut hdr = MimeHeader::parsed("Subject", raw, 9);
        assert_eq!(hdr.value(None), "dog cat");
        assert_eq!(hdr.encoded_value(None), "dog\r\n cat");
    }

    #[test]
    fn eight_bit_value_decoded_with_superset_charset() {
        let mut hdr = MimeHeader::from_value_bytes("X-Cost", &[0x80, b'3', b'0', b'0']);
        assert_eq!(hdr.value(Some("iso-8859-1")), "\u{20ac}300");
    }
}
