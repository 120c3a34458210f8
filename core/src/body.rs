/*
 * body.rs
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

//! Leaf body parts: content setters, text accessors and the
//! transfer-encoding selection heuristic.

use std::fs;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::Path;
use std::rc::Rc;

use crate::charset;
use crate::content_type::ContentType;
use crate::cte::TransferEncoding;
use crate::header::MimeHeader;
use crate::part::{BodyState, MimePart, PartKind};
use crate::source::{DataSource, PartSource, StreamSource};

/// Soft ceiling on line length for 7bit eligibility, comfortably under
/// the RFC 5322 hard limit so MTA rewrapping cannot push lines over it.
const MAX_LINE_OCTETS: i64 = 900;

/// A leaf part, i.e. one that is not a multipart or message container.
#[derive(Clone)]
pub struct MimeBodyPart {
    part: MimePart,
}

impl Deref for MimeBodyPart {
    type Target = MimePart;

    fn deref(&self) -> &MimePart {
        &self.part
    }
}

impl MimeBodyPart {
    /// A fresh leaf of the given type, text/plain when unspecified.
    pub fn new(ctype: Option<ContentType>) -> MimeBodyPart {
        let part = MimePart::new_node(PartKind::Body(BodyState {
            encoding: TransferEncoding::Binary,
            target_encoding: TransferEncoding::Binary,
        }));
        part.set_content_type(ctype.unwrap_or_default());
        MimeBodyPart { part }
    }

    pub(crate) fn wrap(part: MimePart) -> MimeBodyPart {
        MimeBodyPart { part }
    }

    pub fn into_part(self) -> MimePart {
        self.part
    }

    /// How the backing bytes are currently encoded.
    pub fn encoding(&self) -> TransferEncoding {
        match &self.part.inner.borrow().kind {
            PartKind::Body(state) => state.encoding,
            _ => TransferEncoding::Binary,
        }
    }

    /// How the part will be encoded when serialized, tracking the
    /// Content-Transfer-Encoding header.
    pub fn target_encoding(&self) -> TransferEncoding {
        match &self.part.inner.borrow().kind {
            PartKind::Body(state) => state.target_encoding,
            _ => TransferEncoding::Binary,
        }
    }

    /// Set or, with an absent value, remove the transfer-encoding
    /// header.  The serialization encoding follows it.
    pub fn set_transfer_encoding(&self, cte: Option<TransferEncoding>) {
        self.part.header_block().set_named(
            "Content-Transfer-Encoding",
            cte.map(|cte| MimeHeader::new("Content-Transfer-Encoding", cte.to_str())),
        );
    }

    /// The body decoded to text, honoring the charset parameter and
    /// falling back to the tree's default charset.
    pub fn text(&self) -> io::Result<String> {
        let content = self.part.content()?;
        let charset = self
            .part
            .content_type()
            .parameter("charset")
            .map(str::to_string)
            .or_else(|| self.part.default_charset());
        Ok(charset::decode(&content, charset.as_deref()))
    }

    /// Replace the body with encoded text.  The charset is the explicit
    /// argument, else the existing charset parameter, else the default
    /// charset, else UTF-8; whichever charset actually encoded the text
    /// lands in the content-type parameter.
    pub fn set_text(
        &self,
        text: &str,
        charset: Option<&str>,
        subtype: Option<&str>,
        cte: Option<TransferEncoding>,
    ) -> io::Result<()> {
        let mut ctype = self.part.content_type();
        let subtype = subtype.unwrap_or(ctype.sub_type()).to_string();
        ctype.set_content_type(&format!("text/{}", subtype));
        let requested = charset
            .map(str::to_string)
            .or_else(|| ctype.parameter("charset").map(str::to_string))
            .or_else(|| self.part.default_charset())
            .unwrap_or_else(|| String::from("utf-8"));
        let (bytes, label) = charset::encode(text, Some(&requested));
        ctype.set_parameter("charset", Some(&label));
        self.set_content_source(Some(PartSource::memory(bytes)), cte)?;
        self.part.set_content_type(ctype);
        Ok(())
    }

    /// Replace the body with a byte buffer.  Without an explicit
    /// transfer encoding the heuristic picks one.
    pub fn set_content(&self, content: &[u8], cte: Option<TransferEncoding>) -> io::Result<()> {
        self.set_content_source(Some(PartSource::memory(content.to_vec())), cte)
    }

    /// Back the body with a file.  A missing file leaves the part
    /// contentless rather than failing.
    pub fn set_content_file(
        &self,
        path: impl AsRef<Path>,
        cte: Option<TransferEncoding>,
    ) -> io::Result<()> {
        let path = path.as_ref();
        let source = if fs::metadata(path).is_ok() {
            Some(PartSource::file(path))
        } else {
            None
        };
        self.set_content_source(source, cte)
    }

    pub fn set_content_data(
        &self,
        data: Rc<dyn DataSource>,
        cte: Option<TransferEncoding>,
    ) -> io::Result<()> {
        self.set_content_source(Some(PartSource::data(data)), cte)
    }

    pub fn set_content_stream(
        &self,
        stream: Rc<dyn StreamSource>,
        cte: Option<TransferEncoding>,
    ) -> io::Result<()> {
        self.set_content_source(Some(PartSource::stream(stream)), cte)
    }

    pub fn clear_content(&self) -> io::Result<()> {
        self.set_content_source(None, None)
    }

    fn set_content_source(
        &self,
        source: Option<PartSource>,
        cte: Option<TransferEncoding>,
    ) -> io::Result<()> {
        let has_source = source.is_some();
        self.part.set_content(source);
        // new bytes arrive unencoded; reset both sides so the heuristic
        // scans the raw content rather than a stale transcoding of it
        {
            let mut inner = self.part.inner.borrow_mut();
            if let PartKind::Body(state) = &mut inner.kind {
                state.encoding = TransferEncoding::Binary;
                state.target_encoding = TransferEncoding::Binary;
            }
        }
        let encoding = match cte {
            Some(cte) => Some(cte),
            None if has_source => Some(self.pick_encoding()?),
            None => None,
        };
        self.set_transfer_encoding(encoding);
        Ok(())
    }

    /// Choose the cheapest safe transfer encoding for the current
    /// content with a single forward scan: 7bit when everything is
    /// low-ASCII and no line exceeds the soft limit, quoted-printable
    /// while escapable octets stay under a quarter of the content,
    /// base64 beyond that.
    pub fn pick_encoding(&self) -> io::Result<TransferEncoding> {
        let mut stream = self.part.raw_content_stream()?;
        let mut sevenbit = true;
        let mut qpencodeable: i64 = 0;
        let mut toolong: i64 = 0;
        let mut length: i64 = 0;
        let mut column: i64 = 0;
        let mut buf = [0u8; 8192];
        loop {
            let num = stream.read(&mut buf)?;
            if num == 0 {
                break;
            }
            for &octet in &buf[..num] {
                if octet >= 0x7F
                    || (octet < 0x20 && octet != b'\t' && octet != b'\r' && octet != b'\n')
                {
                    qpencodeable += 1;
                    if octet == 0 || octet >= 0x7F {
                        sevenbit = false;
                    }
                }
                if octet == b'\n' {
                    if column > MAX_LINE_OCTETS {
                        toolong += 1;
                    }
                    column = 0;
                } else {
                    column += 1;
                }
                length += 1;
            }
        }
        if column > MAX_LINE_OCTETS {
            toolong += 1;
        }
        Ok(if sevenbit && toolong == 0 {
            TransferEncoding::SevenBit
        } else if qpencodeable < length / 4 {
            TransferEncoding::QuotedPrintable
        } else {
            TransferEncoding::Base64
        })
    }
}

impl MimePart {
    /// View the node as a leaf, if it is one.
    pub fn as_body(&self) -> Option<MimeBodyPart> {
        if matches!(self.inner.borrow().kind, PartKind::Body(_)) {
            Some(MimeBodyPart::wrap(self.clone()))
        } else {
            None
        }
    }
}
